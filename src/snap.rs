//! Stable snap rounding.
//!
//! After classification the kept edges may end at rational intersection
//! points. Rounding each vertex to the grid independently would be wrong:
//! a nearby vertex can end up on the other side of a rounded edge, creating
//! a crossing that the arrangement just worked so hard to remove. Instead,
//! every displaced edge collects *pins*: grid vertices that sit on a
//! different side of the rounded edge than of the original, or exactly on
//! the original. The edge is then re-routed vertex by vertex through its
//! pins, which keeps every sideness relation intact:
//!
//! ```text
//!    from o----___      . v           from o----___       v
//!              ----___                          ---o v' __o----- o to
//!         (raw) . v'  ----___o to                   ----
//! ```
//!
//! On the left, rounding `v'` up to `v` would drag the edge across `v`; on
//! the right, the edge is bent through `v` instead.

use std::collections::BTreeSet;

use crate::geom::{self, Line};
use crate::graph::{EdgeId, Graph, Pin, VertexId, Wind};
use crate::num::Span;
use crate::{ensure, Error};

/// Rewrites the graph onto the integer lattice.
pub(crate) fn snap_round(graph: &mut Graph) -> Result<(), Error> {
    extract(graph)?;
    discover_pins(graph)?;
    reroute(graph)
}

/// Moves every kept edge with a displaced endpoint out of the primary set
/// and into the snap set, keyed by its snapped endpoints.
///
/// The separate collection matters: the primary set may already contain an
/// edge joining the two snapped endpoints, and re-inserting there would
/// merge the pair before the pins have been found.
///
/// Every kept edge also has its winding replaced by a unit winding derived
/// from its sense flag, so that edges which come to coincide after rounding
/// cancel through the usual winding summation.
fn extract(graph: &mut Graph) -> Result<(), Error> {
    let verts: Vec<VertexId> = graph.vertex_set.values().copied().collect();
    for v in verts {
        let above: Vec<EdgeId> = graph.verts[v].above.values().copied().collect();
        for e in above {
            ensure!(
                graph.edges[e].flags.keep,
                "culled edge survived into snap rounding"
            );
            graph.edges[e].wind = Wind::unit(graph.edges[e].flags.sense);

            let from_pos = graph.verts[graph.edges[e].from].pos;
            let to_pos = graph.verts[graph.edges[e].to].pos;

            // Snapped endpoints are registered in the snap set even for
            // edges that stay put: they take part in pin discovery below.
            let p = graph.snap_find(from_pos.snapped());
            let q = graph.snap_find(to_pos.snapped());

            if from_pos.is_grid() && to_pos.is_grid() {
                continue;
            }

            let (raw, wind) = (graph.edges[e].raw, graph.edges[e].wind);
            // A sub-grid edge can snap to a single point and vanish here.
            graph.goes_to(p, q, raw, wind, Some(e));
            graph.remove(e);
        }
    }
    Ok(())
}

/// Sweeps the snap set in order, testing every visited vertex against the
/// snapped edges that are open at that point, and recording the pins.
///
/// Every snapped edge also receives its own endpoints as pins, so a pin set
/// always describes the full route.
fn discover_pins(graph: &mut Graph) -> Result<(), Error> {
    let mut open: BTreeSet<EdgeId> = BTreeSet::new();

    let verts: Vec<VertexId> = graph.snap_set.values().copied().collect();
    for v in verts {
        let pos = graph.verts[v].pos;

        let above: Vec<EdgeId> = graph.verts[v].above.values().copied().collect();
        for e in above {
            let pin = graph.find(pos);
            add_pin(graph, e, pin, true);
            open.remove(&e);
        }

        hittest(graph, &open, v);

        let below: Vec<EdgeId> = graph.verts[v].below.values().copied().collect();
        for e in below {
            let pin = graph.find(pos);
            add_pin(graph, e, pin, true);
            open.insert(e);
        }
    }

    ensure!(open.is_empty(), "pin sweep left edges open");
    Ok(())
}

/// Is `v` a pin for any of the open snapped edges?
///
/// `v` overlaps the open edges in `y` by construction; for each that it
/// also overlaps in `x`, compare which side of the snapped and of the raw
/// edge it is on. A vertex exactly on the raw line, or on different sides
/// of the two versions, deflects the edge.
fn hittest(graph: &mut Graph, open: &BTreeSet<EdgeId>, v: VertexId) {
    let pos = graph.verts[v].pos;
    let point = pos.grid_point();

    for &e in open {
        let from_pos = graph.verts[graph.edges[e].from].pos;
        let to_pos = graph.verts[graph.edges[e].to].pos;

        if !Span::new(from_pos.x, to_pos.x).overlaps(&Span::new(pos.x, pos.x)) {
            continue;
        }

        let snapped = Line::new(from_pos.grid_point(), to_pos.grid_point());
        let a = geom::side_of_line(point, snapped);
        let b = geom::side_of_line(point, graph.edges[e].raw);

        if b == 0 || a * b < 0 {
            let pin = graph.find(pos);
            add_pin(graph, e, pin, b <= 0);
        }
    }
}

fn add_pin(graph: &mut Graph, e: EdgeId, pin: VertexId, above: bool) {
    debug_assert!(graph.verts[pin].pos.is_grid());

    let from = graph.edges[e].from;
    let fp = graph.verts[from].pos;
    let pp = graph.verts[pin].pos;
    let (dx, dy) = (pp.x.int() - fp.x.int(), pp.y.int() - fp.y.int());
    let dist = dx * dx + dy * dy;

    graph.edges[e]
        .pins
        .get_or_insert_with(Default::default)
        .entry(dist)
        .or_insert(Pin { v: pin, above });
}

/// Replaces every snap-set edge by a chain of primary-set edges running
/// through its pins.
fn reroute(graph: &mut Graph) -> Result<(), Error> {
    let verts: Vec<VertexId> = graph.snap_set.values().copied().collect();
    for v in verts {
        let above: Vec<EdgeId> = graph.verts[v].above.values().copied().collect();
        for e in above {
            snap_to_pins(graph, e)?;
            graph.remove(e);
        }
    }
    Ok(())
}

/// Walks the pins in order of distance from the edge's top, trimming with a
/// one-sided monotone stack: a candidate pops the stack while the turn it
/// would create bends to the wrong side for its handedness flag. The
/// surviving chain is emitted into the primary set; reconstructed edges
/// whose winding sums to zero cancel on the spot.
fn snap_to_pins(graph: &mut Graph, e: EdgeId) -> Result<(), Error> {
    let pins = graph.edges[e]
        .pins
        .take()
        .ok_or(Error::Invariant("snapped edge has no pins"))?;

    let mut route: Vec<Pin> = Vec::new();
    for &pin in pins.values() {
        while route.len() >= 2 {
            let pa = graph.verts[route[route.len() - 1].v].pos.grid_point();
            let pb = graph.verts[route[route.len() - 2].v].pos.grid_point();
            let here = graph.verts[pin.v].pos.grid_point();

            let turn = geom::side_of_line(here, Line::new(pb, pa));
            if turn == 0 || (turn < 0) == pin.above {
                break;
            }
            route.pop();
        }
        route.push(pin);
    }

    ensure!(route.len() >= 2, "pin route lost its endpoints");

    let (raw, wind) = (graph.edges[e].raw, graph.edges[e].wind);
    for i in 1..route.len() {
        let ne = graph
            .goes_to(route[i - 1].v, route[i].v, raw, wind, Some(e))
            .ok_or(Error::Invariant("pin route revisited a vertex"))?;
        if graph.edges[ne].wind.is_zero() {
            graph.remove(ne);
        }
    }
    Ok(())
}
