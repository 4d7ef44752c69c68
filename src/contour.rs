//! Tracing the kept-edge graph into closed integer polygons.

use crate::geom::Point;
use crate::graph::{EdgeId, Graph, VertexId};
use crate::Error;

/// A closed polygonal contour; the last vertex connects back to the first.
pub type Polygon = Vec<Point>;

/// Drains the primary graph into a list of oriented polygons.
///
/// Starting from each vertex (in sweep order) that still has an outgoing
/// edge, follow edges until the walk returns to its starting point,
/// deleting them as they are consumed. At every arrival the walk prefers an
/// incoming edge of the opposite sense (traversed backwards) and otherwise
/// takes an outgoing edge of the same sense, so each loop encloses a
/// consistent side. Loops traced with `sense` set are reversed before being
/// emitted, which leaves holes wound opposite to their outer boundary.
pub(crate) fn extract(graph: &mut Graph) -> Result<Vec<Polygon>, Error> {
    let mut result = Vec::new();

    let starts: Vec<VertexId> = graph.vertex_set.values().copied().collect();
    for start in starts {
        let Some((_, &first_edge)) = graph.verts[start].below.iter().next() else {
            continue;
        };

        let mut poly: Polygon = Vec::new();
        let mut cur = first_edge;
        let mut flipped = false;
        let first = graph.edges[cur].from;
        let sense = graph.edges[cur].flags.sense;

        loop {
            let (from, to) = if flipped {
                (graph.edges[cur].to, graph.edges[cur].from)
            } else {
                (graph.edges[cur].from, graph.edges[cur].to)
            };

            poly.push(graph.verts[from].pos.grid_point());
            graph.remove(cur);

            if to == first {
                break;
            }

            match next_edge(graph, to, sense) {
                Some((e, f)) => {
                    cur = e;
                    flipped = f;
                }
                None => {
                    // Should not happen on well-formed input; emit what we
                    // have rather than abandon the whole result.
                    log::trace!("no closing edge after {} points", poly.len());
                    break;
                }
            }
        }

        if sense {
            poly.reverse();
        }
        result.push(poly);
    }

    let dangling = graph.edge_count();
    if dangling > 0 {
        log::trace!("{dangling} dangling edges left after tracing");
    }
    Ok(result)
}

/// Picks the edge to continue on from `at`. Incoming edges are walked
/// against their direction, so their sense reads inverted.
fn next_edge(graph: &Graph, at: VertexId, sense: bool) -> Option<(EdgeId, bool)> {
    for &e in graph.verts[at].above.values() {
        if graph.edges[e].flags.sense != sense {
            return Some((e, true));
        }
    }
    for &e in graph.verts[at].below.values() {
        if graph.edges[e].flags.sense == sense {
            return Some((e, false));
        }
    }
    None
}
