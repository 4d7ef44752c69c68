//! The plane sweep over the arrangement.
//!
//! The sweep visits vertices in sweep order, maintaining the active edge
//! list: the left-to-right ordered set of edges currently crossed by the
//! sweep line. The key to it all is the ordering predicate, which is allowed
//! to *fail*: when it detects two edges crossing, collinearly overlapping, or
//! meeting badly at a shared endpoint, it reports a collision instead of an
//! order. The insert catches the collision, splits the offending edges at
//! exact rational intersection points, and queues the sub-edges to be tried
//! again. After each vertex the classifier walks the active list and marks
//! the edges that separate inside from outside under the session's rule.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::ops::Bound;

use crate::geom::{self, RatPoint};
use crate::graph::{EdgeId, Graph, VertexId, Wind};
use crate::num::{Rat, Span};
use crate::{ensure, Error, Rule};

/// Two active edges that could not be ordered.
///
/// This is control flow, not an error: it is consumed by [`Sweep::insert`]
/// and never escapes the sweep.
struct Collision {
    p: EdgeId,
    q: EdgeId,
    kind: CollisionKind,
}

enum CollisionKind {
    /// Both edges pass through an existing vertex and must be split there.
    Split(VertexId),
    /// The edges properly cross; the crossing point is not a vertex yet.
    Intersect,
}

impl Collision {
    fn split(p: EdgeId, q: EdgeId, at: VertexId) -> Self {
        Collision {
            p,
            q,
            kind: CollisionKind::Split(at),
        }
    }

    fn intersect(p: EdgeId, q: EdgeId) -> Self {
        Collision {
            p,
            q,
            kind: CollisionKind::Intersect,
        }
    }
}

/// Counters for one run of the sweep, logged at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SweepStats {
    pub comparisons: u64,
    pub splits: u64,
    pub intersections: u64,
}

/// The outcome of placing one edge into the active list: either it went in,
/// or it collided with a neighbour on the way down.
type Placement = Result<(), Collision>;

/// The active edge list, ordered left to right along the sweep line.
///
/// Backed by a sorted vector; every member edge carries its slot index so
/// that removal never needs to run the (fallible) comparator.
#[derive(Default)]
struct ActiveList {
    edges: Vec<EdgeId>,
}

impl ActiveList {
    fn len(&self) -> usize {
        self.edges.len()
    }

    fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Binary-searches for the edge's slot and inserts it there.
    ///
    /// The search compares the new edge against every would-be neighbour on
    /// the way down, which is exactly where collisions surface. A collision
    /// aborts the search before the list is touched, so there is nothing to
    /// roll back.
    fn insert(&mut self, g: &mut Graph, e: EdgeId, stats: &mut SweepStats) -> Placement {
        let mut lo = 0;
        let mut hi = self.edges.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match compare(g, e, self.edges[mid], stats)? {
                Ordering::Less => hi = mid,
                Ordering::Greater | Ordering::Equal => lo = mid + 1,
            }
        }

        self.edges.insert(lo, e);
        for (i, &other) in self.edges.iter().enumerate().skip(lo) {
            g.edges[other].ael_slot = Some(i);
        }
        Ok(())
    }

    /// Removes the edge in the given slot, fixing up the slots after it.
    fn remove_at(&mut self, g: &mut Graph, slot: usize) -> EdgeId {
        let e = self.edges.remove(slot);
        g.edges[e].ael_slot = None;
        for (i, &other) in self.edges.iter().enumerate().skip(slot) {
            g.edges[other].ael_slot = Some(i);
        }
        e
    }
}

/// Orders two distinct edges along the sweep line, or reports the collision
/// that makes them unorderable.
///
/// Only the signs of exact determinants are consulted, so the answer is
/// never wrong; and whenever the four endpoint orientations do not separate
/// the edges, they genuinely touch and a split or intersection is due.
fn compare(g: &Graph, p: EdgeId, q: EdgeId, stats: &mut SweepStats) -> Result<Ordering, Collision> {
    stats.comparisons += 1;

    debug_assert_ne!(p, q);
    let (pe, qe) = (&g.edges[p], &g.edges[q]);
    // Two edges differing only in their winding have been combined already.
    debug_assert!(!(pe.from == qe.from && pe.to == qe.to));

    let (pf, pt) = (g.verts[pe.from].pos, g.verts[pe.to].pos);
    let (qf, qt) = (g.verts[qe.from].pos, g.verts[qe.to].pos);

    if !Span::new(pf.x, pt.x).overlaps(&Span::new(qf.x, qt.x)) {
        return Ok(pf.x.cmp(&qf.x));
    }

    // Both edges span the sweep line, so their y-ranges overlap, and exactly
    // one of them is mid-insert.
    debug_assert!(Span::new(pf.y, pt.y).overlaps(&Span::new(qf.y, qt.y)));
    debug_assert!(pe.ael_slot.is_some() || qe.ael_slot.is_some());
    // Edges ending at the current vertex are removed before inserts begin.
    debug_assert!(pe.from != qe.to && pe.to != qe.from);

    if pe.from == qe.from {
        return if geom::side_of_raw(qt, pe.raw) != 0 {
            Ok(geom::angle_cmp(qe.raw, pe.raw))
        } else if pt < qt {
            // Same top point and collinear but not identical: the shorter
            // edge's endpoint splits the longer.
            Err(Collision::split(q, p, pe.to))
        } else {
            Err(Collision::split(p, q, qe.to))
        };
    }

    if pe.to == qe.to {
        return if geom::side_of_raw(qf, pe.raw) != 0 {
            Ok(geom::angle_cmp(pe.raw, qe.raw))
        } else if pf < qf {
            Err(Collision::split(p, q, qe.from))
        } else {
            Err(Collision::split(q, p, pe.from))
        };
    }

    // The edges overlap in x and y. Looking down q from top to bottom, is p
    // entirely on one side?
    let a = geom::side_of_raw(pf, qe.raw);
    let b = geom::side_of_raw(pt, qe.raw);
    if a * b > 0 {
        return Ok(if a < 0 {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    let c = geom::side_of_raw(qf, pe.raw);
    let d = geom::side_of_raw(qt, pe.raw);
    if c * d > 0 {
        return Ok(if c > 0 {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    if a == 0 && b == 0 {
        debug_assert!(c == 0 && d == 0);
        // Collinear and overlapping: split one edge at the other's top
        // vertex now; the matching split surfaces on a later comparison.
        return Err(if pf < qf {
            Collision::split(p, q, qe.from)
        } else {
            Collision::split(q, p, pe.from)
        });
    }

    Err(Collision::intersect(p, q))
}

/// Runs the full sweep and classification over the graph.
pub(crate) fn run(graph: &mut Graph, rule: Rule) -> Result<SweepStats, Error> {
    let mut sweep = Sweep {
        graph,
        rule,
        ael: ActiveList::default(),
        todo: VecDeque::new(),
        dot: VertexId::default(),
        stats: SweepStats::default(),
    };
    sweep.run()?;
    Ok(sweep.stats)
}

struct Sweep<'g> {
    graph: &'g mut Graph,
    rule: Rule,
    ael: ActiveList,
    todo: VecDeque<EdgeId>,
    /// The vertex the sweep is currently focused on.
    dot: VertexId,
    stats: SweepStats,
}

impl Sweep<'_> {
    fn run(&mut self) -> Result<(), Error> {
        ensure!(self.ael.is_empty(), "active list must start empty");

        // New vertices are inserted mid-iteration (intersection points), but
        // always at or after the current position, so a cursor-driven range
        // scan visits them all.
        let mut cursor: Option<RatPoint> = None;
        loop {
            let next = match cursor {
                None => self.graph.vertex_set.iter().next(),
                Some(pos) => self
                    .graph
                    .vertex_set
                    .range((Bound::Excluded(pos), Bound::Unbounded))
                    .next(),
            };
            let Some((&pos, &v)) = next else {
                break;
            };
            cursor = Some(pos);
            self.dot = v;
            self.sweep_dot()?;
            self.classify()?;
        }

        ensure!(self.ael.is_empty(), "active edges left after the sweep");
        Ok(())
    }

    /// Processes one vertex: retire the edges ending here, queue the edges
    /// starting here, and drain the todo list into the active list.
    fn sweep_dot(&mut self) -> Result<(), Error> {
        ensure!(self.todo.is_empty(), "todo list must drain between vertices");

        let mut revealed = None;
        let above: Vec<EdgeId> = self.graph.verts[self.dot].above.values().copied().collect();
        for e in above {
            if let Some(slot) = self.graph.edges[e].ael_slot {
                self.ael.remove_at(self.graph, slot);
                revealed = Some(slot);
            }
        }

        // Removal may have made two surviving edges adjacent without them
        // ever having been compared. Pull one out and re-insert it so the
        // comparator gets a look at the new pair.
        if let Some(slot) = revealed {
            if slot < self.ael.len() {
                let e = self.ael.remove_at(self.graph, slot);
                if !self.graph.edges[e].flags.todo {
                    self.graph.edges[e].flags.todo = true;
                    self.todo.push_back(e);
                }
            }
        }

        let below: Vec<EdgeId> = self.graph.verts[self.dot].below.values().copied().collect();
        for e in below {
            debug_assert!(self.graph.edges[e].ael_slot.is_none());
            if !self.graph.edges[e].flags.todo {
                self.graph.edges[e].flags.todo = true;
                self.todo.push_back(e);
            }
        }

        while let Some(e) = self.todo.pop_front() {
            debug_assert!(self.graph.edges[e].flags.todo);
            self.graph.edges[e].flags.todo = false;

            // A fully cancelled edge takes no part in the sweep; it is culled
            // once classification is over.
            if self.graph.edges[e].wind.is_zero() {
                continue;
            }

            self.insert(e)?;
        }
        Ok(())
    }

    /// Attempts to activate an edge. On collision, both involved edges are
    /// withdrawn and replaced by their sub-edges, which land back on the todo
    /// list for another attempt.
    fn insert(&mut self, e: EdgeId) -> Result<(), Error> {
        if self.graph.edges[e].ael_slot.is_some() {
            return Ok(());
        }

        match self.ael.insert(self.graph, e, &mut self.stats) {
            Ok(()) => Ok(()),
            Err(col) => {
                ensure!(
                    self.graph.edges[e].ael_slot.is_none(),
                    "failed insert left the edge active"
                );
                ensure!(
                    e == col.p || e == col.q,
                    "collision must involve the inserted edge"
                );

                for x in [col.p, col.q] {
                    if let Some(slot) = self.graph.edges[x].ael_slot {
                        self.ael.remove_at(self.graph, slot);
                    }
                    self.graph.unlink(x);
                    self.graph.edges[x].flags.checked = false;
                }

                match col.kind {
                    CollisionKind::Intersect => {
                        self.intersect(col.p, col.q)?;
                        self.stats.intersections += 1;
                    }
                    CollisionKind::Split(v) => {
                        self.split(col.p, v)?;
                        self.split(col.q, v)?;
                        self.stats.splits += 1;
                    }
                }

                ensure!(
                    !self.graph.edges[col.p].flags.todo && !self.graph.edges[col.q].flags.todo,
                    "withdrawn edges must not be queued"
                );
                self.graph.free(col.p);
                self.graph.free(col.q);
                Ok(())
            }
        }
    }

    /// Intersects the raw lines of two edges, producing an exact rational
    /// vertex, and splits both edges there.
    fn intersect(&mut self, p: EdgeId, q: EdgeId) -> Result<(), Error> {
        let pr = self.graph.edges[p].raw;
        let qr = self.graph.edges[q].raw;

        let (x1, y1) = (i64::from(pr.from.x), i64::from(pr.from.y));
        let (x2, y2) = (i64::from(pr.to.x), i64::from(pr.to.y));
        let (x3, y3) = (i64::from(qr.from.x), i64::from(qr.from.y));
        let (x4, y4) = (i64::from(qr.to.x), i64::from(qr.to.y));

        let un = (x4 - x3) * (y1 - y3) - (y4 - y3) * (x1 - x3);
        let ud = (y4 - y3) * (x2 - x1) - (x4 - x3) * (y2 - y1);
        ensure!(ud != 0, "intersecting edges must not be parallel");

        let v = self.graph.find(RatPoint {
            x: Rat::with_frac(x1, (x2 - x1) * un, ud),
            y: Rat::with_frac(y1, (y2 - y1) * un, ud),
        });

        self.split(p, v)?;
        self.split(q, v)
    }

    /// Replaces a withdrawn edge with one or two sub-edges meeting at `v`,
    /// re-queueing them. If `v` is an endpoint the edge is re-created whole.
    fn split(&mut self, e: EdgeId, v: VertexId) -> Result<(), Error> {
        ensure!(
            self.graph.edges[e].ael_slot.is_none(),
            "cannot split an active edge"
        );
        ensure!(
            !self.graph.edges[e].flags.todo,
            "cannot split a queued edge"
        );

        let (from, to) = (self.graph.edges[e].from, self.graph.edges[e].to);
        let (raw, wind) = (self.graph.edges[e].raw, self.graph.edges[e].wind);

        if v == from || v == to {
            let ne = self
                .graph
                .goes_to(from, to, raw, wind, Some(e))
                .ok_or(Error::Invariant("split re-created an empty edge"))?;
            self.push(ne);
            return Ok(());
        }

        let dot_pos = self.graph.verts[self.dot].pos;
        ensure!(
            self.graph.verts[v].pos >= dot_pos,
            "split point was already swept"
        );
        ensure!(
            self.graph.verts[from].pos < self.graph.verts[v].pos
                && self.graph.verts[v].pos < self.graph.verts[to].pos,
            "split point must lie between the edge's endpoints"
        );

        let upper = self
            .graph
            .goes_to(from, v, raw, wind, Some(e))
            .ok_or(Error::Invariant("split produced an empty upper half"))?;
        self.push(upper);
        let lower = self
            .graph
            .goes_to(v, to, raw, wind, None)
            .ok_or(Error::Invariant("split produced an empty lower half"))?;
        self.push(lower);
        Ok(())
    }

    /// Queues a freshly created sub-edge, provided it still spans the current
    /// vertex. Sub-edges starting later are picked up when the sweep reaches
    /// their top vertex.
    fn push(&mut self, e: EdgeId) {
        let dot_pos = self.graph.verts[self.dot].pos;
        let edge = &self.graph.edges[e];

        if self.graph.verts[edge.to].pos <= dot_pos {
            return;
        }
        debug_assert_ne!(edge.from, edge.to);
        if edge.flags.todo {
            return;
        }
        if self.graph.verts[edge.from].pos > dot_pos {
            debug_assert!(!edge.flags.checked);
            return;
        }

        let edge = &mut self.graph.edges[e];
        edge.flags.checked = false;
        edge.flags.todo = true;
        self.todo.push_front(e);
    }

    /// Walks the active list left to right, accumulating winding and marking
    /// the edges where the rule's insideness flips.
    fn classify(&mut self) -> Result<(), Error> {
        let rule = self.rule;
        let mut wind = Wind::default();
        debug_assert!(!rule.inside(wind));

        for i in 0..self.ael.len() {
            let e = self.ael.edges[i];
            let edge = &mut self.graph.edges[e];
            debug_assert!(edge.ael_slot.is_some());

            let new_wind = wind + edge.wind;

            if edge.flags.checked {
                ensure!(
                    new_wind == edge.checked_wind,
                    "winding drifted under a checked edge"
                );
                wind = new_wind;
                continue;
            }

            // An edge is kept exactly when it separates outside from inside.
            // The sense flag records which side the inside is on, which the
            // output tracer later uses to keep holes wound opposite.
            let was_inside = rule.inside(wind);
            let is_inside = rule.inside(new_wind);
            edge.flags.keep = was_inside != is_inside;
            if edge.flags.keep {
                edge.flags.sense = is_inside;
            }
            edge.flags.checked = true;
            edge.checked_wind = new_wind;

            wind = new_wind;
        }

        ensure!(wind.is_zero(), "active list winding must close to zero");
        Ok(())
    }
}
