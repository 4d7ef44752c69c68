//! The arrangement graph: vertices, edges, and the maps that tie them
//! together.
//!
//! Vertices and edges live in generational arenas and refer to each other by
//! id, so the above/below back-references form no ownership cycles and a
//! stale id is a loud failure instead of silent aliasing. Each vertex keeps
//! two maps keyed by neighbouring vertex: `above` holds the edges arriving
//! from earlier in sweep order, `below` the edges leaving towards later. An
//! edge between an ordered pair of vertices is unique; adding a duplicate
//! folds its winding contribution into the existing edge.

use std::collections::BTreeMap;

use slotmap::SlotMap;

use crate::geom::{Line, RatPoint};

slotmap::new_key_type! {
    /// Identifier of a vertex in the graph arena.
    pub(crate) struct VertexId;

    /// Identifier of an edge in the graph arena.
    pub(crate) struct EdgeId;
}

/// Winding counts, one per input shape.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Wind {
    pub a: i16,
    pub b: i16,
}

impl std::fmt::Debug for Wind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}a + {}b", self.a, self.b)
    }
}

impl Wind {
    pub fn new(a: i16, b: i16) -> Self {
        Wind { a, b }
    }

    pub fn is_zero(&self) -> bool {
        self.a == 0 && self.b == 0
    }

    /// The unit winding of a snap-rounded edge: the classified shape only,
    /// signed by the edge's sense.
    pub fn unit(sense: bool) -> Self {
        Wind {
            a: if sense { -1 } else { 1 },
            b: 0,
        }
    }
}

impl std::ops::Add for Wind {
    type Output = Wind;

    fn add(self, other: Wind) -> Wind {
        Wind {
            a: self.a + other.a,
            b: self.b + other.b,
        }
    }
}

impl std::ops::Neg for Wind {
    type Output = Wind;

    fn neg(self) -> Wind {
        Wind {
            a: -self.a,
            b: -self.b,
        }
    }
}

/// Classification state carried on every edge.
#[derive(Clone, Copy, Default)]
pub(crate) struct Flags {
    /// The edge appears in the result set.
    pub keep: bool,
    /// The classifier has already decided `keep` for this edge.
    pub checked: bool,
    /// Which side of the edge is inside the result.
    pub sense: bool,
    /// The edge has an entry on the sweep's todo list.
    pub todo: bool,
}

/// An integer vertex that a snap-rounded edge must route through.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pin {
    pub v: VertexId,
    /// Which side of the snapped line the displaced geometry lies on.
    pub above: bool,
}

/// Pins keyed by squared grid distance from the edge's `from` vertex.
///
/// Two pins at the same distance collapse to whichever was recorded first.
pub(crate) type PinSet = BTreeMap<i64, Pin>;

pub(crate) struct Vertex {
    pub pos: RatPoint,
    /// Neighbours earlier in sweep order, with the connecting edge.
    pub above: BTreeMap<VertexId, EdgeId>,
    /// Neighbours later in sweep order, with the connecting edge.
    pub below: BTreeMap<VertexId, EdgeId>,
}

pub(crate) struct Edge {
    /// The untruncated input segment this edge descends from, oriented to
    /// match `from -> to`.
    pub raw: Line,
    pub from: VertexId,
    pub to: VertexId,
    pub wind: Wind,
    /// The accumulated winding the classifier saw on top of this edge.
    pub checked_wind: Wind,
    pub flags: Flags,
    /// Position in the active edge list; `None` while inactive. This doubles
    /// as the `active` flag, so the two cannot fall out of sync.
    pub ael_slot: Option<usize>,
    pub pins: Option<PinSet>,
}

impl Edge {
    fn new(raw: Line, from: VertexId, to: VertexId) -> Self {
        Edge {
            raw,
            from,
            to,
            wind: Wind::default(),
            checked_wind: Wind::default(),
            flags: Flags::default(),
            ael_slot: None,
            pins: None,
        }
    }
}

/// The whole arrangement, rooted at the session.
///
/// `vertex_set` holds every vertex of the primary arrangement in sweep order
/// (`y`, then `x`, ascending); `snap_set` is the secondary collection used
/// during snap rounding. Both index into the same arenas.
#[derive(Default)]
pub(crate) struct Graph {
    pub verts: SlotMap<VertexId, Vertex>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub vertex_set: BTreeMap<RatPoint, VertexId>,
    pub snap_set: BTreeMap<RatPoint, VertexId>,
}

impl Graph {
    /// The vertex at `pos` in the primary set, creating it if new.
    pub fn find(&mut self, pos: RatPoint) -> VertexId {
        let verts = &mut self.verts;
        *self.vertex_set.entry(pos).or_insert_with(|| {
            verts.insert(Vertex {
                pos,
                above: BTreeMap::new(),
                below: BTreeMap::new(),
            })
        })
    }

    /// The vertex at `pos` in the snap set, creating it if new.
    pub fn snap_find(&mut self, pos: RatPoint) -> VertexId {
        let verts = &mut self.verts;
        *self.snap_set.entry(pos).or_insert_with(|| {
            verts.insert(Vertex {
                pos,
                above: BTreeMap::new(),
                below: BTreeMap::new(),
            })
        })
    }

    /// Ensures a single edge exists between `p` and `q` and folds `wind` into
    /// it. Returns `None` when `p == q`.
    ///
    /// The endpoints are put in sweep order; if that reverses them, the
    /// winding is negated and the raw segment flipped to match. When `state`
    /// is given (the call is producing a sub-edge by splitting that edge),
    /// its classification flags are inherited, with `sense` flipped by the
    /// swap.
    pub fn goes_to(
        &mut self,
        p: VertexId,
        q: VertexId,
        raw: Line,
        wind: Wind,
        state: Option<EdgeId>,
    ) -> Option<EdgeId> {
        if p == q {
            return None;
        }

        let (from, to, raw, wind, flip) = if self.verts[q].pos < self.verts[p].pos {
            (q, p, raw.reversed(), -wind, true)
        } else {
            (p, q, raw, wind, false)
        };
        debug_assert!(self.verts[from].pos < self.verts[to].pos);

        let e = match self.verts[from].below.get(&to) {
            Some(&e) => e,
            None => {
                let e = self.edges.insert(Edge::new(raw, from, to));
                self.verts[from].below.insert(to, e);
                self.verts[to].above.insert(from, e);
                e
            }
        };

        let inherited = state.map(|s| self.edges[s].flags);
        let edge = &mut self.edges[e];
        edge.wind = edge.wind + wind;
        if let Some(f) = inherited {
            edge.flags.checked = f.checked;
            edge.flags.sense = f.sense ^ flip;
            edge.flags.keep = f.keep;
        }

        Some(e)
    }

    /// Removes an edge from the maps that reference it, leaving the arena
    /// entry alive.
    pub fn unlink(&mut self, e: EdgeId) {
        let (from, to) = (self.edges[e].from, self.edges[e].to);
        let removed = self.verts[from].below.remove(&to);
        debug_assert_eq!(removed, Some(e));
        let removed = self.verts[to].above.remove(&from);
        debug_assert_eq!(removed, Some(e));
    }

    /// Frees an already-unlinked edge.
    pub fn free(&mut self, e: EdgeId) {
        debug_assert!(self.edges[e].ael_slot.is_none());
        debug_assert!(!self.edges[e].flags.todo);
        self.edges.remove(e);
    }

    /// Removes an edge completely.
    pub fn remove(&mut self, e: EdgeId) {
        self.unlink(e);
        self.free(e);
    }

    /// The number of edges still in the primary set.
    pub fn edge_count(&self) -> usize {
        self.vertex_set
            .values()
            .map(|&v| self.verts[v].below.len())
            .sum()
    }

    /// Deletes every edge the classifier did not keep.
    pub fn cull(&mut self) {
        let verts: Vec<VertexId> = self.vertex_set.values().copied().collect();
        for v in verts {
            let below: Vec<EdgeId> = self.verts[v].below.values().copied().collect();
            for e in below {
                if !self.edges[e].flags.keep {
                    self.remove(e);
                }
            }
        }
    }

    /// Coalesces runs of collinear sub-edges left behind by splits at
    /// vertices that did not make it into the output.
    pub fn fold_all(&mut self) {
        let verts: Vec<VertexId> = self.vertex_set.values().copied().collect();
        for v in verts {
            self.fold(v);
        }
    }

    /// Folds a vertex that only has a single edge passing through it. The
    /// two halves must descend from the same raw segment with the same
    /// sense; sub-edges of different input edges keep their provenance for
    /// snap rounding.
    fn fold(&mut self, v: VertexId) {
        if self.verts[v].above.len() != 1 || self.verts[v].below.len() != 1 {
            return;
        }
        let (Some(&a), Some(&b)) = (
            self.verts[v].above.values().next(),
            self.verts[v].below.values().next(),
        ) else {
            return;
        };

        if self.edges[a].raw == self.edges[b].raw
            && self.edges[a].flags.sense == self.edges[b].flags.sense
        {
            let (from, to) = (self.edges[a].from, self.edges[b].to);
            let (raw, wind) = (self.edges[a].raw, self.edges[a].wind);
            self.goes_to(from, to, raw, wind, Some(a));
            self.remove(a);
            self.remove(b);
        }
    }

    /// Checks the double-link invariant over both vertex collections.
    #[cfg(test)]
    pub fn check_links(&self) {
        for (_, v) in self.vertex_set.iter().chain(self.snap_set.iter()) {
            for (&to, &e) in &self.verts[*v].below {
                assert_eq!(self.edges[e].from, *v);
                assert_eq!(self.edges[e].to, to);
                assert_eq!(self.verts[to].above.get(v), Some(&e));
            }
            for (&from, &e) in &self.verts[*v].above {
                assert_eq!(self.edges[e].to, *v);
                assert_eq!(self.edges[e].from, from);
                assert_eq!(self.verts[from].below.get(v), Some(&e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::geom::Point;

    fn grid(g: &mut Graph, x: i32, y: i32) -> VertexId {
        g.find(RatPoint::grid(Point::new(x, y)))
    }

    #[test]
    fn duplicate_edges_fold_their_winding() {
        let mut g = Graph::default();
        let p = grid(&mut g, 0, 0);
        let q = grid(&mut g, 5, 5);
        let raw = Line::new(Point::new(0, 0), Point::new(5, 5));

        let e1 = g.goes_to(p, q, raw, Wind::new(1, 0), None).unwrap();
        // Same pair added backwards: endpoints swap and the winding negates.
        let e2 = g
            .goes_to(q, p, raw.reversed(), Wind::new(0, 1), None)
            .unwrap();

        assert_eq!(e1, e2);
        assert_eq!(g.edges[e1].wind, Wind::new(1, -1));
        assert_eq!(g.edges[e1].from, p);
        g.check_links();
    }

    #[test]
    fn zero_length_edges_are_noops() {
        let mut g = Graph::default();
        let p = grid(&mut g, 3, 3);
        let raw = Line::new(Point::new(3, 3), Point::new(3, 3));
        assert_eq!(g.goes_to(p, p, raw, Wind::new(1, 0), None), None);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn vertices_deduplicate_by_position() {
        let mut g = Graph::default();
        let p = grid(&mut g, 1, 2);
        let q = grid(&mut g, 1, 2);
        assert_eq!(p, q);
        // The snap set is a separate collection: the same position yields a
        // distinct vertex there.
        let s = g.snap_find(RatPoint::grid(Point::new(1, 2)));
        assert_ne!(p, s);
    }

    #[test]
    fn fold_merges_split_halves() {
        let mut g = Graph::default();
        let p = grid(&mut g, 0, 0);
        let m = grid(&mut g, 2, 2);
        let q = grid(&mut g, 4, 4);
        let raw = Line::new(Point::new(0, 0), Point::new(4, 4));

        let a = g.goes_to(p, m, raw, Wind::new(1, 0), None).unwrap();
        g.edges[a].flags.keep = true;
        g.goes_to(m, q, raw, Wind::new(1, 0), Some(a)).unwrap();

        g.fold_all();
        g.check_links();
        assert_eq!(g.edge_count(), 1);
        let e = *g.verts[p].below.get(&q).unwrap();
        assert_eq!(g.edges[e].wind, Wind::new(1, 0));
    }

    #[test]
    fn fold_respects_raw_provenance() {
        let mut g = Graph::default();
        let p = grid(&mut g, 0, 0);
        let m = grid(&mut g, 2, 2);
        let q = grid(&mut g, 4, 4);

        // Collinear, but from two different input segments: no fold.
        g.goes_to(
            p,
            m,
            Line::new(Point::new(0, 0), Point::new(2, 2)),
            Wind::new(1, 0),
            None,
        );
        g.goes_to(
            m,
            q,
            Line::new(Point::new(2, 2), Point::new(4, 4)),
            Wind::new(1, 0),
            None,
        );

        g.fold_all();
        assert_eq!(g.edge_count(), 2);
    }
}
