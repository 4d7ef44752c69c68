#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

macro_rules! ensure {
    ($cond:expr, $msg:literal) => {
        if !$cond {
            return Err($crate::Error::Invariant($msg));
        }
    };
}
pub(crate) use ensure;

mod contour;
mod geom;
mod graph;
mod num;
mod snap;
mod sweep;

pub use contour::Polygon;
pub use geom::Point;
pub use num::Rat;

use geom::{Line, RatPoint};
use graph::{Graph, Wind};

/// The largest coordinate magnitude the flattener accepts.
///
/// 20 signed bits: the active-edge ordering computes terms cubic in the
/// coordinates, and this bound keeps the worst case inside `i64`.
pub const MAX_COORD: i32 = (1 << 19) - 1;

/// A boolean combination of the two input shapes.
///
/// Each rule is a 4-bit mask over the "which shapes am I inside" state: bit
/// `[a != 0] + 2 * [b != 0]` of the mask decides whether a point with
/// winding `(a, b)` is inside the result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Rule {
    /// Nothing; always empty.
    Empty,
    /// Shape A, ignoring B.
    A,
    /// Shape B, ignoring A.
    B,
    /// Union: inside either shape.
    AOrB,
    /// Intersection: inside both shapes.
    AAndB,
    /// Difference: inside A but not B.
    AMinusB,
    /// Difference: inside B but not A.
    BMinusA,
    /// Symmetric difference: inside exactly one shape.
    AXorB,
}

impl Rule {
    fn mask(self) -> u8 {
        match self {
            Rule::Empty => 0x0,
            Rule::A => 0xa,
            Rule::B => 0xc,
            Rule::AOrB => 0xe,
            Rule::AAndB => 0x8,
            Rule::AMinusB => 0x2,
            Rule::BMinusA => 0x4,
            Rule::AXorB => 0x6,
        }
    }

    pub(crate) fn inside(self, w: Wind) -> bool {
        let m = usize::from(w.a != 0) + 2 * usize::from(w.b != 0);
        self.mask() >> m & 1 == 1
    }
}

/// Which of the two input shapes an edge belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Shape {
    /// The first input shape.
    A,
    /// The second input shape.
    B,
}

impl Shape {
    fn wind(self) -> Wind {
        match self {
            Shape::A => Wind::new(1, 0),
            Shape::B => Wind::new(0, 1),
        }
    }
}

/// The input was faulty or an internal invariant broke.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input coordinate exceeded [`MAX_COORD`] in magnitude.
    #[error("input coordinate {0} is outside the supported range")]
    CoordinateRange(i32),
    /// An internal invariant was violated; no result is available.
    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),
}

/// A flattening session: add edges, flatten, read the result.
///
/// The session owns the whole arrangement; dropping it releases every vertex
/// and edge. Sessions are single-threaded and each call runs to completion;
/// independent sessions may run concurrently on disjoint inputs.
pub struct Flattener {
    rule: Rule,
    graph: Graph,
    pending: Option<Error>,
}

impl Flattener {
    /// An empty session configured with one of the eight combination rules.
    pub fn new(rule: Rule) -> Self {
        Flattener {
            rule,
            graph: Graph::default(),
            pending: None,
        }
    }

    /// Adds a directed edge from `(x, y)` to `(u, v)` to one of the shapes.
    ///
    /// Zero-length edges are ignored; an edge added twice counts twice
    /// (windings accumulate). A coordinate outside [`MAX_COORD`] skips the
    /// edge with a warning, and is reported by the next [`Flattener::flatten`]
    /// call rather than silently producing a corrupted result.
    pub fn add_edge(&mut self, x: i32, y: i32, u: i32, v: i32, shape: Shape) {
        for c in [x, y, u, v] {
            if c < -MAX_COORD || c > MAX_COORD {
                log::warn!("skipping edge ({x}, {y}) -> ({u}, {v}): coordinate out of range");
                self.pending.get_or_insert(Error::CoordinateRange(c));
                return;
            }
        }

        let p = self.graph.find(RatPoint::grid(Point::new(x, y)));
        let q = self.graph.find(RatPoint::grid(Point::new(u, v)));
        let raw = Line::new(Point::new(x, y), Point::new(u, v));
        self.graph.goes_to(p, q, raw, shape.wind(), None);
    }

    /// Adds a closed contour: edges between consecutive points, plus the
    /// closing edge back to the first.
    pub fn add_polygon(&mut self, points: &[(i32, i32)], shape: Shape) {
        if points.len() < 2 {
            return;
        }
        for i in 0..points.len() {
            let (x, y) = points[i];
            let (u, v) = points[(i + 1) % points.len()];
            self.add_edge(x, y, u, v, shape);
        }
    }

    /// Runs the sweep, classification, cull, fold and snap-round phases.
    ///
    /// On error the session holds no usable result, but remains safe to
    /// drop.
    pub fn flatten(&mut self) -> Result<(), Error> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }

        let stats = sweep::run(&mut self.graph, self.rule)?;
        log::debug!(
            "sweep: {} comparisons, {} intersections, {} splits",
            stats.comparisons,
            stats.intersections,
            stats.splits,
        );

        self.graph.cull();
        self.graph.fold_all();
        snap::snap_round(&mut self.graph)
    }

    /// Drains the flattened graph into an ordered list of closed polygons.
    ///
    /// Outer boundaries and holes are wound in opposite orientations.
    pub fn result(&mut self) -> Result<Vec<Polygon>, Error> {
        contour::extract(&mut self.graph)
    }
}

/// One-shot convenience: combines two shapes, each a list of closed
/// contours, under the given rule.
pub fn boolean_op(
    shape_a: &[Vec<(i32, i32)>],
    shape_b: &[Vec<(i32, i32)>],
    rule: Rule,
) -> Result<Vec<Polygon>, Error> {
    let mut flattener = Flattener::new(rule);
    for contour in shape_a {
        flattener.add_polygon(contour, Shape::A);
    }
    for contour in shape_b {
        flattener.add_polygon(contour, Shape::B);
    }
    flattener.flatten()?;
    flattener.result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_squares_intersection() {
        let a = vec![vec![(0, 0), (20, 0), (20, 20), (0, 20)]];
        let b = vec![vec![(10, 10), (30, 10), (30, 30), (10, 30)]];
        let out = boolean_op(&a, &b, Rule::AAndB).unwrap();

        assert_eq!(out.len(), 1);
        let mut points = out[0].clone();
        points.sort();
        assert_eq!(
            points,
            vec![
                Point::new(10, 10),
                Point::new(10, 20),
                Point::new(20, 10),
                Point::new(20, 20),
            ]
        );
    }

    #[test]
    fn out_of_range_coordinates_are_reported() {
        let mut flattener = Flattener::new(Rule::A);
        flattener.add_edge(0, 0, MAX_COORD + 1, 10, Shape::A);
        assert!(matches!(
            flattener.flatten(),
            Err(Error::CoordinateRange(_))
        ));
    }

    #[test]
    fn empty_rule_empty_result() {
        let a = vec![vec![(0, 0), (10, 0), (10, 10), (0, 10)]];
        let out = boolean_op(&a, &[], Rule::Empty).unwrap();
        assert!(out.is_empty());
    }
}
