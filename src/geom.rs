//! Integer points, raw lines, and the exact orientation predicates.

use std::cmp::Ordering;

use serde::Serialize;

use crate::num::Rat;

/// A point on the integer grid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// A new grid point.
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// Positions are sorted by `y` and then by `x`; this is the sweep order and
// the derived `Ord` relies on the field order below.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RatPoint {
    pub y: Rat,
    pub x: Rat,
}

impl std::fmt::Debug for RatPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

impl RatPoint {
    pub fn grid(p: Point) -> Self {
        RatPoint {
            y: Rat::new(p.y.into()),
            x: Rat::new(p.x.into()),
        }
    }

    pub fn is_grid(&self) -> bool {
        self.x.is_integer() && self.y.is_integer()
    }

    /// The nearest grid position, rounding each coordinate with ties up.
    pub fn snapped(&self) -> RatPoint {
        RatPoint {
            y: Rat::new(self.y.round()),
            x: Rat::new(self.x.round()),
        }
    }

    /// The grid point at this position, which must be on the grid.
    pub fn grid_point(&self) -> Point {
        debug_assert!(self.is_grid());
        Point {
            x: self.x.int() as i32,
            y: self.y.int() as i32,
        }
    }
}

/// The raw integer segment that an edge descends from.
///
/// Splitting an edge never touches its raw line; every sub-edge keeps the
/// original's endpoints so that orientation tests run against the untruncated
/// segment and cannot accumulate error.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line {
    pub from: Point,
    pub to: Point,
}

impl std::fmt::Debug for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} -- {:?}", self.from, self.to)
    }
}

impl Line {
    pub fn new(from: Point, to: Point) -> Self {
        Line { from, to }
    }

    pub fn reversed(self) -> Line {
        Line {
            from: self.to,
            to: self.from,
        }
    }
}

/// Which side of the directed line is the grid point on?
///
/// Returns the sign of the determinant `(y0-y1)(x1-x2) - (x0-x1)(y1-y2)`,
/// computed exactly in `i64`. Collinear configurations return exactly zero;
/// the sweep depends on that.
pub(crate) fn side_of_line(v: Point, l: Line) -> i32 {
    let (x0, y0) = (i64::from(v.x), i64::from(v.y));
    let (x1, y1) = (i64::from(l.from.x), i64::from(l.from.y));
    let (x2, y2) = (i64::from(l.to.x), i64::from(l.to.y));

    let a = (y0 - y1) * (x1 - x2);
    let b = (x0 - x1) * (y1 - y2);

    (a - b).signum() as i32
}

/// Which side of the directed line is the rational point on?
///
/// The same determinant as [`side_of_line`], in [`Rat`] arithmetic. The line
/// is always an edge's raw line, so its coordinates are integers.
pub(crate) fn side_of_raw(v: RatPoint, l: Line) -> i32 {
    let (x1, y1) = (i64::from(l.from.x), i64::from(l.from.y));
    let (x2, y2) = (i64::from(l.to.x), i64::from(l.to.y));

    let a = (v.y - y1) * (x1 - x2);
    let b = (v.x - x1) * (y1 - y2);

    match a.cmp(&b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Folds a direction vector into the first quadrant by quarter turns,
/// returning the number of turns taken.
fn fold_quadrant(dx: &mut i64, dy: &mut i64) -> u32 {
    debug_assert!(*dx != 0 || *dy != 0);
    let mut n = 0;
    while !(*dx > 0 && *dy >= 0) {
        let t = -*dx;
        *dx = *dy;
        *dy = t;
        n += 1;
    }
    n
}

/// Orders two raw lines by the angle of their direction vectors, as if both
/// started at the origin: first by quadrant, then by cross-product sign.
///
/// Used to break ties between active edges that share an endpoint; the
/// intersection machinery guarantees such edges are not collinear, so the
/// result is never `Equal` for distinct directions.
pub(crate) fn angle_cmp(p: Line, q: Line) -> Ordering {
    let (mut px, mut py) = (
        i64::from(p.to.x) - i64::from(p.from.x),
        i64::from(p.to.y) - i64::from(p.from.y),
    );
    let (mut qx, mut qy) = (
        i64::from(q.to.x) - i64::from(q.from.x),
        i64::from(q.to.y) - i64::from(q.from.y),
    );

    if px == qx && py == qy {
        return Ordering::Equal;
    }

    let pq = fold_quadrant(&mut px, &mut py);
    let qq = fold_quadrant(&mut qx, &mut qy);

    if pq != qq {
        return pq.cmp(&qq);
    }

    debug_assert!(px * qy != qx * py);
    (qx * py).cmp(&(px * qy))
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn side_signs() {
        let l = Line::new(pt(0, 0), pt(10, 0));
        assert_eq!(side_of_line(pt(5, 5), l), -1);
        assert_eq!(side_of_line(pt(5, -5), l), 1);
        assert_eq!(side_of_line(pt(7, 0), l), 0);
        assert_eq!(side_of_line(pt(-3, 0), l), 0);
    }

    #[test]
    fn rational_side_agrees_on_grid_points() {
        let l = Line::new(pt(-3, -2), pt(5, 7));
        for x in -5..=5 {
            for y in -5..=5 {
                let v = pt(x, y);
                assert_eq!(side_of_line(v, l), side_of_raw(RatPoint::grid(v), l));
            }
        }
    }

    #[test]
    fn rational_side_off_grid() {
        // (1/2, 1/2) is on the diagonal and left of the vertical axis.
        let v = RatPoint {
            x: Rat::with_frac(0, 1, 2),
            y: Rat::with_frac(0, 1, 2),
        };
        assert_eq!(side_of_raw(v, Line::new(pt(0, 0), pt(4, 4))), 0);
        assert_eq!(side_of_raw(v, Line::new(pt(0, 0), pt(0, 4))), 1);
        assert_eq!(side_of_raw(v, Line::new(pt(0, 4), pt(0, 0))), -1);
    }

    #[test]
    fn angle_order_around_origin() {
        // Directions in increasing angular order, starting just right of
        // straight-right and sweeping counter-clockwise quadrant by quadrant.
        let dirs = [
            pt(5, 0),
            pt(5, 2),
            pt(1, 1),
            pt(1, 4),
            pt(0, 3),
            pt(-2, 5),
            pt(-4, 0),
            pt(-3, -3),
            pt(0, -2),
            pt(2, -2),
        ];
        for (i, a) in dirs.iter().enumerate() {
            for (j, b) in dirs.iter().enumerate() {
                let pa = Line::new(pt(0, 0), *a);
                let pb = Line::new(pt(0, 0), *b);
                assert_eq!(angle_cmp(pa, pb), i.cmp(&j), "{a:?} vs {b:?}");
            }
        }
    }

    proptest! {
        #[test]
        fn side_is_antisymmetric(
            vx in -100i32..100, vy in -100i32..100,
            ax in -100i32..100, ay in -100i32..100,
            bx in -100i32..100, by in -100i32..100,
        ) {
            prop_assume!((ax, ay) != (bx, by));
            let v = pt(vx, vy);
            let l = Line::new(pt(ax, ay), pt(bx, by));
            prop_assert_eq!(side_of_line(v, l), -side_of_line(v, l.reversed()));
            let rv = RatPoint::grid(v);
            prop_assert_eq!(side_of_raw(rv, l), -side_of_raw(rv, l.reversed()));
        }
    }
}
