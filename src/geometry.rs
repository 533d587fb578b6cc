//! Geometry kernel.
//!
//! Leaf layer: points, rectangles, polygons, segment intersection, turn
//! direction, bounding boxes. Numerical robustness is this layer's
//! responsibility — higher layers are free to treat exact coordinate
//! equality as "collinear".

use derive_more::{Add, Sub};

/// Absolute tolerance used by [`point_on_line`] and friends unless the
/// caller supplies their own.
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// A route delivered across the router's public API (spec §6 `route`,
/// `displayRoute`): an ordered sequence of points, no implied closure.
pub type PolyLine = Vec<Point>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Add, Sub)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Manhattan (L1) distance, used for orthogonal routing costs.
    pub fn manhattan_distance(&self, other: &Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn scale(&self, f: f64) -> Point {
        Point::new(self.x * f, self.y * f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Corners and centers of an axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn from_corners(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        let max_x = a.x.max(b.x);
        let max_y = a.y.max(b.y);
        Self::new(Point::new(min_x, min_y), Size::new(max_x - min_x, max_y - min_y))
    }

    #[inline]
    pub fn origin(&self) -> &Point {
        &self.origin
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.origin.x
    }
    #[inline]
    pub fn min_y(&self) -> f64 {
        self.origin.y
    }
    #[inline]
    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }
    #[inline]
    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }
    #[inline]
    pub fn mid_x(&self) -> f64 {
        self.origin.x + self.size.width / 2.0
    }
    #[inline]
    pub fn mid_y(&self) -> f64 {
        self.origin.y + self.size.height / 2.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.mid_x(), self.mid_y())
    }

    /// Corner points in clockwise order starting at the top-left, matching
    /// the shape-corner vertex numbering convention of §3 (vn 0..3).
    pub fn corners_clockwise(&self) -> [Point; 4] {
        [
            Point::new(self.min_x(), self.min_y()),
            Point::new(self.max_x(), self.min_y()),
            Point::new(self.max_x(), self.max_y()),
            Point::new(self.min_x(), self.max_y()),
        ]
    }

    /// Returns a rectangle grown (`d` negative) or shrunk (`d` positive) by
    /// `d` on every side, keeping the same center.
    pub fn inset_by(&self, dx: f64, dy: f64) -> Self {
        let origin = Point::new(self.origin.x + dx, self.origin.y + dy);
        let size = Size::new(
            (self.size.width - dx * 2.0).max(0.0),
            (self.size.height - dy * 2.0).max(0.0),
        );
        Self::new(origin, size)
    }

    pub fn contains_point(&self, p: &Point, include_edge: bool) -> bool {
        let (min_x, max_x, min_y, max_y) = (self.min_x(), self.max_x(), self.min_y(), self.max_y());
        if p.x > min_x && p.x < max_x && p.y > min_y && p.y < max_y {
            return true;
        }
        include_edge
            && p.x >= min_x
            && p.x <= max_x
            && p.y >= min_y
            && p.y <= max_y
            && (p.x == min_x || p.x == max_x || p.y == min_y || p.y == max_y)
    }

    pub fn intersects_rect(&self, other: &Rect) -> bool {
        self.min_x() < other.max_x()
            && self.max_x() > other.min_x()
            && self.min_y() < other.max_y()
            && self.max_y() > other.min_y()
    }

    /// Whether the open segment `a`-`b` crosses this rectangle's boundary
    /// or interior.
    pub fn intersects_line(&self, a: &Point, b: &Point) -> bool {
        if self.contains_point(a, true) || self.contains_point(b, true) {
            return true;
        }
        let corners = self.corners_clockwise();
        for i in 0..4 {
            let c = corners[i];
            let d = corners[(i + 1) % 4];
            if let Intersection::Point(_) = segment_intersection(a, b, &c, &d) {
                return true;
            }
        }
        false
    }

    /// Bounding rectangle of a set of points.
    pub fn bounding(points: &[Point]) -> Option<Rect> {
        let mut iter = points.iter();
        let first = iter.next()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Some(Rect::new(Point::new(min_x, min_y), Size::new(max_x - min_x, max_y - min_y)))
    }
}

/// A closed polygon, vertices ordered clockwise (screen coordinates, y down).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn rectangle(rect: &Rect) -> Self {
        Self::new(rect.corners_clockwise().to_vec())
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Next vertex index in cyclic order.
    pub fn next_index(&self, i: usize) -> usize {
        (i + 1) % self.points.len()
    }

    /// Previous vertex index in cyclic order.
    pub fn prev_index(&self, i: usize) -> usize {
        (i + self.points.len() - 1) % self.points.len()
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(&self.points)
    }

    /// Twice the signed area (shoelace); negative for clockwise polygons in
    /// a y-down coordinate system, matching this crate's convention.
    pub fn signed_area2(&self) -> f64 {
        let n = self.points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum
    }

    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3 || self.signed_area2().abs() < DEFAULT_TOLERANCE
    }

    /// Whether the open segment `a`-`b` crosses the polygon's closed
    /// interior. Used by the visibility builders (spec §4.4) to test
    /// line-of-sight between shape corners.
    pub fn segment_crosses_interior(&self, a: &Point, b: &Point, tol: f64) -> bool {
        if self.contains_point_strict(a) || self.contains_point_strict(b) {
            return true;
        }
        let n = self.points.len();
        for i in 0..n {
            let c = self.points[i];
            let d = self.points[(i + 1) % n];
            if let Intersection::Point(p) = segment_intersection(a, b, &c, &d) {
                if point_on_line(a, b, &p, tol) {
                    return true;
                }
            }
        }
        // No boundary crossing found; fall back to midpoint containment for
        // segments that pass fully through the polygon without touching an
        // edge (can't happen for convex shapes, but cluster polygons may be
        // non-convex).
        let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
        self.contains_point_strict(&mid)
    }

    /// Even-odd rule point-in-polygon test (strict interior, excludes
    /// boundary).
    pub fn contains_point_strict(&self, p: &Point) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > p.y) != (pj.y > p.y) {
                let x_intersect = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
                if p.x < x_intersect {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    Disjoint,
    Point(Point),
    Collinear,
}

/// Sign of the cross product `(b-a) x (c-b)`: turn direction at `b` when
/// walking `a -> b -> c`. Positive is a clockwise turn in this crate's
/// y-down convention, negative counter-clockwise, zero collinear.
pub fn turn(a: &Point, b: &Point, c: &Point) -> i32 {
    let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
    if cross.abs() < DEFAULT_TOLERANCE {
        0
    } else if cross > 0.0 {
        1
    } else {
        -1
    }
}

/// Whether `c` lies on segment `a`-`b` within `tol`, tolerating minor
/// non-collinearity per the geometry kernel's robustness contract (§4.1).
pub fn point_on_line(a: &Point, b: &Point, c: &Point, tol: f64) -> bool {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    let len = a.distance(b).max(1e-12);
    if (cross / len).abs() > tol {
        return false;
    }
    let dot = (c.x - a.x) * (b.x - a.x) + (c.y - a.y) * (b.y - a.y);
    let len2 = len * len;
    dot >= -tol && dot <= len2 + tol
}

/// Classify the intersection of open segments `p1-p2` and `p3-p4`.
pub fn segment_intersection(p1: &Point, p2: &Point, p3: &Point, p4: &Point) -> Intersection {
    let d1 = turn(p3, p4, p1);
    let d2 = turn(p3, p4, p2);
    let d3 = turn(p1, p2, p3);
    let d4 = turn(p1, p2, p4);

    if d1 == 0 && d2 == 0 && d3 == 0 && d4 == 0 {
        return if segments_collinear_overlap(p1, p2, p3, p4) {
            Intersection::Collinear
        } else {
            Intersection::Disjoint
        };
    }

    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0)) && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0)) {
        return Intersection::Point(line_line_point(p1, p2, p3, p4));
    }

    // Endpoint touching another segment (T-junctions), still "at a point".
    if d1 == 0 && point_on_line(p3, p4, p1, DEFAULT_TOLERANCE) {
        return Intersection::Point(*p1);
    }
    if d2 == 0 && point_on_line(p3, p4, p2, DEFAULT_TOLERANCE) {
        return Intersection::Point(*p2);
    }
    if d3 == 0 && point_on_line(p1, p2, p3, DEFAULT_TOLERANCE) {
        return Intersection::Point(*p3);
    }
    if d4 == 0 && point_on_line(p1, p2, p4, DEFAULT_TOLERANCE) {
        return Intersection::Point(*p4);
    }

    Intersection::Disjoint
}

fn segments_collinear_overlap(p1: &Point, p2: &Point, p3: &Point, p4: &Point) -> bool {
    // Project onto whichever axis has the larger extent for numerical safety.
    let dx = (p2.x - p1.x).abs();
    let dy = (p2.y - p1.y).abs();
    if dx >= dy {
        overlap_1d(p1.x.min(p2.x), p1.x.max(p2.x), p3.x.min(p4.x), p3.x.max(p4.x))
    } else {
        overlap_1d(p1.y.min(p2.y), p1.y.max(p2.y), p3.y.min(p4.y), p3.y.max(p4.y))
    }
}

fn overlap_1d(a_lo: f64, a_hi: f64, b_lo: f64, b_hi: f64) -> bool {
    a_lo < b_hi - DEFAULT_TOLERANCE && b_lo < a_hi - DEFAULT_TOLERANCE
}

fn line_line_point(p1: &Point, p2: &Point, p3: &Point, p4: &Point) -> Point {
    let denom = (p1.x - p2.x) * (p3.y - p4.y) - (p1.y - p2.y) * (p3.x - p4.x);
    let t = ((p1.x - p3.x) * (p3.y - p4.y) - (p1.y - p3.y) * (p3.x - p4.x)) / denom;
    Point::new(p1.x + t * (p2.x - p1.x), p1.y + t * (p2.y - p1.y))
}

/// Graham-scan convex hull. Returns points in clockwise order.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let pivot_idx = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.y.partial_cmp(&b.y).unwrap().then(a.x.partial_cmp(&b.x).unwrap()))
        .map(|(i, _)| i)
        .unwrap();
    let pivot = points[pivot_idx];

    let mut rest: Vec<Point> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != pivot_idx)
        .map(|(_, p)| *p)
        .collect();

    rest.sort_by(|a, b| {
        let ang_a = (a.y - pivot.y).atan2(a.x - pivot.x);
        let ang_b = (b.y - pivot.y).atan2(b.x - pivot.x);
        ang_a
            .partial_cmp(&ang_b)
            .unwrap()
            .then(pivot.distance(a).partial_cmp(&pivot.distance(b)).unwrap())
    });

    let mut hull: Vec<Point> = vec![pivot];
    for p in rest {
        while hull.len() >= 2 && turn(&hull[hull.len() - 2], &hull[hull.len() - 1], &p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull
}

/// Compass direction a connection pin or visibility edge may run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

/// A bitmask over the four [`Direction`]s, used for pin connectivity and
/// visibility-edge direction restriction (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionMask(u8);

impl DirectionMask {
    pub const NONE: DirectionMask = DirectionMask(0);
    pub const ALL: DirectionMask = DirectionMask(0b1111);

    pub fn single(d: Direction) -> Self {
        let mut m = Self::NONE;
        m.set(d);
        m
    }

    fn bit(d: Direction) -> u8 {
        match d {
            Direction::Up => 0b0001,
            Direction::Down => 0b0010,
            Direction::Left => 0b0100,
            Direction::Right => 0b1000,
        }
    }

    pub fn set(&mut self, d: Direction) {
        self.0 |= Self::bit(d);
    }

    pub fn allows(&self, d: Direction) -> bool {
        self.0 & Self::bit(d) != 0
    }

    pub fn union(self, other: DirectionMask) -> DirectionMask {
        DirectionMask(self.0 | other.0)
    }
}

/// Orthogonal axis, used throughout the orthogonal visibility builder and
/// the nudging engine's per-dimension passes (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    X,
    Y,
}

impl Dimension {
    pub fn other(self) -> Dimension {
        match self {
            Dimension::X => Dimension::Y,
            Dimension::Y => Dimension::X,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(-1.0, -1.0);
        let b = Point::new(1.0, 1.0);
        assert!((a.distance(&b) - 2.8284271247461903).abs() < 1e-9);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn rect_inset_by() {
        let r = Rect::new(Point::new(10.0, 20.0), Size::new(50.0, 50.0));
        assert_eq!(r.inset_by(0.0, 0.0), r);
        assert_eq!(
            r.inset_by(5.0, -10.0),
            Rect::new(Point::new(15.0, 10.0), Size::new(40.0, 70.0))
        );
    }

    #[test]
    fn rect_contains_point() {
        let r = Rect::new(Point::new(10.0, 20.0), Size::new(50.0, 50.0));
        assert!(r.contains_point(r.origin(), true));
        assert!(!r.contains_point(r.origin(), false));
    }

    #[test]
    fn turn_sign() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        let c_left = Point::new(1.0, -1.0);
        let c_right = Point::new(1.0, 1.0);
        let c_straight = Point::new(2.0, 0.0);
        assert_eq!(turn(&a, &b, &c_straight), 0);
        assert_ne!(turn(&a, &b, &c_left), turn(&a, &b, &c_right));
    }

    #[test]
    fn segment_intersection_crossing() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 10.0);
        let c = Point::new(0.0, 10.0);
        let d = Point::new(10.0, 0.0);
        match segment_intersection(&a, &b, &c, &d) {
            Intersection::Point(p) => {
                assert!((p.x - 5.0).abs() < 1e-9);
                assert!((p.y - 5.0).abs() < 1e-9);
            }
            other => panic!("expected a point intersection, got {other:?}"),
        }
    }

    #[test]
    fn segment_intersection_disjoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        let c = Point::new(0.0, 5.0);
        let d = Point::new(1.0, 5.0);
        assert_eq!(segment_intersection(&a, &b, &c, &d), Intersection::Disjoint);
    }

    #[test]
    fn polygon_segment_crosses_interior() {
        let rect = Rect::new(Point::new(100.0, 100.0), Size::new(100.0, 100.0));
        let poly = Polygon::rectangle(&rect);
        assert!(poly.segment_crosses_interior(
            &Point::new(90.0, 150.0),
            &Point::new(210.0, 150.0),
            DEFAULT_TOLERANCE
        ));
        assert!(!poly.segment_crosses_interior(&Point::new(0.0, 0.0), &Point::new(50.0, 0.0), DEFAULT_TOLERANCE));
    }

    #[test]
    fn convex_hull_square() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(5.0, 5.0), // interior point, must be excluded
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
    }

    #[test]
    fn direction_mask() {
        let mut m = DirectionMask::NONE;
        assert!(!m.allows(Direction::Up));
        m.set(Direction::Up);
        assert!(m.allows(Direction::Up));
        assert!(!m.allows(Direction::Down));
        assert!(DirectionMask::ALL.allows(Direction::Left));
    }
}
