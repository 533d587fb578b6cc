//! Crossing analyser (spec §4.7): classifies pairs of routed segments as
//! disjoint, properly crossing, or sharing a sub-path; splits segments at
//! branch points so every intersection lands on a vertex
//! (`splitBranchingSegments`); and exposes a small per-corner partial-order
//! DAG with cycle-breaking used by the nudging engine's ordering pass.
//!
//! Grounded on `geometry.rs`'s segment-intersection classification for the
//! pairwise test; the DAG's cycle-breaking-by-edge-reversal idiom is
//! generalized from the teacher's `algorithm/low_link.rs`
//! articulation-point handling (there it removes a vertex to break a
//! cycle; here it reverses an edge instead, since an ordering constraint
//! can be satisfied either direction).

use crate::geometry::{point_on_line, segment_intersection, Dimension, Intersection, Point, DEFAULT_TOLERANCE};
use crate::ids::{ConnectorId, VertexNumber};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossing {
    Disjoint,
    /// A genuine transversal crossing at the given point.
    Proper(Point),
    /// The two segments overlap along a collinear sub-path.
    SharedSubpath,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutedSegment {
    pub connector: ConnectorId,
    pub a: Point,
    pub b: Point,
}

impl RoutedSegment {
    pub fn new(connector: ConnectorId, a: Point, b: Point) -> Self {
        Self { connector, a, b }
    }
}

pub fn classify(s: &RoutedSegment, t: &RoutedSegment) -> Crossing {
    match segment_intersection(&s.a, &s.b, &t.a, &t.b) {
        Intersection::Disjoint => Crossing::Disjoint,
        Intersection::Point(p) => Crossing::Proper(p),
        Intersection::Collinear => Crossing::SharedSubpath,
    }
}

/// Number of proper crossings between segments belonging to different
/// connectors (spec §8 `existsOrthogonalCrossings`).
pub fn count_proper_crossings(segments: &[RoutedSegment]) -> usize {
    let mut count = 0;
    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            if segments[i].connector == segments[j].connector {
                continue;
            }
            if matches!(classify(&segments[i], &segments[j]), Crossing::Proper(_)) {
                count += 1;
            }
        }
    }
    count
}

/// Splits every segment at any other segment's endpoint that lands
/// strictly inside it (a T-junction), so every intersection in the result
/// set is a shared endpoint rather than a mid-segment touch (spec §4.7
/// `splitBranchingSegments`).
pub fn split_branching_segments(segments: &[RoutedSegment]) -> Vec<RoutedSegment> {
    let mut endpoints: Vec<Point> = Vec::with_capacity(segments.len() * 2);
    for s in segments {
        endpoints.push(s.a);
        endpoints.push(s.b);
    }

    let mut out = Vec::with_capacity(segments.len());
    for s in segments {
        let mut cuts: Vec<Point> = vec![s.a, s.b];
        for &p in &endpoints {
            if (p.x - s.a.x).abs() < 1e-9 && (p.y - s.a.y).abs() < 1e-9 {
                continue;
            }
            if (p.x - s.b.x).abs() < 1e-9 && (p.y - s.b.y).abs() < 1e-9 {
                continue;
            }
            if point_on_line(&s.a, &s.b, &p, DEFAULT_TOLERANCE) {
                cuts.push(p);
            }
        }
        cuts.sort_by(|a, b| {
            let da = s.a.distance(a);
            let db = s.a.distance(b);
            da.partial_cmp(&db).unwrap()
        });
        cuts.dedup_by(|a, b| (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9);
        for w in cuts.windows(2) {
            out.push(RoutedSegment::new(s.connector, w[0], w[1]));
        }
    }
    out
}

/// Fallback for a new intersection point whose two neighbouring vertex
/// numbers are both unassigned (spec §9 open question): logs a warning and
/// returns `VertexNumber::Unassigned` rather than treating it as fatal.
pub fn mid_vertex_number(low: VertexNumber, high: VertexNumber) -> VertexNumber {
    match (low, high) {
        (VertexNumber::Unassigned, VertexNumber::Unassigned) => {
            log::warn!("midVertexNumber: both neighbouring vertex numbers are unassigned");
            VertexNumber::Unassigned
        }
        (VertexNumber::Unassigned, other) => other,
        (other, VertexNumber::Unassigned) => other,
        (low, _high) => low,
    }
}

/// A per-corner partial order over nudging shift segments (spec §4.7/§4.8
/// ordering), represented as a DAG with cycle-breaking by edge reversal:
/// adding `u before v` when `v` can already reach `u` would create a
/// cycle, so the edge is added reversed instead and recorded as
/// `swapped`.
#[derive(Debug, Default)]
pub struct PartialOrderDag {
    edges: HashMap<usize, Vec<usize>>,
    swapped: HashSet<(usize, usize)>,
}

impl PartialOrderDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the constraint "`u` before `v`".
    pub fn add_order(&mut self, u: usize, v: usize) {
        if u == v {
            return;
        }
        if self.can_reach(v, u) {
            self.edges.entry(v).or_default().push(u);
            self.swapped.insert((u, v));
        } else {
            self.edges.entry(u).or_default().push(v);
        }
    }

    pub fn is_swapped(&self, u: usize, v: usize) -> bool {
        self.swapped.contains(&(u, v))
    }

    fn can_reach(&self, from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(n) = stack.pop() {
            if n == to {
                return true;
            }
            if !seen.insert(n) {
                continue;
            }
            if let Some(next) = self.edges.get(&n) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    /// A topological order over `nodes` consistent with every recorded
    /// constraint (DFS postorder, reversed).
    pub fn topological_order(&self, nodes: &[usize]) -> Vec<usize> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        for &n in nodes {
            self.visit(n, &mut visited, &mut order);
        }
        order.reverse();
        order
    }

    fn visit(&self, n: usize, visited: &mut HashSet<usize>, order: &mut Vec<usize>) {
        if !visited.insert(n) {
            return;
        }
        if let Some(next) = self.edges.get(&n) {
            for &m in next {
                self.visit(m, visited, order);
            }
        }
        order.push(n);
    }
}

/// Local route geometry around a shared shift segment, enough to run the
/// §4.7 divergence rule without coupling this module to the nudging
/// engine's own `NudgingShiftSegment`/`OrthogonalRoute` types: the
/// segment's own endpoints (`low`, `high`) plus, if present, the route
/// points immediately outside them — the "intermediate corner" spec §4.7
/// walks forward to when determining which side a route diverges to.
#[derive(Debug, Clone, Copy)]
pub struct DivergenceContext {
    pub low: Point,
    pub high: Point,
    pub before_low: Option<Point>,
    pub after_high: Option<Point>,
}

/// The side a route diverges to immediately beyond a shared shift segment,
/// along `dim` (spec §4.7: "the side of the diverging endpoint"). `-1`
/// means the route bends toward the lower side of `dim`, `+1` the higher
/// side, `0` means no divergence could be determined (the segment sits at
/// a route end with nothing beyond it on either side). Prefers the corner
/// past the segment's high end, falling back to the corner before its low
/// end when the route terminates there instead.
pub fn divergence_side(ctx: &DivergenceContext, dim: Dimension) -> i32 {
    let coord = |p: &Point| match dim {
        Dimension::X => p.x,
        Dimension::Y => p.y,
    };
    if let Some(after) = ctx.after_high {
        let d = coord(&after) - coord(&ctx.high);
        if d.abs() > 1e-9 {
            return if d > 0.0 { 1 } else { -1 };
        }
    }
    if let Some(before) = ctx.before_low {
        let d = coord(&ctx.low) - coord(&before);
        if d.abs() > 1e-9 {
            return if d > 0.0 { 1 } else { -1 };
        }
    }
    0
}

/// Orders a set of shift segments sharing a nudging region by the
/// divergence rule above (spec §4.7 "determining ... whether A is inside
/// or outside of B based on the sign of the turn and the side of the
/// diverging endpoint", fed into §4.8 step 4's ordering pass): segments
/// diverging toward the lower side of `dim` are ordered before ones
/// diverging toward the higher side. A pair that diverges to the same
/// side, or where one side can't be determined, is incomparable by this
/// rule alone and falls back to `tiebreak` — spec §4.8 step 4's
/// "insertion-sort-with-deferral handles incomparable pairs without
/// imposing false constraints".
///
/// `items` is `(dag node id, divergence context, tiebreak key)` triples;
/// the returned DAG orders those node ids.
pub fn order_by_divergence<T>(
    items: &[(usize, DivergenceContext, T)],
    dim: Dimension,
    tiebreak: impl Fn(&T, &T) -> std::cmp::Ordering,
) -> PartialOrderDag {
    let mut sorted: Vec<&(usize, DivergenceContext, T)> = items.iter().collect();
    sorted.sort_by(|(_, ca, ta), (_, cb, tb)| {
        divergence_side(ca, dim).cmp(&divergence_side(cb, dim)).then_with(|| tiebreak(ta, tb))
    });
    let mut dag = PartialOrderDag::new();
    for w in sorted.windows(2) {
        dag.add_order(w[0].0, w[1].0);
    }
    dag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_proper_crossing() {
        let s = RoutedSegment::new(ConnectorId(1), Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let t = RoutedSegment::new(ConnectorId(2), Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        assert!(matches!(classify(&s, &t), Crossing::Proper(_)));
    }

    #[test]
    fn same_connector_segments_do_not_count_as_crossings() {
        let s = RoutedSegment::new(ConnectorId(1), Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let t = RoutedSegment::new(ConnectorId(1), Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        assert_eq!(count_proper_crossings(&[s, t]), 0);
    }

    #[test]
    fn splits_at_t_junction() {
        let main = RoutedSegment::new(ConnectorId(1), Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let branch = RoutedSegment::new(ConnectorId(2), Point::new(5.0, 0.0), Point::new(5.0, 10.0));
        let split = split_branching_segments(&[main, branch]);
        let main_pieces: Vec<_> = split.iter().filter(|s| s.connector == ConnectorId(1)).collect();
        assert_eq!(main_pieces.len(), 2);
    }

    #[test]
    fn cycle_is_broken_by_reversal() {
        let mut dag = PartialOrderDag::new();
        dag.add_order(0, 1);
        dag.add_order(1, 2);
        dag.add_order(2, 0); // would close a cycle, gets reversed to 0 -> 2
        assert!(dag.is_swapped(2, 0));
        let order = dag.topological_order(&[0, 1, 2]);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn mid_vertex_number_warns_on_double_unassigned() {
        let vn = mid_vertex_number(VertexNumber::Unassigned, VertexNumber::Unassigned);
        assert!(matches!(vn, VertexNumber::Unassigned));
    }
}
