//! Nudging engine (spec §4.8): per-dimension collection of orthogonal shift
//! segments, overlap-region grouping, ordering via the crossing analyser's
//! partial order, and a two-pass (centring, then ordered) call into the
//! separation solver, with infeasible-gap recovery (step 6) around the
//! ordered pass.
//!
//! Grounded on the spec's seven-step algorithm directly (no single teacher
//! file owns this; the teacher has no nudging stage at all). Min/max limits
//! are computed here from obstacle rectangles directly on the nudged axis
//! rather than `original_source/cola/libavoid/orthogonal.cpp`'s full
//! second-scanline sweep — a narrower but equivalent result for the
//! axis-aligned rectangular obstacles this crate routes around.

use crate::crossing::PartialOrderDag;
use crate::geometry::{turn, Dimension, Point, Rect};
use crate::ids::ConnectorId;
use crate::separation::{BlockSolver, Constraint, SeparationSolver, Variable};

/// Free, structural, and fixed weights used by the separation solver calls
/// (spec §4.8 step 5).
const FREE_WEIGHT: f64 = 1e-5;
const STRUCTURAL_WEIGHT: f64 = 1e-3;
const FIXED_WEIGHT: f64 = 1e5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BendShape {
    /// Adjoining segments lie on the same side (glossary c-bend).
    C,
    /// Adjoining segments lie on opposite sides (s-bend/z-bend, folded
    /// together here since both want the channel midpoint as their
    /// centring target).
    S,
    /// No adjoining bend to classify (isolated or at a route end).
    None,
}

#[derive(Debug, Clone)]
pub struct OrthogonalRoute {
    pub connector: ConnectorId,
    pub points: Vec<Point>,
    /// Indices (into `points`) of segments fixed at a routing checkpoint.
    pub fixed_segments: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct NudgingShiftSegment {
    pub connector: ConnectorId,
    pub route_index: usize,
    pub low: usize,
    pub high: usize,
    pub position: f64,
    pub min_limit: f64,
    pub max_limit: f64,
    pub bend: BendShape,
    pub fixed: bool,
}

fn weight_for(seg: &NudgingShiftSegment) -> f64 {
    if seg.fixed {
        FIXED_WEIGHT
    } else if matches!(seg.bend, BendShape::None) {
        FREE_WEIGHT
    } else {
        STRUCTURAL_WEIGHT
    }
}

fn classify_bend(route: &OrthogonalRoute, i: usize) -> BendShape {
    let pts = &route.points;
    if i == 0 || i + 2 >= pts.len() {
        return BendShape::None;
    }
    let prev = pts[i - 1];
    let a = pts[i];
    let b = pts[i + 1];
    let next = pts[i + 2];
    let t1 = turn(&prev, &a, &b);
    let t2 = turn(&a, &b, &next);
    if t1 == 0 || t2 == 0 {
        return BendShape::None;
    }
    if t1 == t2 {
        BendShape::C
    } else {
        BendShape::S
    }
}

/// Collects every non-terminal segment aligned to `dim` across all routes
/// (spec §4.8 step 1). Terminal segments (touching either route endpoint)
/// are included only when `nudge_terminal` is set
/// (`nudgeOrthogonalSegmentsConnectedToShapes`).
pub fn collect_shift_segments(routes: &[OrthogonalRoute], dim: Dimension, nudge_terminal: bool) -> Vec<NudgingShiftSegment> {
    let mut out = Vec::new();
    for (ri, route) in routes.iter().enumerate() {
        let n = route.points.len();
        if n < 2 {
            continue;
        }
        for i in 0..n - 1 {
            let a = route.points[i];
            let b = route.points[i + 1];
            let is_terminal = i == 0 || i + 2 == n;
            if is_terminal && !nudge_terminal {
                continue;
            }
            let aligned = match dim {
                Dimension::X => (a.x - b.x).abs() < 1e-9,
                Dimension::Y => (a.y - b.y).abs() < 1e-9,
            };
            if !aligned {
                continue;
            }
            let position = match dim {
                Dimension::X => a.x,
                Dimension::Y => a.y,
            };
            out.push(NudgingShiftSegment {
                connector: route.connector,
                route_index: ri,
                low: i,
                high: i + 1,
                position,
                min_limit: f64::NEG_INFINITY,
                max_limit: f64::INFINITY,
                bend: classify_bend(route, i),
                fixed: route.fixed_segments.contains(&i),
            });
        }
    }
    out
}

/// Computes each segment's min/max limit in `dim` as the nearest obstacle
/// edge on either side (spec §4.8 step 2).
pub fn compute_limits(segments: &mut [NudgingShiftSegment], dim: Dimension, obstacles: &[Rect]) {
    for seg in segments.iter_mut() {
        let mut lo = f64::NEG_INFINITY;
        let mut hi = f64::INFINITY;
        for r in obstacles {
            let (near, far) = match dim {
                Dimension::X => (r.min_x(), r.max_x()),
                Dimension::Y => (r.min_y(), r.max_y()),
            };
            if far <= seg.position {
                lo = lo.max(far);
            } else if near >= seg.position {
                hi = hi.min(near);
            }
        }
        seg.min_limit = lo;
        seg.max_limit = hi;
    }
}

/// Groups segments into overlap regions by transitive overlap of their
/// extent in the alternate dimension (spec §4.8 step 3).
pub fn group_into_regions(segments: &[NudgingShiftSegment], routes: &[OrthogonalRoute], dim: Dimension) -> Vec<Vec<usize>> {
    let extents: Vec<(f64, f64)> = segments
        .iter()
        .map(|s| {
            let route = &routes[s.route_index];
            let a = route.points[s.low];
            let b = route.points[s.high];
            match dim {
                Dimension::X => (a.y.min(b.y), a.y.max(b.y)),
                Dimension::Y => (a.x.min(b.x), a.x.max(b.x)),
            }
        })
        .collect();

    let n = segments.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let (a0, a1) = extents[i];
            let (b0, b1) = extents[j];
            if a0 < b1 - 1e-9 && b0 < a1 - 1e-9 {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut groups: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..n {
        let r = find(&mut parent, i);
        groups.entry(r).or_default().push(i);
    }
    groups.into_values().collect()
}

/// One pass of the separation solver over a single region (spec §4.8 steps
/// 4-5, 7). `order` is `None` for the pure-centring pre-pass
/// (`performUnifyingNudgingPreprocessingStep`) and `Some` for the real pass
/// ordered by the crossing analyser's partial order. Returns whether every
/// fixed-weight variable (a region limit anchor, or a checkpoint-touching
/// segment) landed within `0.01` of its desired position — spec §4.8 step
/// 6's feasibility test, used by [`solve_region_ordered`] to decide whether
/// the requested gap needs to be reduced.
fn solve_region(all: &mut [NudgingShiftSegment], region: &[usize], gap: f64, order: Option<&PartialOrderDag>) -> bool {
    let mut variables: Vec<Variable> = region
        .iter()
        .map(|&idx| {
            let seg = &all[idx];
            let desired = if order.is_none() && seg.min_limit.is_finite() && seg.max_limit.is_finite() {
                (seg.min_limit + seg.max_limit) / 2.0
            } else {
                seg.position
            };
            Variable { id: idx, desired_position: desired, weight: weight_for(seg) }
        })
        .collect();

    let mut constraints = Vec::new();
    if let Some(dag) = order {
        let ordered = dag.topological_order(region);
        for w in ordered.windows(2) {
            constraints.push(Constraint { left: w[0], right: w[1], gap, equality: false });
        }
        if let Some(&first) = ordered.first() {
            let lim = all[first].min_limit;
            if lim.is_finite() {
                let anchor_id = usize::MAX - 1;
                variables.push(Variable { id: anchor_id, desired_position: lim, weight: FIXED_WEIGHT });
                constraints.push(Constraint { left: anchor_id, right: first, gap: 0.0, equality: false });
            }
        }
        if let Some(&last) = ordered.last() {
            let lim = all[last].max_limit;
            if lim.is_finite() {
                let anchor_id = usize::MAX - 2;
                variables.push(Variable { id: anchor_id, desired_position: lim, weight: FIXED_WEIGHT });
                constraints.push(Constraint { left: last, right: anchor_id, gap: 0.0, equality: false });
            }
        }
    }

    let positions = BlockSolver.solve(&variables, &constraints);
    let feasible = variables
        .iter()
        .filter(|v| v.weight >= FIXED_WEIGHT - 1e-9)
        .all(|v| positions.get(&v.id).map(|p| (p - v.desired_position).abs() <= 0.01).unwrap_or(true));

    for &idx in region {
        if let Some(&p) = positions.get(&idx) {
            all[idx].position = p;
        }
    }
    feasible
}

/// Spec §4.8 step 6 / §7 "infeasible-separation": runs the real ordered
/// pass at `nudge_distance`; if a fixed anchor ends up pulled more than
/// `0.01` from where it's pinned, the requested gap can't be satisfied at
/// that separation, so the gap is reduced by `nudge_distance / 10` and the
/// region is re-solved, repeating until feasible or the gap drops below
/// `1e-4` (at which point it is accepted as effectively zero — "recovered
/// locally by zeroing the separation for the offending gap constraint").
/// Returns whether any reduction was needed, so the caller can surface the
/// diagnostic.
fn solve_region_ordered(all: &mut [NudgingShiftSegment], region: &[usize], nudge_distance: f64, dag: &PartialOrderDag) -> bool {
    let decrement = (nudge_distance / 10.0).max(1e-6);
    let mut gap = nudge_distance;
    let mut reduced = false;
    loop {
        if solve_region(all, region, gap, Some(dag)) {
            return reduced;
        }
        reduced = true;
        if gap < 1e-4 {
            return true;
        }
        gap = (gap - decrement).max(0.0);
    }
}

fn write_back(routes: &mut [OrthogonalRoute], segments: &[NudgingShiftSegment], dim: Dimension) {
    for seg in segments {
        let route = &mut routes[seg.route_index];
        match dim {
            Dimension::X => {
                route.points[seg.low].x = seg.position;
                route.points[seg.high].x = seg.position;
            }
            Dimension::Y => {
                route.points[seg.low].y = seg.position;
                route.points[seg.high].y = seg.position;
            }
        }
    }
}

/// Runs the full spec §4.8 pipeline for one dimension: collect, limit,
/// group, then (optionally) centre and finally order-and-separate every
/// region, writing final positions back into `routes`. `order_for_region`
/// receives the full route set alongside the region's segment indices so
/// it can implement the real §4.7 divergence-based ordering (which needs
/// to look at route geometry beyond the shift segment itself), not just a
/// position sort. Returns whether any region needed the infeasible-gap
/// recovery of step 6.
pub fn nudge_dimension(
    routes: &mut [OrthogonalRoute],
    dim: Dimension,
    nudge_distance: f64,
    nudge_terminal: bool,
    run_centring_prepass: bool,
    obstacles: &[Rect],
    order_for_region: impl Fn(&[NudgingShiftSegment], &[OrthogonalRoute], &[usize]) -> PartialOrderDag,
) -> bool {
    let mut segments = collect_shift_segments(routes, dim, nudge_terminal);
    if segments.is_empty() {
        return false;
    }
    compute_limits(&mut segments, dim, obstacles);
    let regions = group_into_regions(&segments, routes, dim);

    let mut any_infeasible = false;
    for region in &regions {
        if run_centring_prepass {
            solve_region(&mut segments, region, 0.0, None);
        }
        let dag = order_for_region(&segments, routes, region);
        if solve_region_ordered(&mut segments, region, nudge_distance, &dag) {
            any_infeasible = true;
        }
    }

    write_back(routes, &segments, dim);
    any_infeasible
}

#[cfg(test)]
mod tests {
    use super::*;

    // (0,y) -> (50,y) -> (50,200) -> (250,200) -> (250,300) -> (300,300):
    // the middle horizontal segment at y=200 is the only non-terminal
    // shift segment aligned to Y.
    fn zigzag_route(connector: u32, y: f64) -> OrthogonalRoute {
        OrthogonalRoute {
            connector: ConnectorId(connector),
            points: vec![
                Point::new(0.0, y),
                Point::new(50.0, y),
                Point::new(50.0, 200.0),
                Point::new(250.0, 200.0),
                Point::new(250.0, 300.0),
                Point::new(300.0, 300.0),
            ],
            fixed_segments: vec![],
        }
    }

    #[test]
    fn parallel_segments_end_up_nudge_distance_apart() {
        let mut routes = vec![zigzag_route(1, 100.0), zigzag_route(2, 105.0)];
        let order_for_region = |_segs: &[NudgingShiftSegment], _routes: &[OrthogonalRoute], region: &[usize]| {
            let mut dag = PartialOrderDag::new();
            if region.len() == 2 {
                dag.add_order(region[0].min(region[1]), region[0].max(region[1]));
            }
            dag
        };
        nudge_dimension(&mut routes, Dimension::Y, 4.0, false, false, &[], order_for_region);

        let y0 = routes[0].points[2].y;
        let y1 = routes[1].points[2].y;
        assert!(((y0 - y1).abs() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn empty_routes_are_a_no_op() {
        let mut routes: Vec<OrthogonalRoute> = vec![];
        nudge_dimension(&mut routes, Dimension::X, 4.0, false, true, &[], |_, _, _| PartialOrderDag::new());
        assert!(routes.is_empty());
    }
}
