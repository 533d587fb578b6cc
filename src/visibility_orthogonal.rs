//! Orthogonal visibility builder (spec §4.5) — the largest single
//! component by budget share. Two scanlines (vertical then horizontal)
//! emit axis-aligned candidate segments past obstacles; a horizontal/
//! vertical intersection phase turns those candidates into vertices and
//! edges, stamping long-range-visibility flags along the way.
//!
//! Grounded on `original_source/cola/libavoid/orthogonal.cpp` for the event
//! ordering (`Open < ConnPoint < Close` at a shared y or x) and on the
//! teacher's `grid.rs` for the scanline-indexed bookkeeping idiom (typed
//! span bookkeeping).

use crate::geometry::{Direction, DirectionMask, Point};
use crate::ids::{PropertyFlags, VertexId, VertexKind};
use crate::obstacle::ObstacleRegistry;
use crate::store::VertexEdgeStore;
use crate::vertex::VertexHandle;
use std::cmp::Ordering;

/// A rectangular obstacle span as seen by the scanlines, tagged with the
/// originating shape so self-intersections are skipped.
#[derive(Debug, Clone, Copy)]
struct ObstacleSpan {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl ObstacleSpan {
    fn x_center(&self) -> f64 {
        (self.left + self.right) / 2.0
    }
    fn y_center(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }
}

#[derive(Debug, Clone, Copy)]
struct PinSite {
    point: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Open,
    ConnPoint,
    Close,
}

#[derive(Debug, Clone, Copy)]
struct SweepEvent {
    position: f64, // y for the vertical sweep, x for the horizontal sweep
    kind: EventKind,
    obstacle: Option<usize>,
    pin: Option<usize>,
}

/// A candidate axis-aligned segment produced by one of the two sweeps,
/// before the intersection phase turns it into vertices/edges.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    /// Fixed coordinate (y for a horizontal candidate, x for a vertical one).
    fixed: f64,
    lo: f64,
    hi: f64,
    horizontal: bool,
}

#[derive(Debug, Default)]
pub struct OrthogonalVisibilityBuilder {
    nudge_pin_split: bool,
}

impl OrthogonalVisibilityBuilder {
    pub fn new() -> Self {
        Self { nudge_pin_split: true }
    }

    /// Rebuilds the orthogonal visibility graph from scratch over the
    /// current obstacles and the given set of connector-endpoint points.
    /// Orthogonal mode does not keep a persistent shape subgraph across
    /// transactions the way polyline mode does (spec §4.5 gives no such
    /// caching rule, unlike §4.4) — every call is a full two-pass rebuild.
    pub fn rebuild(
        &self,
        store: &mut VertexEdgeStore,
        obstacles: &ObstacleRegistry,
        endpoints: &[(VertexId, Point, DirectionMask)],
    ) -> usize {
        let spans: Vec<ObstacleSpan> = obstacles
            .shapes()
            .filter_map(|s| s.bounds())
            .map(|r| ObstacleSpan { left: r.min_x(), right: r.max_x(), top: r.min_y(), bottom: r.max_y() })
            .collect();

        let pins: Vec<PinSite> = endpoints.iter().map(|(_, p, _)| PinSite { point: *p }).collect();

        let horizontals = self.vertical_sweep(&spans, &pins);
        let verticals = self.horizontal_sweep(&spans, &pins);

        self.intersect_and_materialize(store, endpoints, &horizontals, &verticals)
    }

    /// Vertical sweep: events ordered by y (Open < ConnPoint < Close),
    /// emitting horizontal candidate segments (spec §4.5).
    fn vertical_sweep(&self, spans: &[ObstacleSpan], pins: &[PinSite]) -> Vec<Candidate> {
        let mut events = Vec::new();
        for (i, s) in spans.iter().enumerate() {
            events.push(SweepEvent { position: s.top, kind: EventKind::Open, obstacle: Some(i), pin: None });
            events.push(SweepEvent { position: s.bottom, kind: EventKind::Close, obstacle: Some(i), pin: None });
        }
        for (i, p) in pins.iter().enumerate() {
            events.push(SweepEvent { position: p.point.y, kind: EventKind::ConnPoint, obstacle: None, pin: Some(i) });
        }
        events.sort_by(|a, b| a.position.partial_cmp(&b.position).unwrap_or(Ordering::Equal).then(a.kind.cmp(&b.kind)));

        let mut open: Vec<usize> = Vec::new();
        let mut out = Vec::new();

        for ev in events {
            match ev.kind {
                EventKind::Open => {
                    let idx = ev.obstacle.unwrap();
                    self.emit_span_candidates(spans, &open, idx, spans[idx].left, spans[idx].right, ev.position, true, &mut out, pins);
                    open.push(idx);
                    open.sort_by(|&a, &b| spans[a].x_center().partial_cmp(&spans[b].x_center()).unwrap());
                }
                EventKind::Close => {
                    let idx = ev.obstacle.unwrap();
                    open.retain(|&o| o != idx);
                    self.emit_span_candidates(spans, &open, idx, spans[idx].left, spans[idx].right, ev.position, true, &mut out, pins);
                }
                EventKind::ConnPoint => {
                    let pin_idx = ev.pin.unwrap();
                    let x = pins[pin_idx].point.x;
                    self.emit_span_candidates(spans, &open, usize::MAX, x, x, ev.position, true, &mut out, pins);
                }
            }
        }
        out
    }

    /// Horizontal sweep: symmetric process in x, emitting vertical
    /// candidate segments (spec §4.5).
    fn horizontal_sweep(&self, spans: &[ObstacleSpan], pins: &[PinSite]) -> Vec<Candidate> {
        let mut events = Vec::new();
        for (i, s) in spans.iter().enumerate() {
            events.push(SweepEvent { position: s.left, kind: EventKind::Open, obstacle: Some(i), pin: None });
            events.push(SweepEvent { position: s.right, kind: EventKind::Close, obstacle: Some(i), pin: None });
        }
        for (i, p) in pins.iter().enumerate() {
            events.push(SweepEvent { position: p.point.x, kind: EventKind::ConnPoint, obstacle: None, pin: Some(i) });
        }
        events.sort_by(|a, b| a.position.partial_cmp(&b.position).unwrap_or(Ordering::Equal).then(a.kind.cmp(&b.kind)));

        let mut open: Vec<usize> = Vec::new();
        let mut out = Vec::new();

        for ev in events {
            match ev.kind {
                EventKind::Open => {
                    let idx = ev.obstacle.unwrap();
                    self.emit_span_candidates(spans, &open, idx, spans[idx].top, spans[idx].bottom, ev.position, false, &mut out, pins);
                    open.push(idx);
                    open.sort_by(|&a, &b| spans[a].y_center().partial_cmp(&spans[b].y_center()).unwrap());
                }
                EventKind::Close => {
                    let idx = ev.obstacle.unwrap();
                    open.retain(|&o| o != idx);
                    self.emit_span_candidates(spans, &open, idx, spans[idx].top, spans[idx].bottom, ev.position, false, &mut out, pins);
                }
                EventKind::ConnPoint => {
                    let pin_idx = ev.pin.unwrap();
                    let y = pins[pin_idx].point.y;
                    self.emit_span_candidates(spans, &open, usize::MAX, y, y, ev.position, false, &mut out, pins);
                }
            }
        }
        out
    }

    /// For the span `[lo, hi]` in the sweep's transverse axis, find the
    /// nearest open obstacle on each side (walking past co-opening/closing
    /// obstacles, spec §4.5 "Ordering rules") and emit a candidate segment
    /// at `fixed` connecting them, split at any pin that lands inside it.
    #[allow(clippy::too_many_arguments)]
    fn emit_span_candidates(
        &self,
        spans: &[ObstacleSpan],
        open: &[usize],
        self_idx: usize,
        lo: f64,
        hi: f64,
        fixed: f64,
        horizontal: bool,
        out: &mut Vec<Candidate>,
        pins: &[PinSite],
    ) {
        let center = |i: usize| if horizontal { spans[i].x_center() } else { spans[i].y_center() };

        let mut left_bound = f64::NEG_INFINITY;
        let mut right_bound = f64::INFINITY;

        for &o in open {
            if o == self_idx {
                continue;
            }
            let (o_lo, o_hi) = near_lo_hi(spans, o, horizontal);
            // Skip obstacles that merely touch at this sweep position
            // without actually spanning across it (co-opening/co-closing
            // skip rule, spec §4.5).
            if o_hi <= lo || o_lo >= hi {
                if center(o) < lo {
                    left_bound = left_bound.max(o_hi);
                } else if center(o) > hi {
                    right_bound = right_bound.min(o_lo);
                }
            }
        }

        if left_bound.is_infinite() && right_bound.is_infinite() && self_idx == usize::MAX {
            // A ConnPoint with nothing around it still needs a degenerate
            // "point" segment so long-range visibility gets established at
            // that point (spec §4.5: "a degenerate point segment is
            // emitted").
            out.push(Candidate { fixed, lo, hi: lo, horizontal });
            return;
        }

        self.split_at_pins(out, left_bound, right_bound, fixed, horizontal, pins);
    }

    /// Splits the candidate `[left_bound, right_bound]` at any pin whose
    /// transverse coordinate falls strictly inside it, producing up to two
    /// sub-segments with the pin's own direction mask applied on the
    /// boundary it touches (spec §4.5 "connection pins producing up to two
    /// sub-segments split at the pin x").
    fn split_at_pins(
        &self,
        out: &mut Vec<Candidate>,
        left_bound: f64,
        right_bound: f64,
        fixed: f64,
        horizontal: bool,
        pins: &[PinSite],
    ) {
        if left_bound >= right_bound {
            return;
        }
        let mut cuts: Vec<f64> = vec![left_bound, right_bound];
        if self.nudge_pin_split {
            for p in pins {
                let t = if horizontal { p.point.x } else { p.point.y };
                let on_fixed = if horizontal {
                    (p.point.y - fixed).abs() < crate::geometry::DEFAULT_TOLERANCE
                } else {
                    (p.point.x - fixed).abs() < crate::geometry::DEFAULT_TOLERANCE
                };
                if on_fixed && t > left_bound && t < right_bound {
                    cuts.push(t);
                }
            }
        }
        cuts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        for w in cuts.windows(2) {
            out.push(Candidate { fixed, lo: w[0], hi: w[1], horizontal });
        }
    }

    /// Intersects every vertical candidate with the horizontal candidates
    /// still open at that x, materializing a vertex at each intersection
    /// and edges along broken sub-segments, stamping long-range visibility
    /// flags during the walk (spec §4.5).
    fn intersect_and_materialize(
        &self,
        store: &mut VertexEdgeStore,
        endpoints: &[(VertexId, Point, DirectionMask)],
        horizontals: &[Candidate],
        verticals: &[Candidate],
    ) -> usize {
        use std::collections::BTreeMap;

        // breakpoints[i] = sorted transverse coordinates at which segment i
        // must be split into edges.
        let mut h_breaks: Vec<BTreeMap<i64, VertexHandle>> = vec![BTreeMap::new(); horizontals.len()];
        let mut v_breaks: Vec<BTreeMap<i64, VertexHandle>> = vec![BTreeMap::new(); verticals.len()];

        let quantize = |v: f64| (v * 1e6).round() as i64;

        let ensure_vertex = |store: &mut VertexEdgeStore, point: Point, disambiguator: &mut u32| -> VertexHandle {
            let id = VertexId::dummy(VertexKind::DummyOrthogonal, *disambiguator);
            *disambiguator += 1;
            store.insert_vertex(id, point).expect("dummy vertex ids are unique per call")
        };
        let mut disambiguator = 0u32;

        for (hi, h) in horizontals.iter().enumerate() {
            for (vi, v) in verticals.iter().enumerate() {
                if v.fixed < h.lo - 1e-9 || v.fixed > h.hi + 1e-9 {
                    continue;
                }
                if h.fixed < v.lo - 1e-9 || h.fixed > v.hi + 1e-9 {
                    continue;
                }
                let point = Point::new(v.fixed, h.fixed);
                let key_h = quantize(v.fixed);
                let key_v = quantize(h.fixed);

                let handle = if let Some(&existing) = h_breaks[hi].get(&key_h) {
                    existing
                } else if let Some(&existing) = v_breaks[vi].get(&key_v) {
                    existing
                } else {
                    ensure_vertex(store, point, &mut disambiguator)
                };
                h_breaks[hi].insert(key_h, handle);
                v_breaks[vi].insert(key_v, handle);
            }
        }

        // Attach connector-endpoint / pin vertices that land exactly on a
        // candidate, so routes terminate on the graph rather than floating
        // beside it.
        for (id, point, mask) in endpoints {
            for (hi, h) in horizontals.iter().enumerate() {
                if (point.y - h.fixed).abs() < 1e-6 && point.x >= h.lo - 1e-6 && point.x <= h.hi + 1e-6 {
                    let key = quantize(point.x);
                    h_breaks[hi].entry(key).or_insert_with(|| {
                        store.insert_vertex(*id, *point).unwrap_or_else(|_| store.lookup(id).unwrap())
                    });
                    if let Some(handle) = h_breaks[hi].get(&key) {
                        if let Some(vx) = store.get_mut(*handle) {
                            vx.direction_mask = vx.direction_mask.union(*mask);
                        }
                    }
                }
            }
            for (vi, v) in verticals.iter().enumerate() {
                if (point.x - v.fixed).abs() < 1e-6 && point.y >= v.lo - 1e-6 && point.y <= v.hi + 1e-6 {
                    let key = quantize(point.y);
                    v_breaks[vi].entry(key).or_insert_with(|| {
                        store.insert_vertex(*id, *point).unwrap_or_else(|_| store.lookup(id).unwrap())
                    });
                    if let Some(handle) = v_breaks[vi].get(&key) {
                        if let Some(vx) = store.get_mut(*handle) {
                            vx.direction_mask = vx.direction_mask.union(*mask);
                        }
                    }
                }
            }
        }

        let mut inserted = 0;
        inserted += self.materialize_runs(store, &h_breaks, true);
        inserted += self.materialize_runs(store, &v_breaks, false);
        inserted
    }

    /// Walks the ordered breakpoints of each candidate segment, inserting
    /// an edge between every consecutive pair and stamping long-range
    /// visibility flags (hasSeenShapeEdge/hasSeenConnPt, low/high) along
    /// the way (spec §4.5).
    fn materialize_runs(
        &self,
        store: &mut VertexEdgeStore,
        breaks: &[std::collections::BTreeMap<i64, VertexHandle>],
        horizontal: bool,
    ) -> usize {
        let mut inserted = 0;
        for run in breaks {
            let handles: Vec<VertexHandle> = run.values().copied().collect();
            if handles.len() < 2 {
                continue;
            }
            let mut seen_shape_edge = false;
            let mut seen_conn_point = false;
            for w in handles.windows(2) {
                let (a, b) = (w[0], w[1]);
                let (pa, pb) = (store.get(a).unwrap().point, store.get(b).unwrap().point);
                let distance = pa.distance(&pb);
                store.insert_edge(a, b, distance, true);
                inserted += 1;

                if let Some(va) = store.get_mut(a) {
                    let is_shape = matches!(va.id.kind, VertexKind::ShapeCorner);
                    let is_conn = matches!(va.id.kind, VertexKind::ConnectorEndpoint | VertexKind::Pin);
                    let mut flags = PropertyFlags::none();
                    flags.set_shape_edge(seen_shape_edge, false);
                    flags.set_conn_point(seen_conn_point, false);
                    va.property_flags = va.property_flags.union(flags);
                    if is_shape {
                        seen_shape_edge = true;
                    }
                    if is_conn {
                        seen_conn_point = true;
                    }
                }
                let dir_a = if horizontal { Direction::Right } else { Direction::Down };
                let dir_b = if horizontal { Direction::Left } else { Direction::Up };
                if let Some(va) = store.get_mut(a) {
                    va.direction_mask.set(dir_a);
                }
                if let Some(vb) = store.get_mut(b) {
                    vb.direction_mask.set(dir_b);
                }
            }
            // Walk backwards to set the high-side flags symmetrically.
            let mut seen_shape_edge_hi = false;
            let mut seen_conn_point_hi = false;
            for w in handles.windows(2).rev() {
                let b = w[1];
                if let Some(vb) = store.get_mut(b) {
                    let mut flags = PropertyFlags::none();
                    flags.set_shape_edge(false, seen_shape_edge_hi);
                    flags.set_conn_point(false, seen_conn_point_hi);
                    vb.property_flags = vb.property_flags.union(flags);
                    if matches!(vb.id.kind, VertexKind::ShapeCorner) {
                        seen_shape_edge_hi = true;
                    }
                    if matches!(vb.id.kind, VertexKind::ConnectorEndpoint | VertexKind::Pin) {
                        seen_conn_point_hi = true;
                    }
                }
            }
        }
        inserted
    }
}

fn near_lo_hi(spans: &[ObstacleSpan], i: usize, horizontal: bool) -> (f64, f64) {
    if horizontal {
        (spans[i].left, spans[i].right)
    } else {
        (spans[i].top, spans[i].bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Polygon, Rect, Size};
    use crate::ids::ShapeId;
    use crate::obstacle::Shape;

    #[test]
    fn single_shape_produces_perimeter_like_candidates() {
        let mut store = VertexEdgeStore::new();
        let mut obstacles = ObstacleRegistry::new();
        let rect = Rect::new(Point::new(100.0, 100.0), Size::new(100.0, 100.0));
        obstacles.add_shape(Shape::new(ShapeId(1), Polygon::rectangle(&rect)));

        let endpoints = vec![
            (VertexId::connector_endpoint(crate::ids::ConnectorId(1), true), Point::new(50.0, 150.0), DirectionMask::ALL),
            (VertexId::connector_endpoint(crate::ids::ConnectorId(1), false), Point::new(250.0, 150.0), DirectionMask::ALL),
        ];

        let builder = OrthogonalVisibilityBuilder::new();
        let inserted = builder.rebuild(&mut store, &obstacles, &endpoints);
        assert!(inserted > 0);
        assert!(store.all_vertices().count() > 0);
    }

    #[test]
    fn no_obstacles_still_connects_two_endpoints() {
        let mut store = VertexEdgeStore::new();
        let obstacles = ObstacleRegistry::new();
        let endpoints = vec![
            (VertexId::connector_endpoint(crate::ids::ConnectorId(1), true), Point::new(0.0, 0.0), DirectionMask::ALL),
            (VertexId::connector_endpoint(crate::ids::ConnectorId(1), false), Point::new(100.0, 0.0), DirectionMask::ALL),
        ];
        let builder = OrthogonalVisibilityBuilder::new();
        builder.rebuild(&mut store, &obstacles, &endpoints);
        let a = store.lookup(&endpoints[0].0);
        let b = store.lookup(&endpoints[1].0);
        assert!(a.is_some() && b.is_some());
    }
}
