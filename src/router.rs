//! Router orchestrator (spec §4.10, §5, §6): the action queue, the
//! `processTransaction` pipeline, and the public mutation/query API.
//! Generalizes the teacher's `main.rs`, which drove a `LayoutEngine`
//! stage-by-stage through a single fixed pipeline, into a transactional
//! loop that can run repeatedly over an incrementally mutated scene.

use crate::config::{PenaltyKind, RoutingOption, RoutingParameters};
use crate::connector::{ConnectorRef, Endpoint, RouteChangedCallback, RoutingType};
use crate::crossing::{self, RoutedSegment};
use crate::error::{Diagnostics, LogDiagnostics, RouterError, Severity};
use crate::geometry::{Dimension, DirectionMask, PolyLine, Point, Polygon, Rect};
use crate::hyperedge::{self, HyperEdgeTree};
use crate::ids::{ConnectorId, JunctionId, ShapeId, VertexId, VertexKind};
use crate::nudging::{self, OrthogonalRoute};
use crate::obstacle::{Junction, ObstacleRegistry, Shape};
use crate::path_search;
use crate::store::VertexEdgeStore;
use crate::vertex::VertexHandle;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// Which visibility graph(s) the router maintains (spec §1: "supports both
/// polyline and orthogonal connectors"). A router built for one mode only
/// pays for the visibility builder it actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    Polyline,
    Orthogonal,
    Both,
}

/// A queued mutation (spec §5: "mutations are enqueued, not applied,
/// until `processTransaction` runs"). Config setters are applied
/// immediately instead of being queued — see the Open Question note at
/// the bottom of this file.
enum Action {
    AddShape(ShapeId, Polygon),
    RemoveShape(ShapeId),
    MoveShapeDelta(ShapeId, f64, f64),
    MoveShapeTo(ShapeId, Polygon),
    AddJunction(JunctionId, Point, bool),
    RemoveJunction(JunctionId),
    MoveJunction(JunctionId, Point),
    AddConnector(ConnectorId, Endpoint, Endpoint, RoutingType),
    RemoveConnector(ConnectorId),
    SetConnectorEndpoints(ConnectorId, Endpoint, Endpoint),
    SetConnectorType(ConnectorId, RoutingType),
    SetConnectorCheckpoints(ConnectorId, Vec<Point>),
    SetConnectorCallback(ConnectorId, Box<dyn RouteChangedCallback>),
}

/// The incremental, object-avoiding line router (spec §1, §6). Owns every
/// shape/junction/cluster (`obstacles`), every connector (`connectors`),
/// and the shared visibility graph (`store`); the two visibility builders
/// and the routing parameters round out the pipeline spec §4.10 describes.
pub struct Router {
    mode: RouterMode,
    obstacles: ObstacleRegistry,
    connectors: IndexMap<ConnectorId, ConnectorRef>,
    store: VertexEdgeStore,
    polyline_builder: crate::visibility_polyline::PolylineVisibilityBuilder,
    orthogonal_builder: crate::visibility_orthogonal::OrthogonalVisibilityBuilder,
    params: RoutingParameters,
    diagnostics: Box<dyn Diagnostics>,

    queue: Vec<Action>,
    /// Re-entrancy guard (spec §5/§7: calling a mutator from inside a
    /// `RouteChangedCallback` must fail with `InvalidTransaction`).
    processing: bool,
    static_graph_invalidated: bool,
    /// Per-connector handle trail from the last successful search, kept so
    /// `rubber_band_route` has something to start from (spec §4.6). Not
    /// part of `ConnectorRef` itself since it is router-internal search
    /// scratch, not client-visible state.
    route_handles: HashMap<ConnectorId, Vec<VertexHandle>>,
    /// Connectors whose `raw_route`/`display_route` actually changed this
    /// transaction; callbacks fire only for these (spec §5 ordering
    /// guarantee: "in the order connectors were added").
    changed: HashSet<ConnectorId>,

    next_shape_id: u32,
    next_junction_id: u32,
    next_connector_id: u32,
}

impl Router {
    pub fn new(mode: RouterMode) -> Self {
        Self::with_diagnostics(mode, Box::new(LogDiagnostics))
    }

    pub fn with_diagnostics(mode: RouterMode, diagnostics: Box<dyn Diagnostics>) -> Self {
        Self {
            mode,
            obstacles: ObstacleRegistry::new(),
            connectors: IndexMap::new(),
            store: VertexEdgeStore::new(),
            polyline_builder: crate::visibility_polyline::PolylineVisibilityBuilder::new(),
            orthogonal_builder: crate::visibility_orthogonal::OrthogonalVisibilityBuilder::new(),
            params: RoutingParameters::default(),
            diagnostics,
            queue: Vec::new(),
            processing: false,
            static_graph_invalidated: false,
            route_handles: HashMap::new(),
            changed: HashSet::new(),
            next_shape_id: 0,
            next_junction_id: 0,
            next_connector_id: 0,
        }
    }

    fn enqueue(&mut self, action: Action) -> Result<(), RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        self.queue.push(action);
        Ok(())
    }

    // ---- Shapes ---------------------------------------------------------

    pub fn add_shape(&mut self, polygon: Polygon) -> Result<ShapeId, RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        let id = ShapeId(self.next_shape_id);
        self.next_shape_id += 1;
        self.queue.push(Action::AddShape(id, polygon));
        Ok(id)
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> Result<(), RouterError> {
        self.enqueue(Action::RemoveShape(id))
    }

    pub fn move_shape_by(&mut self, id: ShapeId, dx: f64, dy: f64) -> Result<(), RouterError> {
        self.enqueue(Action::MoveShapeDelta(id, dx, dy))
    }

    pub fn move_shape_to(&mut self, id: ShapeId, polygon: Polygon) -> Result<(), RouterError> {
        self.enqueue(Action::MoveShapeTo(id, polygon))
    }

    // ---- Junctions --------------------------------------------------------

    pub fn add_junction(&mut self, position: Point, fixed: bool) -> Result<JunctionId, RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        let id = JunctionId(self.next_junction_id);
        self.next_junction_id += 1;
        self.queue.push(Action::AddJunction(id, position, fixed));
        Ok(id)
    }

    pub fn remove_junction(&mut self, id: JunctionId) -> Result<(), RouterError> {
        self.enqueue(Action::RemoveJunction(id))
    }

    pub fn move_junction(&mut self, id: JunctionId, position: Point) -> Result<(), RouterError> {
        self.enqueue(Action::MoveJunction(id, position))
    }

    // ---- Connectors ------------------------------------------------------

    pub fn add_connector(&mut self, source: Endpoint, target: Endpoint, routing_type: RoutingType) -> Result<ConnectorId, RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        let id = ConnectorId(self.next_connector_id);
        self.next_connector_id += 1;
        self.queue.push(Action::AddConnector(id, source, target, routing_type));
        Ok(id)
    }

    pub fn remove_connector(&mut self, id: ConnectorId) -> Result<(), RouterError> {
        self.enqueue(Action::RemoveConnector(id))
    }

    pub fn set_connector_endpoints(&mut self, id: ConnectorId, source: Endpoint, target: Endpoint) -> Result<(), RouterError> {
        self.enqueue(Action::SetConnectorEndpoints(id, source, target))
    }

    pub fn set_connector_type(&mut self, id: ConnectorId, routing_type: RoutingType) -> Result<(), RouterError> {
        self.enqueue(Action::SetConnectorType(id, routing_type))
    }

    pub fn set_connector_checkpoints(&mut self, id: ConnectorId, checkpoints: Vec<Point>) -> Result<(), RouterError> {
        self.enqueue(Action::SetConnectorCheckpoints(id, checkpoints))
    }

    pub fn set_connector_callback(&mut self, id: ConnectorId, callback: Box<dyn RouteChangedCallback>) -> Result<(), RouterError> {
        self.enqueue(Action::SetConnectorCallback(id, callback))
    }

    // ---- Configuration (applied immediately, not queued — see the Open
    // Question note at the bottom of this file) ---------------------------

    pub fn set_routing_option(&mut self, opt: RoutingOption, enabled: bool) -> Result<(), RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        self.params.set_option(opt, enabled);
        Ok(())
    }

    pub fn set_routing_penalty(&mut self, kind: PenaltyKind, value: f64) -> Result<(), RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        self.params.set_penalty(kind, value);
        Ok(())
    }

    pub fn set_orthogonal_nudge_distance(&mut self, value: f64) -> Result<(), RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        self.params.orthogonal_nudge_distance = value;
        Ok(())
    }

    // ---- Queries -----------------------------------------------------------

    pub fn route(&self, id: ConnectorId) -> Option<PolyLine> {
        self.connectors.get(&id).map(|c| c.raw_route.clone())
    }

    pub fn display_route(&self, id: ConnectorId) -> Option<PolyLine> {
        self.connectors.get(&id).map(|c| c.display_route.clone())
    }

    pub fn obstacles(&self) -> &ObstacleRegistry {
        &self.obstacles
    }

    pub fn connectors(&self) -> impl Iterator<Item = (&ConnectorId, &ConnectorRef)> {
        self.connectors.iter()
    }

    /// Spec §8 `existsOrthogonalCrossings`: whether any two *different*
    /// connectors' orthogonal display routes properly cross.
    pub fn exists_orthogonal_crossings(&self) -> bool {
        let segments: Vec<RoutedSegment> = self
            .connectors
            .values()
            .filter(|c| c.flags.active && c.routing_type == RoutingType::Orthogonal)
            .flat_map(|c| {
                let id = c.id;
                c.display_route.windows(2).map(move |w| RoutedSegment::new(id, w[0], w[1]))
            })
            .collect();
        let split = crossing::split_branching_segments(&segments);
        crossing::count_proper_crossings(&split) > 0
    }

    // ---- Transaction processing (spec §4.10) ------------------------------

    pub fn process_transaction(&mut self) -> Result<(), RouterError> {
        if self.processing {
            return Err(RouterError::InvalidTransaction);
        }
        self.processing = true;
        self.changed.clear();

        let actions = std::mem::take(&mut self.queue);
        for action in actions {
            self.apply_action(action);
        }

        if self.obstacles.is_dirty() {
            self.obstacles.clear_dirty();
            self.static_graph_invalidated = true;
        }

        if self.static_graph_invalidated {
            self.sync_shape_vertices();
            if matches!(self.mode, RouterMode::Polyline | RouterMode::Both) {
                self.polyline_builder.invalidate_shape_subgraph();
            }
            for c in self.connectors.values_mut() {
                if c.flags.active {
                    c.flags.needs_reroute = true;
                }
            }
            self.static_graph_invalidated = false;
        }

        self.route_connectors();
        self.postprocess_orthogonal();
        if self.params.improve_hyperedge_routing {
            self.process_hyperedges();
            self.postprocess_orthogonal();
        }

        self.fire_callbacks();
        self.processing = false;
        Ok(())
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::AddShape(id, polygon) => {
                self.obstacles.add_shape(Shape::new(id, polygon));
            }
            Action::RemoveShape(id) => {
                self.obstacles.remove_shape(id);
                self.remove_shape_vertices(id);
            }
            Action::MoveShapeDelta(id, dx, dy) => {
                self.obstacles.translate_shape(id, dx, dy);
                self.remove_shape_vertices(id);
            }
            Action::MoveShapeTo(id, polygon) => {
                self.obstacles.set_shape_polygon(id, polygon);
                self.remove_shape_vertices(id);
            }
            Action::AddJunction(id, position, fixed) => {
                self.obstacles.add_junction(Junction::new(id, position, fixed));
            }
            Action::RemoveJunction(id) => {
                self.obstacles.remove_junction(id);
            }
            Action::MoveJunction(id, position) => {
                let attached = self.obstacles.junction(id).map(|j| j.attached.clone()).unwrap_or_default();
                self.obstacles.set_junction_position(id, position);
                for cid in attached {
                    if let Some(c) = self.connectors.get_mut(&cid) {
                        c.flags.needs_reroute = true;
                    }
                }
            }
            Action::AddConnector(id, source, target, routing_type) => {
                self.attach_endpoint_to_junction(source, id);
                self.attach_endpoint_to_junction(target, id);
                self.connectors.insert(id, ConnectorRef::new(id, source, target, routing_type));
            }
            Action::RemoveConnector(id) => {
                if let Some(c) = self.connectors.shift_remove(&id) {
                    self.detach_endpoint_from_junction(c.source, id);
                    self.detach_endpoint_from_junction(c.target, id);
                }
                self.remove_connector_vertices(id);
            }
            Action::SetConnectorEndpoints(id, source, target) => {
                if let Some((old_source, old_target)) = self.connectors.get(&id).map(|c| (c.source, c.target)) {
                    self.detach_endpoint_from_junction(old_source, id);
                    self.detach_endpoint_from_junction(old_target, id);
                }
                self.attach_endpoint_to_junction(source, id);
                self.attach_endpoint_to_junction(target, id);
                if let Some(c) = self.connectors.get_mut(&id) {
                    c.set_endpoints(source, target);
                }
                self.remove_connector_vertices(id);
            }
            Action::SetConnectorType(id, routing_type) => {
                if let Some(c) = self.connectors.get_mut(&id) {
                    c.set_routing_type(routing_type);
                }
                self.remove_connector_vertices(id);
            }
            Action::SetConnectorCheckpoints(id, checkpoints) => {
                if let Some(c) = self.connectors.get_mut(&id) {
                    c.checkpoints = checkpoints;
                    c.flags.needs_reroute = true;
                }
            }
            Action::SetConnectorCallback(id, callback) => {
                if let Some(c) = self.connectors.get_mut(&id) {
                    c.callback = callback;
                }
            }
        }
    }

    fn attach_endpoint_to_junction(&mut self, endpoint: Endpoint, connector: ConnectorId) {
        if let Endpoint::JunctionPin(jid, _) = endpoint {
            if let Some(j) = self.obstacles.junction_mut(jid) {
                j.attach(connector);
            }
        }
    }

    fn detach_endpoint_from_junction(&mut self, endpoint: Endpoint, connector: ConnectorId) {
        if let Endpoint::JunctionPin(jid, _) = endpoint {
            if let Some(j) = self.obstacles.junction_mut(jid) {
                j.detach(connector);
            }
        }
    }

    /// Resolves an endpoint to an absolute point and an allowed-approach
    /// direction mask (spec §4.3 pin production).
    fn resolve_endpoint(&self, endpoint: &Endpoint) -> Option<(Point, DirectionMask)> {
        match endpoint {
            Endpoint::Free(p) => Some((*p, DirectionMask::ALL)),
            Endpoint::ShapePin(shape_id, pin_id) => {
                let shape = self.obstacles.shape(*shape_id)?;
                let bounds = shape.bounds()?;
                let pin = shape.pins.iter().find(|p| p.id == *pin_id)?;
                Some((pin.location(&bounds), pin.directions))
            }
            Endpoint::JunctionPin(junction_id, pin_id) => {
                let junction = self.obstacles.junction(*junction_id)?;
                let dirs = Junction::implicit_pin_directions();
                let idx = (pin_id.index as usize) % dirs.len();
                Some((junction.position, DirectionMask::single(dirs[idx])))
            }
        }
    }

    /// Ensures every current shape has its four corner vertices present in
    /// the store, with the cyclic `sh_prev`/`sh_next` ring wired (spec §3
    /// invariant, §4.3). Shapes untouched this transaction keep their
    /// existing vertices, preserving the polyline builder's shape-subgraph
    /// cache; moved/added shapes had their old vertices removed by
    /// `remove_shape_vertices` in `apply_action`, so they are freshly
    /// inserted here at their new positions.
    fn sync_shape_vertices(&mut self) {
        let shape_ids: Vec<ShapeId> = self.obstacles.shapes().map(|s| s.id).collect();
        for sid in shape_ids {
            let Some(shape) = self.obstacles.shape(sid) else { continue };
            let corners = shape.polygon.points().to_vec();
            if corners.is_empty() {
                continue;
            }
            let mut handles = Vec::with_capacity(corners.len());
            for (i, corner) in corners.iter().enumerate() {
                let vid = VertexId::shape_corner(sid, i);
                let handle = match self.store.lookup(&vid) {
                    Some(h) => h,
                    None => match self.store.insert_vertex(vid, *corner) {
                        Ok(h) => h,
                        Err(_) => continue,
                    },
                };
                handles.push(handle);
            }
            let n = handles.len();
            for i in 0..n {
                let next = handles[(i + 1) % n];
                let prev = handles[(i + n - 1) % n];
                if let Some(v) = self.store.get_mut(handles[i]) {
                    v.sh_next = Some(next);
                    v.sh_prev = Some(prev);
                }
            }
        }
    }

    fn remove_shape_vertices(&mut self, id: ShapeId) {
        let handles: Vec<VertexHandle> = self
            .store
            .shape_vertices()
            .filter(|h| self.store.get(*h).map(|v| v.id.object.0 == id.0 && v.id.is_shape).unwrap_or(false))
            .collect();
        for h in handles {
            self.store.remove_vertex(h);
        }
    }

    fn remove_connector_vertices(&mut self, id: ConnectorId) {
        let handles: Vec<VertexHandle> = self
            .store
            .connector_vertices()
            .filter(|h| {
                self.store
                    .get(*h)
                    .map(|v| v.id.object.0 == id.0 && matches!(v.id.kind, VertexKind::ConnectorEndpoint | VertexKind::DummyPinHelper))
                    .unwrap_or(false)
            })
            .collect();
        for h in handles {
            self.store.remove_vertex(h);
        }
        self.route_handles.remove(&id);
    }

    /// The orthogonal builder rebuilds from scratch every call and has no
    /// lifecycle hook into "previous transaction" (spec §4.5 gives it no
    /// persistent subgraph the way the polyline builder keeps one) —
    /// without this, each call's intersection vertices pile up as
    /// disconnected garbage from every prior call. Router-level since only
    /// the store's owner can see across transactions.
    fn prune_dummy_orthogonal_vertices(&mut self) {
        let handles: Vec<VertexHandle> = self
            .store
            .connector_vertices()
            .filter(|h| self.store.get(*h).map(|v| matches!(v.id.kind, VertexKind::DummyOrthogonal)).unwrap_or(false))
            .collect();
        for h in handles {
            self.store.remove_vertex(h);
        }
    }

    fn clear_incident_edges(&mut self, handle: VertexHandle) {
        let edges: Vec<_> = self.store.get(handle).map(|v| v.visibility.to_vec()).unwrap_or_default();
        for e in edges {
            self.store.remove_edge(e);
        }
        if let Some(v) = self.store.get_mut(handle) {
            v.invisibility.clear();
        }
    }

    /// Step 2-3 of spec §4.10: rebuild the relevant visibility graph(s) for
    /// every connector flagged `needsReroute`/`falsePath`, then path-search
    /// each (checkpoints leg-by-leg, otherwise rubber-band from its last
    /// route), falling back to a cycle-blocker plus a straight line on
    /// failure.
    fn route_connectors(&mut self) {
        let needing: Vec<ConnectorId> = self
            .connectors
            .iter()
            .filter(|(_, c)| c.flags.active && (c.flags.needs_reroute || c.flags.false_path))
            .map(|(id, _)| *id)
            .collect();
        if needing.is_empty() {
            return;
        }

        struct Pending {
            id: ConnectorId,
            vertex_ids: Vec<VertexId>,
            routing_type: RoutingType,
        }

        let mut waypoints: Vec<(VertexId, Point, DirectionMask)> = Vec::new();
        let mut pending: Vec<Pending> = Vec::new();

        for id in needing {
            let Some(c) = self.connectors.get(&id) else { continue };
            let Some((sp, sm)) = self.resolve_endpoint(&c.source) else {
                self.diagnostics.report(Severity::Warning, &RouterError::GeometryDegenerate(format!("{id} has an unresolved source endpoint")));
                continue;
            };
            let Some((tp, tm)) = self.resolve_endpoint(&c.target) else {
                self.diagnostics.report(Severity::Warning, &RouterError::GeometryDegenerate(format!("{id} has an unresolved target endpoint")));
                continue;
            };

            if sp.distance(&tp) < 1e-9 {
                self.diagnostics.report(Severity::Warning, &RouterError::GeometryDegenerate(format!("{id} has coincident endpoints")));
                if let Some(c) = self.connectors.get_mut(&id) {
                    c.raw_route = vec![sp, tp];
                    c.display_route = vec![sp, tp];
                    c.flags.needs_reroute = false;
                    c.flags.false_path = false;
                }
                self.changed.insert(id);
                continue;
            }

            let mut vertex_ids = Vec::with_capacity(c.checkpoints.len() + 2);
            let source_vid = VertexId::connector_endpoint(id, true);
            waypoints.push((source_vid, sp, sm));
            vertex_ids.push(source_vid);
            for (i, cp) in c.checkpoints.iter().enumerate() {
                let cp_vid = VertexId::connector_checkpoint(id, i);
                waypoints.push((cp_vid, *cp, DirectionMask::ALL));
                vertex_ids.push(cp_vid);
            }
            let target_vid = VertexId::connector_endpoint(id, false);
            waypoints.push((target_vid, tp, tm));
            vertex_ids.push(target_vid);

            pending.push(Pending { id, vertex_ids, routing_type: c.routing_type });
        }

        let mut handle_by_id: HashMap<VertexId, VertexHandle> = HashMap::new();
        for (vid, point, _mask) in &waypoints {
            let handle = match self.store.lookup(vid) {
                Some(h) => {
                    self.clear_incident_edges(h);
                    if let Some(v) = self.store.get_mut(h) {
                        v.point = *point;
                    }
                    h
                }
                None => match self.store.insert_vertex(*vid, *point) {
                    Ok(h) => h,
                    Err(_) => continue,
                },
            };
            handle_by_id.insert(*vid, handle);
        }

        let polyline_waypoints: Vec<(VertexId, Point, DirectionMask)> =
            waypoints.iter().filter(|(vid, _, _)| pending.iter().any(|p| p.routing_type == RoutingType::Polyline && p.vertex_ids.contains(vid))).cloned().collect();
        let orthogonal_waypoints: Vec<(VertexId, Point, DirectionMask)> =
            waypoints.iter().filter(|(vid, _, _)| pending.iter().any(|p| p.routing_type == RoutingType::Orthogonal && p.vertex_ids.contains(vid))).cloned().collect();

        if matches!(self.mode, RouterMode::Polyline | RouterMode::Both) && !polyline_waypoints.is_empty() {
            let handles: Vec<VertexHandle> = polyline_waypoints.iter().filter_map(|(vid, _, _)| handle_by_id.get(vid).copied()).collect();
            self.polyline_builder.rebuild(&mut self.store, &self.obstacles, &handles);
        }
        if matches!(self.mode, RouterMode::Orthogonal | RouterMode::Both) && !orthogonal_waypoints.is_empty() {
            self.prune_dummy_orthogonal_vertices();
            self.orthogonal_builder.rebuild(&mut self.store, &self.obstacles, &orthogonal_waypoints);
        }

        let mut routed_segments: Vec<(Point, Point)> = Vec::new();

        for p in &pending {
            let handles: Vec<VertexHandle> = p.vertex_ids.iter().filter_map(|v| handle_by_id.get(v).copied()).collect();
            if handles.len() < 2 {
                continue;
            }

            let result = if p.vertex_ids.len() == 2 {
                let current = self.route_handles.get(&p.id).cloned().unwrap_or_default();
                path_search::rubber_band_route(&mut self.store, &self.params, &routed_segments, handles[0], handles[1], &current)
            } else {
                self.route_with_checkpoints(&handles, &routed_segments)
            };

            match result {
                Ok(path) => {
                    let points: Vec<Point> = path.iter().filter_map(|h| self.store.get(*h).map(|v| v.point)).collect();
                    for w in points.windows(2) {
                        routed_segments.push((w[0], w[1]));
                    }
                    let simplified = simplify_colinear(&points);
                    self.route_handles.insert(p.id, path);
                    if let Some(c) = self.connectors.get_mut(&p.id) {
                        c.raw_route = simplified.clone();
                        c.display_route = simplified;
                        c.flags.needs_reroute = false;
                        c.flags.false_path = false;
                    }
                    self.changed.insert(p.id);
                }
                Err(_) => {
                    self.diagnostics.report(Severity::Warning, &RouterError::NoPath);
                    path_search::mark_cycle_blocker(&mut self.store, handles[0], *handles.last().unwrap());
                    self.route_handles.remove(&p.id);
                    if let (Some((_, sp, _)), Some((_, tp, _))) =
                        (waypoints.iter().find(|(v, _, _)| Some(v) == p.vertex_ids.first()), waypoints.iter().find(|(v, _, _)| Some(v) == p.vertex_ids.last()))
                    {
                        if let Some(c) = self.connectors.get_mut(&p.id) {
                            c.raw_route = vec![*sp, *tp];
                            c.display_route = vec![*sp, *tp];
                            c.flags.needs_reroute = false;
                            c.flags.false_path = true;
                        }
                        self.changed.insert(p.id);
                    }
                }
            }
        }
    }

    /// Routes a connector leg-by-leg across its checkpoints. No rubber-band
    /// reuse across legs — an explicit scoping decision (see Open
    /// Questions below) since checkpoints already fix most of the route.
    fn route_with_checkpoints(&mut self, handles: &[VertexHandle], routed_segments: &[(Point, Point)]) -> Result<Vec<VertexHandle>, RouterError> {
        let mut full = Vec::new();
        for w in handles.windows(2) {
            let leg = path_search::find_path(&mut self.store, &self.params, routed_segments, w[0], w[1])?;
            if full.is_empty() {
                full.extend(leg);
            } else {
                full.extend(leg.into_iter().skip(1));
            }
        }
        Ok(full)
    }

    /// Step 4 of spec §4.10: simplify, analyse crossings, then nudge every
    /// active orthogonal connector's raw route in both dimensions.
    fn postprocess_orthogonal(&mut self) {
        let mut routes: Vec<OrthogonalRoute> = Vec::new();
        for (id, c) in self.connectors.iter() {
            if !c.flags.active || c.routing_type != RoutingType::Orthogonal || c.raw_route.len() < 2 {
                continue;
            }
            routes.push(OrthogonalRoute { connector: *id, points: c.raw_route.clone(), fixed_segments: fixed_segment_indices(c) });
        }
        if routes.is_empty() {
            return;
        }

        let obstacle_rects: Vec<Rect> = self.obstacles.obstacle_bounds();
        let nudge_terminal = self.params.nudge_orthogonal_segments_connected_to_shapes;
        let run_centring_prepass = self.params.perform_unifying_nudging_preprocessing_step;
        let nudge_distance = self.params.orthogonal_nudge_distance;

        for dim in [Dimension::X, Dimension::Y] {
            let infeasible = nudging::nudge_dimension(&mut routes, dim, nudge_distance, nudge_terminal, run_centring_prepass, &obstacle_rects, |segs, rts, region| {
                order_region_by_divergence(segs, rts, region, dim)
            });
            if infeasible {
                self.diagnostics.report(Severity::Warning, &RouterError::InfeasibleSeparation);
            }
        }

        for route in routes {
            if let Some(c) = self.connectors.get_mut(&route.connector) {
                c.display_route = route.points;
                self.changed.insert(route.connector);
            }
        }
    }

    /// Step 5 of spec §4.10: for every junction with two or more attached
    /// orthogonal connectors, build a minimum-terminal-spanning tree over
    /// their far endpoints plus the junction itself, improve it, and
    /// rewrite each attached connector's route as the tree path from its
    /// terminal to the junction.
    fn process_hyperedges(&mut self) {
        let junction_ids: Vec<JunctionId> = self.obstacles.junctions().map(|j| j.id).collect();
        for jid in junction_ids {
            let Some(junction) = self.obstacles.junction(jid) else { continue };
            if junction.attached.len() < 2 {
                continue;
            }
            let attached = junction.attached.clone();
            let junction_position = junction.position;

            let mut cids: Vec<ConnectorId> = Vec::new();
            let mut handles: Vec<VertexHandle> = Vec::new();
            for cid in &attached {
                let Some(c) = self.connectors.get(cid) else { continue };
                if c.routing_type != RoutingType::Orthogonal || !c.flags.active {
                    continue;
                }
                let Some(far_point) = self.far_endpoint_point(c, jid) else { continue };
                let vid = VertexId::connector_endpoint(*cid, true);
                let handle = match self.store.lookup(&vid) {
                    Some(h) => h,
                    None => match self.store.insert_vertex(vid, far_point) {
                        Ok(h) => h,
                        Err(_) => continue,
                    },
                };
                cids.push(*cid);
                handles.push(handle);
            }
            if handles.len() < 2 {
                continue;
            }

            let junction_vid = VertexId::junction(jid);
            let hub_handle = match self.store.lookup(&junction_vid) {
                Some(h) => h,
                None => match self.store.insert_vertex(junction_vid, junction_position) {
                    Ok(h) => h,
                    Err(_) => continue,
                },
            };
            handles.push(hub_handle);
            let hub_idx = handles.len() - 1;

            let mut tree = hyperedge::build_mtst(&mut self.store, &handles, cids[0]);
            hyperedge::improve(&mut tree, 4);

            for (i, cid) in cids.iter().enumerate() {
                let route = tree_path(&tree, i, hub_idx);
                if route.len() >= 2 {
                    if let Some(c) = self.connectors.get_mut(cid) {
                        c.raw_route = route.clone();
                        c.display_route = route;
                    }
                    self.changed.insert(*cid);
                }
            }
        }
    }

    fn far_endpoint_point(&self, c: &ConnectorRef, jid: JunctionId) -> Option<Point> {
        let source_is_this_junction = matches!(c.source, Endpoint::JunctionPin(j, _) if j == jid);
        let endpoint = if source_is_this_junction { &c.target } else { &c.source };
        self.resolve_endpoint(endpoint).map(|(p, _)| p)
    }

    fn fire_callbacks(&mut self) {
        for (id, c) in self.connectors.iter() {
            if self.changed.contains(id) {
                c.callback.on_route_changed(*id, &c.display_route);
            }
        }
    }
}

/// Collapses consecutive colinear points (spec §4.6 "simplify", §4.10 step
/// 4), and drops duplicate adjacent points from degenerate legs.
fn simplify_colinear(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for i in 1..points.len() - 1 {
        let prev = *out.last().unwrap();
        let cur = points[i];
        let next = points[i + 1];
        if prev.distance(&cur) < 1e-9 {
            continue;
        }
        if crate::geometry::turn(&prev, &cur, &next) == 0 {
            continue;
        }
        out.push(cur);
    }
    let last = points[points.len() - 1];
    if out.last().map(|p| p.distance(&last) > 1e-9).unwrap_or(true) {
        out.push(last);
    }
    out
}

/// Indices of `raw_route` segments that touch a checkpoint, so the
/// nudging engine treats them as fixed (spec §4.8 step 2 fixed anchors).
fn fixed_segment_indices(c: &ConnectorRef) -> Vec<usize> {
    if c.checkpoints.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for i in 0..c.raw_route.len().saturating_sub(1) {
        let a = c.raw_route[i];
        let b = c.raw_route[i + 1];
        let touches = c.checkpoints.iter().any(|cp| cp.distance(&a) < 1e-6 || cp.distance(&b) < 1e-6);
        if touches {
            out.push(i);
        }
    }
    out
}

/// Per-region ordering for the nudging engine (spec §4.7/§4.8 step 3): for
/// each shift segment, looks at the route point immediately beyond its high
/// end (falling back to the one before its low end) to tell which side of
/// `dim` the route diverges to after the shared segment, and orders
/// lower-diverging segments before higher-diverging ones. Segments that
/// diverge the same way, or that can't be told apart this way, fall back to
/// position then connector id so the order stays deterministic.
fn order_region_by_divergence(
    segments: &[crate::nudging::NudgingShiftSegment],
    routes: &[crate::nudging::OrthogonalRoute],
    region: &[usize],
    dim: Dimension,
) -> crate::crossing::PartialOrderDag {
    let items: Vec<(usize, crate::crossing::DivergenceContext, (f64, u32))> = region
        .iter()
        .map(|&idx| {
            let seg = &segments[idx];
            let route = &routes[seg.route_index];
            let ctx = crate::crossing::DivergenceContext {
                low: route.points[seg.low],
                high: route.points[seg.high],
                before_low: seg.low.checked_sub(1).map(|i| route.points[i]),
                after_high: route.points.get(seg.high + 1).copied(),
            };
            (idx, ctx, (seg.position, seg.connector.0))
        })
        .collect();
    crate::crossing::order_by_divergence(&items, dim, |a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.1.cmp(&b.1)))
}

/// Walks a [`HyperEdgeTree`] from `start` to `target` via breadth-first
/// search, ignoring per-edge connector tags — this tree is built once per
/// junction spanning every attached connector's terminal, so the route for
/// any one connector is simply the tree path back to the junction's own
/// node, not a tag-filtered sub-walk.
fn tree_path(tree: &HyperEdgeTree, start: usize, target: usize) -> Vec<Point> {
    if start == target {
        return vec![tree.nodes[start]];
    }
    let mut visited = vec![false; tree.nodes.len()];
    let mut prev = vec![usize::MAX; tree.nodes.len()];
    let mut queue = VecDeque::new();
    queue.push_back(start);
    visited[start] = true;
    while let Some(n) = queue.pop_front() {
        if n == target {
            break;
        }
        for &(a, b, _) in &tree.edges {
            let neighbor = if a == n { Some(b) } else if b == n { Some(a) } else { None };
            if let Some(m) = neighbor {
                if !visited[m] {
                    visited[m] = true;
                    prev[m] = n;
                    queue.push_back(m);
                }
            }
        }
    }
    if !visited[target] {
        return Vec::new();
    }
    let mut path = vec![target];
    let mut cur = target;
    while cur != start {
        cur = prev[cur];
        path.push(cur);
    }
    path.reverse();
    path.into_iter().map(|i| tree.nodes[i]).collect()
}

// Open Questions resolved (SPEC_FULL.md §B, recorded here and cross-linked
// from DESIGN.md):
//
// - `setRoutingOption`/`setRoutingPenalty`/`setOrthogonalNudgeDistance`
//   apply immediately rather than being queued through `Action`. Spec §5's
//   guarantee ("the action queue is the only mutable state a mutator call
//   can touch before `processTransaction` runs") is about the *visibility
//   graph and obstacle/connector registry* staying consistent across a
//   transaction boundary; these three setters touch neither, so applying
//   them eagerly cannot violate that guarantee and avoids threading a
//   `RoutingParameters` diff through the action queue for no benefit.
// - Checkpoint routing does not rubber-band across legs (`route_with_
//   checkpoints` always runs a fresh `find_path` per leg). The spec
//   describes rubber-banding as reusing the *previous whole route*; once a
//   connector has intermediate checkpoints, reusing a stale multi-leg path
//   piecemeal adds complexity with no corresponding invariant to satisfy
//   (checkpoints already pin most of the route's shape transaction to
//   transaction), so each leg is searched fresh.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Size};

    #[test]
    fn empty_router_processes_without_error() {
        let mut router = Router::new(RouterMode::Orthogonal);
        assert!(router.process_transaction().is_ok());
    }

    #[test]
    fn single_connector_routes_around_a_shape() {
        let mut router = Router::new(RouterMode::Orthogonal);
        let rect = Rect::new(Point::new(40.0, 0.0), Size::new(20.0, 100.0));
        router.add_shape(Polygon::rectangle(&rect)).unwrap();
        let id = router
            .add_connector(Endpoint::Free(Point::new(0.0, 50.0)), Endpoint::Free(Point::new(100.0, 50.0)), RoutingType::Orthogonal)
            .unwrap();
        router.process_transaction().unwrap();

        let route = router.display_route(id).unwrap();
        assert!(route.len() >= 2);
        assert_eq!(route.first().unwrap(), &Point::new(0.0, 50.0));
        assert_eq!(route.last().unwrap(), &Point::new(100.0, 50.0));
    }

    #[test]
    fn idempotent_when_nothing_changes() {
        let mut router = Router::new(RouterMode::Orthogonal);
        let id = router
            .add_connector(Endpoint::Free(Point::new(0.0, 0.0)), Endpoint::Free(Point::new(100.0, 0.0)), RoutingType::Orthogonal)
            .unwrap();
        router.process_transaction().unwrap();
        let first = router.display_route(id).unwrap();
        router.process_transaction().unwrap();
        let second = router.display_route(id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn coincident_endpoints_produce_a_degenerate_route_without_panicking() {
        let mut router = Router::new(RouterMode::Orthogonal);
        let id = router
            .add_connector(Endpoint::Free(Point::new(5.0, 5.0)), Endpoint::Free(Point::new(5.0, 5.0)), RoutingType::Orthogonal)
            .unwrap();
        router.process_transaction().unwrap();
        assert_eq!(router.display_route(id).unwrap(), vec![Point::new(5.0, 5.0), Point::new(5.0, 5.0)]);
    }

    #[test]
    fn mutating_during_processing_is_rejected() {
        struct Reentrant;
        impl RouteChangedCallback for Reentrant {
            fn on_route_changed(&self, _connector: ConnectorId, _display_route: &[Point]) {}
        }
        let mut router = Router::new(RouterMode::Orthogonal);
        router.processing = true;
        let result = router.add_connector(Endpoint::Free(Point::zero()), Endpoint::Free(Point::new(1.0, 1.0)), RoutingType::Orthogonal);
        assert!(matches!(result, Err(RouterError::InvalidTransaction)));
        router.processing = false;
    }
}
