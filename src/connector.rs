//! Connector and junction data (spec §3 `ConnectorRef`, `Junction`;
//! SPEC_FULL.md §B.1 checkpoints). Generalizes the teacher's
//! `mir::Edge`/`TerminalPort` pair, which only ever referenced two shape
//! endpoints, into the spec's richer endpoint/checkpoint/callback model.

use crate::geometry::Point;
use crate::ids::{ConnectorId, JunctionId, PinId, ShapeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingType {
    Polyline,
    Orthogonal,
}

/// A connector endpoint is either a free-floating point or a reference to a
/// pin on a shape or junction (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Endpoint {
    Free(Point),
    ShapePin(ShapeId, PinId),
    JunctionPin(JunctionId, PinId),
}

impl Endpoint {
    pub fn is_free(&self) -> bool {
        matches!(self, Endpoint::Free(_))
    }
}

/// Per-connector flags (spec §3: `{needsReroute, falsePath, active,
/// hatesCrossings}`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectorFlags {
    pub needs_reroute: bool,
    pub false_path: bool,
    pub active: bool,
    pub hates_crossings: bool,
}

/// A callback invoked once a connector's route changes (spec §3: "callback
/// to notify of changes"). The router invokes these in the order
/// connectors were added (spec §5 ordering guarantee).
pub trait RouteChangedCallback {
    fn on_route_changed(&self, connector: ConnectorId, display_route: &[Point]);
}

/// No-op callback used when a client doesn't care to be notified.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl RouteChangedCallback for NoopCallback {
    fn on_route_changed(&self, _connector: ConnectorId, _display_route: &[Point]) {}
}

pub struct ConnectorRef {
    pub id: ConnectorId,
    pub source: Endpoint,
    pub target: Endpoint,
    pub routing_type: RoutingType,
    /// Points the route must pass through, in order (SPEC_FULL.md §B.1).
    pub checkpoints: Vec<Point>,
    pub raw_route: Vec<Point>,
    pub display_route: Vec<Point>,
    pub flags: ConnectorFlags,
    pub callback: Box<dyn RouteChangedCallback>,
}

impl std::fmt::Debug for ConnectorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRef")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("routing_type", &self.routing_type)
            .field("checkpoints", &self.checkpoints)
            .field("raw_route", &self.raw_route)
            .field("display_route", &self.display_route)
            .field("flags", &self.flags)
            .finish()
    }
}

impl ConnectorRef {
    pub fn new(id: ConnectorId, source: Endpoint, target: Endpoint, routing_type: RoutingType) -> Self {
        Self {
            id,
            source,
            target,
            routing_type,
            checkpoints: Vec::new(),
            raw_route: Vec::new(),
            display_route: Vec::new(),
            flags: ConnectorFlags { active: true, needs_reroute: true, ..Default::default() },
            callback: Box::new(NoopCallback),
        }
    }

    pub fn set_endpoints(&mut self, source: Endpoint, target: Endpoint) {
        self.source = source;
        self.target = target;
        self.flags.needs_reroute = true;
    }

    pub fn set_routing_type(&mut self, routing_type: RoutingType) {
        if self.routing_type != routing_type {
            self.routing_type = routing_type;
            self.flags.needs_reroute = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connector_needs_reroute_and_is_active() {
        let c = ConnectorRef::new(
            ConnectorId(0),
            Endpoint::Free(Point::zero()),
            Endpoint::Free(Point::new(10.0, 10.0)),
            RoutingType::Orthogonal,
        );
        assert!(c.flags.needs_reroute);
        assert!(c.flags.active);
    }

    #[test]
    fn set_endpoints_marks_reroute() {
        let mut c = ConnectorRef::new(
            ConnectorId(0),
            Endpoint::Free(Point::zero()),
            Endpoint::Free(Point::new(10.0, 10.0)),
            RoutingType::Orthogonal,
        );
        c.flags.needs_reroute = false;
        c.set_endpoints(Endpoint::Free(Point::new(1.0, 1.0)), Endpoint::Free(Point::new(10.0, 10.0)));
        assert!(c.flags.needs_reroute);
    }
}
