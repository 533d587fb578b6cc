//! Incremental, object-avoiding line router for polyline and orthogonal
//! connectors (spec §1). `Router` is the entry point; everything else is a
//! module it composes.

pub mod config;
pub mod connector;
pub mod crossing;
pub mod error;
pub mod geometry;
pub mod hyperedge;
pub mod ids;
pub mod nudging;
pub mod obstacle;
pub mod path_search;
pub mod router;
pub mod separation;
pub mod store;
pub mod svg_debug;
pub mod vertex;
pub mod visibility_orthogonal;
pub mod visibility_polyline;

pub use config::{PenaltyKind, RoutingOption, RoutingParameters};
pub use connector::{ConnectorRef, Endpoint, RouteChangedCallback, RoutingType};
pub use error::{Diagnostics, LogDiagnostics, RouterError};
pub use ids::{ClusterId, ConnectorId, JunctionId, PinId, ShapeId};
pub use obstacle::{Cluster, Junction, ObstacleRegistry, Pin, Shape};
pub use router::{Router, RouterMode};
