//! Typed identifiers for every vertex, obstacle, and connector the router
//! owns (spec §3 `VertexId`, §9 typed-index design note).

use derive_more::Display;
use std::fmt;

/// Opaque id for a client-registered object: a shape, junction, cluster, or
/// connector. The router assigns these on registration (spec §3 Lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "obj#{}", _0)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "shape#{}", _0)]
pub struct ShapeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "junction#{}", _0)]
pub struct JunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "cluster#{}", _0)]
pub struct ClusterId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "connector#{}", _0)]
pub struct ConnectorId(pub u32);

/// Identifies a pin on a shape or junction: the owning object plus an
/// object-local index (spec §3: "A pin is (shape, relative-position ...)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "{}.pin{}", owner, index)]
pub struct PinId {
    pub owner: ObjectId,
    pub index: u16,
}

impl PinId {
    pub fn new(owner: ObjectId, index: u16) -> Self {
        Self { owner, index }
    }
}

/// Shape corners are 0..3, shape mid-edge vertices are 4..7 (spec §3), with
/// a fixed side convention: 0=top-left,1=top-right,2=bottom-right,
/// 3=bottom-left corners; 4=top,5=right,6=bottom,7=left mid-edges.
/// `Unassigned` is the sentinel used for introduced points (e.g. orthogonal
/// visibility intersections) whose side is not yet known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexNumber {
    Corner(u8),
    MidEdge(u8),
    Unassigned,
}

impl VertexNumber {
    pub fn corner(i: usize) -> Self {
        VertexNumber::Corner((i % 4) as u8)
    }
}

impl fmt::Display for VertexNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VertexNumber::Corner(n) => write!(f, "corner{n}"),
            VertexNumber::MidEdge(n) => write!(f, "mid{n}"),
            VertexNumber::Unassigned => write!(f, "unassigned"),
        }
    }
}

/// Per-dimension long-range visibility hints carried on a [`VertexId`]
/// (spec §3): whether a shape edge, or a connection point, has already been
/// crossed towards the lower or higher position in each dimension. Path
/// search and the orthogonal sweep both read and write these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropertyFlags {
    bits: u8,
}

impl PropertyFlags {
    const SHAPE_EDGE_LOW: u8 = 1 << 0;
    const SHAPE_EDGE_HIGH: u8 = 1 << 1;
    const CONN_POINT_LOW: u8 = 1 << 2;
    const CONN_POINT_HIGH: u8 = 1 << 3;

    pub fn none() -> Self {
        Self::default()
    }

    pub fn set_shape_edge(&mut self, low: bool, high: bool) {
        if low {
            self.bits |= Self::SHAPE_EDGE_LOW;
        }
        if high {
            self.bits |= Self::SHAPE_EDGE_HIGH;
        }
    }

    pub fn set_conn_point(&mut self, low: bool, high: bool) {
        if low {
            self.bits |= Self::CONN_POINT_LOW;
        }
        if high {
            self.bits |= Self::CONN_POINT_HIGH;
        }
    }

    pub fn has_seen_shape_edge_low(&self) -> bool {
        self.bits & Self::SHAPE_EDGE_LOW != 0
    }
    pub fn has_seen_shape_edge_high(&self) -> bool {
        self.bits & Self::SHAPE_EDGE_HIGH != 0
    }
    pub fn has_seen_conn_point_low(&self) -> bool {
        self.bits & Self::CONN_POINT_LOW != 0
    }
    pub fn has_seen_conn_point_high(&self) -> bool {
        self.bits & Self::CONN_POINT_HIGH != 0
    }

    pub fn union(self, other: PropertyFlags) -> PropertyFlags {
        PropertyFlags { bits: self.bits | other.bits }
    }
}

/// Reserved vertex kinds that don't correspond to a client-registered
/// object (spec §3: "Reserved ids distinguish dummy-orthogonal,
/// dummy-shape-edge, dummy-pin-helper, and dimension-change vertices").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    ShapeCorner,
    ConnectorEndpoint,
    Junction,
    Pin,
    DummyOrthogonal,
    DummyShapeEdge,
    DummyPinHelper,
    DimensionChange,
}

/// Identifies a vertex in the visibility graph: the owning object, whether
/// that object is a shape, and the long-range-visibility property flags
/// (spec §3). Distinct from [`crate::store::VertexHandle`], which is the
/// arena index used for O(1) lookup once a vertex has been inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId {
    pub object: ObjectId,
    pub is_shape: bool,
    pub kind: VertexKind,
    pub vn: VertexNumber,
    /// Disambiguates otherwise-identical ids, e.g. several dummy vertices
    /// created during one path search.
    pub disambiguator: u32,
}

impl VertexId {
    pub fn shape_corner(shape: ShapeId, corner: usize) -> Self {
        Self {
            object: ObjectId(shape.0),
            is_shape: true,
            kind: VertexKind::ShapeCorner,
            vn: VertexNumber::corner(corner),
            disambiguator: 0,
        }
    }

    pub fn connector_endpoint(connector: ConnectorId, is_source: bool) -> Self {
        Self {
            object: ObjectId(connector.0),
            is_shape: false,
            kind: VertexKind::ConnectorEndpoint,
            vn: VertexNumber::Unassigned,
            disambiguator: if is_source { 0 } else { 1 },
        }
    }

    /// A routing checkpoint belonging to `connector` (SPEC_FULL.md §B.1):
    /// a waypoint its route must pass through, treated as an intermediate
    /// search endpoint rather than a dummy vertex.
    pub fn connector_checkpoint(connector: ConnectorId, index: usize) -> Self {
        Self {
            object: ObjectId(connector.0),
            is_shape: false,
            kind: VertexKind::DummyPinHelper,
            vn: VertexNumber::Unassigned,
            disambiguator: 1000 + index as u32,
        }
    }

    pub fn junction(junction: JunctionId) -> Self {
        Self {
            object: ObjectId(junction.0),
            is_shape: false,
            kind: VertexKind::Junction,
            vn: VertexNumber::Unassigned,
            disambiguator: 0,
        }
    }

    pub fn pin(pin: PinId) -> Self {
        Self {
            object: pin.owner,
            is_shape: false,
            kind: VertexKind::Pin,
            vn: VertexNumber::Unassigned,
            disambiguator: pin.index as u32,
        }
    }

    pub fn dummy(kind: VertexKind, disambiguator: u32) -> Self {
        Self {
            object: ObjectId(u32::MAX),
            is_shape: false,
            kind,
            vn: VertexNumber::Unassigned,
            disambiguator,
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(
            self.kind,
            VertexKind::DummyOrthogonal
                | VertexKind::DummyShapeEdge
                | VertexKind::DummyPinHelper
                | VertexKind::DimensionChange
        )
    }
}
