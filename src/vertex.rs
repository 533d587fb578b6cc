//! Vertex/edge store (spec §4.2).
//!
//! Keys vertices by [`VertexId`]; the actual adjacency lists and scratch
//! fields used by path search live on [`Vertex`], addressed through the
//! arena indices ([`VertexHandle`]/[`EdgeHandle`]) minted by
//! [`crate::store::VertexEdgeStore`].

use crate::geometry::{DirectionMask, Point};
use crate::ids::{PropertyFlags, VertexId};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexHandle(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeHandle(pub(crate) usize);

/// Owns a [`Point`] and a [`VertexId`]; holds adjacency split into
/// visibility and invisibility edges, a per-direction visibility bitmask,
/// shape-ring links, and search scratch fields (spec §3).
#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: VertexId,
    pub point: Point,
    pub property_flags: PropertyFlags,

    /// Edges this vertex can see along (line-of-sight / orthogonal
    /// visibility established).
    pub visibility: SmallVec<[EdgeHandle; 4]>,
    /// Edges explicitly known *not* to exist — kept so re-querying visibility
    /// between the same pair of corners doesn't redo the intersection test
    /// (spec §4.2: "two classes of vertices share the same adjacency
    /// representation").
    pub invisibility: SmallVec<[VertexHandle; 4]>,

    /// Which of {Up, Down, Left, Right} this vertex may be approached from
    /// for orthogonal routing (spec §3).
    pub direction_mask: DirectionMask,

    /// Neighbouring corner vertices of the same shape, in polygon order
    /// (spec §3 invariant: "shape corners form a cyclic doubly-linked
    /// ring"). `None` for non-shape vertices.
    pub sh_prev: Option<VertexHandle>,
    pub sh_next: Option<VertexHandle>,

    // --- search scratch (spec §3 Vertex: pathNext, sptfDist, sptfRoot)
    pub path_next: Option<VertexHandle>,
    pub sptf_dist: f64,
    pub sptf_root: Option<VertexHandle>,
}

impl Vertex {
    pub fn new(id: VertexId, point: Point) -> Self {
        Self {
            id,
            point,
            property_flags: PropertyFlags::none(),
            visibility: SmallVec::new(),
            invisibility: SmallVec::new(),
            direction_mask: DirectionMask::ALL,
            sh_prev: None,
            sh_next: None,
            path_next: None,
            sptf_dist: f64::INFINITY,
            sptf_root: None,
        }
    }

    pub fn reset_search_scratch(&mut self) {
        self.path_next = None;
        self.sptf_dist = f64::INFINITY;
        self.sptf_root = None;
    }

    pub fn is_shape_corner(&self) -> bool {
        self.id.is_shape
    }
}

/// Ordered pair of vertices, a distance, an orthogonal flag, and a
/// cycle-blocker flag (spec §3 Edge). Lives in the arena; both endpoints'
/// adjacency lists reference it by [`EdgeHandle`].
#[derive(Debug, Clone)]
pub struct Edge {
    pub u: VertexHandle,
    pub v: VertexHandle,
    pub distance: f64,
    pub orthogonal: bool,
    /// Marks a pair the path search has proven unreachable; short-circuits
    /// future searches between the same endpoints (spec §4.6/§7 no-path).
    pub cycle_blocker: bool,
    /// Crosses a cluster boundary — the path search penalises traversal
    /// (spec §4.4 "additional edges crossing cluster boundaries are
    /// tagged").
    pub crosses_cluster_boundary: bool,
}

impl Edge {
    pub fn new(u: VertexHandle, v: VertexHandle, distance: f64, orthogonal: bool) -> Self {
        Self {
            u,
            v,
            distance,
            orthogonal,
            cycle_blocker: false,
            crosses_cluster_boundary: false,
        }
    }

    pub fn other(&self, from: VertexHandle) -> VertexHandle {
        if from == self.u {
            self.v
        } else {
            self.u
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ShapeId, VertexId};

    #[test]
    fn vertex_reset_scratch() {
        let mut v = Vertex::new(VertexId::shape_corner(ShapeId(1), 0), Point::zero());
        v.sptf_dist = 4.0;
        v.path_next = Some(VertexHandle(2));
        v.reset_search_scratch();
        assert_eq!(v.sptf_dist, f64::INFINITY);
        assert!(v.path_next.is_none());
    }

    #[test]
    fn edge_other_endpoint() {
        let e = Edge::new(VertexHandle(0), VertexHandle(1), 5.0, false);
        assert_eq!(e.other(VertexHandle(0)), VertexHandle(1));
        assert_eq!(e.other(VertexHandle(1)), VertexHandle(0));
    }
}
