//! Arena owning every [`Vertex`] and [`Edge`] in the visibility graph
//! (spec §4.2, §9 "model edges as elements of an arena owned by the
//! router"). Generalizes the teacher's `RouteGraph` (an arena-over-index
//! wrapper around a `petgraph` graph in `layout.rs`) to the spec's split
//! visibility/invisibility adjacency and typed [`VertexId`] lookups.

use crate::error::RouterError;
use crate::geometry::Point;
use crate::ids::VertexId;
use crate::vertex::{Edge, EdgeHandle, Vertex, VertexHandle};
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct VertexEdgeStore {
    vertices: Vec<Option<Vertex>>,
    edges: Vec<Option<Edge>>,
    by_id: IndexMap<VertexId, VertexHandle>,
    free_vertices: Vec<usize>,
    free_edges: Vec<usize>,
}

impl VertexEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new vertex. Fails with [`RouterError::DuplicateId`] if
    /// `id` is already present (spec §4.2 Failure).
    pub fn insert_vertex(&mut self, id: VertexId, point: Point) -> Result<VertexHandle, RouterError> {
        if self.by_id.contains_key(&id) {
            return Err(RouterError::DuplicateId(format!("{id:?}")));
        }
        let handle = if let Some(slot) = self.free_vertices.pop() {
            self.vertices[slot] = Some(Vertex::new(id, point));
            VertexHandle(slot)
        } else {
            self.vertices.push(Some(Vertex::new(id, point)));
            VertexHandle(self.vertices.len() - 1)
        };
        self.by_id.insert(id, handle);
        Ok(handle)
    }

    pub fn lookup(&self, id: &VertexId) -> Option<VertexHandle> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, handle: VertexHandle) -> Option<&Vertex> {
        self.vertices.get(handle.0).and_then(|v| v.as_ref())
    }

    pub fn get_mut(&mut self, handle: VertexHandle) -> Option<&mut Vertex> {
        self.vertices.get_mut(handle.0).and_then(|v| v.as_mut())
    }

    /// Removes a vertex and every edge incident to it, patching both
    /// adjacency lists of each neighbour (spec §4.2).
    pub fn remove_vertex(&mut self, handle: VertexHandle) {
        let Some(vertex) = self.vertices.get(handle.0).and_then(|v| v.as_ref()) else {
            return;
        };
        let id = vertex.id;
        let incident: Vec<EdgeHandle> = vertex.visibility.to_vec();
        for eh in incident {
            self.remove_edge(eh);
        }
        self.by_id.shift_remove(&id);
        self.vertices[handle.0] = None;
        self.free_vertices.push(handle.0);
    }

    /// Returns the existing edge between `u` and `v`, if any — an O(degree)
    /// scan of `u`'s adjacency, per spec §4.2's `Edge.exists` contract.
    pub fn find_edge(&self, u: VertexHandle, v: VertexHandle) -> Option<EdgeHandle> {
        let vertex = self.get(u)?;
        vertex
            .visibility
            .iter()
            .copied()
            .find(|&eh| self.edges[eh.0].as_ref().map(|e| e.other(u) == v).unwrap_or(false))
    }

    /// Inserts an edge `u`-`v` unless one already exists (spec §4.2:
    /// "callers depend on this to avoid duplicates").
    pub fn insert_edge(&mut self, u: VertexHandle, v: VertexHandle, distance: f64, orthogonal: bool) -> EdgeHandle {
        if let Some(existing) = self.find_edge(u, v) {
            return existing;
        }
        let edge = Edge::new(u, v, distance, orthogonal);
        let handle = if let Some(slot) = self.free_edges.pop() {
            self.edges[slot] = Some(edge);
            EdgeHandle(slot)
        } else {
            self.edges.push(Some(edge));
            EdgeHandle(self.edges.len() - 1)
        };
        if let Some(vu) = self.get_mut(u) {
            vu.visibility.push(handle);
        }
        if let Some(vv) = self.get_mut(v) {
            vv.visibility.push(handle);
        }
        handle
    }

    pub fn remove_edge(&mut self, handle: EdgeHandle) {
        let Some(edge) = self.edges.get(handle.0).and_then(|e| e.as_ref()).cloned() else {
            return;
        };
        for endpoint in [edge.u, edge.v] {
            if let Some(vx) = self.get_mut(endpoint) {
                vx.visibility.retain(|&eh| eh != handle);
            }
        }
        self.edges[handle.0] = None;
        self.free_edges.push(handle.0);
    }

    pub fn edge(&self, handle: EdgeHandle) -> Option<&Edge> {
        self.edges.get(handle.0).and_then(|e| e.as_ref())
    }

    pub fn edge_mut(&mut self, handle: EdgeHandle) -> Option<&mut Edge> {
        self.edges.get_mut(handle.0).and_then(|e| e.as_mut())
    }

    pub fn mark_invisible(&mut self, u: VertexHandle, v: VertexHandle) {
        if let Some(vu) = self.get_mut(u) {
            if !vu.invisibility.contains(&v) {
                vu.invisibility.push(v);
            }
        }
        if let Some(vv) = self.get_mut(v) {
            if !vv.invisibility.contains(&u) {
                vv.invisibility.push(u);
            }
        }
    }

    pub fn is_marked_invisible(&self, u: VertexHandle, v: VertexHandle) -> bool {
        self.get(u).map(|vx| vx.invisibility.contains(&v)).unwrap_or(false)
    }

    /// Shape-corner vertices only (long-lived; rebuilt when a shape's
    /// polygon changes, spec §4.2).
    pub fn shape_vertices(&self) -> impl Iterator<Item = VertexHandle> + '_ {
        self.vertices.iter().enumerate().filter_map(|(i, v)| {
            v.as_ref().filter(|v| v.is_shape_corner()).map(|_| VertexHandle(i))
        })
    }

    /// Connector-endpoint vertices only (short-lived per reroute, spec
    /// §4.2).
    pub fn connector_vertices(&self) -> impl Iterator<Item = VertexHandle> + '_ {
        self.vertices.iter().enumerate().filter_map(|(i, v)| {
            v.as_ref().filter(|v| !v.is_shape_corner()).map(|_| VertexHandle(i))
        })
    }

    pub fn all_vertices(&self) -> impl Iterator<Item = VertexHandle> + '_ {
        self.vertices.iter().enumerate().filter_map(|(i, v)| v.as_ref().map(|_| VertexHandle(i)))
    }

    pub fn reset_all_search_scratch(&mut self) {
        for v in self.vertices.iter_mut().flatten() {
            v.reset_search_scratch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ShapeId, VertexId};

    fn id(n: usize) -> VertexId {
        VertexId::shape_corner(ShapeId(1), n)
    }

    #[test]
    fn insert_and_lookup() {
        let mut store = VertexEdgeStore::new();
        let h = store.insert_vertex(id(0), Point::new(1.0, 2.0)).unwrap();
        assert_eq!(store.lookup(&id(0)), Some(h));
        assert_eq!(store.get(h).unwrap().point, Point::new(1.0, 2.0));
    }

    #[test]
    fn duplicate_id_fails() {
        let mut store = VertexEdgeStore::new();
        store.insert_vertex(id(0), Point::zero()).unwrap();
        assert!(matches!(store.insert_vertex(id(0), Point::zero()), Err(RouterError::DuplicateId(_))));
    }

    #[test]
    fn edge_exists_is_idempotent() {
        let mut store = VertexEdgeStore::new();
        let a = store.insert_vertex(id(0), Point::zero()).unwrap();
        let b = store.insert_vertex(id(1), Point::new(10.0, 0.0)).unwrap();
        let e1 = store.insert_edge(a, b, 10.0, false);
        let e2 = store.insert_edge(a, b, 10.0, false);
        assert_eq!(e1, e2);
        assert_eq!(store.get(a).unwrap().visibility.len(), 1);
    }

    #[test]
    fn remove_vertex_patches_neighbours() {
        let mut store = VertexEdgeStore::new();
        let a = store.insert_vertex(id(0), Point::zero()).unwrap();
        let b = store.insert_vertex(id(1), Point::new(10.0, 0.0)).unwrap();
        store.insert_edge(a, b, 10.0, false);
        store.remove_vertex(a);
        assert!(store.get(a).is_none());
        assert!(store.get(b).unwrap().visibility.is_empty());
    }
}
