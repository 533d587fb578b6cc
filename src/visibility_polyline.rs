//! Polyline visibility builder (spec §4.4).
//!
//! Builds a sparse visibility graph: for every pair of shape-corner
//! vertices, an edge exists iff the open segment between them does not
//! cross any shape polygon's closed interior. Connector endpoints get the
//! same treatment restricted to endpoint-to-shape-corner edges, so repeated
//! transactions can keep the shape-to-shape subgraph and only rebuild
//! endpoint incidence (spec §4.4).
//!
//! Grounded on the teacher's `connect_nearest_neighbor_edge_junctions`
//! (`layout.rs`), generalized from "four nearest grid neighbours" to full
//! open-segment-vs-polygon visibility.

use crate::geometry::DEFAULT_TOLERANCE;
use crate::obstacle::ObstacleRegistry;
use crate::store::VertexEdgeStore;
use crate::vertex::VertexHandle;

#[derive(Debug, Default)]
pub struct PolylineVisibilityBuilder {
    /// True once the shape-to-shape subgraph has been built at least once;
    /// subsequent calls only rebuild endpoint incidence unless the caller
    /// forces a full rebuild (spec §4.4 "For repeated transactions the
    /// builder keeps the shape-to-shape subgraph").
    shape_subgraph_built: bool,
    ignore_regions: bool,
}

impl PolylineVisibilityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ignore_regions(&mut self, ignore: bool) {
        self.ignore_regions = ignore;
    }

    pub fn invalidate_shape_subgraph(&mut self) {
        self.shape_subgraph_built = false;
    }

    /// Rebuilds the shape-corner-to-shape-corner subgraph if stale, then
    /// always rebuilds connector-endpoint incidence. Returns the number of
    /// edges inserted, for diagnostics.
    pub fn rebuild(
        &mut self,
        store: &mut VertexEdgeStore,
        obstacles: &ObstacleRegistry,
        endpoint_vertices: &[VertexHandle],
    ) -> usize {
        let mut inserted = 0;

        if !self.shape_subgraph_built {
            inserted += self.build_shape_subgraph(store, obstacles);
            self.shape_subgraph_built = true;
        }

        inserted += self.build_endpoint_incidence(store, obstacles, endpoint_vertices);
        inserted
    }

    fn build_shape_subgraph(&self, store: &mut VertexEdgeStore, obstacles: &ObstacleRegistry) -> usize {
        let shape_handles: Vec<VertexHandle> = store.shape_vertices().collect();
        self.connect_mutually_visible(store, obstacles, &shape_handles, &shape_handles)
    }

    fn build_endpoint_incidence(
        &self,
        store: &mut VertexEdgeStore,
        obstacles: &ObstacleRegistry,
        endpoint_vertices: &[VertexHandle],
    ) -> usize {
        let shape_handles: Vec<VertexHandle> = store.shape_vertices().collect();
        let mut inserted = self.connect_mutually_visible(store, obstacles, endpoint_vertices, &shape_handles);
        // Endpoints may also see each other directly (spec §4.4 restricts
        // to "endpoint-to-shape-corner edges" for the *shared* subgraph,
        // but a connector's own two endpoints — and any other endpoints
        // live in the same transaction — still need direct visibility).
        inserted += self.connect_mutually_visible(store, obstacles, endpoint_vertices, endpoint_vertices);
        inserted
    }

    fn connect_mutually_visible(
        &self,
        store: &mut VertexEdgeStore,
        obstacles: &ObstacleRegistry,
        group_a: &[VertexHandle],
        group_b: &[VertexHandle],
    ) -> usize {
        let mut inserted = 0;
        for (ai, &a) in group_a.iter().enumerate() {
            let start = if std::ptr::eq(group_a, group_b) { ai + 1 } else { 0 };
            for &b in &group_b[start..] {
                if a == b {
                    continue;
                }
                if store.find_edge(a, b).is_some() || store.is_marked_invisible(a, b) {
                    continue;
                }
                let Some(va) = store.get(a) else { continue };
                let Some(vb) = store.get(b) else { continue };
                let (pa, pb) = (va.point, vb.point);

                let blocked = obstacles.shapes().any(|s| {
                    !s.polygon.is_degenerate() && s.polygon.segment_crosses_interior(&pa, &pb, DEFAULT_TOLERANCE)
                });

                if blocked {
                    store.mark_invisible(a, b);
                    continue;
                }

                let distance = pa.distance(&pb);
                let edge = store.insert_edge(a, b, distance, false);

                if !self.ignore_regions {
                    let midpoint = crate::geometry::Point::new((pa.x + pb.x) / 2.0, (pa.y + pb.y) / 2.0);
                    if obstacles.cluster_containing(&midpoint).is_some() {
                        if let Some(e) = store.edge_mut(edge) {
                            e.crosses_cluster_boundary = true;
                        }
                    }
                }
                inserted += 1;
            }
        }
        inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon, Rect, Size};
    use crate::ids::{ShapeId, VertexId};
    use crate::obstacle::Shape;

    #[test]
    fn corners_of_disjoint_shapes_see_each_other() {
        let mut store = VertexEdgeStore::new();
        let mut obstacles = ObstacleRegistry::new();

        let rect_a = Rect::new(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let rect_b = Rect::new(Point::new(100.0, 0.0), Size::new(10.0, 10.0));
        obstacles.add_shape(Shape::new(ShapeId(1), Polygon::rectangle(&rect_a)));
        obstacles.add_shape(Shape::new(ShapeId(2), Polygon::rectangle(&rect_b)));

        for (shape_id, rect) in [(ShapeId(1), rect_a), (ShapeId(2), rect_b)] {
            for (i, corner) in rect.corners_clockwise().iter().enumerate() {
                store.insert_vertex(VertexId::shape_corner(shape_id, i), *corner).unwrap();
            }
        }

        let mut builder = PolylineVisibilityBuilder::new();
        let inserted = builder.rebuild(&mut store, &obstacles, &[]);
        assert!(inserted > 0);

        let a0 = store.lookup(&VertexId::shape_corner(ShapeId(1), 1)).unwrap();
        let b0 = store.lookup(&VertexId::shape_corner(ShapeId(2), 0)).unwrap();
        assert!(store.find_edge(a0, b0).is_some());
    }

    #[test]
    fn visibility_blocked_by_intervening_shape() {
        let mut store = VertexEdgeStore::new();
        let mut obstacles = ObstacleRegistry::new();

        let left = Rect::new(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        let blocker = Rect::new(Point::new(20.0, -50.0), Size::new(10.0, 200.0));
        let right = Rect::new(Point::new(40.0, 0.0), Size::new(10.0, 10.0));

        obstacles.add_shape(Shape::new(ShapeId(1), Polygon::rectangle(&left)));
        obstacles.add_shape(Shape::new(ShapeId(2), Polygon::rectangle(&blocker)));
        obstacles.add_shape(Shape::new(ShapeId(3), Polygon::rectangle(&right)));

        for (shape_id, rect) in [(ShapeId(1), left), (ShapeId(2), blocker), (ShapeId(3), right)] {
            for (i, corner) in rect.corners_clockwise().iter().enumerate() {
                store.insert_vertex(VertexId::shape_corner(shape_id, i), *corner).unwrap();
            }
        }

        let mut builder = PolylineVisibilityBuilder::new();
        builder.rebuild(&mut store, &obstacles, &[]);

        let left_corner = store.lookup(&VertexId::shape_corner(ShapeId(1), 1)).unwrap();
        let right_corner = store.lookup(&VertexId::shape_corner(ShapeId(3), 0)).unwrap();
        assert!(store.find_edge(left_corner, right_corner).is_none());
    }
}
