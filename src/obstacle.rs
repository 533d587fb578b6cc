//! Obstacle registry (spec §4.3): shapes, junctions, clusters, and
//! connection pins. Generalizes the teacher's tagged-variant `NodeKind`
//! (`mir.rs`) into the `{Shape, Junction}` sum type spec §3 calls for, plus
//! `Cluster` as a third, routing-relevant (but not obstacle-for-visibility)
//! polygon.

use crate::geometry::{DirectionMask, Point, Polygon, Rect};
use crate::ids::{ClusterId, JunctionId, PinId, ShapeId};
use indexmap::IndexMap;

/// A pin is a named connection point on a shape or junction: a relative
/// position plus the directions a connector may approach from (spec §4.3).
#[derive(Debug, Clone)]
pub struct Pin {
    pub id: PinId,
    /// Position relative to the owner's bounding rect, each component in
    /// `0.0..=1.0`.
    pub relative_position: (f64, f64),
    pub directions: DirectionMask,
}

impl Pin {
    pub fn new(id: PinId, relative_position: (f64, f64), directions: DirectionMask) -> Self {
        Self { id, relative_position, directions }
    }

    /// Absolute point at which this pin produces a routing vertex (spec
    /// §4.3: "produces a vertex at routing time").
    pub fn location(&self, owner_bounds: &Rect) -> Point {
        Point::new(
            owner_bounds.min_x() + owner_bounds.size.width * self.relative_position.0,
            owner_bounds.min_y() + owner_bounds.size.height * self.relative_position.1,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub id: ShapeId,
    pub polygon: Polygon,
    pub pins: Vec<Pin>,
}

impl Shape {
    pub fn new(id: ShapeId, polygon: Polygon) -> Self {
        Self { id, polygon, pins: Vec::new() }
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.polygon.bounds()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        let pts: Vec<Point> = self.polygon.points().iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect();
        self.polygon = Polygon::new(pts);
    }

    pub fn set_polygon(&mut self, polygon: Polygon) {
        self.polygon = polygon;
    }
}

/// A junction: a position, the set of attached connector endpoints, and a
/// fixed/free bit (spec §3 `Junction`). Doubles as the `Junction` obstacle
/// variant, whose four implicit pins are at {Up, Down, Left, Right}.
#[derive(Debug, Clone)]
pub struct Junction {
    pub id: JunctionId,
    pub position: Point,
    pub fixed: bool,
    pub attached: Vec<crate::ids::ConnectorId>,
}

impl Junction {
    pub fn new(id: JunctionId, position: Point, fixed: bool) -> Self {
        Self { id, position, fixed, attached: Vec::new() }
    }

    pub fn attach(&mut self, connector: crate::ids::ConnectorId) {
        if !self.attached.contains(&connector) {
            self.attached.push(connector);
        }
    }

    pub fn detach(&mut self, connector: crate::ids::ConnectorId) {
        self.attached.retain(|&c| c != connector);
    }

    /// The junction's four implicit pins, one per compass direction, each
    /// degenerate to the junction's own point (spec §3).
    pub fn implicit_pin_directions() -> [crate::geometry::Direction; 4] {
        crate::geometry::Direction::ALL
    }
}

/// A convex region connectors may be penalised for crossing (spec §3). The
/// layout engine that keeps cluster polygons convex is an external
/// collaborator (spec §1); this registry only stores the polygon and id.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    pub polygon: Polygon,
}

impl Cluster {
    pub fn new(id: ClusterId, polygon: Polygon) -> Self {
        Self { id, polygon }
    }
}

/// A shape or a junction — the two things visibility builders treat as
/// obstacles (spec §3 `Obstacle`).
#[derive(Debug, Clone)]
pub enum Obstacle {
    Shape(Shape),
    Junction(Junction),
}

impl Obstacle {
    pub fn bounds(&self) -> Option<Rect> {
        match self {
            Obstacle::Shape(s) => s.bounds(),
            Obstacle::Junction(j) => Some(Rect::new(j.position, crate::geometry::Size::new(0.0, 0.0))),
        }
    }

    pub fn is_position_fixed(&self) -> bool {
        match self {
            Obstacle::Shape(_) => true,
            Obstacle::Junction(j) => j.fixed,
        }
    }
}

/// Owns shapes and junctions, tracks the dirty flag that forces a
/// visibility-graph rebuild, and exposes clockwise corner iteration plus
/// pins (spec §4.3). Clusters are stored alongside since they share the
/// registry's lifecycle but never participate in visibility blocking.
#[derive(Debug, Default)]
pub struct ObstacleRegistry {
    shapes: IndexMap<ShapeId, Shape>,
    junctions: IndexMap<JunctionId, Junction>,
    clusters: IndexMap<ClusterId, Cluster>,
    dirty: bool,
}

impl ObstacleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.insert(shape.id, shape);
        self.dirty = true;
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Shape> {
        self.dirty = true;
        self.shapes.shift_remove(&id)
    }

    /// Plain mutable access, for callers that change non-geometric state
    /// (e.g. a shape's pins) that doesn't require a visibility rebuild. Geometry
    /// changes must go through [`Self::translate_shape`]/[`Self::set_shape_polygon`]
    /// so the dirty flag only fires on an actual mutation, not every access request.
    pub fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(&id)
    }

    pub fn translate_shape(&mut self, id: ShapeId, dx: f64, dy: f64) -> bool {
        let Some(shape) = self.shapes.get_mut(&id) else { return false };
        shape.translate(dx, dy);
        self.dirty = true;
        true
    }

    pub fn set_shape_polygon(&mut self, id: ShapeId, polygon: Polygon) -> bool {
        let Some(shape) = self.shapes.get_mut(&id) else { return false };
        shape.set_polygon(polygon);
        self.dirty = true;
        true
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    pub fn add_junction(&mut self, junction: Junction) {
        self.junctions.insert(junction.id, junction);
        self.dirty = true;
    }

    pub fn remove_junction(&mut self, id: JunctionId) -> Option<Junction> {
        self.dirty = true;
        self.junctions.shift_remove(&id)
    }

    /// Plain mutable access, for callers that attach/detach connectors —
    /// bookkeeping that doesn't change the junction's obstacle bounds and so
    /// shouldn't force a visibility rebuild. A position change must go
    /// through [`Self::set_junction_position`] so the dirty flag only fires
    /// on an actual mutation, not every access request.
    pub fn junction_mut(&mut self, id: JunctionId) -> Option<&mut Junction> {
        self.junctions.get_mut(&id)
    }

    pub fn set_junction_position(&mut self, id: JunctionId, position: Point) -> bool {
        let Some(junction) = self.junctions.get_mut(&id) else { return false };
        junction.position = position;
        self.dirty = true;
        true
    }

    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(&id)
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    pub fn add_cluster(&mut self, cluster: Cluster) {
        self.clusters.insert(cluster.id, cluster);
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(&id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    /// Whether `point` lies within any registered cluster boundary — used
    /// by the visibility builder to tag boundary-crossing edges (spec
    /// §4.4).
    pub fn cluster_containing(&self, point: &Point) -> Option<ClusterId> {
        self.clusters
            .values()
            .find(|c| c.polygon.contains_point_strict(point))
            .map(|c| c.id)
    }

    pub fn obstacle_bounds(&self) -> Vec<Rect> {
        self.shapes
            .values()
            .filter_map(|s| s.bounds())
            .chain(self.junctions.values().map(|j| Rect::new(j.position, crate::geometry::Size::new(0.0, 0.0))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    #[test]
    fn add_shape_marks_dirty() {
        let mut reg = ObstacleRegistry::new();
        assert!(!reg.is_dirty());
        let rect = Rect::new(Point::new(0.0, 0.0), Size::new(10.0, 10.0));
        reg.add_shape(Shape::new(ShapeId(1), Polygon::rectangle(&rect)));
        assert!(reg.is_dirty());
        reg.clear_dirty();
        assert!(!reg.is_dirty());
    }

    #[test]
    fn pin_location_relative() {
        let rect = Rect::new(Point::new(100.0, 100.0), Size::new(50.0, 20.0));
        let pin = Pin::new(PinId::new(crate::ids::ObjectId(1), 0), (0.5, 0.0), DirectionMask::ALL);
        let loc = pin.location(&rect);
        assert_eq!(loc, Point::new(125.0, 100.0));
    }
}
