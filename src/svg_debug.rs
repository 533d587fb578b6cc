//! SVG debug dump (SPEC_FULL.md §A "CLI", §6): renders the current scene —
//! shape/cluster rectangles, junctions, and every active connector's display
//! route — to an SVG document. Generalizes the teacher's `renderer.rs`
//! (which walked a laid-out ERD `mir::Document`) into a dump driven directly
//! by a [`Router`], with an optional extra layer showing each connector's
//! pre-nudge route alongside its final one.

use crate::error::DebugDumpError;
use crate::geometry::{Direction, Point};
use crate::router::Router;
use std::io::Write;
use svg::node::element;

const BACKGROUND: &str = "#1c1c1c";
const SHAPE_FILL: &str = "#2b2b2b";
const SHAPE_STROKE: &str = "#6e6e6e";
const CLUSTER_STROKE: &str = "#3a5f7d";
const CONNECTOR_STROKE: &str = "#88c0d0";
const JUNCTION_FILL: &str = "#d08770";
const ENDPOINT_FILL: &str = BACKGROUND;

/// Options controlling what the dump includes beyond shapes, clusters, and
/// routes (spec §4.10 "optional layer groups per transaction stage").
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    /// Draw each connector's pre-nudge `raw_route` as a faint extra layer
    /// behind its `display_route`, so a reader can see what nudging moved.
    pub show_raw_routes: bool,
}

/// Renders `router`'s current scene to `writer` as an SVG document.
pub fn dump(router: &Router, opts: DumpOptions, writer: &mut impl Write) -> Result<(), DebugDumpError> {
    let mut doc = svg::Document::new().set("version", "1.1");

    let background = element::Rectangle::new().set("width", "100%").set("height", "100%").set("fill", BACKGROUND);
    doc = doc.add(background);

    let mut shapes_layer = element::Group::new().set("id", "shapes");
    for shape in router.obstacles().shapes() {
        let Some(bounds) = shape.bounds() else { continue };
        let rect = element::Rectangle::new()
            .set("x", bounds.min_x())
            .set("y", bounds.min_y())
            .set("width", bounds.max_x() - bounds.min_x())
            .set("height", bounds.max_y() - bounds.min_y())
            .set("fill", SHAPE_FILL)
            .set("stroke", SHAPE_STROKE)
            .set("stroke-width", 1);
        shapes_layer = shapes_layer.add(rect);
    }
    doc = doc.add(shapes_layer);

    let mut clusters_layer = element::Group::new().set("id", "clusters");
    for cluster in router.obstacles().clusters() {
        let points = cluster.polygon.points().iter().map(|p| format!("{},{}", p.x, p.y)).collect::<Vec<_>>().join(" ");
        let polygon = element::Polygon::new()
            .set("points", points)
            .set("fill", "none")
            .set("stroke", CLUSTER_STROKE)
            .set("stroke-width", 1)
            .set("stroke-dasharray", "4,3");
        clusters_layer = clusters_layer.add(polygon);
    }
    doc = doc.add(clusters_layer);

    let mut junctions_layer = element::Group::new().set("id", "junctions");
    for junction in router.obstacles().junctions() {
        let circle = element::Circle::new().set("cx", junction.position.x).set("cy", junction.position.y).set("r", 4).set("fill", JUNCTION_FILL);
        junctions_layer = junctions_layer.add(circle);
    }
    doc = doc.add(junctions_layer);

    if opts.show_raw_routes {
        let mut raw_layer = element::Group::new().set("id", "raw-routes").set("opacity", "0.35");
        for (_, connector) in router.connectors() {
            if !connector.flags.active || connector.raw_route.len() < 2 || connector.raw_route == connector.display_route {
                continue;
            }
            raw_layer = raw_layer.add(route_path(connector.routing_type, &connector.raw_route));
        }
        doc = doc.add(raw_layer);
    }

    let mut routes_layer = element::Group::new().set("id", "routes");
    for (_, connector) in router.connectors() {
        if !connector.flags.active || connector.display_route.len() < 2 {
            continue;
        }
        routes_layer = routes_layer.add(route_path(connector.routing_type, &connector.display_route));
        let start = connector.display_route[0];
        let end = *connector.display_route.last().unwrap();
        routes_layer = routes_layer.add(endpoint_circle(start)).add(endpoint_circle(end));
    }
    doc = doc.add(routes_layer);

    writer.write_all(doc.to_string().as_bytes())?;
    Ok(())
}

fn route_path(routing_type: crate::connector::RoutingType, points: &[Point]) -> element::Path {
    match routing_type {
        crate::connector::RoutingType::Orthogonal => orthogonal_path(points),
        crate::connector::RoutingType::Polyline => polyline_path(points),
    }
}

fn endpoint_circle(p: Point) -> element::Circle {
    element::Circle::new()
        .set("cx", p.x)
        .set("cy", p.y)
        .set("r", 3)
        .set("fill", ENDPOINT_FILL)
        .set("stroke", CONNECTOR_STROKE)
        .set("stroke-width", 1.5)
}

/// Straight `M`/`L` segments — a polyline route has no bend-rounding
/// convention to honour.
fn polyline_path(points: &[Point]) -> element::Path {
    let mut d = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if i == 0 {
            d.push(format!("M{} {}", p.x, p.y));
        } else {
            d.push(format!("L{} {}", p.x, p.y));
        }
    }
    element::Path::new().set("d", d.join(" ")).set("fill", "transparent").set("stroke", CONNECTOR_STROKE).set("stroke-width", 1.5)
}

/// Rounds each orthogonal bend with a short quadratic curve, the same corner
/// convention as the teacher's `draw_edge_connection` (a fixed-radius `Q`
/// cut at every direction change, straight `L` otherwise).
fn orthogonal_path(points: &[Point]) -> element::Path {
    const RADIUS: f64 = 6.0;
    let mut d = Vec::new();
    for i in 0..points.len() {
        let pt = points[i];
        if i == 0 {
            d.push(format!("M{} {}", pt.x, pt.y));
        } else if i == points.len() - 1 {
            d.push(format!("L{} {}", pt.x, pt.y));
        } else {
            let bp = points[i - 1];
            let fp = points[i + 1];
            let d1 = vh_direction(&bp, &pt);
            let d2 = vh_direction(&pt, &fp);
            if d1 == d2 {
                d.push(format!("L{} {}", pt.x, pt.y));
                continue;
            }
            let (inx, iny) = approach_point(&pt, d1, RADIUS);
            let (outx, outy) = approach_point(&pt, d2.opposite(), RADIUS);
            d.push(format!("L{inx} {iny}"));
            d.push(format!("Q{} {} {outx} {outy}", pt.x, pt.y));
        }
    }
    element::Path::new().set("d", d.join(" ")).set("fill", "transparent").set("stroke", CONNECTOR_STROKE).set("stroke-width", 1.5)
}

fn vh_direction(from: &Point, to: &Point) -> Direction {
    if (to.y - from.y).abs() > (to.x - from.x).abs() {
        if to.y > from.y {
            Direction::Down
        } else {
            Direction::Up
        }
    } else if to.x > from.x {
        Direction::Right
    } else {
        Direction::Left
    }
}

/// The point `radius` back from `pt` along the direction travel arrived
/// from, i.e. where the straight run should end before the bend curve.
fn approach_point(pt: &Point, arrival: Direction, radius: f64) -> (f64, f64) {
    match arrival {
        Direction::Down => (pt.x, pt.y - radius),
        Direction::Up => (pt.x, pt.y + radius),
        Direction::Right => (pt.x - radius, pt.y),
        Direction::Left => (pt.x + radius, pt.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{Endpoint, RoutingType};
    use crate::geometry::{Point, Polygon, Rect, Size};
    use crate::router::RouterMode;
    use difference::assert_diff;

    #[test]
    fn empty_router_dumps_background_only() {
        let router = Router::new(RouterMode::Orthogonal);
        let mut bytes: Vec<u8> = vec![];
        dump(&router, DumpOptions::default(), &mut bytes).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert_diff!(
            svg.as_str(),
            "<svg version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\">\n<rect fill=\"#1c1c1c\" height=\"100%\" width=\"100%\"/>\n<g id=\"shapes\"/>\n<g id=\"clusters\"/>\n<g id=\"junctions\"/>\n<g id=\"routes\"/>\n</svg>",
            "\n",
            0
        );
    }

    #[test]
    fn dump_includes_a_shape_rectangle_and_connector_path() {
        let mut router = Router::new(RouterMode::Orthogonal);
        let rect = Rect::new(Point::new(40.0, 0.0), Size::new(20.0, 100.0));
        router.add_shape(Polygon::rectangle(&rect)).unwrap();
        router.add_connector(Endpoint::Free(Point::new(0.0, 50.0)), Endpoint::Free(Point::new(100.0, 50.0)), RoutingType::Orthogonal).unwrap();
        router.process_transaction().unwrap();

        let mut bytes: Vec<u8> = vec![];
        dump(&router, DumpOptions::default(), &mut bytes).unwrap();
        let svg = String::from_utf8(bytes).unwrap();

        assert!(svg.contains("<rect"));
        assert!(svg.contains("<path"));
        assert!(svg.contains(SHAPE_FILL));
    }
}
