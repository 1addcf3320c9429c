//! Connector and mind-map edge geometry.
//!
//! A bound connector attaches where the line between the two node centers
//! leaves each node's padded box. The path is a cubic that bows along the
//! dominant axis of travel unless a manual control point is set.

use crate::config::EngineConfig;
use crate::history::NodeMap;
use crate::nodes::{ConnectorPayload, NodeId, VisualNode};
use kurbo::{CubicBez, ParamCurve, ParamCurveNearest, Point, QuadBez, Rect, Vec2};

/// Accuracy passed to kurbo's nearest-point solver.
const NEAREST_ACCURACY: f64 = 1e-3;

/// Point where a ray from `center` along `direction` leaves a box of the
/// given half extents. A zero direction yields the center.
pub fn edge_intersection(center: Point, half_width: f64, half_height: f64, direction: Vec2) -> Point {
    let (dx, dy) = (direction.x.abs(), direction.y.abs());
    if dx < f64::EPSILON && dy < f64::EPSILON {
        return center;
    }
    let scale_x = if dx < f64::EPSILON { f64::INFINITY } else { half_width / dx };
    let scale_y = if dy < f64::EPSILON { f64::INFINITY } else { half_height / dy };
    center + direction * scale_x.min(scale_y)
}

/// Node box grown by the connector padding on every side.
pub fn padded_box(rect: Rect, padding: f64) -> Rect {
    rect.inflate(padding, padding)
}

/// Attachment points for a connector between two boxes.
pub fn bound_endpoints(from: Rect, to: Rect, padding: f64) -> (Point, Point) {
    let from = padded_box(from, padding);
    let to = padded_box(to, padding);
    let (fc, tc) = (from.center(), to.center());
    let start = edge_intersection(fc, from.width() / 2.0, from.height() / 2.0, tc - fc);
    let end = edge_intersection(tc, to.width() / 2.0, to.height() / 2.0, fc - tc);
    (start, end)
}

/// Main axis of a connector's travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Horizontal,
    Vertical,
}

impl Flow {
    pub fn of(delta: Vec2) -> Self {
        if delta.x.abs() >= delta.y.abs() {
            Flow::Horizontal
        } else {
            Flow::Vertical
        }
    }
}

/// Shape parameters for automatic connector curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParams {
    /// Fraction of endpoint distance used as control offset.
    pub ratio: f64,
    /// Upper bound on the control offset.
    pub ceiling: f64,
}

impl CurveParams {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            ratio: config.connector_curve_ratio,
            ceiling: config.connector_curve_ceiling,
        }
    }
}

impl Default for CurveParams {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Cubic between two endpoints.
///
/// Control points are pushed along the dominant axis by
/// `min(ratio * distance, ceiling) * curvature`. A manual control point
/// replaces the automatic ones with the cubic equivalent of a quadratic
/// through that control.
pub fn connector_curve(
    start: Point,
    end: Point,
    params: CurveParams,
    curvature: f64,
    manual: Option<Point>,
) -> CubicBez {
    if let Some(control) = manual {
        return quad_as_cubic(start, control, end);
    }
    let delta = end - start;
    let offset = (params.ratio * delta.hypot()).min(params.ceiling) * curvature;
    let push = match Flow::of(delta) {
        Flow::Horizontal => Vec2::new(offset.copysign(delta.x), 0.0),
        Flow::Vertical => Vec2::new(0.0, offset.copysign(delta.y)),
    };
    CubicBez::new(start, start + push, end - push, end)
}

/// A straight segment expressed as a cubic.
pub fn straight_curve(start: Point, end: Point) -> CubicBez {
    CubicBez::new(start, start.lerp(end, 1.0 / 3.0), start.lerp(end, 2.0 / 3.0), end)
}

fn quad_as_cubic(p0: Point, p1: Point, p2: Point) -> CubicBez {
    CubicBez::new(p0, p0.lerp(p1, 2.0 / 3.0), p2.lerp(p1, 2.0 / 3.0), p2)
}

/// Drag handles exposed by a connector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectorHandles {
    pub start: Point,
    pub end: Point,
    /// Manual control point if set, else the curve midpoint.
    pub mid: Point,
}

/// Which connector handle is under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorHandle {
    Start,
    End,
    Mid,
}

/// A connector with its endpoints resolved in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConnector {
    pub id: NodeId,
    pub bound: bool,
    pub curve: CubicBez,
    pub label_anchor: Point,
    pub handles: ConnectorHandles,
}

impl ResolvedConnector {
    pub fn start(&self) -> Point {
        self.curve.p0
    }

    pub fn end(&self) -> Point {
        self.curve.p3
    }

    /// Whether a world point is within `tolerance` of the curve.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.curve.nearest(point, NEAREST_ACCURACY).distance_sq <= tolerance * tolerance
    }

    /// Handle within `tolerance` of a world point, if any.
    pub fn handle_at(&self, point: Point, tolerance: f64) -> Option<ConnectorHandle> {
        let near = |p: Point| (p - point).hypot() <= tolerance;
        if near(self.handles.start) {
            Some(ConnectorHandle::Start)
        } else if near(self.handles.end) {
            Some(ConnectorHandle::End)
        } else if near(self.handles.mid) {
            Some(ConnectorHandle::Mid)
        } else {
            None
        }
    }
}

/// Resolve a connector node against the collection.
///
/// Returns `None` for non-connectors and for orphans: connectors that
/// reference an id no longer on the board.
pub fn resolve_connector(node: &VisualNode, nodes: &NodeMap, config: &EngineConfig) -> Option<ResolvedConnector> {
    let payload = node.as_connector()?;
    let endpoint = |id: Option<NodeId>| match id {
        Some(id) => nodes.get(&id).map(|n| Some(n.bounds())),
        None => Some(None),
    };
    let from = endpoint(payload.from)?;
    let to = endpoint(payload.to)?;

    let (curve, bound) = match (from, to) {
        (Some(from), Some(to)) => {
            let (start, end) = bound_endpoints(from, to, config.connector_padding);
            let curve = connector_curve(
                start,
                end,
                CurveParams::from_config(config),
                payload.curvature,
                payload.control_point,
            );
            (curve, true)
        }
        _ => {
            let (start, end) = free_endpoints(node, payload);
            (straight_curve(start, end), false)
        }
    };

    let midpoint = curve.eval(0.5);
    Some(ResolvedConnector {
        id: node.id(),
        bound,
        curve,
        label_anchor: midpoint,
        handles: ConnectorHandles {
            start: curve.p0,
            end: curve.p3,
            mid: payload.control_point.filter(|_| bound).unwrap_or(midpoint),
        },
    })
}

/// World-space endpoints of an unbound connector.
pub fn free_endpoints(node: &VisualNode, payload: &ConnectorPayload) -> (Point, Point) {
    let origin = node.geometry.origin().to_vec2();
    (payload.start + origin, payload.end + origin)
}

/// Decorative S-curve from a mind-map parent to a child, as two quadratics
/// meeting halfway between the facing sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MindMapEdge {
    pub parent: NodeId,
    pub child: NodeId,
    pub first: QuadBez,
    pub second: QuadBez,
}

/// Build the edge between a parent box and a child box.
pub fn mind_map_edge(parent: Rect, child: Rect) -> (QuadBez, QuadBez) {
    let (start, end) = if child.center().x >= parent.center().x {
        (
            Point::new(parent.x1, parent.center().y),
            Point::new(child.x0, child.center().y),
        )
    } else {
        (
            Point::new(parent.x0, parent.center().y),
            Point::new(child.x1, child.center().y),
        )
    };
    let mid = start.midpoint(end);
    (
        QuadBez::new(start, Point::new(mid.x, start.y), mid),
        QuadBez::new(mid, Point::new(mid.x, end.y), end),
    )
}

/// Edges for every mind-map node whose parent is on the board and in the same map.
pub fn mind_map_edges(nodes: &NodeMap) -> Vec<MindMapEdge> {
    let mut edges: Vec<MindMapEdge> = nodes
        .values()
        .filter_map(|child| {
            let info = child.as_mind_map()?;
            let parent = nodes.get(&info.parent?)?;
            if parent.as_mind_map()?.map_id != info.map_id {
                return None;
            }
            let (first, second) = mind_map_edge(parent.bounds(), child.bounds());
            Some(MindMapEdge {
                parent: parent.id(),
                child: child.id(),
                first,
                second,
            })
        })
        .collect();
    edges.sort_by_key(|e| (e.parent, e.child));
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Geometry, MindMapPayload, NodePayload};

    fn on_boundary(rect: Rect, p: Point) -> bool {
        let eps = 1e-9;
        let within_x = p.x >= rect.x0 - eps && p.x <= rect.x1 + eps;
        let within_y = p.y >= rect.y0 - eps && p.y <= rect.y1 + eps;
        let on_vertical = (p.x - rect.x0).abs() < eps || (p.x - rect.x1).abs() < eps;
        let on_horizontal = (p.y - rect.y0).abs() < eps || (p.y - rect.y1).abs() < eps;
        within_x && within_y && (on_vertical || on_horizontal)
    }

    #[test]
    fn test_edge_intersection_lies_on_padded_boundary() {
        let rect = padded_box(Rect::new(0.0, 0.0, 200.0, 100.0), 8.0);
        let center = rect.center();
        let directions = [
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -3.0),
            Vec2::new(5.0, 1.0),
            Vec2::new(-2.0, 7.0),
            Vec2::new(-1e-3, -4.0),
            Vec2::new(300.0, 299.0),
        ];
        for dir in directions {
            let p = edge_intersection(center, rect.width() / 2.0, rect.height() / 2.0, dir);
            assert!(on_boundary(rect, p), "{dir:?} -> {p:?}");
            // Same direction as the ray.
            assert!((p - center).dot(dir) > 0.0);
        }
    }

    #[test]
    fn test_edge_intersection_degenerate_returns_center() {
        let c = Point::new(4.0, 5.0);
        assert_eq!(edge_intersection(c, 10.0, 10.0, Vec2::ZERO), c);
    }

    #[test]
    fn test_bound_endpoints_face_each_other() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(300.0, 0.0, 400.0, 100.0);
        let (start, end) = bound_endpoints(a, b, 8.0);
        assert!((start - Point::new(108.0, 50.0)).hypot() < 1e-9);
        assert!((end - Point::new(292.0, 50.0)).hypot() < 1e-9);
    }

    #[test]
    fn test_curve_offsets_along_dominant_axis() {
        let params = CurveParams {
            ratio: 0.4,
            ceiling: 120.0,
        };
        let curve = connector_curve(Point::new(0.0, 0.0), Point::new(100.0, 20.0), params, 1.0, None);
        // 0.4 * |(100, 20)| is about 40.8, under the ceiling.
        let expected = 0.4 * Vec2::new(100.0, 20.0).hypot();
        assert!((curve.p1.x - expected).abs() < 1e-9);
        assert!((curve.p1.y).abs() < f64::EPSILON);
        assert!((curve.p2.x - (100.0 - expected)).abs() < 1e-9);

        let vertical = connector_curve(Point::new(0.0, 0.0), Point::new(10.0, -1000.0), params, 1.0, None);
        assert!((vertical.p1.y + 120.0).abs() < f64::EPSILON);
        assert!((vertical.p1.x).abs() < f64::EPSILON);
    }

    #[test]
    fn test_manual_control_point_overrides() {
        let control = Point::new(50.0, 200.0);
        let curve = connector_curve(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            CurveParams::default(),
            1.0,
            Some(control),
        );
        // Quadratic midpoint: (p0 + 2c + p2) / 4.
        let mid = curve.eval(0.5);
        assert!((mid.x - 50.0).abs() < 1e-9);
        assert!((mid.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_bound_connector_and_orphan() {
        let config = EngineConfig::default();
        let a = VisualNode::new(Geometry::new(0.0, 0.0, 100.0, 100.0), NodePayload::Note);
        let b = VisualNode::new(Geometry::new(300.0, 0.0, 100.0, 100.0), NodePayload::Note);
        let link = VisualNode::new(
            Geometry::new(0.0, 0.0, 400.0, 100.0),
            NodePayload::Connector(ConnectorPayload::between(a.id(), b.id())),
        );
        let mut nodes = NodeMap::new();
        for n in [a.clone(), b.clone(), link.clone()] {
            nodes.insert(n.id(), n);
        }

        let resolved = resolve_connector(&link, &nodes, &config).unwrap();
        assert!(resolved.bound);
        assert!((resolved.start() - Point::new(108.0, 50.0)).hypot() < 1e-9);
        assert!(resolved.hit_test(resolved.label_anchor, 0.5));
        assert!(!resolved.hit_test(Point::new(200.0, 400.0), 6.0));
        assert_eq!(resolved.handle_at(Point::new(291.0, 50.0), 3.0), Some(ConnectorHandle::End));

        nodes.remove(&b.id());
        assert!(resolve_connector(&link, &nodes, &config).is_none());
    }

    #[test]
    fn test_resolve_free_segment() {
        let config = EngineConfig::default();
        let node = VisualNode::new(
            Geometry::new(10.0, 10.0, 50.0, 0.0),
            NodePayload::Connector(ConnectorPayload::segment(Point::ZERO, Point::new(50.0, 0.0))),
        );
        let resolved = resolve_connector(&node, &NodeMap::new(), &config).unwrap();
        assert!(!resolved.bound);
        assert_eq!(resolved.start(), Point::new(10.0, 10.0));
        assert_eq!(resolved.end(), Point::new(60.0, 10.0));
        assert!((resolved.label_anchor.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_mind_map_edges_require_same_map() {
        let root_payload = MindMapPayload::root();
        let map_id = root_payload.map_id;
        let root = VisualNode::new(Geometry::new(0.0, 0.0, 100.0, 40.0), NodePayload::MindMapNode(root_payload));
        let child = VisualNode::new(
            Geometry::new(200.0, 100.0, 100.0, 40.0),
            NodePayload::MindMapNode(MindMapPayload::child_of(root.id(), map_id)),
        );
        let stranger = VisualNode::new(
            Geometry::new(-200.0, 0.0, 100.0, 40.0),
            NodePayload::MindMapNode(MindMapPayload::child_of(root.id(), uuid::Uuid::new_v4())),
        );
        let mut nodes = NodeMap::new();
        for n in [root.clone(), child.clone(), stranger] {
            nodes.insert(n.id(), n);
        }
        let edges = mind_map_edges(&nodes);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].child, child.id());
        assert_eq!(edges[0].first.p0, Point::new(100.0, 20.0));
        assert_eq!(edges[0].second.p2, Point::new(200.0, 120.0));
    }
}
