//! Render-layer contract: everything a painter needs, in screen space.
//!
//! The core never paints. A renderer rebuilds the scene whenever the store
//! revision or the camera changes.

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::connector::{mind_map_edges, resolve_connector};
use crate::nodes::{NodeId, NodeKind, NodeStyle, SerializableColor};
use crate::store::NodeStore;
use kurbo::{CubicBez, Point, QuadBez, Rect};
use log::debug;

/// A node box ready to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Unrotated box in screen space.
    pub rect: Rect,
    pub rotation: f64,
    pub z: i64,
    pub style: NodeStyle,
    pub locked: bool,
    pub votes: usize,
    /// Freehand strokes, empty for other kinds.
    pub strokes: Vec<SceneStroke>,
}

/// One freehand stroke, scaled into the node's current box.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneStroke {
    pub points: Vec<Point>,
    pub color: SerializableColor,
    /// Screen-space width.
    pub width: f64,
}

/// A resolved connector in screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConnector {
    pub id: NodeId,
    pub z: i64,
    pub bound: bool,
    pub curve: CubicBez,
    pub label: Option<String>,
    pub label_anchor: Point,
    pub width: f64,
    pub dashed: bool,
    pub arrow_start: bool,
    pub arrow_end: bool,
}

/// Decorative mind-map edge in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneEdge {
    pub parent: NodeId,
    pub child: NodeId,
    pub first: QuadBez,
    pub second: QuadBez,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    /// Store revision this scene was built from.
    pub revision: u64,
    /// Non-connector nodes, back to front.
    pub nodes: Vec<SceneNode>,
    /// Connectors, back to front. Orphans are left out.
    pub connectors: Vec<SceneConnector>,
    pub mind_map_edges: Vec<SceneEdge>,
}

/// Build the scene for the current store and camera.
pub fn build_scene(store: &NodeStore, camera: &Camera, config: &EngineConfig) -> Scene {
    let transform = camera.transform();
    let mut scene = Scene {
        revision: store.revision(),
        ..Scene::default()
    };

    for node in store.nodes_sorted() {
        if let Some(payload) = node.as_connector() {
            let Some(resolved) = resolve_connector(node, store.nodes(), config) else {
                debug!("Skipping orphaned connector {}", node.id());
                continue;
            };
            scene.connectors.push(SceneConnector {
                id: node.id(),
                z: node.z,
                bound: resolved.bound,
                curve: transform * resolved.curve,
                label: Some(payload.label.clone()).filter(|l| !l.is_empty()),
                label_anchor: transform * resolved.label_anchor,
                width: payload.line.width * camera.zoom,
                dashed: payload.line.dashed,
                arrow_start: payload.line.arrow_start,
                arrow_end: payload.line.arrow_end,
            });
            continue;
        }

        let strokes = node
            .as_freehand()
            .map(|freehand| {
                let size = node.geometry.size();
                freehand
                    .world_paths(node.geometry.origin(), size)
                    .into_iter()
                    .zip(&freehand.paths)
                    .map(|(points, path)| SceneStroke {
                        points: points.into_iter().map(|p| transform * p).collect(),
                        color: path.color,
                        width: freehand.rendered_stroke_width(path.width, size) * camera.zoom,
                    })
                    .collect()
            })
            .unwrap_or_default();

        scene.nodes.push(SceneNode {
            id: node.id(),
            kind: node.kind(),
            rect: camera.world_rect_to_screen(node.bounds()),
            rotation: node.geometry.rotation,
            z: node.z,
            style: node.style.clone(),
            locked: node.locked,
            votes: node.vote_count(),
            strokes,
        });
    }

    scene.mind_map_edges = mind_map_edges(store.nodes())
        .into_iter()
        .map(|edge| SceneEdge {
            parent: edge.parent,
            child: edge.child,
            first: transform * edge.first,
            second: transform * edge.second,
        })
        .collect();

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::nodes::{ConnectorPayload, FreehandPath, FreehandPayload, Geometry, MindMapPayload, NodePayload};
    use crate::store::NodeDraft;
    use kurbo::Vec2;

    fn store() -> NodeStore {
        NodeStore::new(Board::new("Scene", "ana", 0), EngineConfig::default())
    }

    #[test]
    fn test_nodes_in_z_order_and_screen_space() {
        let mut store = store();
        let a = store.create(NodeDraft::new(NodeKind::Note).at(Geometry::new(0.0, 0.0, 100.0, 100.0))).unwrap();
        let b = store.create(NodeDraft::new(NodeKind::Risk).at(Geometry::new(50.0, 50.0, 120.0, 80.0))).unwrap();
        store.send_to_back(&[b]);

        let mut camera = Camera::new();
        camera.zoom = 2.0;
        camera.offset = Vec2::new(10.0, 20.0);
        let scene = build_scene(&store, &camera, &EngineConfig::default());

        assert_eq!(scene.nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(scene.nodes[1].rect, Rect::new(10.0, 20.0, 210.0, 220.0));
        assert_eq!(scene.revision, store.revision());
    }

    #[test]
    fn test_orphaned_connector_is_skipped() {
        let mut store = store();
        let a = store.create(NodeDraft::new(NodeKind::Note).at(Geometry::new(0.0, 0.0, 100.0, 100.0))).unwrap();
        let b = store.create(NodeDraft::new(NodeKind::Note).at(Geometry::new(400.0, 0.0, 100.0, 100.0))).unwrap();
        let connector = NodePayload::Connector(ConnectorPayload::between(a, b));
        store.create(NodeDraft::from_payload(connector).at(Geometry::new(0.0, 0.0, 500.0, 100.0))).unwrap();

        let mut board = store.board().clone();
        board.nodes.remove(&b);
        let orphaned = NodeStore::new(board, EngineConfig::default());

        let config = EngineConfig::default();
        assert_eq!(build_scene(&store, &Camera::new(), &config).connectors.len(), 1);
        let scene = build_scene(&orphaned, &Camera::new(), &config);
        assert!(scene.connectors.is_empty());
        assert_eq!(scene.nodes.len(), 1);
    }

    #[test]
    fn test_freehand_stroke_width_tracks_resize() {
        let mut store = store();
        let payload = FreehandPayload {
            paths: vec![FreehandPath {
                points: vec![Point::new(0.0, 0.0), Point::new(100.0, 50.0)],
                color: SerializableColor::black(),
                width: 4.0,
            }],
            original_width: 100.0,
            original_height: 50.0,
        };
        let id = store
            .create(NodeDraft::from_payload(NodePayload::FreehandDrawing(payload)).at(Geometry::new(0.0, 0.0, 200.0, 100.0)))
            .unwrap();

        let scene = build_scene(&store, &Camera::new(), &EngineConfig::default());
        let node = scene.nodes.iter().find(|n| n.id == id).unwrap();
        assert!((node.strokes[0].width - 2.0).abs() < 1e-9);
        assert_eq!(node.strokes[0].points[1], Point::new(200.0, 100.0));
    }

    #[test]
    fn test_mind_map_edges_present() {
        let mut store = store();
        let root = MindMapPayload::root();
        let map_id = root.map_id;
        let parent = store
            .create(NodeDraft::from_payload(NodePayload::MindMapNode(root)).at(Geometry::new(0.0, 0.0, 100.0, 40.0)))
            .unwrap();
        store
            .create(
                NodeDraft::from_payload(NodePayload::MindMapNode(MindMapPayload::child_of(parent, map_id)))
                    .at(Geometry::new(200.0, 100.0, 100.0, 40.0)),
            )
            .unwrap();

        let scene = build_scene(&store, &Camera::new(), &EngineConfig::default());
        assert_eq!(scene.mind_map_edges.len(), 1);
        assert_eq!(scene.mind_map_edges[0].parent, parent);
    }
}
