//! Kind-specific node data.

use super::style::SerializableColor;
use super::{NodeId, NodeKind};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Data carried only by nodes of one kind. The variant determines the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodePayload {
    Note,
    Frame,
    Opportunity,
    Risk,
    ActionItem,
    EmbeddedVideo(MediaPayload),
    EmbeddedImage(MediaPayload),
    UploadBucket,
    TextBlock,
    Shape(ShapePayload),
    Connector(ConnectorPayload),
    MindMapNode(MindMapPayload),
    FreehandDrawing(FreehandPayload),
    AnnotationComment,
    Table(TablePayload),
    LinkList(LinkListPayload),
}

impl NodePayload {
    /// Empty payload for a kind.
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Note => NodePayload::Note,
            NodeKind::Frame => NodePayload::Frame,
            NodeKind::Opportunity => NodePayload::Opportunity,
            NodeKind::Risk => NodePayload::Risk,
            NodeKind::ActionItem => NodePayload::ActionItem,
            NodeKind::EmbeddedVideo => NodePayload::EmbeddedVideo(MediaPayload::default()),
            NodeKind::EmbeddedImage => NodePayload::EmbeddedImage(MediaPayload::default()),
            NodeKind::UploadBucket => NodePayload::UploadBucket,
            NodeKind::TextBlock => NodePayload::TextBlock,
            NodeKind::Shape => NodePayload::Shape(ShapePayload::default()),
            NodeKind::Connector => NodePayload::Connector(ConnectorPayload::default()),
            NodeKind::MindMapNode => NodePayload::MindMapNode(MindMapPayload::root()),
            NodeKind::FreehandDrawing => NodePayload::FreehandDrawing(FreehandPayload::default()),
            NodeKind::AnnotationComment => NodePayload::AnnotationComment,
            NodeKind::Table => NodePayload::Table(TablePayload::default()),
            NodeKind::LinkList => NodePayload::LinkList(LinkListPayload::default()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::Note => NodeKind::Note,
            NodePayload::Frame => NodeKind::Frame,
            NodePayload::Opportunity => NodeKind::Opportunity,
            NodePayload::Risk => NodeKind::Risk,
            NodePayload::ActionItem => NodeKind::ActionItem,
            NodePayload::EmbeddedVideo(_) => NodeKind::EmbeddedVideo,
            NodePayload::EmbeddedImage(_) => NodeKind::EmbeddedImage,
            NodePayload::UploadBucket => NodeKind::UploadBucket,
            NodePayload::TextBlock => NodeKind::TextBlock,
            NodePayload::Shape(_) => NodeKind::Shape,
            NodePayload::Connector(_) => NodeKind::Connector,
            NodePayload::MindMapNode(_) => NodeKind::MindMapNode,
            NodePayload::FreehandDrawing(_) => NodeKind::FreehandDrawing,
            NodePayload::AnnotationComment => NodeKind::AnnotationComment,
            NodePayload::Table(_) => NodeKind::Table,
            NodePayload::LinkList(_) => NodeKind::LinkList,
        }
    }

    /// Rewrite node references through a mapping; ids not in the map are kept.
    pub(crate) fn remap_references(&mut self, map: &impl Fn(NodeId) -> Option<NodeId>) {
        match self {
            NodePayload::Connector(c) => {
                if let Some(from) = c.from.and_then(map) {
                    c.from = Some(from);
                }
                if let Some(to) = c.to.and_then(map) {
                    c.to = Some(to);
                }
            }
            NodePayload::MindMapNode(m) => {
                if let Some(parent) = m.parent.and_then(map) {
                    m.parent = Some(parent);
                }
            }
            _ => {}
        }
    }
}

/// URL of embedded media.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Geometric primitive drawn by a shape node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeType {
    #[default]
    Rectangle,
    Ellipse,
    Diamond,
    Triangle,
    Star,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapePayload {
    pub shape: ShapeType,
}

/// Line appearance of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectorLine {
    pub width: f64,
    pub dashed: bool,
    pub arrow_start: bool,
    pub arrow_end: bool,
}

impl Default for ConnectorLine {
    fn default() -> Self {
        Self {
            width: 2.0,
            dashed: false,
            arrow_start: false,
            arrow_end: true,
        }
    }
}

/// A link between two nodes, or a free segment when unbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorPayload {
    pub from: Option<NodeId>,
    pub to: Option<NodeId>,
    /// Free start point relative to the node origin; used while not bound.
    pub start: Point,
    /// Free end point relative to the node origin; used while not bound.
    pub end: Point,
    #[serde(default)]
    pub line: ConnectorLine,
    /// Multiplier on the automatic control offset; 0 draws a straight line.
    #[serde(default = "default_curvature")]
    pub curvature: f64,
    /// Manual control point in world space. Overrides the automatic curve.
    #[serde(default)]
    pub control_point: Option<Point>,
    #[serde(default)]
    pub label: String,
}

fn default_curvature() -> f64 {
    1.0
}

impl Default for ConnectorPayload {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            start: Point::ZERO,
            end: Point::ZERO,
            line: ConnectorLine::default(),
            curvature: default_curvature(),
            control_point: None,
            label: String::new(),
        }
    }
}

impl ConnectorPayload {
    /// Connector bound to two nodes.
    pub fn between(from: NodeId, to: NodeId) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    /// Free segment; points are relative to the node origin.
    pub fn segment(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    /// Both endpoints reference a node.
    pub fn is_bound(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    /// Whether either endpoint references the given node.
    pub fn references(&self, id: NodeId) -> bool {
        self.from == Some(id) || self.to == Some(id)
    }
}

/// Position of a node in a mind map tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapPayload {
    pub parent: Option<NodeId>,
    pub is_root: bool,
    /// Mind map this node belongs to; parent and child share it.
    pub map_id: Uuid,
}

impl MindMapPayload {
    /// Root of a new mind map.
    pub fn root() -> Self {
        Self {
            parent: None,
            is_root: true,
            map_id: Uuid::new_v4(),
        }
    }

    /// Child of `parent` in map `map_id`.
    pub fn child_of(parent: NodeId, map_id: Uuid) -> Self {
        Self {
            parent: Some(parent),
            is_root: false,
            map_id,
        }
    }
}

/// One stroke of a freehand drawing, in node-local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreehandPath {
    pub points: Vec<Point>,
    pub color: SerializableColor,
    pub width: f64,
}

/// Freehand strokes normalized to the node's original box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreehandPayload {
    pub paths: Vec<FreehandPath>,
    /// Box width at capture time.
    pub original_width: f64,
    /// Box height at capture time.
    pub original_height: f64,
}

impl FreehandPayload {
    /// Per-axis scale between the captured box and the current size.
    pub fn scale_for(&self, size: Size) -> (f64, f64) {
        let ratio = |now: f64, original: f64| {
            if original > f64::EPSILON { now / original } else { 1.0 }
        };
        (
            ratio(size.width, self.original_width),
            ratio(size.height, self.original_height),
        )
    }

    /// Stroke width to render at the current size, so that scaling the path
    /// into the new box keeps its visual thickness.
    pub fn rendered_stroke_width(&self, stroke_width: f64, size: Size) -> f64 {
        let (sx, sy) = self.scale_for(size);
        let average = (sx + sy) / 2.0;
        if average > f64::EPSILON {
            stroke_width / average
        } else {
            stroke_width
        }
    }

    /// Points of every path scaled into a box of the given origin and size.
    pub fn world_paths(&self, origin: Point, size: Size) -> Vec<Vec<Point>> {
        let (sx, sy) = self.scale_for(size);
        self.paths
            .iter()
            .map(|path| {
                path.points
                    .iter()
                    .map(|p| Point::new(origin.x + p.x * sx, origin.y + p.y * sy))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkListPayload {
    pub entries: Vec<LinkEntry>,
}
