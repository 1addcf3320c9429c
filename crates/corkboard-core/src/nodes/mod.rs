//! Visual node definitions for the board.

mod geometry;
mod payload;
mod style;

pub use geometry::{Geometry, rotate_about};
pub use payload::{
    ConnectorLine, ConnectorPayload, FreehandPath, FreehandPayload, LinkEntry, LinkListPayload,
    MediaPayload, MindMapPayload, NodePayload, ShapePayload, ShapeType, TablePayload,
};
pub use style::{NodeStyle, SerializableColor};

use kurbo::{Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for nodes.
pub type NodeId = Uuid;

/// Identifier of a user (author, voter, commenter).
pub type UserId = String;

/// Reasons a node mutation is refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("geometry is required")]
    MissingGeometry,

    #[error("geometry contains a non-finite value")]
    NonFiniteGeometry,

    #[error("negative size {width}x{height}")]
    NegativeSize { width: f64, height: f64 },

    #[error("mind map parent {0} is missing or in another map")]
    InvalidMindMapParent(NodeId),

    #[error("payload of kind {payload:?} does not match node kind {kind:?}")]
    PayloadMismatch { kind: NodeKind, payload: NodeKind },
}

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Note,
    Frame,
    Opportunity,
    Risk,
    ActionItem,
    EmbeddedVideo,
    EmbeddedImage,
    UploadBucket,
    TextBlock,
    Shape,
    Connector,
    MindMapNode,
    FreehandDrawing,
    AnnotationComment,
    Table,
    LinkList,
}

impl NodeKind {
    pub const ALL: [NodeKind; 16] = [
        NodeKind::Note,
        NodeKind::Frame,
        NodeKind::Opportunity,
        NodeKind::Risk,
        NodeKind::ActionItem,
        NodeKind::EmbeddedVideo,
        NodeKind::EmbeddedImage,
        NodeKind::UploadBucket,
        NodeKind::TextBlock,
        NodeKind::Shape,
        NodeKind::Connector,
        NodeKind::MindMapNode,
        NodeKind::FreehandDrawing,
        NodeKind::AnnotationComment,
        NodeKind::Table,
        NodeKind::LinkList,
    ];

    /// Human-readable name, used in history labels.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Note => "note",
            NodeKind::Frame => "frame",
            NodeKind::Opportunity => "opportunity",
            NodeKind::Risk => "risk",
            NodeKind::ActionItem => "action item",
            NodeKind::EmbeddedVideo => "video",
            NodeKind::EmbeddedImage => "image",
            NodeKind::UploadBucket => "upload bucket",
            NodeKind::TextBlock => "text",
            NodeKind::Shape => "shape",
            NodeKind::Connector => "connector",
            NodeKind::MindMapNode => "mind map node",
            NodeKind::FreehandDrawing => "drawing",
            NodeKind::AnnotationComment => "comment",
            NodeKind::Table => "table",
            NodeKind::LinkList => "link list",
        }
    }

    /// Smallest size a node of this kind may be resized to.
    pub fn min_size(&self) -> Size {
        let (w, h) = match self {
            NodeKind::Note => (80.0, 60.0),
            NodeKind::Frame => (160.0, 120.0),
            NodeKind::Opportunity | NodeKind::Risk | NodeKind::ActionItem => (120.0, 80.0),
            NodeKind::EmbeddedVideo => (160.0, 90.0),
            NodeKind::EmbeddedImage => (32.0, 32.0),
            NodeKind::UploadBucket => (120.0, 100.0),
            NodeKind::TextBlock => (40.0, 20.0),
            NodeKind::Shape => (20.0, 20.0),
            NodeKind::MindMapNode => (80.0, 36.0),
            NodeKind::FreehandDrawing => (1.0, 1.0),
            NodeKind::AnnotationComment => (24.0, 24.0),
            NodeKind::Table => (120.0, 60.0),
            NodeKind::LinkList => (140.0, 60.0),
            NodeKind::Connector => (0.0, 0.0),
        };
        Size::new(w, h)
    }
}

/// A comment thread entry attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author: UserId,
    pub text: String,
    pub created_at: u64,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn new(author: impl Into<UserId>, text: impl Into<String>, created_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            author: author.into(),
            text: text.into(),
            created_at,
            replies: Vec::new(),
        }
    }

    /// Find a comment by id in this thread, including nested replies.
    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Comment> {
        if self.id == id {
            return Some(self);
        }
        self.replies.iter_mut().find_map(|reply| reply.find_mut(id))
    }
}

/// An element placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    pub(crate) id: NodeId,
    pub geometry: Geometry,
    pub style: NodeStyle,
    #[serde(default)]
    pub locked: bool,
    /// Users who voted for this node.
    #[serde(default)]
    pub voters: BTreeSet<UserId>,
    #[serde(default)]
    pub author: Option<UserId>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Paint order; higher is drawn later.
    pub z: i64,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    /// Plain-text content.
    #[serde(default)]
    pub content: String,
    pub payload: NodePayload,
}

impl VisualNode {
    /// Create a node with a fresh id and the kind's default style.
    pub fn new(geometry: Geometry, payload: NodePayload) -> Self {
        let style = NodeStyle::for_kind(payload.kind());
        Self {
            id: Uuid::new_v4(),
            geometry,
            style,
            locked: false,
            voters: BTreeSet::new(),
            author: None,
            comments: Vec::new(),
            z: 0,
            group_id: None,
            content: String::new(),
            payload,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    /// Axis-aligned bounding box, ignoring rotation.
    pub fn bounds(&self) -> Rect {
        self.geometry.rect()
    }

    pub fn vote_count(&self) -> usize {
        self.voters.len()
    }

    pub fn as_connector(&self) -> Option<&ConnectorPayload> {
        match &self.payload {
            NodePayload::Connector(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_connector_mut(&mut self) -> Option<&mut ConnectorPayload> {
        match &mut self.payload {
            NodePayload::Connector(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_mind_map(&self) -> Option<&MindMapPayload> {
        match &self.payload {
            NodePayload::MindMapNode(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_freehand(&self) -> Option<&FreehandPayload> {
        match &self.payload {
            NodePayload::FreehandDrawing(f) => Some(f),
            _ => None,
        }
    }

    /// Connector with both endpoints set.
    pub fn is_bound_connector(&self) -> bool {
        self.as_connector().is_some_and(ConnectorPayload::is_bound)
    }

    /// Bound connectors derive their box from their endpoints.
    pub fn is_resizable(&self) -> bool {
        !self.is_bound_connector()
    }
}
