//! Board metadata and its export form.

use crate::camera::Camera;
use crate::history::NodeMap;
use crate::nodes::{UserId, VisualNode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// A board: one collaboration channel and one persistence unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    pub owner: UserId,
    /// Node collection. Paint order comes from each node's `z`.
    pub nodes: NodeMap,
    #[serde(default)]
    pub viewport: Camera,
    #[serde(default)]
    pub status: BoardStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Board {
    /// Create an empty board with a fresh id.
    pub fn new(name: impl Into<String>, owner: impl Into<UserId>, now: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            owner: owner.into(),
            nodes: NodeMap::new(),
            viewport: Camera::default(),
            status: BoardStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Nodes in paint order, back to front. Ties break on id for stability.
    pub fn nodes_sorted(&self) -> Vec<&VisualNode> {
        sorted_by_z(&self.nodes)
    }

    /// Read-only serialization for exporters.
    pub fn export(&self) -> BoardExport {
        BoardExport {
            id: self.id.clone(),
            name: self.name.clone(),
            nodes: self.nodes_sorted().into_iter().cloned().collect(),
            viewport: self.viewport.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Board as handed to JSON, image and PDF exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardExport {
    pub id: String,
    pub name: String,
    /// Nodes back to front.
    pub nodes: Vec<VisualNode>,
    pub viewport: Camera,
}

impl BoardExport {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn sorted_by_z(nodes: &NodeMap) -> Vec<&VisualNode> {
    let mut sorted: Vec<&VisualNode> = nodes.values().collect();
    sorted.sort_by(|a, b| a.z.cmp(&b.z).then_with(|| a.id().cmp(&b.id())));
    sorted
}
