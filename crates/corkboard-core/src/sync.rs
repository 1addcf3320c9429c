//! Wire format for board collaboration.
//!
//! Every message is a JSON object tagged by `type`. Node changes carry the
//! whole node collection, never a diff.

use crate::history::NodeMap;
use crate::nodes::{NodeId, VisualNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a connected client.
pub type PeerId = String;

/// Messages exchanged between peers on one board channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// Periodic liveness signal with display info.
    PresenceHeartbeat {
        peer: PeerId,
        name: String,
        color: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        editing: Option<NodeId>,
    },
    /// Ephemeral cursor position in world coordinates.
    CursorUpdate { peer: PeerId, x: f64, y: f64 },
    /// Full node collection after a local commit.
    NodeChange {
        peer: PeerId,
        /// Per-sender sequence number, starting at 1.
        seq: u64,
        nodes: Vec<VisualNode>,
    },
    /// Advisory claim on a node being edited; `None` releases it.
    EditingClaim {
        peer: PeerId,
        #[serde(default)]
        node: Option<NodeId>,
    },
    /// The peer is leaving the board.
    Leave { peer: PeerId },
}

impl SyncMessage {
    pub fn sender(&self) -> &str {
        match self {
            SyncMessage::PresenceHeartbeat { peer, .. }
            | SyncMessage::CursorUpdate { peer, .. }
            | SyncMessage::NodeChange { peer, .. }
            | SyncMessage::EditingClaim { peer, .. }
            | SyncMessage::Leave { peer } => peer,
        }
    }

    /// Snapshot message for a node collection, nodes in paint order.
    pub fn node_change(peer: impl Into<PeerId>, seq: u64, nodes: &NodeMap) -> Self {
        SyncMessage::NodeChange {
            peer: peer.into(),
            seq,
            nodes: crate::board::sorted_by_z(nodes).into_iter().cloned().collect(),
        }
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(frame)?)
    }
}

/// Rebuild an id-keyed collection from a received node list.
pub fn collect_nodes(nodes: Vec<VisualNode>) -> NodeMap {
    nodes.into_iter().map(|n| (n.id(), n)).collect()
}

/// Errors encoding or decoding a wire frame.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed sync frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    /// Connected, but the last send failed; peers may not have the latest state.
    Degraded,
}

/// Outcome of the last broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryStatus {
    #[default]
    Delivered,
    Uncertain,
}

/// Events surfaced to the client while polling.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected { board_id: String },
    Disconnected,
    PeerJoined { peer: PeerId },
    PeerLeft { peer: PeerId },
    /// A snapshot replaced the local collection.
    SnapshotApplied { from: PeerId, removed: Vec<NodeId> },
    /// An echo of our own older broadcast was skipped.
    StaleEchoSkipped { seq: u64 },
    CursorMoved { peer: PeerId, x: f64, y: f64 },
    EditingChanged { peer: PeerId, node: Option<NodeId> },
    /// A send failed; local state is kept.
    DeliveryUncertain { reason: String },
    /// An incoming frame could not be decoded.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Geometry, NodePayload};

    #[test]
    fn test_message_tagging() {
        let msg = SyncMessage::CursorUpdate {
            peer: "p1".to_string(),
            x: 1.5,
            y: -2.0,
        };
        let json = msg.encode().unwrap();
        assert!(json.contains(r#""type":"cursor_update""#));
        assert_eq!(SyncMessage::decode(&json).unwrap(), msg);
    }

    #[test]
    fn test_heartbeat_without_editing_field() {
        let msg = SyncMessage::decode(r##"{"type":"presence_heartbeat","peer":"p2","name":"Ana","color":"#ff0000"}"##).unwrap();
        assert_eq!(
            msg,
            SyncMessage::PresenceHeartbeat {
                peer: "p2".to_string(),
                name: "Ana".to_string(),
                color: "#ff0000".to_string(),
                editing: None,
            }
        );
        assert_eq!(msg.sender(), "p2");
    }

    #[test]
    fn test_node_change_is_whole_collection_in_paint_order() {
        let mut nodes = NodeMap::new();
        for z in [3, 1, 2] {
            let mut node = VisualNode::new(Geometry::new(0.0, 0.0, 100.0, 100.0), NodePayload::Note);
            node.z = z;
            nodes.insert(node.id(), node);
        }
        let SyncMessage::NodeChange { nodes: list, seq, .. } = SyncMessage::node_change("p1", 7, &nodes) else {
            panic!("expected node change");
        };
        assert_eq!(seq, 7);
        assert_eq!(list.iter().map(|n| n.z).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(collect_nodes(list), nodes);
    }

    #[test]
    fn test_garbage_is_a_codec_error() {
        assert!(matches!(SyncMessage::decode("{not json"), Err(CodecError::Malformed(_))));
        assert!(SyncMessage::decode(r#"{"type":"teleport","peer":"x"}"#).is_err());
    }
}
