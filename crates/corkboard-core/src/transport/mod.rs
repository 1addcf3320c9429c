//! Transport collaborator for board channels.
//!
//! A transport moves encoded [`SyncMessage`](crate::sync::SyncMessage)
//! frames between the peers of one board. Delivery is fire-and-forget: no
//! acknowledgement or retry. Incoming frames are drained cooperatively with
//! [`Transport::poll`].

mod memory;

pub use memory::{MemoryRelay, MemoryTransport};

use crate::sync::PeerId;
use thiserror::Error;

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("already connected to board {0}")]
    AlreadyConnected(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}

/// A protocol-agnostic channel scoped to one board.
pub trait Transport {
    /// Identity of this client on the channel.
    fn peer_id(&self) -> &str;

    /// Join a board's channel.
    fn connect(&mut self, board_id: &str) -> Result<(), TransportError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Hand a frame to the channel. Every connected peer, the sender
    /// included, receives frames in one shared order.
    fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Drain frames received since the last poll, in receipt order.
    fn poll(&mut self) -> Vec<String>;

    /// Peers currently on the channel.
    fn presence(&self) -> Vec<PeerId>;
}
