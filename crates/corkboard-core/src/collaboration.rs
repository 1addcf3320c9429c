//! Collaboration: whole-snapshot broadcast between peers of one board.
//!
//! After every local commit the full node collection is sent. Received
//! snapshots replace the local collection in receipt order, so the last
//! snapshot received wins. There is no merging.

use crate::config::EngineConfig;
use crate::nodes::NodeId;
use crate::presence::{CursorThrottle, PresenceTracker};
use crate::selection::SelectionSet;
use crate::store::NodeStore;
use crate::sync::{ConnectionState, DeliveryStatus, PeerId, SyncEvent, SyncMessage, collect_nodes};
use crate::transport::{Transport, TransportError};
use kurbo::Point;
use log::{debug, info, warn};

/// How this client appears to others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerProfile {
    pub name: String,
    pub color: String,
}

/// Bridges a [`NodeStore`] and a [`Transport`].
pub struct CollaborationSync<T: Transport> {
    transport: T,
    profile: PeerProfile,
    board_id: Option<String>,
    state: ConnectionState,
    delivery: DeliveryStatus,
    /// Sequence number of the last node change sent.
    seq: u64,
    /// Store version covered by the last node change sent.
    sent_version: Option<u64>,
    presence: PresenceTracker,
    throttle: CursorThrottle,
    editing: Option<NodeId>,
    last_heartbeat: Option<u64>,
    heartbeat_interval_ms: u64,
}

impl<T: Transport> CollaborationSync<T> {
    pub fn new(transport: T, profile: PeerProfile, config: &EngineConfig) -> Self {
        Self {
            transport,
            profile,
            board_id: None,
            state: ConnectionState::Disconnected,
            delivery: DeliveryStatus::Delivered,
            seq: 0,
            sent_version: None,
            presence: PresenceTracker::new(config.presence_timeout_ms),
            throttle: CursorThrottle::new(config.cursor_throttle_ms),
            editing: None,
            last_heartbeat: None,
            heartbeat_interval_ms: config.heartbeat_interval_ms,
        }
    }

    pub fn peer_id(&self) -> &str {
        self.transport.peer_id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn delivery(&self) -> DeliveryStatus {
        self.delivery
    }

    pub fn is_connected(&self) -> bool {
        self.state != ConnectionState::Disconnected
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Peers the transport reports on the channel, this client included.
    pub fn channel_peers(&self) -> Vec<PeerId> {
        self.transport.presence()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Join the store's board channel. The current collection counts as
    /// already shared; only later commits are broadcast.
    pub fn connect(&mut self, store: &NodeStore, now: u64) -> Result<SyncEvent, TransportError> {
        let board_id = store.board().id.clone();
        self.transport.connect(&board_id)?;
        info!("Connected to board {board_id} as {}", self.peer_id());
        self.board_id = Some(board_id.clone());
        self.state = ConnectionState::Connected;
        self.delivery = DeliveryStatus::Delivered;
        self.sent_version = Some(store.local_version());
        self.last_heartbeat = None;
        self.heartbeat(now);
        Ok(SyncEvent::Connected { board_id })
    }

    pub fn disconnect(&mut self) -> Option<SyncEvent> {
        if !self.is_connected() {
            return None;
        }
        let leave = SyncMessage::Leave {
            peer: self.peer_id().to_string(),
        };
        // Peers time us out if this is lost.
        if let Err(e) = self.send(&leave) {
            warn!("Leave notice failed: {e}");
        }
        self.transport.disconnect();
        self.presence.clear();
        self.board_id = None;
        self.state = ConnectionState::Disconnected;
        info!("Disconnected");
        Some(SyncEvent::Disconnected)
    }

    fn send(&mut self, message: &SyncMessage) -> Result<(), TransportError> {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => return Err(TransportError::SendFailed(e.to_string())),
        };
        self.transport.send(&frame)
    }

    /// Broadcast the collection if the store has local changes not yet sent.
    ///
    /// A failed send marks delivery uncertain. The local state is kept.
    pub fn after_commit(&mut self, store: &NodeStore) -> Option<SyncEvent> {
        if !self.is_connected() || self.sent_version == Some(store.local_version()) {
            return None;
        }
        self.seq += 1;
        self.sent_version = Some(store.local_version());
        let message = SyncMessage::node_change(self.peer_id().to_string(), self.seq, store.nodes());
        match self.send(&message) {
            Ok(()) => {
                debug!("Broadcast node change #{} ({} nodes)", self.seq, store.len());
                self.delivery = DeliveryStatus::Delivered;
                self.state = ConnectionState::Connected;
                None
            }
            Err(e) => {
                warn!("Node change #{} may not have been delivered: {e}", self.seq);
                self.delivery = DeliveryStatus::Uncertain;
                self.state = ConnectionState::Degraded;
                Some(SyncEvent::DeliveryUncertain { reason: e.to_string() })
            }
        }
    }

    /// Send a throttled cursor update. Returns whether it was sent.
    pub fn send_cursor(&mut self, world: Point, now: u64) -> bool {
        if !self.is_connected() || !self.throttle.should_send(world, now) {
            return false;
        }
        let message = SyncMessage::CursorUpdate {
            peer: self.peer_id().to_string(),
            x: world.x,
            y: world.y,
        };
        match self.send(&message) {
            Ok(()) => true,
            Err(e) => {
                warn!("Cursor update failed: {e}");
                false
            }
        }
    }

    /// Send a heartbeat if one is due.
    pub fn heartbeat(&mut self, now: u64) -> bool {
        if !self.is_connected() {
            return false;
        }
        if let Some(last) = self.last_heartbeat {
            if now.saturating_sub(last) < self.heartbeat_interval_ms {
                return false;
            }
        }
        self.last_heartbeat = Some(now);
        let message = SyncMessage::PresenceHeartbeat {
            peer: self.peer_id().to_string(),
            name: self.profile.name.clone(),
            color: self.profile.color.clone(),
            editing: self.editing,
        };
        if let Err(e) = self.send(&message) {
            warn!("Heartbeat failed: {e}");
            return false;
        }
        true
    }

    /// Announce the node this client is editing, or `None` when done.
    /// Peers only show an indicator; nothing is locked.
    pub fn claim_editing(&mut self, node: Option<NodeId>) {
        if self.editing == node {
            return;
        }
        self.editing = node;
        if !self.is_connected() {
            return;
        }
        let message = SyncMessage::EditingClaim {
            peer: self.peer_id().to_string(),
            node,
        };
        if let Err(e) = self.send(&message) {
            warn!("Editing claim failed: {e}");
        }
    }

    /// Apply everything received since the last poll, in receipt order,
    /// then expire silent peers.
    pub fn poll(&mut self, store: &mut NodeStore, selection: &mut SelectionSet, now: u64) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        for frame in self.transport.poll() {
            match SyncMessage::decode(&frame) {
                Ok(message) => self.handle_message(message, store, selection, now, &mut events),
                Err(e) => {
                    warn!("Dropping undecodable frame: {e}");
                    events.push(SyncEvent::Error { message: e.to_string() });
                }
            }
        }
        for peer in self.presence.expire(now) {
            events.push(SyncEvent::PeerLeft { peer });
        }
        events
    }

    fn handle_message(
        &mut self,
        message: SyncMessage,
        store: &mut NodeStore,
        selection: &mut SelectionSet,
        now: u64,
        events: &mut Vec<SyncEvent>,
    ) {
        let own = message.sender() == self.peer_id();
        if !own {
            let peer = message.sender().to_string();
            let joined = match &message {
                SyncMessage::Leave { .. } => false,
                SyncMessage::PresenceHeartbeat {
                    name, color, editing, ..
                } => self.presence.heartbeat(&peer, name, color, *editing, now),
                SyncMessage::CursorUpdate { x, y, .. } => self.presence.cursor(&peer, Point::new(*x, *y), now),
                SyncMessage::EditingClaim { node, .. } => self.presence.editing(&peer, *node, now),
                SyncMessage::NodeChange { .. } => self.presence.seen(&peer, now),
            };
            if joined {
                events.push(SyncEvent::PeerJoined { peer });
            }
        }

        match message {
            SyncMessage::NodeChange { peer, seq, nodes } => {
                if own {
                    // Only the newest broadcast, with nothing committed since.
                    let latest = seq == self.seq && self.sent_version == Some(store.local_version());
                    if !latest {
                        debug!("Skipping stale echo #{seq}");
                        events.push(SyncEvent::StaleEchoSkipped { seq });
                        return;
                    }
                }
                debug!("Applying snapshot from {peer} ({} nodes)", nodes.len());
                let removed = store.replace_from_remote(collect_nodes(nodes));
                // Losing any selected node to a peer clears the whole selection.
                if selection.retain_existing(store.nodes()) > 0 {
                    selection.clear();
                }
                events.push(SyncEvent::SnapshotApplied { from: peer, removed });
            }
            SyncMessage::CursorUpdate { peer, x, y } if !own => {
                events.push(SyncEvent::CursorMoved { peer, x, y });
            }
            SyncMessage::EditingClaim { peer, node } if !own => {
                events.push(SyncEvent::EditingChanged { peer, node });
            }
            SyncMessage::Leave { peer } if !own => {
                if self.presence.leave(&peer).is_some() {
                    events.push(SyncEvent::PeerLeft { peer });
                }
            }
            _ => {}
        }
    }
}
