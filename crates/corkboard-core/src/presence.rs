//! Remote peer presence: cursors, editing indicators and liveness.

use crate::nodes::NodeId;
use crate::sync::PeerId;
use kurbo::Point;
use log::debug;
use std::collections::BTreeMap;

/// What this client knows about one remote peer.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePresence {
    pub peer: PeerId,
    pub name: String,
    pub color: String,
    /// Last cursor position in world coordinates.
    pub cursor: Option<Point>,
    /// Node the peer claims to be editing. Advisory only.
    pub editing: Option<NodeId>,
    pub last_seen: u64,
}

impl RemotePresence {
    fn new(peer: PeerId, now: u64) -> Self {
        Self {
            name: peer.clone(),
            peer,
            color: String::new(),
            cursor: None,
            editing: None,
            last_seen: now,
        }
    }
}

/// Tracks remote peers and expires the silent ones.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    peers: BTreeMap<PeerId, RemotePresence>,
    timeout_ms: u64,
}

impl PresenceTracker {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            peers: BTreeMap::new(),
            timeout_ms,
        }
    }

    pub fn get(&self, peer: &str) -> Option<&RemotePresence> {
        self.peers.get(peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = &RemotePresence> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Record any sign of life. Returns true if the peer is new.
    fn touch(&mut self, peer: &str, now: u64) -> (&mut RemotePresence, bool) {
        let mut joined = false;
        let entry = self.peers.entry(peer.to_string()).or_insert_with(|| {
            joined = true;
            RemotePresence::new(peer.to_string(), now)
        });
        entry.last_seen = entry.last_seen.max(now);
        (entry, joined)
    }

    /// Returns true if this heartbeat introduced the peer.
    pub fn heartbeat(&mut self, peer: &str, name: &str, color: &str, editing: Option<NodeId>, now: u64) -> bool {
        let (presence, joined) = self.touch(peer, now);
        presence.name = name.to_string();
        presence.color = color.to_string();
        presence.editing = editing;
        if joined {
            debug!("Peer joined: {peer}");
        }
        joined
    }

    pub fn cursor(&mut self, peer: &str, position: Point, now: u64) -> bool {
        let (presence, joined) = self.touch(peer, now);
        presence.cursor = Some(position);
        joined
    }

    pub fn editing(&mut self, peer: &str, node: Option<NodeId>, now: u64) -> bool {
        let (presence, joined) = self.touch(peer, now);
        presence.editing = node;
        joined
    }

    /// Note activity without changing any displayed state.
    pub fn seen(&mut self, peer: &str, now: u64) -> bool {
        self.touch(peer, now).1
    }

    pub fn leave(&mut self, peer: &str) -> Option<RemotePresence> {
        let removed = self.peers.remove(peer);
        if removed.is_some() {
            debug!("Peer left: {peer}");
        }
        removed
    }

    /// Drop peers silent for longer than the timeout, with their editing
    /// claims. Returns the dropped peer ids.
    pub fn expire(&mut self, now: u64) -> Vec<PeerId> {
        let timeout = self.timeout_ms;
        let expired: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| now.saturating_sub(p.last_seen) > timeout)
            .map(|p| p.peer.clone())
            .collect();
        for peer in &expired {
            debug!("Peer timed out: {peer}");
            self.peers.remove(peer);
        }
        expired
    }

    /// Peers currently claiming each node.
    pub fn editing_indicators(&self) -> Vec<(NodeId, &RemotePresence)> {
        self.peers
            .values()
            .filter_map(|p| p.editing.map(|node| (node, p)))
            .collect()
    }

    /// Drop every peer, e.g. on disconnect.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

/// Rate limit for outgoing cursor updates.
#[derive(Debug, Clone)]
pub struct CursorThrottle {
    interval_ms: u64,
    last_sent: Option<u64>,
    last_position: Option<Point>,
}

impl CursorThrottle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_sent: None,
            last_position: None,
        }
    }

    /// Whether a cursor at `position` should be sent now. Records the send.
    pub fn should_send(&mut self, position: Point, now: u64) -> bool {
        if self.last_position == Some(position) {
            return false;
        }
        if let Some(last) = self.last_sent {
            if now.saturating_sub(last) < self.interval_ms {
                return false;
            }
        }
        self.last_sent = Some(now);
        self.last_position = Some(position);
        true
    }
}
