//! In-process relay, for tests and local multi-window sessions.

use super::{Transport, TransportError};
use crate::sync::PeerId;
use log::{debug, info};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

type Inbox = Rc<RefCell<VecDeque<String>>>;

#[derive(Debug, Default)]
struct Channel {
    subscribers: Vec<(PeerId, Inbox)>,
}

/// Fans frames out to every transport joined to the same board.
///
/// Frames are appended to every inbox at send time, so all peers observe
/// one server order.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    channels: Rc<RefCell<HashMap<String, Channel>>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A disconnected transport attached to this relay.
    pub fn transport(&self, peer: impl Into<PeerId>) -> MemoryTransport {
        MemoryTransport {
            relay: self.clone(),
            peer: peer.into(),
            board: None,
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            failing: false,
        }
    }

    fn join(&self, board: &str, peer: &str, inbox: &Inbox) {
        let mut channels = self.channels.borrow_mut();
        let channel = channels.entry(board.to_string()).or_default();
        channel.subscribers.retain(|(p, _)| p != peer);
        channel.subscribers.push((peer.to_string(), inbox.clone()));
    }

    fn leave(&self, board: &str, peer: &str) {
        let mut channels = self.channels.borrow_mut();
        if let Some(channel) = channels.get_mut(board) {
            channel.subscribers.retain(|(p, _)| p != peer);
            if channel.subscribers.is_empty() {
                channels.remove(board);
            }
        }
    }

    fn broadcast(&self, board: &str, frame: &str) {
        let channels = self.channels.borrow();
        if let Some(channel) = channels.get(board) {
            for (_, inbox) in &channel.subscribers {
                inbox.borrow_mut().push_back(frame.to_string());
            }
        }
    }

    /// Peers joined to a board, in join order.
    pub fn peers(&self, board: &str) -> Vec<PeerId> {
        self.channels
            .borrow()
            .get(board)
            .map(|c| c.subscribers.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default()
    }
}

/// One peer's end of a [`MemoryRelay`].
#[derive(Debug)]
pub struct MemoryTransport {
    relay: MemoryRelay,
    peer: PeerId,
    board: Option<String>,
    inbox: Inbox,
    failing: bool,
}

impl MemoryTransport {
    /// Make every send fail until switched back.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Frames waiting to be polled.
    pub fn pending(&self) -> usize {
        self.inbox.borrow().len()
    }
}

impl Transport for MemoryTransport {
    fn peer_id(&self) -> &str {
        &self.peer
    }

    fn connect(&mut self, board_id: &str) -> Result<(), TransportError> {
        if let Some(board) = &self.board {
            return Err(TransportError::AlreadyConnected(board.clone()));
        }
        self.relay.join(board_id, &self.peer, &self.inbox);
        self.board = Some(board_id.to_string());
        info!("{} joined board {board_id}", self.peer);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(board) = self.board.take() {
            self.relay.leave(&board, &self.peer);
            self.inbox.borrow_mut().clear();
            info!("{} left board {board}", self.peer);
        }
    }

    fn is_connected(&self) -> bool {
        self.board.is_some()
    }

    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        let Some(board) = &self.board else {
            return Err(TransportError::NotConnected);
        };
        if self.failing {
            return Err(TransportError::SendFailed("relay unreachable".to_string()));
        }
        debug!("{} -> {board}: {} bytes", self.peer, frame.len());
        self.relay.broadcast(board, frame);
        Ok(())
    }

    fn poll(&mut self) -> Vec<String> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    fn presence(&self) -> Vec<PeerId> {
        self.board
            .as_deref()
            .map(|board| self.relay.peers(board))
            .unwrap_or_default()
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_peers_share_one_order() {
        let relay = MemoryRelay::new();
        let mut a = relay.transport("a");
        let mut b = relay.transport("b");
        a.connect("board").unwrap();
        b.connect("board").unwrap();

        a.send("1").unwrap();
        b.send("2").unwrap();
        a.send("3").unwrap();

        assert_eq!(a.poll(), vec!["1", "2", "3"]);
        assert_eq!(b.poll(), vec!["1", "2", "3"]);
        assert!(a.poll().is_empty());
    }

    #[test]
    fn test_boards_are_isolated() {
        let relay = MemoryRelay::new();
        let mut a = relay.transport("a");
        let mut b = relay.transport("b");
        a.connect("one").unwrap();
        b.connect("two").unwrap();
        a.send("hello").unwrap();
        assert_eq!(b.pending(), 0);
        assert_eq!(a.presence(), vec!["a".to_string()]);
    }

    #[test]
    fn test_send_requires_connection() {
        let relay = MemoryRelay::new();
        let mut a = relay.transport("a");
        assert_eq!(a.send("x"), Err(TransportError::NotConnected));
        a.connect("board").unwrap();
        assert!(matches!(a.connect("board"), Err(TransportError::AlreadyConnected(_))));
        a.set_failing(true);
        assert!(matches!(a.send("x"), Err(TransportError::SendFailed(_))));
    }

    #[test]
    fn test_disconnect_and_drop_leave_channel() {
        let relay = MemoryRelay::new();
        let mut a = relay.transport("a");
        a.connect("board").unwrap();
        {
            let mut b = relay.transport("b");
            b.connect("board").unwrap();
            assert_eq!(relay.peers("board").len(), 2);
        }
        assert_eq!(relay.peers("board"), vec!["a".to_string()]);
        a.disconnect();
        assert!(relay.peers("board").is_empty());
        assert!(!a.is_connected());
    }
}
