//! Bounded linear undo/redo over node-collection snapshots.

use crate::nodes::{NodeId, VisualNode};
use std::collections::HashMap;

/// The node collection of a board, keyed by id.
pub type NodeMap = HashMap<NodeId, VisualNode>;

/// An immutable snapshot of the node collection.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    nodes: NodeMap,
    label: String,
    timestamp: u64,
}

impl HistoryEntry {
    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// Action that produced this state, e.g. "Add note".
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// Summary of an entry for a version browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub index: usize,
    pub label: String,
    pub timestamp: u64,
    pub current: bool,
}

/// Linear history with a movable pointer.
///
/// Each entry holds the state *after* its action. The pointer marks the
/// entry matching the live collection, so with a window of `n` entries at
/// most `n - 1` undo steps are available.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: Vec<HistoryEntry>,
    pointer: usize,
    window: usize,
}

impl HistoryManager {
    /// Start a history whose first entry is the given state.
    pub fn new(initial: &NodeMap, label: impl Into<String>, timestamp: u64, window: usize) -> Self {
        Self {
            entries: vec![HistoryEntry {
                nodes: initial.clone(),
                label: label.into(),
                timestamp,
            }],
            pointer: 0,
            window: window.max(1),
        }
    }

    /// Record a new state. Drops the redo branch and, past the window, the oldest entry.
    pub fn commit(&mut self, snapshot: &NodeMap, label: impl Into<String>, timestamp: u64) {
        self.entries.truncate(self.pointer + 1);
        self.entries.push(HistoryEntry {
            nodes: snapshot.clone(),
            label: label.into(),
            timestamp,
        });
        self.pointer = self.entries.len() - 1;

        if self.entries.len() > self.window {
            let excess = self.entries.len() - self.window;
            self.entries.drain(..excess);
            self.pointer -= excess;
        }
    }

    /// Step back one entry. Returns the state to restore, or `None` at the start.
    pub fn undo(&mut self) -> Option<&NodeMap> {
        if !self.can_undo() {
            return None;
        }
        self.pointer -= 1;
        Some(&self.entries[self.pointer].nodes)
    }

    /// Step forward one entry. Returns the state to restore, or `None` at the end.
    pub fn redo(&mut self) -> Option<&NodeMap> {
        if !self.can_redo() {
            return None;
        }
        self.pointer += 1;
        Some(&self.entries[self.pointer].nodes)
    }

    /// Jump to an entry without committing. Out-of-range indices are ignored.
    pub fn restore(&mut self, index: usize) -> Option<&NodeMap> {
        let entry = self.entries.get(index)?;
        self.pointer = index;
        Some(&entry.nodes)
    }

    pub fn can_undo(&self) -> bool {
        self.pointer > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pointer + 1 < self.entries.len()
    }

    /// The entry matching the live collection.
    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.pointer]
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Entries oldest first.
    pub fn items(&self) -> Vec<HistoryItem> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| HistoryItem {
                index,
                label: entry.label.clone(),
                timestamp: entry.timestamp,
                current: index == self.pointer,
            })
            .collect()
    }
}
