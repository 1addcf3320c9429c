//! The node store: every board mutation goes through here.
//!
//! Each committed mutation records one history entry. Continuous gestures
//! open a gesture transaction, preview through [`NodeStore::update`], and
//! commit once when the gesture ends.

use crate::board::{Board, BoardStatus, sorted_by_z};
use crate::config::{EngineConfig, now_ms};
use crate::connector::resolve_connector;
use crate::history::{HistoryItem, HistoryManager, NodeMap};
use crate::nodes::{
    Comment, ConnectorPayload, Geometry, NodeId, NodeKind, NodePayload, NodeStyle, UserId,
    ValidationError, VisualNode,
};
use kurbo::{Point, Rect, Vec2};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Description of a node to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    pub kind: NodeKind,
    /// Required; a draft without geometry is rejected.
    pub geometry: Option<Geometry>,
    /// Defaults to the kind's style.
    pub style: Option<NodeStyle>,
    /// Defaults to the kind's empty payload.
    pub payload: Option<NodePayload>,
    pub content: String,
    pub author: Option<UserId>,
}

impl NodeDraft {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            geometry: None,
            style: None,
            payload: None,
            content: String::new(),
            author: None,
        }
    }

    /// Draft whose kind follows the payload.
    pub fn from_payload(payload: NodePayload) -> Self {
        Self {
            payload: Some(payload.clone()),
            ..Self::new(payload.kind())
        }
    }

    pub fn at(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn by(mut self, author: impl Into<UserId>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Partial update merged into existing nodes. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub style: Option<NodeStyle>,
    pub locked: Option<bool>,
    pub z: Option<i64>,
    pub group_id: Option<Option<Uuid>>,
    pub content: Option<String>,
    pub payload: Option<NodePayload>,
}

impl NodePatch {
    /// Patch replacing the whole geometry.
    pub fn geometry(geometry: Geometry) -> Self {
        Self {
            x: Some(geometry.x),
            y: Some(geometry.y),
            width: Some(geometry.width),
            height: Some(geometry.height),
            rotation: Some(geometry.rotation),
            ..Self::default()
        }
    }

    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn locked(locked: bool) -> Self {
        Self {
            locked: Some(locked),
            ..Self::default()
        }
    }

    fn apply_geometry(&self, mut geometry: Geometry) -> Geometry {
        if let Some(x) = self.x {
            geometry.x = x;
        }
        if let Some(y) = self.y {
            geometry.y = y;
        }
        if let Some(width) = self.width {
            geometry.width = width;
        }
        if let Some(height) = self.height {
            geometry.height = height;
        }
        if let Some(rotation) = self.rotation {
            geometry.rotation = rotation;
        }
        geometry
    }

    fn touches_geometry(&self) -> bool {
        self.x.is_some()
            || self.y.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || self.rotation.is_some()
    }
}

/// An open gesture transaction.
#[derive(Debug, Clone)]
struct Gesture {
    label: String,
    base: NodeMap,
}

/// Owner of the board's node collection and its history.
#[derive(Debug, Clone)]
pub struct NodeStore {
    board: Board,
    history: HistoryManager,
    config: EngineConfig,
    gesture: Option<Gesture>,
    /// Bumped on every change to the live collection.
    revision: u64,
    /// Bumped on every local change that should be broadcast and saved.
    local_version: u64,
}

impl NodeStore {
    /// Open a board. Its current nodes become the first history entry.
    pub fn new(board: Board, config: EngineConfig) -> Self {
        let history = HistoryManager::new(&board.nodes, "Open board", now_ms(), config.history_window);
        Self {
            board,
            history,
            config,
            gesture: None,
            revision: 0,
            local_version: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn set_board_name(&mut self, name: impl Into<String>) {
        self.board.name = name.into();
        self.board.updated_at = now_ms();
        self.local_version += 1;
    }

    pub fn set_board_status(&mut self, status: BoardStatus) {
        self.board.status = status;
        self.board.updated_at = now_ms();
        self.local_version += 1;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.board.nodes
    }

    pub fn get(&self, id: NodeId) -> Option<&VisualNode> {
        self.board.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.board.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.board.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.board.nodes.is_empty()
    }

    /// Nodes back to front.
    pub fn nodes_sorted(&self) -> Vec<&VisualNode> {
        sorted_by_z(&self.board.nodes)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn local_version(&self) -> u64 {
        self.local_version
    }

    /// Bounding box of every node, or `None` for an empty board.
    pub fn content_bounds(&self) -> Option<Rect> {
        self.board
            .nodes
            .values()
            .map(VisualNode::bounds)
            .reduce(|acc, r| acc.union(r))
    }

    // --- Queries ---

    /// Ids of nodes whose bounding box intersects a world rectangle, back to front.
    pub fn nodes_in_rect(&self, rect: Rect) -> Vec<NodeId> {
        let rect = rect.abs();
        self.nodes_sorted()
            .into_iter()
            .filter(|n| n.geometry.intersects(rect))
            .map(VisualNode::id)
            .collect()
    }

    /// Nodes of one kind, back to front.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&VisualNode> {
        self.nodes_sorted()
            .into_iter()
            .filter(|n| n.kind() == kind)
            .collect()
    }

    /// Connectors with an endpoint on the given node.
    pub fn connectors_of(&self, id: NodeId) -> Vec<NodeId> {
        self.board
            .nodes
            .values()
            .filter(|n| n.as_connector().is_some_and(|c| c.references(id)))
            .map(VisualNode::id)
            .collect()
    }

    // --- Mutations ---

    /// Create a node from a draft. Commits "Add <kind>".
    pub fn create(&mut self, draft: NodeDraft) -> Result<NodeId, ValidationError> {
        let node = self.build_node(draft).inspect_err(|e| warn!("Rejected node: {e}"))?;
        let id = node.id();
        let label = format!("Add {}", node.kind().label());
        self.board.nodes.insert(id, node);
        self.commit(label);
        Ok(id)
    }

    fn build_node(&self, draft: NodeDraft) -> Result<VisualNode, ValidationError> {
        let geometry = draft.geometry.ok_or(ValidationError::MissingGeometry)?;
        geometry.validate()?;
        let payload = draft.payload.unwrap_or_else(|| NodePayload::default_for(draft.kind));
        if payload.kind() != draft.kind {
            return Err(ValidationError::PayloadMismatch {
                kind: draft.kind,
                payload: payload.kind(),
            });
        }
        self.validate_payload(&payload)?;

        let mut node = VisualNode::new(geometry.clamped_to_min(draft.kind.min_size()), payload);
        if let Some(style) = draft.style {
            node.style = style;
        }
        node.content = draft.content;
        node.author = draft.author;
        node.z = self.next_z();
        Ok(node)
    }

    fn validate_payload(&self, payload: &NodePayload) -> Result<(), ValidationError> {
        let NodePayload::MindMapNode(info) = payload else {
            return Ok(());
        };
        if let Some(parent) = info.parent {
            let same_map = self
                .get(parent)
                .and_then(VisualNode::as_mind_map)
                .is_some_and(|p| p.map_id == info.map_id);
            if !same_map {
                return Err(ValidationError::InvalidMindMapParent(parent));
            }
        }
        Ok(())
    }

    /// Merge a patch into every listed node. Unknown ids are skipped.
    ///
    /// Inside a gesture the change is previewed without committing.
    /// Returns how many nodes were changed.
    pub fn update(&mut self, ids: &[NodeId], patch: &NodePatch) -> Result<usize, ValidationError> {
        let targets: Vec<NodeId> = ids.iter().copied().filter(|id| self.contains(*id)).collect();
        if targets.is_empty() {
            return Ok(0);
        }

        // Validate everything before touching anything.
        for id in &targets {
            let node = &self.board.nodes[id];
            if patch.touches_geometry() {
                patch.apply_geometry(node.geometry).validate()?;
            }
            if let Some(payload) = &patch.payload {
                if payload.kind() != node.kind() {
                    return Err(ValidationError::PayloadMismatch {
                        kind: node.kind(),
                        payload: payload.kind(),
                    });
                }
                self.validate_payload(payload)?;
            }
        }

        for id in &targets {
            let Some(node) = self.board.nodes.get_mut(id) else {
                continue;
            };
            if patch.touches_geometry() {
                let geometry = patch.apply_geometry(node.geometry);
                node.geometry = if patch.width.is_some() || patch.height.is_some() {
                    geometry.clamped_to_min(node.kind().min_size())
                } else {
                    geometry
                };
            }
            if let Some(style) = &patch.style {
                node.style = style.clone();
            }
            if let Some(locked) = patch.locked {
                node.locked = locked;
            }
            if let Some(z) = patch.z {
                node.z = z;
            }
            if let Some(group_id) = patch.group_id {
                node.group_id = group_id;
            }
            if let Some(content) = &patch.content {
                node.content = content.clone();
            }
            if let Some(payload) = &patch.payload {
                node.payload = payload.clone();
            }
        }

        if self.gesture.is_some() {
            self.revision += 1;
        } else {
            let label = if targets.len() == 1 {
                format!("Edit {}", self.board.nodes[&targets[0]].kind().label())
            } else {
                format!("Edit {} nodes", targets.len())
            };
            self.commit(label);
        }
        Ok(targets.len())
    }

    /// Delete nodes in one commit. Returns every id removed.
    ///
    /// Mind-map descendants go with their ancestor. Connectors bound to a
    /// removed node are detached into free segments at their last position.
    pub fn delete(&mut self, ids: &[NodeId]) -> Vec<NodeId> {
        let mut doomed: HashSet<NodeId> = ids.iter().copied().filter(|id| self.contains(*id)).collect();
        if doomed.is_empty() {
            return Vec::new();
        }

        // Mind-map subtrees.
        loop {
            let children: Vec<NodeId> = self
                .board
                .nodes
                .values()
                .filter(|n| !doomed.contains(&n.id()))
                .filter(|n| {
                    n.as_mind_map()
                        .and_then(|m| m.parent)
                        .is_some_and(|p| doomed.contains(&p))
                })
                .map(VisualNode::id)
                .collect();
            if children.is_empty() {
                break;
            }
            doomed.extend(children);
        }

        let label = if doomed.len() == 1 {
            doomed
                .iter()
                .next()
                .and_then(|id| self.board.nodes.get(id))
                .map(|n| format!("Delete {}", n.kind().label()))
                .unwrap_or_else(|| "Delete node".to_string())
        } else {
            format!("Delete {} nodes", doomed.len())
        };

        let detached = self.detach_from(&doomed);
        for id in &doomed {
            self.board.nodes.remove(id);
        }
        debug!("Deleting {} nodes, detaching {} connectors", doomed.len(), detached);
        self.commit(label);

        let mut removed: Vec<NodeId> = doomed.into_iter().collect();
        removed.sort();
        removed
    }

    /// Turn connectors that reference any of `doomed` (and survive) into free
    /// segments along their current path.
    fn detach_from(&mut self, doomed: &HashSet<NodeId>) -> usize {
        let replacements: Vec<(NodeId, Geometry, ConnectorPayload)> = self
            .board
            .nodes
            .values()
            .filter(|n| !doomed.contains(&n.id()))
            .filter_map(|n| {
                let payload = n.as_connector()?;
                let references = [payload.from, payload.to]
                    .iter()
                    .flatten()
                    .any(|id| doomed.contains(id));
                if !references {
                    return None;
                }
                let resolved = resolve_connector(n, &self.board.nodes, &self.config)?;
                let (geometry, free) = free_segment(payload, resolved.start(), resolved.end());
                Some((n.id(), geometry, free))
            })
            .collect();

        let count = replacements.len();
        for (id, geometry, payload) in replacements {
            if let Some(node) = self.board.nodes.get_mut(&id) {
                node.geometry = geometry;
                node.payload = NodePayload::Connector(payload);
            }
        }
        count
    }

    /// Clone nodes with new ids, offset by the configured distance. One commit.
    ///
    /// References between duplicated nodes point at the copies; a copied
    /// mind-map root starts a new map for the copied part of its tree.
    pub fn duplicate(&mut self, ids: &[NodeId]) -> Vec<NodeId> {
        let originals: Vec<VisualNode> = sorted_by_z(&self.board.nodes)
            .into_iter()
            .filter(|n| ids.contains(&n.id()))
            .cloned()
            .collect();
        if originals.is_empty() {
            return Vec::new();
        }

        let offset = Vec2::new(self.config.duplicate_offset, self.config.duplicate_offset);
        let id_map: HashMap<NodeId, NodeId> = originals.iter().map(|n| (n.id(), Uuid::new_v4())).collect();
        let map_ids: HashMap<Uuid, Uuid> = originals
            .iter()
            .filter_map(|n| n.as_mind_map().filter(|m| m.is_root).map(|m| (m.map_id, Uuid::new_v4())))
            .collect();

        let mut z = self.next_z();
        let mut created = Vec::with_capacity(originals.len());
        for original in originals {
            let mut copy = original.clone();
            copy.id = id_map[&original.id()];
            copy.geometry = copy.geometry.translated(offset);
            copy.z = z;
            z += 1;
            copy.payload.remap_references(&|id| id_map.get(&id).copied());
            match &mut copy.payload {
                NodePayload::MindMapNode(info) => {
                    if let Some(new_map) = map_ids.get(&info.map_id) {
                        info.map_id = *new_map;
                    }
                }
                NodePayload::Connector(c) => {
                    c.control_point = c.control_point.map(|p| p + offset);
                }
                _ => {}
            }
            created.push(copy.id());
            self.board.nodes.insert(copy.id(), copy);
        }

        let label = if created.len() == 1 {
            "Duplicate node".to_string()
        } else {
            format!("Duplicate {} nodes", created.len())
        };
        self.commit(label);
        created
    }

    /// Move nodes above everything else, keeping their relative order.
    pub fn bring_to_front(&mut self, ids: &[NodeId]) -> bool {
        let top = self.next_z();
        self.restack(ids, top, "Bring to front")
    }

    /// Move nodes below everything else, keeping their relative order.
    pub fn send_to_back(&mut self, ids: &[NodeId]) -> bool {
        let count = ids.iter().filter(|id| self.contains(**id)).count() as i64;
        let bottom = self.board.nodes.values().map(|n| n.z).min().unwrap_or(0) - count;
        self.restack(ids, bottom, "Send to back")
    }

    fn restack(&mut self, ids: &[NodeId], first_z: i64, label: &str) -> bool {
        let ordered: Vec<NodeId> = self
            .nodes_sorted()
            .into_iter()
            .map(VisualNode::id)
            .filter(|id| ids.contains(id))
            .collect();
        if ordered.is_empty() {
            return false;
        }
        for (i, id) in ordered.iter().enumerate() {
            if let Some(node) = self.board.nodes.get_mut(id) {
                node.z = first_z + i as i64;
            }
        }
        self.commit(label);
        true
    }

    /// Lock or unlock nodes. Locked nodes ignore drag and align commands.
    pub fn set_locked(&mut self, ids: &[NodeId], locked: bool) -> usize {
        let targets: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| self.get(*id).is_some_and(|n| n.locked != locked))
            .collect();
        if targets.is_empty() {
            return 0;
        }
        for id in &targets {
            if let Some(node) = self.board.nodes.get_mut(id) {
                node.locked = locked;
            }
        }
        self.commit(if locked { "Lock" } else { "Unlock" });
        targets.len()
    }

    /// Add or remove a user's vote. Returns whether the user now votes for
    /// the node, or `None` for an unknown id.
    pub fn toggle_vote(&mut self, id: NodeId, voter: &str) -> Option<bool> {
        let node = self.board.nodes.get_mut(&id)?;
        let voted = if node.voters.remove(voter) {
            false
        } else {
            node.voters.insert(voter.to_string());
            true
        };
        self.commit(if voted { "Vote" } else { "Remove vote" });
        Some(voted)
    }

    /// Attach a comment to a node, or as a reply to an existing comment.
    pub fn add_comment(&mut self, id: NodeId, comment: Comment, reply_to: Option<Uuid>) -> bool {
        let Some(node) = self.board.nodes.get_mut(&id) else {
            return false;
        };
        match reply_to {
            None => node.comments.push(comment),
            Some(parent) => {
                let Some(thread) = node.comments.iter_mut().find_map(|c| c.find_mut(parent)) else {
                    return false;
                };
                thread.replies.push(comment);
            }
        }
        self.commit("Comment");
        true
    }

    /// Detach connectors whose endpoints reference missing nodes. Their
    /// nominal box becomes the free segment. One commit if anything changed.
    pub fn detach_orphan_connectors(&mut self) -> usize {
        let orphans: Vec<NodeId> = self
            .board
            .nodes
            .values()
            .filter(|n| {
                n.as_connector().is_some_and(|c| {
                    [c.from, c.to]
                        .iter()
                        .flatten()
                        .any(|id| !self.board.nodes.contains_key(id))
                })
            })
            .map(VisualNode::id)
            .collect();

        for id in &orphans {
            let Some(node) = self.board.nodes.get_mut(id) else {
                continue;
            };
            let end = Point::new(node.geometry.width, node.geometry.height);
            if let Some(c) = node.as_connector_mut() {
                c.from = None;
                c.to = None;
                c.control_point = None;
                c.start = Point::ZERO;
                c.end = end;
            }
        }
        if !orphans.is_empty() {
            self.commit("Repair connectors");
        }
        orphans.len()
    }

    // --- Gestures ---

    /// Open a gesture. Updates until [`end_gesture`](Self::end_gesture) are
    /// previewed only. An already open gesture is kept.
    pub fn begin_gesture(&mut self, label: impl Into<String>) {
        if self.gesture.is_some() {
            return;
        }
        let label = label.into();
        debug!("Gesture started: {label}");
        self.gesture = Some(Gesture {
            label,
            base: self.board.nodes.clone(),
        });
    }

    pub fn in_gesture(&self) -> bool {
        self.gesture.is_some()
    }

    /// Close the gesture, committing once if anything changed.
    pub fn end_gesture(&mut self) -> bool {
        let Some(gesture) = self.gesture.take() else {
            return false;
        };
        if gesture.base == self.board.nodes {
            debug!("Gesture '{}' made no change", gesture.label);
            return false;
        }
        self.commit(gesture.label);
        true
    }

    /// Abandon the gesture and restore the state it started from. No commit.
    pub fn cancel_gesture(&mut self) -> bool {
        let Some(gesture) = self.gesture.take() else {
            return false;
        };
        debug!("Gesture '{}' cancelled", gesture.label);
        self.board.nodes = gesture.base;
        self.revision += 1;
        true
    }

    // --- History ---

    /// Step back one history entry. Returns false at the start of history.
    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(nodes) = self.history.undo() else {
            return false;
        };
        self.board.nodes = nodes.clone();
        self.touch_local();
        true
    }

    /// Step forward one history entry. Returns false at the end of history.
    pub fn redo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(nodes) = self.history.redo() else {
            return false;
        };
        self.board.nodes = nodes.clone();
        self.touch_local();
        true
    }

    /// Jump to a history entry without committing.
    pub fn restore(&mut self, index: usize) -> bool {
        self.cancel_gesture();
        let Some(nodes) = self.history.restore(index) else {
            return false;
        };
        self.board.nodes = nodes.clone();
        self.touch_local();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn history_items(&self) -> Vec<HistoryItem> {
        self.history.items()
    }

    // --- Remote ---

    /// Replace the whole collection with a snapshot received from a peer.
    ///
    /// An open gesture stays open, rebased onto the received collection, so
    /// it still ends in a single commit. No history entry is recorded; the
    /// next local commit includes the received state. Returns ids that vanished.
    pub fn replace_from_remote(&mut self, nodes: NodeMap) -> Vec<NodeId> {
        if let Some(gesture) = &mut self.gesture {
            debug!("Rebasing gesture '{}' onto remote snapshot", gesture.label);
            gesture.base = nodes.clone();
        }
        let mut removed: Vec<NodeId> = self
            .board
            .nodes
            .keys()
            .filter(|id| !nodes.contains_key(id))
            .copied()
            .collect();
        removed.sort();
        self.board.nodes = nodes;
        self.board.updated_at = now_ms();
        self.revision += 1;
        removed
    }

    // --- Internals ---

    fn next_z(&self) -> i64 {
        self.board.nodes.values().map(|n| n.z).max().map_or(0, |z| z + 1)
    }

    fn touch_local(&mut self) {
        self.board.updated_at = now_ms();
        self.revision += 1;
        self.local_version += 1;
    }

    /// Record the live collection. An open gesture is folded into this commit.
    fn commit(&mut self, label: impl Into<String>) {
        self.gesture = None;
        self.refresh_connector_bounds();
        let label = label.into();
        let now = now_ms();
        debug!("Commit: {label}");
        self.history.commit(&self.board.nodes, label, now);
        self.board.updated_at = now;
        self.revision += 1;
        self.local_version += 1;
    }

    /// Bound connectors keep a nominal box spanning both endpoint nodes.
    fn refresh_connector_bounds(&mut self) {
        let spans: Vec<(NodeId, Rect)> = self
            .board
            .nodes
            .values()
            .filter_map(|n| {
                let c = n.as_connector()?;
                let from = self.board.nodes.get(&c.from?)?;
                let to = self.board.nodes.get(&c.to?)?;
                Some((n.id(), from.bounds().union(to.bounds())))
            })
            .collect();
        for (id, span) in spans {
            if let Some(node) = self.board.nodes.get_mut(&id) {
                node.geometry = Geometry::from_rect(span);
            }
        }
    }
}

/// Free segment through two world points, as node geometry plus payload.
fn free_segment(payload: &ConnectorPayload, start: Point, end: Point) -> (Geometry, ConnectorPayload) {
    let rect = Rect::from_points(start, end);
    let origin = rect.origin().to_vec2();
    let free = ConnectorPayload {
        from: None,
        to: None,
        start: start - origin,
        end: end - origin,
        control_point: None,
        ..payload.clone()
    };
    (Geometry::from_rect(rect), free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::MindMapPayload;

    fn store() -> NodeStore {
        NodeStore::new(Board::new("Test", "tester", 0), EngineConfig::default())
    }

    fn note_at(store: &mut NodeStore, x: f64, y: f64) -> NodeId {
        store
            .create(NodeDraft::new(NodeKind::Note).at(Geometry::new(x, y, 200.0, 150.0)))
            .unwrap()
    }

    #[test]
    fn test_create_commits_with_kind_label() {
        let mut store = store();
        let id = note_at(&mut store, 0.0, 0.0);
        assert!(store.contains(id));
        assert_eq!(store.history().current().label(), "Add note");
        assert_eq!(store.history().len(), 2);

        store
            .create(NodeDraft::new(NodeKind::ActionItem).at(Geometry::new(0.0, 0.0, 200.0, 100.0)))
            .unwrap();
        assert_eq!(store.history().current().label(), "Add action item");
    }

    #[test]
    fn test_create_without_geometry_is_rejected() {
        let mut store = store();
        let result = store.create(NodeDraft::new(NodeKind::Note));
        assert_eq!(result, Err(ValidationError::MissingGeometry));
        assert!(store.is_empty());
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.local_version(), 0);
    }

    #[test]
    fn test_create_rejects_bad_geometry_and_mismatched_payload() {
        let mut store = store();
        let nan = NodeDraft::new(NodeKind::Note).at(Geometry::new(f64::NAN, 0.0, 10.0, 10.0));
        assert_eq!(store.create(nan), Err(ValidationError::NonFiniteGeometry));

        let mut mismatched = NodeDraft::new(NodeKind::Note).at(Geometry::new(0.0, 0.0, 100.0, 100.0));
        mismatched.payload = Some(NodePayload::Risk);
        assert!(matches!(
            store.create(mismatched),
            Err(ValidationError::PayloadMismatch { .. })
        ));
        assert!(store.is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_create_enforces_minimum_size() {
        let mut store = store();
        let id = store
            .create(NodeDraft::new(NodeKind::Note).at(Geometry::new(0.0, 0.0, 5.0, 5.0)))
            .unwrap();
        let size = store.get(id).unwrap().geometry.size();
        assert_eq!(size, NodeKind::Note.min_size());
    }

    #[test]
    fn test_new_nodes_stack_on_top() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let b = note_at(&mut store, 0.0, 0.0);
        assert!(store.get(b).unwrap().z > store.get(a).unwrap().z);
    }

    #[test]
    fn test_update_then_undo_restores_exactly() {
        let mut store = store();
        let id = note_at(&mut store, 10.0, 20.0);
        let before = store.get(id).unwrap().clone();

        let patch = NodePatch {
            x: Some(99.0),
            width: Some(300.0),
            content: Some("hello".to_string()),
            locked: Some(true),
            ..NodePatch::default()
        };
        assert_eq!(store.update(&[id], &patch), Ok(1));
        assert_ne!(store.get(id), Some(&before));

        assert!(store.undo());
        assert_eq!(store.get(id), Some(&before));
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut store = store();
        let versions = store.local_version();
        assert_eq!(store.update(&[Uuid::new_v4()], &NodePatch::content("x")), Ok(0));
        assert_eq!(store.local_version(), versions);
        assert!(store.delete(&[Uuid::new_v4()]).is_empty());
    }

    #[test]
    fn test_update_validation_fails_closed() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let b = note_at(&mut store, 0.0, 0.0);
        let entries = store.history().len();
        let patch = NodePatch {
            width: Some(-10.0),
            ..NodePatch::default()
        };
        assert!(store.update(&[a, b], &patch).is_err());
        assert_eq!(store.history().len(), entries);
        assert!((store.get(a).unwrap().geometry.width - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gesture_coalesces_into_one_commit() {
        let mut store = store();
        let id = note_at(&mut store, 0.0, 0.0);
        let entries = store.history().len();

        store.begin_gesture("Move");
        for step in 1..=10 {
            store
                .update(&[id], &NodePatch::position(step as f64, 0.0))
                .unwrap();
        }
        assert_eq!(store.history().len(), entries);
        assert!(store.end_gesture());
        assert_eq!(store.history().len(), entries + 1);
        assert_eq!(store.history().current().label(), "Move");
    }

    #[test]
    fn test_cancelled_gesture_restores_and_does_not_commit() {
        let mut store = store();
        let id = note_at(&mut store, 0.0, 0.0);
        let entries = store.history().len();

        store.begin_gesture("Move");
        store.update(&[id], &NodePatch::position(50.0, 50.0)).unwrap();
        assert!(store.cancel_gesture());

        assert_eq!(store.history().len(), entries);
        assert!((store.get(id).unwrap().geometry.x).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gesture_without_change_does_not_commit() {
        let mut store = store();
        note_at(&mut store, 0.0, 0.0);
        let entries = store.history().len();
        store.begin_gesture("Move");
        assert!(!store.end_gesture());
        assert_eq!(store.history().len(), entries);
    }

    #[test]
    fn test_delete_detaches_bound_connectors() {
        let mut store = store();
        let a = store
            .create(NodeDraft::new(NodeKind::Note).at(Geometry::new(0.0, 0.0, 100.0, 100.0)))
            .unwrap();
        let b = store
            .create(NodeDraft::new(NodeKind::Note).at(Geometry::new(300.0, 0.0, 100.0, 100.0)))
            .unwrap();
        let link = store
            .create(
                NodeDraft::from_payload(NodePayload::Connector(ConnectorPayload::between(a, b)))
                    .at(Geometry::new(0.0, 0.0, 0.0, 0.0)),
            )
            .unwrap();
        let entries = store.history().len();

        let removed = store.delete(&[b]);
        assert_eq!(removed, vec![b]);
        assert_eq!(store.history().len(), entries + 1);

        let connector = store.get(link).unwrap();
        let payload = connector.as_connector().unwrap();
        assert!(payload.from.is_none() && payload.to.is_none());
        // Last rendered endpoints: a's padded right edge to b's padded left edge.
        let start = connector.geometry.origin() + payload.start.to_vec2();
        let end = connector.geometry.origin() + payload.end.to_vec2();
        assert!((start.x - 108.0).abs() < 1e-9);
        assert!((end.x - 292.0).abs() < 1e-9);
        assert!((end.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_delete_removes_mind_map_subtree() {
        let mut store = store();
        let root_payload = MindMapPayload::root();
        let map_id = root_payload.map_id;
        let root = store
            .create(
                NodeDraft::from_payload(NodePayload::MindMapNode(root_payload))
                    .at(Geometry::new(0.0, 0.0, 120.0, 40.0)),
            )
            .unwrap();
        let child = store
            .create(
                NodeDraft::from_payload(NodePayload::MindMapNode(MindMapPayload::child_of(root, map_id)))
                    .at(Geometry::new(200.0, 0.0, 120.0, 40.0)),
            )
            .unwrap();
        let grandchild = store
            .create(
                NodeDraft::from_payload(NodePayload::MindMapNode(MindMapPayload::child_of(child, map_id)))
                    .at(Geometry::new(400.0, 0.0, 120.0, 40.0)),
            )
            .unwrap();
        let other = note_at(&mut store, 0.0, 300.0);

        let removed = store.delete(&[child]);
        assert_eq!(removed.len(), 2);
        assert!(store.contains(root));
        assert!(!store.contains(grandchild));
        assert!(store.contains(other));
        assert_eq!(store.history().current().label(), "Delete 2 nodes");
    }

    #[test]
    fn test_mind_map_parent_must_share_map() {
        let mut store = store();
        let root = store
            .create(
                NodeDraft::from_payload(NodePayload::MindMapNode(MindMapPayload::root()))
                    .at(Geometry::new(0.0, 0.0, 120.0, 40.0)),
            )
            .unwrap();
        let stray = NodeDraft::from_payload(NodePayload::MindMapNode(MindMapPayload::child_of(
            root,
            Uuid::new_v4(),
        )))
        .at(Geometry::new(0.0, 0.0, 120.0, 40.0));
        assert_eq!(store.create(stray), Err(ValidationError::InvalidMindMapParent(root)));
    }

    #[test]
    fn test_duplicate_offsets_and_remaps() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let b = note_at(&mut store, 400.0, 0.0);
        let link = store
            .create(
                NodeDraft::from_payload(NodePayload::Connector(ConnectorPayload::between(a, b)))
                    .at(Geometry::new(0.0, 0.0, 0.0, 0.0)),
            )
            .unwrap();
        let entries = store.history().len();

        let copies = store.duplicate(&[a, b, link]);
        assert_eq!(copies.len(), 3);
        assert_eq!(store.history().len(), entries + 1);
        assert_eq!(store.len(), 6);

        let copy_a = store.get(copies[0]).unwrap();
        assert_eq!(copy_a.geometry.origin(), Point::new(20.0, 20.0));
        let copy_link = store.get(copies[2]).unwrap().as_connector().unwrap();
        assert_eq!(copy_link.from, Some(copies[0]));
        assert_eq!(copy_link.to, Some(copies[1]));
    }

    #[test]
    fn test_nodes_in_rect_and_by_kind() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let _far = note_at(&mut store, 1000.0, 1000.0);
        let risk = store
            .create(NodeDraft::new(NodeKind::Risk).at(Geometry::new(50.0, 50.0, 150.0, 100.0)))
            .unwrap();

        let hits = store.nodes_in_rect(Rect::new(-10.0, -10.0, 60.0, 60.0));
        assert_eq!(hits, vec![a, risk]);
        assert_eq!(store.nodes_by_kind(NodeKind::Note).len(), 2);
        assert_eq!(store.nodes_by_kind(NodeKind::Risk)[0].id(), risk);
    }

    #[test]
    fn test_bound_connector_box_spans_endpoints() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let b = note_at(&mut store, 500.0, 300.0);
        let link = store
            .create(
                NodeDraft::from_payload(NodePayload::Connector(ConnectorPayload::between(a, b)))
                    .at(Geometry::new(0.0, 0.0, 0.0, 0.0)),
            )
            .unwrap();
        let rect = store.get(link).unwrap().bounds();
        assert_eq!(rect, Rect::new(0.0, 0.0, 700.0, 450.0));
    }

    #[test]
    fn test_z_order_commands() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let b = note_at(&mut store, 0.0, 0.0);
        let c = note_at(&mut store, 0.0, 0.0);

        assert!(store.bring_to_front(&[a]));
        let order: Vec<NodeId> = store.nodes_sorted().iter().map(|n| n.id()).collect();
        assert_eq!(order, vec![b, c, a]);

        assert!(store.send_to_back(&[c]));
        let order: Vec<NodeId> = store.nodes_sorted().iter().map(|n| n.id()).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn test_votes_and_comments() {
        let mut store = store();
        let id = note_at(&mut store, 0.0, 0.0);
        assert_eq!(store.toggle_vote(id, "ana"), Some(true));
        assert_eq!(store.toggle_vote(id, "ben"), Some(true));
        assert_eq!(store.toggle_vote(id, "ana"), Some(false));
        assert_eq!(store.get(id).unwrap().vote_count(), 1);
        assert_eq!(store.toggle_vote(Uuid::new_v4(), "ana"), None);

        let comment = Comment::new("ana", "looks good", 1);
        let comment_id = comment.id;
        assert!(store.add_comment(id, comment, None));
        assert!(store.add_comment(id, Comment::new("ben", "agreed", 2), Some(comment_id)));
        assert!(!store.add_comment(id, Comment::new("ben", "lost", 3), Some(Uuid::new_v4())));
        assert_eq!(store.get(id).unwrap().comments[0].replies.len(), 1);
    }

    #[test]
    fn test_remote_replace_reports_removed_without_history() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let b = note_at(&mut store, 0.0, 0.0);
        let entries = store.history().len();

        let mut incoming = store.nodes().clone();
        incoming.remove(&a);
        let removed = store.replace_from_remote(incoming);

        assert_eq!(removed, vec![a]);
        assert!(store.contains(b));
        assert_eq!(store.history().len(), entries);
    }

    #[test]
    fn test_remote_replace_keeps_gesture_open() {
        let mut store = store();
        let id = note_at(&mut store, 0.0, 0.0);
        let entries = store.history().len();

        store.begin_gesture("Move");
        store.update(&[id], &NodePatch::position(10.0, 0.0)).unwrap();
        let incoming = store.nodes().clone();
        store.replace_from_remote(incoming);
        assert!(store.in_gesture());

        store.update(&[id], &NodePatch::position(40.0, 0.0)).unwrap();
        store.update(&[id], &NodePatch::position(60.0, 0.0)).unwrap();
        assert_eq!(store.history().len(), entries);
        assert!(store.end_gesture());
        assert_eq!(store.history().len(), entries + 1);
        assert_eq!(store.history().current().label(), "Move");
    }

    #[test]
    fn test_delete_label_uses_live_kind() {
        let mut store = store();
        let id = note_at(&mut store, 0.0, 0.0);
        let mut incoming = store.nodes().clone();
        let risk = VisualNode::new(Geometry::new(0.0, 0.0, 120.0, 80.0), NodePayload::default_for(NodeKind::Risk));
        let risk_id = risk.id();
        incoming.remove(&id);
        incoming.insert(risk_id, risk);
        store.replace_from_remote(incoming);

        assert_eq!(store.delete(&[risk_id]), vec![risk_id]);
        assert_eq!(store.history().current().label(), format!("Delete {}", NodeKind::Risk.label()));
    }

    #[test]
    fn test_orphan_repair() {
        let mut store = store();
        let a = note_at(&mut store, 0.0, 0.0);
        let ghost = Uuid::new_v4();
        let mut nodes = store.nodes().clone();
        let orphan = VisualNode::new(
            Geometry::new(0.0, 0.0, 300.0, 100.0),
            NodePayload::Connector(ConnectorPayload::between(a, ghost)),
        );
        let orphan_id = orphan.id();
        nodes.insert(orphan_id, orphan);
        store.replace_from_remote(nodes);

        assert_eq!(store.detach_orphan_connectors(), 1);
        let payload = store.get(orphan_id).unwrap().as_connector().unwrap();
        assert!(!payload.is_bound());
        assert_eq!(payload.end, Point::new(300.0, 100.0));
        assert_eq!(store.detach_orphan_connectors(), 0);
    }
}
