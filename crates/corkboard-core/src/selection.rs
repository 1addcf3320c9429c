//! Selection set, resize handles and pointer hit testing.

use crate::config::EngineConfig;
use crate::connector::resolve_connector;
use crate::history::NodeMap;
use crate::nodes::{Geometry, NodeId};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Local set of selected node ids. Never synchronized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<NodeId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.ids.iter().copied().collect()
    }

    /// The only selected id, if exactly one is selected.
    pub fn single(&self) -> Option<NodeId> {
        if self.ids.len() == 1 {
            self.ids.iter().next().copied()
        } else {
            None
        }
    }

    /// Click: replace the selection with one node.
    pub fn select_only(&mut self, id: NodeId) {
        self.ids.clear();
        self.ids.insert(id);
    }

    /// Shift-click: add or remove one node.
    pub fn toggle(&mut self, id: NodeId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub fn replace(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.ids.extend(ids);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids that are no longer on the board. Returns how many were dropped.
    pub fn retain_existing(&mut self, nodes: &NodeMap) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| nodes.contains_key(id));
        before - self.ids.len()
    }
}

/// One of the eight resize handles around a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::N,
        ResizeHandle::NE,
        ResizeHandle::E,
        ResizeHandle::SE,
        ResizeHandle::S,
        ResizeHandle::SW,
        ResizeHandle::W,
        ResizeHandle::NW,
    ];

    /// Parse a compass code such as "se" or "NW".
    pub fn from_code(code: &str) -> Option<Self> {
        let handle = match code.to_ascii_lowercase().as_str() {
            "n" => ResizeHandle::N,
            "ne" => ResizeHandle::NE,
            "e" => ResizeHandle::E,
            "se" => ResizeHandle::SE,
            "s" => ResizeHandle::S,
            "sw" => ResizeHandle::SW,
            "w" => ResizeHandle::W,
            "nw" => ResizeHandle::NW,
            _ => return None,
        };
        Some(handle)
    }

    fn moves_left(self) -> bool {
        matches!(self, ResizeHandle::W | ResizeHandle::NW | ResizeHandle::SW)
    }

    fn moves_right(self) -> bool {
        matches!(self, ResizeHandle::E | ResizeHandle::NE | ResizeHandle::SE)
    }

    fn moves_top(self) -> bool {
        matches!(self, ResizeHandle::N | ResizeHandle::NE | ResizeHandle::NW)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, ResizeHandle::S | ResizeHandle::SE | ResizeHandle::SW)
    }

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            ResizeHandle::NE | ResizeHandle::SE | ResizeHandle::SW | ResizeHandle::NW
        )
    }

    /// Handle position on a box.
    pub fn position(self, rect: Rect) -> Point {
        let c = rect.center();
        match self {
            ResizeHandle::N => Point::new(c.x, rect.y0),
            ResizeHandle::NE => Point::new(rect.x1, rect.y0),
            ResizeHandle::E => Point::new(rect.x1, c.y),
            ResizeHandle::SE => Point::new(rect.x1, rect.y1),
            ResizeHandle::S => Point::new(c.x, rect.y1),
            ResizeHandle::SW => Point::new(rect.x0, rect.y1),
            ResizeHandle::W => Point::new(rect.x0, c.y),
            ResizeHandle::NW => Point::new(rect.x0, rect.y0),
        }
    }
}

/// Handle of `rect` within `tolerance` of a world point; corners win over edges.
pub fn hit_test_handles(rect: Rect, point: Point, tolerance: f64) -> Option<ResizeHandle> {
    let corners = ResizeHandle::ALL.into_iter().filter(|h| h.is_corner());
    let edges = ResizeHandle::ALL.into_iter().filter(|h| !h.is_corner());
    corners
        .chain(edges)
        .find(|h| (h.position(rect) - point).hypot() <= tolerance)
}

/// Apply a handle drag to a geometry.
///
/// The edge opposite the handle stays fixed. Each axis is clamped to its
/// minimum independently; when clamped, the moving edge stops at
/// `fixed edge ± minimum`. With `keep_aspect`, corner handles scale both
/// axes by the larger of the two ratios.
pub fn resize_geometry(
    original: Geometry,
    handle: ResizeHandle,
    delta: Vec2,
    min: Size,
    keep_aspect: bool,
) -> Geometry {
    let r = original.rect();
    let mut left = r.x0;
    let mut right = r.x1;
    let mut top = r.y0;
    let mut bottom = r.y1;

    if handle.moves_left() {
        left += delta.x;
    }
    if handle.moves_right() {
        right += delta.x;
    }
    if handle.moves_top() {
        top += delta.y;
    }
    if handle.moves_bottom() {
        bottom += delta.y;
    }

    let mut width = right - left;
    let mut height = bottom - top;

    if keep_aspect && handle.is_corner() && original.width > 0.0 && original.height > 0.0 {
        let scale = (width / original.width).max(height / original.height);
        width = original.width * scale;
        height = original.height * scale;
    }

    width = width.max(min.width);
    height = height.max(min.height);

    let x = if handle.moves_left() { r.x1 - width } else { r.x0 };
    let y = if handle.moves_top() { r.y1 - height } else { r.y0 };

    Geometry {
        x,
        y,
        width,
        height,
        rotation: original.rotation,
    }
}

/// Topmost node under a world point.
///
/// Bound connectors are hit along their curve; everything else by its box.
/// Orphaned connectors are not hittable.
pub fn node_at_point(nodes: &NodeMap, point: Point, tolerance: f64, config: &EngineConfig) -> Option<NodeId> {
    crate::board::sorted_by_z(nodes)
        .into_iter()
        .rev()
        .find(|node| {
            if node.as_connector().is_some() {
                resolve_connector(node, nodes, config).is_some_and(|c| c.hit_test(point, tolerance))
            } else {
                node.geometry.contains(point)
            }
        })
        .map(|n| n.id())
}

/// Ids a marquee selects: every node whose box intersects the world rect,
/// except bound connectors.
pub fn lasso_select(nodes: &NodeMap, world_rect: Rect) -> Vec<NodeId> {
    let rect = world_rect.abs();
    let mut ids: Vec<NodeId> = nodes
        .values()
        .filter(|n| !n.is_bound_connector())
        .filter(|n| n.geometry.intersects(rect))
        .map(|n| n.id())
        .collect();
    ids.sort();
    ids
}
