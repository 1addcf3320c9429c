//! Pointer-driven manipulation: drag, resize, lasso and connector handles.
//!
//! Every continuous gesture runs inside a store gesture transaction, so a
//! drag previews on every move and records one history entry on release.

use crate::camera::Camera;
use crate::connector::{ConnectorHandle, resolve_connector};
use crate::input::Modifiers;
use crate::nodes::{Geometry, NodeId, NodePayload};
use crate::selection::{ResizeHandle, SelectionSet, hit_test_handles, lasso_select, node_at_point, resize_geometry};
use crate::snap::{AlignmentGuide, detect_alignment_guides, snap_to_grid};
use crate::store::{NodePatch, NodeStore};
use kurbo::{Point, Rect, Vec2};
use log::{debug, warn};

/// State of the current pointer interaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ManipulationState {
    #[default]
    Idle,
    /// Moving the selection. The first original is the node under the pointer.
    Dragging {
        start: Point,
        originals: Vec<(NodeId, Geometry)>,
    },
    Resizing {
        id: NodeId,
        handle: ResizeHandle,
        start: Point,
        original: Geometry,
        keep_aspect: bool,
    },
    /// Marquee in world space.
    Lasso {
        start: Point,
        current: Point,
        additive: bool,
        base: Vec<NodeId>,
    },
    /// Dragging the mid handle of a bound connector.
    Bending { id: NodeId },
    /// Dragging a bound connector's endpoint towards another node.
    Rebinding {
        id: NodeId,
        end: ConnectorHandle,
        current: Point,
    },
}

/// Group alignment command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
    /// Average horizontal center.
    Center,
    /// Average vertical center.
    Middle,
}

impl Alignment {
    fn label(self) -> &'static str {
        match self {
            Alignment::Left => "Align left",
            Alignment::Right => "Align right",
            Alignment::Top => "Align top",
            Alignment::Bottom => "Align bottom",
            Alignment::Center => "Align center",
            Alignment::Middle => "Align middle",
        }
    }
}

/// Turns pointer input into store mutations.
#[derive(Debug, Clone, Default)]
pub struct ManipulationEngine {
    state: ManipulationState,
    guides: Vec<AlignmentGuide>,
    /// Round drag destinations to the grid.
    pub grid_snap: bool,
}

impl ManipulationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ManipulationState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != ManipulationState::Idle
    }

    /// Guides surfaced by the current single-node drag.
    pub fn guides(&self) -> &[AlignmentGuide] {
        &self.guides
    }

    /// The marquee being dragged, in world space.
    pub fn lasso_rect(&self) -> Option<Rect> {
        match &self.state {
            ManipulationState::Lasso { start, current, .. } => Some(Rect::from_points(*start, *current)),
            _ => None,
        }
    }

    /// Start an interaction at a screen point.
    pub fn pointer_down(
        &mut self,
        store: &mut NodeStore,
        camera: &Camera,
        selection: &mut SelectionSet,
        screen: Point,
        modifiers: Modifiers,
    ) {
        if self.is_active() {
            self.cancel(store, selection);
        }
        let world = camera.screen_to_world(screen);
        let tolerance = camera.screen_distance_to_world(store.config().hit_tolerance_px);

        if let Some(id) = selection.single() {
            if self.grab_handle(store, id, world, tolerance, screen, modifiers) {
                return;
            }
        }

        let hit = node_at_point(store.nodes(), world, tolerance, store.config());
        match hit {
            Some(id) if modifiers.shift => selection.toggle(id),
            Some(id) => {
                if !selection.contains(id) {
                    selection.select_only(id);
                }
                self.begin_drag(store, selection, id, screen);
            }
            None => {
                let base = if modifiers.shift {
                    selection.ids()
                } else {
                    selection.clear();
                    Vec::new()
                };
                self.state = ManipulationState::Lasso {
                    start: world,
                    current: world,
                    additive: modifiers.shift,
                    base,
                };
            }
        }
    }

    /// Resize or connector handle under the pointer, for a single selection.
    fn grab_handle(
        &mut self,
        store: &mut NodeStore,
        id: NodeId,
        world: Point,
        tolerance: f64,
        screen: Point,
        modifiers: Modifiers,
    ) -> bool {
        let Some(node) = store.get(id) else {
            return false;
        };
        if node.locked {
            return false;
        }

        if node.is_bound_connector() {
            let Some(resolved) = resolve_connector(node, store.nodes(), store.config()) else {
                return false;
            };
            return match resolved.handle_at(world, tolerance) {
                Some(ConnectorHandle::Mid) => {
                    store.begin_gesture("Bend connector");
                    self.state = ManipulationState::Bending { id };
                    true
                }
                Some(end) => {
                    self.state = ManipulationState::Rebinding { id, end, current: world };
                    true
                }
                None => false,
            };
        }

        let Some(handle) = hit_test_handles(node.bounds(), world, tolerance) else {
            return false;
        };
        let original = node.geometry;
        let label = format!("Resize {}", node.kind().label());
        store.begin_gesture(label);
        self.state = ManipulationState::Resizing {
            id,
            handle,
            start: screen,
            original,
            keep_aspect: modifiers.shift,
        };
        true
    }

    fn begin_drag(&mut self, store: &mut NodeStore, selection: &SelectionSet, grabbed: NodeId, screen: Point) {
        let movable = |id: NodeId| {
            store
                .get(id)
                .filter(|n| !n.locked && !n.is_bound_connector())
                .map(|n| (id, n.geometry))
        };
        // The grabbed node must itself be movable.
        let Some(first) = movable(grabbed) else {
            debug!("Node {grabbed} is locked; not dragging");
            return;
        };
        let mut originals = vec![first];
        originals.extend(selection.ids().into_iter().filter(|id| *id != grabbed).filter_map(movable));

        let label = if originals.len() == 1 {
            format!("Move {}", store.get(grabbed).map_or("node", |n| n.kind().label()))
        } else {
            format!("Move {} nodes", originals.len())
        };
        store.begin_gesture(label);
        self.state = ManipulationState::Dragging { start: screen, originals };
    }

    /// Continue the interaction.
    pub fn pointer_move(&mut self, store: &mut NodeStore, camera: &Camera, selection: &mut SelectionSet, screen: Point) {
        if self.holds_gesture() && !store.in_gesture() {
            // Closed underneath us (undo, restore, a direct commit).
            debug!("Store gesture closed; abandoning {:?}", self.state);
            self.reset();
            return;
        }
        let world = camera.screen_to_world(screen);
        match &mut self.state {
            ManipulationState::Idle => {}
            ManipulationState::Dragging { start, originals } => {
                let delta = (screen - *start) / camera.zoom;
                let originals = originals.clone();
                self.drag_to(store, camera, &originals, delta);
            }
            ManipulationState::Resizing {
                id,
                handle,
                start,
                original,
                keep_aspect,
            } => {
                let delta = (screen - *start) / camera.zoom;
                let min = store.get(*id).map(|n| n.kind().min_size()).unwrap_or_default();
                let geometry = resize_geometry(*original, *handle, delta, min, *keep_aspect);
                if let Err(e) = store.update(&[*id], &NodePatch::geometry(geometry)) {
                    warn!("Resize rejected: {e}");
                }
            }
            ManipulationState::Lasso {
                start,
                current,
                additive,
                base,
            } => {
                *current = world;
                let hits = lasso_select(store.nodes(), Rect::from_points(*start, *current));
                if *additive {
                    selection.replace(base.iter().copied());
                    selection.extend(hits);
                } else {
                    selection.replace(hits);
                }
            }
            ManipulationState::Bending { id } => {
                let id = *id;
                set_control_point(store, id, Some(world));
            }
            ManipulationState::Rebinding { current, .. } => *current = world,
        }
    }

    fn drag_to(&mut self, store: &mut NodeStore, camera: &Camera, originals: &[(NodeId, Geometry)], mut delta: Vec2) {
        self.guides.clear();
        let Some(&(_, anchor)) = originals.first() else {
            return;
        };

        let mut guided_x = false;
        let mut guided_y = false;
        if originals.len() == 1 {
            let moving = anchor.translated(delta).rect();
            let others: Vec<Rect> = store
                .nodes()
                .values()
                .filter(|n| n.id() != originals[0].0 && !n.is_bound_connector())
                .map(|n| n.bounds())
                .collect();
            let threshold = camera.screen_distance_to_world(store.config().guide_threshold_px);
            let snap = detect_alignment_guides(moving, &others, threshold);
            delta += snap.offset;
            guided_x = snap.snapped_x;
            guided_y = snap.snapped_y;
            self.guides = snap.guides;
        }

        if self.grid_snap {
            let target = anchor.origin() + delta;
            let snapped = snap_to_grid(target, store.config().grid_size);
            if snapped.snapped_x && !guided_x {
                delta.x = snapped.point.x - anchor.x;
            }
            if snapped.snapped_y && !guided_y {
                delta.y = snapped.point.y - anchor.y;
            }
        }

        for (id, original) in originals {
            let patch = NodePatch::position(original.x + delta.x, original.y + delta.y);
            if let Err(e) = store.update(&[*id], &patch) {
                warn!("Drag rejected for {id}: {e}");
            }
        }
    }

    /// Finish the interaction. Returns whether a history entry was recorded.
    pub fn pointer_up(&mut self, store: &mut NodeStore, camera: &Camera, selection: &mut SelectionSet, screen: Point) -> bool {
        self.pointer_move(store, camera, selection, screen);
        self.guides.clear();
        match std::mem::take(&mut self.state) {
            ManipulationState::Idle | ManipulationState::Lasso { .. } => false,
            ManipulationState::Dragging { .. }
            | ManipulationState::Resizing { .. }
            | ManipulationState::Bending { .. } => store.end_gesture(),
            ManipulationState::Rebinding { id, end, current } => rebind(store, id, end, current),
        }
    }

    /// Abandon the interaction without recording anything.
    pub fn cancel(&mut self, store: &mut NodeStore, selection: &mut SelectionSet) {
        self.guides.clear();
        match std::mem::take(&mut self.state) {
            ManipulationState::Dragging { .. }
            | ManipulationState::Resizing { .. }
            | ManipulationState::Bending { .. } => {
                store.cancel_gesture();
            }
            ManipulationState::Lasso { base, .. } => selection.replace(base),
            ManipulationState::Idle | ManipulationState::Rebinding { .. } => {}
        }
    }

    fn holds_gesture(&self) -> bool {
        matches!(
            self.state,
            ManipulationState::Dragging { .. } | ManipulationState::Resizing { .. } | ManipulationState::Bending { .. }
        )
    }

    /// Forget the interaction without touching the store.
    pub fn reset(&mut self) {
        self.state = ManipulationState::Idle;
        self.guides.clear();
    }
}

fn set_control_point(store: &mut NodeStore, id: NodeId, point: Option<Point>) {
    let Some(mut payload) = store.get(id).and_then(|n| n.as_connector()).cloned() else {
        return;
    };
    payload.control_point = point;
    let patch = NodePatch {
        payload: Some(NodePayload::Connector(payload)),
        ..NodePatch::default()
    };
    if let Err(e) = store.update(&[id], &patch) {
        warn!("Connector bend rejected: {e}");
    }
}

/// Reattach one end of a connector to the node under `point`.
fn rebind(store: &mut NodeStore, id: NodeId, end: ConnectorHandle, point: Point) -> bool {
    let Some(mut payload) = store.get(id).and_then(|n| n.as_connector()).cloned() else {
        return false;
    };
    let target = store
        .nodes_sorted()
        .into_iter()
        .rev()
        .filter(|n| n.as_connector().is_none())
        .find(|n| n.geometry.contains(point))
        .map(|n| n.id());
    let Some(target) = target else {
        return false;
    };

    let (slot, other) = match end {
        ConnectorHandle::Start => (&mut payload.from, payload.to),
        ConnectorHandle::End => (&mut payload.to, payload.from),
        ConnectorHandle::Mid => return false,
    };
    if other == Some(target) || *slot == Some(target) {
        return false;
    }
    *slot = Some(target);

    let patch = NodePatch {
        payload: Some(NodePayload::Connector(payload)),
        ..NodePatch::default()
    };
    store.update(&[id], &patch).is_ok_and(|n| n > 0)
}

/// Align the selected, unlocked nodes in one commit. Returns how many moved.
pub fn align_selection(store: &mut NodeStore, selection: &SelectionSet, alignment: Alignment) -> usize {
    if store.in_gesture() {
        return 0;
    }
    let members: Vec<(NodeId, Geometry)> = selection
        .ids()
        .into_iter()
        .filter_map(|id| store.get(id))
        .filter(|n| !n.locked && !n.is_bound_connector())
        .map(|n| (n.id(), n.geometry))
        .collect();
    if members.len() < 2 {
        return 0;
    }

    let count = members.len() as f64;
    let min_x = members.iter().map(|(_, g)| g.x).fold(f64::INFINITY, f64::min);
    let max_x = members.iter().map(|(_, g)| g.x + g.width).fold(f64::NEG_INFINITY, f64::max);
    let min_y = members.iter().map(|(_, g)| g.y).fold(f64::INFINITY, f64::min);
    let max_y = members.iter().map(|(_, g)| g.y + g.height).fold(f64::NEG_INFINITY, f64::max);
    let mean_cx = members.iter().map(|(_, g)| g.center().x).sum::<f64>() / count;
    let mean_cy = members.iter().map(|(_, g)| g.center().y).sum::<f64>() / count;

    store.begin_gesture(alignment.label());
    for (id, g) in &members {
        let patch = match alignment {
            Alignment::Left => NodePatch::position(min_x, g.y),
            Alignment::Right => NodePatch::position(max_x - g.width, g.y),
            Alignment::Top => NodePatch::position(g.x, min_y),
            Alignment::Bottom => NodePatch::position(g.x, max_y - g.height),
            Alignment::Center => NodePatch::position(mean_cx - g.width / 2.0, g.y),
            Alignment::Middle => NodePatch::position(g.x, mean_cy - g.height / 2.0),
        };
        if let Err(e) = store.update(&[*id], &patch) {
            warn!("{} rejected for {id}: {e}", alignment.label());
        }
    }
    store.end_gesture();
    members.len()
}
