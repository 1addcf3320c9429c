//! Per-client canvas: the store plus the local view and interaction state.

use crate::board::Board;
use crate::camera::Camera;
use crate::collaboration::CollaborationSync;
use crate::config::EngineConfig;
use crate::drawing::DrawingCapture;
use crate::input::{Key, Modifiers, PointerEvent, map_arrow_key, map_wheel};
use crate::manipulation::{Alignment, ManipulationEngine, align_selection};
use crate::nodes::{NodeId, SerializableColor};
use crate::scene::{Scene, build_scene};
use crate::selection::SelectionSet;
use crate::store::NodeStore;
use crate::sync::SyncEvent;
use crate::transport::Transport;
use kurbo::Size;
use log::debug;

/// What the primary pointer does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Select,
    Draw,
}

/// Runtime canvas state for one client. Only the store's board is shared
/// and persisted; everything else here is local.
#[derive(Debug, Clone)]
pub struct Canvas {
    store: NodeStore,
    pub camera: Camera,
    pub selection: SelectionSet,
    pub manipulation: ManipulationEngine,
    pub drawing: DrawingCapture,
    pub tool: Tool,
    pub stroke_color: SerializableColor,
    pub stroke_width: f64,
    pub viewport_size: Size,
}

impl Canvas {
    /// Open a board. The camera starts at the board's saved viewport.
    pub fn new(board: Board, config: EngineConfig) -> Self {
        let config = config.sanitized();
        let mut camera = Camera::with_zoom_bounds(config.min_zoom, config.max_zoom);
        camera.offset = board.viewport.offset;
        camera.set_zoom(board.viewport.zoom);
        let drawing = DrawingCapture::new(config.stroke_simplify_tolerance);
        Self {
            store: NodeStore::new(board, config),
            camera,
            selection: SelectionSet::new(),
            manipulation: ManipulationEngine::new(),
            drawing,
            tool: Tool::Select,
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            viewport_size: Size::new(800.0, 600.0),
        }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NodeStore {
        &mut self.store
    }

    pub fn config(&self) -> &EngineConfig {
        self.store.config()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.abandon_gesture();
        self.tool = tool;
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport_size = Size::new(width, height);
    }

    /// Route a pointer event. Returns true if the view needs a redraw.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Down { position, modifiers } => match self.tool {
                Tool::Select => {
                    self.manipulation
                        .pointer_down(&mut self.store, &self.camera, &mut self.selection, position, modifiers);
                    true
                }
                Tool::Draw => {
                    self.drawing
                        .begin(&self.camera, position, self.stroke_color, self.stroke_width);
                    true
                }
            },
            PointerEvent::Move { position } => {
                if self.drawing.is_drawing() {
                    self.drawing.push(&self.camera, position);
                    true
                } else if self.manipulation.is_active() {
                    self.manipulation
                        .pointer_move(&mut self.store, &self.camera, &mut self.selection, position);
                    true
                } else {
                    false
                }
            }
            PointerEvent::Up { position } => {
                if self.drawing.is_drawing() {
                    self.drawing.push(&self.camera, position);
                    self.finish_stroke().is_some()
                } else if self.manipulation.is_active() {
                    self.manipulation
                        .pointer_up(&mut self.store, &self.camera, &mut self.selection, position);
                    true
                } else {
                    false
                }
            }
            PointerEvent::Cancel => self.abandon_gesture(),
            PointerEvent::Wheel {
                position,
                delta,
                modifiers,
            } => {
                map_wheel(position, delta, modifiers, self.store.config()).apply(&mut self.camera);
                true
            }
        }
    }

    fn finish_stroke(&mut self) -> Option<NodeId> {
        let draft = self.drawing.finish()?;
        match self.store.create(draft) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("Stroke rejected: {e}");
                None
            }
        }
    }

    /// Drop any gesture or stroke in flight without recording it.
    fn abandon_gesture(&mut self) -> bool {
        let was_busy = self.manipulation.is_active() || self.drawing.is_drawing();
        self.manipulation.cancel(&mut self.store, &mut self.selection);
        self.drawing.cancel();
        was_busy
    }

    /// Route a key press. Returns true if anything changed.
    pub fn handle_key(&mut self, key: &Key, modifiers: Modifiers) -> bool {
        match key {
            Key::Escape => {
                let busy = self.abandon_gesture();
                let had_selection = !self.selection.is_empty();
                self.selection.clear();
                busy || had_selection
            }
            Key::Delete | Key::Backspace => !self.delete_selection().is_empty(),
            Key::ArrowUp | Key::ArrowDown | Key::ArrowLeft | Key::ArrowRight => {
                match map_arrow_key(key, modifiers, self.store.config()) {
                    Some(action) => {
                        action.apply(&mut self.camera);
                        true
                    }
                    None => false,
                }
            }
            Key::Character(c) if modifiers.command() => match c.to_lowercase().as_str() {
                "z" if modifiers.shift => self.redo(),
                "z" => self.undo(),
                "y" => self.redo(),
                "d" => !self.duplicate_selection().is_empty(),
                "a" => {
                    self.select_all();
                    true
                }
                _ => false,
            },
            Key::Character(_) => false,
        }
    }

    pub fn undo(&mut self) -> bool {
        self.abandon_gesture();
        let changed = self.store.undo();
        self.selection.retain_existing(self.store.nodes());
        changed
    }

    pub fn redo(&mut self) -> bool {
        self.abandon_gesture();
        let changed = self.store.redo();
        self.selection.retain_existing(self.store.nodes());
        changed
    }

    /// Jump to a history entry from the version browser.
    pub fn restore(&mut self, index: usize) -> bool {
        self.abandon_gesture();
        let changed = self.store.restore(index);
        self.selection.retain_existing(self.store.nodes());
        changed
    }

    pub fn select_all(&mut self) {
        self.selection
            .replace(self.store.nodes().values().filter(|n| !n.is_bound_connector()).map(|n| n.id()));
    }

    /// Delete the selection in one commit. Returns every id removed.
    pub fn delete_selection(&mut self) -> Vec<NodeId> {
        if self.manipulation.is_active() || self.selection.is_empty() {
            return Vec::new();
        }
        let removed = self.store.delete(&self.selection.ids());
        self.selection.clear();
        removed
    }

    /// Duplicate the selection and select the copies.
    pub fn duplicate_selection(&mut self) -> Vec<NodeId> {
        if self.manipulation.is_active() {
            return Vec::new();
        }
        let created = self.store.duplicate(&self.selection.ids());
        if !created.is_empty() {
            self.selection.replace(created.iter().copied());
        }
        created
    }

    pub fn align(&mut self, alignment: Alignment) -> usize {
        align_selection(&mut self.store, &self.selection, alignment)
    }

    /// Apply everything the collaboration channel received since the last
    /// poll. A drag in progress keeps going on top of the new snapshot.
    pub fn poll_sync<T: Transport>(&mut self, sync: &mut CollaborationSync<T>, now: u64) -> Vec<SyncEvent> {
        let events = sync.poll(&mut self.store, &mut self.selection, now);
        self.apply_sync_events(&events);
        events
    }

    /// Broadcast local commits not yet sent. Previews inside a gesture are
    /// held back until it ends.
    pub fn broadcast<T: Transport>(&self, sync: &mut CollaborationSync<T>) -> Option<SyncEvent> {
        sync.after_commit(&self.store)
    }

    /// React to events from collaboration polling.
    pub fn apply_sync_events(&mut self, events: &[SyncEvent]) {
        let replaced = events.iter().any(|e| matches!(e, SyncEvent::SnapshotApplied { .. }));
        if replaced && self.selection.retain_existing(self.store.nodes()) > 0 {
            self.selection.clear();
        }
    }

    /// Zoom and pan so every node is visible.
    pub fn fit_to_content(&mut self) -> bool {
        let Some(bounds) = self.store.content_bounds() else {
            return false;
        };
        self.camera.fit_to_bounds(bounds, self.viewport_size, 50.0);
        true
    }

    pub fn scene(&self) -> Scene {
        build_scene(&self.store, &self.camera, self.store.config())
    }

    /// The board with the current viewport, ready to persist.
    pub fn board_for_save(&self) -> Board {
        let mut board = self.store.board().clone();
        board.viewport = self.camera.clone();
        board
    }
}
