//! Pointer, wheel and keyboard input, and their mapping onto the viewport.

use crate::camera::Camera;
use crate::config::EngineConfig;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Shift held, nothing else.
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Ctrl held, nothing else.
    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        alt: false,
        meta: false,
    };

    /// Whether the platform command modifier (ctrl or meta) is held.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    /// Whether any modifier is held.
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point, modifiers: Modifiers },
    Move { position: Point },
    Up { position: Point },
    /// Pointer capture was lost; any gesture in flight is abandoned.
    Cancel,
    Wheel {
        position: Point,
        delta: Vec2,
        modifiers: Modifiers,
    },
}

/// Keys the canvas reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Character(String),
}

/// Change to apply to the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportAction {
    /// Zoom by a factor around a screen point.
    Zoom { anchor: Point, factor: f64 },
    /// Pan by a screen-space delta.
    Pan(Vec2),
}

impl ViewportAction {
    /// Apply this action to a camera.
    pub fn apply(self, camera: &mut Camera) {
        match self {
            ViewportAction::Zoom { anchor, factor } => camera.zoom_at(anchor, factor),
            ViewportAction::Pan(delta) => camera.pan_by(delta),
        }
    }
}

/// Map a wheel event: command+wheel zooms toward the pointer, plain wheel pans.
///
/// Shift turns a purely vertical wheel into horizontal panning.
pub fn map_wheel(
    position: Point,
    delta: Vec2,
    modifiers: Modifiers,
    config: &EngineConfig,
) -> ViewportAction {
    if modifiers.command() {
        let factor = (-delta.y * config.wheel_zoom_sensitivity).exp();
        return ViewportAction::Zoom {
            anchor: position,
            factor,
        };
    }
    let delta = if modifiers.shift && delta.x == 0.0 {
        Vec2::new(delta.y, 0.0)
    } else {
        delta
    };
    ViewportAction::Pan(-delta)
}

/// Map an arrow key to a discrete pan step. Any modifier selects the large step.
///
/// The view moves in the arrow's direction, so content shifts the other way.
pub fn map_arrow_key(key: &Key, modifiers: Modifiers, config: &EngineConfig) -> Option<ViewportAction> {
    let step = if modifiers.any() {
        config.pan_step_large_px
    } else {
        config.pan_step_px
    };
    let delta = match key {
        Key::ArrowUp => Vec2::new(0.0, step),
        Key::ArrowDown => Vec2::new(0.0, -step),
        Key::ArrowLeft => Vec2::new(step, 0.0),
        Key::ArrowRight => Vec2::new(-step, 0.0),
        _ => return None,
    };
    Some(ViewportAction::Pan(delta))
}
