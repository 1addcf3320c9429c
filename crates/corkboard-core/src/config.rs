//! Engine tunables.
//!
//! Every field has a default, so a partial JSON document is enough to
//! override a single value.

use serde::{Deserialize, Serialize};

/// Number of history entries kept before the oldest is dropped.
pub const HISTORY_WINDOW: usize = 50;
/// Smallest allowed zoom factor.
pub const MIN_ZOOM: f64 = 0.1;
/// Largest allowed zoom factor.
pub const MAX_ZOOM: f64 = 5.0;
/// Grid cell size in world units.
pub const GRID_SIZE: f64 = 20.0;
/// Alignment guide threshold in screen pixels.
pub const GUIDE_THRESHOLD_PX: f64 = 8.0;
/// Offset applied to duplicated nodes, in world units.
pub const DUPLICATE_OFFSET: f64 = 20.0;

/// Configuration shared by the canvas components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of history entries.
    pub history_window: usize,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Grid cell size used when grid snapping is on.
    pub grid_size: f64,
    /// Alignment guide threshold in screen pixels.
    pub guide_threshold_px: f64,
    pub duplicate_offset: f64,
    /// Padding around node boxes where connectors attach.
    pub connector_padding: f64,
    /// Fraction of endpoint distance used for connector control offsets.
    pub connector_curve_ratio: f64,
    /// Upper bound on connector control offsets, in world units.
    pub connector_curve_ceiling: f64,
    /// Pointer hit tolerance in screen pixels (handles, connector curves).
    pub hit_tolerance_px: f64,
    /// Arrow-key pan step in screen pixels.
    pub pan_step_px: f64,
    /// Arrow-key pan step with a modifier held.
    pub pan_step_large_px: f64,
    /// Zoom change per wheel unit.
    pub wheel_zoom_sensitivity: f64,
    pub heartbeat_interval_ms: u64,
    /// Peers silent for longer than this are dropped.
    pub presence_timeout_ms: u64,
    /// Minimum interval between outgoing cursor updates.
    pub cursor_throttle_ms: u64,
    /// Quiet period after the last commit before autosave writes.
    pub autosave_debounce_ms: u64,
    /// Ramer-Douglas-Peucker tolerance for captured strokes; 0 keeps every sample.
    pub stroke_simplify_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: HISTORY_WINDOW,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            grid_size: GRID_SIZE,
            guide_threshold_px: GUIDE_THRESHOLD_PX,
            duplicate_offset: DUPLICATE_OFFSET,
            connector_padding: 8.0,
            connector_curve_ratio: 0.4,
            connector_curve_ceiling: 120.0,
            hit_tolerance_px: 6.0,
            pan_step_px: 50.0,
            pan_step_large_px: 200.0,
            wheel_zoom_sensitivity: 0.0015,
            heartbeat_interval_ms: 5_000,
            presence_timeout_ms: 15_000,
            cursor_throttle_ms: 50,
            autosave_debounce_ms: 1_000,
            stroke_simplify_tolerance: 0.0,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Clamp values that would break the engine's invariants.
    pub fn sanitized(mut self) -> Self {
        self.history_window = self.history_window.max(1);
        if !(self.min_zoom > 0.0) {
            self.min_zoom = MIN_ZOOM;
        }
        if self.max_zoom < self.min_zoom {
            self.max_zoom = self.min_zoom;
        }
        if !(self.grid_size > 0.0) {
            self.grid_size = GRID_SIZE;
        }
        self
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
