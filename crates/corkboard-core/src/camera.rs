//! Camera module for pan/zoom transforms.

use crate::config::{MAX_ZOOM, MIN_ZOOM};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Camera manages the view transform for the canvas.
///
/// `world_to_screen(p) = p * zoom + offset`. The offset is unbounded since
/// the canvas is infinite; zoom stays within `[min_zoom, max_zoom]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan), in screen pixels.
    pub offset: Vec2,
    /// Current zoom level.
    pub zoom: f64,
    /// Minimum allowed zoom level
    pub min_zoom: f64,
    /// Maximum allowed zoom level
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a camera with custom zoom bounds.
    pub fn with_zoom_bounds(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            min_zoom,
            max_zoom,
            ..Self::default()
        }
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts world coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Get the inverse transform for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Convert a screen-space rectangle to world space.
    pub fn screen_rect_to_world(&self, rect: Rect) -> Rect {
        Rect::from_points(
            self.screen_to_world(Point::new(rect.x0, rect.y0)),
            self.screen_to_world(Point::new(rect.x1, rect.y1)),
        )
    }

    /// Convert a world-space rectangle to screen space.
    pub fn world_rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_points(
            self.world_to_screen(Point::new(rect.x0, rect.y0)),
            self.world_to_screen(Point::new(rect.x1, rect.y1)),
        )
    }

    /// Convert a screen-pixel distance to world units at the current zoom.
    pub fn screen_distance_to_world(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    /// Pan the camera by a delta in screen coordinates.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Set the zoom level directly, clamped to the allowed range.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
    }

    /// Zoom the camera, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        // Convert screen point to world before zoom
        let world_point = self.screen_to_world(screen_point);

        self.zoom = new_zoom;

        // Adjust offset so world_point stays at screen_point
        let new_screen = self.world_to_screen(world_point);
        self.offset += screen_point - new_screen;
    }

    /// Reset camera to the origin at 100%.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0_f64.clamp(self.min_zoom, self.max_zoom);
    }

    /// Zoom to fit `bounds` inside the viewport minus `padding`, centered.
    /// A degenerate box is centered at 100%.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        self.zoom = if bounds.is_zero_area() {
            1.0_f64.clamp(self.min_zoom, self.max_zoom)
        } else {
            let usable_w = (viewport.width - padding * 2.0).max(1.0);
            let usable_h = (viewport.height - padding * 2.0).max(1.0);
            (usable_w / bounds.width())
                .min(usable_h / bounds.height())
                .clamp(self.min_zoom, self.max_zoom)
        };
        let viewport_center = Point::new(viewport.width / 2.0, viewport.height / 2.0);
        self.offset = viewport_center.to_vec2() - bounds.center().to_vec2() * self.zoom;
    }

    /// The world-space region visible in a viewport of the given size.
    pub fn visible_world_rect(&self, viewport: Size) -> Rect {
        self.screen_rect_to_world(Rect::from_origin_size(Point::ZERO, viewport))
    }
}
