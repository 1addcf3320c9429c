//! Node placement in world space.

use super::ValidationError;
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Position, size and rotation of a node in world coordinates.
///
/// `(x, y)` is the top-left corner of the unrotated box; rotation is in
/// radians around the box center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
}

impl Geometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    /// Geometry covering a rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }

    /// The unrotated bounding box.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Copy moved by a world-space delta.
    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..*self
        }
    }

    /// Check that every field is finite and the size is non-negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let finite = [self.x, self.y, self.width, self.height, self.rotation]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(ValidationError::NonFiniteGeometry);
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(ValidationError::NegativeSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Grow the box to at least the given size, keeping the origin.
    pub fn clamped_to_min(&self, min: Size) -> Self {
        Self {
            width: self.width.max(min.width),
            height: self.height.max(min.height),
            ..*self
        }
    }

    /// Whether a world point lies inside the (possibly rotated) box.
    pub fn contains(&self, point: Point) -> bool {
        let local = if self.rotation == 0.0 {
            point
        } else {
            rotate_about(point, self.center(), -self.rotation)
        };
        self.rect().contains(local) || on_far_edge(self.rect(), local)
    }

    /// Whether the unrotated box intersects a rectangle. Touching edges count.
    pub fn intersects(&self, rect: Rect) -> bool {
        let own = self.rect();
        own.x0 <= rect.x1 && own.x1 >= rect.x0 && own.y0 <= rect.y1 && own.y1 >= rect.y0
    }
}

/// `Rect::contains` excludes the right and bottom edges.
fn on_far_edge(rect: Rect, p: Point) -> bool {
    (p.x == rect.x1 && p.y >= rect.y0 && p.y <= rect.y1)
        || (p.y == rect.y1 && p.x >= rect.x0 && p.x <= rect.x1)
}

/// Rotate a point around a center by an angle in radians.
pub fn rotate_about(point: Point, center: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let d = point - center;
    Point::new(
        center.x + d.x * cos - d.y * sin,
        center.y + d.x * sin + d.y * cos,
    )
}
