//! Snapping: grid rounding and alignment guides between node boxes.

use kurbo::{Point, Rect, Vec2};

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> SnapResult {
    if !(grid_size > 0.0) {
        return SnapResult::none(point);
    }
    SnapResult {
        point: Point::new(
            (point.x / grid_size).round() * grid_size,
            (point.y / grid_size).round() * grid_size,
        ),
        snapped_x: true,
        snapped_y: true,
    }
}

/// Orientation of an alignment guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideOrientation {
    /// A line of constant x.
    Vertical,
    /// A line of constant y.
    Horizontal,
}

/// A guide line shown while a dragged node lines up with another one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentGuide {
    pub orientation: GuideOrientation,
    /// x for vertical guides, y for horizontal ones.
    pub position: f64,
    /// Extent along the line, covering both boxes.
    pub start: f64,
    pub end: f64,
}

impl AlignmentGuide {
    /// Endpoints of the guide in world space.
    pub fn line(&self) -> (Point, Point) {
        match self.orientation {
            GuideOrientation::Vertical => (
                Point::new(self.position, self.start),
                Point::new(self.position, self.end),
            ),
            GuideOrientation::Horizontal => (
                Point::new(self.start, self.position),
                Point::new(self.end, self.position),
            ),
        }
    }
}

/// Outcome of comparing a moving box against its neighbours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuideSnap {
    /// Correction to add to the moving box.
    pub offset: Vec2,
    pub snapped_x: bool,
    pub snapped_y: bool,
    pub guides: Vec<AlignmentGuide>,
}

/// Left, center and right of a box.
fn x_anchors(r: Rect) -> [f64; 3] {
    [r.x0, (r.x0 + r.x1) / 2.0, r.x1]
}

/// Top, middle and bottom of a box.
fn y_anchors(r: Rect) -> [f64; 3] {
    [r.y0, (r.y0 + r.y1) / 2.0, r.y1]
}

/// Closest (moving anchor, target) pair within the threshold, as
/// (correction, target, index of the matching box).
fn best_match(moving: [f64; 3], targets: impl Iterator<Item = (usize, [f64; 3])>, threshold: f64) -> Option<(f64, f64, usize)> {
    let mut best: Option<(f64, f64, usize)> = None;
    for (index, anchors) in targets {
        for target in anchors {
            for m in moving {
                let diff = target - m;
                let better = match best {
                    Some((d, _, _)) => diff.abs() < d.abs(),
                    None => diff.abs() <= threshold,
                };
                if better {
                    best = Some((diff, target, index));
                }
            }
        }
    }
    best
}

/// Compare a moving box's edges and centers with every other box.
///
/// X and Y snap independently. `threshold` is in world units; callers pass
/// the screen-pixel threshold divided by zoom.
pub fn detect_alignment_guides(moving: Rect, others: &[Rect], threshold: f64) -> GuideSnap {
    let mut result = GuideSnap::default();

    let x = best_match(x_anchors(moving), others.iter().map(|r| x_anchors(*r)).enumerate(), threshold);
    let y = best_match(y_anchors(moving), others.iter().map(|r| y_anchors(*r)).enumerate(), threshold);

    if let Some((dx, _, _)) = x {
        result.offset.x = dx;
        result.snapped_x = true;
    }
    if let Some((dy, _, _)) = y {
        result.offset.y = dy;
        result.snapped_y = true;
    }

    let snapped = moving + result.offset;
    if let Some((_, position, index)) = x {
        let other = others[index];
        result.guides.push(AlignmentGuide {
            orientation: GuideOrientation::Vertical,
            position,
            start: snapped.y0.min(other.y0),
            end: snapped.y1.max(other.y1),
        });
    }
    if let Some((_, position, index)) = y {
        let other = others[index];
        result.guides.push(AlignmentGuide {
            orientation: GuideOrientation::Horizontal,
            position,
            start: snapped.x0.min(other.x0),
            end: snapped.x1.max(other.x1),
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        let result = snap_to_grid(Point::new(23.0, 47.0), 20.0);
        assert!((result.point.x - 20.0).abs() < f64::EPSILON);
        assert!((result.point.y - 40.0).abs() < f64::EPSILON);
        assert!(result.is_snapped());
    }

    #[test]
    fn test_snap_to_grid_round_up() {
        let result = snap_to_grid(Point::new(31.0, -11.0), 20.0);
        assert!((result.point.x - 40.0).abs() < f64::EPSILON);
        assert!((result.point.y + 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snap_to_grid_ignores_bad_cell() {
        let result = snap_to_grid(Point::new(3.0, 4.0), 0.0);
        assert!(!result.is_snapped());
    }

    #[test]
    fn test_left_edge_snaps_to_right_edge() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(105.0, 300.0, 205.0, 400.0);
        let snap = detect_alignment_guides(b, &[a], 8.0);
        assert!(snap.snapped_x);
        assert!(!snap.snapped_y);
        assert!((snap.offset.x + 5.0).abs() < f64::EPSILON);
        assert_eq!(snap.guides.len(), 1);
        let guide = snap.guides[0];
        assert_eq!(guide.orientation, GuideOrientation::Vertical);
        assert!((guide.position - 100.0).abs() < f64::EPSILON);
        assert!((guide.start - 0.0).abs() < f64::EPSILON);
        assert!((guide.end - 400.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_axes_snap_independently() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let c = Rect::new(500.0, 500.0, 560.0, 560.0);
        // Center x lines up with a, top lines up with c.
        let moving = Rect::new(23.0, 503.0, 77.0, 520.0);
        let snap = detect_alignment_guides(moving, &[a, c], 5.0);
        assert!(snap.snapped_x && snap.snapped_y);
        assert!((snap.offset.x - 0.0).abs() < f64::EPSILON);
        assert!((snap.offset.y + 3.0).abs() < f64::EPSILON);
        assert_eq!(snap.guides.len(), 2);
    }

    #[test]
    fn test_nothing_within_threshold() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let far = Rect::new(300.0, 300.0, 350.0, 350.0);
        let snap = detect_alignment_guides(far, &[a], 8.0);
        assert_eq!(snap, GuideSnap::default());
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let moving = Rect::new(94.0, 200.0, 110.0, 220.0);
        let snap = detect_alignment_guides(moving, &[a], 8.0);
        // Center 102 is 2 from 100, closer than left edge 94 (6 away).
        assert!((snap.offset.x + 2.0).abs() < f64::EPSILON);
    }
}
