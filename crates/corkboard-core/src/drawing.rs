//! Freehand stroke capture.

use crate::camera::Camera;
use crate::nodes::{FreehandPath, FreehandPayload, Geometry, NodePayload, SerializableColor};
use crate::store::NodeDraft;
use kurbo::{Point, Rect};
use log::debug;

/// A stroke in progress, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
struct ActiveStroke {
    points: Vec<Point>,
    color: SerializableColor,
    width: f64,
}

/// Records pointer samples into a freehand drawing.
#[derive(Debug, Clone, Default)]
pub struct DrawingCapture {
    stroke: Option<ActiveStroke>,
    /// Ramer-Douglas-Peucker tolerance in world units; 0 keeps every sample.
    pub simplify_tolerance: f64,
}

impl DrawingCapture {
    pub fn new(simplify_tolerance: f64) -> Self {
        Self {
            stroke: None,
            simplify_tolerance,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke.is_some()
    }

    /// Samples recorded so far.
    pub fn points(&self) -> &[Point] {
        self.stroke.as_ref().map_or(&[], |s| s.points.as_slice())
    }

    /// Start a stroke at a screen point. Any stroke in progress is dropped.
    pub fn begin(&mut self, camera: &Camera, screen: Point, color: SerializableColor, width: f64) {
        self.begin_world(camera.screen_to_world(screen), color, width);
    }

    pub fn begin_world(&mut self, world: Point, color: SerializableColor, width: f64) {
        self.stroke = Some(ActiveStroke {
            points: vec![world],
            color,
            width,
        });
    }

    /// Append a sample.
    pub fn push(&mut self, camera: &Camera, screen: Point) {
        self.push_world(camera.screen_to_world(screen));
    }

    pub fn push_world(&mut self, world: Point) {
        if let Some(stroke) = &mut self.stroke {
            stroke.points.push(world);
        }
    }

    /// Drop the stroke without producing anything.
    pub fn cancel(&mut self) {
        if self.stroke.take().is_some() {
            debug!("Stroke cancelled");
        }
    }

    /// End the stroke.
    ///
    /// Returns `None` for strokes of fewer than two samples. Otherwise the
    /// draft's geometry is the stroke's bounding box and its points are
    /// relative to the box's top-left corner.
    pub fn finish(&mut self) -> Option<NodeDraft> {
        let stroke = self.stroke.take()?;
        if stroke.points.len() < 2 {
            debug!("Discarding stroke with {} point(s)", stroke.points.len());
            return None;
        }

        let points = if self.simplify_tolerance > 0.0 {
            rdp_simplify(&stroke.points, self.simplify_tolerance)
        } else {
            stroke.points
        };

        let bounds = points
            .iter()
            .skip(1)
            .fold(Rect::from_points(points[0], points[0]), |r, p| r.union_pt(*p));
        let origin = bounds.origin().to_vec2();
        let normalized: Vec<Point> = points.iter().map(|p| *p - origin).collect();

        let payload = FreehandPayload {
            paths: vec![FreehandPath {
                points: normalized,
                color: stroke.color,
                width: stroke.width,
            }],
            original_width: bounds.width(),
            original_height: bounds.height(),
        };
        Some(NodeDraft::from_payload(NodePayload::FreehandDrawing(payload)).at(Geometry::from_rect(bounds)))
    }
}

/// Ramer-Douglas-Peucker line simplification.
pub fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;
    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = rdp_simplify(&points[..=max_index], tolerance);
        let right = rdp_simplify(&points[max_index..], tolerance);
        // Junction point appears in both halves.
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

fn perpendicular_distance(point: Point, line_start: Point, line_end: Point) -> f64 {
    let line = line_end - line_start;
    let len_sq = line.hypot2();
    if len_sq < f64::EPSILON {
        return (point - line_start).hypot();
    }
    (point - line_start).cross(line).abs() / len_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeKind;

    fn capture(points: &[(f64, f64)]) -> Option<NodeDraft> {
        let mut drawing = DrawingCapture::default();
        let mut iter = points.iter();
        if let Some(&(x, y)) = iter.next() {
            drawing.begin_world(Point::new(x, y), SerializableColor::black(), 2.0);
        }
        for &(x, y) in iter {
            drawing.push_world(Point::new(x, y));
        }
        drawing.finish()
    }

    #[test]
    fn test_stroke_normalized_to_box() {
        let draft = capture(&[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0)]).unwrap();
        assert_eq!(draft.kind, NodeKind::FreehandDrawing);
        assert_eq!(draft.geometry, Some(Geometry::new(10.0, 10.0, 10.0, 10.0)));
        let Some(NodePayload::FreehandDrawing(payload)) = draft.payload else {
            panic!("expected a freehand payload");
        };
        assert_eq!(
            payload.paths[0].points,
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)]
        );
        assert!((payload.original_width - 10.0).abs() < f64::EPSILON);
        assert!((payload.original_height - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_short_strokes_discarded() {
        assert!(capture(&[(5.0, 5.0)]).is_none());
        let mut drawing = DrawingCapture::default();
        assert!(drawing.finish().is_none());
    }

    #[test]
    fn test_cancel_drops_stroke() {
        let mut drawing = DrawingCapture::default();
        drawing.begin_world(Point::ZERO, SerializableColor::black(), 1.0);
        drawing.push_world(Point::new(4.0, 4.0));
        drawing.cancel();
        assert!(!drawing.is_drawing());
        assert!(drawing.finish().is_none());
    }

    #[test]
    fn test_samples_mapped_through_camera() {
        let mut camera = Camera::new();
        camera.zoom = 2.0;
        camera.offset = kurbo::Vec2::new(100.0, 0.0);
        let mut drawing = DrawingCapture::default();
        drawing.begin(&camera, Point::new(100.0, 0.0), SerializableColor::black(), 1.0);
        drawing.push(&camera, Point::new(140.0, 20.0));
        assert_eq!(drawing.points(), &[Point::new(0.0, 0.0), Point::new(20.0, 10.0)]);
    }

    #[test]
    fn test_rdp_drops_collinear_points() {
        let points: Vec<Point> = (0..10).map(|i| Point::new(i as f64, 0.0)).collect();
        assert_eq!(rdp_simplify(&points, 0.5), vec![Point::new(0.0, 0.0), Point::new(9.0, 0.0)]);

        let corner = [Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(5.0, 5.0)];
        assert_eq!(rdp_simplify(&corner, 0.5), corner.to_vec());
    }

    #[test]
    fn test_simplified_capture_keeps_box() {
        let mut drawing = DrawingCapture::new(0.5);
        drawing.begin_world(Point::new(0.0, 0.0), SerializableColor::black(), 1.0);
        for i in 1..=10 {
            drawing.push_world(Point::new(i as f64, 0.0));
        }
        drawing.push_world(Point::new(10.0, 8.0));
        let draft = drawing.finish().unwrap();
        assert_eq!(draft.geometry, Some(Geometry::new(0.0, 0.0, 10.0, 8.0)));
        let Some(NodePayload::FreehandDrawing(payload)) = draft.payload else {
            panic!("expected a freehand payload");
        };
        assert_eq!(payload.paths[0].points.len(), 3);
    }
}
