//! Drawing surface shapes and active path extraction
//!
//! The drawing canvas reports every stroke drawn in the session as a shape
//! record. Measurement tools act on the most recently drawn free-form path.

use crate::geometry::PixelPoint;
use serde_json::Value;
use tracing::debug;

/// Shape type tag for free-form paths
pub const PATH_SHAPE: &str = "path";

/// Path segment command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    MoveTo,
    LineTo,
    QuadraticTo,
    CubicTo,
    Close,
    Other,
}

impl SegmentKind {
    pub fn from_command(command: &str) -> Self {
        match command {
            "M" => SegmentKind::MoveTo,
            "L" => SegmentKind::LineTo,
            "Q" => SegmentKind::QuadraticTo,
            "C" => SegmentKind::CubicTo,
            "Z" | "z" => SegmentKind::Close,
            _ => SegmentKind::Other,
        }
    }

    pub fn command(&self) -> Option<&'static str> {
        match self {
            SegmentKind::MoveTo => Some("M"),
            SegmentKind::LineTo => Some("L"),
            SegmentKind::QuadraticTo => Some("Q"),
            SegmentKind::CubicTo => Some("C"),
            SegmentKind::Close => Some("Z"),
            SegmentKind::Other => None,
        }
    }

    /// Whether segments of this kind contribute a vertex
    pub fn is_vertex(&self) -> bool {
        matches!(self, SegmentKind::MoveTo | SegmentKind::LineTo)
    }
}

/// One shape record from the drawing canvas.
///
/// Segments are kept as raw JSON (`[command, x, y, ...]`) because the canvas
/// emits variable-length, occasionally malformed entries.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
}

impl Shape {
    /// Free-form path from raw segments
    pub fn path(segments: Vec<Value>) -> Self {
        Self { kind: PATH_SHAPE.to_string(), path: segments }
    }

    /// Free-form path through `points`: a move-to followed by line-tos
    pub fn polyline(points: &[PixelPoint]) -> Self {
        let segments = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let kind = if i == 0 { SegmentKind::MoveTo } else { SegmentKind::LineTo };
                serde_json::json!([kind.command(), p.x, p.y])
            })
            .collect();
        Self::path(segments)
    }

    /// Non-path shape (rect, circle, text, ...)
    pub fn other(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), path: Vec::new() }
    }

    pub fn is_path(&self) -> bool {
        self.kind == PATH_SHAPE
    }

    /// Vertices of this shape in segment order.
    ///
    /// Non-path shapes yield nothing. Segments that are not move-to/line-to,
    /// or lack two numeric coordinates, are dropped.
    pub fn points(&self) -> Vec<PixelPoint> {
        if !self.is_path() {
            return Vec::new();
        }
        self.path.iter().filter_map(segment_point).collect()
    }
}

fn segment_point(segment: &Value) -> Option<PixelPoint> {
    let fields = segment.as_array()?;
    let kind = SegmentKind::from_command(fields.first()?.as_str()?);
    if !kind.is_vertex() {
        return None;
    }
    let x = fields.get(1)?.as_f64()?;
    let y = fields.get(2)?.as_f64()?;
    Some(PixelPoint::new(x, y))
}

/// Canvas JSON is either a bare shape list or `{ "objects": [...] }`
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum CanvasJson {
    Shapes(Vec<Shape>),
    Document { objects: Vec<Shape> },
}

/// All shapes drawn on the current plan, in drawing order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawingSurface {
    shapes: Vec<Shape>,
}

impl DrawingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_shapes(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// Parse canvas JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let shapes = match serde_json::from_str(json)? {
            CanvasJson::Shapes(shapes) => shapes,
            CanvasJson::Document { objects } => objects,
        };
        Ok(Self::from_shapes(shapes))
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn extend(&mut self, shapes: impl IntoIterator<Item = Shape>) {
        self.shapes.extend(shapes);
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn active_path(&self) -> Vec<PixelPoint> {
        extract_active_path(&self.shapes)
    }
}

/// Points of the most recently drawn path that has at least one usable
/// segment. Empty when there is none.
pub fn extract_active_path(shapes: &[Shape]) -> Vec<PixelPoint> {
    for (index, shape) in shapes.iter().enumerate().rev() {
        if !shape.is_path() {
            debug!(index, kind = %shape.kind, "skipping non-path shape");
            continue;
        }

        let points = shape.points();
        if points.is_empty() {
            debug!(index, segments = shape.path.len(), "skipping path without usable segments");
            continue;
        }

        debug!(index, points = points.len(), "extracted active path");
        return points;
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_most_recent_path_wins() {
        let older = Shape::polyline(&[PixelPoint::new(0.0, 0.0), PixelPoint::new(1.0, 1.0)]);
        let newer = Shape::polyline(&[PixelPoint::new(5.0, 5.0), PixelPoint::new(9.0, 9.0)]);

        let points = extract_active_path(&[older, newer]);
        assert_eq!(points, vec![PixelPoint::new(5.0, 5.0), PixelPoint::new(9.0, 9.0)]);
    }

    #[test]
    fn test_non_path_shapes_are_ignored() {
        let path = Shape::polyline(&[PixelPoint::new(2.0, 3.0), PixelPoint::new(4.0, 5.0)]);
        let expected = path.points();

        // Non-path drawn first, path most recent
        let points = extract_active_path(&[Shape::other("rect"), path.clone()]);
        assert_eq!(points, expected);

        // Non-path drawn last is skipped as well
        let points = extract_active_path(&[path, Shape::other("circle")]);
        assert_eq!(points, expected);
    }

    #[test]
    fn test_malformed_segments_are_dropped() {
        let shape = Shape::path(vec![
            json!(["M", 10.0, 20.0]),
            json!(["Q", 11.0, 21.0, 12.0, 22.0]),
            json!(["L", 30.0]),
            json!(["L", "x", 5.0]),
            json!("garbage"),
            json!([]),
            json!(["L", 40, 50, 99]),
        ]);

        assert_eq!(
            shape.points(),
            vec![PixelPoint::new(10.0, 20.0), PixelPoint::new(40.0, 50.0)]
        );
    }

    #[test]
    fn test_path_without_usable_segments_falls_back_to_older() {
        let usable = Shape::polyline(&[PixelPoint::new(1.0, 1.0), PixelPoint::new(2.0, 2.0)]);
        let curves_only = Shape::path(vec![json!(["Q", 0.0, 0.0, 1.0, 1.0]), json!(["Z"])]);

        let points = extract_active_path(&[usable.clone(), curves_only]);
        assert_eq!(points, usable.points());
    }

    #[test]
    fn test_nothing_qualifies() {
        assert!(extract_active_path(&[]).is_empty());
        assert!(extract_active_path(&[Shape::other("rect"), Shape::path(vec![])]).is_empty());
    }

    #[test]
    fn test_surface_from_canvas_document() {
        let json = r#"{
            "version": "4.4.0",
            "objects": [
                { "type": "rect", "left": 10, "top": 10, "width": 5, "height": 5 },
                { "type": "path", "stroke": "red", "path": [["M", 0, 0], ["L", 3, 4]] }
            ]
        }"#;

        let surface = DrawingSurface::from_json(json).unwrap();
        assert_eq!(surface.len(), 2);
        assert_eq!(
            surface.active_path(),
            vec![PixelPoint::new(0.0, 0.0), PixelPoint::new(3.0, 4.0)]
        );
    }

    #[test]
    fn test_surface_from_shape_list() {
        let json = r#"[{ "type": "path", "path": [["M", 1.5, 2.5]] }]"#;
        let mut surface = DrawingSurface::from_json(json).unwrap();
        assert_eq!(surface.active_path(), vec![PixelPoint::new(1.5, 2.5)]);

        surface.clear();
        assert!(surface.is_empty());
        assert!(surface.active_path().is_empty());
    }

    #[test]
    fn test_surface_from_shapes_keeps_order() {
        let first = Shape::polyline(&[PixelPoint::new(0.0, 0.0), PixelPoint::new(1.0, 0.0)]);
        let last = Shape::polyline(&[PixelPoint::new(7.0, 7.0), PixelPoint::new(8.0, 9.0)]);

        let surface = DrawingSurface::from_shapes(vec![first, Shape::other("text"), last.clone()]);
        assert_eq!(surface.len(), 3);
        assert_eq!(surface.active_path(), last.points());
    }
}
