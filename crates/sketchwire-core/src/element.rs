//! Drawing elements: freehand strokes and flood fills.

use crate::color::Rgb;
use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an element, assigned in append order by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A freehand stroke in buffer space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: ElementId,
    pub color: Rgb,
    /// Line width in buffer pixels.
    pub width: f64,
    #[serde(with = "crate::wire_point::vec")]
    pub points: Vec<Point>,
    /// Incomplete strokes may still receive points.
    #[serde(default)]
    pub complete: bool,
}

impl Stroke {
    /// Start a stroke at `point`. Strokes are never empty.
    pub fn new(id: ElementId, color: Rgb, width: f64, point: Point) -> Self {
        Self {
            id,
            color,
            width,
            points: vec![point],
            complete: false,
        }
    }

    /// A single-point stroke renders as a dot of diameter `width`.
    pub fn is_dot(&self) -> bool {
        self.points.len() == 1
    }

    /// Bounding box of the points, not including the line width.
    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        self.points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |rect, p| rect.union_pt(*p))
    }

    /// Smoothed outline of the stroke centerline.
    ///
    /// Moves to the first point, then for every interior point curves to the
    /// midpoint between it and its successor using the point itself as the
    /// quadratic control, and finishes with a straight segment to the last
    /// point. A single point yields a bare `move_to`.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let Some(first) = self.points.first() else {
            return path;
        };
        path.move_to(*first);

        let n = self.points.len();
        if n == 1 {
            return path;
        }
        for i in 1..n - 1 {
            let control = self.points[i];
            let next = self.points[i + 1];
            path.quad_to(control, control.midpoint(next));
        }
        path.line_to(self.points[n - 1]);
        path
    }
}

/// A bucket fill seeded at a buffer-space point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: ElementId,
    pub color: Rgb,
    #[serde(with = "crate::wire_point")]
    pub seed: Point,
}

/// One entry of the canvas history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Stroke(Stroke),
    Fill(Fill),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Stroke(stroke) => stroke.id,
            Element::Fill(fill) => fill.id,
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            Element::Stroke(stroke) => stroke.color,
            Element::Fill(fill) => fill.color,
        }
    }

    pub fn as_stroke(&self) -> Option<&Stroke> {
        match self {
            Element::Stroke(stroke) => Some(stroke),
            Element::Fill(_) => None,
        }
    }

    /// True for a stroke that can still grow.
    pub fn is_open_stroke(&self) -> bool {
        matches!(self, Element::Stroke(stroke) if !stroke.complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::PathEl;

    fn stroke(points: &[(f64, f64)]) -> Stroke {
        let mut s = Stroke::new(ElementId(1), Rgb::BLACK, 4.0, Point::new(points[0].0, points[0].1));
        s.points.extend(points[1..].iter().map(|&(x, y)| Point::new(x, y)));
        s
    }

    #[test]
    fn test_single_point_path() {
        let s = stroke(&[(3.0, 4.0)]);
        assert!(s.is_dot());
        let els: Vec<_> = s.to_path().elements().to_vec();
        assert_eq!(els, vec![PathEl::MoveTo(Point::new(3.0, 4.0))]);
    }

    #[test]
    fn test_two_point_path_is_straight() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0)]);
        let els: Vec<_> = s.to_path().elements().to_vec();
        assert_eq!(
            els,
            vec![
                PathEl::MoveTo(Point::new(0.0, 0.0)),
                PathEl::LineTo(Point::new(10.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_interior_points_become_midpoint_quads() {
        let s = stroke(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (20.0, 10.0)]);
        let els: Vec<_> = s.to_path().elements().to_vec();
        assert_eq!(
            els,
            vec![
                PathEl::MoveTo(Point::new(0.0, 0.0)),
                PathEl::QuadTo(Point::new(10.0, 0.0), Point::new(10.0, 5.0)),
                PathEl::QuadTo(Point::new(10.0, 10.0), Point::new(15.0, 10.0)),
                PathEl::LineTo(Point::new(20.0, 10.0)),
            ]
        );
    }

    #[test]
    fn test_bounds() {
        let s = stroke(&[(5.0, 1.0), (-2.0, 8.0), (3.0, 3.0)]);
        let b = s.bounds();
        assert_eq!(b, Rect::new(-2.0, 1.0, 5.0, 8.0));
    }

    #[test]
    fn test_element_json_shape() {
        let el = Element::Fill(Fill {
            id: ElementId(7),
            color: Rgb::new(255, 0, 0),
            seed: Point::new(1.0, 2.0),
        });
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "fill", "id": 7, "color": "#ff0000", "seed": [1.0, 2.0]})
        );
        let back: Element = serde_json::from_value(json).unwrap();
        assert_eq!(back, el);
    }

    #[test]
    fn test_stroke_complete_defaults_false() {
        let json = serde_json::json!({
            "kind": "stroke", "id": 1, "color": "#000", "width": 2.0, "points": [[0, 0]]
        });
        let el: Element = serde_json::from_value(json).unwrap();
        assert!(el.is_open_stroke());
    }
}
