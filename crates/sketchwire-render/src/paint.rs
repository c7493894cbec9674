//! Rasterization of canvas elements onto a tiny-skia pixmap.

use crate::fill::{FillTolerance, flood_fill};
use kurbo::{BezPath, PathEl};
use sketchwire_core::{Element, Rgb, Stroke};
use tiny_skia::{
    FillRule, IntRect, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Transform,
};

/// Extra pixels around a stroke's nominal extent touched by anti-aliasing.
const AA_MARGIN: f64 = 2.0;

/// Per-paint options shared by every element.
#[derive(Debug, Clone, Copy)]
pub struct PaintOptions {
    pub anti_alias: bool,
    pub fill_tolerance: FillTolerance,
}

impl Default for PaintOptions {
    fn default() -> Self {
        Self {
            anti_alias: true,
            fill_tolerance: FillTolerance::default(),
        }
    }
}

fn solid(color: Rgb, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = anti_alias;
    paint
}

/// Convert a kurbo path into a tiny-skia path.
///
/// Returns `None` for paths tiny-skia considers degenerate (empty, a lone
/// `move_to`, or non-finite bounds).
pub fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => {
                builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32)
            }
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn paint_dot(pixmap: &mut Pixmap, stroke: &Stroke, anti_alias: bool) {
    let Some(center) = stroke.points.first() else {
        return;
    };
    let radius = (stroke.width / 2.0) as f32;
    let Some(circle) = PathBuilder::from_circle(center.x as f32, center.y as f32, radius) else {
        log::debug!("stroke {} too thin to draw as a dot", stroke.id);
        return;
    };
    pixmap.fill_path(
        &circle,
        &solid(stroke.color, anti_alias),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
}

/// Draw a stroke with round caps and joins.
///
/// Strokes whose points all coincide are drawn as a dot of diameter `width`.
pub fn paint_stroke(pixmap: &mut Pixmap, stroke: &Stroke, anti_alias: bool) {
    let bounds = stroke.bounds();
    if stroke.is_dot() || (bounds.width() == 0.0 && bounds.height() == 0.0) {
        paint_dot(pixmap, stroke, anti_alias);
        return;
    }
    let Some(path) = to_skia_path(&stroke.to_path()) else {
        paint_dot(pixmap, stroke, anti_alias);
        return;
    };
    let style = tiny_skia::Stroke {
        width: stroke.width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    };
    pixmap.stroke_path(
        &path,
        &solid(stroke.color, anti_alias),
        &style,
        Transform::identity(),
        None,
    );
}

/// Paint one element in history order. Fills run against whatever the
/// pixmap already holds.
pub fn paint_element(pixmap: &mut Pixmap, element: &Element, options: &PaintOptions) {
    match element {
        Element::Stroke(stroke) => paint_stroke(pixmap, stroke, options.anti_alias),
        Element::Fill(fill) => {
            if flood_fill(pixmap, fill.seed, fill.color, options.fill_tolerance).is_none() {
                log::trace!("fill {} changed nothing", fill.id);
            }
        }
    }
}

/// Pixel rectangle a stroke can touch, clipped to a `width` x `height` buffer.
pub fn stroke_damage(stroke: &Stroke, width: u32, height: u32) -> Option<IntRect> {
    let pad = stroke.width / 2.0 + AA_MARGIN;
    let area = stroke.bounds().inflate(pad, pad);
    let left = area.x0.floor().max(0.0);
    let top = area.y0.floor().max(0.0);
    let right = area.x1.ceil().min(f64::from(width));
    let bottom = area.y1.ceil().min(f64::from(height));
    if !(left < right && top < bottom) {
        return None;
    }
    IntRect::from_ltrb(left as i32, top as i32, right as i32, bottom as i32)
}

/// Copy `rect` from `source` into `target`. Both pixmaps must share a size.
pub fn restore_region(target: &mut Pixmap, source: &Pixmap, rect: IntRect) {
    if target.width() != source.width() || target.height() != source.height() {
        log::warn!("restore_region on mismatched pixmaps, skipping");
        return;
    }
    let stride = target.width() as usize * 4;
    let x0 = rect.left().max(0) as usize * 4;
    let x1 = (rect.right().max(0) as usize * 4).min(stride);
    let y0 = rect.top().max(0) as usize;
    let y1 = (rect.bottom().max(0) as usize).min(target.height() as usize);
    if x0 >= x1 {
        return;
    }
    let src = source.data();
    let dst = target.data_mut();
    for row in y0..y1 {
        let start = row * stride;
        dst[start + x0..start + x1].copy_from_slice(&src[start + x0..start + x1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::straight_rgba;
    use kurbo::Point;
    use sketchwire_core::ElementId;
    use tiny_skia::Color;

    fn blank(w: u32, h: u32) -> Pixmap {
        let mut pixmap = Pixmap::new(w, h).unwrap();
        pixmap.fill(Color::WHITE);
        pixmap
    }

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        straight_rgba(pixmap.pixels()[(y * pixmap.width() + x) as usize])
    }

    fn stroke(points: &[(f64, f64)], width: f64) -> Stroke {
        let mut s = Stroke::new(
            ElementId(1),
            Rgb::BLACK,
            width,
            Point::new(points[0].0, points[0].1),
        );
        s.points
            .extend(points[1..].iter().map(|(x, y)| Point::new(*x, *y)));
        s
    }

    #[test]
    fn test_dot_is_drawn_around_point() {
        let mut pixmap = blank(20, 20);
        paint_stroke(&mut pixmap, &stroke(&[(10.0, 10.0)], 6.0), true);
        assert_eq!(pixel(&pixmap, 10, 10), [0, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 1, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn test_coincident_points_draw_a_dot() {
        let mut pixmap = blank(20, 20);
        paint_stroke(&mut pixmap, &stroke(&[(5.0, 5.0), (5.0, 5.0)], 4.0), true);
        assert_eq!(pixel(&pixmap, 5, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn test_line_covers_its_path() {
        let mut pixmap = blank(30, 10);
        paint_stroke(&mut pixmap, &stroke(&[(2.0, 5.0), (28.0, 5.0)], 4.0), false);
        for x in 3..27 {
            assert_eq!(pixel(&pixmap, x, 5), [0, 0, 0, 255], "x = {x}");
        }
        assert_eq!(pixel(&pixmap, 15, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_damage_covers_painted_pixels() {
        let s = stroke(&[(4.0, 4.0), (12.0, 9.0), (16.0, 3.0)], 3.0);
        let mut pixmap = blank(24, 16);
        paint_stroke(&mut pixmap, &s, true);
        let rect = stroke_damage(&s, 24, 16).unwrap();
        for y in 0..16 {
            for x in 0..24 {
                let inside = (x as i32) >= rect.left()
                    && (x as i32) < rect.right()
                    && (y as i32) >= rect.top()
                    && (y as i32) < rect.bottom();
                if !inside {
                    assert_eq!(pixel(&pixmap, x, y), [255, 255, 255, 255]);
                }
            }
        }
    }

    #[test]
    fn test_damage_is_clipped() {
        let s = stroke(&[(-50.0, -50.0), (-40.0, -45.0)], 2.0);
        assert!(stroke_damage(&s, 10, 10).is_none());
        let s = stroke(&[(0.0, 0.0), (9.0, 9.0)], 2.0);
        let rect = stroke_damage(&s, 10, 10).unwrap();
        assert_eq!((rect.left(), rect.top(), rect.right(), rect.bottom()), (0, 0, 10, 10));
    }

    #[test]
    fn test_restore_region_copies_only_rect() {
        let source = blank(8, 8);
        let mut target = Pixmap::new(8, 8).unwrap();
        target.fill(Color::BLACK);
        restore_region(&mut target, &source, IntRect::from_ltrb(2, 2, 5, 4).unwrap());
        assert_eq!(pixel(&target, 2, 2), [255, 255, 255, 255]);
        assert_eq!(pixel(&target, 4, 3), [255, 255, 255, 255]);
        assert_eq!(pixel(&target, 5, 3), [0, 0, 0, 255]);
        assert_eq!(pixel(&target, 2, 4), [0, 0, 0, 255]);
    }

    #[test]
    fn test_fill_element_uses_tolerance() {
        let mut pixmap = blank(4, 4);
        let fill = Element::Fill(sketchwire_core::Fill {
            id: ElementId(1),
            color: Rgb::new(250, 250, 250),
            seed: Point::new(1.0, 1.0),
        });
        paint_element(&mut pixmap, &fill, &PaintOptions::default());
        assert_eq!(pixel(&pixmap, 1, 1), [255, 255, 255, 255]);

        let options = PaintOptions {
            fill_tolerance: FillTolerance::EXACT,
            ..PaintOptions::default()
        };
        paint_element(&mut pixmap, &fill, &options);
        assert_eq!(pixel(&pixmap, 1, 1), [250, 250, 250, 255]);
    }
}
