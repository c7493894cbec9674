//! Mapping between pointer (client) coordinates and canvas buffer space.

use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Buffer pixels per displayed (CSS) pixel.
pub const BUFFER_SCALE: f64 = 2.0;

/// Converts pointer positions into buffer coordinates.
///
/// The buffer is allocated at a fixed multiple of the displayed size, so
/// strokes stay crisp on dense displays and every stored coordinate and
/// width is resolution independent for the lifetime of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateMapper {
    /// Top-left corner of the canvas element in client coordinates.
    pub origin: Point,
    /// Size of the canvas element as displayed.
    pub display_size: Size,
    /// Size of the backing raster buffer in pixels.
    pub buffer_size: Size,
}

impl CoordinateMapper {
    /// Mapper for an element displayed at `origin` with `display_size`,
    /// backed by a buffer at [`BUFFER_SCALE`].
    pub fn new(origin: Point, display_size: Size) -> Self {
        Self::with_scale(origin, display_size, BUFFER_SCALE)
    }

    pub fn with_scale(origin: Point, display_size: Size, scale: f64) -> Self {
        let buffer_size = Size::new(
            (display_size.width * scale).round().max(1.0),
            (display_size.height * scale).round().max(1.0),
        );
        Self {
            origin,
            display_size,
            buffer_size,
        }
    }

    /// Buffer dimensions as whole pixels.
    pub fn buffer_pixels(&self) -> (u32, u32) {
        (self.buffer_size.width as u32, self.buffer_size.height as u32)
    }

    /// Per-axis buffer pixels per client pixel.
    pub fn scale(&self) -> Vec2 {
        let axis = |buffer: f64, display: f64| if display > 0.0 { buffer / display } else { 1.0 };
        Vec2::new(
            axis(self.buffer_size.width, self.display_size.width),
            axis(self.buffer_size.height, self.display_size.height),
        )
    }

    /// Transform from client to buffer coordinates.
    pub fn transform(&self) -> Affine {
        let scale = self.scale();
        Affine::scale_non_uniform(scale.x, scale.y) * Affine::translate(-self.origin.to_vec2())
    }

    /// `(client - origin) * (buffer / displayed)`.
    pub fn to_buffer(&self, client: Point) -> Point {
        self.transform() * client
    }

    /// Inverse of [`to_buffer`](Self::to_buffer).
    pub fn to_client(&self, buffer: Point) -> Point {
        self.transform().inverse() * buffer
    }

    /// Convert a display-space length (e.g. a brush width) into buffer pixels.
    pub fn length_to_buffer(&self, length: f64) -> f64 {
        length * self.scale().x
    }

    /// Whether a buffer-space point falls on the raster.
    pub fn contains(&self, buffer: Point) -> bool {
        buffer.x >= 0.0
            && buffer.y >= 0.0
            && buffer.x < self.buffer_size.width
            && buffer.y < self.buffer_size.height
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::new(Point::ORIGIN, Size::new(400.0, 300.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_double_display() {
        let mapper = CoordinateMapper::new(Point::ORIGIN, Size::new(400.0, 225.0));
        assert_eq!(mapper.buffer_pixels(), (800, 450));
        assert_eq!(mapper.scale(), Vec2::new(2.0, 2.0));
    }

    #[test]
    fn test_to_buffer_subtracts_origin_then_scales() {
        let mapper = CoordinateMapper::new(Point::new(30.0, 50.0), Size::new(100.0, 100.0));
        let p = mapper.to_buffer(Point::new(80.0, 60.0));
        assert!((p.x - 100.0).abs() < 1e-10);
        assert!((p.y - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_stretched_display_uses_per_axis_scale() {
        // Buffer kept at 200x100 while the element is displayed at 50x50.
        let mapper = CoordinateMapper {
            origin: Point::ORIGIN,
            display_size: Size::new(50.0, 50.0),
            buffer_size: Size::new(200.0, 100.0),
        };
        let p = mapper.to_buffer(Point::new(10.0, 10.0));
        assert!((p.x - 40.0).abs() < 1e-10);
        assert!((p.y - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mapper = CoordinateMapper::new(Point::new(12.5, -3.0), Size::new(320.0, 240.0));
        let original = Point::new(123.0, 45.0);
        let back = mapper.to_client(mapper.to_buffer(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_contains_and_lengths() {
        let mapper = CoordinateMapper::new(Point::ORIGIN, Size::new(10.0, 10.0));
        assert!(mapper.contains(Point::new(0.0, 0.0)));
        assert!(mapper.contains(Point::new(19.9, 19.9)));
        assert!(!mapper.contains(Point::new(20.0, 5.0)));
        assert!(!mapper.contains(Point::new(-0.1, 5.0)));
        assert_eq!(mapper.length_to_buffer(3.0), 6.0);
    }

    #[test]
    fn test_zero_display_size_does_not_divide_by_zero() {
        let mapper = CoordinateMapper::new(Point::ORIGIN, Size::ZERO);
        assert_eq!(mapper.buffer_pixels(), (1, 1));
        assert!(mapper.to_buffer(Point::new(5.0, 5.0)).x.is_finite());
    }
}
