//! Scanline flood fill for the bucket tool.
//!
//! Works on contiguous horizontal spans with an explicit stack, so stack
//! depth stays bounded no matter how large the filled region is.

use kurbo::Point;
use sketchwire_core::Rgb;
use tiny_skia::{ColorU8, Pixmap, PremultipliedColorU8};

/// Per-channel match window for flood fill.
///
/// The alpha window is tighter than the color window so anti-aliased stroke
/// edges are absorbed without leaking across clearly different regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTolerance {
    pub rgb: u8,
    pub alpha: u8,
}

impl FillTolerance {
    pub const DEFAULT_RGB: u8 = 100;
    pub const DEFAULT_ALPHA: u8 = 64;

    /// Exact match only.
    pub const EXACT: FillTolerance = FillTolerance { rgb: 0, alpha: 0 };

    pub fn matches(&self, a: [u8; 4], b: [u8; 4]) -> bool {
        let within = |x: u8, y: u8, limit: u8| x.abs_diff(y) <= limit;
        within(a[0], b[0], self.rgb)
            && within(a[1], b[1], self.rgb)
            && within(a[2], b[2], self.rgb)
            && within(a[3], b[3], self.alpha)
    }
}

impl Default for FillTolerance {
    fn default() -> Self {
        Self {
            rgb: Self::DEFAULT_RGB,
            alpha: Self::DEFAULT_ALPHA,
        }
    }
}

/// Summary of a fill that changed the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillReport {
    /// Number of repainted pixels.
    pub pixels: usize,
    /// Inclusive pixel bounds `(min_x, min_y, max_x, max_y)`.
    pub bounds: (u32, u32, u32, u32),
}

/// Pixel under a buffer-space point, if it lies on the pixmap.
pub fn seed_pixel(seed: Point, width: u32, height: u32) -> Option<(u32, u32)> {
    if !seed.x.is_finite() || !seed.y.is_finite() {
        return None;
    }
    let (x, y) = (seed.x.floor(), seed.y.floor());
    if x < 0.0 || y < 0.0 || x >= f64::from(width) || y >= f64::from(height) {
        return None;
    }
    Some((x as u32, y as u32))
}

/// Straight (unpremultiplied) RGBA of a stored pixel.
pub fn straight_rgba(pixel: PremultipliedColorU8) -> [u8; 4] {
    let c = pixel.demultiply();
    [c.red(), c.green(), c.blue(), c.alpha()]
}

fn premultiplied(color: Rgb) -> PremultipliedColorU8 {
    ColorU8::from_rgba(color.r, color.g, color.b, 255).premultiply()
}

/// Whether filling at `seed` would repaint anything.
pub fn would_fill(pixmap: &Pixmap, seed: Point, color: Rgb, tolerance: FillTolerance) -> bool {
    let Some((x, y)) = seed_pixel(seed, pixmap.width(), pixmap.height()) else {
        return false;
    };
    let index = y as usize * pixmap.width() as usize + x as usize;
    let target = straight_rgba(pixmap.pixels()[index]);
    !tolerance.matches(target, color.to_rgba8())
}

/// A horizontal run `[left, right]` on row `y`; `dy` is the direction the
/// span was discovered in.
#[derive(Debug, Clone, Copy)]
struct Span {
    left: i64,
    right: i64,
    y: i64,
    dy: i64,
}

struct Region<'a> {
    pixels: &'a mut [PremultipliedColorU8],
    width: i64,
    height: i64,
    target: [u8; 4],
    tolerance: FillTolerance,
    paint: PremultipliedColorU8,
    filled: usize,
    bounds: (i64, i64, i64, i64),
}

impl Region<'_> {
    /// In bounds and matching the target. Out-of-bounds reads act as a
    /// non-matching sentinel.
    fn inside(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        let pixel = self.pixels[(y * self.width + x) as usize];
        self.tolerance.matches(straight_rgba(pixel), self.target)
    }

    fn set(&mut self, x: i64, y: i64) {
        self.pixels[(y * self.width + x) as usize] = self.paint;
        self.filled += 1;
        let (min_x, min_y, max_x, max_y) = &mut self.bounds;
        *min_x = (*min_x).min(x);
        *min_y = (*min_y).min(y);
        *max_x = (*max_x).max(x);
        *max_y = (*max_y).max(y);
    }
}

/// Repaint the region connected to `seed` whose pixels match the seed color.
///
/// Returns `None` without touching the pixmap when the seed is off the
/// buffer or its color already matches `color` within `tolerance`.
pub fn flood_fill(
    pixmap: &mut Pixmap,
    seed: Point,
    color: Rgb,
    tolerance: FillTolerance,
) -> Option<FillReport> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let (sx, sy) = seed_pixel(seed, width, height)?;
    let target = straight_rgba(pixmap.pixels()[sy as usize * width as usize + sx as usize]);
    if tolerance.matches(target, color.to_rgba8()) {
        return None;
    }

    let (x, y) = (i64::from(sx), i64::from(sy));
    let mut region = Region {
        pixels: pixmap.pixels_mut(),
        width: i64::from(width),
        height: i64::from(height),
        target,
        tolerance,
        paint: premultiplied(color),
        filled: 0,
        bounds: (x, y, x, y),
    };

    let mut stack = vec![
        Span { left: x, right: x, y, dy: 1 },
        Span { left: x, right: x, y: y - 1, dy: -1 },
    ];

    while let Some(Span { left, right, y, dy }) = stack.pop() {
        let mut x1 = left;
        let mut x = left;

        // Extend the run to the left of the span.
        if region.inside(x, y) {
            while region.inside(x - 1, y) {
                region.set(x - 1, y);
                x -= 1;
            }
            if x < x1 {
                stack.push(Span { left: x, right: x1 - 1, y: y - dy, dy: -dy });
            }
        }

        while x1 <= right {
            while region.inside(x1, y) {
                region.set(x1, y);
                x1 += 1;
            }
            if x1 > x {
                stack.push(Span { left: x, right: x1 - 1, y: y + dy, dy });
            }
            // The run overhangs the parent span: look back the other way.
            if x1 - 1 > right {
                stack.push(Span { left: right + 1, right: x1 - 1, y: y - dy, dy: -dy });
            }
            x1 += 1;
            while x1 < right && !region.inside(x1, y) {
                x1 += 1;
            }
            x = x1;
        }
    }

    if region.filled == 0 {
        return None;
    }
    let (min_x, min_y, max_x, max_y) = region.bounds;
    Some(FillReport {
        pixels: region.filled,
        bounds: (min_x as u32, min_y as u32, max_x as u32, max_y as u32),
    })
}
