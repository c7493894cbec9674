//! Renderer trait and the CPU raster backend.

use crate::fill::{FillTolerance, would_fill};
use crate::paint::{PaintOptions, paint_element, paint_stroke, restore_region, stroke_damage};
use kurbo::Point;
use sketchwire_core::{CanvasState, Rgb};
use thiserror::Error;
use tiny_skia::{Color, IntRect, Pixmap};

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Png(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Rendering options.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    /// Color the buffer is cleared to before replay.
    pub background: Rgb,
    pub fill_tolerance: FillTolerance,
    pub anti_alias: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: Rgb::WHITE,
            fill_tolerance: FillTolerance::default(),
            anti_alias: true,
        }
    }
}

impl RenderConfig {
    pub fn with_background(mut self, color: Rgb) -> Self {
        self.background = color;
        self
    }

    pub fn with_fill_tolerance(mut self, tolerance: FillTolerance) -> Self {
        self.fill_tolerance = tolerance;
        self
    }

    pub fn with_anti_alias(mut self, anti_alias: bool) -> Self {
        self.anti_alias = anti_alias;
        self
    }

    fn paint_options(&self) -> PaintOptions {
        PaintOptions {
            anti_alias: self.anti_alias,
            fill_tolerance: self.fill_tolerance,
        }
    }
}

/// How a render call brought the surface up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Cleared and replayed every element.
    Full,
    /// Painted only what was added since the last render.
    Incremental,
    /// Nothing changed.
    Unchanged,
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Bring the surface in line with `state`, choosing full or
    /// incremental painting.
    fn render(&mut self, state: &CanvasState) -> RenderMode;

    /// Clear and replay every element.
    fn render_full(&mut self, state: &CanvasState);

    /// Reallocate the surface; the next render is a full replay.
    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()>;

    /// The pixels currently shown.
    fn surface(&self) -> &Pixmap;
}

/// What the surface reflects after the last render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderCursor {
    generation: u64,
    elements: usize,
    /// Elements that can no longer change.
    frozen: usize,
    /// Point count of the trailing open stroke.
    tail_points: usize,
}

impl RenderCursor {
    fn of(state: &CanvasState) -> Self {
        let tail = state.open_stroke();
        Self {
            generation: state.generation(),
            elements: state.len(),
            frozen: state.len() - usize::from(tail.is_some()),
            tail_points: tail.map_or(0, |stroke| stroke.points.len()),
        }
    }
}

/// Raster renderer backed by two tiny-skia pixmaps.
///
/// `committed` holds every frozen element; `surface` is `committed` plus the
/// open trailing stroke. Growing the open stroke only restores its old
/// footprint from `committed` and redraws it, so incremental output is pixel
/// identical to a full replay.
pub struct RasterRenderer {
    config: RenderConfig,
    committed: Pixmap,
    surface: Pixmap,
    /// Elements painted into `committed`.
    committed_len: usize,
    /// Area of `surface` covered by the open stroke.
    tail_damage: Option<IntRect>,
    cursor: Option<RenderCursor>,
}

impl RasterRenderer {
    pub fn new(width: u32, height: u32, config: RenderConfig) -> RenderResult<Self> {
        let committed = Self::allocate(width, height)?;
        let surface = committed.clone();
        let mut renderer = Self {
            config,
            committed,
            surface,
            committed_len: 0,
            tail_damage: None,
            cursor: None,
        };
        renderer.clear_committed();
        renderer.surface.data_mut().copy_from_slice(renderer.committed.data());
        Ok(renderer)
    }

    fn allocate(width: u32, height: u32) -> RenderResult<Pixmap> {
        Pixmap::new(width, height).ok_or(RendererError::InvalidSize { width, height })
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    /// Straight RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.surface.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    /// Whether a bucket fill at `seed` would change the shown pixels.
    pub fn fill_would_change(&self, seed: Point, color: Rgb) -> bool {
        would_fill(&self.surface, seed, color, self.config.fill_tolerance)
    }

    fn clear_committed(&mut self) {
        let bg = self.config.background;
        self.committed
            .fill(Color::from_rgba8(bg.r, bg.g, bg.b, 255));
        self.committed_len = 0;
    }

    fn sync_surface(&mut self) {
        self.surface.data_mut().copy_from_slice(self.committed.data());
        self.tail_damage = None;
    }

    fn draw_tail(&mut self, state: &CanvasState) {
        if let Some(stroke) = state.open_stroke() {
            paint_stroke(&mut self.surface, stroke, self.config.anti_alias);
            self.tail_damage = stroke_damage(stroke, self.surface.width(), self.surface.height());
        }
    }

    fn render_incremental(&mut self, state: &CanvasState, next: RenderCursor) {
        if next.frozen > self.committed_len {
            let options = self.config.paint_options();
            for element in &state.elements[self.committed_len..next.frozen] {
                paint_element(&mut self.committed, element, &options);
            }
            self.committed_len = next.frozen;
            self.sync_surface();
        } else if let Some(rect) = self.tail_damage.take() {
            restore_region(&mut self.surface, &self.committed, rect);
        }
        self.draw_tail(state);
    }

    fn choose_mode(&self, next: RenderCursor) -> RenderMode {
        let Some(prev) = self.cursor else {
            return RenderMode::Full;
        };
        if prev == next {
            RenderMode::Unchanged
        } else if prev.generation != next.generation
            || next.elements < prev.elements
            || next.frozen < prev.frozen
        {
            RenderMode::Full
        } else {
            RenderMode::Incremental
        }
    }
}

impl Renderer for RasterRenderer {
    fn render(&mut self, state: &CanvasState) -> RenderMode {
        let next = RenderCursor::of(state);
        let mode = self.choose_mode(next);
        match mode {
            RenderMode::Full => self.render_full(state),
            RenderMode::Incremental => {
                self.render_incremental(state, next);
                self.cursor = Some(next);
            }
            RenderMode::Unchanged => {}
        }
        log::trace!("render {:?}: {} elements", mode, next.elements);
        mode
    }

    fn render_full(&mut self, state: &CanvasState) {
        let next = RenderCursor::of(state);
        self.clear_committed();
        let options = self.config.paint_options();
        for element in &state.elements[..next.frozen] {
            paint_element(&mut self.committed, element, &options);
        }
        self.committed_len = next.frozen;
        self.sync_surface();
        self.draw_tail(state);
        self.cursor = Some(next);
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == self.surface.width() && height == self.surface.height() {
            return Ok(());
        }
        self.committed = Self::allocate(width, height)?;
        self.surface = self.committed.clone();
        self.clear_committed();
        self.sync_surface();
        self.cursor = None;
        log::debug!("render surface resized to {width}x{height}");
        Ok(())
    }

    fn surface(&self) -> &Pixmap {
        &self.surface
    }
}
