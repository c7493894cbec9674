//! sketchwire render library
//!
//! CPU rasterization of a [`CanvasState`](sketchwire_core::CanvasState):
//! stroke painting, scanline flood fill, full and incremental replay, and
//! PNG export.

pub mod export;
pub mod fill;
pub mod paint;
mod renderer;

pub use export::{encode_png, straight_rgba8};
pub use fill::{FillReport, FillTolerance, flood_fill, would_fill};
pub use renderer::{
    RasterRenderer, RenderConfig, RenderMode, RenderResult, Renderer, RendererError,
};
