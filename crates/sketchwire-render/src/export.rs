//! PNG export of a rendered surface.

use crate::fill::straight_rgba;
use crate::renderer::{RenderResult, RendererError};
use tiny_skia::Pixmap;

/// Unpremultiplied RGBA8 bytes of `pixmap`, row-major.
pub fn straight_rgba8(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| straight_rgba(*pixel))
        .collect()
}

/// Encode `pixmap` as an 8-bit RGBA PNG.
pub fn encode_png(pixmap: &Pixmap) -> RenderResult<Vec<u8>> {
    let rgba = straight_rgba8(pixmap);
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| RendererError::Png(e.to_string()))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| RendererError::Png(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| RendererError::Png(e.to_string()))?;
    }
    log::debug!(
        "encoded {}x{} PNG ({} bytes)",
        pixmap.width(),
        pixmap.height(),
        png_data.len()
    );
    Ok(png_data)
}
