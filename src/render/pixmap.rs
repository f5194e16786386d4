use crate::error::{KioskError, Result};
use image::imageops::FilterType;
use image::RgbaImage;
use tiny_skia::Pixmap;

/// Scale factor that fits `width`x`height` inside the bounds without
/// enlarging it.
#[must_use]
pub fn fit_scale(width: u32, height: u32, max_width: u32, max_height: u32) -> f32 {
    let sx = max_width as f32 / width.max(1) as f32;
    let sy = max_height as f32 / height.max(1) as f32;
    sx.min(sy).min(1.0)
}

/// Shrink `img` to fit the bounds (aspect preserved), then convert it to a
/// premultiplied Pixmap.
///
/// # Errors
/// Returns `KioskError::Render` if the pixmap cannot be created.
pub fn fit_to_pixmap(img: &RgbaImage, max_width: u32, max_height: u32) -> Result<Pixmap> {
    let (width, height) = img.dimensions();
    let scale = fit_scale(width, height, max_width, max_height);
    if scale >= 1.0 {
        return pixmap_from_rgba(img);
    }

    let new_w = ((width as f32 * scale) as u32).max(1);
    let new_h = ((height as f32 * scale) as u32).max(1);
    let resized = image::imageops::resize(img, new_w, new_h, FilterType::Lanczos3);
    pixmap_from_rgba(&resized)
}

/// Convert straight-alpha RGBA into a tiny-skia Pixmap.
///
/// # Errors
/// Returns `KioskError::Render` if the image has a zero dimension.
pub fn pixmap_from_rgba(img: &RgbaImage) -> Result<Pixmap> {
    let (width, height) = img.dimensions();
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| KioskError::Render(format!("failed to create {width}x{height} frame")))?;

    // tiny-skia uses premultiplied alpha, so we need to premultiply.
    for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(img.as_raw().chunks_exact(4)) {
        let a = u16::from(src[3]);
        dst[0] = (u16::from(src[0]) * a / 255) as u8;
        dst[1] = (u16::from(src[1]) * a / 255) as u8;
        dst[2] = (u16::from(src[2]) * a / 255) as u8;
        dst[3] = src[3];
    }

    Ok(pixmap)
}
