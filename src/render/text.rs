use crate::error::{KioskError, Result};
use ab_glyph::{Font, FontVec, PxScale, PxScaleFont, ScaleFont};
use std::path::Path;
use tiny_skia::{Color, Pixmap};

/// Load a TTF/OTF font from disk.
///
/// # Errors
/// Returns `KioskError::Io` if the file can't be read, or `KioskError::Font`
/// if it isn't a usable font.
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)?;
    FontVec::try_from_vec(bytes).map_err(|e| KioskError::Font(format!("{}: {e}", path.display())))
}

/// Rasterize text centered on the canvas. `'\n'` starts a new line.
pub fn render_text<F: Font>(
    canvas: &mut Pixmap,
    font: &F,
    text: &str,
    color: Color,
    font_size: f32,
) {
    let r = (color.red() * 255.0) as u8;
    let g = (color.green() * 255.0) as u8;
    let b = (color.blue() * 255.0) as u8;

    let scale = PxScale::from(font_size);
    let scaled_font = font.as_scaled(scale);

    let canvas_w = canvas.width() as i32;
    let canvas_h = canvas.height() as i32;

    let lines: Vec<&str> = text.split('\n').collect();
    let line_height = scaled_font.height();
    let total_height = line_height * lines.len() as f32;
    let start_y = ((canvas_h as f32 - total_height) / 2.0).max(2.0);

    let data = canvas.data_mut();

    for (line_idx, line) in lines.iter().enumerate() {
        let line_width = measure_line(&scaled_font, line);
        let x_offset = ((canvas_w as f32 - line_width) / 2.0).max(1.0);
        let y_baseline = start_y + line_height * (line_idx as f32 + 0.8);

        let mut cursor_x = x_offset;
        let mut prev_glyph_id = None;

        for ch in line.chars() {
            let glyph_id = scaled_font.glyph_id(ch);

            if let Some(prev) = prev_glyph_id {
                cursor_x += scaled_font.kern(prev, glyph_id);
            }

            if let Some(outlined) = scaled_font.outline_glyph(glyph_id.with_scale_and_position(
                scale,
                ab_glyph::point(cursor_x, y_baseline),
            )) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, coverage| {
                    let x = px as i32 + bounds.min.x as i32;
                    let y = py as i32 + bounds.min.y as i32;
                    if x >= 0 && x < canvas_w && y >= 0 && y < canvas_h {
                        let idx = (y * canvas_w + x) as usize * 4;
                        let alpha = u16::from((coverage * 255.0) as u8);
                        let inv = 255 - alpha;
                        data[idx] =
                            ((u16::from(r) * alpha + u16::from(data[idx]) * inv) / 255) as u8;
                        data[idx + 1] =
                            ((u16::from(g) * alpha + u16::from(data[idx + 1]) * inv) / 255) as u8;
                        data[idx + 2] =
                            ((u16::from(b) * alpha + u16::from(data[idx + 2]) * inv) / 255) as u8;
                        data[idx + 3] = 255;
                    }
                });
            }

            cursor_x += scaled_font.h_advance(glyph_id);
            prev_glyph_id = Some(glyph_id);
        }
    }
}

fn measure_line<F: Font>(font: &PxScaleFont<&F>, text: &str) -> f32 {
    let mut width = 0.0f32;
    let mut prev = None;
    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev_id) = prev {
            width += font.kern(prev_id, glyph_id);
        }
        width += font.h_advance(glyph_id);
        prev = Some(glyph_id);
    }
    width
}
