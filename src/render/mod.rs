pub mod canvas;
pub mod pixmap;
pub mod text;

use ab_glyph::Font;
use canvas::{center_offset, composite};
use tiny_skia::{Color, Pixmap};

/// Font size for full-screen messages, relative to the screen height.
const MESSAGE_SCALE: f32 = 0.05;

/// Draw one animation frame centered on a solid background.
pub fn render_frame(canvas: &mut Pixmap, background: Color, frame: &Pixmap) {
    canvas.fill(background);
    let x = center_offset(canvas.width(), frame.width());
    let y = center_offset(canvas.height(), frame.height());
    composite(canvas, frame, x, y);
}

/// Blank the whole screen.
pub fn render_blank(canvas: &mut Pixmap) {
    canvas.fill(Color::BLACK);
}

/// Draw a centered message, or just the background when no font is loaded.
pub fn render_message<F: Font>(
    canvas: &mut Pixmap,
    background: Color,
    font: Option<&F>,
    text_color: Color,
    message: &str,
) {
    canvas.fill(background);
    if let Some(font) = font {
        let size = (canvas.height() as f32 * MESSAGE_SCALE).max(12.0);
        text::render_text(canvas, font, message, text_color, size);
    }
}
