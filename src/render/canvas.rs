use crate::error::{KioskError, Result};
use tiny_skia::{Color, Pixmap, Transform};

/// Create a new pixmap of the given size filled with a solid color.
///
/// # Errors
/// Returns `KioskError::Render` if the size is zero.
pub fn create_canvas(width: u32, height: u32, background: Color) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| KioskError::Render(format!("failed to create {width}x{height} pixmap")))?;
    pixmap.fill(background);
    Ok(pixmap)
}

/// Composite a source pixmap onto the canvas at the given position.
pub fn composite(canvas: &mut Pixmap, src: &Pixmap, x: i32, y: i32) {
    canvas.draw_pixmap(
        x,
        y,
        src.as_ref(),
        &tiny_skia::PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Offset that centers `inner` within `outer` (negative if it overflows).
#[must_use]
pub const fn center_offset(outer: u32, inner: u32) -> i32 {
    (outer as i32 - inner as i32) / 2
}

/// Parse a hex color string like "#1a1a2e" or "#fff" into a tiny-skia Color.
///
/// # Errors
/// Returns `KioskError::Render` if the hex string is malformed.
pub fn parse_hex_color(hex: &str) -> Result<Color> {
    let hex = hex.trim_start_matches('#');
    let parse_err = || KioskError::Render(format!("invalid hex color: #{hex}"));

    if !hex.is_ascii() {
        return Err(parse_err());
    }

    let (r, g, b) = match hex.len() {
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).map_err(|_| parse_err())?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).map_err(|_| parse_err())?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).map_err(|_| parse_err())?;
            (r, g, b)
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| parse_err())?;
            let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| parse_err())?;
            let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| parse_err())?;
            (r, g, b)
        }
        _ => return Err(parse_err()),
    };

    Ok(Color::from_rgba8(r, g, b, 255))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_6_digit_hex() {
        let c = parse_hex_color("#1a1a2e").unwrap();
        assert_eq!(c.red(), 0x1a as f32 / 255.0);
    }

    #[test]
    fn parse_3_digit_hex() {
        let c = parse_hex_color("#fff").unwrap();
        assert_eq!(c.red(), 1.0);
        assert_eq!(c.green(), 1.0);
    }

    #[test]
    fn reject_bad_hex() {
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
        assert!(parse_hex_color("#ééé").is_err());
    }

    #[test]
    fn canvas_has_requested_size() {
        let pm = create_canvas(64, 48, Color::BLACK).unwrap();
        assert_eq!(pm.width(), 64);
        assert_eq!(pm.height(), 48);
        assert_eq!(&pm.data()[0..4], &[0, 0, 0, 255]);
    }

    #[test]
    fn zero_sized_canvas_fails() {
        assert!(create_canvas(0, 10, Color::BLACK).is_err());
    }

    #[test]
    fn center_offsets() {
        assert_eq!(center_offset(100, 60), 20);
        assert_eq!(center_offset(60, 100), -20);
    }
}
