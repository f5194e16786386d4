use crate::config::schema::PixelFormat;
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tiny_skia::Pixmap;
use tracing::{info, trace};

/// Where finished frames go.
pub trait Surface: Send {
    /// # Errors
    /// Returns an error if the frame can't be written out.
    fn present(&mut self, frame: &Pixmap) -> Result<()>;
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn present(&mut self, frame: &Pixmap) -> Result<()> {
        (**self).present(frame)
    }
}

/// Discards frames. Used when no framebuffer is configured.
#[derive(Debug, Default)]
pub struct NullSurface {
    presented: u64,
}

impl NullSurface {
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Surface for NullSurface {
    fn present(&mut self, frame: &Pixmap) -> Result<()> {
        self.presented += 1;
        trace!("dropped {}x{} frame", frame.width(), frame.height());
        Ok(())
    }
}

/// A 32-bpp Linux framebuffer device such as `/dev/fb0`.
///
/// The configured display size must match the framebuffer's visible size
/// and line length.
pub struct FramebufferSurface {
    file: File,
    format: PixelFormat,
    buf: Vec<u8>,
}

impl FramebufferSurface {
    /// # Errors
    /// Returns `KioskError::Io` if the device can't be opened for writing.
    pub fn open(path: &Path, format: PixelFormat) -> Result<Self> {
        let file = OpenOptions::new().write(true).open(path)?;
        info!("rendering to framebuffer {} ({format:?})", path.display());
        Ok(Self {
            file,
            format,
            buf: Vec::new(),
        })
    }
}

/// Reorder premultiplied RGBA into the device byte order.
pub fn encode_pixels(rgba: &[u8], format: PixelFormat, out: &mut Vec<u8>) {
    out.clear();
    out.extend_from_slice(rgba);
    if format == PixelFormat::Bgra {
        for px in out.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
}

impl Surface for FramebufferSurface {
    fn present(&mut self, frame: &Pixmap) -> Result<()> {
        encode_pixels(frame.data(), self.format, &mut self.buf);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgra_swaps_red_and_blue() {
        let mut out = Vec::new();
        encode_pixels(&[1, 2, 3, 4, 5, 6, 7, 8], PixelFormat::Bgra, &mut out);
        assert_eq!(out, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn rgba_is_passthrough() {
        let mut out = vec![9; 16];
        encode_pixels(&[1, 2, 3, 4], PixelFormat::Rgba, &mut out);
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn framebuffer_file_receives_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fb0");
        std::fs::write(&path, b"").unwrap();

        let mut surface = FramebufferSurface::open(&path, PixelFormat::Bgra).unwrap();
        let mut frame = Pixmap::new(2, 1).unwrap();
        frame.fill(tiny_skia::Color::from_rgba8(10, 20, 30, 255));
        surface.present(&frame).unwrap();
        surface.present(&frame).unwrap();

        assert_eq!(
            std::fs::read(&path).unwrap(),
            vec![30, 20, 10, 255, 30, 20, 10, 255]
        );
    }
}
