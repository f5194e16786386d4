use crate::error::{KioskError, Result};
use crate::render::pixmap::fit_to_pixmap;
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use tiny_skia::Pixmap;

/// Shortest frame delay honoured. Browsers clamp faster GIFs the same way.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct AnimationFrame {
    pub pixmap: Pixmap,
    pub delay: Duration,
}

/// A decoded, screen-ready animation and its playback position.
#[derive(Debug, Clone)]
pub struct Animation {
    frames: Vec<AnimationFrame>,
    current: usize,
    elapsed: Duration,
}

impl Animation {
    /// Returns `None` if there are no frames.
    pub fn from_frames(frames: Vec<AnimationFrame>) -> Option<Self> {
        if frames.is_empty() {
            return None;
        }
        Some(Self {
            frames,
            current: 0,
            elapsed: Duration::ZERO,
        })
    }

    /// Decode a GIF (or any still image) and shrink it to fit the screen.
    ///
    /// # Errors
    /// Returns `KioskError::Decode` if the file can't be decoded, or
    /// `KioskError::Io` if it can't be opened.
    pub fn decode(path: &Path, max_width: u32, max_height: u32) -> Result<Self> {
        let decode_err = |source| KioskError::Decode {
            path: path.to_path_buf(),
            source,
        };

        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gif"));

        let frames = if is_gif {
            let decoder = GifDecoder::new(BufReader::new(File::open(path)?)).map_err(decode_err)?;
            decoder
                .into_frames()
                .collect_frames()
                .map_err(decode_err)?
                .into_iter()
                .map(|frame| -> Result<AnimationFrame> {
                    let (numer, denom) = frame.delay().numer_denom_ms();
                    let delay = Duration::from_millis(u64::from(numer / denom.max(1)));
                    Ok(AnimationFrame {
                        pixmap: fit_to_pixmap(frame.buffer(), max_width, max_height)?,
                        delay,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            let still = image::open(path).map_err(decode_err)?.to_rgba8();
            vec![AnimationFrame {
                pixmap: fit_to_pixmap(&still, max_width, max_height)?,
                delay: Duration::ZERO,
            }]
        };

        Self::from_frames(frames).ok_or_else(|| {
            KioskError::Render(format!("{} has no frames", path.display()))
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Pixmap {
        &self.frames[self.current].pixmap
    }

    /// Restart from the first frame.
    pub fn rewind(&mut self) {
        self.current = 0;
        self.elapsed = Duration::ZERO;
    }

    /// Advance playback by `dt`. Returns `true` if the visible frame changed.
    pub fn step(&mut self, dt: Duration) -> bool {
        if self.frames.len() < 2 {
            return false;
        }

        self.elapsed += dt;
        let mut changed = false;
        loop {
            let delay = self.frames[self.current].delay.max(MIN_FRAME_DELAY);
            if self.elapsed < delay {
                break;
            }
            self.elapsed -= delay;
            self.current = (self.current + 1) % self.frames.len();
            changed = true;
        }
        changed
    }
}
