use super::animation::Animation;
use super::surface::Surface;
use super::{Phase, Viewer};
use crate::config::schema::DisplayConfig;
use crate::control::Presenter;
use crate::error::{KioskError, Result};
use crate::input::Action;
use crate::media::ScanOutcome;
use crate::render::{self, canvas, text};
use ab_glyph::FontVec;
use std::time::Duration;
use tiny_skia::{Color, Pixmap};
use tracing::{debug, info, warn};

const NO_MEDIA_MESSAGE: &str = "No GIFs found\nAdd some to the media folder";

/// Renders the selected animation straight to a local surface.
pub struct LocalDisplay<S> {
    viewer: Viewer<Animation>,
    surface: S,
    canvas: Pixmap,
    background: Color,
    text_color: Color,
    font: Option<FontVec>,
    frame_period: Duration,
}

impl<S: Surface> LocalDisplay<S> {
    /// # Errors
    /// Returns an error if the colors don't parse or the canvas can't be
    /// allocated. A font that fails to load is logged and skipped.
    pub fn new(config: &DisplayConfig, surface: S) -> Result<Self> {
        let background = canvas::parse_hex_color(&config.background)?;
        let text_color = canvas::parse_hex_color(&config.text_color)?;
        let canvas = canvas::create_canvas(config.width, config.height, background)?;

        let font = config.font.as_deref().and_then(|path| match text::load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("messages will be blank: {e}");
                None
            }
        });

        if config.refresh_hz == 0 {
            return Err(KioskError::Config("refresh_hz must be positive".into()));
        }

        Ok(Self {
            viewer: Viewer::new(),
            surface,
            canvas,
            background,
            text_color,
            font,
            frame_period: Duration::from_secs(1) / config.refresh_hz,
        })
    }

    pub fn viewer(&self) -> &Viewer<Animation> {
        &self.viewer
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Draw whatever the current state calls for.
    fn redraw(&mut self) {
        if !self.viewer.state().powered {
            render::render_blank(&mut self.canvas);
        } else {
            match self.viewer.phase() {
                Phase::Loaded => {
                    if let Some(anim) = self.viewer.current() {
                        render::render_frame(&mut self.canvas, self.background, anim.current());
                    }
                }
                Phase::LoadFailed => render::render_message(
                    &mut self.canvas,
                    self.background,
                    self.font.as_ref(),
                    self.text_color,
                    NO_MEDIA_MESSAGE,
                ),
                Phase::Unloaded => self.canvas.fill(self.background),
            }
        }
        self.present();
    }

    fn present(&mut self) {
        if let Err(e) = self.surface.present(&self.canvas) {
            warn!("present failed: {e}");
        }
    }

    fn decode_all(&self, outcome: &ScanOutcome) -> Vec<Animation> {
        let Some(set) = outcome.media() else {
            return Vec::new();
        };
        let (width, height) = (self.canvas.width(), self.canvas.height());
        set.iter()
            .filter_map(|path| match Animation::decode(path, width, height) {
                Ok(anim) => {
                    debug!("decoded {} ({} frames)", path.display(), anim.len());
                    Some(anim)
                }
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    None
                }
            })
            .collect()
    }
}

impl<S: Surface> Presenter for LocalDisplay<S> {
    fn apply(&mut self, action: Action) {
        let changed = match action {
            Action::PowerOff => self.viewer.power_off(),
            Action::PowerOn => self.viewer.power_on(),
            Action::AdvanceToNext => {
                let moved = self.viewer.advance_to_next();
                if moved {
                    if let Some(anim) = self.viewer.current_mut() {
                        anim.rewind();
                    }
                }
                moved
            }
        };
        if changed {
            self.redraw();
        }
    }

    fn media_changed(&mut self, outcome: &ScanOutcome) {
        let animations = self.decode_all(outcome);
        match self.viewer.load_media(animations) {
            Ok(()) => info!("showing {} animations", self.viewer.items().len()),
            Err(e) => warn!("{e}, waiting for the next rescan"),
        }
        self.redraw();
    }

    fn frame_interval(&self) -> Option<Duration> {
        let animated = self.viewer.current().is_some_and(|anim| anim.len() > 1);
        (self.viewer.is_rendering() && animated).then_some(self.frame_period)
    }

    fn frame(&mut self) {
        let period = self.frame_period;
        let changed = self
            .viewer
            .current_mut()
            .is_some_and(|anim| anim.step(period));
        if changed {
            self.redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaSet;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba, RgbaImage};
    use std::path::{Path, PathBuf};

    #[derive(Default)]
    struct Recording {
        frames: Vec<Vec<u8>>,
    }

    impl Recording {
        fn last_center(&self) -> [u8; 4] {
            let frame = self.frames.last().unwrap();
            // 4x4 canvas, pixel (2, 2).
            let idx = (2 * 4 + 2) * 4;
            frame[idx..idx + 4].try_into().unwrap()
        }
    }

    impl Surface for Recording {
        fn present(&mut self, frame: &Pixmap) -> Result<()> {
            self.frames.push(frame.data().to_vec());
            Ok(())
        }
    }

    fn config(refresh_hz: u32) -> DisplayConfig {
        let mut config = DisplayConfig::default();
        config.width = 4;
        config.height = 4;
        config.refresh_hz = refresh_hz;
        config.background = "#000000".into();
        config
    }

    fn write_gif(path: &Path, colors: &[[u8; 3]]) {
        let mut encoder = GifEncoder::new(std::fs::File::create(path).unwrap());
        let frames = colors.iter().map(|&[r, g, b]| {
            Frame::from_parts(
                RgbaImage::from_pixel(4, 4, Rgba([r, g, b, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(100, 1),
            )
        });
        encoder.encode_frames(frames).unwrap();
    }

    fn loaded(dir: &Path, files: &[(&str, &[[u8; 3]])]) -> LocalDisplay<Recording> {
        let mut paths = Vec::new();
        for (name, colors) in files {
            let path = dir.join(name);
            write_gif(&path, colors);
            paths.push(path);
        }
        let mut display = LocalDisplay::new(&config(10), Recording::default()).unwrap();
        let outcome = MediaSet::new(paths).map_or(ScanOutcome::Empty, ScanOutcome::Loaded);
        display.media_changed(&outcome);
        display
    }

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];

    #[test]
    fn first_animation_shown_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let display = loaded(dir.path(), &[("a.gif", &[RED]), ("b.gif", &[BLUE])]);
        let px = display.surface().last_center();
        assert!(px[0] > 200 && px[2] < 50, "{px:?}");
    }

    #[test]
    fn advance_switches_animation() {
        let dir = tempfile::tempdir().unwrap();
        let mut display = loaded(dir.path(), &[("a.gif", &[RED]), ("b.gif", &[BLUE])]);
        display.apply(Action::AdvanceToNext);
        let px = display.surface().last_center();
        assert!(px[2] > 200 && px[0] < 50, "{px:?}");
    }

    #[test]
    fn power_off_blanks_and_suspends_timer() {
        let dir = tempfile::tempdir().unwrap();
        let mut display = loaded(dir.path(), &[("a.gif", &[RED, BLUE])]);
        assert!(display.frame_interval().is_some());

        display.apply(Action::PowerOff);
        assert_eq!(display.surface().last_center(), [0, 0, 0, 255]);
        assert!(display.frame_interval().is_none());

        let presented = display.surface().frames.len();
        display.apply(Action::AdvanceToNext);
        display.apply(Action::PowerOff);
        assert_eq!(display.surface().frames.len(), presented);

        display.apply(Action::PowerOn);
        assert!(display.surface().last_center()[0] > 200);
    }

    #[test]
    fn frame_ticks_step_the_animation() {
        let dir = tempfile::tempdir().unwrap();
        let mut display = loaded(dir.path(), &[("a.gif", &[RED, BLUE])]);
        assert_eq!(display.frame_interval(), Some(Duration::from_millis(100)));

        display.frame();
        assert!(display.surface().last_center()[2] > 200);
        display.frame();
        assert!(display.surface().last_center()[0] > 200);
    }

    #[test]
    fn still_image_needs_no_timer() {
        let dir = tempfile::tempdir().unwrap();
        let display = loaded(dir.path(), &[("a.gif", &[RED])]);
        assert!(display.frame_interval().is_none());
    }

    #[test]
    fn empty_scan_shows_message_background() {
        let mut display = LocalDisplay::new(&config(30), Recording::default()).unwrap();
        display.media_changed(&ScanOutcome::Empty);
        assert_eq!(display.viewer().phase(), Phase::LoadFailed);
        assert_eq!(display.surface().last_center(), [0, 0, 0, 255]);
        assert!(display.frame_interval().is_none());
    }

    #[test]
    fn undecodable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.gif");
        let bad = dir.path().join("bad.gif");
        write_gif(&good, &[RED]);
        std::fs::write(&bad, b"not a gif at all").unwrap();

        let mut display = LocalDisplay::new(&config(30), Recording::default()).unwrap();
        let set = MediaSet::new(vec![bad, good]).unwrap();
        display.media_changed(&ScanOutcome::Loaded(set));

        assert_eq!(display.viewer().items().len(), 1);
        assert_eq!(display.viewer().phase(), Phase::Loaded);
    }

    #[test]
    fn nothing_decodable_is_no_media() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.gif");
        std::fs::write(&bad, b"not a gif at all").unwrap();

        let mut display = LocalDisplay::new(&config(30), Recording::default()).unwrap();
        let set = MediaSet::new(vec![PathBuf::from(&bad)]).unwrap();
        display.media_changed(&ScanOutcome::Loaded(set));
        assert_eq!(display.viewer().phase(), Phase::LoadFailed);
    }

    #[test]
    fn bad_color_is_rejected() {
        let mut config = config(30);
        config.background = "#zzzzzz".into();
        assert!(LocalDisplay::new(&config, Recording::default()).is_err());
    }
}
