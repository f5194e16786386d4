use crate::error::{KioskError, Result};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{AnimationDecoder, Frame};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Target size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What happened to one file in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeOutcome {
    Resized,
    Unchanged,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct ResizeReport {
    pub items: Vec<(PathBuf, ResizeOutcome)>,
}

impl ResizeReport {
    pub fn resized(&self) -> impl Iterator<Item = &Path> {
        self.items
            .iter()
            .filter(|(_, o)| *o == ResizeOutcome::Resized)
            .map(|(p, _)| p.as_path())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.items.iter().filter_map(|(p, o)| match o {
            ResizeOutcome::Failed(msg) => Some((p.as_path(), msg.as_str())),
            _ => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Rewrites media files to the screen resolution on the blocking pool.
///
/// Clones share one worker limit, so overlapping batches together never run
/// more than `workers` files at a time.
#[derive(Debug, Clone)]
pub struct ResizePipeline {
    target: Resolution,
    workers: usize,
    permits: Arc<Semaphore>,
}

impl ResizePipeline {
    /// `workers == 0` means one worker per available CPU.
    pub fn new(target: Resolution, workers: usize) -> Self {
        let workers = if workers == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            workers
        };
        Self {
            target,
            workers,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    pub fn target(&self) -> Resolution {
        self.target
    }

    /// Resize every file whose size differs from the target.
    ///
    /// Completes once every item has finished or failed; a failed item never
    /// stops the others.
    pub async fn run(&self, paths: Vec<PathBuf>) -> ResizeReport {
        let target = self.target;

        let jobs = paths.into_iter().map(|path| {
            let permits = Arc::clone(&self.permits);
            async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                let job_path = path.clone();
                let outcome =
                    match tokio::task::spawn_blocking(move || resize_file(&job_path, target)).await
                    {
                        Ok(Ok(true)) => ResizeOutcome::Resized,
                        Ok(Ok(false)) => ResizeOutcome::Unchanged,
                        Ok(Err(e)) => ResizeOutcome::Failed(e.to_string()),
                        Err(e) => ResizeOutcome::Failed(format!("resize worker died: {e}")),
                    };
                (path, outcome)
            }
        });

        let report = ResizeReport {
            items: futures::future::join_all(jobs).await,
        };

        for (path, msg) in report.failures() {
            warn!("resize failed for {}: {msg}", path.display());
        }
        info!(
            "resize batch done: {} resized, {} failed, {} total",
            report.resized().count(),
            report.failures().count(),
            report.items.len()
        );
        report
    }
}

/// Resize a single GIF in place. Returns `false` if it was already the
/// target size.
///
/// # Errors
/// Returns `KioskError::Resize` if the file can't be decoded or encoded, or
/// `KioskError::Io` if the replacement can't be written.
pub fn resize_file(path: &Path, target: Resolution) -> Result<bool> {
    let resize_err = |source| KioskError::Resize {
        path: path.to_path_buf(),
        source,
    };

    let (width, height) = image::image_dimensions(path).map_err(resize_err)?;
    if width == target.width && height == target.height {
        debug!("{} already {target}", path.display());
        return Ok(false);
    }

    let decoder = GifDecoder::new(BufReader::new(File::open(path)?)).map_err(resize_err)?;
    // Frames come out fully composited onto the logical screen.
    let frames = decoder.into_frames().collect_frames().map_err(resize_err)?;

    let resized: Vec<Frame> = frames
        .into_iter()
        .map(|frame| {
            let delay = frame.delay();
            let buffer = image::imageops::resize(
                frame.buffer(),
                target.width,
                target.height,
                FilterType::Lanczos3,
            );
            Frame::from_parts(buffer, 0, 0, delay)
        })
        .collect();

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut encoder = GifEncoder::new(BufWriter::new(tmp.as_file_mut()));
        encoder.set_repeat(Repeat::Infinite).map_err(resize_err)?;
        encoder.encode_frames(resized).map_err(resize_err)?;
    }
    tmp.persist(path).map_err(|e| KioskError::Io(e.error))?;

    debug!("resized {} from {width}x{height} to {target}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Delay, Rgba, RgbaImage};

    const TARGET: Resolution = Resolution {
        width: 4,
        height: 4,
    };

    fn write_gif(path: &Path, width: u32, height: u32, frames: usize) {
        let file = File::create(path).unwrap();
        let mut encoder = GifEncoder::new(file);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        let frames = (0..frames).map(|i| {
            let shade = (i * 60) as u8;
            Frame::from_parts(
                RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255 - shade, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(100, 1),
            )
        });
        encoder.encode_frames(frames).unwrap();
    }

    #[test]
    fn resizes_to_target_and_keeps_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        write_gif(&path, 8, 6, 3);

        assert!(resize_file(&path, TARGET).unwrap());
        assert_eq!(image::image_dimensions(&path).unwrap(), (4, 4));

        let decoder = GifDecoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        let frames = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn matching_size_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.gif");
        write_gif(&path, 4, 4, 2);
        let before = std::fs::read(&path).unwrap();

        assert!(!resize_file(&path, TARGET).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn garbage_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gif");
        std::fs::write(&path, b"definitely not a gif").unwrap();
        assert!(matches!(
            resize_file(&path, TARGET),
            Err(KioskError::Resize { .. })
        ));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (1..=5)
            .map(|i| dir.path().join(format!("{i}.gif")))
            .collect();
        for (i, path) in paths.iter().enumerate() {
            if i == 2 {
                std::fs::write(path, b"corrupt").unwrap();
            } else {
                write_gif(path, 10, 8, 2);
            }
        }

        let report = ResizePipeline::new(TARGET, 2).run(paths.clone()).await;

        assert_eq!(report.items.len(), 5);
        let failed: Vec<&Path> = report.failures().map(|(p, _)| p).collect();
        assert_eq!(failed, vec![paths[2].as_path()]);
        let mut resized: Vec<&Path> = report.resized().collect();
        resized.sort();
        assert_eq!(
            resized,
            vec![
                paths[0].as_path(),
                paths[1].as_path(),
                paths[3].as_path(),
                paths[4].as_path()
            ]
        );
        for i in [0, 1, 3, 4] {
            assert_eq!(image::image_dimensions(&paths[i]).unwrap(), (4, 4));
        }
        assert!(!report.is_clean());
    }

    #[test]
    fn zero_workers_uses_available_parallelism() {
        let pipeline = ResizePipeline::new(TARGET, 0);
        assert!(pipeline.workers >= 1);
        assert_eq!(pipeline.permits.available_permits(), pipeline.workers);
    }

    #[tokio::test]
    async fn clones_share_the_worker_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.gif");
        write_gif(&path, 8, 8, 1);

        let pipeline = ResizePipeline::new(TARGET, 1);
        let other = pipeline.clone();
        assert!(Arc::ptr_eq(&pipeline.permits, &other.permits));

        // With the only worker slot taken, a batch on the clone has to wait.
        let held = Arc::clone(&pipeline.permits).acquire_owned().await.unwrap();
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            other.run(vec![path.clone()]),
        )
        .await;
        assert!(blocked.is_err());
        assert_eq!(image::image_dimensions(&path).unwrap(), (8, 8));

        drop(held);
        let report = other.run(vec![path.clone()]).await;
        assert_eq!(report.resized().collect::<Vec<_>>(), vec![path.as_path()]);
        assert_eq!(pipeline.permits.available_permits(), 1);
    }
}
