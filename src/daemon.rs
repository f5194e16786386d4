use crate::config::schema::{AppConfig, DisplayConfig, InputConfig, Mode};
use crate::control::{Command, Controller, COMMAND_QUEUE};
use crate::display::local::LocalDisplay;
use crate::display::surface::{FramebufferSurface, NullSurface, Surface};
use crate::error::Result;
use crate::hub::Hub;
use crate::input::{self, InputEvent, INPUT_QUEUE};
use crate::media::resize::{ResizePipeline, Resolution};
use crate::media::{watcher, ExtensionFilter};
use crate::server;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the kiosk daemon until Ctrl+C, `q` on the keyboard, or a fatal error.
///
/// # Errors
/// Returns `KioskError` if the media directory or the local display can't be
/// set up, or the web server fails to bind.
pub async fn run(config: AppConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(COMMAND_QUEUE);

    let media_dir = config.kiosk.media_dir.clone();
    std::fs::create_dir_all(&media_dir)?;
    let filter = ExtensionFilter::new(&config.kiosk.extensions);

    let mut handles = Vec::new();

    let input_rx = match spawn_input(&config.input, &cancel) {
        Some((rx, handle)) => {
            handles.push(handle);
            Some(rx)
        }
        None => None,
    };

    handles.push(spawn_media_watcher(&media_dir, &filter, &cmd_tx, &cancel));

    let resize = config
        .resize
        .enabled
        .then(|| ResizePipeline::new(resize_target(&config.display), config.resize.workers));

    info!(
        "sparkyd running in {:?} mode, media in {}",
        config.kiosk.mode,
        media_dir.display()
    );

    let result = match config.kiosk.mode {
        Mode::Server => {
            let server_handle = spawn_server(&config, &media_dir, &cmd_tx, &cancel);
            let controller = Controller::new(Hub::new(), media_dir, filter, resize, cmd_tx);
            controller.run(cmd_rx, input_rx, cancel.clone()).await;
            finish_server(server_handle, &cancel).await
        }
        Mode::Local => match open_surface(&config.display)
            .and_then(|surface| LocalDisplay::new(&config.display, surface))
        {
            Ok(display) => {
                let controller = Controller::new(display, media_dir, filter, resize, cmd_tx);
                controller.run(cmd_rx, input_rx, cancel.clone()).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    info!("daemon shutting down...");
    cancel.cancel();

    let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
        for handle in handles {
            let _ = handle.await;
        }
    })
    .await;

    info!("daemon stopped");
    result
}

/// Resize target for media files: the configured screen size.
pub fn resize_target(display: &DisplayConfig) -> Resolution {
    Resolution {
        width: display.width,
        height: display.height,
    }
}

fn spawn_input(
    config: &InputConfig,
    cancel: &CancellationToken,
) -> Option<(mpsc::Receiver<InputEvent>, JoinHandle<()>)> {
    let source = match input::build_source(config) {
        Ok(Some(source)) => source,
        Ok(None) => {
            info!("no input source configured");
            return None;
        }
        Err(e) => {
            error!("input disabled: {e}");
            return None;
        }
    };

    let name = source.name();
    let (tx, rx) = mpsc::channel(INPUT_QUEUE);
    match source.start(tx, cancel.clone()) {
        Ok(handle) => {
            info!("{name} input started");
            Some((rx, handle))
        }
        Err(e) => {
            error!("{name} input failed to start: {e}");
            None
        }
    }
}

fn spawn_media_watcher(
    media_dir: &Path,
    filter: &ExtensionFilter,
    cmd_tx: &mpsc::Sender<Command>,
    cancel: &CancellationToken,
) -> JoinHandle<()> {
    let media_dir = media_dir.to_path_buf();
    let filter = filter.clone();
    let tx = cmd_tx.clone();
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = watcher::watch_media_dir(media_dir, filter, tx, cancel).await {
            error!("media watcher error: {e}");
        }
    })
}

fn spawn_server(
    config: &AppConfig,
    media_dir: &Path,
    cmd_tx: &mpsc::Sender<Command>,
    cancel: &CancellationToken,
) -> JoinHandle<Result<()>> {
    let server_config = config.server.clone();
    let media_dir: PathBuf = media_dir.to_path_buf();
    let tx = cmd_tx.clone();
    let server_cancel = cancel.clone();
    let stop = cancel.clone();
    tokio::spawn(async move {
        let result = server::serve(server_config, media_dir, tx, server_cancel).await;
        if let Err(e) = &result {
            error!("web server error: {e}");
            // Without the server there is nothing to show.
            stop.cancel();
        }
        result
    })
}

async fn finish_server(handle: JoinHandle<Result<()>>, cancel: &CancellationToken) -> Result<()> {
    cancel.cancel();
    match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!("web server task panicked: {e}");
            Ok(())
        }
        Err(_) => {
            warn!("web server did not stop within {SHUTDOWN_GRACE:?}");
            Ok(())
        }
    }
}

fn open_surface(display: &DisplayConfig) -> Result<Box<dyn Surface>> {
    match &display.framebuffer {
        Some(path) => Ok(Box::new(FramebufferSurface::open(path, display.pixel_format)?)),
        None => {
            info!("no framebuffer configured, running headless");
            Ok(Box::new(NullSurface::default()))
        }
    }
}
