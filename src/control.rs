use crate::hub::message::WireMessage;
use crate::hub::ViewerId;
use crate::input::debounce::DebouncedButtons;
use crate::input::{Action, InputEvent};
use crate::media::resize::{ResizePipeline, ResizeReport};
use crate::media::{self, ExtensionFilter, MediaSet, ScanOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const COMMAND_QUEUE: usize = 64;

/// Messages into the control loop from the watcher, resize workers and the
/// web server.
#[derive(Debug)]
pub enum Command {
    /// Inject a button edge (input sources normally use their own queue).
    Input(InputEvent),

    /// Re-read the media directory.
    Rescan,

    /// A resize batch started by rescan `generation` has completed.
    ResizeFinished {
        generation: u64,
        report: ResizeReport,
    },

    /// A remote viewer joined; `tx` is its outbound queue.
    Connect {
        id: ViewerId,
        tx: mpsc::Sender<WireMessage>,
    },

    /// A remote viewer went away.
    Disconnect(ViewerId),

    Shutdown,
}

/// The presentation layer driven by the control loop.
pub trait Presenter {
    fn apply(&mut self, action: Action);

    fn media_changed(&mut self, outcome: &ScanOutcome);

    fn viewer_joined(&mut self, id: ViewerId, _tx: mpsc::Sender<WireMessage>) {
        warn!("viewer {id} connected but this presenter has no remote viewers");
    }

    fn viewer_left(&mut self, _id: ViewerId) {}

    /// Frame timer period, or `None` while there is nothing to animate.
    fn frame_interval(&self) -> Option<Duration> {
        None
    }

    fn frame(&mut self) {}
}

/// Owns button state and media scanning, and feeds a presenter.
///
/// Everything runs on one task: handlers finish before the next event is
/// taken, so nothing here is shared or locked. At most one resize batch is
/// in flight; rescans that land meanwhile leave a single follow-up batch
/// queued for the newest media set.
pub struct Controller<P> {
    presenter: P,
    buttons: DebouncedButtons,
    media_dir: PathBuf,
    filter: ExtensionFilter,
    resize: Option<ResizePipeline>,
    generation: u64,
    resize_running: bool,
    resize_queued: Option<MediaSet>,
    /// A superseded batch rewrote files that viewers haven't reloaded yet.
    reload_owed: bool,
    cmd_tx: mpsc::Sender<Command>,
}

impl<P: Presenter> Controller<P> {
    pub fn new(
        presenter: P,
        media_dir: PathBuf,
        filter: ExtensionFilter,
        resize: Option<ResizePipeline>,
        cmd_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            presenter,
            buttons: DebouncedButtons::new(),
            media_dir,
            filter,
            resize,
            generation: 0,
            resize_running: false,
            resize_queued: None,
            reload_owed: false,
            cmd_tx,
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn into_presenter(self) -> P {
        self.presenter
    }

    /// Run until cancelled, Ctrl+C, or a `Shutdown` command. Performs an
    /// initial scan first.
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut input_rx: Option<mpsc::Receiver<InputEvent>>,
        cancel: CancellationToken,
    ) -> P {
        self.rescan();
        let mut ticker: Option<Interval> = None;

        loop {
            sync_ticker(&mut ticker, self.presenter.frame_interval());

            tokio::select! {
                () = cancel.cancelled() => break,
                () = async { tokio::signal::ctrl_c().await.ok(); } => {
                    info!("received SIGINT, shutting down");
                    cancel.cancel();
                    break;
                }
                event = recv_input(&mut input_rx) => self.on_input(event),
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd) {
                        cancel.cancel();
                        break;
                    }
                }
                () = next_tick(&mut ticker) => self.presenter.frame(),
            }
        }

        info!("control loop stopped");
        self.presenter
    }

    /// Handle one command. Returns `true` if the daemon should shut down.
    pub fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Input(event) => self.on_input(event),
            Command::Rescan => self.rescan(),
            Command::ResizeFinished { generation, report } => {
                self.on_resize_finished(generation, &report);
            }
            Command::Connect { id, tx } => self.presenter.viewer_joined(id, tx),
            Command::Disconnect(id) => self.presenter.viewer_left(id),
            Command::Shutdown => {
                info!("shutdown command received");
                return true;
            }
        }
        false
    }

    fn on_input(&mut self, event: InputEvent) {
        if let Some(action) = self.buttons.handle(event) {
            debug!("{:?} {:?} -> {action:?}", event.button, event.edge);
            self.presenter.apply(action);
        }
    }

    /// Rebuild the media set from disk and hand it to the presenter.
    pub fn rescan(&mut self) {
        self.generation += 1;

        let outcome = match media::scan(&self.media_dir, &self.filter) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("scanning {} failed: {e}", self.media_dir.display());
                ScanOutcome::Empty
            }
        };

        match &outcome {
            ScanOutcome::Loaded(set) => info!("found {} media files", set.len()),
            ScanOutcome::Empty => warn!("no media in {}", self.media_dir.display()),
        }

        self.presenter.media_changed(&outcome);

        match &outcome {
            ScanOutcome::Loaded(set) => self.spawn_resize(set),
            ScanOutcome::Empty => self.resize_queued = None,
        }
    }

    fn spawn_resize(&mut self, set: &MediaSet) {
        if self.resize.is_none() {
            return;
        }
        if self.resize_running {
            debug!("resize batch still running, queueing rescan {}", self.generation);
            self.resize_queued = Some(set.clone());
            return;
        }
        self.start_resize(set.to_vec());
    }

    fn start_resize(&mut self, paths: Vec<PathBuf>) {
        let Some(pipeline) = self.resize.clone() else {
            return;
        };
        let generation = self.generation;
        let tx = self.cmd_tx.clone();
        self.resize_running = true;

        debug!(
            "resize batch {generation}: {} files to {}",
            paths.len(),
            pipeline.target()
        );
        tokio::spawn(async move {
            let report = pipeline.run(paths).await;
            let _ = tx.send(Command::ResizeFinished { generation, report }).await;
        });
    }

    fn on_resize_finished(&mut self, generation: u64, report: &ResizeReport) {
        self.resize_running = false;
        let changed = report.resized().next().is_some();

        if let Some(set) = self.resize_queued.take() {
            info!(
                "resize batch {generation} superseded by rescan {}, starting follow-up",
                self.generation
            );
            self.reload_owed |= changed;
            self.start_resize(set.to_vec());
            return;
        }

        if generation != self.generation {
            info!(
                "resize batch {generation} superseded by rescan {}, not delivering",
                self.generation
            );
            return;
        }

        let owed = std::mem::take(&mut self.reload_owed);
        if changed || owed {
            info!("resized media ready, reloading");
            self.rescan();
        } else {
            debug!("resize batch {generation} changed nothing");
        }
    }
}

fn sync_ticker(ticker: &mut Option<Interval>, period: Option<Duration>) {
    match (period, ticker.as_ref()) {
        (Some(period), Some(t)) if t.period() == period => {}
        (Some(period), _) => {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            *ticker = Some(interval);
        }
        (None, _) => *ticker = None,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn recv_input(rx: &mut Option<mpsc::Receiver<InputEvent>>) -> InputEvent {
    if let Some(inner) = rx {
        if let Some(event) = inner.recv().await {
            return event;
        }
        warn!("input source stopped");
        *rx = None;
    }
    std::future::pending().await
}
