pub mod message;

use crate::control::Presenter;
use crate::display::{DisplayState, Phase, Viewer};
use crate::input::Action;
use crate::media::{ScanOutcome, MEDIA_ROUTE};
use message::WireMessage;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound queue depth per viewer. A viewer this far behind is dropped.
pub const VIEWER_QUEUE: usize = 32;

/// Identifies one connected remote viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(Uuid);

impl ViewerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Fans state changes out to connected browser viewers.
///
/// The hub owns the membership set outright; web sockets only ever talk to
/// it through the control queue. Each member has its own bounded queue, so
/// a stalled or closed viewer costs the others nothing.
#[derive(Debug, Default)]
pub struct Hub {
    members: HashMap<ViewerId, mpsc::Sender<WireMessage>>,
    viewer: Viewer<String>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn state(&self) -> DisplayState {
        self.viewer.state()
    }

    /// Add a member and bring it up to date: the media list (or NO_GIFS),
    /// then POWER_OFF if the screen is currently off.
    pub fn connect(&mut self, id: ViewerId, tx: mpsc::Sender<WireMessage>) {
        self.members.insert(id, tx);

        let mut sync = vec![self.media_message()];
        if !self.viewer.state().powered {
            sync.push(WireMessage::PowerOff);
        }
        for msg in sync {
            if !self.deliver(id, msg) {
                return;
            }
        }
        info!("viewer {id} connected ({} total)", self.members.len());
    }

    /// Returns `false` if the viewer was already gone.
    pub fn disconnect(&mut self, id: ViewerId) -> bool {
        let removed = self.members.remove(&id).is_some();
        if removed {
            info!("viewer {id} disconnected ({} left)", self.members.len());
        }
        removed
    }

    /// Send to every current member, dropping any that can't take it.
    pub fn broadcast(&mut self, msg: &WireMessage) {
        let mut dropped = Vec::new();
        for (id, tx) in &self.members {
            if let Err(e) = tx.try_send(msg.clone()) {
                log_send_failure(*id, &e);
                dropped.push(*id);
            }
        }
        for id in dropped {
            self.members.remove(&id);
        }
        debug!("broadcast {msg:?} to {} viewers", self.members.len());
    }

    fn deliver(&mut self, id: ViewerId, msg: WireMessage) -> bool {
        let Some(tx) = self.members.get(&id) else {
            return false;
        };
        if let Err(e) = tx.try_send(msg) {
            log_send_failure(id, &e);
            self.members.remove(&id);
            return false;
        }
        true
    }

    fn media_message(&self) -> WireMessage {
        match self.viewer.phase() {
            Phase::Loaded => WireMessage::LoadGifs {
                gifs: self.viewer.items().to_vec(),
            },
            Phase::Unloaded | Phase::LoadFailed => WireMessage::NoGifs,
        }
    }
}

fn log_send_failure(id: ViewerId, err: &TrySendError<WireMessage>) {
    match err {
        TrySendError::Full(_) => warn!("viewer {id} is not keeping up, dropping it"),
        TrySendError::Closed(_) => debug!("viewer {id} already closed"),
    }
}

impl Presenter for Hub {
    fn apply(&mut self, action: Action) {
        match action {
            Action::PowerOff => {
                if self.viewer.power_off() {
                    self.broadcast(&WireMessage::PowerOff);
                }
            }
            Action::PowerOn => {
                if self.viewer.power_on() {
                    self.broadcast(&WireMessage::PowerOn);
                }
            }
            Action::AdvanceToNext => {
                if self.viewer.advance_to_next() {
                    self.broadcast(&WireMessage::ToggleGif);
                } else {
                    debug!("toggle ignored: nothing showing");
                }
            }
        }
    }

    fn media_changed(&mut self, outcome: &ScanOutcome) {
        let gifs = outcome
            .media()
            .map(|set| set.relative_urls(MEDIA_ROUTE))
            .unwrap_or_default();
        if let Err(e) = self.viewer.load_media(gifs) {
            debug!("{e}");
        }
        // Same message a joining viewer would get, so everyone agrees.
        let msg = self.media_message();
        self.broadcast(&msg);
    }

    fn viewer_joined(&mut self, id: ViewerId, tx: mpsc::Sender<WireMessage>) {
        self.connect(id, tx);
    }

    fn viewer_left(&mut self, id: ViewerId) {
        self.disconnect(id);
    }
}
