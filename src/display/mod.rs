pub mod animation;
pub mod local;
pub mod surface;

use crate::error::{KioskError, Result};
use tracing::debug;

/// Load lifecycle of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unloaded,
    Loaded,
    /// The last scan found nothing; stays here until the next rescan.
    LoadFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    pub powered: bool,
    pub current_index: usize,
}

/// Ordered media items plus the power/selection state shown on screen.
///
/// Generic over the item type so the same rules drive decoded animations
/// on a local screen and plain URL lists for remote viewers.
#[derive(Debug)]
pub struct Viewer<T> {
    items: Vec<T>,
    phase: Phase,
    state: DisplayState,
}

impl<T> Default for Viewer<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            phase: Phase::Unloaded,
            state: DisplayState {
                powered: true,
                current_index: 0,
            },
        }
    }
}

impl<T> Viewer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Replace the whole media list. Selection restarts at the first item.
    ///
    /// # Errors
    /// Returns `KioskError::NoMedia` if `items` is empty; the viewer is then
    /// in `LoadFailed` until the next successful load.
    pub fn load_media(&mut self, items: Vec<T>) -> Result<()> {
        self.state.current_index = 0;
        if items.is_empty() {
            self.items = items;
            self.phase = Phase::LoadFailed;
            return Err(KioskError::NoMedia);
        }
        debug!("loaded {} media items", items.len());
        self.items = items;
        self.phase = Phase::Loaded;
        Ok(())
    }

    /// Select the next item, wrapping at the end. Only acts while loaded and
    /// powered on; returns whether the selection moved.
    pub fn advance_to_next(&mut self) -> bool {
        if !self.is_rendering() {
            return false;
        }
        self.state.current_index = (self.state.current_index + 1) % self.items.len();
        true
    }

    /// Returns `true` if the power state changed.
    pub fn power_off(&mut self) -> bool {
        std::mem::replace(&mut self.state.powered, false)
    }

    /// Returns `true` if the power state changed.
    pub fn power_on(&mut self) -> bool {
        !std::mem::replace(&mut self.state.powered, true)
    }

    pub fn is_rendering(&self) -> bool {
        self.phase == Phase::Loaded && self.state.powered
    }

    pub fn current(&self) -> Option<&T> {
        match self.phase {
            Phase::Loaded => self.items.get(self.state.current_index),
            _ => None,
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        match self.phase {
            Phase::Loaded => self.items.get_mut(self.state.current_index),
            _ => None,
        }
    }
}
