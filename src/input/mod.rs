pub mod debounce;
#[cfg(feature = "gpio")]
pub mod gpio;
pub mod keyboard;

use crate::config::schema::{InputConfig, SourceKind};
use crate::error::{KioskError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Queue depth between an input source and the control loop.
pub const INPUT_QUEUE: usize = 32;

/// The two logical control buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Power,
    Toggle,
}

/// A raw edge reported by an input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Press,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub button: Button,
    pub edge: Edge,
}

impl InputEvent {
    pub const fn press(button: Button) -> Self {
        Self {
            button,
            edge: Edge::Press,
        }
    }

    pub const fn release(button: Button) -> Self {
        Self {
            button,
            edge: Edge::Release,
        }
    }
}

/// Domain action produced by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PowerOff,
    PowerOn,
    AdvanceToNext,
}

/// Something that produces button edges.
///
/// Sources run outside the control loop and hand every edge over through
/// `tx`; they never touch button state themselves.
pub trait InputSource: Send {
    fn name(&self) -> &'static str;

    /// Start producing events until `cancel` fires.
    ///
    /// # Errors
    /// Returns an error if the underlying device cannot be opened.
    fn start(
        self: Box<Self>,
        tx: mpsc::Sender<InputEvent>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>>;
}

/// Build the input source selected in the config, if any.
///
/// # Errors
/// Returns `KioskError::Config` for key names that don't parse, or when
/// GPIO input is requested in a build without the `gpio` feature.
pub fn build_source(config: &InputConfig) -> Result<Option<Box<dyn InputSource>>> {
    match config.source {
        SourceKind::None => Ok(None),
        SourceKind::Keyboard => {
            let source = keyboard::KeyboardSource::from_config(config)?;
            Ok(Some(Box::new(source)))
        }
        SourceKind::Gpio => build_gpio(config),
    }
}

#[cfg(feature = "gpio")]
fn build_gpio(config: &InputConfig) -> Result<Option<Box<dyn InputSource>>> {
    Ok(Some(Box::new(gpio::GpioSource::from_config(config))))
}

#[cfg(not(feature = "gpio"))]
fn build_gpio(_config: &InputConfig) -> Result<Option<Box<dyn InputSource>>> {
    Err(KioskError::Config(
        "GPIO input requested but sparkyd was built without the `gpio` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_source_builds_nothing() {
        let config = InputConfig {
            source: SourceKind::None,
            ..InputConfig::default()
        };
        assert!(build_source(&config).unwrap().is_none());
    }

    #[test]
    fn keyboard_source_builds() {
        let source = build_source(&InputConfig::default()).unwrap().unwrap();
        assert_eq!(source.name(), "keyboard");
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn gpio_without_feature_is_config_error() {
        let config = InputConfig {
            source: SourceKind::Gpio,
            ..InputConfig::default()
        };
        assert!(matches!(build_source(&config), Err(KioskError::Config(_))));
    }
}
