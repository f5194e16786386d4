use super::{Button, Edge, InputEvent, InputSource};
use crate::config::schema::InputConfig;
use crate::error::{KioskError, Result};
use rppal::gpio::{Gpio, InputPin, Level, Trigger};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Physical push buttons on BCM GPIO pins.
pub struct GpioSource {
    power_pin: u8,
    toggle_pin: u8,
    pull_up: bool,
}

impl GpioSource {
    pub fn from_config(config: &InputConfig) -> Self {
        Self {
            power_pin: config.power_pin,
            toggle_pin: config.toggle_pin,
            pull_up: config.pull_up,
        }
    }

    fn watch_pin(
        &self,
        gpio: &Gpio,
        pin: u8,
        button: Button,
        tx: mpsc::Sender<InputEvent>,
    ) -> Result<InputPin> {
        let pin = gpio.get(pin).map_err(|e| KioskError::Gpio(format!("pin {pin}: {e}")))?;

        let mut pin = if self.pull_up {
            pin.into_input_pullup()
        } else {
            pin.into_input_pulldown()
        };

        // With a pull-up the button shorts the pin to ground when pressed.
        let pressed_level = if self.pull_up { Level::Low } else { Level::High };

        pin.set_async_interrupt(Trigger::Both, move |level| {
            let edge = if level == pressed_level {
                Edge::Press
            } else {
                Edge::Release
            };
            debug!("{button:?} {edge:?}");
            // Runs on the rppal interrupt thread, outside the runtime.
            if let Err(e) = tx.blocking_send(InputEvent { button, edge }) {
                error!("error sending gpio edge: {e}");
            }
        })
        .map_err(|e| KioskError::Gpio(e.to_string()))?;

        Ok(pin)
    }
}

impl InputSource for GpioSource {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn start(
        self: Box<Self>,
        tx: mpsc::Sender<InputEvent>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let gpio = Gpio::new().map_err(|e| KioskError::Gpio(e.to_string()))?;

        let power = self.watch_pin(&gpio, self.power_pin, Button::Power, tx.clone())?;
        let toggle = self.watch_pin(&gpio, self.toggle_pin, Button::Toggle, tx)?;
        info!(
            "watching GPIO buttons: power={} toggle={}",
            self.power_pin, self.toggle_pin
        );

        // The pins must stay in scope for their interrupts to keep firing.
        Ok(tokio::spawn(async move {
            let _pins = (power, toggle);
            cancel.cancelled().await;
            info!("GPIO input shutting down");
        }))
    }
}
