use super::{Button, InputEvent, InputSource};
use crate::config::schema::InputConfig;
use crate::error::{KioskError, Result};
use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Parse a key name from the config ("space", "right", "a", ...).
pub fn parse_key_name(name: &str) -> Option<KeyCode> {
    let lower = name.trim().to_ascii_lowercase();
    let code = match lower.as_str() {
        "space" => KeyCode::Char(' '),
        "right" => KeyCode::Right,
        "left" => KeyCode::Left,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c != 'q' => KeyCode::Char(c),
                _ => return None,
            }
        }
    };
    Some(code)
}

/// Simulated buttons read from the controlling terminal.
pub struct KeyboardSource {
    power: KeyCode,
    toggle: KeyCode,
}

impl KeyboardSource {
    /// # Errors
    /// Returns `KioskError::Config` if a key name is not recognised.
    pub fn from_config(config: &InputConfig) -> Result<Self> {
        let parse = |name: &str| {
            parse_key_name(name)
                .ok_or_else(|| KioskError::Config(format!("unknown key name: {name}")))
        };
        Ok(Self {
            power: parse(&config.power_key)?,
            toggle: parse(&config.toggle_key)?,
        })
    }

    fn button_for(&self, code: KeyCode) -> Option<Button> {
        let code = match code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        if code == self.power {
            Some(Button::Power)
        } else if code == self.toggle {
            Some(Button::Toggle)
        } else {
            None
        }
    }
}

impl InputSource for KeyboardSource {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn start(
        self: Box<Self>,
        tx: mpsc::Sender<InputEvent>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let guard = RawModeGuard::enter()?;
        info!(
            "keyboard input ready ({} key releases)",
            if guard.enhanced { "reporting" } else { "latching" }
        );

        Ok(tokio::spawn(async move {
            let mut translator = KeyTranslator::new(*self, guard.enhanced);
            let mut events = EventStream::new();

            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.next() => event,
                };

                let key = match event {
                    Some(Ok(Event::Key(key))) => key,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("terminal read error: {e}");
                        break;
                    }
                    None => break,
                };

                if is_quit(&key) {
                    info!("quit key pressed, shutting down");
                    cancel.cancel();
                    break;
                }

                for input in translator.translate(&key) {
                    debug!("{:?} {:?}", input.button, input.edge);
                    if tx.send(input).await.is_err() {
                        return;
                    }
                }
            }

            drop(guard);
        }))
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    key.kind != KeyEventKind::Release
        && (key.code == KeyCode::Char('q')
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)))
}

/// Maps terminal key events onto button edges.
///
/// Terminals that report key releases map 1:1 (repeats become repeated
/// presses). Without release reporting, TOGGLE is momentary and POWER
/// latches: one press holds it, the next press lets go.
struct KeyTranslator {
    keys: KeyboardSource,
    enhanced: bool,
    power_latched: bool,
}

impl KeyTranslator {
    fn new(keys: KeyboardSource, enhanced: bool) -> Self {
        Self {
            keys,
            enhanced,
            power_latched: false,
        }
    }

    fn translate(&mut self, key: &KeyEvent) -> Vec<InputEvent> {
        let Some(button) = self.keys.button_for(key.code) else {
            return Vec::new();
        };

        if self.enhanced {
            return match key.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => vec![InputEvent::press(button)],
                KeyEventKind::Release => vec![InputEvent::release(button)],
            };
        }

        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        match button {
            Button::Toggle => vec![InputEvent::press(button), InputEvent::release(button)],
            Button::Power => {
                self.power_latched = !self.power_latched;
                if self.power_latched {
                    vec![InputEvent::press(button)]
                } else {
                    vec![InputEvent::release(button)]
                }
            }
        }
    }
}

/// Puts the terminal in raw mode and restores it on drop.
struct RawModeGuard {
    enhanced: bool,
}

impl RawModeGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().map_err(|e| KioskError::Terminal(e.to_string()))?;

        let enhanced = matches!(terminal::supports_keyboard_enhancement(), Ok(true))
            && execute!(
                std::io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();

        Ok(Self { enhanced })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = terminal::disable_raw_mode();
    }
}
