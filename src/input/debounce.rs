use super::{Action, Button, Edge, InputEvent};
use tracing::trace;

/// Two-state (idle/pressed) latch for one logical button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pressed: bool,
}

impl ButtonState {
    pub const fn is_pressed(self) -> bool {
        self.pressed
    }

    /// Returns `true` only on the idle → pressed transition.
    pub fn press(&mut self) -> bool {
        !std::mem::replace(&mut self.pressed, true)
    }

    /// Returns `true` only on the pressed → idle transition.
    pub fn release(&mut self) -> bool {
        std::mem::replace(&mut self.pressed, false)
    }
}

/// Turns raw edges into idempotent domain actions.
///
/// Key repeat and bouncing contacts produce runs of identical edges; only the
/// first edge of a run emits anything. A release with no prior press is
/// silently ignored.
#[derive(Debug, Default)]
pub struct DebouncedButtons {
    power: ButtonState,
    toggle: ButtonState,
}

impl DebouncedButtons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, button: Button) -> ButtonState {
        match button {
            Button::Power => self.power,
            Button::Toggle => self.toggle,
        }
    }

    /// Whether POWER is currently held, i.e. the screen should be off.
    pub fn power_held(&self) -> bool {
        self.power.is_pressed()
    }

    pub fn handle(&mut self, event: InputEvent) -> Option<Action> {
        match event.edge {
            Edge::Press => self.on_press(event.button),
            Edge::Release => self.on_release(event.button),
        }
    }

    pub fn on_press(&mut self, button: Button) -> Option<Action> {
        let state = self.state_mut(button);
        if !state.press() {
            trace!("{button:?} already pressed, ignoring");
            return None;
        }
        match button {
            Button::Power => Some(Action::PowerOff),
            Button::Toggle => Some(Action::AdvanceToNext),
        }
    }

    pub fn on_release(&mut self, button: Button) -> Option<Action> {
        let state = self.state_mut(button);
        if !state.release() {
            trace!("{button:?} not pressed, ignoring release");
            return None;
        }
        match button {
            Button::Power => Some(Action::PowerOn),
            Button::Toggle => None,
        }
    }

    fn state_mut(&mut self, button: Button) -> &mut ButtonState {
        match button {
            Button::Power => &mut self.power,
            Button::Toggle => &mut self.toggle,
        }
    }
}
