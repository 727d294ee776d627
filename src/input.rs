// ============================================================================
// input.rs — shader-fluid
// Edge-triggered key handling: collects the intents pressed since the last
// frame.
// ============================================================================

use winit::keyboard::{Key, NamedKey};

use crate::config::StepKey;

/// Keys the simulation reacts to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyPress {
    Space,
    ArrowRight,
    Escape,
    F12,
    Char(char),
}

impl KeyPress {
    pub fn from_winit(key: &Key) -> Option<Self> {
        match key {
            Key::Named(NamedKey::Space) => Some(KeyPress::Space),
            Key::Named(NamedKey::ArrowRight) => Some(KeyPress::ArrowRight),
            Key::Named(NamedKey::Escape) => Some(KeyPress::Escape),
            Key::Named(NamedKey::F12) => Some(KeyPress::F12),
            // Some platforms report space as a character.
            Key::Character(c) if c.as_str() == " " => Some(KeyPress::Space),
            Key::Character(c) => c.chars().next().map(|ch| KeyPress::Char(ch.to_ascii_lowercase())),
            _ => None,
        }
    }
}

/// Intents gathered during one frame. Each is a press-this-frame flag.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Intents {
    pub toggle_pause: bool,
    pub step: bool,
    pub reset: bool,
    pub export: bool,
    pub quit: bool,
}

pub struct InputController {
    step_key: StepKey,
    pending: Intents,
}

impl InputController {
    pub fn new(step_key: StepKey) -> Self {
        Self {
            step_key,
            pending: Intents::default(),
        }
    }

    /// Records a key press. Callers must filter out releases and auto-repeat.
    pub fn key_pressed(&mut self, key: KeyPress) {
        match key {
            KeyPress::Space => self.pending.toggle_pause = true,
            KeyPress::ArrowRight if self.step_key == StepKey::ArrowRight => {
                self.pending.step = true
            }
            KeyPress::Char('n') if self.step_key == StepKey::N => self.pending.step = true,
            KeyPress::Char('r') => self.pending.reset = true,
            KeyPress::F12 => self.pending.export = true,
            KeyPress::Escape => self.pending.quit = true,
            _ => {}
        }
    }

    /// Returns and clears the intents collected since the last call.
    pub fn take(&mut self) -> Intents {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_keys_to_intents() {
        let mut input = InputController::new(StepKey::ArrowRight);
        input.key_pressed(KeyPress::Space);
        input.key_pressed(KeyPress::Char('r'));
        input.key_pressed(KeyPress::ArrowRight);
        assert_eq!(
            input.take(),
            Intents {
                toggle_pause: true,
                step: true,
                reset: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn intents_are_edge_triggered() {
        let mut input = InputController::new(StepKey::ArrowRight);
        input.key_pressed(KeyPress::Space);
        assert!(input.take().toggle_pause);
        assert_eq!(input.take(), Intents::default());
    }

    #[test]
    fn step_key_depends_on_variant() {
        let mut arrow = InputController::new(StepKey::ArrowRight);
        arrow.key_pressed(KeyPress::Char('n'));
        assert!(!arrow.take().step);

        let mut letter = InputController::new(StepKey::N);
        letter.key_pressed(KeyPress::ArrowRight);
        assert!(!letter.take().step);
        letter.key_pressed(KeyPress::Char('n'));
        assert!(letter.take().step);
    }

    #[test]
    fn converts_winit_keys() {
        assert_eq!(
            KeyPress::from_winit(&Key::Named(NamedKey::Space)),
            Some(KeyPress::Space)
        );
        assert_eq!(
            KeyPress::from_winit(&Key::Character("R".into())),
            Some(KeyPress::Char('r'))
        );
        assert_eq!(KeyPress::from_winit(&Key::Named(NamedKey::Tab)), None);
    }
}
