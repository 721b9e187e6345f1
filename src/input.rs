//! Keyboard state tracked across a frame.
//!
//! Keys can be queried as held (down right now) or hit (went down since the
//! last [`Keyboard::end_frame`]).

use std::collections::HashSet;

use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

#[derive(Debug, Default, Clone)]
pub struct Keyboard {
    held: HashSet<KeyCode>,
    hit: HashSet<KeyCode>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a window event. Returns true if it was a keyboard event.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    repeat,
                    ..
                },
            ..
        } = event
        else {
            return false;
        };
        match state {
            ElementState::Pressed if !repeat => self.press(*code),
            ElementState::Pressed => {}
            ElementState::Released => self.release(*code),
        }
        true
    }

    pub fn press(&mut self, code: KeyCode) {
        if self.held.insert(code) {
            self.hit.insert(code);
        }
    }

    pub fn release(&mut self, code: KeyCode) {
        self.held.remove(&code);
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held.contains(&code)
    }

    pub fn key_hit(&self, code: KeyCode) -> bool {
        self.hit.contains(&code)
    }

    /// Forget the keys hit this frame. Held keys stay held.
    pub fn end_frame(&mut self) {
        self.hit.clear();
    }

    pub(crate) fn held_opt(&self, code: Option<KeyCode>) -> bool {
        code.is_some_and(|code| self.is_held(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_lasts_one_frame_held_lasts_until_release() {
        let mut keyboard = Keyboard::new();
        keyboard.press(KeyCode::KeyP);
        assert!(keyboard.key_hit(KeyCode::KeyP));
        assert!(keyboard.is_held(KeyCode::KeyP));

        keyboard.end_frame();
        assert!(!keyboard.key_hit(KeyCode::KeyP));
        assert!(keyboard.is_held(KeyCode::KeyP));

        keyboard.release(KeyCode::KeyP);
        assert!(!keyboard.is_held(KeyCode::KeyP));
    }

    #[test]
    fn pressing_a_held_key_is_not_a_new_hit() {
        let mut keyboard = Keyboard::new();
        keyboard.press(KeyCode::Digit1);
        keyboard.end_frame();
        keyboard.press(KeyCode::Digit1);
        assert!(!keyboard.key_hit(KeyCode::Digit1));
    }

    #[test]
    fn missing_binding_is_never_held() {
        let keyboard = Keyboard::new();
        assert!(!keyboard.held_opt(None));
    }
}
