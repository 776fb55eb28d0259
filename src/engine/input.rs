// Input state tracking for keyboard and mouse wheel
// Abstracts winit events into a queryable per-frame snapshot, and reduces
// it to the intents the scene consumes.

use std::collections::HashSet;
use std::f32::consts::{FRAC_PI_2, PI};
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Planar move request for the player, one flag per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub forward: bool,
    pub left: bool,
    pub back: bool,
    pub right: bool,
}

impl MoveIntent {
    /// Heading of the first set flag in the order forward, left, back,
    /// right. Forward is -Z, right is +X.
    pub fn heading(&self) -> Option<f32> {
        if self.forward {
            Some(PI)
        } else if self.left {
            Some(-FRAC_PI_2)
        } else if self.back {
            Some(0.0)
        } else if self.right {
            Some(FRAC_PI_2)
        } else {
            None
        }
    }
}

pub struct InputState {
    // Keyboard
    keys_held: HashSet<KeyCode>,

    // Scroll: accumulated vertical scroll this frame, reset in end_frame()
    pub scroll_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys_held: HashSet::new(),
            scroll_delta: 0.0,
        }
    }

    /// Feed a winit WindowEvent into the input state.
    /// Call this once per event before the game's own event handling.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.set_key(key, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.scroll_delta += y;
            }
            WindowEvent::Focused(false) => {
                // Releases are lost while unfocused.
                self.keys_held.clear();
            }
            _ => {}
        }
    }

    pub fn set_key(&mut self, key: KeyCode, held: bool) {
        if held {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
        }
    }

    /// Call once per frame after update() and render() have consumed input.
    /// Resets per-frame accumulators.
    pub fn end_frame(&mut self) {
        self.scroll_delta = 0.0;
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// WASD (or arrow keys) as a move intent.
    pub fn move_intent(&self) -> MoveIntent {
        let held = |a, b| self.is_key_held(a) || self.is_key_held(b);
        MoveIntent {
            forward: held(KeyCode::KeyW, KeyCode::ArrowUp),
            left: held(KeyCode::KeyA, KeyCode::ArrowLeft),
            back: held(KeyCode::KeyS, KeyCode::ArrowDown),
            right: held(KeyCode::KeyD, KeyCode::ArrowRight),
        }
    }

    /// -1, 0 or 1: camera orbit direction from Q/E.
    pub fn camera_turn(&self) -> f32 {
        let mut turn = 0.0;
        if self.is_key_held(KeyCode::KeyQ) { turn -= 1.0; }
        if self.is_key_held(KeyCode::KeyE) { turn += 1.0; }
        turn
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_priority() {
        let all = MoveIntent { forward: true, left: true, back: true, right: true };
        assert_eq!(all.heading(), Some(PI));
        let lb = MoveIntent { left: true, back: true, ..Default::default() };
        assert_eq!(lb.heading(), Some(-FRAC_PI_2));
        let br = MoveIntent { back: true, right: true, ..Default::default() };
        assert_eq!(br.heading(), Some(0.0));
        let r = MoveIntent { right: true, ..Default::default() };
        assert_eq!(r.heading(), Some(FRAC_PI_2));
        assert_eq!(MoveIntent::default().heading(), None);
    }

    #[test]
    fn test_keys_map_to_intent() {
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, true);
        input.set_key(KeyCode::ArrowRight, true);
        let intent = input.move_intent();
        assert!(intent.forward && intent.right);
        assert!(!intent.left && !intent.back);

        input.set_key(KeyCode::KeyW, false);
        assert!(!input.move_intent().forward);
    }

    #[test]
    fn test_camera_turn() {
        let mut input = InputState::new();
        assert_eq!(input.camera_turn(), 0.0);
        input.set_key(KeyCode::KeyQ, true);
        assert_eq!(input.camera_turn(), -1.0);
        input.set_key(KeyCode::KeyE, true);
        assert_eq!(input.camera_turn(), 0.0);
    }

    #[test]
    fn test_end_frame_resets_scroll() {
        let mut input = InputState::new();
        input.scroll_delta = 2.0;
        input.end_frame();
        assert_eq!(input.scroll_delta, 0.0);
    }
}
