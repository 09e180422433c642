/// Platform-agnostic input handling system
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Logical keys the simulation reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveKey {
    Forward,
    Backward,
    Left,
    Right,
    Brake,
    ToggleCamera,
}

/// Platform-independent input events
#[derive(Debug, Clone)]
pub enum InputEvent {
    // Keyboard events
    KeyDown(String),
    KeyUp(String),

    // Pointer motion, only meaningful while the pointer is captured
    MouseMove { dx: f32, dy: f32 },

    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
    PointerLockChanged { locked: bool },
}

/// Key mapping configuration. Key names are compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: Vec<String>,
    pub backward: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub brake: Vec<String>,
    pub toggle_camera: Vec<String>,
    pub escape: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let keys = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            forward: keys(&["w", "arrowup"]),
            backward: keys(&["s", "arrowdown"]),
            left: keys(&["a", "arrowleft"]),
            right: keys(&["d", "arrowright"]),
            brake: keys(&[" "]),
            toggle_camera: keys(&["p", "c", "v"]),
            escape: "escape".to_string(),
        }
    }
}

impl KeyBindings {
    fn keys_for(&self, key: DriveKey) -> &[String] {
        match key {
            DriveKey::Forward => &self.forward,
            DriveKey::Backward => &self.backward,
            DriveKey::Left => &self.left,
            DriveKey::Right => &self.right,
            DriveKey::Brake => &self.brake,
            DriveKey::ToggleCamera => &self.toggle_camera,
        }
    }

    /// Map a raw key name to the logical key bound to it
    pub fn resolve(&self, key: &str) -> Option<DriveKey> {
        [
            DriveKey::Forward,
            DriveKey::Backward,
            DriveKey::Left,
            DriveKey::Right,
            DriveKey::Brake,
            DriveKey::ToggleCamera,
        ]
        .into_iter()
        .find(|k| self.keys_for(*k).iter().any(|b| b.eq_ignore_ascii_case(key)))
    }

    pub fn is_escape(&self, key: &str) -> bool {
        key.eq_ignore_ascii_case(&self.escape)
    }
}

/// Keyboard and pointer state, fed by events and read once per frame
pub struct InputState {
    /// Raw key names currently held, lower-cased
    pub pressed_keys: HashSet<String>,
    pub look_delta: (f32, f32),
    pub pointer_locked: bool,
    camera_toggle_pending: bool,
    bindings: KeyBindings,
}

impl InputState {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            pressed_keys: HashSet::new(),
            look_delta: (0.0, 0.0),
            pointer_locked: false,
            camera_toggle_pending: false,
            bindings,
        }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                let newly_pressed = self.pressed_keys.insert(key.to_lowercase());
                // auto-repeat keydowns must not flip the camera back and forth
                if newly_pressed && self.bindings.resolve(key) == Some(DriveKey::ToggleCamera) {
                    self.camera_toggle_pending = true;
                }
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(&key.to_lowercase());
            }
            InputEvent::MouseMove { dx, dy } => {
                if self.pointer_locked {
                    self.look_delta.0 += dx;
                    self.look_delta.1 += dy;
                }
            }
            InputEvent::FocusLost => {
                self.clear_keys();
            }
            InputEvent::VisibilityChanged { visible: _ } => {
                self.clear_keys();
            }
            InputEvent::PointerLockChanged { locked } => {
                self.pointer_locked = *locked;
                if !locked {
                    self.look_delta = (0.0, 0.0);
                }
            }
        }
    }

    /// True while any key bound to `key` is held
    pub fn is_held(&self, key: DriveKey) -> bool {
        self.bindings
            .keys_for(key)
            .iter()
            .any(|k| self.pressed_keys.contains(&k.to_lowercase()))
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn consume_look(&mut self) -> (f32, f32) {
        let result = self.look_delta;
        self.look_delta = (0.0, 0.0);
        result
    }

    /// Returns whether a camera toggle was requested since the last call
    pub fn take_camera_toggle(&mut self) -> bool {
        std::mem::take(&mut self.camera_toggle_pending)
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(KeyBindings::default())
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::{KeyboardEvent, MouseEvent};

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }

    pub fn mouse_move_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::MouseMove {
            dx: e.movement_x() as f32,
            dy: e.movement_y() as f32,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::*;
    use winit::keyboard::KeyCode;

    /// Browser-style key name for a physical key, so one set of bindings
    /// serves both platforms
    pub fn key_name(code: KeyCode) -> Option<String> {
        let name = match code {
            KeyCode::ArrowUp => "arrowup",
            KeyCode::ArrowDown => "arrowdown",
            KeyCode::ArrowLeft => "arrowleft",
            KeyCode::ArrowRight => "arrowright",
            KeyCode::Space => " ",
            KeyCode::Escape => "escape",
            KeyCode::Enter => "enter",
            KeyCode::ShiftLeft | KeyCode::ShiftRight => "shift",
            other => {
                // KeyA..KeyZ and Digit0..Digit9
                let debug = format!("{other:?}");
                let tail = debug
                    .strip_prefix("Key")
                    .or_else(|| debug.strip_prefix("Digit"))
                    .filter(|t| t.len() == 1)?;
                return Some(tail.to_lowercase());
            }
        };
        Some(name.to_string())
    }

    pub fn key_to_input(code: KeyCode, pressed: bool) -> Option<InputEvent> {
        let key = key_name(code)?;
        Some(if pressed {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        })
    }
}
