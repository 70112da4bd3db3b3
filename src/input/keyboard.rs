//! Hardware keyboard translation
//!
//! Turn evdev key transitions into toolkit keys. Navigation and editing keys
//! map to fixed semantic keys; everything else goes through xkbcommon, which
//! tracks modifier state per device and produces UTF-8 text.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use xkbcommon::xkb;

use super::keycodes::*;
use super::sink::IndevState;
use crate::error::{InputError, Result};

/// Key delivered to a keypad indev
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCode {
    Up,
    Down,
    Right,
    Left,
    Esc,
    Del,
    Backspace,
    Enter,
    /// Move focus forward
    Next,
    /// Move focus backward
    Prev,
    Home,
    End,
    /// Text produced by the keymap
    Text(SmolStr),
}

impl KeyCode {
    /// 32-bit toolkit key value
    ///
    /// Text is packed as up to four UTF-8 bytes, little-endian.
    pub fn raw(&self) -> u32 {
        match self {
            KeyCode::Up => 17,
            KeyCode::Down => 18,
            KeyCode::Right => 19,
            KeyCode::Left => 20,
            KeyCode::Esc => 27,
            KeyCode::Del => 127,
            KeyCode::Backspace => 8,
            KeyCode::Enter => 10,
            KeyCode::Next => 9,
            KeyCode::Prev => 11,
            KeyCode::Home => 2,
            KeyCode::End => 3,
            KeyCode::Text(text) => {
                let mut buf = [0u8; 4];
                let bytes = text.as_bytes();
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                u32::from_le_bytes(buf)
            }
        }
    }
}

/// Translated key transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub state: IndevState,
}

/// xkb rule names used to compile the hardware keymap
///
/// Empty strings select the xkb defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapSpec {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: String,
}

/// Per-device keyboard state (modifiers, locks, group)
pub trait KeyState {
    /// UTF-8 produced by `keycode` in the current state (empty if none)
    fn key_get_utf8(&self, keycode: u32) -> String;

    /// Record a key transition
    fn update_key(&mut self, keycode: u32, pressed: bool);
}

/// Compiled keymap shared by all keyboards
pub trait Keymap {
    /// Fresh state for a newly connected keyboard
    fn new_state(&self) -> Option<Box<dyn KeyState>>;
}

/// xkbcommon keymap
pub struct XkbKeymap {
    keymap: xkb::Keymap,
}

impl XkbKeymap {
    /// Compile a keymap from rule names
    pub fn compile(spec: &KeymapSpec) -> Result<Self> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let options = if spec.options.is_empty() {
            None
        } else {
            Some(spec.options.clone())
        };

        let keymap = xkb::Keymap::new_from_names(
            &context,
            &spec.rules,
            &spec.model,
            &spec.layout,
            &spec.variant,
            options,
            xkb::COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| {
            InputError::Keymap(format!(
                "{}:{}:{}:{}:{}",
                spec.rules, spec.model, spec.layout, spec.variant, spec.options
            ))
        })?;

        Ok(Self { keymap })
    }
}

impl Keymap for XkbKeymap {
    fn new_state(&self) -> Option<Box<dyn KeyState>> {
        Some(Box::new(XkbKeyState(xkb::State::new(&self.keymap))))
    }
}

struct XkbKeyState(xkb::State);

impl KeyState for XkbKeyState {
    fn key_get_utf8(&self, keycode: u32) -> String {
        self.0.key_get_utf8(xkb::Keycode::new(to_xkb_keycode(keycode)))
    }

    fn update_key(&mut self, keycode: u32, pressed: bool) {
        let direction = if pressed {
            xkb::KeyDirection::Down
        } else {
            xkb::KeyDirection::Up
        };
        self.0
            .update_key(xkb::Keycode::new(to_xkb_keycode(keycode)), direction);
    }
}

/// Fixed navigation/editing keys, independent of layout and modifiers
fn fixed_key(keycode: u32) -> Option<KeyCode> {
    let key = match keycode {
        KEY_UP => KeyCode::Up,
        KEY_DOWN => KeyCode::Down,
        KEY_RIGHT => KeyCode::Right,
        KEY_LEFT => KeyCode::Left,
        KEY_ESC => KeyCode::Esc,
        KEY_DELETE => KeyCode::Del,
        KEY_BACKSPACE => KeyCode::Backspace,
        KEY_ENTER => KeyCode::Enter,
        KEY_NEXT | KEY_TAB => KeyCode::Next,
        KEY_PREVIOUS => KeyCode::Prev,
        KEY_HOME => KeyCode::Home,
        KEY_END => KeyCode::End,
        _ => return None,
    };
    Some(key)
}

/// Power key handler
pub type PowerKeyCallback = Box<dyn FnMut()>;

/// Key translator shared by all keyboards
#[derive(Default)]
pub struct Translator {
    power_key_cb: Option<PowerKeyCallback>,
}

impl Translator {
    pub fn set_power_key_callback(&mut self, callback: PowerKeyCallback) {
        self.power_key_cb = Some(callback);
    }

    /// Translate one key transition
    ///
    /// `state` is the device's keymap state, absent for bare-key devices or
    /// when no keymap is configured. It is updated for every transition, even
    /// those that produce no event.
    pub fn translate(
        &mut self,
        mut state: Option<&mut (dyn KeyState + 'static)>,
        keycode: u32,
        pressed: bool,
    ) -> Option<KeyEvent> {
        let key = match fixed_key(keycode) {
            Some(key) => Some(key),
            None if keycode == KEY_POWER => {
                if pressed {
                    if let Some(cb) = self.power_key_cb.as_mut() {
                        cb();
                    }
                }
                None
            }
            None => state
                .as_deref()
                .map(|s| s.key_get_utf8(keycode))
                .filter(|text| !text.is_empty())
                .map(|text| KeyCode::Text(SmolStr::new(text))),
        };

        if let Some(state) = state.as_deref_mut() {
            state.update_key(keycode, pressed);
        }

        key.map(|key| KeyEvent {
            key,
            state: IndevState::from_pressed(pressed),
        })
    }
}
