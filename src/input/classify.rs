//! Device classification
//!
//! Decide what kind of input device a udev node is from its property list.
//! udev marks input devices with `ID_INPUT=1` and one or more class flags
//! (`ID_INPUT_KEYBOARD`, `ID_INPUT_MOUSE`, ...). Devices can carry several
//! class flags at once (a keyboard is also `ID_INPUT_KEY`), so the result
//! follows a fixed precedence rather than the order udev lists them in.

use std::fmt;

use bitflags::bitflags;

/// Device capability assigned once when a device is first seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Not an input device, or no class this subsystem handles
    Unsupported,
    /// Keys only (power button, lid switch keys, volume rocker)
    BareKey,
    /// Full keyboard
    Keyboard,
    /// Relative pointer
    Mouse,
    /// Touchpad (absolute or relative pointer)
    Touchpad,
    /// Touchscreen
    Touchscreen,
}

impl Capability {
    /// Mouse and touchpad devices drive the shared cursor
    pub fn shows_cursor(self) -> bool {
        matches!(self, Capability::Mouse | Capability::Touchpad)
    }

    /// Check if devices of this class pass the filter
    ///
    /// Bare-key devices are always admitted: they carry the power key.
    pub fn is_allowed(self, filter: CapabilityFilter) -> bool {
        match self {
            Capability::Unsupported => false,
            Capability::BareKey => true,
            Capability::Keyboard => filter.contains(CapabilityFilter::KEYBOARD),
            Capability::Mouse | Capability::Touchpad => filter.contains(CapabilityFilter::POINTER),
            Capability::Touchscreen => filter.contains(CapabilityFilter::TOUCH),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Unsupported => "unsupported",
            Capability::BareKey => "key",
            Capability::Keyboard => "keyboard",
            Capability::Mouse => "mouse",
            Capability::Touchpad => "touchpad",
            Capability::Touchscreen => "touchscreen",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Device categories the host allows to connect
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CapabilityFilter: u8 {
        const KEYBOARD = 0b001;
        const POINTER  = 0b010;
        const TOUCH    = 0b100;
    }
}

impl Default for CapabilityFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl CapabilityFilter {
    /// Build a filter from the three `[input]` config switches
    pub fn from_switches(keyboard: bool, pointer: bool, touchscreen: bool) -> Self {
        let mut filter = Self::empty();
        filter.set(Self::KEYBOARD, keyboard);
        filter.set(Self::POINTER, pointer);
        filter.set(Self::TOUCH, touchscreen);
        filter
    }
}

/// Class flags in precedence order, most specific first
const CLASS_PRECEDENCE: [(&str, Capability); 5] = [
    ("ID_INPUT_TOUCHSCREEN", Capability::Touchscreen),
    ("ID_INPUT_TOUCHPAD", Capability::Touchpad),
    ("ID_INPUT_MOUSE", Capability::Mouse),
    ("ID_INPUT_KEYBOARD", Capability::Keyboard),
    ("ID_INPUT_KEY", Capability::BareKey),
];

/// Classify a device from its udev properties
///
/// Accepts any `(name, value)` sequence so both udev property lists and
/// test fixtures can be passed directly.
pub fn classify<I, K, V>(properties: I) -> Capability
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut is_input = false;
    let mut found = [false; CLASS_PRECEDENCE.len()];

    for (name, value) in properties {
        if value.as_ref() != "1" {
            continue;
        }
        let name = name.as_ref();
        if name == "ID_INPUT" {
            is_input = true;
        } else if let Some(idx) = CLASS_PRECEDENCE.iter().position(|(flag, _)| *flag == name) {
            found[idx] = true;
        }
    }

    if !is_input {
        return Capability::Unsupported;
    }

    CLASS_PRECEDENCE
        .iter()
        .zip(found)
        .find(|(_, hit)| *hit)
        .map(|((_, cap), _)| *cap)
        .unwrap_or(Capability::Unsupported)
}
