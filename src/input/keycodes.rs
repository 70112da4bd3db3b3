//! evdev keycode constants
//!
//! Linux input event codes from <linux/input-event-codes.h> that the
//! keyboard translator handles without consulting the keymap.

// ============================================================================
// Editing Keys
// ============================================================================

/// Escape key
pub const KEY_ESC: u32 = 1;

/// Backspace key
pub const KEY_BACKSPACE: u32 = 14;

/// Tab key
pub const KEY_TAB: u32 = 15;

/// Enter key
pub const KEY_ENTER: u32 = 28;

/// Delete key
pub const KEY_DELETE: u32 = 111;

// ============================================================================
// Navigation Keys
// ============================================================================

/// Home key
pub const KEY_HOME: u32 = 102;

/// Up arrow key
pub const KEY_UP: u32 = 103;

/// Left arrow key
pub const KEY_LEFT: u32 = 105;

/// Right arrow key
pub const KEY_RIGHT: u32 = 106;

/// End key
pub const KEY_END: u32 = 107;

/// Down arrow key
pub const KEY_DOWN: u32 = 108;

/// Next (focus forward), sent by some remote controls and handheld keypads
pub const KEY_NEXT: u32 = 0x197;

/// Previous (focus backward)
pub const KEY_PREVIOUS: u32 = 0x19c;

// ============================================================================
// System Keys
// ============================================================================

/// Power button
pub const KEY_POWER: u32 = 116;

// ============================================================================
// Helper Functions
// ============================================================================

/// Offset between evdev keycodes and xkb keycodes
pub const XKB_KEYCODE_OFFSET: u32 = 8;

/// Convert an evdev keycode to the xkb keycode space
#[inline]
pub const fn to_xkb_keycode(keycode: u32) -> u32 {
    keycode + XKB_KEYCODE_OFFSET
}
