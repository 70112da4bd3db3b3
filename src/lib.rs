//! bbx-input - input device subsystem for touch-first Linux UIs
//!
//! Discovers keyboards, mice, touchpads and touchscreens, follows hotplug,
//! and turns libinput events into pointer and keypad state for a UI toolkit
//! implementing [`input::InputSink`].

pub mod config;
pub mod error;
pub mod input;
pub mod session;

pub use error::{InputError, Result};
