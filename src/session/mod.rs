//! Seat session
//!
//! Opening /dev/input/eventN directly needs root or the input group. With the
//! `seatd` feature, device nodes are opened through libseat instead, and the
//! session's enable/disable notifications drive input suspend and resume.

#[cfg(all(target_os = "linux", feature = "seatd"))]
mod seatd;
#[cfg(all(target_os = "linux", feature = "seatd"))]
pub use seatd::{SeatDevice, SeatSession, SessionEvent};
