//! Raw input events
//!
//! The subset of libinput's event stream the subsystem acts on, decoded into
//! plain data so the dispatcher does not depend on libinput types.

use std::os::unix::io::RawFd;
use std::path::Path;

use crate::error::Result;

/// Identity of one device object inside the event source
///
/// Ids are never reused; a device that is removed and added again gets a
/// new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

/// Static description of a device, captured when it is added
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Kernel name, e.g. "event3"
    pub sysname: String,
    /// Human readable device name
    pub name: String,
    pub keyboard: bool,
    pub pointer: bool,
    pub touch: bool,
    /// Simultaneous touch contacts (0 = unknown, -1 = not a touch device)
    pub touch_count: i32,
}

/// Decoded input event
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    DeviceAdded {
        device: DeviceId,
        info: DeviceInfo,
    },
    DeviceRemoved {
        device: DeviceId,
    },
    KeyboardKey {
        device: DeviceId,
        key: u32,
        pressed: bool,
    },
    PointerMotion {
        device: DeviceId,
        dx: f64,
        dy: f64,
    },
    PointerButton {
        device: DeviceId,
        pressed: bool,
    },
    /// Absolute position, normalized to 0.0..1.0 of the device range
    PointerMotionAbsolute {
        device: DeviceId,
        x: f64,
        y: f64,
    },
    TouchDown {
        device: DeviceId,
        slot: i32,
        x: f64,
        y: f64,
    },
    TouchMotion {
        device: DeviceId,
        slot: i32,
        x: f64,
        y: f64,
    },
    /// Contact lifted or cancelled
    TouchUp {
        device: DeviceId,
        slot: i32,
    },
    /// Anything else (scroll, gestures, frames, switches)
    Other,
}

impl RawEvent {
    /// Device the event belongs to
    pub fn device(&self) -> Option<DeviceId> {
        match self {
            RawEvent::DeviceAdded { device, .. }
            | RawEvent::DeviceRemoved { device }
            | RawEvent::KeyboardKey { device, .. }
            | RawEvent::PointerMotion { device, .. }
            | RawEvent::PointerButton { device, .. }
            | RawEvent::PointerMotionAbsolute { device, .. }
            | RawEvent::TouchDown { device, .. }
            | RawEvent::TouchMotion { device, .. }
            | RawEvent::TouchUp { device, .. } => Some(*device),
            RawEvent::Other => None,
        }
    }
}

/// Source of raw input events (libinput path context)
pub trait EventSource {
    /// Descriptor that becomes readable when events are pending
    fn as_raw_fd(&self) -> RawFd;

    /// Start reading events from a device node
    ///
    /// A `DeviceAdded` event for the returned id is queued.
    fn add_device(&mut self, node: &Path) -> Option<DeviceId>;

    /// Stop reading a device; a `DeviceRemoved` event is queued
    fn remove_device(&mut self, device: DeviceId);

    /// Read pending data from the kernel into the event queue
    fn dispatch(&mut self) -> Result<()>;

    /// Pop the next queued event
    fn next_event(&mut self) -> Option<RawEvent>;

    /// Stop generating events from all devices
    fn suspend(&mut self);

    /// Resume generating events
    fn resume(&mut self) -> Result<()>;
}
