//! Input handling
//!
//! Connect keyboards, mice, touchpads and touchscreens to a UI input sink.
//! - Device discovery and hotplug via udev
//! - Event reading via libinput (path backend)
//! - Key translation via xkbcommon

pub mod classify;
pub mod cursor;
pub mod event;
pub mod hotplug;
pub mod keyboard;
pub mod keycodes;
pub mod libinput;
pub mod poll;
pub mod record;
pub mod sink;
pub mod subsystem;

pub use classify::{classify, Capability, CapabilityFilter};
pub use event::{DeviceId, DeviceInfo, EventSource, RawEvent};
pub use hotplug::{DeviceMonitor, HotplugAction, Notification, Properties, UdevMonitor};
pub use keyboard::{KeyCode, KeyEvent, KeyState, Keymap, KeymapSpec, XkbKeymap};
pub use libinput::LibinputSource;
pub use poll::{PollRegistrar, ReadySource};
pub use sink::{
    CursorHandle, GroupHandle, IndevData, IndevHandle, IndevKind, IndevState, InputSink, Point,
    Viewport,
};
pub use subsystem::{DeviceCounts, Subsystem, SubsystemOptions};
