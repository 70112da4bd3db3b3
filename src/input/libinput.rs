//! libinput event source
//!
//! Use a libinput path context to read events from the /dev/input/eventN
//! nodes the subsystem attaches, and decode them into `RawEvent`s.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::Path;

use input::event::device::DeviceEvent;
use input::event::keyboard::{KeyState, KeyboardEvent, KeyboardEventTrait};
use input::event::pointer::{ButtonState, PointerEvent};
use input::event::touch::{TouchEvent, TouchEventPosition, TouchEventSlot};
use input::event::{Event, EventTrait};
use input::{Device, DeviceCapability, Libinput, LibinputInterface};
use log::{debug, trace, warn};

#[cfg(all(target_os = "linux", feature = "seatd"))]
use std::cell::RefCell;
#[cfg(all(target_os = "linux", feature = "seatd"))]
use std::rc::Rc;
#[cfg(all(target_os = "linux", feature = "seatd"))]
use crate::session::SeatSession;

use super::event::{DeviceId, DeviceInfo, EventSource, RawEvent};
use crate::error::{InputError, Result};

/// LibinputInterface implementation opening device nodes directly
struct InputInterface;

impl LibinputInterface for InputInterface {
    fn open_restricted(&mut self, path: &Path, flags: i32) -> std::result::Result<OwnedFd, i32> {
        let f = OpenOptions::new()
            .read(true)
            .write((flags & libc::O_WRONLY != 0) || (flags & libc::O_RDWR != 0))
            .custom_flags(flags & !libc::O_WRONLY & !libc::O_RDWR & !libc::O_RDONLY)
            .open(path)
            .map_err(|e| {
                warn!("Cannot open device: {:?}: {}", path, e);
                e.raw_os_error().unwrap_or(-libc::ENOENT)
            })?;
        Ok(OwnedFd::from(f))
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        drop(fd);
    }
}

/// LibinputInterface implementation using libseat for device access
#[cfg(all(target_os = "linux", feature = "seatd"))]
struct SeatInputInterface {
    session: Rc<RefCell<SeatSession>>,
}

#[cfg(all(target_os = "linux", feature = "seatd"))]
impl LibinputInterface for SeatInputInterface {
    fn open_restricted(&mut self, path: &Path, _flags: i32) -> std::result::Result<OwnedFd, i32> {
        let mut session = self.session.borrow_mut();
        match session.open_device(path) {
            Ok(device) => Ok(device.fd),
            Err(e) => {
                warn!("libseat: Cannot open device {:?}: {}", path, e);
                Err(-libc::EACCES)
            }
        }
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        drop(fd);
    }
}

/// libinput path context plus device id bookkeeping
pub struct LibinputSource {
    input: Libinput,
    fd: RawFd,
    /// Live libinput devices and the ids handed out for them
    devices: HashMap<Device, DeviceId>,
    next_id: u64,
}

impl LibinputSource {
    /// Create a path context that opens devices directly (requires root or
    /// membership of the input group)
    pub fn new() -> Result<Self> {
        Self::from_context(Libinput::new_from_path(InputInterface))
    }

    /// Create a path context that opens devices through libseat
    #[cfg(all(target_os = "linux", feature = "seatd"))]
    pub fn with_seat(session: Rc<RefCell<SeatSession>>) -> Result<Self> {
        Self::from_context(Libinput::new_from_path(SeatInputInterface { session }))
    }

    fn from_context(input: Libinput) -> Result<Self> {
        let fd = input.as_raw_fd();

        // Set fd to non-blocking
        let flags = nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_GETFL)
            .map_err(|e| InputError::SourceInit(format!("F_GETFL failed: {}", e)))?;
        let mut flags = nix::fcntl::OFlag::from_bits_truncate(flags);
        flags.insert(nix::fcntl::OFlag::O_NONBLOCK);
        nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_SETFL(flags))
            .map_err(|e| InputError::SourceInit(format!("F_SETFL failed: {}", e)))?;

        debug!("libinput path context created (fd={})", fd);

        Ok(Self {
            input,
            fd,
            devices: HashMap::new(),
            next_id: 1,
        })
    }

    fn id_for(&mut self, device: &Device) -> DeviceId {
        if let Some(id) = self.devices.get(device) {
            return *id;
        }
        let id = DeviceId(self.next_id);
        self.next_id += 1;
        self.devices.insert(device.clone(), id);
        id
    }

    fn known_id(&self, device: &Device) -> Option<DeviceId> {
        self.devices.get(device).copied()
    }

    fn decode(&mut self, event: Event) -> RawEvent {
        match event {
            Event::Device(DeviceEvent::Added(e)) => {
                let device = e.device();
                let info = device_info(&device);
                RawEvent::DeviceAdded {
                    device: self.id_for(&device),
                    info,
                }
            }
            Event::Device(DeviceEvent::Removed(e)) => match self.devices.remove(&e.device()) {
                Some(device) => RawEvent::DeviceRemoved { device },
                None => RawEvent::Other,
            },
            Event::Keyboard(KeyboardEvent::Key(k)) => match self.known_id(&k.device()) {
                Some(device) => RawEvent::KeyboardKey {
                    device,
                    key: k.key(),
                    pressed: k.key_state() == KeyState::Pressed,
                },
                None => RawEvent::Other,
            },
            Event::Pointer(ptr_event) => {
                let Some(device) = self.known_id(&ptr_event.device()) else {
                    return RawEvent::Other;
                };
                match ptr_event {
                    PointerEvent::Motion(m) => RawEvent::PointerMotion {
                        device,
                        dx: m.dx(),
                        dy: m.dy(),
                    },
                    PointerEvent::MotionAbsolute(m) => RawEvent::PointerMotionAbsolute {
                        device,
                        x: m.absolute_x_transformed(1),
                        y: m.absolute_y_transformed(1),
                    },
                    PointerEvent::Button(b) => RawEvent::PointerButton {
                        device,
                        pressed: b.button_state() == ButtonState::Pressed,
                    },
                    _ => RawEvent::Other,
                }
            }
            Event::Touch(touch_event) => {
                let Some(device) = self.known_id(&touch_event.device()) else {
                    return RawEvent::Other;
                };
                match touch_event {
                    TouchEvent::Down(t) => RawEvent::TouchDown {
                        device,
                        slot: slot_index(t.slot()),
                        x: t.x_transformed(1),
                        y: t.y_transformed(1),
                    },
                    TouchEvent::Motion(t) => RawEvent::TouchMotion {
                        device,
                        slot: slot_index(t.slot()),
                        x: t.x_transformed(1),
                        y: t.y_transformed(1),
                    },
                    TouchEvent::Up(t) => RawEvent::TouchUp {
                        device,
                        slot: slot_index(t.slot()),
                    },
                    TouchEvent::Cancel(t) => RawEvent::TouchUp {
                        device,
                        slot: slot_index(t.slot()),
                    },
                    _ => RawEvent::Other,
                }
            }
            other => {
                trace!("Unhandled libinput event: {:?}", other);
                RawEvent::Other
            }
        }
    }
}

/// libinput reports no slot (-1) for single-touch devices
fn slot_index(slot: Option<u32>) -> i32 {
    slot.map(|s| s.min(i32::MAX as u32) as i32).unwrap_or(-1)
}

fn device_info(device: &Device) -> DeviceInfo {
    let touch = device.has_capability(DeviceCapability::Touch);
    let touch_count = if touch {
        device.clone().touch_count().map_or(-1, |n| n.min(i32::MAX as u32) as i32)
    } else {
        -1
    };
    DeviceInfo {
        sysname: device.sysname().to_string(),
        name: device.name().to_string(),
        keyboard: device.has_capability(DeviceCapability::Keyboard),
        pointer: device.has_capability(DeviceCapability::Pointer),
        touch,
        touch_count,
    }
}

impl EventSource for LibinputSource {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    fn add_device(&mut self, node: &Path) -> Option<DeviceId> {
        let path = node.to_str()?;
        let device = self.input.path_add_device(path)?;
        let id = self.id_for(&device);
        debug!("Input device added: {} (id={})", path, id.0);
        Some(id)
    }

    fn remove_device(&mut self, device: DeviceId) {
        let found = self
            .devices
            .iter()
            .find(|(_, id)| **id == device)
            .map(|(dev, _)| dev.clone());
        if let Some(dev) = found {
            debug!("Input device removed: {} (id={})", dev.sysname(), device.0);
            self.input.path_remove_device(dev);
        }
    }

    fn dispatch(&mut self) -> Result<()> {
        self.input.dispatch()?;
        Ok(())
    }

    fn next_event(&mut self) -> Option<RawEvent> {
        let event = self.input.next()?;
        Some(self.decode(event))
    }

    fn suspend(&mut self) {
        self.input.suspend();
    }

    fn resume(&mut self) -> Result<()> {
        self.input.resume().map_err(|_| InputError::Resume)
    }
}
