//! Input device discovery and hotplug detection
//!
//! Enumerates input devices present at start-up and monitors udev for input
//! nodes being plugged and unplugged. Integrates with the host's event loop
//! through a pollable descriptor.

use std::ffi::OsStr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use log::{debug, error, info, trace};

use crate::error::{InputError, Result};

/// udev property list of one device, as (name, value) pairs
pub type Properties = Vec<(String, String)>;

/// Prefix of the evdev nodes libinput can read
pub const EVENT_NODE_PREFIX: &str = "/dev/input/event";

/// Check if a path is an evdev event node
pub fn is_event_node(node: &Path) -> bool {
    node.to_str()
        .map(|s| s.starts_with(EVENT_NODE_PREFIX))
        .unwrap_or(false)
}

/// Hotplug action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugAction {
    Add,
    Remove,
}

/// One add/remove notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub action: HotplugAction,
    pub node: PathBuf,
    pub properties: Properties,
}

/// Device discovery backend
pub trait DeviceMonitor {
    /// Descriptor that becomes readable when notifications are pending
    fn as_raw_fd(&self) -> RawFd;

    /// Next pending add/remove notification (non-blocking)
    fn receive(&mut self) -> Option<Notification>;

    /// Input device nodes present right now, with their properties
    fn enumerate(&self) -> Vec<(PathBuf, Properties)>;

    /// Properties of the input device with the given kernel name
    fn properties(&self, sysname: &str) -> Option<Properties>;
}

fn collect_properties(device: &udev::Device) -> Properties {
    device
        .properties()
        .map(|entry| {
            (
                entry.name().to_string_lossy().into_owned(),
                entry.value().to_string_lossy().into_owned(),
            )
        })
        .collect()
}

/// udev-based monitor for the input subsystem
pub struct UdevMonitor {
    socket: udev::MonitorSocket,
}

impl UdevMonitor {
    /// Create a new hotplug monitor for input devices
    pub fn new() -> Result<Self> {
        let socket = udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_subsystem("input"))
            .and_then(|builder| builder.listen())
            .map_err(InputError::MonitorInit)?;

        // Set non-blocking mode
        let fd = socket.as_raw_fd();
        let flags = nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_GETFL)
            .map_err(|e| InputError::MonitorInit(e.into()))?;
        let mut flags = nix::fcntl::OFlag::from_bits_truncate(flags);
        flags.insert(nix::fcntl::OFlag::O_NONBLOCK);
        nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_SETFL(flags))
            .map_err(|e| InputError::MonitorInit(e.into()))?;

        info!("Input hotplug monitor initialized");
        Ok(Self { socket })
    }
}

impl DeviceMonitor for UdevMonitor {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    fn receive(&mut self) -> Option<Notification> {
        for event in self.socket.iter() {
            let action = match event.event_type() {
                udev::EventType::Add => HotplugAction::Add,
                udev::EventType::Remove => HotplugAction::Remove,
                other => {
                    trace!("Ignoring udev {:?} event", other);
                    continue;
                }
            };
            let Some(node) = event.devnode() else {
                continue;
            };
            debug!("udev {:?}: {}", action, node.display());
            return Some(Notification {
                action,
                node: node.to_path_buf(),
                properties: collect_properties(&event),
            });
        }
        None
    }

    fn enumerate(&self) -> Vec<(PathBuf, Properties)> {
        let scan = udev::Enumerator::new().and_then(|mut enumerator| {
            enumerator.match_subsystem("input")?;
            Ok(enumerator.scan_devices()?.collect::<Vec<_>>())
        });

        let devices = match scan {
            Ok(devices) => devices,
            Err(e) => {
                error!("Can't enumerate input devices: {}", e);
                return Vec::new();
            }
        };

        let mut nodes: Vec<(PathBuf, Properties)> = devices
            .iter()
            .filter_map(|device| {
                let node = device.devnode()?;
                is_event_node(node).then(|| (node.to_path_buf(), collect_properties(device)))
            })
            .collect();
        nodes.sort_by(|a, b| a.0.cmp(&b.0));
        nodes
    }

    fn properties(&self, sysname: &str) -> Option<Properties> {
        let syspath = Path::new("/sys/class/input").join(OsStr::new(sysname));
        match udev::Device::from_syspath(&syspath) {
            Ok(device) => Some(collect_properties(&device)),
            Err(e) => {
                debug!("No udev device for {}: {}", sysname, e);
                None
            }
        }
    }
}
