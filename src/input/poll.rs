//! Poll registration
//!
//! The subsystem exposes two descriptors. The host adds them to its own
//! poller, tagged with the `ReadySource` they belong to, and hands the tag
//! back to `Subsystem::dispatch` when the descriptor becomes readable.

use std::io;
use std::os::unix::io::RawFd;

/// Which subsystem descriptor became readable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadySource {
    /// libinput event queue
    InputEvents,
    /// udev hotplug notifications
    Hotplug,
}

impl ReadySource {
    /// Tag for poller user data (e.g. `epoll_event.data`)
    pub const fn token(self) -> u64 {
        match self {
            ReadySource::InputEvents => 1,
            ReadySource::Hotplug => 2,
        }
    }

    pub const fn from_token(token: u64) -> Option<Self> {
        match token {
            1 => Some(ReadySource::InputEvents),
            2 => Some(ReadySource::Hotplug),
            _ => None,
        }
    }
}

/// Host poller accepting subsystem descriptors
pub trait PollRegistrar {
    fn register(&mut self, fd: RawFd, source: ReadySource) -> io::Result<()>;
}
