//! libseat session backend
//!
//! Provides rootless input device access via seatd or logind.

use std::cell::RefCell;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc;

use anyhow::{Context, Result};
use libseat::{Seat, SeatEvent, SeatRef};
use log::{debug, info, warn};

/// Session event from libseat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Seat acquired; input may be resumed
    Enable,
    /// Seat lost (VT switch); input must be suspended
    Disable,
}

/// Input node opened via libseat
pub struct SeatDevice {
    /// Duplicated descriptor, owned by libinput once handed over
    pub fd: OwnedFd,
}

/// libseat session
pub struct SeatSession {
    seat: Seat,
    active: Rc<RefCell<bool>>,
    event_rx: mpsc::Receiver<SessionEvent>,
}

impl SeatSession {
    /// Open a new seat session
    pub fn open() -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel();
        let active = Rc::new(RefCell::new(false));
        let active_cb = active.clone();

        let mut seat = Seat::open(move |seat_ref: &mut SeatRef, event: SeatEvent| match event {
            SeatEvent::Enable => {
                info!("libseat: session enabled");
                *active_cb.borrow_mut() = true;
                let _ = event_tx.send(SessionEvent::Enable);
            }
            SeatEvent::Disable => {
                info!("libseat: session disabled");
                *active_cb.borrow_mut() = false;
                // Must call disable() to acknowledge
                if let Err(e) = seat_ref.disable() {
                    warn!("libseat: failed to disable seat: {}", e);
                }
                let _ = event_tx.send(SessionEvent::Disable);
            }
        })
        .context("Failed to open libseat session")?;

        info!("libseat: opened seat '{}'", seat.name());

        Ok(Self {
            seat,
            active,
            event_rx,
        })
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Pollable descriptor for event loop integration
    pub fn get_fd(&mut self) -> Result<RawFd> {
        let borrowed_fd = self.seat.get_fd().context("Failed to get seat fd")?;
        Ok(borrowed_fd.as_raw_fd())
    }

    /// Dispatch pending seat events (call when the fd is readable)
    pub fn dispatch(&mut self) -> Result<()> {
        self.seat
            .dispatch(0)
            .context("Failed to dispatch seat events")?;
        Ok(())
    }

    /// Next session event (non-blocking)
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Open an input device node
    ///
    /// The descriptor is only usable while the session is active.
    pub fn open_device<P: AsRef<Path>>(&mut self, path: P) -> Result<SeatDevice> {
        let path = path.as_ref();
        let device = self
            .seat
            .open_device(&path)
            .with_context(|| format!("Failed to open device: {}", path.display()))?;

        let raw_fd = device.as_fd().as_raw_fd();
        debug!("libseat: opened {} (fd={})", path.display(), raw_fd);

        // libseat keeps its own descriptor; libinput closes the duplicate
        let dup_fd = nix::unistd::dup(raw_fd).context("Failed to dup device fd")?;
        let fd = unsafe { OwnedFd::from_raw_fd(dup_fd) };

        Ok(SeatDevice { fd })
    }
}

impl Drop for SeatSession {
    fn drop(&mut self) {
        info!("libseat: closing session");
    }
}
