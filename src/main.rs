//! bbx-input - headless host for the input device subsystem
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            Event Loop (epoll)            │
//! ├──────────────────────────────────────────┤
//! │  udev monitor  →  libinput path context  │
//! │                          ↓               │
//! │              Device records              │
//! │                          ↓               │
//! │              LogSink (indev reads)       │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Every state change the subsystem synthesizes is logged, which makes the
//! binary useful for checking device classification and coordinate mapping
//! on a new panel.

use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};
use nix::sys::signal::{SigSet, SigmaskHow, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};

use bbx_input::config::Config;
use bbx_input::input::{
    CursorHandle, GroupHandle, IndevData, IndevHandle, IndevKind, InputSink, LibinputSource,
    PollRegistrar, ReadySource, Subsystem, UdevMonitor, Viewport,
};

#[cfg(all(target_os = "linux", feature = "seatd"))]
use bbx_input::session::{SeatSession, SessionEvent};
#[cfg(all(target_os = "linux", feature = "seatd"))]
use std::cell::RefCell;
#[cfg(all(target_os = "linux", feature = "seatd"))]
use std::rc::Rc;

// ============================================================================
// Constants
// ============================================================================

/// epoll tag for the signalfd (ReadySource tags are small integers)
const SIGNAL_TOKEN: u64 = 100;

/// epoll tag for the libseat descriptor
#[cfg(all(target_os = "linux", feature = "seatd"))]
const SEAT_TOKEN: u64 = 101;

/// Maximum epoll events handled per wakeup
const MAX_EVENTS: usize = 16;

// ============================================================================
// Sink
// ============================================================================

/// Input sink that logs every state read
struct LogSink {
    viewport: Viewport,
    next_handle: u32,
    indevs: HashMap<IndevHandle, IndevKind>,
    cursor_visible: bool,
}

impl LogSink {
    fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            next_handle: 1,
            indevs: HashMap::new(),
            cursor_visible: false,
        }
    }
}

impl InputSink for LogSink {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_indev(&mut self, kind: IndevKind) -> Option<IndevHandle> {
        let handle = IndevHandle(self.next_handle);
        self.next_handle += 1;
        self.indevs.insert(handle, kind);
        debug!("indev#{} created ({:?})", handle.0, kind);
        Some(handle)
    }

    fn delete_indev(&mut self, handle: IndevHandle) {
        self.indevs.remove(&handle);
        debug!("indev#{} deleted", handle.0);
    }

    fn read(&mut self, handle: IndevHandle, data: &IndevData) {
        match data {
            IndevData::Pointer { point, state } => {
                info!("indev#{}: ({}, {}) {:?}", handle.0, point.x, point.y, state)
            }
            IndevData::Key { key, state } => {
                info!("indev#{}: {:?} (0x{:x}) {:?}", handle.0, key, key.raw(), state)
            }
        }
    }

    fn create_cursor(&mut self) -> Option<CursorHandle> {
        Some(CursorHandle(0))
    }

    fn set_cursor_visible(&mut self, _cursor: CursorHandle, visible: bool) {
        if self.cursor_visible != visible {
            info!("Cursor {}", if visible { "shown" } else { "hidden" });
        }
        self.cursor_visible = visible;
    }

    fn bind_cursor(&mut self, pointer: IndevHandle, cursor: CursorHandle) {
        debug!("Cursor {} bound to indev#{}", cursor.0, pointer.0);
    }

    fn create_group(&mut self) -> Option<GroupHandle> {
        Some(GroupHandle(0))
    }

    fn set_group(&mut self, keypad: IndevHandle, group: GroupHandle) {
        debug!("indev#{} joined group {}", keypad.0, group.0);
    }
}

// ============================================================================
// Event loop
// ============================================================================

/// epoll set the subsystem registers its descriptors with
struct EventLoop {
    epoll: Epoll,
}

impl EventLoop {
    fn new() -> Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).context("Failed to create epoll")?;
        Ok(Self { epoll })
    }

    fn add(&self, fd: RawFd, token: u64) -> io::Result<()> {
        // The descriptors outlive the loop: they belong to the subsystem,
        // the signalfd and the seat, all dropped after the loop ends
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll
            .add(fd, EpollEvent::new(EpollFlags::EPOLLIN, token))
            .map_err(io::Error::from)
    }

    fn wait(&self, events: &mut [EpollEvent]) -> nix::Result<usize> {
        self.epoll.wait(events, -1)
    }
}

impl PollRegistrar for EventLoop {
    fn register(&mut self, fd: RawFd, source: ReadySource) -> io::Result<()> {
        trace!("Registering fd {} as {:?}", fd, source);
        self.add(fd, source.token())
    }
}

/// Block SIGINT/SIGTERM and receive them through a signalfd
fn shutdown_signals() -> Result<SignalFd> {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_swap_mask(SigmaskHow::SIG_BLOCK)
        .context("Failed to block signals")?;
    SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
        .context("Failed to create signalfd")
}

// ============================================================================
// Command line
// ============================================================================

/// Print help message
fn print_help() {
    println!(
        r#"bbx-input {} - input device subsystem host

USAGE:
    bbx-input [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -c, --config PATH       Use this config file
    -v                      Log connected devices and events (-vv: debug)

CONFIG LOOKUP:
    $BBX_INPUT_CONFIG
    ~/.config/bbx-input/config.toml
    /etc/bbx-input/config.toml"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Value of `--config PATH` / `--config=PATH`
fn config_arg(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "-c" {
            return iter.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

/// Number of `v`s across `-v`, `-vv`, ...
fn verbosity(args: &[String]) -> usize {
    args.iter()
        .filter(|a| a.len() > 1 && a.starts_with('-') && a[1..].chars().all(|c| c == 'v'))
        .map(|a| a.len() - 1)
        .sum()
}

fn main() -> Result<()> {
    // Check command line arguments
    let args: Vec<String> = std::env::args().skip(1).collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("bbx-input {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let default_filter = match verbosity(&args) {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    info!("bbx-input starting...");

    let config = match config_arg(&args) {
        Some(path) => Config::load_or_default(&path),
        None => Config::load(),
    };
    let options = config.subsystem_options();
    let sink = LogSink::new(config.display.viewport());

    let mut signal_fd = shutdown_signals()?;
    let mut event_loop = EventLoop::new()?;
    event_loop
        .add(signal_fd.as_raw_fd(), SIGNAL_TOKEN)
        .context("Failed to register signalfd")?;

    #[cfg(all(target_os = "linux", feature = "seatd"))]
    let seat_session = {
        info!("Opening libseat session...");
        let session = Rc::new(RefCell::new(
            SeatSession::open().context("Failed to open libseat session")?,
        ));
        let seat_fd = session.borrow_mut().get_fd()?;
        event_loop
            .add(seat_fd, SEAT_TOKEN)
            .context("Failed to register seat fd")?;
        // Devices can only be opened once the seat is enabled
        session.borrow_mut().dispatch()?;
        session
    };

    #[cfg(all(target_os = "linux", feature = "seatd"))]
    let source = LibinputSource::with_seat(seat_session.clone())
        .context("Failed to create libinput context")?;

    #[cfg(not(all(target_os = "linux", feature = "seatd")))]
    let source = LibinputSource::new()
        .context("Failed to create libinput context. Root privileges may be required.")?;

    let monitor = UdevMonitor::new().context("Failed to create udev monitor")?;

    let mut subsystem = Subsystem::init(source, monitor, sink, &mut event_loop, &options)
        .context("Failed to initialize input subsystem")?;
    subsystem.set_power_key_callback(|| info!("Power key pressed"));

    if subsystem.registered_sources() < 2 {
        warn!("Hotplug monitoring unavailable; only present devices are used");
    }
    if !subsystem.is_keyboard_connected() {
        info!("No hardware keyboard connected");
    }

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

    let mut events = [EpollEvent::empty(); MAX_EVENTS];
    'main: loop {
        let count = match event_loop.wait(&mut events) {
            Ok(count) => count,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e).context("epoll_wait failed"),
        };

        for event in &events[..count] {
            match event.data() {
                SIGNAL_TOKEN => {
                    if let Ok(Some(info)) = signal_fd.read_signal() {
                        info!("Received signal {}, shutting down", info.ssi_signo);
                    }
                    break 'main;
                }
                #[cfg(all(target_os = "linux", feature = "seatd"))]
                SEAT_TOKEN => {
                    if let Err(e) = seat_session.borrow_mut().dispatch() {
                        warn!("{:#}", e);
                    }
                    loop {
                        let session_event = seat_session.borrow().try_recv_event();
                        match session_event {
                            Some(SessionEvent::Disable) => subsystem.suspend(),
                            Some(SessionEvent::Enable) => {
                                if let Err(e) = subsystem.resume() {
                                    warn!("Failed to resume input: {}", e);
                                }
                            }
                            None => break,
                        }
                    }
                }
                token => match ReadySource::from_token(token) {
                    Some(ready) => subsystem.dispatch(ready),
                    None => trace!("Unknown epoll token {}", token),
                },
            }
        }
    }

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
    info!("bbx-input exiting");
    Ok(())
}
