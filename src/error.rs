//! Input subsystem error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for input subsystem operations
pub type Result<T> = std::result::Result<T, InputError>;

/// Input subsystem errors
#[derive(Error, Debug)]
pub enum InputError {
    /// libinput context could not be created
    #[error("Could not create libinput context: {0}")]
    SourceInit(String),

    /// udev monitor could not be created
    #[error("Could not create udev monitor: {0}")]
    MonitorInit(#[source] std::io::Error),

    /// xkb keymap compilation failed
    #[error("Can't compile xkb rule names: {0}")]
    Keymap(String),

    /// Device has no capability this subsystem handles
    #[error("{0} is not a supported input device")]
    Unsupported(PathBuf),

    /// Input sink refused to allocate a handle
    #[error("Out of memory while connecting {0}")]
    OutOfMemory(String),

    /// Device reported capabilities but none of the expected slots exist
    #[error("{0} does not have required capabilities")]
    NoUsableSlot(String),

    /// Input sink could not create the keyboard focus group
    #[error("Can't create the keyboard input group")]
    Group,

    /// libinput rejected a device node
    #[error("libinput can't use {0}")]
    DeviceAdd(PathBuf),

    /// Descriptor registration with the host poller failed
    #[error("Could not register {what} with the poller: {source}")]
    Register {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// libinput could not resume
    #[error("libinput resume failed")]
    Resume,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
