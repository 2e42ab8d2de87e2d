//! Channel transport abstraction
//!
//! The broker never touches sample storage itself. Everything it needs from
//! the backing store goes through [`Transport`] (path existence and open) and
//! [`Channel`] (read, write, control, readiness). Two implementations ship
//! with the crate:
//!
//! - [`MemoryTransport`]: in-process channels, used by tests and by
//!   single-process deployments
//! - [`ShmTransport`]: file-backed shared memory, visible to every process
//!   that opens the same root directory

pub mod control;
pub mod memory;
pub mod shm;

use std::{io, time::Duration};

pub use control::{ControlOp, ControlReply, RawState, RegisterInfo};
pub use memory::{MemoryChannel, MemoryTransport};
pub use shm::{ShmChannel, ShmTransport};

/// How a channel is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Write-only, counted as an advertiser
    Advertiser,
    /// Read-only, counted as a subscriber
    Subscriber,
    /// Control access only; not counted in either role
    Probe,
    /// Registration endpoint access
    Control,
}

impl OpenMode {
    /// Get a human-readable name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            OpenMode::Advertiser => "advertiser",
            OpenMode::Subscriber => "subscriber",
            OpenMode::Probe => "probe",
            OpenMode::Control => "control",
        }
    }
}

/// Options passed to [`Transport::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Attachment mode
    pub mode: OpenMode,
    /// Do not inherit the attachment across process replacement
    pub cloexec: bool,
}

impl OpenOptions {
    /// Open write-only as an advertiser
    pub fn advertiser() -> Self {
        Self {
            mode: OpenMode::Advertiser,
            cloexec: true,
        }
    }

    /// Open read-only as a subscriber
    pub fn subscriber() -> Self {
        Self {
            mode: OpenMode::Subscriber,
            cloexec: true,
        }
    }

    /// Open for control operations only
    pub fn probe() -> Self {
        Self {
            mode: OpenMode::Probe,
            cloexec: true,
        }
    }

    /// Open the registration endpoint
    pub fn control() -> Self {
        Self {
            mode: OpenMode::Control,
            cloexec: true,
        }
    }
}

/// One open attachment to a channel
///
/// Dropping a channel releases it. [`Channel::close`] does the same but
/// reports the outcome.
pub trait Channel: Send {
    /// Write one sample, returning the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read one sample into `buf`, returning the number of bytes copied
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Issue a control operation
    fn control(&mut self, op: ControlOp) -> io::Result<ControlReply>;

    /// Wait up to `timeout` for unread data; a zero timeout never blocks
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Release the attachment
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Creates and opens channels by path
pub trait Transport: Send + Sync {
    /// Channel type produced by [`Transport::open`]
    type Channel: Channel;

    /// Whether anything exists at `path`
    fn exists(&self, path: &str) -> bool;

    /// Open `path` with the given options
    fn open(&self, path: &str, options: &OpenOptions) -> io::Result<Self::Channel>;
}

pub(crate) fn permission_denied(mode: OpenMode, action: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("cannot {} on a {} attachment", action, mode.name()),
    )
}

pub(crate) fn unsupported(op: &ControlOp) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("control operation {} not supported here", op.name()),
    )
}
