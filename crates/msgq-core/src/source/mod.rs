//! Snapshot sources for kernel message queue state.
//!
//! A [`SnapshotSource`] produces the raw text report that a
//! [`QueueParser`](crate::parser::QueueParser) turns into queue records.
//! The production source runs `ipcs -q`; tests use [`MockSource`].

mod cached;
mod command;
pub mod mock;

use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

pub use cached::CachedSource;
pub use command::CommandSource;
pub use mock::MockSource;

/// Raw text output of the queue listing command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSnapshot(String);

impl RawSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RawSnapshot {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Failure to obtain a snapshot from the listing command.
///
/// Every variant means the same thing to the collector: the scrape failed and
/// liveness drops to 0.
#[derive(Debug)]
pub enum CaptureError {
    /// Binary missing or not executable.
    Spawn { program: String, source: io::Error },
    /// Command ran but exited unsuccessfully.
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    /// Reading the command output or waiting on it failed.
    Io(io::Error),
    /// Command did not finish before the deadline and was killed.
    TimedOut { program: String, after: Duration },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Spawn { program, source } => {
                write!(f, "failed to execute '{}': {}", program, source)
            }
            CaptureError::Exit {
                program,
                status,
                stderr,
            } => {
                if stderr.is_empty() {
                    write!(f, "'{}' exited with {}", program, status)
                } else {
                    write!(f, "'{}' exited with {}: {}", program, status, stderr)
                }
            }
            CaptureError::Io(e) => write!(f, "I/O error: {}", e),
            CaptureError::TimedOut { program, after } => {
                write!(f, "'{}' timed out after {:?}", program, after)
            }
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Spawn { source, .. } => Some(source),
            CaptureError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CaptureError {
    fn from(e: io::Error) -> Self {
        CaptureError::Io(e)
    }
}

/// Produces a fresh raw snapshot of message queue state.
///
/// Implementations must be safe to call from several scrape threads at once.
pub trait SnapshotSource: Send + Sync + fmt::Debug {
    /// Captures the current queue listing.
    ///
    /// Blocks the calling thread for as long as the underlying command runs.
    fn capture(&self) -> Result<RawSnapshot, CaptureError>;
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Box<S> {
    fn capture(&self) -> Result<RawSnapshot, CaptureError> {
        (**self).capture()
    }
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for std::sync::Arc<S> {
    fn capture(&self) -> Result<RawSnapshot, CaptureError> {
        (**self).capture()
    }
}
