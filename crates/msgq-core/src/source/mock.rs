//! In-memory snapshot source for testing collectors without `ipcs`.
//!
//! `MockSource` replays a canned report (or a canned failure) and counts how
//! often it was asked, so tests can run on any platform and in CI.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use super::{CaptureError, RawSnapshot, SnapshotSource};

/// `ipcs -q` output from a Linux host with three queues.
pub const TYPICAL_IPCS_OUTPUT: &str = "
------ Message Queues --------
key        msqid      owner      perms      used-bytes   messages
0x00000000 0          nagios     600        0            0
0x1a2b3c4d 32769      nagios     660        4096         42
0x5e6f7a8b 65538      postgres   600        128          3

";

/// `ipcs -q` output from a Linux host with no queues.
pub const EMPTY_IPCS_OUTPUT: &str = "
------ Message Queues --------
key        msqid      owner      perms      used-bytes   messages

";

#[derive(Debug, Clone)]
enum Outcome {
    Output(String),
    MissingBinary,
}

/// Snapshot source that replays a fixed outcome.
#[derive(Debug)]
pub struct MockSource {
    outcome: Outcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Always returns `output`.
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Output(output.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails as if the `ipcs` binary were absent.
    pub fn failing() -> Self {
        Self {
            outcome: Outcome::MissingBinary,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Three queues, see [`TYPICAL_IPCS_OUTPUT`].
    pub fn typical_queues() -> Self {
        Self::with_output(TYPICAL_IPCS_OUTPUT)
    }

    /// Header only, see [`EMPTY_IPCS_OUTPUT`].
    pub fn no_queues() -> Self {
        Self::with_output(EMPTY_IPCS_OUTPUT)
    }

    /// Sleeps for `delay` on every capture, to simulate a slow command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of captures performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for MockSource {
    fn capture(&self) -> Result<RawSnapshot, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        match &self.outcome {
            Outcome::Output(text) => Ok(RawSnapshot::new(text.clone())),
            Outcome::MissingBinary => Err(CaptureError::Spawn {
                program: "ipcs".to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }
}
