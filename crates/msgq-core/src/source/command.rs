//! Snapshot source backed by an external command (`ipcs -q` by default).

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{CaptureError, RawSnapshot, SnapshotSource};

/// Interval between `try_wait` polls while a deadline is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

type PipeOutput = Receiver<io::Result<Vec<u8>>>;

/// Runs the queue listing command once per capture and returns its stdout.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for CommandSource {
    fn default() -> Self {
        Self::ipcs("ipcs")
    }
}

impl CommandSource {
    /// Creates a source running `program` with no arguments and no timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Creates a source running `<program> -q`.
    pub fn ipcs(program: impl Into<String>) -> Self {
        Self::new(program).with_args(["-q"])
    }

    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kills the command if it runs longer than `timeout`.
    ///
    /// A zero duration disables the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn spawn(&self) -> Result<Child, CaptureError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    fn timed_out(&self) -> CaptureError {
        CaptureError::TimedOut {
            program: self.program.clone(),
            after: self.timeout.unwrap_or_default(),
        }
    }
}

impl SnapshotSource for CommandSource {
    fn capture(&self) -> Result<RawSnapshot, CaptureError> {
        let started = Instant::now();
        let deadline = self.timeout.map(|t| started + t);
        let mut child = self.spawn()?;

        // Drain both pipes on their own threads so a chatty command cannot
        // block on a full pipe while we wait for it to exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match deadline {
            None => child.wait()?,
            Some(deadline) => loop {
                if let Some(status) = child.try_wait()? {
                    break status;
                }
                if Instant::now() >= deadline {
                    kill(&mut child, &self.program);
                    return Err(self.timed_out());
                }
                thread::sleep(POLL_INTERVAL);
            },
        };

        // A background process forked by the command can hold the pipes open
        // after it exits, so the deadline also bounds reading its output.
        let stdout = match collect(stdout, deadline) {
            Some(output) => output.map_err(CaptureError::Io)?,
            None => return Err(self.timed_out()),
        };
        let stderr = collect(stderr, deadline)
            .and_then(Result::ok)
            .unwrap_or_default();

        if !status.success() {
            return Err(CaptureError::Exit {
                program: self.program.clone(),
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        debug!(
            program = %self.program,
            bytes = stdout.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "captured queue listing"
        );

        Ok(RawSnapshot::new(String::from_utf8_lossy(&stdout)))
    }
}

fn kill(child: &mut Child, program: &str) {
    if let Err(e) = child.kill() {
        warn!(program = %program, error = %e, "failed to kill timed out command");
    }
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> PipeOutput {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let read = pipe.read_to_end(&mut buf).map(|_| buf);
        let _ = tx.send(read);
    });
    rx
}

/// Waits for a drained pipe until `deadline`; `None` means the deadline passed.
///
/// The reader thread is left behind on timeout and exits once the pipe closes.
fn collect(output: Option<PipeOutput>, deadline: Option<Instant>) -> Option<io::Result<Vec<u8>>> {
    let Some(rx) = output else {
        return Some(Ok(Vec::new()));
    };
    let received = match deadline {
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
    };
    match received {
        Ok(read) => Some(read),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Err(io::Error::other("output reader panicked"))),
    }
}
