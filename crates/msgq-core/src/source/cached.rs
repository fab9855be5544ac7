//! Snapshot caching with a staleness bound.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use super::{CaptureError, RawSnapshot, SnapshotSource};

/// Reuses a successful snapshot for up to `ttl`.
///
/// The lock is held across the inner capture, so concurrent scrapes that find
/// the cache stale wait for the one in-flight command instead of spawning
/// their own. Failures are never cached.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    last: Mutex<Option<(Instant, RawSnapshot)>>,
}

impl<S: SnapshotSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            last: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SnapshotSource> SnapshotSource for CachedSource<S> {
    fn capture(&self) -> Result<RawSnapshot, CaptureError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((taken_at, snapshot)) = last.as_ref()
            && taken_at.elapsed() < self.ttl
        {
            trace!(age_ms = taken_at.elapsed().as_millis() as u64, "reusing cached snapshot");
            return Ok(snapshot.clone());
        }

        match self.inner.capture() {
            Ok(snapshot) => {
                *last = Some((Instant::now(), snapshot.clone()));
                Ok(snapshot)
            }
            Err(e) => {
                *last = None;
                Err(e)
            }
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for CachedSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSource")
            .field("inner", &self.inner)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
