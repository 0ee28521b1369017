//! Cooperative cancellation signals.
//!
//! Signals are polled, never awaited: the copy loop checks them between
//! chunks, so an in-flight chunk always completes before cancellation
//! takes effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Something that can be asked whether the current operation should stop.
pub trait CancelSignal {
    /// Returns true once the operation should stop at the next chunk boundary.
    fn is_cancelled(&self) -> bool;
}

/// A signal that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl CancelSignal for Never {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancelSignal for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// A point in time after which the operation is cancelled.
///
/// Optionally linked to a token so that explicit cancellation still
/// works before the deadline passes.
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    token: Option<CancellationToken>,
}

impl Deadline {
    /// Deadline at a fixed instant.
    pub fn at(at: Instant) -> Self {
        Self { at, token: None }
    }

    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// Also fire when `token` is cancelled.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// The instant at which this deadline expires.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left until expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

impl CancelSignal for Deadline {
    fn is_cancelled(&self) -> bool {
        if Instant::now() >= self.at {
            return true;
        }
        self.token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
