//! Progress sink for long-running transfers.
//!
//! Core operations report byte counts through this trait instead of
//! writing to a terminal, so the caller decides how (and on which thread)
//! progress is displayed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receives incremental byte counts for one operation at a time.
pub trait Progress: Send + Sync {
    /// Add `bytes` to the amount done so far.
    fn advance(&self, bytes: u64);

    /// Set the total amount expected.
    fn set_maximum(&self, bytes: u64);

    /// The total amount expected, `0` if unknown.
    fn maximum(&self) -> u64;
}

impl<T: Progress + ?Sized> Progress for std::sync::Arc<T> {
    fn advance(&self, bytes: u64) {
        (**self).advance(bytes);
    }
    fn set_maximum(&self, bytes: u64) {
        (**self).set_maximum(bytes);
    }
    fn maximum(&self) -> u64 {
        (**self).maximum()
    }
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn advance(&self, _: u64) {}
    fn set_maximum(&self, _: u64) {}
    fn maximum(&self) -> u64 {
        0
    }
}

/// Keeps running totals; useful for tests and for callers that poll.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    done: AtomicU64,
    maximum: AtomicU64,
    updates: AtomicU64,
}

impl ProgressCounter {
    /// A counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes reported so far.
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Number of `advance` calls received.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Start over for the next operation.
    pub fn reset(&self) {
        self.done.store(0, Ordering::Relaxed);
        self.maximum.store(0, Ordering::Relaxed);
        self.updates.store(0, Ordering::Relaxed);
    }
}

impl Progress for ProgressCounter {
    fn advance(&self, bytes: u64) {
        self.done.fetch_add(bytes, Ordering::Relaxed);
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
    fn set_maximum(&self, bytes: u64) {
        self.maximum.store(bytes, Ordering::Relaxed);
    }
    fn maximum(&self) -> u64 {
        self.maximum.load(Ordering::Relaxed)
    }
}
