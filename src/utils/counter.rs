//! A simple counter for tracking batch operation results.
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

/// A counter for tracking batch operation results.
pub struct Counter {
    ok: AtomicUsize,
    error: AtomicUsize,
    warning: AtomicUsize,
}

impl Counter {
    /// Creates a new Counter instance.
    pub fn new() -> Self {
        Self {
            ok: AtomicUsize::new(0),
            error: AtomicUsize::new(0),
            warning: AtomicUsize::new(0),
        }
    }

    /// Increments the count of successful operations.
    pub fn inc_ok(&self) {
        self.ok.fetch_add(1, SeqCst);
    }

    /// Increments the count of errors.
    pub fn inc_error(&self) {
        self.error.fetch_add(1, SeqCst);
    }

    /// Increments the count of warnings.
    pub fn inc_warning(&self) {
        self.warning.fetch_add(1, SeqCst);
    }

    /// Returns the number of warnings recorded so far.
    pub fn warnings(&self) -> usize {
        self.warning.load(SeqCst)
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OK: {}, Error: {}, Warning: {}",
            self.ok.load(SeqCst),
            self.error.load(SeqCst),
            self.warning.load(SeqCst),
        )
    }
}
