//! Cooperative cancellation tokens (spec §5 "Cancellation").
//!
//! Cancelling a queued-but-not-written command removes it with zero bytes
//! written (invariant I7). Cancelling the head of the queue does NOT abort
//! the in-flight AT exchange — the modem would be left undefined — instead
//! the cancellation is recorded and the eventual response is discarded
//! when it arrives.

use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(std::sync::atomic::Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let t = CancellationToken::new();
        assert!(!t.is_cancelled());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let t = CancellationToken::new();
        let clone = t.clone();
        clone.cancel();
        assert!(t.is_cancelled());
    }
}
