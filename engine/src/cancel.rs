//! Cancellation for operations that outlive their caller.
//!
//! A [`Cancellation`] is shared between the task running an operation and
//! the party waiting on it. Exactly one side wins: either the worker reaches
//! its commit point first and the operation runs to completion, or the
//! waiter cancels first and the worker rolls back without writing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

const PENDING: u8 = 0;
const COMMITTING: u8 = 1;
const CANCELLED: u8 = 2;

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    state: Arc<AtomicU8>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker side. Returns `false` if the operation was already cancelled,
    /// in which case nothing may be written.
    pub fn begin_commit(&self) -> bool {
        self.transition(COMMITTING)
    }

    /// Waiter side. Returns `false` if the worker already passed its commit
    /// point; the operation's own outcome then stands.
    pub fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn transition(&self, to: u8) -> bool {
        match self
            .state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            // Repeated calls from the side that already won are idempotent.
            Err(current) => current == to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_first_blocks_cancel() {
        let token = Cancellation::new();
        assert!(token.begin_commit());
        assert!(!token.cancel());
        assert!(!token.is_cancelled());
        assert!(token.begin_commit());
    }

    #[test]
    fn cancel_first_blocks_commit() {
        let token = Cancellation::new();
        let worker = token.clone();
        assert!(token.cancel());
        assert!(worker.is_cancelled());
        assert!(!worker.begin_commit());
        assert!(token.cancel());
    }
}
