//! Cooperative cancellation for a single compilation job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CResult, CompileError};

/// Shared flag checked between files and declarations. Clones observe the
/// same flag, so a host can keep one clone and hand the other to the job.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    requested: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> CResult<()> {
        if self.is_requested() {
            Err(CompileError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(token.check().is_ok());

        handle.request();
        assert!(token.is_requested());
        assert!(matches!(token.check(), Err(CompileError::Cancelled)));

        token.reset();
        assert!(!handle.is_requested());
    }

    #[test]
    fn test_separate_tokens_are_independent() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        a.request();
        assert!(!b.is_requested());
    }
}
