use core::sync::atomic::{AtomicBool, Ordering};

/// Stop request shared between a running minimization and its caller.
///
/// One token belongs to one top-level solve. The minimizer sets it itself
/// when the termination predicate fires or the iteration cap is reached,
/// and polls it before every iteration. Setting it from another thread
/// stops the run at the next check.
#[derive(Debug, Default)]
pub struct CancellationToken {
    stop: AtomicBool,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the solve to stop.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Clear a previous request so the token can be used for another solve.
    pub fn reset(&self) {
        self.stop.store(false, Ordering::Release);
    }
}

#[test]
fn cancel_and_reset() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
    token.cancel();
    assert!(token.is_cancelled());
    token.reset();
    assert!(!token.is_cancelled());
}
