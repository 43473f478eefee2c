use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set-once stop flag shared with whoever can interrupt a run. The loop
/// polls it between steps; an action already in flight always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    flag: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
