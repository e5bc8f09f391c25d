use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cooperative pause/cancel flags shared between the caller and the worker.
/// The worker polls them only at iteration boundaries; nothing in flight is interrupted.
#[derive(Debug, Default)]
pub struct LoopControl {
    paused: AtomicBool,
    cancelled: AtomicBool,
}

/// Result of waiting at an iteration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Proceed,
    Cancelled,
}

impl LoopControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep in `poll` steps while paused. Cancellation wins over pause.
    pub async fn wait_while_paused(&self, poll: Duration) -> Checkpoint {
        loop {
            if self.is_cancelled() {
                return Checkpoint::Cancelled;
            }
            if !self.is_paused() {
                return Checkpoint::Proceed;
            }
            tokio::time::sleep(poll).await;
        }
    }
}
