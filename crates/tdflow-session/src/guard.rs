use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Marks a window after a notebook push during which observed remote
/// changes are our own echo.
///
/// Each [`SyncGuard::engage`] extends the window to `settle_delay` from now.
#[derive(Clone, Debug)]
pub struct SyncGuard {
    settle_delay: Duration,
    until: Arc<Mutex<Option<Instant>>>,
}

impl SyncGuard {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            until: Arc::new(Mutex::new(None)),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn engage(&self) {
        let deadline = Instant::now() + self.settle_delay;
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        if until.is_none_or(|current| current < deadline) {
            *until = Some(deadline);
        }
    }

    pub fn is_active(&self) -> bool {
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        match *until {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                *until = None;
                false
            }
            None => false,
        }
    }

    pub fn release(&self) {
        *self.until.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
