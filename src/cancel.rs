use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Teardown flag shared between a component and the async work it started.
///
/// Every pending operation checks the flag before applying its result, so
/// nothing is written once the owning component is gone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        *self.inner.cancelled.lock() = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Sleeps for up to `timeout`, returning early with `true` on cancellation.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        if !*cancelled {
            self.inner
                .wake
                .wait_while_for(&mut cancelled, |cancelled| !*cancelled, timeout);
        }
        *cancelled
    }
}
