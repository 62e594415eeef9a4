use std::cell::RefCell;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A re-armable one-shot timer for coalescing bursts of events.
///
/// Each `schedule` aborts the previously armed callback, so only the last one
/// scheduled within the window ever runs. Callbacks run as local tasks; the
/// debouncer must be used from within a `tokio::task::LocalSet`.
pub struct Debouncer {
    delay: Duration,
    pending: RefCell<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: RefCell::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.cancel();
        let delay = self.delay;
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        *self.pending.borrow_mut() = Some(handle);
    }

    /// Abort the armed callback, if any. Returns true if one was still waiting.
    pub fn cancel(&self) -> bool {
        let previous = self.pending.borrow_mut().take();
        match previous {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
