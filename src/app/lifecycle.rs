use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

/// Lifetime of one screen: owns its timers and tells in-flight work whether
/// its result may still be applied.
#[derive(Clone, Default)]
pub struct ScreenScope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    closed: AtomicBool,
    timers: Mutex<Vec<AbortHandle>>,
}

/// Handle to a timer started with [`ScreenScope::spawn_timer`].
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl ScreenScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Tears the screen down. Pending timers never fire afterwards.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let timers = std::mem::take(&mut *self.timers());
        debug!(timers = timers.len(), "closing screen scope");
        for timer in timers {
            timer.abort();
        }
    }

    /// Runs `fire` after `delay` unless the scope is closed first.
    /// Returns `None` when the scope is already closed.
    pub fn spawn_timer<F>(&self, delay: Duration, fire: F) -> Option<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return None;
        }

        let scope = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !scope.is_closed() {
                fire();
            }
        });
        let abort = task.abort_handle();

        let mut timers = self.timers();
        timers.retain(|timer| !timer.is_finished());
        timers.push(abort.clone());
        Some(TimerHandle { abort })
    }

    fn timers(&self) -> std::sync::MutexGuard<'_, Vec<AbortHandle>> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
