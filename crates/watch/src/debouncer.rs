//! Coalesces a burst of triggers into one deferred callback.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

type Callback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Timer {
    handle: JoinHandle<()>,
    generation: u64,
}

/// Coalesces a burst of [`Debouncer::trigger`] calls into a single callback
/// invocation after `delay` of quiet.
///
/// `Trigger`, `stop`, and `flush` are all safe to call concurrently from
/// multiple threads/tasks. The callback runs as its own spawned task, never
/// while the debouncer's internal lock is held — so it's safe for the
/// callback to call back into `trigger`/`stop`/`flush` itself.
pub struct Debouncer {
    delay: Duration,
    callback: Callback,
    // Never held across an `.await`. Only ever guards swapping/inspecting
    // the current timer and bumping the generation counter.
    timer: Mutex<Option<Timer>>,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new<F, Fut>(delay: Duration, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            callback: Arc::new(move || Box::pin(callback())),
            timer: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Arm (or re-arm) the quiet-period timer. If a timer is already armed,
    /// it is cancelled and replaced — concurrent triggers within one quiet
    /// period collapse into a single eventual callback invocation.
    pub fn trigger(self: &Arc<Self>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(this.delay).await;
            this.fire_if_current(generation).await;
        });
        let mut guard = self.timer.lock().expect("debouncer mutex poisoned");
        if let Some(previous) = guard.replace(Timer { handle, generation }) {
            previous.handle.abort();
        }
    }

    /// Cancel any pending timer. No callback fires for triggers that
    /// preceded this call.
    pub fn stop(&self) {
        // Bump the generation too, so a timer that already passed the abort
        // race (mid-sleep, about to fire) still finds itself stale.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.timer.lock().expect("debouncer mutex poisoned").take() {
            previous.handle.abort();
        }
    }

    /// Cancel any pending timer and invoke the callback immediately. A
    /// concurrently pending trigger is merged into this fire, not lost
    /// silently — it simply never gets its own separate callback.
    pub async fn flush(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.timer.lock().expect("debouncer mutex poisoned").take() {
            previous.handle.abort();
        }
        self.fire_if_current(generation).await;
    }

    async fn fire_if_current(&self, generation: u64) {
        let is_current = {
            let guard = self.timer.lock().expect("debouncer mutex poisoned");
            match guard.as_ref() {
                Some(timer) => timer.generation == generation,
                // flush() already cleared the slot for this generation, but
                // it's still the one invoking us directly.
                None => generation == self.generation.load(Ordering::SeqCst),
            }
        };
        if is_current {
            (self.callback)().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn s7_burst_of_triggers_fires_callback_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(100), move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
            }
        }));

        for _ in 0..10 {
            debouncer.trigger();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_silences_pending_trigger() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(50), move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
            }
        }));

        debouncer.trigger();
        debouncer.stop();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flush_invokes_callback_synchronously() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let debouncer = Arc::new(Debouncer::new(Duration::from_secs(10), move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
            }
        }));

        debouncer.trigger();
        debouncer.flush().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // The flush already consumed the pending trigger; waiting out the
        // original (long) delay must not fire a second time.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_trigger_resets_the_quiet_window() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(80), move || {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
            }
        }));

        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
