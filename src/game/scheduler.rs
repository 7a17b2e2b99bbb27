//! Delayed detonation and blast-cleanup scheduling
//!
//! Every pending task is keyed by `(session, token)` in a table guarded by
//! one lock. A task that wakes must remove its own entry before running its
//! callback, and cancellation removes the entry too, so firing and
//! cancellation are mutually exclusive: whichever takes the entry first wins,
//! exactly once. Destroying a session cancels everything it still owns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::trace;
use uuid::Uuid;

/// Identity of the session a task is bound to.
pub type SessionId = Uuid;

/// Handle for one pending task within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(Uuid);

/// Runs delayed one-shot callbacks for sessions.
pub struct DetonationScheduler {
    pending: Mutex<HashMap<SessionId, HashMap<TimerToken, AbortHandle>>>,
}

impl DetonationScheduler {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `fire` to run once after `delay`, bound to `session`.
    ///
    /// The callback runs on its own task and must re-validate the session
    /// before mutating anything; by the time it runs, the session it was
    /// armed for may be gone.
    pub fn schedule<F>(self: &Arc<Self>, delay: Duration, session: SessionId, fire: F) -> TimerToken
    where
        F: FnOnce() + Send + 'static,
    {
        let token = TimerToken(Uuid::new_v4());
        let scheduler = Arc::clone(self);

        // The table lock is held across the spawn so the task cannot observe
        // its own entry missing before it was inserted.
        let mut pending = self.pending.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if scheduler.take(session, token) {
                fire();
            }
        });
        pending.entry(session).or_default().insert(token, task.abort_handle());
        trace!(session = %session, ?token, delay_ms = delay.as_millis() as u64, "Task scheduled");
        token
    }

    /// Cancel one pending task. Returns `false` if it already fired or was
    /// already cancelled.
    #[allow(dead_code)]
    pub fn cancel(&self, session: SessionId, token: TimerToken) -> bool {
        let mut pending = self.pending.lock();
        let Some(tokens) = pending.get_mut(&session) else {
            return false;
        };
        let Some(handle) = tokens.remove(&token) else {
            return false;
        };
        if tokens.is_empty() {
            pending.remove(&session);
        }
        handle.abort();
        true
    }

    /// Cancel every task still pending for `session`. Returns how many were
    /// cancelled.
    pub fn cancel_session(&self, session: SessionId) -> usize {
        let Some(tokens) = self.pending.lock().remove(&session) else {
            return 0;
        };
        let count = tokens.len();
        for handle in tokens.into_values() {
            handle.abort();
        }
        trace!(session = %session, count, "Session tasks cancelled");
        count
    }

    /// Number of tasks still pending for `session`.
    #[allow(dead_code)]
    pub fn pending_count(&self, session: SessionId) -> usize {
        self.pending
            .lock()
            .get(&session)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// Claim the entry for an expired task. Returns `false` if it was
    /// cancelled in the meantime, in which case the callback must not run.
    fn take(&self, session: SessionId, token: TimerToken) -> bool {
        let mut pending = self.pending.lock();
        let Some(tokens) = pending.get_mut(&session) else {
            return false;
        };
        let hit = tokens.remove(&token).is_some();
        if tokens.is_empty() {
            pending.remove(&session);
        }
        hit
    }
}

impl Default for DetonationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_and_never_before() {
        let scheduler = Arc::new(DetonationScheduler::new());
        let session = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(Duration::from_millis(3000), session, counter_task(&fired));

        sleep(Duration::from_millis(2999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(session), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_fires() {
        let scheduler = Arc::new(DetonationScheduler::new());
        let session = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));

        let token = scheduler.schedule(Duration::from_millis(3000), session, counter_task(&fired));
        assert!(scheduler.cancel(session, token));

        sleep(Duration::from_millis(5000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!scheduler.cancel(session, token));
    }

    #[tokio::test(start_paused = true)]
    async fn firing_and_cancellation_are_exclusive() {
        let scheduler = Arc::new(DetonationScheduler::new());
        let session = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));

        let token = scheduler.schedule(Duration::from_millis(10), session, counter_task(&fired));
        sleep(Duration::from_millis(20)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // The fire path already claimed the entry; cancel finds nothing.
        assert!(!scheduler.cancel(session, token));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_session_kills_all_pending_tasks() {
        let scheduler = Arc::new(DetonationScheduler::new());
        let session = Uuid::new_v4();
        let other = Uuid::new_v4();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(Duration::from_millis(3000), session, counter_task(&fired));
        scheduler.schedule(Duration::from_millis(4000), session, counter_task(&fired));
        scheduler.schedule(Duration::from_millis(3000), other, counter_task(&fired));

        assert_eq!(scheduler.cancel_session(session), 2);
        assert_eq!(scheduler.pending_count(session), 0);

        sleep(Duration::from_millis(6000)).await;
        // Only the other session's task survived.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
