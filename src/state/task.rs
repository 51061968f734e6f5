//! Cancellable one-shot timers
//!
//! A [`ScheduledTask`] owns a spawned tokio task that sleeps until a deadline
//! and then runs a future. Dropping the handle aborts the task, so storing a
//! new timer in an `Option<ScheduledTask>` slot cancels the previous one.
//!
//! The future receives the [`TaskId`] of its own timer. A fired timer must
//! check that its slot still holds that id before acting, then take the slot
//! and [`detach`](ScheduledTask::detach) it (dropping it would abort the very
//! task that is running).

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one scheduled timer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Handle to a pending one-shot timer
pub struct ScheduledTask {
    id: TaskId,
    deadline: Instant,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Run `make(id)` once `delay` has elapsed
    pub fn spawn_after<F, Fut>(delay: Duration, make: F) -> Self
    where
        F: FnOnce(TaskId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed));
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            make(id).await;
        });

        Self {
            id,
            deadline,
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Abort the timer if it has not fired yet
    pub fn cancel(self) {
        drop(self);
    }

    /// Release the handle without aborting the underlying task
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .finish()
    }
}
