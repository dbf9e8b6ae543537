//! Fire-and-forget work that must not be lost on shutdown
//!
//! Every task spawned here is counted until it finishes. A failing or panicking
//! task is logged and contained. At shutdown the server waits on [`BackgroundTasks::wait`]
//! for the count to reach zero, bounded by the grace period.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error};

#[derive(Debug, Default)]
struct Inner {
    outstanding: AtomicUsize,
    idle: Notify,
}

#[derive(Clone, Debug, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

/// Outcome of waiting for background work at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    Completed,
    TimedOut { outstanding: usize },
}

// Decrements on drop so success, error and panic all release the count.
struct Guard(Arc<Inner>);

impl Drop for Guard {
    fn drop(&mut self) {
        if self.0.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Run `task` detached. The count is taken before this returns.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        let guard = Guard(Arc::clone(&self.inner));

        tokio::spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => debug!("Background task '{}' finished", name),
                Ok(Err(e)) => error!("Background task '{}' failed: {:#}", name, e),
                Err(panic) => error!("Background task '{}' panicked: {}", name, panic_message(&*panic)),
            }
        });
    }

    /// Block until no task is outstanding or `grace` runs out.
    pub async fn wait(&self, grace: Duration) -> Drain {
        let drained = async {
            loop {
                let notified = self.inner.idle.notified();
                tokio::pin!(notified);
                // Register before checking so a wake between the load and the await is not missed
                notified.as_mut().enable();
                if self.outstanding() == 0 {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(grace, drained).await {
            Ok(()) => Drain::Completed,
            Err(_) => Drain::TimedOut {
                outstanding: self.outstanding(),
            },
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn wait_returns_after_task_completes() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        tasks.spawn("short", async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(tasks.outstanding(), 1);

        assert_eq!(tasks.wait(Duration::from_secs(5)).await, Drain::Completed);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(tasks.outstanding(), 0);
    }

    #[tokio::test]
    async fn wait_gives_up_after_grace() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        let drain = tasks.wait(Duration::from_millis(50)).await;
        assert_eq!(drain, Drain::TimedOut { outstanding: 1 });
    }

    #[tokio::test]
    async fn failures_and_panics_are_contained() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("fails", async { Err(anyhow::anyhow!("smtp down")) });
        tasks.spawn("panics", async { panic!("boom") });

        assert_eq!(tasks.wait(Duration::from_secs(5)).await, Drain::Completed);
        assert_eq!(tasks.outstanding(), 0);

        // Still usable afterwards
        tasks.spawn("after", async { Ok(()) });
        assert_eq!(tasks.wait(Duration::from_secs(5)).await, Drain::Completed);
    }

    #[tokio::test]
    async fn idle_coordinator_drains_immediately() {
        let tasks = BackgroundTasks::new();
        assert_eq!(tasks.wait(Duration::from_millis(1)).await, Drain::Completed);
    }
}
