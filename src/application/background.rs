// Background task ownership
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Owns a spawned task and aborts it when dropped, so a torn-down view can
/// never be updated by a poller that outlived it.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name,
            handle: tokio::spawn(future),
        }
    }

    /// Run `poll` every `every`, starting immediately. Fixed interval, no
    /// backoff: a failed poll simply waits for the next tick. A zero interval
    /// is raised to one millisecond.
    pub fn every<F, Fut>(name: &'static str, every: Duration, mut poll: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let every = every.max(MIN_INTERVAL);
        Self::spawn(name, async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                poll().await;
            }
        })
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            tracing::debug!("Cancelling background task {}", self.name);
            self.handle.abort();
        }
    }
}
