//! Recurring, cancellable refresh tasks. Each poller re-runs one read
//! pipeline on a fixed interval until it is stopped or its tick reports the
//! tracked condition can no longer change.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time,
};
use tracing::debug;

/// Outcome of one refresh tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// Keep polling. Ticks are idempotent reads, so a failed tick also maps
    /// here; the next tick retries regardless.
    Continue,
    /// The tracked condition is permanently resolved; stop this timer.
    Settled,
}

/// Handle to one spawned refresh loop. Dropping the handle aborts the task,
/// so a poller never outlives the session that owns it.
pub struct Poller {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<F>(name: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> BoxFuture<'static, PollOutcome> + Send + 'static,
    {
        let (shutdown, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                tokio::select! {
                    _ = stopped.changed() => {
                        debug!(%name, "poller cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if tick().await == PollOutcome::Settled {
                            debug!(%name, "poller settled");
                            break;
                        }
                    }
                }
            }
        });
        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request cancellation without waiting for the task to wind down.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Cancel and wait for the refresh loop to finish its current tick.
    pub async fn stopped(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Whether the underlying task has exited (settled or cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
