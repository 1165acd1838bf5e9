//! Cooperative cancellation.
//!
//! The executor holds the [`StopHandle`]; every driver gets a [`StopSignal`]
//! and checks it between operations. Stopping is one-way.

use std::time::Duration;
use tokio::sync::watch;

/// Create a connected handle and signal.
#[must_use]
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Broadcasting side.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Ask every signal holder to stop. Returns `false` if already stopped.
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|stopped| !std::mem::replace(stopped, true))
    }

    /// Whether [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side; clone one per driver.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop is requested. A dropped handle counts as a stop.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `delay`, waking early if a stop is requested. Returns
    /// `false` when the sleep was cut short.
    pub async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = self.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_reaches_every_clone() {
        let (handle, signal) = stop_channel();
        let other = signal.clone();
        assert!(!signal.is_stopped());

        let waiter = tokio::spawn(async move { other.stopped().await });
        assert!(handle.stop());
        assert!(!handle.stop());

        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(signal.is_stopped());
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn pause_is_cut_short_by_stop() {
        let (handle, signal) = stop_channel();
        assert!(signal.pause(Duration::from_millis(5)).await);

        let sleeper = tokio::spawn(async move { signal.pause(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();

        let finished = tokio::time::timeout(Duration::from_secs(1), sleeper).await.unwrap();
        assert!(!finished.unwrap());
    }

    #[tokio::test]
    async fn dropped_handle_releases_waiters() {
        let (handle, signal) = stop_channel();
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), signal.stopped()).await.unwrap();
        assert!(!signal.is_stopped());
    }
}
