//! Shutdown coordination for the proxy.

use tokio::sync::{broadcast, watch};

/// Coordinator for process-wide shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a stop channel scoped to a single service.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopSignal(rx))
}

/// Owner side of a per-service stop signal.
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    /// Signal every holder of the matching `StopSignal`.
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// Observer side of a per-service stop signal.
///
/// Unlike a broadcast receiver, a signal cloned after `stop` still observes it.
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once stopped, or once the handle is dropped.
    pub async fn stopped(&mut self) {
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn stop_reaches_late_clones() {
        let (handle, signal) = stop_channel();
        handle.stop();

        let mut late = signal.clone();
        assert!(late.is_stopped());
        tokio::time::timeout(Duration::from_millis(100), late.stopped())
            .await
            .expect("stop should already be observed");
    }

    #[tokio::test]
    async fn dropped_handle_counts_as_stop() {
        let (handle, mut signal) = stop_channel();
        drop(handle);
        tokio::time::timeout(Duration::from_millis(100), signal.stopped())
            .await
            .expect("dropped handle should release waiters");
    }

    #[tokio::test]
    async fn shutdown_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 1);
        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }
}
