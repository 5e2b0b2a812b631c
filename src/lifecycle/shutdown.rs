//! Shutdown coordination for long-running commands.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// One-shot stop signal for the pair poller and the connectivity monitor.
///
/// Loops subscribe before they start and exit on the first message. A loop
/// that subscribes after the signal can still see it through
/// [`Shutdown::is_triggered`].
pub struct Shutdown {
    notify: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Signal every subscriber. Only the first call sends anything.
    pub fn trigger(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = self.notify.send(()).unwrap_or(0);
        tracing::debug!(listeners, "Shutdown triggered");
    }

    /// Wait for Ctrl+C, then trigger.
    pub async fn trigger_on_ctrl_c(&self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, stopping"),
        }
        self.trigger();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `work` unless shutdown arrives first. `None` means interrupted;
/// `work` is dropped mid-flight, including any retry backoff it was in.
pub async fn unless_stopped<F: Future>(
    stop: &mut broadcast::Receiver<()>,
    work: F,
) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        _ = stop.recv() => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers_once() {
        let shutdown = Shutdown::new();
        let mut poller = shutdown.subscribe();
        let mut monitor = shutdown.subscribe();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert!(poller.recv().await.is_ok());
        assert!(monitor.recv().await.is_ok());
        assert!(poller.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unless_stopped() {
        let shutdown = Shutdown::new();
        let mut stop = shutdown.subscribe();

        assert_eq!(unless_stopped(&mut stop, async { 7 }).await, Some(7));

        shutdown.trigger();
        let interrupted = unless_stopped(&mut stop, std::future::pending::<()>()).await;
        assert!(interrupted.is_none());
    }

    #[test]
    fn test_trigger_without_subscribers() {
        let shutdown = Shutdown::default();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }
}
