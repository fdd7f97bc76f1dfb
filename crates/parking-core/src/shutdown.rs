//! Shutdown signalling shared by the long-running loops.
//!
//! A `watch::Receiver<bool>` is the shutdown handle: `true` means stop.
//! Loops poll [`requested`] inside a `tokio::select!` so cancellation is
//! observed between units of work, never in the middle of one.

use tokio::sync::watch;
use tracing::{info, warn};

/// Sending half of a shutdown signal.
pub type ShutdownTrigger = watch::Sender<bool>;

/// Receiving half of a shutdown signal.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Create a fresh, unsignalled shutdown pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    watch::channel(false)
}

/// Resolve once shutdown has been requested.
///
/// If the trigger is dropped without ever firing, this never resolves:
/// a vanished trigger is not a stop request.
pub async fn requested(signal: &mut ShutdownSignal) {
    if signal.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Spawn a task that fires the returned signal on Ctrl-C.
pub fn on_ctrl_c() -> ShutdownSignal {
    let (trigger, signal) = channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, shutting down"),
        }
        // Receivers may already be gone during teardown.
        let _ = trigger.send(true);
    });
    signal
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn resolves_after_trigger() {
        let (trigger, mut signal) = channel();
        let waiter = tokio::spawn(async move { requested(&mut signal).await });
        let _ = trigger.send(true);
        assert!(tokio::time::timeout(Duration::from_secs(1), waiter).await.is_ok());
    }

    #[tokio::test]
    async fn dropped_trigger_is_not_a_stop() {
        let (trigger, mut signal) = channel();
        drop(trigger);
        let outcome =
            tokio::time::timeout(Duration::from_millis(50), requested(&mut signal)).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn already_signalled_resolves_immediately() {
        let (trigger, mut signal) = channel();
        let _ = trigger.send(true);
        requested(&mut signal).await;
        assert!(*signal.borrow());
    }
}
