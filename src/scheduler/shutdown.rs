use log::{info, warn};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::sync::watch;

/// Create a connected trigger/listener pair.
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle(Arc::new(tx)), ShutdownSignal(rx))
}

/// Requests the scan loop to stop; cheap to clone into signal handlers.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// Observed by the scan loop between iterations and while sleeping.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, signal) = shutdown_channel();
        signal
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown was requested; pending forever if every handle
    /// was dropped without triggering.
    pub async fn triggered(&mut self) {
        if self.0.wait_for(|&stop| stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Turn interrupts into shutdown requests.
///
/// The first interrupt triggers `handle` so the current scan can finish. The
/// future resolves once a second interrupt arrives; the caller is expected to
/// exit immediately at that point.
pub async fn escalate_interrupts<F, Fut>(mut next_interrupt: F, handle: ShutdownHandle) -> io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    next_interrupt().await?;
    info!("Interrupted, finishing current scan (press Ctrl+C again to quit now)");
    handle.trigger();

    next_interrupt().await?;
    warn!("Second interrupt, exiting without waiting for the scan");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_listener() {
        let (handle, mut signal) = shutdown_channel();
        assert!(!signal.is_triggered());

        handle.trigger();
        signal.triggered().await;
        assert!(signal.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_stays_pending() {
        let mut signal = ShutdownSignal::never();
        let fired = tokio::time::timeout(Duration::from_secs(60), signal.triggered()).await;
        assert!(fired.is_err());
        assert!(!signal.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_interrupt_requests_shutdown() {
        let (handle, signal) = shutdown_channel();
        let calls = AtomicUsize::new(0);

        // One interrupt, then nothing more.
        let interrupts = || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n > 0 {
                    std::future::pending::<()>().await;
                }
                Ok(())
            }
        };

        let outcome = tokio::time::timeout(Duration::from_secs(60), escalate_interrupts(interrupts, handle)).await;
        assert!(outcome.is_err());
        assert!(signal.is_triggered());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_interrupt_resolves() {
        let (handle, signal) = shutdown_channel();

        let result = escalate_interrupts(|| async { Ok(()) }, handle).await;
        assert!(result.is_ok());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_listener_failure_is_reported() {
        let (handle, signal) = shutdown_channel();

        let result = escalate_interrupts(|| async { Err(io::Error::other("no signal support")) }, handle).await;
        assert!(result.is_err());
        assert!(!signal.is_triggered());
    }
}
