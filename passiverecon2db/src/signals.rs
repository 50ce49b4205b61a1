//! Termination signal masking.
//!
//! While a [`SignalGuard`] is alive, SIGINT and SIGTERM (Ctrl-C on
//! non-Unix) no longer terminate the process. Each signal is logged and
//! counted; the run keeps consuming input until EOF and flushes every
//! buffered record before exiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;

/// Handle for the background signal task.
///
/// Dropping the guard stops the logging task. tokio never restores the
/// default disposition once a handler is registered, so signals stay
/// masked (silently) until the process exits.
pub struct SignalGuard {
    deferred: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SignalGuard {
    /// Install the signal handlers and spawn the logging task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> Self {
        let deferred = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(watch(Arc::clone(&deferred)));
        Self { deferred, task }
    }

    /// Number of signals received and deferred so far.
    pub fn deferred(&self) -> u64 {
        self.deferred.load(Ordering::Relaxed)
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(unix)]
async fn watch(deferred: Arc<AtomicU64>) {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "failed to install signal handlers, signals not masked");
                return;
            }
        };

    loop {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        let count = deferred.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
            signal = name,
            count,
            "signal received, deferring until input is consumed and flushed"
        );
    }
}

#[cfg(not(unix))]
async fn watch(deferred: Arc<AtomicU64>) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler, signals not masked");
            return;
        }
        let count = deferred.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
            signal = "CTRL_C",
            count,
            "signal received, deferring until input is consumed and flushed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_starts_with_no_deferred_signals() {
        let guard = SignalGuard::install();
        tokio::task::yield_now().await;
        assert_eq!(guard.deferred(), 0);
    }
}
