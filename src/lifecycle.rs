//! Server Lifecycle: construction never blocks — binding
//! happens before the constructor returns, but the request loop runs in
//! a background task — and `stop(deadline)` is idempotent and safe to
//! call more than once, including after a startup failure left nothing
//! running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A handle to a background server task: one `oneshot` carries the
/// shutdown deadline in, the `JoinHandle` is awaited (bounded by that
/// same deadline) to confirm the task actually wound down.
pub struct Lifecycle {
    shutdown_tx: Mutex<Option<oneshot::Sender<Duration>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Lifecycle {
    pub fn new(shutdown_tx: oneshot::Sender<Duration>, join_handle: JoinHandle<()>) -> Self {
        Lifecycle {
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            join_handle: Mutex::new(Some(join_handle)),
            stopped: AtomicBool::new(false),
        }
    }

    /// A handle with nothing running — used when startup failed before
    /// a task was ever spawned, so callers can still hold a `Lifecycle`
    /// uniformly and call `stop` on it without checking whether startup
    /// succeeded.
    pub fn already_stopped() -> Self {
        Lifecycle {
            shutdown_tx: Mutex::new(None),
            join_handle: Mutex::new(None),
            stopped: AtomicBool::new(true),
        }
    }

    /// Signals the background task to refuse new connections and finish
    /// in-flight work, then waits up to `deadline` for it to exit.
    /// Idempotent: a second call, or a call on a handle that was never
    /// really started, is a safe no-op.
    pub async fn stop(&self, deadline: Duration) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let tx = self.shutdown_tx.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.send(deadline);
        }

        let handle = self.join_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(deadline, handle).await {
                Ok(Ok(())) => info!("server task exited within deadline"),
                Ok(Err(err)) => warn!(error = %err, "server task panicked during shutdown"),
                Err(_) => warn!(?deadline, "server task did not exit before deadline"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_on_a_never_started_handle_is_a_no_op() {
        let lifecycle = Lifecycle::already_stopped();
        lifecycle.stop(Duration::from_secs(1)).await;
        lifecycle.stop(Duration::from_secs(1)).await; // still safe
    }

    #[tokio::test]
    async fn stop_is_idempotent_on_a_real_handle() {
        let (tx, rx) = oneshot::channel::<Duration>();
        let handle = tokio::spawn(async move {
            let _ = rx.await;
        });
        let lifecycle = Lifecycle::new(tx, handle);

        lifecycle.stop(Duration::from_secs(1)).await;
        lifecycle.stop(Duration::from_secs(1)).await;
    }
}
