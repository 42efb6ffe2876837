//! Broadcast cancellation for a pipeline run.
//!
//! The signal is level triggered: a receiver created after [`ShutdownTx::shutdown`] was called
//! still observes the shutdown.

use std::sync::Arc;
use tokio::sync::watch;

/// Sending half of the shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTx {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTx {
    /// Requests shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving half of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx {
    rx: watch::Receiver<bool>,
}

impl ShutdownRx {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown was requested.
    ///
    /// Never completes if every [`ShutdownTx`] is dropped without requesting shutdown.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|shutdown| *shutdown).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);

    (ShutdownTx { tx: Arc::new(tx) }, ShutdownRx { rx })
}
