//! Work queue shared by the pipeline driver and its workers.
//!
//! The queue is a FIFO with one producer ([`QueueSender`]) and any number of consumers
//! ([`QueueReceiver`] is cloneable). Its capacity is fixed at construction:
//!
//! - [`QueueCapacity::Rendezvous`]: [`QueueSender::send`] returns only after a worker has taken
//!   the unit, coupling the producer to the consumers at every handoff.
//! - [`QueueCapacity::Bounded`]: [`QueueSender::send`] returns as soon as the unit is buffered
//!   and only waits while `capacity` units are pending.
//!
//! Closing is done by consuming the sender with [`QueueSender::close`], so it happens exactly
//! once. Consumers drain what is left and then keep receiving [`None`].

use pgload_config::shared::QueueCapacity;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::bail;
use crate::error::{ErrorKind, LoadResult};

/// A unit in transit, with the acknowledgement a rendezvous sender waits on.
struct Envelope<T> {
    unit: T,
    handoff: Option<oneshot::Sender<()>>,
}

/// Creates a work queue with the given capacity.
///
/// A [`QueueCapacity::Bounded`] capacity of zero is treated as a rendezvous queue.
pub fn create_work_queue<T: Send>(capacity: QueueCapacity) -> (QueueSender<T>, QueueReceiver<T>) {
    let (capacity, buffer) = match capacity {
        QueueCapacity::Bounded { capacity } if capacity > 0 => {
            (QueueCapacity::Bounded { capacity }, capacity)
        }
        // A one slot channel plus a handoff acknowledgement gives rendezvous semantics.
        _ => (QueueCapacity::Rendezvous, 1),
    };

    let (tx, rx) = mpsc::channel(buffer);

    (
        QueueSender { tx, capacity },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer side of the work queue.
pub struct QueueSender<T> {
    tx: mpsc::Sender<Envelope<T>>,
    capacity: QueueCapacity,
}

impl<T: Send> QueueSender<T> {
    pub fn capacity(&self) -> QueueCapacity {
        self.capacity
    }

    /// Enqueues `unit`, waiting according to the queue capacity.
    ///
    /// Fails with [`ErrorKind::QueueClosed`] when every receiver has been dropped, in which
    /// case the unit is discarded.
    pub async fn send(&self, unit: T) -> LoadResult<()> {
        match self.capacity {
            QueueCapacity::Rendezvous => {
                let (handoff_tx, handoff_rx) = oneshot::channel();
                let envelope = Envelope {
                    unit,
                    handoff: Some(handoff_tx),
                };

                if self.tx.send(envelope).await.is_err() {
                    bail!(ErrorKind::QueueClosed, "No worker is receiving from the queue");
                }

                // The acknowledgement is dropped unsent only when the unit is discarded
                // together with the last receiver.
                if handoff_rx.await.is_err() {
                    bail!(
                        ErrorKind::QueueClosed,
                        "The queue was dropped before a worker took the unit"
                    );
                }
            }
            QueueCapacity::Bounded { .. } => {
                let envelope = Envelope {
                    unit,
                    handoff: None,
                };

                if self.tx.send(envelope).await.is_err() {
                    bail!(ErrorKind::QueueClosed, "No worker is receiving from the queue");
                }
            }
        }

        Ok(())
    }

    /// Closes the queue. Receivers drain the remaining units and then observe the closure.
    pub fn close(self) {
        drop(self);
    }
}

impl<T> fmt::Debug for QueueSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender")
            .field("capacity", &self.capacity)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Consumer side of the work queue. Clones share the same underlying queue.
pub struct QueueReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<Envelope<T>>>>,
}

impl<T> QueueReceiver<T> {
    /// Takes the next unit in FIFO order.
    ///
    /// Waits while the queue is empty and still open. Returns [`None`] once the queue is closed
    /// and drained, and keeps returning [`None`] on later calls.
    pub async fn recv(&self) -> Option<T> {
        // Consumers wait for the lock in FIFO order, so units go to workers in arrival order.
        let envelope = {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        }?;

        if let Some(handoff) = envelope.handoff {
            // The producer may have stopped waiting, which is fine.
            let _ = handoff.send(());
        }

        Some(envelope.unit)
    }
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> fmt::Debug for QueueReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReceiver").finish_non_exhaustive()
    }
}
