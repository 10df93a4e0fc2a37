//! Queued delivery path.
//!
//! The relay decouples producers from network I/O with a queue and one
//! dedicated worker task:
//!
//! ```text
//!    Producers (handle)         Worker task
//!        │                          │
//!        │  prepare + enqueue       │  recv
//!        └────────► queue ─────────►│
//!                                   v
//!                            deliver (encode + push)
//! ```
//!
//! Labels are resolved and the timestamp fixed on the producer side, so a
//! queued entry carries its original event time and computed label values
//! from the moment of emission, not the moment of delivery. Entries from a
//! single producer are delivered in FIFO order; across producers only the
//! queue's own ordering applies.
//!
//! A bounded queue applies its own policy when full: the enqueue drops the
//! entry with a warning rather than blocking the producer. Shutdown is
//! graceful, the worker drains every queued entry before terminating.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::{Config, ConfigError};
use crate::entry::{LogEntry, LogRecord};
use crate::handler::LokiHandler;

/// One queued unit of work for the relay worker.
enum RelayItem {
    /// A formatted entry to deliver.
    Entry(LogEntry),
    /// Acknowledged once every item queued before it has been processed.
    Flush(oneshot::Sender<()>),
}

enum QueueTx {
    Bounded(mpsc::Sender<RelayItem>),
    Unbounded(mpsc::UnboundedSender<RelayItem>),
}

enum QueueRx {
    Bounded(mpsc::Receiver<RelayItem>),
    Unbounded(mpsc::UnboundedReceiver<RelayItem>),
}

impl QueueTx {
    /// Non-blocking enqueue. Returns false when the item was dropped,
    /// either because a bounded queue is full or the relay has shut down.
    fn enqueue(&self, item: RelayItem) -> bool {
        match self {
            QueueTx::Bounded(tx) => match tx.try_send(item) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("relay queue full, dropping log entry");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!("relay is shut down, dropping log entry");
                    false
                }
            },
            QueueTx::Unbounded(tx) => {
                if tx.send(item).is_err() {
                    warn!("relay is shut down, dropping log entry");
                    return false;
                }
                true
            }
        }
    }

    /// Enqueue that waits for capacity. Used for control items that must
    /// not be dropped under load.
    async fn send(&self, item: RelayItem) -> bool {
        match self {
            QueueTx::Bounded(tx) => tx.send(item).await.is_ok(),
            QueueTx::Unbounded(tx) => tx.send(item).is_ok(),
        }
    }
}

impl QueueRx {
    async fn recv(&mut self) -> Option<RelayItem> {
        match self {
            QueueRx::Bounded(rx) => rx.recv().await,
            QueueRx::Unbounded(rx) => rx.recv().await,
        }
    }

    fn close(&mut self) {
        match self {
            QueueRx::Bounded(rx) => rx.close(),
            QueueRx::Unbounded(rx) => rx.close(),
        }
    }
}

/// Queue-and-worker relay around the synchronous handler.
///
/// `handle` never blocks on network I/O; the worker owns all delivery.
pub struct QueuedRelay {
    handler: Arc<LokiHandler>,
    tx: QueueTx,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl QueuedRelay {
    /// Builds the relay and starts its worker task.
    ///
    /// `config.queue_capacity` sizes the queue; `0` means unbounded. Must
    /// be called from within a tokio runtime.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let capacity = config.queue_capacity;
        let handler = Arc::new(LokiHandler::new(config)?);

        let (tx, rx) = if capacity == 0 {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        } else {
            let (tx, rx) = mpsc::channel(capacity);
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        };

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(Arc::clone(&handler), rx, cancel.clone()));

        Ok(QueuedRelay {
            handler,
            tx,
            cancel,
            worker,
        })
    }

    /// Formats and enqueues one record, returning immediately.
    ///
    /// Timestamp and computed labels are fixed here, on the caller's side
    /// of the queue. Configuration errors surface to the caller; a full
    /// bounded queue drops the entry with a warning, which is the queue's
    /// policy, not an error.
    pub fn handle(&self, record: LogRecord) -> Result<(), ConfigError> {
        let entry = self.handler.prepare(record)?;
        self.tx.enqueue(RelayItem::Entry(entry));
        Ok(())
    }

    /// Waits until everything queued before this call has been delivered
    /// (or failed and been reported).
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(RelayItem::Flush(ack_tx)).await {
            let _ = ack_rx.await;
        }
    }

    /// Signals the worker to stop and waits for it to drain the queue.
    /// Every entry enqueued before shutdown is delivered, none discarded.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(source) = self.worker.await {
            error!("relay worker task failed: {source}");
        }
    }
}

async fn run_worker(handler: Arc<LokiHandler>, mut rx: QueueRx, cancel: CancellationToken) {
    debug!("relay worker started");
    loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(item) => process(&handler, item).await,
                // Every producer handle is gone.
                None => break,
            },
            () = cancel.cancelled() => {
                debug!("relay received shutdown signal, draining remaining entries");
                rx.close();
                while let Some(item) = rx.recv().await {
                    process(&handler, item).await;
                }
                break;
            }
        }
    }
    debug!("relay worker stopped");
}

/// Delivery failures are reported inside `deliver`; nothing here may take
/// the worker down.
async fn process(handler: &LokiHandler, item: RelayItem) {
    match item {
        RelayItem::Entry(entry) => handler.deliver(entry).await,
        RelayItem::Flush(ack) => {
            let _ = ack.send(());
        }
    }
}
