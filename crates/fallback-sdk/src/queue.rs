use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{FallbackJob, FallbackTransport};

/// Non-blocking handle for submitting fallback writes.
#[derive(Debug, Clone)]
pub struct FallbackQueue {
    tx: mpsc::UnboundedSender<FallbackJob>,
}

impl FallbackQueue {
    /// Creates a queue whose jobs the caller drains itself.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FallbackJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn submit(&self, job: FallbackJob) {
        let kind = job.kind();
        if self.tx.send(job).is_err() {
            warn!(target = "fallback", kind, "fallback worker gone; dropping job");
        }
    }
}

/// Drains the queue in submission order, one request at a time. Failed jobs are
/// logged and dropped.
pub fn spawn_fallback_worker<T: FallbackTransport + 'static>(
    transport: Arc<T>,
) -> (FallbackQueue, tokio::task::JoinHandle<()>) {
    let (queue, mut rx) = FallbackQueue::channel();
    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match transport.deliver(&job).await {
                Ok(()) => {
                    debug!(target = "fallback", kind = job.kind(), "fallback write stored");
                }
                Err(err) => {
                    warn!(
                        target = "fallback",
                        kind = job.kind(),
                        error = %err,
                        "fallback write failed"
                    );
                }
            }
        }
    });
    (queue, handle)
}
