use crate::error::{CamflowError, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Job = BoxFuture<'static, ()>;

/// A long-lived single-threaded task queue.
///
/// Jobs execute serially in submission order on one dedicated worker task,
/// which gives every submitter the same total order over the work it
/// observes. Closing the context drains everything already queued before the
/// worker exits; work submitted after a close request is rejected with
/// `ContextClosed`.
pub struct WorkerContext {
    name: &'static str,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerContext {
    /// Start the context's worker task.
    pub fn start(name: &'static str) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job.await;
            }
            debug!("Worker context '{}' drained and stopped", name);
        });

        debug!("Worker context '{}' started", name);

        Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a close has been requested. Queued work may still be draining.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Enqueue a task without waiting for it to run.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx
                .send(Box::pin(task))
                .map_err(|_| CamflowError::context_closed(self.name)),
            None => Err(CamflowError::context_closed(self.name)),
        }
    }

    /// Run a closure on the context and suspend the caller until it has
    /// executed, returning its result.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(async move {
            let _ = tx.send(f());
        })?;
        rx.await
            .map_err(|_| CamflowError::context_closed(self.name))
    }

    /// Request close, drain already-queued tasks, and stop the worker.
    ///
    /// Idempotent; concurrent submitters racing the close either get their
    /// task drained or a `ContextClosed` rejection, never a silent drop.
    pub async fn close(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            debug!("Worker context '{}' already closed", self.name);
        }
        // Dropping the sender closes the channel; the worker keeps running
        // until the queue is empty.
        drop(sender);

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Worker context '{}' task failed on close: {}", self.name, e);
            }
        }
    }
}
