use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel;
use tantivy::{Document, Term};

use crate::document::DocumentSchema;
use crate::error::GatewayError;
use crate::index_handle::{IndexHandle, InjectedFault};
use crate::operation::{FinishedOperation, Operation};
use crate::queue::PriorityQueue;
use crate::settings::Settings;
use crate::worker::{drain, Observer, WorkerLoop};

/// Shutdown bound: deliberately *not* the whole queue. Draining everything
/// on exit can lock the host UI; this trades a bounded, documented loss of
/// unindexed items for a responsive shutdown (§4.3).
const SHUTDOWN_DRAIN_BOUND: usize = 10;

/// How often `stop()` polls for the in-flight drain to finish (§5).
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Public facade over the indexing pipeline: accepts mutations, enqueues
/// them, owns the worker lifecycle, and coordinates flush/reset/shutdown.
///
/// Mirrors the teacher's `IndexWriterHandler` (`engine/src/index.rs`): a
/// thin handle around a channel-fed worker thread, except here the "wakeup"
/// is a capacity-1 notification rather than a bounded work channel, because
/// the work itself lives in the priority queue, not the channel.
pub struct IndexGateway {
    queue: Arc<PriorityQueue>,
    handle: Arc<IndexHandle>,
    wakeup_tx: channel::Sender<()>,
    worker_running: Arc<AtomicBool>,
    flush_in_progress: Arc<AtomicBool>,
    worker_thread: Option<JoinHandle<()>>,
    observer: Arc<Observer>,
}

impl IndexGateway {
    /// Opens the index and spawns the dedicated worker thread.
    pub fn start(
        index_name: impl Into<String>,
        settings: &Settings,
        schema: DocumentSchema,
        observer: Arc<Observer>,
    ) -> Result<Self, GatewayError> {
        let index_name = index_name.into();
        let handle = Arc::new(IndexHandle::new(index_name.clone(), settings, schema));
        handle.init()?;

        let queue = Arc::new(PriorityQueue::new());
        let (wakeup_tx, wakeup_rx) = channel::bounded(1);
        let worker_running = Arc::new(AtomicBool::new(true));
        let flush_in_progress = Arc::new(AtomicBool::new(false));

        let worker = WorkerLoop::new(
            queue.clone(),
            handle.clone(),
            wakeup_rx,
            worker_running.clone(),
            flush_in_progress.clone(),
            observer.clone(),
        );

        let worker_thread = thread::Builder::new()
            .name(format!("index-worker-{}", index_name))
            .spawn(move || worker.run())
            .expect("spawn index worker thread");

        info!("index gateway '{}' started", index_name);

        Ok(Self {
            queue,
            handle,
            wakeup_tx,
            worker_running,
            flush_in_progress,
            worker_thread: Some(worker_thread),
            observer,
        })
    }

    fn is_running(&self) -> bool {
        self.worker_running.load(Ordering::Acquire)
    }

    /// Enqueues `op` and signals the worker. A stray double-signal (the
    /// channel already has a pending wakeup) is fine: the worker will see
    /// both operations on its next drain either way.
    fn enqueue(&self, op: Operation) {
        if !self.is_running() {
            // Invariant 3: no enqueue is attempted after the gateway signals
            // stop.
            return;
        }
        self.queue.enqueue(op);
        let _ = self.wakeup_tx.try_send(());
    }

    pub fn add(&self, document: Document, culture: Option<String>) {
        self.enqueue(Operation::AddSingleDocument { document, culture });
    }

    pub fn add_many(&self, documents: Vec<Document>, culture: Option<String>) {
        self.enqueue(Operation::AddMultipleDocuments { documents, culture });
    }

    pub fn delete(&self, term: Term) {
        self.enqueue(Operation::DeleteDocuments { term });
    }

    pub fn delete_feed(&self, term: Term) {
        self.enqueue(Operation::DeleteFeed { term });
    }

    pub fn optimize(&self) {
        self.enqueue(Operation::OptimizeIndex);
    }

    /// Drains up to `min(queue_count, 10)` operations if `close` is set,
    /// then flushes the index writer. Errors from the index-level flush are
    /// logged rather than propagated, matching the worker's "progress over
    /// perfection" policy (§4.3).
    pub fn flush(&self, close: bool) {
        if close {
            let bound = SHUTDOWN_DRAIN_BOUND.min(self.queue.len());
            drain(
                &self.queue,
                &self.handle,
                &self.flush_in_progress,
                self.observer.as_ref(),
                bound,
                true,
            );
        }

        if let Err(err) = self.handle.flush(close) {
            warn!("flush_index failed, swallowed: {}", err);
        }
    }

    /// Clears the queue and resets the on-disk index. Unlike `flush`, I/O
    /// errors here propagate: a failed reset leaves the index in a state the
    /// caller needs to know about.
    pub fn reset(&self) -> Result<(), GatewayError> {
        self.queue.clear();
        self.handle.reset()
    }

    /// Stops the worker, waits until it is no longer mid-drain, then
    /// performs the bounded final flush. After this returns, no completion
    /// events are raised.
    pub fn stop(&mut self) {
        self.worker_running.store(false, Ordering::Release);
        let _ = self.wakeup_tx.try_send(()); // unblock a parked `recv`

        while self.flush_in_progress.load(Ordering::Acquire) {
            thread::sleep(STOP_POLL_INTERVAL);
        }

        if let Some(handle) = self.worker_thread.take() {
            let _ = handle.join();
        }

        self.flush(true);
    }

    pub fn num_documents(&self) -> Result<u64, GatewayError> {
        self.handle.num_documents()
    }

    /// Arms a synthetic recovery-path failure for the next write-side
    /// operation the worker performs. Test-only seam, exposed here so
    /// integration tests can drive corruption recovery through the real
    /// queue/worker path rather than calling `IndexHandle` directly.
    pub fn inject_fault(&self, fault: Option<InjectedFault>) {
        self.handle.inject_fault(fault);
    }

    /// Stops the worker and closes the index. Equivalent to calling `stop()`
    /// then `close()`, exposed as an explicit method so callers don't have
    /// to rely solely on `Drop` timing.
    pub fn dispose(&mut self) {
        self.stop();
        if let Err(err) = self.handle.close() {
            error!("error closing index during dispose: {}", err);
        }
    }
}

impl Drop for IndexGateway {
    fn drop(&mut self) {
        if self.is_running() {
            self.dispose();
        }
    }
}
