use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::Receiver;

use crate::index_handle::IndexHandle;
use crate::operation::{FinishedOperation, Operation};
use crate::queue::PriorityQueue;
use crate::recovery::perform;

/// Throttle between drain waves: amortizes writer open/close over bursts
/// from feed-refresh waves (§4.4).
const PACING_SLEEP: Duration = Duration::from_secs(5);

/// Floor on a drain batch's size; avoids useless percentage-based dwarf
/// batches when the queue is small (§6's tuning constants table).
const BATCH_FLOOR: usize = 200;

pub type Observer = dyn Fn(FinishedOperation) + Send + Sync;

/// Clears `flush_in_progress` on drop so a panic inside `perform` can't
/// leave the flag set and deadlock `stop()`'s spin-wait.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single consumer that waits on the wakeup signal, drains a bounded batch,
/// sleeps, and repeats until `worker_running` is cleared.
///
/// A single worker is mandatory because the index library permits only one
/// writer; this loop is the only thing that ever calls into `IndexHandle`'s
/// write-side methods.
pub struct WorkerLoop {
    queue: Arc<PriorityQueue>,
    handle: Arc<IndexHandle>,
    wakeup: Receiver<()>,
    worker_running: Arc<AtomicBool>,
    flush_in_progress: Arc<AtomicBool>,
    observer: Arc<Observer>,
}

impl WorkerLoop {
    pub fn new(
        queue: Arc<PriorityQueue>,
        handle: Arc<IndexHandle>,
        wakeup: Receiver<()>,
        worker_running: Arc<AtomicBool>,
        flush_in_progress: Arc<AtomicBool>,
        observer: Arc<Observer>,
    ) -> Self {
        Self {
            queue,
            handle,
            wakeup,
            worker_running,
            flush_in_progress,
            observer,
        }
    }

    pub fn run(self) {
        while self.worker_running.load(Ordering::Acquire) {
            // Edge-triggered: block until a producer signals there is work,
            // or until `stop()` drops the sender and this returns Err.
            if self.wakeup.recv().is_err() {
                return;
            }

            if !self.worker_running.load(Ordering::Acquire) {
                return;
            }

            // Re-entrancy guard: a flush triggered by `Gateway::flush` runs
            // on the caller's thread while holding this same flag, so a
            // stray wakeup during that window is just skipped.
            if self.flush_in_progress.load(Ordering::Acquire) {
                continue;
            }

            while self.worker_running.load(Ordering::Acquire) && !self.queue.is_empty() {
                let batch_size = BATCH_FLOOR.max(self.queue.len() / 10);
                drain(
                    &self.queue,
                    &self.handle,
                    &self.flush_in_progress,
                    &self.observer,
                    batch_size,
                    false,
                );

                if self.worker_running.load(Ordering::Acquire) {
                    thread::sleep(PACING_SLEEP);
                }
            }
        }
    }
}

/// Drains up to `n` operations, always clearing `flush_in_progress`
/// afterward even if `perform` panics (§4.4). Shared between the worker
/// loop's own pacing cycle and `Gateway::flush`/`stop`, which trigger a
/// drain synchronously on the caller's thread.
///
/// `final_drain` is set only by the shutdown call site (`Gateway::stop`'s
/// bounded flush): `OptimizeIndex` is too expensive to run there and is
/// dropped without executing or requeuing, so a later `Gateway::optimize()`
/// call would have to enqueue a fresh one. It is **not** set for the worker's
/// own steady-state pacing cycle, where an `OptimizeIndex` op runs like any
/// other operation (§4.3, §9).
pub fn drain(
    queue: &PriorityQueue,
    handle: &IndexHandle,
    flush_in_progress: &AtomicBool,
    observer: &Observer,
    n: usize,
    final_drain: bool,
) {
    let _guard = FlushGuard::enter(flush_in_progress);

    let mut remaining = n as i64;
    while remaining >= 0 {
        let Some(pending) = queue.dequeue() else {
            break;
        };

        match pending.op {
            Operation::OptimizeIndex if final_drain => {
                debug!("skipping OptimizeIndex during final drain");
            }
            op => {
                let label = op.label();
                let succeeded = perform(handle, &op);
                observer(FinishedOperation {
                    label,
                    enqueued_at: pending.enqueued_at,
                    succeeded,
                });
            }
        }

        remaining -= 1;
    }
}
