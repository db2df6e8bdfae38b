use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::operation::{Operation, PendingOperation};

/// Thread-safe min-priority queue over pending operations.
///
/// The internal lock is exposed via `lock()` so the gateway can take it
/// across compound read/modify sequences (e.g. "drain up to N if nonempty")
/// without a separate dequeue-then-check race. There is no blocking dequeue:
/// consumers poll under the lock, same as the teacher's `SegQueue`-backed
/// writer waiters poll rather than park on a condvar per item.
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<PendingOperation>>,
    sequence: AtomicU64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Enqueues `op`, assigning it the next sequence number for FIFO
    /// tie-breaking within its priority band.
    pub fn enqueue(&self, op: Operation) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let pending = PendingOperation::new(op, sequence);
        self.heap.lock().push(pending);
    }

    /// Pops the lowest-priority-value (highest-urgency) operation, if any.
    pub fn dequeue(&self) -> Option<PendingOperation> {
        self.heap.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.heap.lock().clear();
    }

    /// Exposes the underlying lock for compound operations that must observe
    /// a consistent count before acting on it (e.g. the shutdown drain bound).
    pub fn sync_root(&self) -> &Mutex<BinaryHeap<PendingOperation>> {
        &self.heap
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::Term;

    fn add() -> Operation {
        Operation::AddSingleDocument {
            document: tantivy::Document::new(),
            culture: None,
        }
    }

    #[test]
    fn drains_in_priority_then_fifo_order() {
        let queue = PriorityQueue::new();

        queue.enqueue(add());
        queue.enqueue(Operation::DeleteFeed {
            term: Term::from_field_text(tantivy::schema::Field::from_field_id(0), "feed_x"),
        });
        queue.enqueue(add());
        queue.enqueue(Operation::OptimizeIndex);

        let order: Vec<&'static str> = std::iter::from_fn(|| queue.dequeue())
            .map(|p| p.op.label())
            .collect();

        assert_eq!(
            order,
            vec![
                "OPTIMIZE",
                "DELETE-FEED",
                "ADD-DOCUMENT",
                "ADD-DOCUMENT"
            ]
        );
    }

    #[test]
    fn fifo_within_same_priority_band() {
        let queue = PriorityQueue::new();
        for _ in 0..5 {
            queue.enqueue(Operation::DeleteDocuments {
                term: Term::from_field_text(tantivy::schema::Field::from_field_id(0), "x"),
            });
        }
        let sequences: Vec<u64> = std::iter::from_fn(|| queue.dequeue())
            .map(|p| p.sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn clear_empties_the_queue() {
        let queue = PriorityQueue::new();
        queue.enqueue(Operation::OptimizeIndex);
        queue.enqueue(Operation::OptimizeIndex);
        assert_eq!(queue.len(), 2);
        queue.clear();
        assert!(queue.is_empty());
    }
}
