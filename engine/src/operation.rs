use chrono::{DateTime, Utc};
use tantivy::{Document, Term};

/// A single pending mutation, tagged by kind.
///
/// Re-expressed from the mutable `object[]` payload style as a sum type: one
/// variant per operation, each carrying its own typed fields. This is also
/// what removes the need for an "unknown operation" branch in normal
/// operation (see `GatewayError::UnknownOperation`).
#[derive(Debug)]
pub enum Operation {
    /// Merge all segments into one. Never executed during a final drain.
    OptimizeIndex,

    /// Delete every document matching `term`. Carries a higher priority than
    /// `DeleteDocuments` so it always overtakes per-item churn for the same
    /// feed still sitting in the queue.
    DeleteFeed { term: Term },

    /// Add a single document, optionally analyzed with a specific culture.
    AddSingleDocument {
        document: Document,
        culture: Option<String>,
    },

    /// Add a batch of documents sharing one culture.
    AddMultipleDocuments {
        documents: Vec<Document>,
        culture: Option<String>,
    },

    /// Delete every document matching `term`.
    DeleteDocuments { term: Term },
}

impl Operation {
    /// Lower priority values drain sooner. Ties are broken by enqueue order
    /// via `PendingOperation::sequence`.
    pub fn priority(&self) -> u8 {
        match self {
            Operation::OptimizeIndex => 1,
            Operation::DeleteFeed { .. } => 2,
            Operation::AddSingleDocument { .. } => 10,
            Operation::AddMultipleDocuments { .. } => 11,
            Operation::DeleteDocuments { .. } => 50,
        }
    }

    /// A short tag used in logging so operation kinds are identifiable
    /// without formatting the (potentially large) payload.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::OptimizeIndex => "OPTIMIZE",
            Operation::DeleteFeed { .. } => "DELETE-FEED",
            Operation::AddSingleDocument { .. } => "ADD-DOCUMENT",
            Operation::AddMultipleDocuments { .. } => "ADD-DOCUMENTS",
            Operation::DeleteDocuments { .. } => "DELETE-DOCUMENTS",
        }
    }
}

/// An operation plus the bookkeeping the queue needs. Immutable once
/// enqueued; owned by the queue until dequeued, then owned by the worker
/// until the completion event fires.
#[derive(Debug)]
pub struct PendingOperation {
    pub op: Operation,
    pub enqueued_at: DateTime<Utc>,
    pub sequence: u64,
}

impl PendingOperation {
    pub fn new(op: Operation, sequence: u64) -> Self {
        Self {
            op,
            enqueued_at: Utc::now(),
            sequence,
        }
    }

    fn priority(&self) -> u8 {
        self.op.priority()
    }
}

/// A record of a drained operation, passed to the `FinishedIndexOperation`
/// observer regardless of whether execution succeeded.
#[derive(Debug)]
pub struct FinishedOperation {
    pub label: &'static str,
    pub enqueued_at: DateTime<Utc>,
    pub succeeded: bool,
}

// `BinaryHeap` is a max-heap; operations order by ascending priority, so we
// invert the comparison and break ties by ascending sequence (earlier
// inserts must still come out first among equal priorities).
impl Ord for PendingOperation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .priority()
            .cmp(&self.priority())
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PendingOperation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for PendingOperation {}

impl PartialEq for PendingOperation {
    fn eq(&self, other: &Self) -> bool {
        self.priority() == other.priority() && self.sequence == other.sequence
    }
}
