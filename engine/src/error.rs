use thiserror::Error;

/// Contract errors: the caller did something the gateway's state doesn't allow.
///
/// These are surfaced synchronously wherever possible; the one exception is
/// `UnknownOperation`, which can only occur inside the worker and is logged
/// rather than returned (there is no caller left to return it to).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("index is closed")]
    IndexClosed,

    /// Reachable only if a future operation variant is added without updating
    /// every match arm that dispatches on `Operation`. Kept as a typed variant
    /// instead of a silent fallthrough, matching the teacher's preference for
    /// an explicit "unknown operation" path over swallowing unmatched cases.
    #[error("unknown index operation")]
    UnknownOperation,

    #[error(transparent)]
    Tantivy(#[from] tantivy::TantivyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Environmental failures classified by the recovery helper (§4.5). These are
/// never returned to a caller; they drive a repair action and are logged.
#[derive(Debug, Error)]
pub enum FailureClass {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("index/argument out of range: {0}")]
    OutOfRange(String),

    #[error("index locked by another process: {0}")]
    AccessDenied(String),

    #[error("partial write artifact: {stale} pending over {canonical}")]
    PartialWrite { stale: String, canonical: String },

    #[error("unrecoverable I/O error: {0}")]
    Other(String),
}

/// Inspects an error raised by the index library and classifies it into one
/// of the recovery-relevant buckets. Message-substring matching is isolated
/// here so nothing else in the crate has to know about `segments.new` /
/// `deleteable.new`.
pub fn classify(err: &GatewayError) -> FailureClass {
    let message = err.to_string();

    if let GatewayError::Io(io_err) = err {
        if io_err.kind() == std::io::ErrorKind::NotFound {
            return FailureClass::NotFound(message);
        }
        if io_err.kind() == std::io::ErrorKind::PermissionDenied {
            return FailureClass::AccessDenied(message);
        }
    }

    if message.contains("segments.new") {
        return FailureClass::PartialWrite {
            stale: "segments.new".to_string(),
            canonical: "segments".to_string(),
        };
    }

    if message.contains("deleteable.new") {
        return FailureClass::PartialWrite {
            stale: "deleteable.new".to_string(),
            canonical: "deleteable".to_string(),
        };
    }

    if message.contains("out of range") {
        return FailureClass::OutOfRange(message);
    }

    if message.contains("docs out of order") {
        return FailureClass::Other(message);
    }

    FailureClass::Other(message)
}
