use std::thread;
use std::time::Duration;

use crate::error::{classify, FailureClass, GatewayError};
use crate::index_handle::IndexHandle;
use crate::operation::Operation;
use crate::settings::IndexLocation;

/// The access-denied retry delay (§6's tuning constants table).
const ACCESS_DENIED_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Dispatches one operation against the index handle and classifies any
/// failure into a repair action. Never requeues the operation: partial
/// progress is preferred over an unbounded retry storm (§4.5).
///
/// Returns whether the operation ultimately succeeded; the caller (the
/// worker loop) always raises the completion event regardless of this
/// result.
pub fn perform(handle: &IndexHandle, op: &Operation) -> bool {
    let outcome = match op {
        Operation::OptimizeIndex => handle.optimize(),
        Operation::DeleteFeed { term } => handle.delete(term.clone()),
        Operation::AddSingleDocument { document, culture } => {
            handle.add(document.clone(), culture.as_deref())
        }
        Operation::AddMultipleDocuments { documents, culture } => {
            handle.add_many(documents.clone(), culture.as_deref())
        }
        Operation::DeleteDocuments { term } => handle.delete(term.clone()),
    };

    match outcome {
        Ok(()) => true,
        Err(err) => {
            handle_failure(handle, &err);
            false
        }
    }
}

fn handle_failure(handle: &IndexHandle, err: &GatewayError) {
    match classify(err) {
        FailureClass::NotFound(detail) => {
            error!("index corrupted (not found): {}", detail);
            reset_and_log(handle);
        }
        FailureClass::OutOfRange(detail) => {
            error!("index corrupted (out of range): {}", detail);
            reset_and_log(handle);
        }
        FailureClass::AccessDenied(detail) => {
            warn!("index locked by another process, backing off: {}", detail);
            thread::sleep(ACCESS_DENIED_RETRY_DELAY);
        }
        FailureClass::PartialWrite { stale, canonical } => {
            match repair_partial_write(handle, &stale, &canonical) {
                Ok(()) => info!("repaired partial write: {} -> {}", stale, canonical),
                Err(repair_err) => error!(
                    "failed to repair partial write {} -> {}: {}",
                    stale, canonical, repair_err
                ),
            }
        }
        FailureClass::Other(detail) => {
            warn!("dropping operation after unrecoverable error: {}", detail);
        }
    }
}

fn reset_and_log(handle: &IndexHandle) {
    if let Err(reset_err) = handle.reset() {
        error!("index reset itself failed: {}", reset_err);
    }
}

/// Renames `stale` over `canonical` inside the index directory, replacing
/// any existing file. Only meaningful for on-disk indexes; for in-memory
/// indexes there's no such artifact to find, so this is a no-op.
fn repair_partial_write(handle: &IndexHandle, stale: &str, canonical: &str) -> Result<(), GatewayError> {
    let path = match handle.location() {
        IndexLocation::Directory(path) => path,
        IndexLocation::Memory => return Ok(()),
    };

    let stale_path = path.join(stale);
    let canonical_path = path.join(canonical);

    if stale_path.exists() {
        std::fs::rename(&stale_path, &canonical_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSchema;
    use crate::settings::Settings;

    fn memory_handle() -> IndexHandle {
        let settings = Settings::in_memory("en-US");
        let schema = DocumentSchema::default_schema();
        let handle = IndexHandle::new("test-index", &settings, schema);
        handle.init().unwrap();
        handle
    }

    #[test]
    fn successful_add_reports_true() {
        let handle = memory_handle();
        let doc = handle.schema().make_document("item-1", "hello");
        let op = Operation::AddSingleDocument {
            document: doc,
            culture: None,
        };
        assert!(perform(&handle, &op));
    }

    #[test]
    fn operation_against_closed_index_reports_false_without_panicking() {
        let handle = memory_handle();
        handle.close().unwrap();
        let doc = handle.schema().make_document("item-1", "hello");
        let op = Operation::AddSingleDocument {
            document: doc,
            culture: None,
        };
        assert!(!perform(&handle, &op));
    }

    #[test]
    fn partial_write_repair_renames_stale_file_over_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join("idx");
        std::fs::create_dir_all(&index_dir).unwrap();
        std::fs::write(index_dir.join("segments.new"), b"fresh").unwrap();
        std::fs::write(index_dir.join("segments"), b"stale").unwrap();

        let settings = Settings::on_disk(index_dir.clone(), "en-US");
        let schema = DocumentSchema::default_schema();
        let handle = IndexHandle::new("test-index", &settings, schema);

        repair_partial_write(&handle, "segments.new", "segments").unwrap();

        assert!(!index_dir.join("segments.new").exists());
        assert_eq!(
            std::fs::read(index_dir.join("segments")).unwrap(),
            b"fresh"
        );
    }
}
