use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tantivy::directory::MmapDirectory;
use tantivy::{Document, Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::debug_sink::DebugSink;
use crate::document::DocumentSchema;
use crate::error::GatewayError;
use crate::merge_scheduler::build_merge_policy;
use crate::settings::{CultureAnalyzers, IndexLocation, Settings};

/// A recovery path to simulate on the next write-side call, so the recovery
/// helper's corruption branches (§4.5) are exercisable in tests without
/// coaxing a real corrupt tantivy directory into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    NotFound,
    AccessDenied,
    PartialWrite,
    Other,
}

impl InjectedFault {
    fn as_error(self) -> GatewayError {
        let io_err = match self {
            InjectedFault::NotFound => {
                io::Error::new(io::ErrorKind::NotFound, "injected: segments file missing")
            }
            InjectedFault::AccessDenied => {
                io::Error::new(io::ErrorKind::PermissionDenied, "injected: index locked")
            }
            InjectedFault::PartialWrite => {
                io::Error::new(io::ErrorKind::Other, "injected: segments.new pending")
            }
            InjectedFault::Other => {
                io::Error::new(io::ErrorKind::Other, "injected: unrecoverable failure")
            }
        };
        GatewayError::Io(io_err)
    }
}

/// Sized for "a feed with ~50 items about 100 KB" (§4.2): ~2 KB/doc,
/// comfortably above tantivy's own 3 MB-per-thread floor once scaled up to a
/// realistic buffer. Kept as a named constant rather than inlined so the
/// reasoning in the spec stays attached to the number.
const WRITER_MEMORY_BUDGET_BYTES: usize = 50_000_000;

/// Wraps the underlying single-writer tantivy session.
///
/// Every write-side method is only ever called from the worker thread (the
/// gateway's single mutator), but `num_documents` can be called from any
/// producer thread, so the mutator lock still has to exist: it's not a
/// re-entrancy guard for the worker, it's the boundary between the worker
/// and concurrent readers of `open`/document counts.
pub struct IndexHandle {
    index_name: String,
    location: IndexLocation,
    schema: DocumentSchema,
    analyzers: CultureAnalyzers,
    debug_sink: Arc<DebugSink>,
    merge_factor: usize,
    buffered_docs_per_segment: usize,

    open: AtomicBool,
    open_lock: Mutex<()>,

    index: Mutex<Option<Index>>,
    writer: Mutex<Option<IndexWriter>>,
    reader: Mutex<Option<IndexReader>>,

    injected_fault: Mutex<Option<InjectedFault>>,
}

impl IndexHandle {
    pub fn new(index_name: impl Into<String>, settings: &Settings, schema: DocumentSchema) -> Self {
        let index_name = index_name.into();
        Self {
            debug_sink: Arc::new(DebugSink::new(index_name.clone())),
            location: settings.location.clone(),
            analyzers: CultureAnalyzers::new(settings.default_language.clone()),
            schema,
            index_name,
            merge_factor: 20,
            buffered_docs_per_segment: 50,
            open: AtomicBool::new(false),
            open_lock: Mutex::new(()),
            index: Mutex::new(None),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            injected_fault: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Arms (or disarms, with `None`) a synthetic failure that the next
    /// write-side call will return instead of touching the real index.
    /// Test-only seam; production callers never call this.
    pub fn inject_fault(&self, fault: Option<InjectedFault>) {
        *self.injected_fault.lock() = fault;
    }

    /// Takes and clears the armed fault, if any, producing the error the
    /// recovery helper would see from a genuinely corrupt index.
    fn take_injected_fault(&self) -> Result<(), GatewayError> {
        match self.injected_fault.lock().take() {
            Some(fault) => Err(fault.as_error()),
            None => Ok(()),
        }
    }

    /// Opens a writer at the configured directory. If no index exists there,
    /// creates one; otherwise opens in append mode. Safe to call on a
    /// freshly reset directory.
    pub fn init(&self) -> Result<(), GatewayError> {
        let _guard = self.open_lock.lock();

        let index = self.open_or_create_index()?;
        self.open_writer_and_reader(index)?;
        self.open.store(true, Ordering::Release);

        self.debug_sink.emit(&format!("opened index '{}'", self.index_name));
        Ok(())
    }

    fn open_or_create_index(&self) -> Result<Index, GatewayError> {
        match &self.location {
            IndexLocation::Memory => Ok(Index::create_in_ram(self.schema.schema.clone())),
            IndexLocation::Directory(path) => {
                std::fs::create_dir_all(path)?;
                let directory = MmapDirectory::open(path)?;
                Ok(Index::open_or_create(directory, self.schema.schema.clone())?)
            }
        }
    }

    fn open_writer_and_reader(&self, index: Index) -> Result<(), GatewayError> {
        let mut writer = index.writer_with_num_threads(num_cpus::get().max(1), WRITER_MEMORY_BUDGET_BYTES)?;
        writer.set_merge_policy(Box::new(build_merge_policy(self.merge_factor)));

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommit)
            .try_into()?;

        *self.index.lock() = Some(index);
        *self.writer.lock() = Some(writer);
        *self.reader.lock() = Some(reader);
        Ok(())
    }

    /// Fails with `IndexClosed` when not open; takes the open-lock so the
    /// check sees a consistent view across a concurrent reset.
    pub fn assure_open(&self) -> Result<(), GatewayError> {
        let _guard = self.open_lock.lock();
        if self.is_open() {
            Ok(())
        } else {
            Err(GatewayError::IndexClosed)
        }
    }

    /// Appends a document, registering the culture's analyzer with the
    /// index's tokenizer manager for query-time use. The analyzer choice is
    /// per-call, never carried as writer state (§9).
    pub fn add(&self, document: Document, culture: Option<&str>) -> Result<(), GatewayError> {
        self.assure_open()?;
        self.take_injected_fault()?;
        self.register_culture(culture);

        let mut writer_guard = self.writer.lock();
        let writer = writer_guard.as_mut().ok_or(GatewayError::IndexClosed)?;
        writer.add_document(document);
        Ok(())
    }

    pub fn add_many(&self, documents: Vec<Document>, culture: Option<&str>) -> Result<(), GatewayError> {
        self.assure_open()?;
        self.take_injected_fault()?;
        self.register_culture(culture);

        let mut writer_guard = self.writer.lock();
        let writer = writer_guard.as_mut().ok_or(GatewayError::IndexClosed)?;
        for document in documents {
            writer.add_document(document);
        }
        Ok(())
    }

    fn register_culture(&self, culture: Option<&str>) {
        let analyzer = self.analyzers.analyzer_for(culture);
        if let Some(index) = self.index.lock().as_ref() {
            let name = culture.unwrap_or("default").to_string();
            index.tokenizers().register(&name, analyzer);
        }
    }

    /// Deletes all documents whose indexed field matches `term`.
    pub fn delete(&self, term: Term) -> Result<(), GatewayError> {
        self.assure_open()?;
        self.take_injected_fault()?;
        let mut writer_guard = self.writer.lock();
        let writer = writer_guard.as_mut().ok_or(GatewayError::IndexClosed)?;
        writer.delete_term(term);
        Ok(())
    }

    /// Merges segments into one. May be long-running; the worker never runs
    /// this during a final drain (§4.3).
    pub fn optimize(&self) -> Result<(), GatewayError> {
        self.assure_open()?;
        self.take_injected_fault()?;
        let index_name = self.index_name.clone();
        let mut writer_guard = self.writer.lock();
        let writer = writer_guard.as_mut().ok_or(GatewayError::IndexClosed)?;

        // Committing is what lets the configured `LogMergePolicy` notice the
        // segment count and schedule a merge; the merge itself then runs on
        // tantivy's own `merge_thread_*` pool, which is where §4.6's panic
        // boundary applies.
        let result = crate::merge_scheduler::swallowing_merge_panics(&index_name, || writer.commit());
        match result {
            Some(commit_result) => {
                commit_result?;
            }
            None => {
                // Panic already logged by `swallowing_merge_panics`; treated
                // like any other dropped merge attempt (§4.6).
            }
        }
        Ok(())
    }

    /// Closes the current writer to force on-disk visibility. Reopens a
    /// fresh writer afterward unless `close_writer_only` is set.
    pub fn flush(&self, close_writer_only: bool) -> Result<(), GatewayError> {
        self.assure_open()?;

        {
            let mut writer_guard = self.writer.lock();
            if let Some(writer) = writer_guard.as_mut() {
                writer.commit()?;
            }
            *writer_guard = None;
        }

        if let Some(reader) = self.reader.lock().as_ref() {
            reader.reload()?;
        }

        if !close_writer_only {
            let index = self.index.lock().as_ref().cloned();
            if let Some(index) = index {
                self.open_writer_and_reader(index)?;
            }
        }

        self.debug_sink.emit(&format!(
            "flushed index '{}' (close_writer_only={})",
            self.index_name, close_writer_only
        ));
        Ok(())
    }

    /// Closes; if the backing store is on-disk, removes the directory and
    /// recreates it. If in-memory, this is a no-op beyond closing and
    /// reopening. Directory mutation happens *outside* the open-lock to
    /// avoid a lock inversion between filesystem and open state (§5).
    pub fn reset(&self) -> Result<(), GatewayError> {
        {
            let _guard = self.open_lock.lock();
            self.open.store(false, Ordering::Release);
            *self.writer.lock() = None;
            *self.reader.lock() = None;
            *self.index.lock() = None;
        }

        if let IndexLocation::Directory(path) = &self.location {
            if path.exists() {
                std::fs::remove_dir_all(path)?;
            }
            std::fs::create_dir_all(path)?;
        }

        self.debug_sink.emit(&format!("reset index '{}'", self.index_name));
        self.init()
    }

    /// Closes the writer and marks the handle as not open. Idempotent.
    pub fn close(&self) -> Result<(), GatewayError> {
        let _guard = self.open_lock.lock();
        if !self.is_open() {
            return Ok(());
        }

        if let Some(writer) = self.writer.lock().as_mut() {
            writer.commit()?;
        }
        *self.writer.lock() = None;
        *self.reader.lock() = None;
        *self.index.lock() = None;
        self.open.store(false, Ordering::Release);

        self.debug_sink.emit(&format!("closed index '{}'", self.index_name));
        Ok(())
    }

    /// Reports the current document count under the mutator lock.
    pub fn num_documents(&self) -> Result<u64, GatewayError> {
        self.assure_open()?;
        let reader_guard = self.reader.lock();
        let reader = reader_guard.as_ref().ok_or(GatewayError::IndexClosed)?;
        Ok(reader.searcher().num_docs())
    }

    pub fn debug_sink(&self) -> Arc<DebugSink> {
        self.debug_sink.clone()
    }

    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSchema;

    fn memory_handle() -> IndexHandle {
        let settings = Settings::in_memory("en-US");
        let schema = DocumentSchema::default_schema();
        let handle = IndexHandle::new("test-index", &settings, schema);
        handle.init().unwrap();
        handle
    }

    #[test]
    fn add_then_flush_makes_document_visible() {
        let handle = memory_handle();
        let doc = handle.schema().make_document("item-1", "hello world");
        handle.add(doc, None).unwrap();
        handle.flush(false).unwrap();
        assert_eq!(handle.num_documents().unwrap(), 1);
    }

    #[test]
    fn closed_index_rejects_num_documents() {
        let handle = memory_handle();
        handle.close().unwrap();
        assert!(matches!(handle.num_documents(), Err(GatewayError::IndexClosed)));
    }

    #[test]
    fn injected_fault_surfaces_on_next_write_then_clears() {
        let handle = memory_handle();
        handle.inject_fault(Some(InjectedFault::NotFound));

        let doc = handle.schema().make_document("item-1", "hello world");
        assert!(handle.add(doc.clone(), None).is_err());

        // The fault is single-shot: the next call goes through normally.
        handle.add(doc, None).unwrap();
        handle.flush(false).unwrap();
        assert_eq!(handle.num_documents().unwrap(), 1);
    }

    #[test]
    fn reset_clears_document_count() {
        let handle = memory_handle();
        let doc = handle.schema().make_document("item-1", "hello world");
        handle.add(doc, None).unwrap();
        handle.flush(false).unwrap();
        assert_eq!(handle.num_documents().unwrap(), 1);

        handle.reset().unwrap();
        assert_eq!(handle.num_documents().unwrap(), 0);
    }
}
