//! Single-writer serializing gateway in front of a `tantivy` index.
//!
//! Producers enqueue mutations (add, delete, optimize) onto a priority
//! queue; a dedicated worker thread drains them in bounded batches against
//! the one `tantivy::IndexWriter` the underlying library allows. See
//! `SPEC_FULL.md` at the workspace root for the full component design.

#[macro_use]
extern crate log;

mod debug_sink;
mod document;
mod error;
mod gateway;
mod index_handle;
mod merge_scheduler;
mod operation;
mod queue;
mod recovery;
mod settings;
mod worker;

pub use debug_sink::DebugSink;
pub use document::DocumentSchema;
pub use error::{FailureClass, GatewayError};
pub use gateway::IndexGateway;
pub use index_handle::InjectedFault;
pub use operation::{FinishedOperation, Operation};
pub use settings::{CultureAnalyzers, IndexLocation, Settings};
pub use worker::Observer;

pub use tantivy::{Document, Term};
