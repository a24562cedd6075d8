use thiserror::Error;

use tarjan_core::{FlowRef, ProcessRef};
use tarjan_ordering::OrderingError;

/// Errors raised assembling, persisting, or querying a `FlatBackground`
/// (spec.md §7).
#[derive(Error, Debug)]
pub enum BackgroundError {
    /// A numerical query needed the complete background system (`A`/`B`)
    /// but it was not built or loaded.
    #[error("no complete background system (A/B) available for this query")]
    NoLciDatabase,

    /// Serialization path had an extension outside the accepted set.
    #[error("unsupported file type: '{0}'")]
    UnsupportedFiletype(String),

    /// `index_of` was given a `(process, flow)` absent from both the
    /// foreground and background index.
    #[error("unknown termination for process '{process_ref}', flow '{flow_ref}'")]
    UnknownTermination { process_ref: ProcessRef, flow_ref: FlowRef },

    /// A format is acknowledged but has no reader/writer yet (e.g. HDF5).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error(transparent)]
    Query(#[from] tarjan_query::QueryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
