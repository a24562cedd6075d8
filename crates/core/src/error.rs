use thiserror::Error;

/// Errors shared across the ordering engine and the flat background.
/// Crate-specific kinds (ambiguous-reference, no-lci-database, ...) live
/// next to the code that raises them and wrap this one via `#[from]`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown termination for process '{process_ref}', flow '{flow_ref}'")]
    UnknownTermination { process_ref: String, flow_ref: String },

    #[error("{0}")]
    Other(String),
}
