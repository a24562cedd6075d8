use thiserror::Error;

use tarjan_core::{Direction, FlowRef, ProcessRef};

/// Errors raised while building an `Ordering` (spec.md §4.1).
#[derive(Error, Debug)]
pub enum OrderingError {
    /// Preference tiers (a)/(b)/(c) all failed to pick a single producer.
    #[error("ambiguous termination for flow '{flow_ref}' ({direction}) needed by '{process_ref}': {candidate_count} candidates")]
    AmbiguousReference {
        process_ref: ProcessRef,
        flow_ref: FlowRef,
        direction: Direction,
        candidate_count: usize,
    },
}
