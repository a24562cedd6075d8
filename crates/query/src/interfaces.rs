//! External collaborator interfaces (spec.md §6). These are consumed, not
//! implemented, by this crate: the catalog/index, the inventory provider,
//! and the context manager are out of scope (spec.md §1) and live in the
//! host application.

use tarjan_core::{ContextKey, Direction, FlowRef, ProcessRef};

/// A process handle as returned by the index: enough to resolve a named
/// or hinted reference exchange to its flow.
pub trait ProcessHandle {
    fn external_ref(&self) -> ProcessRef;

    /// Resolve `hint` (a flow external ref, or `None` for "the" reference
    /// flow when the process has exactly one) to one of this process's
    /// reference flows. `None` on no match or ambiguity.
    fn reference_flow(&self, hint: Option<&str>) -> Option<FlowRef>;
}

/// An exchange handle, used only when the Query Surface is given a direct
/// exchange reference (spec.md §4.4).
pub trait ExchangeHandle {
    fn is_reference(&self) -> bool;
    fn process_ref(&self) -> ProcessRef;
    fn flow_ref(&self) -> FlowRef;
}

/// The catalog/index interface consumed at build and query time.
pub trait IndexQuery {
    type Process: ProcessHandle;

    fn get(&self, external_ref: &str) -> Option<Self::Process>;
    fn processes(&self) -> Vec<ProcessRef>;
}

/// Where a build-time inventory exchange points.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeTermination {
    Process(ProcessRef),
    Context(ContextKey),
}

/// One reference exchange of a process, as yielded by `InventoryQuery::reference_exchanges`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceExchange {
    pub flow_ref: FlowRef,
    pub direction: Direction,
}

/// One allocated inventory exchange, as yielded by `InventoryQuery::inventory`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRecord {
    pub flow_ref: FlowRef,
    pub direction: Direction,
    /// `None` when the exchange names no termination of its own; the
    /// Ordering Engine then consults `InventoryQuery::terminate` (preference
    /// tier c) before falling back to a cutoff.
    pub termination: Option<ExchangeTermination>,
    pub value: f64,
}

/// The exchange/inventory interface consumed at build time only (spec.md §6).
pub trait InventoryQuery {
    fn reference_exchanges(&self, process: &ProcessRef) -> Vec<ReferenceExchange>;
    fn inventory(&self, process: &ProcessRef, ref_flow: &FlowRef) -> Vec<ExchangeRecord>;
    /// Zero or more processes that can produce `(flow, direction)`.
    fn terminate(&self, flow: &FlowRef, direction: Direction) -> Vec<ProcessRef>;
}

/// Canonicalizes a persisted/raw context path against a live index.
pub trait ContextManager {
    fn canonicalize(&self, key: &ContextKey) -> ContextKey;
    /// `true` when the canonical context denotes an elementary flow
    /// (drives the emissions/cutoffs split, spec.md §9 open question).
    fn is_elementary(&self, key: &ContextKey) -> bool;
}
