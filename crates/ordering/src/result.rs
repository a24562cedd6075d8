//! The Ordering Engine's output: the three term tables (foreground,
//! background, exterior) the Matrix Assembler indexes against, plus the
//! raw recorded exchanges it assembles into `Af`/`Ad`/`Bf`.

use std::collections::HashMap;

use tarjan_core::{Direction, FlowRef, ProcessRef, TermRef};

use crate::error::OrderingError;

/// Where one end of a recorded exchange lands after partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Foreground(usize),
    Background(usize),
    Exterior(usize),
}

/// One interior or exterior edge discovered during traversal, with its
/// endpoints resolved to final table indices. `value` is the raw signed
/// coefficient exactly as recorded — the Matrix Assembler places it
/// unchanged; sign-convention direction decoding is a `FlatBackground`
/// read-time concern (spec.md §4.2/§4.3), not an assembly-time one.
#[derive(Debug, Clone, Copy)]
pub struct RecordedExchange {
    pub parent: Location,
    pub child: Location,
    pub value: f64,
}

/// The complete output of the Ordering Engine (spec.md §4.1).
pub struct Ordering {
    pub fg: Vec<TermRef>,
    pub bg: Vec<TermRef>,
    pub ex: Vec<TermRef>,
    pub fg_index: HashMap<(ProcessRef, FlowRef), usize>,
    pub bg_index: HashMap<(ProcessRef, FlowRef), usize>,
    pub ex_index: HashMap<(FlowRef, Direction, String), usize>,
    pub exchanges: Vec<RecordedExchange>,
    /// Foreground indices belonging to a non-trivial, non-background SCC —
    /// consumed by `Af` flattening in `tarjan-background`.
    pub nontrivial_fg_scc_members: Vec<usize>,
    /// Ambiguous terminations encountered during discovery, each resolved
    /// to a cutoff (spec.md §4.1 preference tiers).
    pub warnings: Vec<OrderingError>,
}
