use serde::{Deserialize, Serialize};

use crate::context::ContextKey;
use crate::direction::Direction;

/// Opaque external identifier for a process, as returned by the index.
pub type ProcessRef = String;

/// Opaque external identifier for a flow, as returned by the index.
pub type FlowRef = String;

/// One reference exchange of one process: the unit of demand in the
/// linear model. Uniquely identified by `(process_ref, flow_ref)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductFlow {
    pub process_ref: ProcessRef,
    pub flow_ref: FlowRef,
    pub direction: Direction,
}

impl ProductFlow {
    pub fn new(process_ref: impl Into<String>, flow_ref: impl Into<String>, direction: Direction) -> Self {
        ProductFlow {
            process_ref: process_ref.into(),
            flow_ref: flow_ref.into(),
            direction,
        }
    }

    pub fn key(&self) -> (ProcessRef, FlowRef) {
        (self.process_ref.clone(), self.flow_ref.clone())
    }
}

/// An environmental (elementary or cut-off) flow. Uniquely identified by
/// `(flow_ref, direction, context)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExteriorRef {
    pub flow_ref: FlowRef,
    pub direction: Direction,
    pub context: ContextKey,
}

/// The persisted form of a `ProductFlow` or `ExteriorRef`.
///
/// For a `ProductFlow`, `term_ref` is the producing process's external
/// reference. For an `ExteriorRef`, `term_ref` is the `"; "`-joined context
/// path (see `ContextKey::to_joined`). `scc_id` names the external
/// reference of a representative product flow in this node's non-trivial
/// SCC, or `None` if the node is not part of one ("trivial").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRef {
    pub flow_ref: FlowRef,
    pub direction: Direction,
    pub term_ref: String,
    pub scc_id: Option<ProcessRef>,
}

impl TermRef {
    pub fn new(
        flow_ref: impl Into<String>,
        direction: Direction,
        term_ref: impl Into<String>,
        scc_id: Option<ProcessRef>,
    ) -> Self {
        TermRef {
            flow_ref: flow_ref.into(),
            direction,
            term_ref: term_ref.into(),
            scc_id,
        }
    }

    pub fn is_in_scc(&self) -> bool {
        self.scc_id.is_some()
    }
}

/// Where an exchange's value is going: another product flow, an
/// environmental context, or nowhere (a cutoff).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    Process(ProcessRef),
    Context(ContextKey),
    Cutoff,
}

/// A fully terminated exchange, as yielded by `FlatBackground` queries.
/// `node_ref` is the process declaring the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchDef {
    pub node_ref: ProcessRef,
    pub flow_ref: FlowRef,
    pub direction: Direction,
    pub termination: Termination,
    pub value: f64,
}

impl ExchDef {
    pub fn new(
        node_ref: impl Into<String>,
        flow_ref: impl Into<String>,
        direction: Direction,
        termination: Termination,
        value: f64,
    ) -> Self {
        ExchDef {
            node_ref: node_ref.into(),
            flow_ref: flow_ref.into(),
            direction,
            termination,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_flow_key_matches_fields() {
        let pf = ProductFlow::new("p1", "f1", Direction::Output);
        assert_eq!(pf.key(), ("p1".to_string(), "f1".to_string()));
    }

    #[test]
    fn term_ref_scc_sentinel_is_none() {
        let tr = TermRef::new("f1", Direction::Output, "p1", None);
        assert!(!tr.is_in_scc());
        let tr2 = TermRef::new("f1", Direction::Output, "p1", Some("p1".to_string()));
        assert!(tr2.is_in_scc());
    }
}
