//! Reachability discovery (spec.md §4.1 phase 1): an explicit work stack
//! seeded from every process's reference exchanges, discovering product
//! flows and the interior/exterior edges between them. Grounded on
//! `GraphStore`'s adjacency-list shape and on `flat_background.py`'s
//! `add_all_ref_products` traversal.

use std::collections::{HashMap, HashSet};

use tarjan_core::{Direction, ExteriorRef, FlowRef, ProcessRef, ProductFlow};
use tarjan_query::{ContextManager, ExchangeTermination, IndexQuery, InventoryQuery};

use crate::error::OrderingError;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy)]
pub enum RawEdge {
    Interior { child: NodeId, value: f64 },
    Exterior { exterior: usize, value: f64 },
}

/// The as-discovered graph: product-flow nodes with their raw (unflipped,
/// possibly negative) recorded coefficients. Sign-convention direction
/// flipping happens only when a `FlatBackground` reads these back out.
#[derive(Debug, Default)]
pub struct DiscoveredGraph {
    pub nodes: Vec<ProductFlow>,
    pub node_index: HashMap<(ProcessRef, FlowRef), NodeId>,
    pub adjacency: Vec<Vec<RawEdge>>,
    pub exterior_nodes: Vec<ExteriorRef>,
    pub exterior_index: HashMap<(FlowRef, Direction, String), usize>,
}

impl DiscoveredGraph {
    fn node_id(&mut self, pf: ProductFlow) -> NodeId {
        if let Some(&id) = self.node_index.get(&pf.key()) {
            return id;
        }
        let id = self.nodes.len();
        self.node_index.insert(pf.key(), id);
        self.nodes.push(pf);
        self.adjacency.push(Vec::new());
        id
    }

    fn exterior_id(&mut self, ext: ExteriorRef) -> usize {
        let key = (ext.flow_ref.clone(), ext.direction, ext.context.to_joined());
        if let Some(&id) = self.exterior_index.get(&key) {
            return id;
        }
        let id = self.exterior_nodes.len();
        self.exterior_index.insert(key, id);
        self.exterior_nodes.push(ext);
        id
    }
}

enum Resolution {
    Resolved(ProcessRef),
    Cutoff,
    Ambiguous(usize),
}

/// Preference tiers (a) `preferred_provider`, (b) termination named on the
/// exchange itself, (c) the single unambiguous producer the termination
/// oracle returns. Anything else is ambiguous and becomes a cutoff.
fn resolve_producer(
    flow_ref: &FlowRef,
    direction: Direction,
    explicit: Option<&ProcessRef>,
    preferred_provider: &HashMap<FlowRef, ProcessRef>,
    inventory: &impl InventoryQuery,
) -> Resolution {
    if let Some(p) = preferred_provider.get(flow_ref) {
        return Resolution::Resolved(p.clone());
    }
    if let Some(p) = explicit {
        return Resolution::Resolved(p.clone());
    }
    let candidates = inventory.terminate(flow_ref, direction);
    match candidates.len() {
        0 => Resolution::Cutoff,
        1 => Resolution::Resolved(candidates[0].clone()),
        n => Resolution::Ambiguous(n),
    }
}

/// Discover the reachability graph. `stack` is an explicit LIFO work list:
/// no recursion is used, matching spec.md's requirement that both the
/// discovery pass and the SCC pass run as iterative stack machines.
///
/// Every context a raw exchange terminates to is canonicalized against
/// `ctx_mgr` before it is recorded, so the exterior node table — and
/// everything built from it, including what gets persisted — only ever
/// holds canonical contexts (spec.md §2/§3's serialization round-trip
/// invariant; `flat_background.py::map_contexts` does the same).
pub fn discover<Q: IndexQuery, I: InventoryQuery, C: ContextManager>(
    index: &Q,
    inventory: &I,
    preferred_provider: &HashMap<FlowRef, ProcessRef>,
    ctx_mgr: &C,
) -> (DiscoveredGraph, Vec<OrderingError>) {
    let mut graph = DiscoveredGraph::default();
    let mut warnings = Vec::new();
    let mut stack: Vec<NodeId> = Vec::new();

    for process_ref in index.processes() {
        let ref_exchanges = inventory.reference_exchanges(&process_ref);
        if ref_exchanges.is_empty() {
            tracing::warn!(process = %process_ref, "process has no reference exchange, skipped");
            continue;
        }
        for r in ref_exchanges {
            let pf = ProductFlow::new(process_ref.clone(), r.flow_ref, r.direction);
            let id = graph.node_id(pf);
            stack.push(id);
        }
    }

    let mut expanded: HashSet<NodeId> = HashSet::new();
    while let Some(node_id) = stack.pop() {
        if !expanded.insert(node_id) {
            continue;
        }
        let pf = graph.nodes[node_id].clone();
        for row in inventory.inventory(&pf.process_ref, &pf.flow_ref) {
            let explicit = match &row.termination {
                Some(ExchangeTermination::Context(ctx)) => {
                    let ext = ExteriorRef { flow_ref: row.flow_ref.clone(), direction: row.direction, context: ctx_mgr.canonicalize(ctx) };
                    let ext_id = graph.exterior_id(ext);
                    graph.adjacency[node_id].push(RawEdge::Exterior { exterior: ext_id, value: row.value });
                    continue;
                }
                Some(ExchangeTermination::Process(p)) => Some(p),
                None => None,
            };

            match resolve_producer(&row.flow_ref, row.direction, explicit, preferred_provider, inventory) {
                Resolution::Resolved(producer) => {
                    let child_pf = ProductFlow::new(producer, row.flow_ref.clone(), row.direction.complement());
                    let child_id = graph.node_id(child_pf);
                    graph.adjacency[node_id].push(RawEdge::Interior { child: child_id, value: row.value });
                    stack.push(child_id);
                }
                Resolution::Cutoff => {}
                Resolution::Ambiguous(candidate_count) => {
                    tracing::warn!(
                        process = %pf.process_ref,
                        flow = %row.flow_ref,
                        candidate_count,
                        "ambiguous termination, treated as cutoff"
                    );
                    warnings.push(OrderingError::AmbiguousReference {
                        process_ref: pf.process_ref.clone(),
                        flow_ref: row.flow_ref.clone(),
                        direction: row.direction,
                        candidate_count,
                    });
                }
            }
        }
        // adjacency[node_id] may have grown new nodes past the length it
        // had when pushed; that's fine, node_id itself is stable.
        let _ = node_id;
    }

    (graph, warnings)
}
