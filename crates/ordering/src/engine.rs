//! Orchestrates the Ordering Engine's three phases: discovery, SCC, and
//! partition/renumbering (spec.md §4.1).

use std::collections::HashMap;

use tarjan_core::{BuildOptions, TermRef};
use tarjan_query::{ContextManager, IndexQuery, InventoryQuery};

use crate::graph::{discover, NodeId, RawEdge};
use crate::partition::{self, partition};
use crate::result::{Location, Ordering, RecordedExchange};
use crate::tarjan::tarjan_scc;

/// Build a complete `Ordering` by walking every process's reference
/// exchanges, condensing the result into SCCs, and partitioning the
/// condensation into foreground and background. `ctx_mgr` canonicalizes
/// every exterior context discovered along the way (spec.md §4.1 input
/// (vi)) before it is recorded in `ex`, so the persisted ordering never
/// carries a raw, non-canonical context.
pub fn build<Q: IndexQuery, I: InventoryQuery, C: ContextManager>(index: &Q, inventory: &I, options: &BuildOptions, ctx_mgr: &C) -> Ordering {
    let (graph, warnings) = discover(index, inventory, &options.preferred_provider, ctx_mgr);

    let interior_adjacency: Vec<Vec<NodeId>> = graph
        .adjacency
        .iter()
        .map(|edges| {
            edges
                .iter()
                .filter_map(|e| match e {
                    RawEdge::Interior { child, .. } => Some(*child),
                    RawEdge::Exterior { .. } => None,
                })
                .collect()
        })
        .collect();

    let tarjan = tarjan_scc(&interior_adjacency);
    let part = partition(&interior_adjacency, &tarjan);

    if !options.quiet {
        tracing::info!(
            product_flows = graph.nodes.len(),
            exterior_flows = graph.exterior_nodes.len(),
            sccs = tarjan.sccs.len(),
            foreground = part.foreground_rank.len(),
            background = part.background_rank.len(),
            ambiguous = warnings.len(),
            "ordering built"
        );
    }

    let fg_count = part.foreground_rank.len();
    let bg_count = part.background_rank.len();
    let mut fg: Vec<Option<TermRef>> = vec![None; fg_count];
    let mut bg: Vec<Option<TermRef>> = vec![None; bg_count];
    let mut fg_index = HashMap::new();
    let mut bg_index = HashMap::new();

    for (node_id, pf) in graph.nodes.iter().enumerate() {
        let scc_id = tarjan.scc_of[node_id];
        let members = &tarjan.sccs[scc_id];
        let scc_representative = if partition::is_nontrivial(members, &interior_adjacency) {
            Some(graph.nodes[members[0]].process_ref.clone())
        } else {
            None
        };
        let term_ref = TermRef::new(pf.flow_ref.clone(), pf.direction, pf.process_ref.clone(), scc_representative);

        if part.is_background[node_id] {
            let rank = part.background_rank[&node_id];
            bg[rank] = Some(term_ref);
            bg_index.insert(pf.key(), rank);
        } else {
            let rank = part.foreground_rank[&node_id];
            fg[rank] = Some(term_ref);
            fg_index.insert(pf.key(), rank);
        }
    }

    let fg: Vec<TermRef> = fg.into_iter().map(|t| t.expect("every foreground rank is assigned exactly once")).collect();
    let bg: Vec<TermRef> = bg.into_iter().map(|t| t.expect("every background rank is assigned exactly once")).collect();
    let ex: Vec<TermRef> = graph
        .exterior_nodes
        .iter()
        .map(|e| TermRef::new(e.flow_ref.clone(), e.direction, e.context.to_joined(), None))
        .collect();

    let location_of = |node_id: NodeId| -> Location {
        if part.is_background[node_id] {
            Location::Background(part.background_rank[&node_id])
        } else {
            Location::Foreground(part.foreground_rank[&node_id])
        }
    };

    let mut exchanges = Vec::new();
    for (node_id, edges) in graph.adjacency.iter().enumerate() {
        let parent = location_of(node_id);
        for edge in edges {
            let child = match *edge {
                RawEdge::Interior { child, .. } => location_of(child),
                RawEdge::Exterior { exterior, .. } => Location::Exterior(exterior),
            };
            let value = match *edge {
                RawEdge::Interior { value, .. } | RawEdge::Exterior { value, .. } => value,
            };
            exchanges.push(RecordedExchange { parent, child, value });
        }
    }

    Ordering {
        fg,
        bg,
        ex,
        fg_index,
        bg_index,
        ex_index: graph.exterior_index,
        exchanges,
        nontrivial_fg_scc_members: part.nontrivial_fg_scc_members,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use tarjan_core::{ContextKey, Direction};
    use tarjan_query::{ExchangeRecord, ExchangeTermination, ProcessHandle, ReferenceExchange};

    struct IdentityContextManager;
    impl ContextManager for IdentityContextManager {
        fn canonicalize(&self, key: &ContextKey) -> ContextKey {
            key.clone()
        }
        fn is_elementary(&self, _key: &ContextKey) -> bool {
            true
        }
    }

    struct TestProcess {
        external_ref: String,
        ref_flows: Vec<String>,
    }

    impl ProcessHandle for TestProcess {
        fn external_ref(&self) -> String {
            self.external_ref.clone()
        }
        fn reference_flow(&self, hint: Option<&str>) -> Option<String> {
            match hint {
                Some(h) => self.ref_flows.iter().find(|f| f.as_str() == h).cloned(),
                None => self.ref_flows.first().cloned(),
            }
        }
    }

    struct TestIndex {
        processes: Map<String, TestProcess>,
    }

    impl IndexQuery for TestIndex {
        type Process = TestProcess;
        fn get(&self, external_ref: &str) -> Option<TestProcess> {
            self.processes.get(external_ref).map(|p| TestProcess {
                external_ref: p.external_ref.clone(),
                ref_flows: p.ref_flows.clone(),
            })
        }
        fn processes(&self) -> Vec<String> {
            self.processes.keys().cloned().collect()
        }
    }

    struct TestInventory {
        reference_exchanges: Map<String, Vec<ReferenceExchange>>,
        rows: Map<(String, String), Vec<ExchangeRecord>>,
    }

    impl InventoryQuery for TestInventory {
        fn reference_exchanges(&self, process: &String) -> Vec<ReferenceExchange> {
            self.reference_exchanges.get(process).cloned().unwrap_or_default()
        }
        fn inventory(&self, process: &String, ref_flow: &String) -> Vec<ExchangeRecord> {
            self.rows.get(&(process.clone(), ref_flow.clone())).cloned().unwrap_or_default()
        }
        fn terminate(&self, _flow: &String, _direction: Direction) -> Vec<String> {
            Vec::new()
        }
    }

    /// Two disjoint dependency chains: "car" needs only "steel" (acyclic,
    /// foreground); a separate "reclaimer" needs "scrap" from a two-process
    /// recycling loop (background). Because a background parent can never
    /// have a foreground child, the loop pulls in "reclaimer" too, but
    /// leaves "car"/"steel" untouched since nothing connects the two chains.
    fn fixture() -> (TestIndex, TestInventory) {
        let mut processes = Map::new();
        processes.insert("car".into(), TestProcess { external_ref: "car".into(), ref_flows: vec!["car".into()] });
        processes.insert("steel".into(), TestProcess { external_ref: "steel".into(), ref_flows: vec!["steel".into()] });
        processes.insert("reclaimer".into(), TestProcess { external_ref: "reclaimer".into(), ref_flows: vec!["reclaimed".into()] });
        processes.insert("recycle_a".into(), TestProcess { external_ref: "recycle_a".into(), ref_flows: vec!["scrap".into()] });
        processes.insert("recycle_b".into(), TestProcess { external_ref: "recycle_b".into(), ref_flows: vec!["slag".into()] });

        let mut reference_exchanges = Map::new();
        reference_exchanges.insert("car".into(), vec![ReferenceExchange { flow_ref: "car".into(), direction: Direction::Output }]);
        reference_exchanges.insert("steel".into(), vec![ReferenceExchange { flow_ref: "steel".into(), direction: Direction::Output }]);
        reference_exchanges.insert("reclaimer".into(), vec![ReferenceExchange { flow_ref: "reclaimed".into(), direction: Direction::Output }]);
        reference_exchanges.insert("recycle_a".into(), vec![ReferenceExchange { flow_ref: "scrap".into(), direction: Direction::Output }]);
        reference_exchanges.insert("recycle_b".into(), vec![ReferenceExchange { flow_ref: "slag".into(), direction: Direction::Output }]);

        let mut rows = Map::new();
        rows.insert(
            ("car".to_string(), "car".to_string()),
            vec![ExchangeRecord { flow_ref: "steel".into(), direction: Direction::Input, termination: Some(ExchangeTermination::Process("steel".into())), value: 1.0 }],
        );
        rows.insert(
            ("steel".to_string(), "steel".to_string()),
            vec![ExchangeRecord { flow_ref: "CO2".into(), direction: Direction::Output, termination: Some(ExchangeTermination::Context(ContextKey::new(["air"]))), value: 1.8 }],
        );
        rows.insert(
            ("reclaimer".to_string(), "reclaimed".to_string()),
            vec![ExchangeRecord { flow_ref: "scrap".into(), direction: Direction::Input, termination: Some(ExchangeTermination::Process("recycle_a".into())), value: 0.2 }],
        );
        rows.insert(
            ("recycle_a".to_string(), "scrap".to_string()),
            vec![ExchangeRecord { flow_ref: "slag".into(), direction: Direction::Input, termination: Some(ExchangeTermination::Process("recycle_b".into())), value: 0.5 }],
        );
        rows.insert(
            ("recycle_b".to_string(), "slag".to_string()),
            vec![ExchangeRecord { flow_ref: "scrap".into(), direction: Direction::Input, termination: Some(ExchangeTermination::Process("recycle_a".into())), value: 0.3 }],
        );

        (TestIndex { processes }, TestInventory { reference_exchanges, rows })
    }

    #[test]
    fn acyclic_dependency_is_foreground_and_cycle_is_background() {
        let (index, inventory) = fixture();
        let ordering = build(&index, &inventory, &BuildOptions::default(), &IdentityContextManager);

        assert!(ordering.warnings.is_empty());
        assert!(ordering.fg_index.contains_key(&("car".to_string(), "car".to_string())));
        assert!(ordering.fg_index.contains_key(&("steel".to_string(), "steel".to_string())));
        assert!(ordering.bg_index.contains_key(&("reclaimer".to_string(), "reclaimed".to_string())));
        assert!(ordering.bg_index.contains_key(&("recycle_a".to_string(), "scrap".to_string())));
        assert!(ordering.bg_index.contains_key(&("recycle_b".to_string(), "slag".to_string())));

        let car_rank = ordering.fg_index[&("car".to_string(), "car".to_string())];
        let steel_rank = ordering.fg_index[&("steel".to_string(), "steel".to_string())];
        assert!(steel_rank > car_rank, "child (steel) must outrank parent (car)");

        assert_eq!(ordering.ex.len(), 1);
        assert_eq!(ordering.ex[0].term_ref, "air");
    }
}
