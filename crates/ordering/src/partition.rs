//! Foreground/background partition and renumbering (spec.md §4.1 phase 3).
//!
//! spec.md's phase-2 wording — "an SCC is background when any of its nodes
//! depends (transitively) on a background-classified node" — propagates
//! background-ness from a dependency up to whatever consumes it. Taken
//! alone that's one-directional: a plain acyclic leaf shared between a
//! background consumer and nothing else would stay "foreground" even
//! though a background node now points at it, which the data model can't
//! represent (`Af`/`Ad`/`A` have no cell for a background parent with a
//! foreground child). So background-ness here is the full closure: the set
//! of SCCs reachable from any non-trivial ("seed") SCC by following
//! condensation edges in *either* direction — equivalently, the union of
//! whichever weakly-connected components of the condensation contain a
//! seed. Every edge a background parent records therefore always lands on
//! a background or exterior child, never a foreground one.
//!
//! Foreground product flows are renumbered in reverse of Tarjan's natural
//! completion order: the last SCC it closes (a pure "root", nothing
//! depends on it) gets the lowest indices, the first SCC it closes (a pure
//! "leaf", no further dependencies) gets the highest. That guarantees every
//! recorded interior edge parent -> child satisfies `rank(child) >
//! rank(parent)`, the triangularity invariant a flattened `Af` must hold.

use std::collections::HashMap;

use crate::graph::NodeId;
use crate::tarjan::TarjanResult;

pub struct Partition {
    pub foreground_rank: HashMap<NodeId, usize>,
    pub background_rank: HashMap<NodeId, usize>,
    pub is_background: Vec<bool>,
    /// Foreground indices (post-renumbering) belonging to a non-trivial,
    /// non-background SCC — the set `flat_background.py::split_af` calls
    /// `_inds`, consumed by `Af` flattening.
    pub nontrivial_fg_scc_members: Vec<usize>,
}

fn has_self_loop(node: NodeId, adjacency: &[Vec<NodeId>]) -> bool {
    adjacency[node].contains(&node)
}

pub(crate) fn is_nontrivial(members: &[NodeId], adjacency: &[Vec<NodeId>]) -> bool {
    members.len() > 1 || has_self_loop(members[0], adjacency)
}

/// Background closure over the SCC condensation, seeded by non-trivial
/// SCCs and grown along undirected condensation edges via an explicit
/// work stack.
fn background_closure(adjacency: &[Vec<NodeId>], tarjan: &TarjanResult) -> Vec<bool> {
    let num_sccs = tarjan.sccs.len();
    let mut scc_adjacency: Vec<Vec<usize>> = vec![Vec::new(); num_sccs];
    for (v, children) in adjacency.iter().enumerate() {
        for &w in children {
            let (sv, sw) = (tarjan.scc_of[v], tarjan.scc_of[w]);
            if sv != sw {
                scc_adjacency[sv].push(sw);
                scc_adjacency[sw].push(sv);
            }
        }
    }

    let mut is_background_scc = vec![false; num_sccs];
    let mut stack: Vec<usize> = Vec::new();
    for scc_id in 0..num_sccs {
        if is_nontrivial(&tarjan.sccs[scc_id], adjacency) {
            is_background_scc[scc_id] = true;
            stack.push(scc_id);
        }
    }
    while let Some(scc_id) = stack.pop() {
        for &neighbor in &scc_adjacency[scc_id] {
            if !is_background_scc[neighbor] {
                is_background_scc[neighbor] = true;
                stack.push(neighbor);
            }
        }
    }
    is_background_scc
}

pub fn partition(adjacency: &[Vec<NodeId>], tarjan: &TarjanResult) -> Partition {
    let n = adjacency.len();
    let num_sccs = tarjan.sccs.len();
    let is_background_scc = background_closure(adjacency, tarjan);

    let mut is_background = vec![false; n];
    for node in 0..n {
        is_background[node] = is_background_scc[tarjan.scc_of[node]];
    }

    let mut foreground_rank = HashMap::new();
    let mut next_fg = 0usize;
    for scc_id in (0..num_sccs).rev() {
        if is_background_scc[scc_id] {
            continue;
        }
        for &node in &tarjan.sccs[scc_id] {
            foreground_rank.insert(node, next_fg);
            next_fg += 1;
        }
    }

    let mut background_rank = HashMap::new();
    let mut next_bg = 0usize;
    for scc_id in 0..num_sccs {
        if !is_background_scc[scc_id] {
            continue;
        }
        for &node in &tarjan.sccs[scc_id] {
            background_rank.insert(node, next_bg);
            next_bg += 1;
        }
    }

    let mut nontrivial_fg_scc_members = Vec::new();
    for scc_id in 0..num_sccs {
        if is_background_scc[scc_id] {
            continue;
        }
        let members = &tarjan.sccs[scc_id];
        if is_nontrivial(members, adjacency) {
            for &node in members {
                nontrivial_fg_scc_members.push(foreground_rank[&node]);
            }
        }
    }
    nontrivial_fg_scc_members.sort_unstable();

    Partition { foreground_rank, background_rank, is_background, nontrivial_fg_scc_members }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tarjan::tarjan_scc;

    #[test]
    fn acyclic_chain_is_entirely_foreground_with_child_outranking_parent() {
        let adj = vec![vec![1], vec![2], vec![]];
        let tarjan = tarjan_scc(&adj);
        let p = partition(&adj, &tarjan);
        assert!(p.is_background.iter().all(|&b| !b));
        assert!(p.foreground_rank[&1] > p.foreground_rank[&0]);
        assert!(p.foreground_rank[&2] > p.foreground_rank[&1]);
        assert!(p.nontrivial_fg_scc_members.is_empty());
    }

    #[test]
    fn cycle_and_its_dependents_are_background() {
        // 0 -> 1 -> 2 -> 0 (cycle), 3 -> 0 (consumer of the cycle).
        let adj = vec![vec![1], vec![2], vec![0], vec![0]];
        let tarjan = tarjan_scc(&adj);
        let p = partition(&adj, &tarjan);
        assert!(p.is_background[0]);
        assert!(p.is_background[1]);
        assert!(p.is_background[2]);
        assert!(p.is_background[3], "node depending on a cyclic SCC must also be background");
    }

    #[test]
    fn a_leaf_shared_only_with_a_background_consumer_is_also_background() {
        // cycle 0 -> 1 -> 2 -> 0; 0 also depends on plain leaf 3.
        let adj = vec![vec![1, 3], vec![2], vec![0], vec![]];
        let tarjan = tarjan_scc(&adj);
        let p = partition(&adj, &tarjan);
        assert!(p.is_background[3], "a dependency of a background node can never be foreground (Af/Ad have no bg-parent/fg-child cell)");
    }

    #[test]
    fn self_loop_is_nontrivial_background() {
        let adj = vec![vec![0], vec![0]];
        let tarjan = tarjan_scc(&adj);
        let p = partition(&adj, &tarjan);
        assert!(p.is_background[0]);
        assert!(p.is_background[1]);
    }

    #[test]
    fn independent_branches_both_land_in_foreground() {
        // 0 -> 1, 2 -> 1 (two independent consumers of the same leaf).
        let adj = vec![vec![1], vec![], vec![1]];
        let tarjan = tarjan_scc(&adj);
        let p = partition(&adj, &tarjan);
        assert!(p.is_background.iter().all(|&b| !b));
        assert!(p.foreground_rank[&1] > p.foreground_rank[&0]);
        assert!(p.foreground_rank[&1] > p.foreground_rank[&2]);
    }
}
