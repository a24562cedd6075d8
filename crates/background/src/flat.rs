//! Flat Background (spec.md §4.3): the immutable holder of the ordering
//! tables plus the five sparse matrices, answering every structural and
//! numerical query. Grounded on `implementation.py`'s
//! `TarjanBackgroundImplementation` (the query surface over a built
//! ordering) and `bm_static.py`'s solve dispatch.

use std::collections::{HashMap, HashSet, VecDeque};

use tarjan_core::{
    unit_vector, BuildOptions, ContextKey, CscMatrix, Direction, ExchDef, FlowRef, ProcessRef, SolveOptions, TermRef,
    Termination,
};
use tarjan_query::{ContextManager, IndexQuery, InventoryQuery};
use tarjan_ordering::Ordering;

use crate::assemble::assemble;
use crate::errors::BackgroundError;
use crate::flatten::flatten;
use crate::solve::{solve, LuCache};

fn decode_direction(stored: Direction, raw: f64) -> (Direction, f64) {
    if raw < 0.0 {
        (stored, -raw)
    } else {
        (stored.complement(), raw)
    }
}

fn termination_of(term: &TermRef, is_exterior: bool) -> Termination {
    if is_exterior {
        Termination::Context(ContextKey::from_joined(&term.term_ref))
    } else {
        Termination::Process(term.term_ref.clone())
    }
}

fn exch_for(node_ref: &str, child: &TermRef, raw: f64, is_exterior: bool) -> ExchDef {
    let (direction, value) = decode_direction(child.direction, raw);
    ExchDef::new(node_ref, child.flow_ref.clone(), direction, termination_of(child, is_exterior), value)
}

#[derive(Debug, Clone, Copy)]
enum NodeIndex {
    Foreground(usize),
    Background(usize),
}

/// One demand-bundle entry accepted by `sys_lci` (spec.md §4.3.2's "any
/// input exposing (process, flow, direction, termination, value,
/// context)"). `termination` is the already-normalized outcome of
/// resolving that input's termination, exactly as an `ExchangeRecord`'s
/// `termination` would be for a build-time row.
#[derive(Debug, Clone)]
pub struct DemandExchange {
    pub flow_ref: FlowRef,
    pub direction: Direction,
    pub termination: Option<Termination>,
    pub value: f64,
}

/// Result of `sys_lci`: numerical exchanges first in XR-index order, then
/// every unresolved input passed through unchanged, in input order
/// (spec.md §5 ordering guarantee).
#[derive(Debug, Clone)]
pub struct SysLciResult {
    pub exchanges: Vec<ExchDef>,
    pub missed: Vec<DemandExchange>,
}

/// `(x_tilde, x)` of spec.md's `activity_levels` query. `x` is `None` when
/// `A`/`B` are not loaded.
#[derive(Debug, Clone)]
pub struct ActivityLevels {
    pub x_tilde: Vec<f64>,
    pub x: Option<Vec<f64>>,
}

pub struct FlatBackground {
    pub fg: Vec<TermRef>,
    pub bg: Vec<TermRef>,
    pub ex: Vec<TermRef>,
    pub fg_index: HashMap<(ProcessRef, FlowRef), usize>,
    pub bg_index: HashMap<(ProcessRef, FlowRef), usize>,
    pub ex_index: HashMap<(FlowRef, Direction, String), usize>,
    pub af: CscMatrix,
    pub ad: CscMatrix,
    pub bf: CscMatrix,
    pub a: Option<CscMatrix>,
    pub b: Option<CscMatrix>,
    /// Ambiguous terminations the Ordering Engine downgraded to cutoffs.
    pub warnings: Vec<tarjan_ordering::OrderingError>,
    af_cache: LuCache,
    a_cache: LuCache,
}

impl FlatBackground {
    /// Run the Ordering Engine, assemble matrices, optionally flatten `Af`.
    /// `ctx_mgr` canonicalizes every exterior context discovered along the
    /// way (spec.md §4.1 input (vi)), so `fg`/`bg`/`ex` and everything
    /// persisted from them only ever carry canonical contexts.
    pub fn build<Q: IndexQuery, I: InventoryQuery, C: ContextManager>(index: &Q, inventory: &I, options: &BuildOptions, ctx_mgr: &C) -> FlatBackground {
        let ordering: Ordering = tarjan_ordering::build(index, inventory, options, ctx_mgr);
        let matrices = assemble(&ordering);

        let (af, ad, bf) = if options.flatten_af {
            let flattened = flatten(&matrices.af, &matrices.ad, &matrices.bf, &ordering.nontrivial_fg_scc_members);
            (flattened.af, flattened.ad, flattened.bf)
        } else {
            (matrices.af, matrices.ad, matrices.bf)
        };

        FlatBackground {
            fg: ordering.fg,
            bg: ordering.bg,
            ex: ordering.ex,
            fg_index: ordering.fg_index,
            bg_index: ordering.bg_index,
            ex_index: ordering.ex_index,
            af,
            ad,
            bf,
            a: matrices.a,
            b: matrices.b,
            warnings: ordering.warnings,
            af_cache: LuCache::new(),
            a_cache: LuCache::new(),
        }
    }

    /// Reassemble a `FlatBackground` from previously persisted parts (the
    /// `io` module's load path), bypassing the Ordering Engine entirely.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        fg: Vec<TermRef>,
        bg: Vec<TermRef>,
        ex: Vec<TermRef>,
        fg_index: HashMap<(ProcessRef, FlowRef), usize>,
        bg_index: HashMap<(ProcessRef, FlowRef), usize>,
        ex_index: HashMap<(FlowRef, Direction, String), usize>,
        af: CscMatrix,
        ad: CscMatrix,
        bf: CscMatrix,
        a: Option<CscMatrix>,
        b: Option<CscMatrix>,
    ) -> FlatBackground {
        FlatBackground {
            fg,
            bg,
            ex,
            fg_index,
            bg_index,
            ex_index,
            af,
            ad,
            bf,
            a,
            b,
            warnings: Vec::new(),
            af_cache: LuCache::new(),
            a_cache: LuCache::new(),
        }
    }

    fn index_of(&self, process_ref: &str, flow_ref: &str) -> Result<NodeIndex, BackgroundError> {
        let key = (process_ref.to_string(), flow_ref.to_string());
        if let Some(&i) = self.fg_index.get(&key) {
            return Ok(NodeIndex::Foreground(i));
        }
        if let Some(&i) = self.bg_index.get(&key) {
            return Ok(NodeIndex::Background(i));
        }
        Err(BackgroundError::UnknownTermination { process_ref: process_ref.to_string(), flow_ref: flow_ref.to_string() })
    }

    pub fn is_in_background(&self, process_ref: &str, flow_ref: &str) -> Result<bool, BackgroundError> {
        Ok(matches!(self.index_of(process_ref, flow_ref)?, NodeIndex::Background(_)))
    }

    pub fn is_in_scc(&self, process_ref: &str, flow_ref: &str) -> Result<bool, BackgroundError> {
        let term = match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => &self.fg[i],
            NodeIndex::Background(i) => &self.bg[i],
        };
        Ok(term.is_in_scc())
    }

    /// BFS from `(process_ref, flow_ref)` over non-zero columns of `Af`,
    /// yielding one `ExchDef` per visited edge plus the root self-entry of
    /// magnitude 1. `traverse=true` (re-enqueue children on repeat
    /// encounter) is only honored when `Af` is already strictly upper
    /// triangular (flattened); otherwise it is ignored with a warning,
    /// since an un-flattened `Af` can cycle forever.
    pub fn foreground(
        &self,
        process_ref: &str,
        flow_ref: &str,
        traverse: bool,
        exterior: bool,
    ) -> Result<Vec<ExchDef>, BackgroundError> {
        let idx = self.index_of(process_ref, flow_ref)?;
        let start = match idx {
            NodeIndex::Foreground(i) => i,
            NodeIndex::Background(i) => {
                let root = &self.bg[i];
                return Ok(vec![ExchDef::new(process_ref, root.flow_ref.clone(), root.direction, Termination::Process(process_ref.to_string()), 1.0)]);
            }
        };

        let root = &self.fg[start];
        let mut out = vec![ExchDef::new(process_ref, root.flow_ref.clone(), root.direction, Termination::Process(process_ref.to_string()), 1.0)];

        let allow_reenqueue = if traverse && !self.af.is_strictly_upper_triangular() {
            tracing::warn!(process = process_ref, flow = flow_ref, "traverse=true ignored on a non-flattened Af (infinite traversal risk)");
            false
        } else {
            traverse
        };

        let mut seen: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(start);
        seen.insert(start);

        while let Some(i) = queue.pop_front() {
            let parent_process = &self.fg[i].term_ref;
            for (j, v) in self.af.col(i) {
                out.push(exch_for(parent_process, &self.fg[j], v, false));
                if allow_reenqueue || seen.insert(j) {
                    queue.push_back(j);
                }
            }
            if exterior {
                for (k, v) in self.bf.col(i) {
                    out.push(exch_for(parent_process, &self.ex[k], v, true));
                }
            }
        }
        Ok(out)
    }

    pub fn dependencies(&self, process_ref: &str, flow_ref: &str) -> Result<Vec<ExchDef>, BackgroundError> {
        match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => {
                let own = &self.fg[i];
                let mut out: Vec<ExchDef> = self.af.col(i).map(|(j, v)| exch_for(&own.term_ref, &self.fg[j], v, false)).collect();
                out.extend(self.ad.col(i).map(|(j, v)| exch_for(&own.term_ref, &self.bg[j], v, false)));
                Ok(out)
            }
            NodeIndex::Background(i) => {
                let a = self.a.as_ref().ok_or(BackgroundError::NoLciDatabase)?;
                let own = &self.bg[i];
                Ok(a.col(i).map(|(j, v)| exch_for(&own.term_ref, &self.bg[j], v, false)).collect())
            }
        }
    }

    pub fn exterior(&self, process_ref: &str, flow_ref: &str) -> Result<Vec<ExchDef>, BackgroundError> {
        match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => {
                let own = &self.fg[i];
                Ok(self.bf.col(i).map(|(k, v)| exch_for(&own.term_ref, &self.ex[k], v, true)).collect())
            }
            NodeIndex::Background(i) => {
                let b = self.b.as_ref().ok_or(BackgroundError::NoLciDatabase)?;
                let own = &self.bg[i];
                Ok(b.col(i).map(|(k, v)| exch_for(&own.term_ref, &self.ex[k], v, true)).collect())
            }
        }
    }

    pub fn consumers(&self, process_ref: &str, flow_ref: &str) -> Result<Vec<ExchDef>, BackgroundError> {
        match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => {
                let own = &self.fg[i];
                Ok(self.af.row(i).into_iter().map(|(j, v)| exch_for(&self.fg[j].term_ref, own, v, false)).collect())
            }
            NodeIndex::Background(i) => {
                let own = &self.bg[i];
                let mut out: Vec<ExchDef> = self.ad.row(i).into_iter().map(|(j, v)| exch_for(&self.fg[j].term_ref, own, v, false)).collect();
                if let Some(a) = &self.a {
                    out.extend(a.row(i).into_iter().map(|(j, v)| exch_for(&self.bg[j].term_ref, own, v, false)));
                }
                Ok(out)
            }
        }
    }

    /// All foreground/background PFs with a non-zero `Bf`/`B` row entry
    /// whose XR matches `(flow, direction, context)`. `context` is
    /// canonicalized against `ctx_mgr` before comparison, matching
    /// `implementation.py`'s `self.context_map.get(ex.term_ref) != context`
    /// (the XR's own `term_ref` is already canonical, stored that way at
    /// build time).
    pub fn emitters<C: ContextManager>(&self, flow: &str, direction: Direction, context: Option<&ContextKey>, ctx_mgr: &C) -> Vec<ExchDef> {
        let canonical_context = context.map(|c| ctx_mgr.canonicalize(c));
        let matches_xr = |term: &TermRef| -> bool {
            term.flow_ref == flow && term.direction == direction && canonical_context.as_ref().map(|c| c.to_joined() == term.term_ref).unwrap_or(true)
        };

        let mut out = Vec::new();
        for (k, xr) in self.ex.iter().enumerate() {
            if !matches_xr(xr) {
                continue;
            }
            for (j, v) in self.bf.row(k) {
                out.push(exch_for(&self.fg[j].term_ref, xr, v, true));
            }
            if let Some(b) = &self.b {
                for (j, v) in b.row(k) {
                    out.push(exch_for(&self.bg[j].term_ref, xr, v, true));
                }
            }
        }
        out
    }

    /// Foreground activity-weighted background demand: `Ad . x_tilde`
    /// where `x_tilde = (I - Af)^{-1} u_i`.
    pub fn ad_vector(&self, process_ref: &str, flow_ref: &str, options: &SolveOptions) -> Result<Vec<ExchDef>, BackgroundError> {
        let i = match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => i,
            NodeIndex::Background(_) => return Err(BackgroundError::UnknownTermination { process_ref: process_ref.into(), flow_ref: flow_ref.into() }),
        };
        let u = unit_vector(self.fg.len(), i);
        let x_tilde = solve(&self.af, &u, options, &self.af_cache);
        let ad_tilde = self.ad.matvec_dense(&x_tilde);
        Ok(ad_tilde
            .into_iter()
            .enumerate()
            .filter(|&(_, v)| v != 0.0)
            .map(|(j, v)| exch_for(process_ref, &self.bg[j], v, false))
            .collect())
    }

    /// Foreground direct emissions: `Bf . x_tilde`.
    pub fn bf_vector(&self, process_ref: &str, flow_ref: &str, options: &SolveOptions) -> Result<Vec<ExchDef>, BackgroundError> {
        let i = match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => i,
            NodeIndex::Background(_) => return Err(BackgroundError::UnknownTermination { process_ref: process_ref.into(), flow_ref: flow_ref.into() }),
        };
        let u = unit_vector(self.fg.len(), i);
        let x_tilde = solve(&self.af, &u, options, &self.af_cache);
        let bf_tilde = self.bf.matvec_dense(&x_tilde);
        Ok(bf_tilde
            .into_iter()
            .enumerate()
            .filter(|&(_, v)| v != 0.0)
            .map(|(k, v)| exch_for(process_ref, &self.ex[k], v, true))
            .collect())
    }

    /// `activity_levels(p,f)`: `(x_tilde, x)`, `x = (I-A)^{-1} Ad x_tilde`
    /// when the complete background system is loaded.
    pub fn activity_levels(&self, process_ref: &str, flow_ref: &str, options: &SolveOptions) -> Result<ActivityLevels, BackgroundError> {
        match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => {
                let u = unit_vector(self.fg.len(), i);
                let x_tilde = solve(&self.af, &u, options, &self.af_cache);
                let x = self.a.as_ref().map(|a| {
                    let ad_tilde = self.ad.matvec_dense(&x_tilde);
                    solve(a, &ad_tilde, options, &self.a_cache)
                });
                Ok(ActivityLevels { x_tilde, x })
            }
            NodeIndex::Background(i) => {
                let a = self.a.as_ref().ok_or(BackgroundError::NoLciDatabase)?;
                let u = unit_vector(self.bg.len(), i);
                let x = solve(a, &u, options, &self.a_cache);
                Ok(ActivityLevels { x_tilde: vec![0.0; self.fg.len()], x: Some(x) })
            }
        }
    }

    /// Total elementary inventory for one unit of `(process_ref,
    /// flow_ref)` (spec.md §4.3.1).
    pub fn lci(&self, process_ref: &str, flow_ref: &str, options: &SolveOptions) -> Result<Vec<ExchDef>, BackgroundError> {
        let (ad_tilde, bf_tilde) = match self.index_of(process_ref, flow_ref)? {
            NodeIndex::Foreground(i) => {
                let u = unit_vector(self.fg.len(), i);
                let x_tilde = solve(&self.af, &u, options, &self.af_cache);
                (self.ad.matvec_dense(&x_tilde), self.bf.matvec_dense(&x_tilde))
            }
            NodeIndex::Background(i) => {
                if self.a.is_none() || self.b.is_none() {
                    return Err(BackgroundError::NoLciDatabase);
                }
                (unit_vector(self.bg.len(), i), vec![0.0; self.ex.len()])
            }
        };

        let result = match (&self.a, &self.b) {
            (Some(a), Some(b)) => {
                let x = solve(a, &ad_tilde, options, &self.a_cache);
                let bx = b.matvec_dense(&x);
                bf_tilde.iter().zip(&bx).map(|(a, b)| a + b).collect()
            }
            _ => bf_tilde,
        };

        Ok(result
            .into_iter()
            .enumerate()
            .filter(|&(_, v)| v != 0.0)
            .map(|(k, v)| exch_for(process_ref, &self.ex[k], v, true))
            .collect())
    }

    fn classify_demand(&self, entry: &DemandExchange) -> Option<(bool, usize, f64)> {
        let Some(Termination::Process(term_process)) = &entry.termination else {
            return None;
        };
        let key = (term_process.clone(), entry.flow_ref.clone());
        if let Some(&j) = self.fg_index.get(&key) {
            let stored = self.fg[j].direction;
            let value = if entry.direction == stored.complement() { entry.value } else { -entry.value };
            Some((true, j, value))
        } else if let Some(&j) = self.bg_index.get(&key) {
            let stored = self.bg[j].direction;
            let value = if entry.direction == stored.complement() { entry.value } else { -entry.value };
            Some((false, j, value))
        } else {
            None
        }
    }

    /// LCI over an arbitrary demand bundle (spec.md §4.3.2). Every entry
    /// either resolves to a foreground or background demand contribution,
    /// or falls through to `missed`, never a hard error.
    pub fn sys_lci(&self, demand: &[DemandExchange], options: &SolveOptions) -> SysLciResult {
        let mut fg_demand = vec![0.0; self.fg.len()];
        let mut bg_demand = vec![0.0; self.bg.len()];
        let mut missed = Vec::new();

        for entry in demand {
            match self.classify_demand(entry) {
                Some((true, j, v)) => fg_demand[j] += v,
                Some((false, j, v)) => bg_demand[j] += v,
                None => missed.push(entry.clone()),
            }
        }

        let x_tilde = solve(&self.af, &fg_demand, options, &self.af_cache);
        let mut ad_tilde = self.ad.matvec_dense(&x_tilde);
        for (d, bgd) in ad_tilde.iter_mut().zip(&bg_demand) {
            *d += bgd;
        }
        let bf_tilde = self.bf.matvec_dense(&x_tilde);

        let bx: Vec<f64> = match (&self.a, &self.b) {
            (Some(a), Some(b)) => {
                let x = solve(a, &ad_tilde, options, &self.a_cache);
                let bx = b.matvec_dense(&x);
                bf_tilde.iter().zip(&bx).map(|(a, b)| a + b).collect()
            }
            _ => bf_tilde,
        };

        let exchanges = bx
            .into_iter()
            .enumerate()
            .filter(|&(_, v)| v != 0.0)
            .map(|(k, v)| exch_for("", &self.ex[k], v, true))
            .collect();

        SysLciResult { exchanges, missed }
    }

    pub fn unit_scores(&self, characterization: &[f64]) -> (Vec<f64>, Option<Vec<f64>>) {
        assert_eq!(characterization.len(), self.ex.len(), "characterization vector must have one entry per exterior flow");
        let fg_scores = char_dot(&self.bf, characterization);
        let bg_scores = self.b.as_ref().map(|b| char_dot(b, characterization));
        (fg_scores, bg_scores)
    }

    /// `exterior(p,f)` split on context elementarity (supplemented from
    /// `implementation.py`): an entry is an *emission* iff its context is
    /// elementary per `ctx_mgr`.
    pub fn emissions<C: ContextManager>(&self, process_ref: &str, flow_ref: &str, ctx_mgr: &C) -> Result<Vec<ExchDef>, BackgroundError> {
        Ok(self
            .exterior(process_ref, flow_ref)?
            .into_iter()
            .filter(|e| matches!(&e.termination, Termination::Context(c) if ctx_mgr.is_elementary(c)))
            .collect())
    }

    /// The complement of `emissions` over the same `exterior(p,f)` set:
    /// non-elementary context, or no resolvable context at all.
    pub fn cutoffs<C: ContextManager>(&self, process_ref: &str, flow_ref: &str, ctx_mgr: &C) -> Result<Vec<ExchDef>, BackgroundError> {
        Ok(self
            .exterior(process_ref, flow_ref)?
            .into_iter()
            .filter(|e| !matches!(&e.termination, Termination::Context(c) if ctx_mgr.is_elementary(c)))
            .collect())
    }

    /// Foreground product flows with zero consumers: terminal products of
    /// the product system.
    pub fn product_models(&self) -> Vec<&TermRef> {
        (0..self.fg.len()).filter(|&i| self.af.row(i).is_empty()).map(|i| &self.fg[i]).collect()
    }
}

fn char_dot(m: &CscMatrix, characterization: &[f64]) -> Vec<f64> {
    (0..m.ncols())
        .map(|j| m.col(j).map(|(r, v)| characterization[r] * v).sum())
        .collect()
}
