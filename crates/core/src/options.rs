use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::flow::{FlowRef, ProcessRef};

/// Numerical solver used for `(I - A)x = y` systems (spec.md §4.3.1/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Solver {
    /// Power-series accumulation `sum_k A^k y`, stopped by `threshold`/`max_iter`.
    #[default]
    Iterative,
    /// One-shot direct sparse solve.
    Spsolve,
    /// Direct solve via an LU factorization cached for the life of the background.
    Factorize,
}

/// Build-time configuration recognized by the Ordering Engine (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Tie-breaker for ambiguous terminations: `flow_ref -> preferred process_ref`.
    #[serde(default)]
    pub preferred_provider: HashMap<FlowRef, ProcessRef>,
    /// Enable `Af` flattening (collapse non-background SCCs algebraically).
    #[serde(default)]
    pub flatten_af: bool,
    /// Suppress progress logging.
    #[serde(default)]
    pub quiet: bool,
    /// Serialize immediately after a successful build.
    #[serde(default)]
    pub save_after: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            preferred_provider: HashMap::new(),
            flatten_af: false,
            quiet: false,
            save_after: false,
        }
    }
}

/// Numerical controls recognized by `FlatBackground` queries (spec.md §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolveOptions {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default)]
    pub solver: Solver,
    #[serde(default)]
    pub quiet: bool,
}

fn default_threshold() -> f64 {
    1e-8
}

fn default_max_iter() -> usize {
    100
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            threshold: default_threshold(),
            max_iter: default_max_iter(),
            solver: Solver::default(),
            quiet: false,
        }
    }
}
