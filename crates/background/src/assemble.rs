//! Matrix Assembler (spec.md §4.2): a pure function from an `Ordering` to
//! the five sparse matrices. Grounded on `flat_background.py`'s direct
//! construction of `_af`/`_ad`/`_bf`/`_a`/`_b` as `scipy.sparse` CSC
//! matrices from the same kind of (row, col, value) triplets.

use tarjan_core::CscMatrix;
use tarjan_ordering::{Location, Ordering};

/// The five sparse matrices spec.md §3 names. `a`/`b` are always built here
/// (the Ordering Engine records every reachable exchange, background
/// included) but are `Option` because a *loaded* `FlatBackground` may have
/// been persisted without them.
pub struct Matrices {
    pub af: CscMatrix,
    pub ad: CscMatrix,
    pub bf: CscMatrix,
    pub a: Option<CscMatrix>,
    pub b: Option<CscMatrix>,
}

/// Assemble matrices from the ordering's recorded exchanges. A background
/// parent's child is always background or exterior (partition.rs closes
/// background over the whole weakly-connected condensation component), so
/// no `Af`/`Ad` cell is ever needed for a background-parent edge.
pub fn assemble(ordering: &Ordering) -> Matrices {
    let p = ordering.fg.len();
    let n = ordering.bg.len();
    let m = ordering.ex.len();

    let mut af = Vec::new();
    let mut ad = Vec::new();
    let mut bf = Vec::new();
    let mut a = Vec::new();
    let mut b = Vec::new();

    for exch in &ordering.exchanges {
        match (exch.parent, exch.child) {
            (Location::Foreground(i), Location::Foreground(j)) => af.push((j, i, exch.value)),
            (Location::Foreground(i), Location::Background(j)) => ad.push((j, i, exch.value)),
            (Location::Foreground(i), Location::Exterior(k)) => bf.push((k, i, exch.value)),
            (Location::Background(i), Location::Background(j)) => a.push((j, i, exch.value)),
            (Location::Background(i), Location::Exterior(k)) => b.push((k, i, exch.value)),
            (Location::Background(_), Location::Foreground(_)) => {
                unreachable!("a background parent can never record a foreground child")
            }
            (Location::Exterior(_), _) => unreachable!("an exterior node is never recorded as a parent"),
        }
    }

    Matrices {
        af: CscMatrix::from_triplets(p, p, af),
        ad: CscMatrix::from_triplets(n, p, ad),
        bf: CscMatrix::from_triplets(m, p, bf),
        a: Some(CscMatrix::from_triplets(n, n, a)),
        b: Some(CscMatrix::from_triplets(m, n, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarjan_core::{Direction, TermRef};
    use tarjan_ordering::RecordedExchange;

    fn pf(term_ref: &str) -> TermRef {
        TermRef::new("f", Direction::Output, term_ref, None)
    }

    #[test]
    fn assembles_af_ad_bf_from_recorded_exchanges() {
        let ordering = Ordering {
            fg: vec![pf("p0"), pf("p1")],
            bg: vec![pf("b0")],
            ex: vec![pf("x0")],
            fg_index: Default::default(),
            bg_index: Default::default(),
            ex_index: Default::default(),
            exchanges: vec![
                RecordedExchange { parent: Location::Foreground(0), child: Location::Foreground(1), value: 2.0 },
                RecordedExchange { parent: Location::Foreground(1), child: Location::Background(0), value: 0.5 },
                RecordedExchange { parent: Location::Foreground(0), child: Location::Exterior(0), value: 1.0 },
            ],
            nontrivial_fg_scc_members: vec![],
            warnings: vec![],
        };

        let m = assemble(&ordering);
        assert_eq!(m.af.get(1, 0), 2.0);
        assert_eq!(m.ad.get(0, 1), 0.5);
        assert_eq!(m.bf.get(0, 0), 1.0);
        assert_eq!(m.a.unwrap().nnz(), 0);
    }

    #[test]
    fn duplicate_row_col_entries_sum() {
        let ordering = Ordering {
            fg: vec![pf("p0"), pf("p1")],
            bg: vec![],
            ex: vec![],
            fg_index: Default::default(),
            bg_index: Default::default(),
            ex_index: Default::default(),
            exchanges: vec![
                RecordedExchange { parent: Location::Foreground(0), child: Location::Foreground(1), value: 1.0 },
                RecordedExchange { parent: Location::Foreground(0), child: Location::Foreground(1), value: 4.0 },
            ],
            nontrivial_fg_scc_members: vec![],
            warnings: vec![],
        };
        let m = assemble(&ordering);
        assert_eq!(m.af.get(1, 0), 5.0);
    }
}
