//! The setup: a bag of ground clauses closed under unit propagation, with a
//! bloom-assisted subsumption index and split-level-bounded entailment.
//!
//! Storage is append-only; [`Setup::mark`] and [`Setup::truncate`] give
//! callers (the grounder's ply stack, and the split search itself) exact
//! structural rollback. Clauses are never moved; `minimize` retires redundant
//! clauses with tombstones so prefix views stay valid.

pub mod fingerprint;
pub mod worlds;

use indexmap::IndexSet;
use log::{debug, trace};
use std::collections::{BTreeSet, HashMap};

use crate::fol::{Clause, Lhs, Literal, Term};
use fingerprint::Fingerprint;

pub use worlds::{BeliefEval, Setups};

/// Outcome of adding a clause.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SetupResult {
    /// The clause was already entailed by unit propagation or subsumption.
    Subsumed,
    /// The clause was added.
    Ok,
    /// The empty clause has been derived.
    Inconsistent,
}

/// A structural snapshot of a setup, for exact rollback.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetupMark {
    n_clauses: usize,
    n_units: usize,
    inconsistent: bool,
}

/// A bag of ground clauses with unit propagation and k-split entailment.
#[derive(Debug, Clone, Default)]
pub struct Setup {
    clauses: Vec<Clause>,
    fingerprints: Vec<Fingerprint>,
    disabled: Vec<bool>,
    units: IndexSet<Literal>,
    unit_index: HashMap<Lhs, BTreeSet<Term>>,
    inconsistent: bool,
}

impl Setup {
    pub fn new() -> Setup {
        Setup::default()
    }

    /// Iterate the live clauses.
    pub fn clauses(&self) -> impl Iterator<Item = &Clause> + '_ {
        self.clauses
            .iter()
            .zip(self.disabled.iter())
            .filter(|(_, &dead)| !dead)
            .map(|(c, _)| c)
    }

    /// Number of live clauses.
    pub fn len(&self) -> usize {
        self.disabled.iter().filter(|&&dead| !dead).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The unit literals derived so far.
    pub fn units(&self) -> impl Iterator<Item = &Literal> + '_ {
        self.units.iter()
    }

    /// The names a primitive term is known equal to (from positive units).
    pub fn determined(&self, lhs: &Lhs) -> Option<&BTreeSet<Term>> {
        self.unit_index.get(lhs)
    }

    /// Has the empty clause been derived?
    pub fn consistent(&self) -> bool {
        !self.inconsistent
    }

    /// Clauses appended (by insertion or propagation) since a snapshot.
    pub(crate) fn clauses_since(&self, m: &SetupMark) -> &[Clause] {
        &self.clauses[m.n_clauses..]
    }

    /// Snapshot for [`truncate`](Self::truncate).
    pub fn mark(&self) -> SetupMark {
        SetupMark {
            n_clauses: self.clauses.len(),
            n_units: self.units.len(),
            inconsistent: self.inconsistent,
        }
    }

    /// Roll back to a snapshot taken with [`mark`](Self::mark).
    pub fn truncate(&mut self, m: SetupMark) {
        debug_assert!(m.n_clauses <= self.clauses.len());
        self.clauses.truncate(m.n_clauses);
        self.fingerprints.truncate(m.n_clauses);
        self.disabled.truncate(m.n_clauses);
        self.units.truncate(m.n_units);
        self.inconsistent = m.inconsistent;
        self.unit_index.clear();
        let units: Vec<Literal> = self.units.iter().cloned().collect();
        for u in units {
            self.index_unit(&u);
        }
    }

    fn index_unit(&mut self, u: &Literal) {
        if u.sign() {
            self.unit_index
                .entry(u.lhs_key())
                .or_default()
                .insert(u.rhs().clone());
        }
    }

    /// Is the clause entailed at split level 0: valid, satisfied by a unit,
    /// or a superset of a live clause?
    pub fn subsumes(&self, c: &Clause) -> bool {
        if self.inconsistent || c.is_valid() {
            return true;
        }
        if c.iter().any(|l| self.units.iter().any(|u| l.satisfied_by(u))) {
            return true;
        }
        let fp = Fingerprint::of_clause(c);
        for (i, d) in self.clauses.iter().enumerate() {
            if !self.disabled[i] && self.fingerprints[i].subset_of(&fp) && d.subsumes(c) {
                return true;
            }
        }
        false
    }

    /// Add a ground clause, propagate units, and report the outcome.
    pub fn add_clause(&mut self, c: Clause) -> SetupResult {
        debug_assert!(c.is_ground());
        if self.inconsistent {
            return SetupResult::Inconsistent;
        }
        let r = self.add_simplified(c);
        if r == SetupResult::Inconsistent {
            debug!("setup became inconsistent");
        }
        r
    }

    fn add_simplified(&mut self, c: Clause) -> SetupResult {
        // Strip literals falsified by known units; a satisfied literal makes
        // the whole clause redundant.
        let mut reduced: Vec<Literal> = Vec::with_capacity(c.len());
        for l in c.iter() {
            if self.units.iter().any(|u| l.satisfied_by(u)) {
                return SetupResult::Subsumed;
            }
            if !self.units.iter().any(|u| l.falsified_by(u)) {
                reduced.push(l.clone());
            }
        }
        let c = Clause::new(reduced);
        if c.is_valid() {
            return SetupResult::Subsumed;
        }
        if c.is_empty() {
            self.push(c);
            self.inconsistent = true;
            return SetupResult::Inconsistent;
        }
        if self.subsumes(&c) {
            return SetupResult::Subsumed;
        }
        trace!("add clause: {}", c);
        let unit = c.unit_literal().cloned();
        self.push(c);
        if let Some(u) = unit {
            self.units.insert(u.clone());
            self.index_unit(&u);
            if self.propagate(&u) == SetupResult::Inconsistent {
                return SetupResult::Inconsistent;
            }
        }
        SetupResult::Ok
    }

    fn push(&mut self, c: Clause) {
        self.fingerprints.push(Fingerprint::of_clause(&c));
        self.disabled.push(false);
        self.clauses.push(c);
    }

    /// Resolve every live clause against a fresh unit; derived clauses are
    /// re-added (which recurses through further units).
    fn propagate(&mut self, u: &Literal) -> SetupResult {
        let n = self.clauses.len();
        for i in 0..n {
            if self.disabled[i] {
                continue;
            }
            let c = &self.clauses[i];
            if c.iter().any(|l| l.satisfied_by(u)) {
                continue;
            }
            let falsified: Vec<Literal> = c
                .iter()
                .filter(|l| l.falsified_by(u))
                .cloned()
                .collect();
            if falsified.is_empty() {
                continue;
            }
            let mut reduced = self.clauses[i].clone();
            for l in &falsified {
                reduced = reduced.without(l);
            }
            if self.add_simplified(reduced) == SetupResult::Inconsistent {
                return SetupResult::Inconsistent;
            }
        }
        SetupResult::Ok
    }

    /// Retire live clauses subsumed by another live clause.
    pub fn minimize(&mut self) {
        let n = self.clauses.len();
        for i in 0..n {
            if self.disabled[i] {
                continue;
            }
            for j in 0..n {
                if i == j || self.disabled[j] {
                    continue;
                }
                let smaller_first = (self.clauses[i].len(), i) < (self.clauses[j].len(), j);
                if smaller_first
                    && self.fingerprints[i].subset_of(&self.fingerprints[j])
                    && self.clauses[i].subsumes(&self.clauses[j])
                {
                    self.disabled[j] = true;
                }
            }
        }
    }

    /// Ground literals available for case splitting: every literal of every
    /// live clause, positively normalized.
    fn split_candidates(&self, query: &Clause) -> IndexSet<Literal> {
        let mut cands = IndexSet::new();
        for c in self.clauses() {
            for l in c.iter() {
                cands.insert(l.positive());
            }
        }
        for l in query.iter() {
            cands.insert(l.positive());
        }
        cands
    }

    /// Does the setup entail the clause at split level `k`?
    ///
    /// Level 0 is unit propagation plus subsumption. At higher levels the
    /// procedure guesses a ground literal and requires both the literal
    /// branch and its flip branch to entail at `k - 1`. Sound for every
    /// `k ≥ 0`; monotone in `k`.
    pub fn entails(&mut self, c: &Clause, k: usize) -> bool {
        if self.subsumes(c) {
            return true;
        }
        if k == 0 {
            return false;
        }
        let cands = self.split_candidates(c);
        for a in cands {
            trace!("split level {} on {}", k, a);
            if self.branch_entails(&a, c, k - 1) && self.branch_entails(&a.flip(), c, k - 1) {
                return true;
            }
        }
        false
    }

    fn branch_entails(&mut self, assumption: &Literal, c: &Clause, k: usize) -> bool {
        let m = self.mark();
        let r = self.add_clause(Clause::unit(assumption.clone()));
        let entailed = r == SetupResult::Inconsistent || self.entails(c, k);
        self.truncate(m);
        entailed
    }

    /// Is the setup inconsistent at split level `k`?
    ///
    /// Level 0 checks for the empty clause; higher levels search for a case
    /// split both of whose branches are inconsistent at `k - 1`.
    pub fn inconsistent(&mut self, k: usize) -> bool {
        if self.inconsistent {
            return true;
        }
        if k == 0 {
            return false;
        }
        let cands = self.split_candidates(&Clause::empty());
        for a in cands {
            if self.branch_inconsistent(&a, k - 1) && self.branch_inconsistent(&a.flip(), k - 1) {
                return true;
            }
        }
        false
    }

    fn branch_inconsistent(&mut self, assumption: &Literal, k: usize) -> bool {
        let m = self.mark();
        let r = self.add_clause(Clause::unit(assumption.clone()));
        let bad = r == SetupResult::Inconsistent || self.inconsistent(k);
        self.truncate(m);
        bad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{SymbolFactory, Term};

    struct World {
        sf: SymbolFactory,
        t: Term,
        u: Term,
        n1: Term,
        n2: Term,
    }

    fn world() -> World {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let f = sf.create_function(s, 1);
        let g = sf.create_function(s, 1);
        let n1 = Term::from(sf.create_name(s));
        let n2 = Term::from(sf.create_name(s));
        let t = Term::app(f, vec![n1.clone()]);
        let u = Term::app(g, vec![n1.clone()]);
        World { sf, t, u, n1, n2 }
    }

    #[test]
    fn test_add_and_subsume() {
        let w = world();
        let mut s = Setup::new();
        let a = Literal::eq(w.t.clone(), w.n1.clone());
        let b = Literal::eq(w.u.clone(), w.n2.clone());

        assert_eq!(s.add_clause(Clause::new([a.clone(), b.clone()])), SetupResult::Ok);
        assert_eq!(s.add_clause(Clause::new([a.clone(), b.clone()])), SetupResult::Subsumed);
        // A unit subsumes its supersets and triggers propagation.
        assert_eq!(s.add_clause(Clause::unit(a.clone())), SetupResult::Ok);
        assert_eq!(s.add_clause(Clause::new([a, b])), SetupResult::Subsumed);
    }

    #[test]
    fn test_unit_propagation_derives_unit() {
        let w = world();
        let mut s = Setup::new();
        let a = Literal::eq(w.t.clone(), w.n1.clone());
        let b = Literal::eq(w.u.clone(), w.n2.clone());

        s.add_clause(Clause::new([a.clone(), b.clone()]));
        s.add_clause(Clause::unit(a.flip()));
        // ¬a forces b.
        assert!(s.subsumes(&Clause::unit(b)));
    }

    #[test]
    fn test_unique_names_propagation() {
        let w = world();
        let mut s = Setup::new();
        // t = n1 falsifies t = n2 and satisfies t ≠ n2.
        s.add_clause(Clause::unit(Literal::eq(w.t.clone(), w.n1.clone())));
        assert!(s.subsumes(&Clause::unit(Literal::neq(w.t.clone(), w.n2.clone()))));
        assert_eq!(
            s.add_clause(Clause::unit(Literal::eq(w.t.clone(), w.n2.clone()))),
            SetupResult::Inconsistent
        );
    }

    #[test]
    fn test_inconsistent_entails_everything() {
        let w = world();
        let mut s = Setup::new();
        let a = Literal::eq(w.t.clone(), w.n1.clone());
        s.add_clause(Clause::unit(a.clone()));
        assert_eq!(s.add_clause(Clause::unit(a.flip())), SetupResult::Inconsistent);
        assert!(!s.consistent());
        assert!(s.entails(&Clause::unit(Literal::eq(w.u.clone(), w.n2.clone())), 0));
    }

    #[test]
    fn test_split_entailment() {
        let w = world();
        let mut s = Setup::new();
        let a = Literal::eq(w.t.clone(), w.n1.clone());
        let b = Literal::eq(w.u.clone(), w.n1.clone());

        // a ∨ b, and a ⇒ b (as ¬a ∨ b ... via clause {¬a, b}).
        s.add_clause(Clause::new([a.clone(), b.clone()]));
        s.add_clause(Clause::new([a.flip(), b.clone()]));

        let goal = Clause::unit(b);
        assert!(!s.entails(&goal, 0));
        assert!(s.entails(&goal, 1));
        // Monotone in k.
        assert!(s.entails(&goal, 2));
    }

    #[test]
    fn test_mark_truncate_roundtrip() {
        let w = world();
        let mut s = Setup::new();
        let a = Literal::eq(w.t.clone(), w.n1.clone());
        let b = Literal::eq(w.u.clone(), w.n2.clone());
        s.add_clause(Clause::new([a.clone(), b.clone()]));

        let m = s.mark();
        let before: Vec<Clause> = s.clauses().cloned().collect();
        s.add_clause(Clause::unit(a.clone()));
        s.add_clause(Clause::unit(b.flip()));
        s.truncate(m);
        let after: Vec<Clause> = s.clauses().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(s.units().count(), 0);
        assert!(s.consistent());
    }

    #[test]
    fn test_minimize_retires_subsumed() {
        let w = world();
        let mut s = Setup::new();
        let a = Literal::eq(w.t.clone(), w.n1.clone());
        let b = Literal::eq(w.u.clone(), w.n2.clone());
        // Insert the wide clause first so the unit doesn't pre-subsume it.
        s.add_clause(Clause::new([a.clone(), b.clone()]));
        s.add_clause(Clause::unit(a.clone()));
        assert_eq!(s.len(), 2);
        s.minimize();
        assert_eq!(s.len(), 1);
        assert!(s.subsumes(&Clause::unit(a)));
    }

    #[test]
    fn test_determined_index() {
        let w = world();
        let mut s = Setup::new();
        let a = Literal::eq(w.t.clone(), w.n1.clone());
        s.add_clause(Clause::unit(a.clone()));
        let rhs = s.determined(&a.lhs_key()).expect("indexed");
        assert!(rhs.contains(&w.n1));
        let _ = &w.sf;
    }
}
