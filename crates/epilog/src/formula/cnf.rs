//! Extended clausal normal form.
//!
//! A [`Cnf`] is a conjunction of extended disjunctions. A [`Disj`] carries
//! five disjoint sub-sets: equalities, inequalities, ordinary literals,
//! K-literals (whose payload is a nested CNF), and B-literals (conditional
//! belief). Equality carriers exist only to detect tautologies introduced by
//! quantifier expansion; [`Cnf::minimize`] strips them after the tautology
//! pass.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::fol::{substitute_seq, Clause, Literal, Substitution, Term, TermSeq};
use crate::setup::{BeliefEval, Setup, Setups};
use crate::SplitLevel;

/// An epistemic literal `sign · K_k(φ)` under an action prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KLiteral {
    pub k: SplitLevel,
    pub z: TermSeq,
    pub sign: bool,
    pub phi: Cnf,
}

impl KLiteral {
    pub fn flip(&self) -> KLiteral {
        KLiteral {
            sign: !self.sign,
            ..self.clone()
        }
    }

    pub fn substitute(&self, theta: &Substitution) -> KLiteral {
        KLiteral {
            k: self.k,
            z: substitute_seq(&self.z, theta),
            sign: self.sign,
            phi: self.phi.substitute(theta),
        }
    }

    pub fn is_ground(&self) -> bool {
        self.z.iter().all(Term::is_ground) && self.phi.is_ground()
    }
}

/// A belief literal `sign · [z] B_k(¬φ ⇒ ψ)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BLiteral {
    pub k: SplitLevel,
    pub z: TermSeq,
    pub sign: bool,
    pub neg_phi: Cnf,
    pub psi: Cnf,
}

impl BLiteral {
    pub fn flip(&self) -> BLiteral {
        BLiteral {
            sign: !self.sign,
            ..self.clone()
        }
    }

    pub fn substitute(&self, theta: &Substitution) -> BLiteral {
        BLiteral {
            k: self.k,
            z: substitute_seq(&self.z, theta),
            sign: self.sign,
            neg_phi: self.neg_phi.substitute(theta),
            psi: self.psi.substitute(theta),
        }
    }

    pub fn is_ground(&self) -> bool {
        self.z.iter().all(Term::is_ground)
            && self.neg_phi.is_ground()
            && self.psi.is_ground()
    }
}

/// An extended disjunction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disj {
    eqs: BTreeSet<(Term, Term)>,
    neqs: BTreeSet<(Term, Term)>,
    lits: BTreeSet<Literal>,
    ks: BTreeSet<KLiteral>,
    bs: BTreeSet<BLiteral>,
}

impl Disj {
    pub fn new() -> Disj {
        Disj::default()
    }

    pub fn add_eq(&mut self, t1: Term, t2: Term) {
        self.eqs.insert((t1, t2));
    }

    pub fn add_neq(&mut self, t1: Term, t2: Term) {
        self.neqs.insert((t1, t2));
    }

    pub fn add_literal(&mut self, l: Literal) {
        self.lits.insert(l);
    }

    pub fn add_know(&mut self, k: SplitLevel, z: TermSeq, sign: bool, phi: Cnf) {
        self.ks.insert(KLiteral { k, z, sign, phi });
    }

    pub fn add_believe(
        &mut self,
        k: SplitLevel,
        z: TermSeq,
        sign: bool,
        neg_phi: Cnf,
        psi: Cnf,
    ) {
        self.bs.insert(BLiteral {
            k,
            z,
            sign,
            neg_phi,
            psi,
        });
    }

    /// Total number of carried literals across all sub-sets.
    pub fn total_len(&self) -> usize {
        self.eqs.len() + self.neqs.len() + self.lits.len() + self.ks.len() + self.bs.len()
    }

    pub fn literals(&self) -> impl Iterator<Item = &Literal> + '_ {
        self.lits.iter()
    }

    pub fn k_literals(&self) -> impl Iterator<Item = &KLiteral> + '_ {
        self.ks.iter()
    }

    pub fn b_literals(&self) -> impl Iterator<Item = &BLiteral> + '_ {
        self.bs.iter()
    }

    /// The ordinary-literal part as a clause.
    pub fn clause(&self) -> Clause {
        Clause::new(self.lits.iter().cloned())
    }

    /// Union of two disjunctions.
    pub fn concat(d1: &Disj, d2: &Disj) -> Disj {
        let mut d = d1.clone();
        d.eqs.extend(d2.eqs.iter().cloned());
        d.neqs.extend(d2.neqs.iter().cloned());
        d.lits.extend(d2.lits.iter().cloned());
        d.ks.extend(d2.ks.iter().cloned());
        d.bs.extend(d2.bs.iter().cloned());
        d
    }

    pub fn substitute(&self, theta: &Substitution) -> Disj {
        let mut d = Disj::new();
        for (t1, t2) in &self.eqs {
            d.eqs.insert((t1.substitute(theta), t2.substitute(theta)));
        }
        for (t1, t2) in &self.neqs {
            d.neqs.insert((t1.substitute(theta), t2.substitute(theta)));
        }
        for l in &self.lits {
            d.lits.insert(l.substitute(theta));
        }
        for k in &self.ks {
            d.ks.insert(k.substitute(theta));
        }
        for b in &self.bs {
            d.bs.insert(b.substitute(theta));
        }
        d
    }

    pub fn is_ground(&self) -> bool {
        self.eqs
            .iter()
            .chain(self.neqs.iter())
            .all(|(t1, t2)| t1.is_ground() && t2.is_ground())
            && self.lits.iter().all(Literal::is_ground)
            && self.ks.iter().all(KLiteral::is_ground)
            && self.bs.iter().all(BLiteral::is_ground)
    }

    /// Syntactic tautology check for ground disjunctions.
    pub fn tautologous(&self) -> bool {
        debug_assert!(self.is_ground());
        self.eqs.iter().any(|(t1, t2)| t1 == t2)
            || self.neqs.iter().any(|(t1, t2)| t1 != t2)
            || self.clause().is_valid()
            || self.ks.iter().any(|l| self.ks.contains(&l.flip()))
            || self.bs.iter().any(|l| self.bs.contains(&l.flip()))
    }

    /// Set inclusion across each sub-set.
    pub fn subsumes(&self, d: &Disj) -> bool {
        self.eqs.is_subset(&d.eqs)
            && self.neqs.is_subset(&d.neqs)
            && self.lits.is_subset(&d.lits)
            && self.ks.is_subset(&d.ks)
            && self.bs.is_subset(&d.bs)
    }

    /// Resolve two disjunctions on one complementary literal, drawn first
    /// from the ordinary literals, then K-literals, then B-literals.
    ///
    /// Both inputs must have had their equality carriers stripped. Returns
    /// the union resolvent, or `None` if no complementary pair exists.
    pub fn resolve(d1: &Disj, d2: &Disj) -> Option<Disj> {
        debug_assert!(d1.eqs.is_empty() && d1.neqs.is_empty());
        debug_assert!(d2.eqs.is_empty() && d2.neqs.is_empty());
        if d1.total_len() > d2.total_len() {
            return Disj::resolve(d2, d1);
        }
        for l in &d1.lits {
            let flipped = l.flip();
            if d2.lits.contains(&flipped) {
                let mut r1 = d1.clone();
                r1.lits.remove(l);
                let mut r2 = d2.clone();
                r2.lits.remove(&flipped);
                return Some(Disj::concat(&r1, &r2));
            }
        }
        for l in &d1.ks {
            let flipped = l.flip();
            if d2.ks.contains(&flipped) {
                let mut r1 = d1.clone();
                r1.ks.remove(l);
                let mut r2 = d2.clone();
                r2.ks.remove(&flipped);
                return Some(Disj::concat(&r1, &r2));
            }
        }
        for l in &d1.bs {
            let flipped = l.flip();
            if d2.bs.contains(&flipped) {
                let mut r1 = d1.clone();
                r1.bs.remove(l);
                let mut r2 = d2.clone();
                r2.bs.remove(&flipped);
                return Some(Disj::concat(&r1, &r2));
            }
        }
        None
    }

    fn clear_carriers(&mut self) {
        self.eqs.clear();
        self.neqs.clear();
    }

    /// Entailment against a single setup at split level `k`.
    ///
    /// B-literals are reserved for the multi-world variant and must be
    /// absent here.
    pub fn entailed_by(&self, setup: &mut Setup, k: SplitLevel) -> bool {
        debug_assert!(self.bs.is_empty());
        if self.tautologous() {
            return true;
        }
        if setup.entails(&self.clause(), k) {
            return true;
        }
        self.ks.iter().any(|l| l.phi.entailed_by(setup, l.k))
    }

    /// Entailment against ranked setups at split level `k`.
    pub fn entailed_by_setups(&self, setups: &mut Setups, k: SplitLevel) -> bool {
        if self.tautologous() {
            return true;
        }
        if setups.entails(&self.clause(), k) {
            return true;
        }
        if self
            .ks
            .iter()
            .any(|l| l.phi.entailed_by_setups(setups, l.k))
        {
            return true;
        }
        self.bs
            .iter()
            .any(|l| eval_belief(setups, &l.neg_phi, &l.psi, l.k))
    }
}

/// Evaluate `B_k(¬φ ⇒ ψ)` at the first plausibility level where the
/// antecedent `φ` is possible, in the style the setups are configured for.
/// Vacuously true when `φ` is impossible at every level.
fn eval_belief(setups: &mut Setups, neg_phi: &Cnf, psi: &Cnf, k: SplitLevel) -> bool {
    let mode = setups.belief_eval();
    for i in 0..setups.num_levels() {
        let possible = {
            let level = setups.level_mut(i);
            level.consistent() && !neg_phi.entailed_by_level(level, k)
        };
        if possible {
            let level = setups.level_mut(i);
            return match mode {
                BeliefEval::Separate => psi.entailed_by_level(level, k),
                BeliefEval::Combined => neg_phi.or(psi).entailed_by_level(level, k),
            };
        }
    }
    true
}

impl PartialOrd for Disj {
    fn partial_cmp(&self, other: &Disj) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Disj {
    /// Orders by total literal count first, so subsumed disjunctions are
    /// greater than their subsumers.
    fn cmp(&self, other: &Disj) -> Ordering {
        self.total_len()
            .cmp(&other.total_len())
            .then_with(|| self.eqs.cmp(&other.eqs))
            .then_with(|| self.neqs.cmp(&other.neqs))
            .then_with(|| self.lits.cmp(&other.lits))
            .then_with(|| self.ks.cmp(&other.ks))
            .then_with(|| self.bs.cmp(&other.bs))
    }
}

/// A conjunction of extended disjunctions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cnf {
    ds: BTreeSet<Disj>,
}

impl Cnf {
    /// The empty conjunction, representing truth.
    pub fn truth() -> Cnf {
        Cnf::default()
    }

    pub fn from_disj(d: Disj) -> Cnf {
        let mut ds = BTreeSet::new();
        ds.insert(d);
        Cnf { ds }
    }

    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    pub fn disjunctions(&self) -> impl Iterator<Item = &Disj> + '_ {
        self.ds.iter()
    }

    /// Conjunction: set union of disjunctions.
    pub fn and(&self, other: &Cnf) -> Cnf {
        let mut r = self.clone();
        r.ds.extend(other.ds.iter().cloned());
        r
    }

    /// Disjunction: pairwise concatenation; the result carries at most
    /// `|self| · |other|` disjunctions.
    pub fn or(&self, other: &Cnf) -> Cnf {
        let mut r = Cnf::truth();
        for d1 in &self.ds {
            for d2 in &other.ds {
                r.ds.insert(Disj::concat(d1, d2));
            }
        }
        r
    }

    pub fn substitute(&self, theta: &Substitution) -> Cnf {
        Cnf {
            ds: self.ds.iter().map(|d| d.substitute(theta)).collect(),
        }
    }

    pub fn is_ground(&self) -> bool {
        self.ds.iter().all(Disj::is_ground)
    }

    /// Minimize a ground CNF: drop tautologies, strip equality carriers,
    /// then close under mutual subsumption and resolution.
    pub fn minimize(&mut self) {
        let mut ds: BTreeSet<Disj> = BTreeSet::new();
        for d in &self.ds {
            debug_assert!(d.is_ground());
            if !d.tautologous() {
                let mut dd = d.clone();
                dd.clear_carriers();
                ds.insert(dd);
            }
        }
        loop {
            let snapshot: Vec<Disj> = ds.iter().cloned().collect();
            let mut removed = vec![false; snapshot.len()];
            let mut fresh: BTreeSet<Disj> = BTreeSet::new();
            // Ascending order puts subsumers before the disjunctions they
            // subsume.
            for i in 0..snapshot.len() {
                if removed[i] {
                    continue;
                }
                for j in (i + 1)..snapshot.len() {
                    if removed[j] {
                        continue;
                    }
                    if snapshot[i].subsumes(&snapshot[j]) {
                        removed[j] = true;
                    } else if let Some(r) = Disj::resolve(&snapshot[i], &snapshot[j]) {
                        if !r.tautologous() && !ds.contains(&r) {
                            fresh.insert(r);
                        }
                    }
                }
            }
            let mut next: BTreeSet<Disj> = snapshot
                .into_iter()
                .zip(removed)
                .filter(|(_, dead)| !dead)
                .map(|(d, _)| d)
                .collect();
            let grew = fresh.iter().any(|d| !next.contains(d));
            next.extend(fresh);
            let changed = next != ds;
            ds = next;
            if !grew && !changed {
                break;
            }
        }
        self.ds = ds;
    }

    /// Is every disjunction entailed by the setup at split level `k`?
    pub fn entailed_by(&self, setup: &mut Setup, k: SplitLevel) -> bool {
        self.ds.iter().all(|d| d.entailed_by(setup, k))
    }

    /// Single-level helper used by belief evaluation.
    fn entailed_by_level(&self, setup: &mut Setup, k: SplitLevel) -> bool {
        self.entailed_by(setup, k)
    }

    /// Is every disjunction entailed by the ranked setups at level `k`?
    pub fn entailed_by_setups(&self, setups: &mut Setups, k: SplitLevel) -> bool {
        self.ds.iter().all(|d| d.entailed_by_setups(setups, k))
    }

    /// Insert every disjunction's ordinary-literal part into the setup.
    ///
    /// Only callable once minimization has reduced the CNF to ordinary
    /// literals.
    pub fn add_to_setup(&self, setup: &mut Setup) -> crate::setup::SetupResult {
        let mut result = crate::setup::SetupResult::Subsumed;
        for d in &self.ds {
            debug_assert!(d.ks.is_empty() && d.bs.is_empty());
            debug_assert!(d.eqs.is_empty() && d.neqs.is_empty());
            match setup.add_clause(d.clause()) {
                crate::setup::SetupResult::Inconsistent => {
                    return crate::setup::SetupResult::Inconsistent
                }
                crate::setup::SetupResult::Ok => result = crate::setup::SetupResult::Ok,
                crate::setup::SetupResult::Subsumed => {}
            }
        }
        result
    }

    /// Insert every disjunction's ordinary-literal part into all levels.
    pub fn add_to_setups(&self, setups: &mut Setups) -> crate::setup::SetupResult {
        let mut result = crate::setup::SetupResult::Subsumed;
        for d in &self.ds {
            debug_assert!(d.ks.is_empty() && d.bs.is_empty());
            match setups.add_clause(d.clause()) {
                crate::setup::SetupResult::Inconsistent => {
                    return crate::setup::SetupResult::Inconsistent
                }
                crate::setup::SetupResult::Ok => result = crate::setup::SetupResult::Ok,
                crate::setup::SetupResult::Subsumed => {}
            }
        }
        result
    }
}

impl fmt::Display for Disj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if !first {
                write!(f, " ∨ ")?;
            }
            first = false;
            Ok(())
        };
        write!(f, "(")?;
        for (t1, t2) in &self.eqs {
            sep(f)?;
            write!(f, "{} = {}", t1, t2)?;
        }
        for (t1, t2) in &self.neqs {
            sep(f)?;
            write!(f, "{} ≠ {}", t1, t2)?;
        }
        for l in &self.lits {
            sep(f)?;
            write!(f, "{}", l)?;
        }
        for l in &self.ks {
            sep(f)?;
            write!(f, "{}K_{}{}", if l.sign { "" } else { "¬" }, l.k, l.phi)?;
        }
        for l in &self.bs {
            sep(f)?;
            write!(
                f,
                "{}B_{}(¬{} ⇒ {})",
                if l.sign { "" } else { "¬" },
                l.k,
                l.neg_phi,
                l.psi
            )?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Cnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.ds.iter().enumerate() {
            if i > 0 {
                write!(f, " ∧ ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{SymbolFactory, Term};

    fn lits() -> (Literal, Literal, Literal) {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let f = sf.create_function(s, 1);
        let g = sf.create_function(s, 1);
        let n1 = Term::from(sf.create_name(s));
        let n2 = Term::from(sf.create_name(s));
        (
            Literal::eq(Term::app(f, vec![n1.clone()]), n1.clone()),
            Literal::eq(Term::app(f, vec![n2.clone()]), n2.clone()),
            Literal::eq(Term::app(g, vec![n1]), n2),
        )
    }

    fn disj(ls: &[Literal]) -> Disj {
        let mut d = Disj::new();
        for l in ls {
            d.add_literal(l.clone());
        }
        d
    }

    #[test]
    fn test_or_is_cross_product() {
        let (a, b, c) = lits();
        let c1 = Cnf::from_disj(disj(&[a.clone()])).and(&Cnf::from_disj(disj(&[b.clone()])));
        let c2 = Cnf::from_disj(disj(&[c.clone()]));
        let r = c1.or(&c2);
        assert_eq!(r.len(), 2);
        for d in r.disjunctions() {
            assert_eq!(d.total_len(), 2);
        }
    }

    #[test]
    fn test_tautology_via_eq_carrier() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let n = Term::from(sf.create_name(s));
        let m = Term::from(sf.create_name(s));

        let mut d = Disj::new();
        d.add_eq(n.clone(), n.clone());
        assert!(d.tautologous());

        let mut d = Disj::new();
        d.add_neq(n.clone(), m.clone());
        assert!(d.tautologous());

        let mut d = Disj::new();
        d.add_eq(n, m);
        assert!(!d.tautologous());
    }

    #[test]
    fn test_minimize_drops_tautologies_and_carriers() {
        let (a, b, _) = lits();
        let mut taut = disj(&[a.clone()]);
        taut.add_literal(a.flip());

        let mut keep = disj(&[b.clone()]);
        keep.add_eq(a.rhs().clone(), b.rhs().clone());

        let mut cnf = Cnf::from_disj(taut).and(&Cnf::from_disj(keep));
        cnf.minimize();
        assert_eq!(cnf.len(), 1);
        let d = cnf.disjunctions().next().unwrap();
        assert_eq!(d.total_len(), 1);
        assert!(d.literals().any(|l| *l == b));
    }

    #[test]
    fn test_minimize_subsumption_and_resolution() {
        let (a, b, c) = lits();
        // {a, b}, {a}, {¬a, c}  →  {a}, {c} after subsumption + resolution.
        let cnf0 = Cnf::from_disj(disj(&[a.clone(), b.clone()]))
            .and(&Cnf::from_disj(disj(&[a.clone()])))
            .and(&Cnf::from_disj(disj(&[a.flip(), c.clone()])));
        let mut cnf = cnf0;
        cnf.minimize();

        let sizes: Vec<usize> = cnf.disjunctions().map(Disj::total_len).collect();
        assert!(sizes.iter().all(|&n| n == 1));
        assert!(cnf
            .disjunctions()
            .any(|d| d.literals().any(|l| *l == a)));
        assert!(cnf
            .disjunctions()
            .any(|d| d.literals().any(|l| *l == c)));
    }

    #[test]
    fn test_minimize_idempotent() {
        let (a, b, c) = lits();
        let mut cnf = Cnf::from_disj(disj(&[a.clone(), b.clone()]))
            .and(&Cnf::from_disj(disj(&[a.flip(), c.clone()])))
            .and(&Cnf::from_disj(disj(&[b, c])));
        cnf.minimize();
        let once = cnf.clone();
        cnf.minimize();
        assert_eq!(once, cnf);
    }

    #[test]
    fn test_disj_order_is_size_first() {
        let (a, b, _) = lits();
        let small = disj(&[b.clone()]);
        let big = disj(&[a, b]);
        assert!(small < big);
    }

    #[test]
    fn test_entailed_by_setup() {
        let (a, b, _) = lits();
        let mut setup = Setup::new();
        setup.add_clause(Clause::unit(a.clone()));

        let cnf = Cnf::from_disj(disj(&[a.clone(), b.clone()]));
        assert!(cnf.entailed_by(&mut setup, 0));

        let cnf = Cnf::from_disj(disj(&[b]));
        assert!(!cnf.entailed_by(&mut setup, 1));
    }

    #[test]
    fn test_k_literal_entailment() {
        let (a, _, _) = lits();
        let mut setup = Setup::new();
        setup.add_clause(Clause::unit(a.clone()));

        let mut d = Disj::new();
        d.add_know(0, Vec::new(), true, Cnf::from_disj(disj(&[a])));
        let cnf = Cnf::from_disj(d);
        assert!(cnf.entailed_by(&mut setup, 0));
    }
}
