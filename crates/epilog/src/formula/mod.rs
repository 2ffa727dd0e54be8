//! Formulas of the epistemic logic: equality, literals, junctions,
//! quantifiers, knowledge, and conditional belief.
//!
//! Formulas are owned trees built with the constructor functions ([`eq`],
//! [`or`], [`exists`], [`know`], ...). Negation is pushed in place by
//! [`negate`](Formula::negate); entailment queries run the pipeline
//! simplify → CNF → minimize → setup entailment.
//!
//! [`eq`]: Formula::eq
//! [`or`]: Formula::or
//! [`exists`]: Formula::exists
//! [`know`]: Formula::know

pub mod cnf;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

use crate::fol::{
    Literal, Sort, SortedTermSet, Substitution, Symbol, SymbolFactory, Term, TermSeq,
};
use crate::setup::{Setup, SetupResult, Setups};
use crate::SplitLevel;
use cnf::{Cnf, Disj};

/// Outcome of simplification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Truth {
    TriviallyTrue,
    TriviallyFalse,
    Nontrivial,
}

/// Static precondition violations of regression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegressError {
    /// Regression through K or B is undefined; normalize modalities away
    /// before regressing.
    #[error("cannot regress through epistemic operators")]
    NonObjective,
}

/// Defining axioms for fluents, consulted literal by literal during
/// regression.
pub trait DynamicAxioms {
    /// Rewrite a literal by one application of its predicate's successor
    /// state axiom, peeling the last action of its prefix. `None` if no
    /// axiom defines the literal.
    fn regress_one_step(&self, sf: &mut SymbolFactory, l: &Literal) -> Option<Formula>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JunctionKind {
    Or,
    And,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantifierKind {
    Exists,
    Forall,
}

/// A formula of the epistemic logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formula {
    Equal {
        sign: bool,
        t1: Term,
        t2: Term,
    },
    Lit(Literal),
    Junction {
        kind: JunctionKind,
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
    Quantifier {
        kind: QuantifierKind,
        x: Symbol,
        body: Box<Formula>,
    },
    Know {
        k: SplitLevel,
        z: TermSeq,
        sign: bool,
        body: Box<Formula>,
    },
    Believe {
        k: SplitLevel,
        z: TermSeq,
        sign: bool,
        neg_phi: Box<Formula>,
        psi: Box<Formula>,
    },
}

impl Formula {
    // === Constructor functions ===

    pub fn eq(t1: Term, t2: Term) -> Formula {
        Formula::Equal {
            sign: true,
            t1,
            t2,
        }
    }

    pub fn neq(t1: Term, t2: Term) -> Formula {
        Formula::Equal {
            sign: false,
            t1,
            t2,
        }
    }

    pub fn lit(l: Literal) -> Formula {
        Formula::Lit(l)
    }

    pub fn or(lhs: Formula, rhs: Formula) -> Formula {
        Formula::Junction {
            kind: JunctionKind::Or,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn and(lhs: Formula, rhs: Formula) -> Formula {
        Formula::Junction {
            kind: JunctionKind::And,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn not(mut phi: Formula) -> Formula {
        phi.negate();
        phi
    }

    pub fn exists(x: Symbol, body: Formula) -> Formula {
        debug_assert!(x.is_variable());
        Formula::Quantifier {
            kind: QuantifierKind::Exists,
            x,
            body: Box::new(body),
        }
    }

    pub fn forall(x: Symbol, body: Formula) -> Formula {
        debug_assert!(x.is_variable());
        Formula::Quantifier {
            kind: QuantifierKind::Forall,
            x,
            body: Box::new(body),
        }
    }

    /// Prepend one action to every literal's prefix and every K/B's `z`.
    pub fn act(a: Term, phi: Formula) -> Formula {
        Formula::act_all(&[a], phi)
    }

    /// Prepend an action sequence.
    pub fn act_all(z: &[Term], mut phi: Formula) -> Formula {
        phi.prepend_actions(z);
        phi
    }

    pub fn know(k: SplitLevel, body: Formula) -> Formula {
        Formula::Know {
            k,
            z: Vec::new(),
            sign: true,
            body: Box::new(body),
        }
    }

    pub fn believe(k: SplitLevel, neg_phi: Formula, psi: Formula) -> Formula {
        Formula::Believe {
            k,
            z: Vec::new(),
            sign: true,
            neg_phi: Box::new(neg_phi),
            psi: Box::new(psi),
        }
    }

    /// `φ₁ ⊃ φ₂`.
    pub fn only_if(phi1: Formula, phi2: Formula) -> Formula {
        Formula::or(Formula::not(phi1), phi2)
    }

    /// `φ₁ ⊂ φ₂`.
    pub fn if_(phi1: Formula, phi2: Formula) -> Formula {
        Formula::or(Formula::not(phi2), phi1)
    }

    /// `φ₁ ≡ φ₂`.
    pub fn iff(phi1: Formula, phi2: Formula) -> Formula {
        Formula::and(
            Formula::if_(phi1.clone(), phi2.clone()),
            Formula::only_if(phi1, phi2),
        )
    }

    // === Structural operations ===

    /// Push negation in place: flip signs, swap ∧↔∨ and ∃↔∀. Negation is
    /// not pushed through K or B; their sign flag flips.
    pub fn negate(&mut self) {
        match self {
            Formula::Equal { sign, .. } => *sign = !*sign,
            Formula::Lit(l) => *l = l.flip(),
            Formula::Junction { kind, lhs, rhs } => {
                *kind = match kind {
                    JunctionKind::Or => JunctionKind::And,
                    JunctionKind::And => JunctionKind::Or,
                };
                lhs.negate();
                rhs.negate();
            }
            Formula::Quantifier { kind, body, .. } => {
                *kind = match kind {
                    QuantifierKind::Exists => QuantifierKind::Forall,
                    QuantifierKind::Forall => QuantifierKind::Exists,
                };
                body.negate();
            }
            Formula::Know { sign, .. } => *sign = !*sign,
            Formula::Believe { sign, .. } => *sign = !*sign,
        }
    }

    /// Prepend actions to every literal and every K/B prefix.
    pub fn prepend_actions(&mut self, prefix: &[Term]) {
        match self {
            Formula::Equal { .. } => {}
            Formula::Lit(l) => *l = l.prepend_actions(prefix),
            Formula::Junction { lhs, rhs, .. } => {
                lhs.prepend_actions(prefix);
                rhs.prepend_actions(prefix);
            }
            Formula::Quantifier { x, body, .. } => {
                debug_assert!(prefix.iter().all(|a| *a != Term::from(*x)));
                body.prepend_actions(prefix);
            }
            Formula::Know { z, .. } | Formula::Believe { z, .. } => {
                let mut new_z = prefix.to_vec();
                new_z.append(z);
                *z = new_z;
            }
        }
    }

    /// Apply a substitution in place. A quantified variable bound by the
    /// substitution is renamed along with its occurrences (callers rename
    /// with fresh variables, so no capture arises).
    pub fn substitute_in_place(&mut self, theta: &Substitution) {
        match self {
            Formula::Equal { t1, t2, .. } => {
                *t1 = t1.substitute(theta);
                *t2 = t2.substitute(theta);
            }
            Formula::Lit(l) => *l = l.substitute(theta),
            Formula::Junction { lhs, rhs, .. } => {
                lhs.substitute_in_place(theta);
                rhs.substitute_in_place(theta);
            }
            Formula::Quantifier { x, body, .. } => {
                if let Some(Term::Variable(y)) = theta.get(*x) {
                    *x = *y;
                }
                body.substitute_in_place(theta);
            }
            Formula::Know { z, body, .. } => {
                *z = crate::fol::substitute_seq(z, theta);
                body.substitute_in_place(theta);
            }
            Formula::Believe {
                z, neg_phi, psi, ..
            } => {
                *z = crate::fol::substitute_seq(z, theta);
                neg_phi.substitute_in_place(theta);
                psi.substitute_in_place(theta);
            }
        }
    }

    /// Free variables of the formula. Assumes rectified binders.
    pub fn collect_free_variables(&self, vars: &mut SortedTermSet) {
        match self {
            Formula::Equal { t1, t2, .. } => {
                t1.collect_variables(vars);
                t2.collect_variables(vars);
            }
            Formula::Lit(l) => l.collect_variables(vars),
            Formula::Junction { lhs, rhs, .. } => {
                lhs.collect_free_variables(vars);
                rhs.collect_free_variables(vars);
            }
            Formula::Quantifier { x, body, .. } => {
                body.collect_free_variables(vars);
                vars.remove(&Term::from(*x));
            }
            Formula::Know { z, body, .. } => {
                for a in z {
                    a.collect_variables(vars);
                }
                body.collect_free_variables(vars);
            }
            Formula::Believe {
                z, neg_phi, psi, ..
            } => {
                for a in z {
                    a.collect_variables(vars);
                }
                neg_phi.collect_free_variables(vars);
                psi.collect_free_variables(vars);
            }
        }
    }

    /// Number of quantifier nodes per sort, the grounder's plus-name demand.
    pub fn quantified_var_counts(&self) -> BTreeMap<Sort, usize> {
        let mut counts = BTreeMap::new();
        self.count_quantifiers(&mut counts);
        counts
    }

    fn count_quantifiers(&self, counts: &mut BTreeMap<Sort, usize>) {
        match self {
            Formula::Equal { .. } | Formula::Lit(_) => {}
            Formula::Junction { lhs, rhs, .. } => {
                lhs.count_quantifiers(counts);
                rhs.count_quantifiers(counts);
            }
            Formula::Quantifier { x, body, .. } => {
                *counts.entry(x.sort()).or_insert(0) += 1;
                body.count_quantifiers(counts);
            }
            Formula::Know { body, .. } => body.count_quantifiers(counts),
            Formula::Believe { neg_phi, psi, .. } => {
                neg_phi.count_quantifiers(counts);
                psi.count_quantifiers(counts);
            }
        }
    }

    /// Visit every literal, including those nested under K and B.
    pub fn visit_literals(&self, f: &mut impl FnMut(&Literal)) {
        match self {
            Formula::Equal { .. } => {}
            Formula::Lit(l) => f(l),
            Formula::Junction { lhs, rhs, .. } => {
                lhs.visit_literals(f);
                rhs.visit_literals(f);
            }
            Formula::Quantifier { body, .. } => body.visit_literals(f),
            Formula::Know { body, .. } => body.visit_literals(f),
            Formula::Believe { neg_phi, psi, .. } => {
                neg_phi.visit_literals(f);
                psi.visit_literals(f);
            }
        }
    }

    /// Visit every term occurring anywhere in the formula.
    pub fn visit_terms(&self, f: &mut impl FnMut(&Term)) {
        match self {
            Formula::Equal { t1, t2, .. } => {
                t1.visit(f);
                t2.visit(f);
            }
            Formula::Lit(l) => l.visit_terms(f),
            Formula::Junction { lhs, rhs, .. } => {
                lhs.visit_terms(f);
                rhs.visit_terms(f);
            }
            Formula::Quantifier { body, .. } => body.visit_terms(f),
            Formula::Know { z, body, .. } => {
                for a in z {
                    a.visit(f);
                }
                body.visit_terms(f);
            }
            Formula::Believe {
                z, neg_phi, psi, ..
            } => {
                for a in z {
                    a.visit(f);
                }
                neg_phi.visit_terms(f);
                psi.visit_terms(f);
            }
        }
    }

    /// Rename bound variables apart with fresh variables.
    pub fn rectify(&mut self, sf: &mut SymbolFactory) {
        self.rectify_inner(sf, &HashMap::new());
    }

    fn rectify_inner(&mut self, sf: &mut SymbolFactory, env: &HashMap<Symbol, Symbol>) {
        match self {
            Formula::Equal { t1, t2, .. } => {
                *t1 = rename_term(t1, env);
                *t2 = rename_term(t2, env);
            }
            Formula::Lit(l) => {
                let theta = env_substitution(env);
                *l = l.substitute(&theta);
            }
            Formula::Junction { lhs, rhs, .. } => {
                lhs.rectify_inner(sf, env);
                rhs.rectify_inner(sf, env);
            }
            Formula::Quantifier { x, body, .. } => {
                let y = sf.create_variable(x.sort());
                let mut env2 = env.clone();
                env2.insert(*x, y);
                *x = y;
                body.rectify_inner(sf, &env2);
            }
            Formula::Know { z, body, .. } => {
                let theta = env_substitution(env);
                *z = crate::fol::substitute_seq(z, &theta);
                body.rectify_inner(sf, env);
            }
            Formula::Believe {
                z, neg_phi, psi, ..
            } => {
                let theta = env_substitution(env);
                *z = crate::fol::substitute_seq(z, &theta);
                neg_phi.rectify_inner(sf, env);
                psi.rectify_inner(sf, env);
            }
        }
    }

    // === Simplification ===

    /// Reduce trivially decided subformulas.
    ///
    /// Returns the truth status and, when nontrivial, the simplified
    /// formula. Simplification is idempotent.
    pub fn simplify(&self) -> (Truth, Option<Formula>) {
        match self {
            Formula::Equal { sign, t1, t2 } => {
                if (t1.is_ground() && t2.is_ground()) || t1 == t2 {
                    if (t1 == t2) == *sign {
                        (Truth::TriviallyTrue, None)
                    } else {
                        (Truth::TriviallyFalse, None)
                    }
                } else {
                    (Truth::Nontrivial, Some(self.clone()))
                }
            }
            Formula::Lit(_) => (Truth::Nontrivial, Some(self.clone())),
            Formula::Junction { kind, lhs, rhs } => {
                let (t1, p1) = lhs.simplify();
                let (t2, p2) = rhs.simplify();
                match kind {
                    JunctionKind::Or => {
                        if t1 == Truth::TriviallyTrue || t2 == Truth::TriviallyTrue {
                            return (Truth::TriviallyTrue, None);
                        }
                        if t1 == Truth::TriviallyFalse {
                            return (t2, p2);
                        }
                        if t2 == Truth::TriviallyFalse {
                            return (t1, p1);
                        }
                    }
                    JunctionKind::And => {
                        if t1 == Truth::TriviallyFalse || t2 == Truth::TriviallyFalse {
                            return (Truth::TriviallyFalse, None);
                        }
                        if t1 == Truth::TriviallyTrue {
                            return (t2, p2);
                        }
                        if t2 == Truth::TriviallyTrue {
                            return (t1, p1);
                        }
                    }
                }
                let psi = Formula::Junction {
                    kind: *kind,
                    lhs: Box::new(p1.expect("nontrivial operand")),
                    rhs: Box::new(p2.expect("nontrivial operand")),
                };
                (Truth::Nontrivial, Some(psi))
            }
            Formula::Quantifier { kind, x, body } => {
                let (t, p) = body.simplify();
                match (kind, t) {
                    (QuantifierKind::Exists, Truth::TriviallyTrue) => (Truth::TriviallyTrue, None),
                    (QuantifierKind::Exists, Truth::TriviallyFalse) => {
                        (Truth::TriviallyFalse, None)
                    }
                    (QuantifierKind::Forall, Truth::TriviallyFalse) => {
                        (Truth::TriviallyFalse, None)
                    }
                    (QuantifierKind::Forall, Truth::TriviallyTrue) => (Truth::TriviallyTrue, None),
                    _ => {
                        let psi = Formula::Quantifier {
                            kind: *kind,
                            x: *x,
                            body: Box::new(p.expect("nontrivial body")),
                        };
                        (Truth::Nontrivial, Some(psi))
                    }
                }
            }
            Formula::Know { k, z, sign, body } => {
                let (t, p) = body.simplify();
                if *sign && t == Truth::TriviallyTrue {
                    return (Truth::TriviallyTrue, None);
                }
                if !*sign && t == Truth::TriviallyFalse {
                    return (Truth::TriviallyFalse, None);
                }
                let body = p.unwrap_or_else(|| (**body).clone());
                let know = Formula::Know {
                    k: *k,
                    z: z.clone(),
                    sign: *sign,
                    body: Box::new(body),
                };
                (Truth::Nontrivial, Some(know))
            }
            Formula::Believe {
                k,
                z,
                sign,
                neg_phi,
                psi,
            } => {
                let (t1, p1) = neg_phi.simplify();
                let (t2, p2) = psi.simplify();
                if *sign && t1 == Truth::TriviallyFalse {
                    return (Truth::TriviallyFalse, None);
                }
                if !*sign && t2 == Truth::TriviallyTrue {
                    return (Truth::TriviallyTrue, None);
                }
                let neg_phi = p1.unwrap_or_else(|| (**neg_phi).clone());
                let psi = p2.unwrap_or_else(|| (**psi).clone());
                let b = Formula::Believe {
                    k: *k,
                    z: z.clone(),
                    sign: *sign,
                    neg_phi: Box::new(neg_phi),
                    psi: Box::new(psi),
                };
                (Truth::Nontrivial, Some(b))
            }
        }
    }

    // === CNF construction ===

    /// Convert a simplified, rectified formula to extended CNF over the
    /// name pool `hplus`.
    ///
    /// Each quantifier adds one fresh plus-name of its variable's sort to
    /// `hplus` before recursing, so the domain of substitution is never
    /// empty, and snapshots the pool so names created by the recursion are
    /// not substituted for the outer variable.
    pub fn make_cnf(&self, sf: &mut SymbolFactory, hplus: &mut SortedTermSet) -> Cnf {
        match self {
            Formula::Equal { sign, t1, t2 } => {
                let mut d = Disj::new();
                if *sign {
                    d.add_eq(t1.clone(), t2.clone());
                } else {
                    d.add_neq(t1.clone(), t2.clone());
                }
                Cnf::from_disj(d)
            }
            Formula::Lit(l) => {
                let mut d = Disj::new();
                d.add_literal(l.clone());
                Cnf::from_disj(d)
            }
            Formula::Junction { kind, lhs, rhs } => {
                let c1 = lhs.make_cnf(sf, hplus);
                let c2 = rhs.make_cnf(sf, hplus);
                match kind {
                    JunctionKind::Or => c1.or(&c2),
                    JunctionKind::And => c1.and(&c2),
                }
            }
            Formula::Quantifier { kind, x, body } => {
                let witness = Term::from(sf.create_plus_name(x.sort()));
                hplus.insert(witness);
                let domain: Vec<Term> = hplus.of_sort(x.sort()).cloned().collect();
                let c = body.make_cnf(sf, hplus);
                let mut result: Option<Cnf> = None;
                for n in domain {
                    let inst = c.substitute(&Substitution::single(*x, n));
                    result = Some(match (result, kind) {
                        (None, _) => inst,
                        (Some(r), QuantifierKind::Exists) => r.or(&inst),
                        (Some(r), QuantifierKind::Forall) => r.and(&inst),
                    });
                }
                result.expect("the witness makes the domain non-empty")
            }
            Formula::Know { k, z, sign, body } => {
                let mut d = Disj::new();
                d.add_know(*k, z.clone(), *sign, body.make_cnf(sf, hplus));
                Cnf::from_disj(d)
            }
            Formula::Believe {
                k,
                z,
                sign,
                neg_phi,
                psi,
            } => {
                let mut d = Disj::new();
                d.add_believe(
                    *k,
                    z.clone(),
                    *sign,
                    neg_phi.make_cnf(sf, hplus),
                    psi.make_cnf(sf, hplus),
                );
                Cnf::from_disj(d)
            }
        }
    }

    // === Regression ===

    /// Rewrite the formula through the successor state axioms until no
    /// defined fluent remains under a non-empty prefix.
    pub fn regress(
        &self,
        sf: &mut SymbolFactory,
        axioms: &impl DynamicAxioms,
    ) -> Result<Formula, RegressError> {
        match self {
            Formula::Equal { .. } => Ok(self.clone()),
            Formula::Lit(l) => match axioms.regress_one_step(sf, l) {
                None => Ok(self.clone()),
                Some(mut phi) => {
                    if !l.sign() {
                        phi.negate();
                    }
                    phi.regress(sf, axioms)
                }
            },
            Formula::Junction { kind, lhs, rhs } => Ok(Formula::Junction {
                kind: *kind,
                lhs: Box::new(lhs.regress(sf, axioms)?),
                rhs: Box::new(rhs.regress(sf, axioms)?),
            }),
            Formula::Quantifier { kind, x, body } => {
                let mut psi = body.regress(sf, axioms)?;
                let y = sf.create_variable(x.sort());
                psi.substitute_in_place(&Substitution::single(*x, Term::from(y)));
                Ok(Formula::Quantifier {
                    kind: *kind,
                    x: y,
                    body: Box::new(psi),
                })
            }
            Formula::Know { .. } | Formula::Believe { .. } => Err(RegressError::NonObjective),
        }
    }

    // === Entailment pipeline ===

    /// Is the formula entailed by the setup at split level `k`?
    pub fn entailed_by(&self, sf: &mut SymbolFactory, setup: &mut Setup, k: SplitLevel) -> bool {
        let mut hplus = sf.sorted_names();
        match self.simplify() {
            (Truth::TriviallyTrue, _) => true,
            (Truth::TriviallyFalse, _) => setup.inconsistent(k),
            (Truth::Nontrivial, Some(mut phi)) => {
                phi.rectify(sf);
                let mut cnf = phi.make_cnf(sf, &mut hplus);
                cnf.minimize();
                cnf.entailed_by(setup, k)
            }
            (Truth::Nontrivial, None) => unreachable!("nontrivial simplification yields a formula"),
        }
    }

    /// Multi-world overload of [`entailed_by`](Self::entailed_by).
    pub fn entailed_by_setups(
        &self,
        sf: &mut SymbolFactory,
        setups: &mut Setups,
        k: SplitLevel,
    ) -> bool {
        let mut hplus = sf.sorted_names();
        match self.simplify() {
            (Truth::TriviallyTrue, _) => true,
            (Truth::TriviallyFalse, _) => setups.inconsistent(k),
            (Truth::Nontrivial, Some(mut phi)) => {
                phi.rectify(sf);
                let mut cnf = phi.make_cnf(sf, &mut hplus);
                cnf.minimize();
                cnf.entailed_by_setups(setups, k)
            }
            (Truth::Nontrivial, None) => unreachable!("nontrivial simplification yields a formula"),
        }
    }

    /// Clausify an objective formula and add it to the setup.
    pub fn add_to_setup(&self, sf: &mut SymbolFactory, setup: &mut Setup) -> SetupResult {
        let mut hplus = sf.sorted_names();
        match self.simplify() {
            (Truth::TriviallyTrue, _) => SetupResult::Subsumed,
            (Truth::TriviallyFalse, _) => setup.add_clause(crate::fol::Clause::empty()),
            (Truth::Nontrivial, Some(mut phi)) => {
                phi.rectify(sf);
                let mut cnf = phi.make_cnf(sf, &mut hplus);
                cnf.minimize();
                cnf.add_to_setup(setup)
            }
            (Truth::Nontrivial, None) => unreachable!("nontrivial simplification yields a formula"),
        }
    }

    /// Clausify an objective formula and add it to every level.
    pub fn add_to_setups(&self, sf: &mut SymbolFactory, setups: &mut Setups) -> SetupResult {
        let mut hplus = sf.sorted_names();
        match self.simplify() {
            (Truth::TriviallyTrue, _) => SetupResult::Subsumed,
            (Truth::TriviallyFalse, _) => setups.add_clause(crate::fol::Clause::empty()),
            (Truth::Nontrivial, Some(mut phi)) => {
                phi.rectify(sf);
                let mut cnf = phi.make_cnf(sf, &mut hplus);
                cnf.minimize();
                cnf.add_to_setups(setups)
            }
            (Truth::Nontrivial, None) => unreachable!("nontrivial simplification yields a formula"),
        }
    }
}

fn rename_term(t: &Term, env: &HashMap<Symbol, Symbol>) -> Term {
    t.substitute(&env_substitution(env))
}

fn env_substitution(env: &HashMap<Symbol, Symbol>) -> Substitution {
    let mut theta = Substitution::new();
    for (&x, &y) in env {
        theta.insert(x, Term::from(y));
    }
    theta
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Equal { sign, t1, t2 } => {
                write!(f, "({} {} {})", t1, if *sign { "=" } else { "≠" }, t2)
            }
            Formula::Lit(l) => write!(f, "{}", l),
            Formula::Junction { kind, lhs, rhs } => {
                let op = match kind {
                    JunctionKind::Or => "∨",
                    JunctionKind::And => "∧",
                };
                write!(f, "({} {} {})", lhs, op, rhs)
            }
            Formula::Quantifier { kind, x, body } => {
                let q = match kind {
                    QuantifierKind::Exists => "∃",
                    QuantifierKind::Forall => "∀",
                };
                write!(f, "({}{}. {})", q, x, body)
            }
            Formula::Know { k, z, sign, body } => {
                if !*sign {
                    write!(f, "¬")?;
                }
                if !z.is_empty() {
                    write!(f, "[")?;
                    for (i, a) in z.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, "]")?;
                }
                write!(f, "K_{}({})", k, body)
            }
            Formula::Believe {
                k,
                z,
                sign,
                neg_phi,
                psi,
            } => {
                if !*sign {
                    write!(f, "¬")?;
                }
                if !z.is_empty() {
                    write!(f, "[")?;
                    for (i, a) in z.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, "]")?;
                }
                write!(f, "B_{}(¬{} ⇒ {})", k, neg_phi, psi)
            }
        }
    }
}
