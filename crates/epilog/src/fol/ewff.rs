//! Quantifier-free equality guards for proper+ clauses.
//!
//! A proper+ clause is a universally quantified disjunction of literals,
//! optionally prefixed by a guard over equalities and inequalities of its
//! variables. The guard restricts which name tuples are admissible grounding
//! substitutions; the grounder checks it before emitting a ground instance.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::clause::Clause;
use super::term::{Substitution, Term};

/// One conjunct of a guard: `lhs = rhs` or `lhs ≠ rhs` over variables and
/// names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub sign: bool,
    pub lhs: Term,
    pub rhs: Term,
}

/// A conjunction of equality constraints guarding a clause template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ewff {
    constraints: Vec<Constraint>,
}

impl Ewff {
    /// The trivially true guard.
    pub fn truth() -> Ewff {
        Ewff::default()
    }

    pub fn new(constraints: Vec<Constraint>) -> Ewff {
        Ewff { constraints }
    }

    /// Guard requiring `lhs = rhs`.
    pub fn and_eq(mut self, lhs: Term, rhs: Term) -> Ewff {
        self.constraints.push(Constraint {
            sign: true,
            lhs,
            rhs,
        });
        self
    }

    /// Guard requiring `lhs ≠ rhs`.
    pub fn and_neq(mut self, lhs: Term, rhs: Term) -> Ewff {
        self.constraints.push(Constraint {
            sign: false,
            lhs,
            rhs,
        });
        self
    }

    pub fn is_trivial(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Decide the guard under a grounding substitution.
    ///
    /// Every constraint must be decided by the substitution: both sides must
    /// come out ground (standard names compare by identity).
    pub fn holds_under(&self, theta: &Substitution) -> bool {
        self.constraints.iter().all(|c| {
            let lhs = c.lhs.substitute(theta);
            let rhs = c.rhs.substitute(theta);
            debug_assert!(lhs.is_ground() && rhs.is_ground());
            (lhs == rhs) == c.sign
        })
    }

    pub fn collect_variables(&self, vars: &mut super::term::SortedTermSet) {
        for c in &self.constraints {
            c.lhs.collect_variables(vars);
            c.rhs.collect_variables(vars);
        }
    }
}

/// A clause template with its admissibility guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardedClause {
    pub guard: Ewff,
    pub clause: Clause,
}

impl GuardedClause {
    /// Wrap a plain clause with the trivially true guard.
    pub fn unguarded(clause: Clause) -> GuardedClause {
        GuardedClause {
            guard: Ewff::truth(),
            clause,
        }
    }

    pub fn new(guard: Ewff, clause: Clause) -> GuardedClause {
        GuardedClause { guard, clause }
    }
}

impl From<Clause> for GuardedClause {
    fn from(clause: Clause) -> Self {
        GuardedClause::unguarded(clause)
    }
}

impl fmt::Display for Ewff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return write!(f, "⊤");
        }
        for (i, c) in self.constraints.iter().enumerate() {
            if i > 0 {
                write!(f, " ∧ ")?;
            }
            let op = if c.sign { "=" } else { "≠" };
            write!(f, "{} {} {}", c.lhs, op, c.rhs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::symbol::SymbolFactory;

    #[test]
    fn test_trivial_guard() {
        let theta = Substitution::new();
        assert!(Ewff::truth().holds_under(&theta));
    }

    #[test]
    fn test_neq_guard() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let x = sf.create_variable(s);
        let y = sf.create_variable(s);
        let n1 = Term::from(sf.create_name(s));
        let n2 = Term::from(sf.create_name(s));

        let guard = Ewff::truth().and_neq(Term::from(x), Term::from(y));

        let mut same = Substitution::new();
        same.insert(x, n1.clone());
        same.insert(y, n1.clone());
        assert!(!guard.holds_under(&same));

        let mut diff = Substitution::new();
        diff.insert(x, n1);
        diff.insert(y, n2);
        assert!(guard.holds_under(&diff));
    }

    #[test]
    fn test_eq_to_name_guard() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let x = sf.create_variable(s);
        let n1 = Term::from(sf.create_name(s));
        let n2 = Term::from(sf.create_name(s));

        let guard = Ewff::truth().and_eq(Term::from(x), n1.clone());
        assert!(guard.holds_under(&Substitution::single(x, n1)));
        assert!(!guard.holds_under(&Substitution::single(x, n2)));
    }
}
