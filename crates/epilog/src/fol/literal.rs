//! Literals: equalities and inequalities between a term and a standard name,
//! evaluated under an action prefix.
//!
//! A literal reads `[z] lhs = rhs` (positive) or `[z] lhs ≠ rhs` (negative),
//! where `rhs` is always a standard name. Standard names are unique, so a
//! positive unit about a term decides every other literal on the same
//! left-hand side; [`Literal::satisfied_by`] and [`Literal::falsified_by`]
//! capture that rule for unit propagation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::term::{substitute_seq, SortedTermSet, Substitution, Term, TermSeq};

/// The identity of a literal's left-hand side: action prefix plus term.
pub type Lhs = (TermSeq, Term);

/// An equality or inequality literal under an action prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    z: TermSeq,
    sign: bool,
    lhs: Term,
    rhs: Term,
}

impl Literal {
    /// A positive literal `lhs = rhs` at the empty action prefix.
    pub fn eq(lhs: Term, rhs: Term) -> Literal {
        Literal::new(Vec::new(), true, lhs, rhs)
    }

    /// A negative literal `lhs ≠ rhs` at the empty action prefix.
    pub fn neq(lhs: Term, rhs: Term) -> Literal {
        Literal::new(Vec::new(), false, lhs, rhs)
    }

    pub fn new(z: TermSeq, sign: bool, lhs: Term, rhs: Term) -> Literal {
        debug_assert!(rhs.is_name() || rhs.is_variable());
        Literal { z, sign, lhs, rhs }
    }

    pub fn z(&self) -> &TermSeq {
        &self.z
    }

    pub fn sign(&self) -> bool {
        self.sign
    }

    pub fn lhs(&self) -> &Term {
        &self.lhs
    }

    pub fn rhs(&self) -> &Term {
        &self.rhs
    }

    /// The left-hand-side identity used by the lhs/rhs index.
    pub fn lhs_key(&self) -> Lhs {
        (self.z.clone(), self.lhs.clone())
    }

    /// Toggle the sign.
    pub fn flip(&self) -> Literal {
        Literal {
            z: self.z.clone(),
            sign: !self.sign,
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
        }
    }

    /// The positive version of this literal.
    pub fn positive(&self) -> Literal {
        Literal {
            sign: true,
            ..self.clone()
        }
    }

    /// Prepend actions to this literal's prefix.
    pub fn prepend_actions(&self, prefix: &[Term]) -> Literal {
        let mut z = prefix.to_vec();
        z.extend(self.z.iter().cloned());
        Literal {
            z,
            sign: self.sign,
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
        }
    }

    /// Ground iff the prefix and both sides are ground.
    pub fn is_ground(&self) -> bool {
        self.z.iter().all(Term::is_ground) && self.lhs.is_ground() && self.rhs.is_ground()
    }

    /// Primitive iff ground and the lhs is a function applied to names.
    pub fn is_primitive(&self) -> bool {
        self.is_ground() && self.lhs.is_primitive()
    }

    pub fn substitute(&self, theta: &Substitution) -> Literal {
        Literal {
            z: substitute_seq(&self.z, theta),
            sign: self.sign,
            lhs: self.lhs.substitute(theta),
            rhs: self.rhs.substitute(theta),
        }
    }

    /// Collect the variables of prefix, lhs, and rhs.
    pub fn collect_variables(&self, vars: &mut SortedTermSet) {
        for a in &self.z {
            a.collect_variables(vars);
        }
        self.lhs.collect_variables(vars);
        self.rhs.collect_variables(vars);
    }

    /// Collect the standard names of prefix, lhs, and rhs.
    pub fn collect_names(&self, names: &mut SortedTermSet) {
        for a in &self.z {
            a.collect_names(names);
        }
        self.lhs.collect_names(names);
        self.rhs.collect_names(names);
    }

    /// Visit every term occurring in the literal (prefix, lhs, rhs) and its
    /// subterms.
    pub fn visit_terms(&self, f: &mut impl FnMut(&Term)) {
        for a in &self.z {
            a.visit(f);
        }
        self.lhs.visit(f);
        self.rhs.visit(f);
    }

    fn same_lhs(&self, other: &Literal) -> bool {
        self.z == other.z && self.lhs == other.lhs
    }

    /// Does the given ground unit make this literal true?
    ///
    /// `t = n` satisfies `t = n` and every `t ≠ n'` with `n' ≠ n`;
    /// `t ≠ n` satisfies `t ≠ n`.
    pub fn satisfied_by(&self, unit: &Literal) -> bool {
        if !self.same_lhs(unit) {
            return false;
        }
        if unit.sign {
            if self.sign {
                self.rhs == unit.rhs
            } else {
                self.rhs != unit.rhs
            }
        } else {
            !self.sign && self.rhs == unit.rhs
        }
    }

    /// Does the given ground unit make this literal false?
    pub fn falsified_by(&self, unit: &Literal) -> bool {
        self.flip().satisfied_by(unit)
    }

    /// Two literals on the same lhs that cannot both be false: a literal and
    /// its flip, or two inequalities with distinct names (unique names).
    pub fn valid_with(&self, other: &Literal) -> bool {
        if !self.same_lhs(other) {
            return false;
        }
        if self.sign != other.sign {
            self.rhs == other.rhs
        } else {
            !self.sign && !other.sign && self.rhs != other.rhs
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.z.is_empty() {
            write!(f, "[")?;
            for (i, a) in self.z.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", a)?;
            }
            write!(f, "]")?;
        }
        let op = if self.sign { "=" } else { "≠" };
        write!(f, "{} {} {}", self.lhs, op, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::symbol::SymbolFactory;

    fn world() -> (SymbolFactory, Term, Term, Term) {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let f = sf.create_function(s, 1);
        let n1 = Term::from(sf.create_name(s));
        let n2 = Term::from(sf.create_name(s));
        let t = Term::app(f, vec![n1.clone()]);
        (sf, t, n1, n2)
    }

    #[test]
    fn test_flip_involution() {
        let (_, t, n1, _) = world();
        let l = Literal::eq(t, n1);
        assert_eq!(l.flip().flip(), l);
        assert_ne!(l.flip(), l);
    }

    #[test]
    fn test_ground_primitive() {
        let (mut sf, t, n1, _) = world();
        let l = Literal::eq(t.clone(), n1.clone());
        assert!(l.is_ground());
        assert!(l.is_primitive());

        let x = Term::from(sf.create_variable(n1.sort()));
        let lx = Literal::eq(t, x);
        assert!(!lx.is_ground());
        assert!(!lx.is_primitive());
    }

    #[test]
    fn test_prepend_actions() {
        let (mut sf, t, n1, _) = world();
        let act = sf.create_sort();
        let a = Term::from(sf.create_name(act));
        let b = Term::from(sf.create_name(act));

        let l = Literal::eq(t, n1).prepend_actions(&[b.clone()]);
        let l = l.prepend_actions(&[a.clone()]);
        assert_eq!(l.z(), &vec![a, b]);
    }

    #[test]
    fn test_unit_interpretation() {
        let (_, t, n1, n2) = world();
        let eq1 = Literal::eq(t.clone(), n1.clone());
        let eq2 = Literal::eq(t.clone(), n2.clone());
        let neq1 = Literal::neq(t.clone(), n1.clone());
        let neq2 = Literal::neq(t, n2);

        // t = n1 decides everything about t.
        assert!(eq1.satisfied_by(&eq1));
        assert!(eq2.falsified_by(&eq1));
        assert!(neq1.falsified_by(&eq1));
        assert!(neq2.satisfied_by(&eq1));

        // t ≠ n1 only decides literals naming n1.
        assert!(neq1.satisfied_by(&neq1));
        assert!(eq1.falsified_by(&neq1));
        assert!(!eq2.satisfied_by(&neq1));
        assert!(!eq2.falsified_by(&neq1));
    }

    #[test]
    fn test_valid_pairs() {
        let (_, t, n1, n2) = world();
        let eq1 = Literal::eq(t.clone(), n1.clone());
        let neq1 = Literal::neq(t.clone(), n1.clone());
        let neq2 = Literal::neq(t.clone(), n2.clone());
        let eq2 = Literal::eq(t, n2);

        assert!(eq1.valid_with(&neq1));
        assert!(neq1.valid_with(&neq2));
        assert!(!eq1.valid_with(&eq2));
        assert!(!eq1.valid_with(&neq2));
    }
}
