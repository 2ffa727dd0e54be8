//! Clauses: canonically ordered sets of literals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::literal::Literal;
use super::term::{SortedTermSet, Substitution, Term};

/// A disjunction of literals, kept as a set: duplicates removed, order
/// canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Clause {
    literals: BTreeSet<Literal>,
}

impl Clause {
    /// The empty clause, representing falsity.
    pub fn empty() -> Clause {
        Clause::default()
    }

    pub fn new(literals: impl IntoIterator<Item = Literal>) -> Clause {
        Clause {
            literals: literals.into_iter().collect(),
        }
    }

    /// A clause of one literal.
    pub fn unit(l: Literal) -> Clause {
        Clause::new([l])
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn contains(&self, l: &Literal) -> bool {
        self.literals.contains(l)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> + '_ {
        self.literals.iter()
    }

    /// The single literal of a unit clause.
    pub fn unit_literal(&self) -> Option<&Literal> {
        if self.literals.len() == 1 {
            self.literals.iter().next()
        } else {
            None
        }
    }

    pub fn is_ground(&self) -> bool {
        self.literals.iter().all(Literal::is_ground)
    }

    /// A clause is valid (tautologous) if it contains a pair of literals
    /// that cannot both be false: `l` and its flip, or two inequalities with
    /// the same lhs and distinct names.
    pub fn is_valid(&self) -> bool {
        let lits: Vec<&Literal> = self.literals.iter().collect();
        for i in 0..lits.len() {
            for j in (i + 1)..lits.len() {
                if lits[i].valid_with(lits[j]) {
                    return true;
                }
            }
        }
        false
    }

    /// Set-inclusion subsumption: every literal of `self` occurs in `other`.
    pub fn subsumes(&self, other: &Clause) -> bool {
        self.literals.is_subset(&other.literals)
    }

    /// Resolve two ground clauses on a complementary literal, if one exists.
    ///
    /// The resolvent is the union of both clauses minus the complementary
    /// pair; `None` if no literal of `self` has its flip in `other`.
    pub fn resolve(&self, other: &Clause) -> Option<Clause> {
        for l in &self.literals {
            let flipped = l.flip();
            if other.literals.contains(&flipped) {
                let mut literals: BTreeSet<Literal> = self.literals.clone();
                literals.remove(l);
                for m in &other.literals {
                    if *m != flipped {
                        literals.insert(m.clone());
                    }
                }
                return Some(Clause { literals });
            }
        }
        None
    }

    /// The clause with one literal removed.
    pub fn without(&self, l: &Literal) -> Clause {
        let mut literals = self.literals.clone();
        literals.remove(l);
        Clause { literals }
    }

    pub fn substitute(&self, theta: &Substitution) -> Clause {
        Clause::new(self.literals.iter().map(|l| l.substitute(theta)))
    }

    /// Prepend actions to every literal's prefix.
    pub fn prepend_actions(&self, prefix: &[Term]) -> Clause {
        Clause::new(self.literals.iter().map(|l| l.prepend_actions(prefix)))
    }

    pub fn collect_variables(&self, vars: &mut SortedTermSet) {
        for l in &self.literals {
            l.collect_variables(vars);
        }
    }

    pub fn visit_terms(&self, f: &mut impl FnMut(&Term)) {
        for l in &self.literals {
            l.visit_terms(f);
        }
    }
}

impl FromIterator<Literal> for Clause {
    fn from_iter<I: IntoIterator<Item = Literal>>(iter: I) -> Self {
        Clause::new(iter)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "⊥")
        } else {
            for (i, l) in self.literals.iter().enumerate() {
                if i > 0 {
                    write!(f, " ∨ ")?;
                }
                write!(f, "{}", l)?;
            }
            Ok(())
        }
    }
}
