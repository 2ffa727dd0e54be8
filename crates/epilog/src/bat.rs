//! Basic action theories: static and box clause lists.
//!
//! A proper+ knowledge base is a list of guarded clauses. The static part
//! holds at the empty history only; the box part is ∀-closed over histories
//! and is instantiated at every action prefix a query mentions. Both parts
//! are consumed by the grounder exactly like plain clauses; the guard
//! restricts which name tuples are admissible substitutions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::fol::{GuardedClause, Term, TermSeq};

/// Static and dynamic (box) clauses of a basic action theory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicActionTheory {
    statics: Vec<GuardedClause>,
    boxes: Vec<GuardedClause>,
}

impl BasicActionTheory {
    pub fn new() -> BasicActionTheory {
        BasicActionTheory::default()
    }

    /// Add a clause holding at the empty history.
    pub fn add_static(&mut self, gc: impl Into<GuardedClause>) {
        self.statics.push(gc.into());
    }

    /// Add a clause holding after every action sequence.
    pub fn add_box(&mut self, gc: impl Into<GuardedClause>) {
        self.boxes.push(gc.into());
    }

    pub fn statics(&self) -> &[GuardedClause] {
        &self.statics
    }

    pub fn boxes(&self) -> &[GuardedClause] {
        &self.boxes
    }

    /// The box clauses instantiated at one concrete action prefix.
    pub fn box_instances(&self, z: &[Term]) -> Vec<GuardedClause> {
        self.boxes
            .iter()
            .map(|gc| GuardedClause::new(gc.guard.clone(), gc.clause.prepend_actions(z)))
            .collect()
    }

    /// Everything needed to evaluate queries over the given histories: the
    /// static clauses plus box instances at every sub-prefix of every
    /// history (including the empty one).
    pub fn instances_for_prefixes(&self, prefixes: &[TermSeq]) -> Vec<GuardedClause> {
        let mut subs: BTreeSet<TermSeq> = BTreeSet::new();
        subs.insert(Vec::new());
        for z in prefixes {
            for i in 1..=z.len() {
                subs.insert(z[..i].to_vec());
            }
        }
        let mut out = self.statics.clone();
        for z in subs {
            out.extend(self.box_instances(&z));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Clause, Literal, SymbolFactory};

    #[test]
    fn test_box_instances_prepend_prefix() {
        let mut sf = SymbolFactory::new();
        let act = sf.create_sort();
        let bool_sort = sf.create_sort();
        let p = sf.create_function(bool_sort, 0);
        let tru = Term::from(sf.create_name(bool_sort));
        let a = Term::from(sf.create_name(act));
        let b = Term::from(sf.create_name(act));

        let mut bat = BasicActionTheory::new();
        bat.add_box(Clause::unit(Literal::eq(Term::app(p, vec![]), tru.clone())));

        let inst = bat.box_instances(&[a.clone(), b.clone()]);
        assert_eq!(inst.len(), 1);
        let lit = inst[0].clause.iter().next().unwrap();
        assert_eq!(lit.z(), &vec![a.clone(), b.clone()]);

        // Sub-prefixes: [], [a], [a, b] — one instance each, plus statics.
        bat.add_static(Clause::unit(Literal::eq(Term::app(p, vec![]), tru)));
        let all = bat.instances_for_prefixes(&[vec![a, b]]);
        assert_eq!(all.len(), 1 + 3);
    }
}
