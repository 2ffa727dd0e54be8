//! Ranked multi-world setups for conditional belief.
//!
//! A [`Setups`] is a sequence of setups ordered by plausibility: level 0 is
//! the most plausible world description. Objective queries are answered by
//! the first consistent level; conditional beliefs are evaluated at the
//! first level where the belief's antecedent is possible. The evaluation
//! style for belief literals is caller-chosen via [`BeliefEval`].

use crate::fol::Clause;

use super::{Setup, SetupResult};

/// How a belief literal `B(¬φ ⇒ ψ)` is evaluated at the selected level.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum BeliefEval {
    /// Check `ψ` on its own at the first level where `φ` is possible.
    #[default]
    Separate,
    /// Check the single combined query `¬φ ∨ ψ` at that level.
    Combined,
}

/// Plausibility-ranked setups.
#[derive(Debug, Clone, Default)]
pub struct Setups {
    levels: Vec<Setup>,
    belief_eval: BeliefEval,
}

impl Setups {
    pub fn new() -> Setups {
        Setups::default()
    }

    /// A stack of `n` empty levels.
    pub fn with_levels(n: usize) -> Setups {
        Setups {
            levels: vec![Setup::new(); n.max(1)],
            belief_eval: BeliefEval::default(),
        }
    }

    pub fn set_belief_eval(&mut self, mode: BeliefEval) {
        self.belief_eval = mode;
    }

    pub fn belief_eval(&self) -> BeliefEval {
        self.belief_eval
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn push_level(&mut self, setup: Setup) {
        self.levels.push(setup);
    }

    pub fn level(&self, i: usize) -> &Setup {
        &self.levels[i]
    }

    pub fn level_mut(&mut self, i: usize) -> &mut Setup {
        &mut self.levels[i]
    }

    pub fn levels_mut(&mut self) -> impl Iterator<Item = &mut Setup> + '_ {
        self.levels.iter_mut()
    }

    /// Add a ground clause to every level.
    ///
    /// The result is `Inconsistent` only if every level became inconsistent,
    /// `Ok` if any level actually grew.
    pub fn add_clause(&mut self, c: Clause) -> SetupResult {
        let mut result = SetupResult::Subsumed;
        let mut all_inconsistent = true;
        for s in &mut self.levels {
            match s.add_clause(c.clone()) {
                SetupResult::Inconsistent => {}
                SetupResult::Ok => {
                    result = SetupResult::Ok;
                    all_inconsistent = false;
                }
                SetupResult::Subsumed => {
                    all_inconsistent = false;
                }
            }
        }
        if all_inconsistent {
            SetupResult::Inconsistent
        } else {
            result
        }
    }

    /// Index of the most plausible consistent level, if any.
    pub fn first_consistent_level(&self) -> Option<usize> {
        self.levels.iter().position(Setup::consistent)
    }

    /// Objective entailment: the first consistent level decides; if every
    /// level is inconsistent, everything is entailed.
    pub fn entails(&mut self, c: &Clause, k: usize) -> bool {
        match self.first_consistent_level() {
            Some(i) => self.levels[i].entails(c, k),
            None => true,
        }
    }

    /// Are all levels inconsistent at split level `k`?
    pub fn inconsistent(&mut self, k: usize) -> bool {
        self.levels.iter_mut().all(|s| s.inconsistent(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::{Literal, SymbolFactory, Term};

    #[test]
    fn test_first_consistent_level_answers() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let f = sf.create_function(s, 1);
        let n1 = Term::from(sf.create_name(s));
        let n2 = Term::from(sf.create_name(s));
        let t = Term::app(f, vec![n1.clone()]);
        let a = Literal::eq(t.clone(), n1.clone());
        let b = Literal::eq(t, n2);

        let mut ss = Setups::with_levels(2);
        // Level 0 is contradictory; level 1 knows a.
        ss.level_mut(0).add_clause(Clause::unit(a.clone()));
        ss.level_mut(0).add_clause(Clause::unit(a.flip()));
        ss.level_mut(1).add_clause(Clause::unit(a.clone()));

        assert_eq!(ss.first_consistent_level(), Some(1));
        assert!(ss.entails(&Clause::unit(a), 0));
        assert!(!ss.entails(&Clause::unit(b), 0));
        assert!(!ss.inconsistent(0));
    }

    #[test]
    fn test_add_clause_feeds_all_levels() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let f = sf.create_function(s, 1);
        let n1 = Term::from(sf.create_name(s));
        let t = Term::app(f, vec![n1.clone()]);
        let a = Literal::eq(t, n1);

        let mut ss = Setups::with_levels(3);
        assert_eq!(ss.add_clause(Clause::unit(a.clone())), SetupResult::Ok);
        for i in 0..3 {
            assert!(ss.level(i).subsumes(&Clause::unit(a.clone())));
        }
    }
}
