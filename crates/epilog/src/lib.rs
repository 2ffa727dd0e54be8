//! epilog: a reasoner for a first-order epistemic logic with actions.
//!
//! Given a knowledge base of proper+ clauses (possibly augmented by
//! successor state axioms) and a query nesting equality, quantifiers, action
//! prefixes, and the modal operators K (knowledge) and B (belief), the
//! library decides entailment at a caller-chosen split level k: a bounded
//! form of reasoning by cases that approximates classical entailment by
//! splitting on at most k literals. The procedure is sound for every k ≥ 0
//! and more complete the larger k is.

pub mod bat;
pub mod fol;
pub mod formula;
pub mod grounder;
pub mod setup;

/// Upper bound on the number of case splits an entailment query may use.
/// Level 0 is unit propagation only.
pub type SplitLevel = usize;

// Re-export commonly used types from fol
pub use fol::{
    Clause, Constraint, Ewff, GuardedClause, Lhs, Literal, Sort, SortedTermSet, Substitution,
    Symbol, SymbolFactory, SymbolKind, Term, TermSeq,
};

// Re-export the formula layer
pub use formula::cnf::{BLiteral, Cnf, Disj, KLiteral};
pub use formula::{DynamicAxioms, Formula, JunctionKind, QuantifierKind, RegressError, Truth};

// Re-export setup and grounder types
pub use bat::BasicActionTheory;
pub use grounder::pool::{NamePool, VariablePool};
pub use grounder::Grounder;
pub use setup::{BeliefEval, Setup, SetupResult, Setups};
