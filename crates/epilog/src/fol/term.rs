//! Terms and substitutions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use super::symbol::{Sort, Symbol};

/// A sequence of action terms: the history under which a literal holds.
pub type TermSeq = Vec<Term>;

/// A term: a variable, a standard name, or a function applied to arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Variable(Symbol),
    Name(Symbol),
    App(Symbol, Vec<Term>),
}

impl From<Symbol> for Term {
    fn from(sym: Symbol) -> Self {
        match sym.kind() {
            super::symbol::SymbolKind::Variable => Term::Variable(sym),
            super::symbol::SymbolKind::Name => Term::Name(sym),
            super::symbol::SymbolKind::Function => Term::App(sym, Vec::new()),
        }
    }
}

impl Term {
    /// Build a function application, checking arity.
    pub fn app(sym: Symbol, args: Vec<Term>) -> Term {
        debug_assert!(sym.is_function());
        debug_assert_eq!(sym.arity(), args.len());
        Term::App(sym, args)
    }

    pub fn symbol(&self) -> Symbol {
        match self {
            Term::Variable(s) | Term::Name(s) | Term::App(s, _) => *s,
        }
    }

    pub fn sort(&self) -> Sort {
        self.symbol().sort()
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Term::Name(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Term::App(_, _))
    }

    /// A term is ground iff no variable occurs in it.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Variable(_) => false,
            Term::Name(_) => true,
            Term::App(_, args) => args.iter().all(Term::is_ground),
        }
    }

    /// A term is primitive iff it is a function applied entirely to names.
    pub fn is_primitive(&self) -> bool {
        match self {
            Term::App(_, args) => args.iter().all(Term::is_name),
            _ => false,
        }
    }

    /// Visit this term and all subterms, outermost first.
    pub fn visit(&self, f: &mut impl FnMut(&Term)) {
        f(self);
        if let Term::App(_, args) = self {
            for arg in args {
                arg.visit(f);
            }
        }
    }

    /// Collect all variables in this term.
    pub fn collect_variables(&self, vars: &mut SortedTermSet) {
        self.visit(&mut |t| {
            if t.is_variable() {
                vars.insert(t.clone());
            }
        });
    }

    /// Collect all standard names in this term.
    pub fn collect_names(&self, names: &mut SortedTermSet) {
        self.visit(&mut |t| {
            if t.is_name() {
                names.insert(t.clone());
            }
        });
    }

    /// Apply a substitution to this term.
    pub fn substitute(&self, theta: &Substitution) -> Term {
        match self {
            Term::Variable(v) => theta.get(*v).cloned().unwrap_or_else(|| self.clone()),
            Term::Name(_) => self.clone(),
            Term::App(f, args) => {
                Term::App(*f, args.iter().map(|a| a.substitute(theta)).collect())
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(s) | Term::Name(s) => write!(f, "{}", s),
            Term::App(sym, args) => {
                write!(f, "{}", sym)?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

/// A substitution mapping variable symbols to terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    map: HashMap<Symbol, Term>,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution::default()
    }

    /// A substitution of a single variable.
    pub fn single(var: Symbol, term: Term) -> Self {
        let mut theta = Substitution::new();
        theta.insert(var, term);
        theta
    }

    pub fn insert(&mut self, var: Symbol, term: Term) {
        debug_assert!(var.is_variable());
        debug_assert_eq!(var.sort(), term.sort());
        self.map.insert(var, term);
    }

    pub fn get(&self, var: Symbol) -> Option<&Term> {
        self.map.get(&var)
    }

    pub fn contains(&self, var: Symbol) -> bool {
        self.map.contains_key(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Compose two substitutions: applying the result is equivalent to
    /// applying `self` first and `other` to the outcome.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut result = Substitution::new();
        for (&var, term) in &self.map {
            result.map.insert(var, term.substitute(other));
        }
        for (&var, term) in &other.map {
            result.map.entry(var).or_insert_with(|| term.clone());
        }
        result
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Term)> {
        self.map.iter().map(|(&v, t)| (v, t))
    }
}

/// Apply a substitution to an action prefix.
pub fn substitute_seq(z: &[Term], theta: &Substitution) -> TermSeq {
    z.iter().map(|t| t.substitute(theta)).collect()
}

/// A set of terms bucketed by sort, with deterministic iteration order.
///
/// Used for the per-sort name pools and free-variable sets the grounder
/// manages; grounding enumerates these sets, so the order must be stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortedTermSet {
    by_sort: BTreeMap<Sort, BTreeSet<Term>>,
}

impl SortedTermSet {
    pub fn new() -> Self {
        SortedTermSet::default()
    }

    /// Insert a term under its own sort. Returns true if it was new.
    pub fn insert(&mut self, t: Term) -> bool {
        self.by_sort.entry(t.sort()).or_default().insert(t)
    }

    /// Fold another set into this one.
    pub fn extend(&mut self, other: &SortedTermSet) {
        for t in other.iter() {
            self.insert(t.clone());
        }
    }

    pub fn remove(&mut self, t: &Term) -> bool {
        self.by_sort.get_mut(&t.sort()).is_some_and(|s| s.remove(t))
    }

    pub fn contains(&self, t: &Term) -> bool {
        self.by_sort.get(&t.sort()).is_some_and(|s| s.contains(t))
    }

    pub fn is_empty(&self) -> bool {
        self.by_sort.values().all(BTreeSet::is_empty)
    }

    /// Number of terms of the given sort.
    pub fn count(&self, sort: Sort) -> usize {
        self.by_sort.get(&sort).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.by_sort.values().map(BTreeSet::len).sum()
    }

    /// The sorts with at least one term.
    pub fn sorts(&self) -> impl Iterator<Item = Sort> + '_ {
        self.by_sort
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(&sort, _)| sort)
    }

    /// Iterate the terms of one sort in canonical order.
    pub fn of_sort(&self, sort: Sort) -> impl Iterator<Item = &Term> + '_ {
        self.by_sort.get(&sort).into_iter().flatten()
    }

    /// Iterate all terms, sorts in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Term> + '_ {
        self.by_sort.values().flatten()
    }

    /// Per-sort cardinalities.
    pub fn counts(&self) -> BTreeMap<Sort, usize> {
        self.by_sort
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(&sort, s)| (sort, s.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::symbol::SymbolFactory;

    #[test]
    fn test_ground_and_primitive() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let n = Term::from(sf.create_name(s));
        let x = Term::from(sf.create_variable(s));
        let f = sf.create_function(s, 2);

        let fnn = Term::app(f, vec![n.clone(), n.clone()]);
        let fnx = Term::app(f, vec![n.clone(), x.clone()]);

        assert!(fnn.is_ground());
        assert!(fnn.is_primitive());
        assert!(!fnx.is_ground());
        assert!(!fnx.is_primitive());
        assert!(n.is_ground());
        assert!(!n.is_primitive());
        assert!(!x.is_ground());
    }

    #[test]
    fn test_nested_function_not_primitive() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let n = Term::from(sf.create_name(s));
        let f = sf.create_function(s, 1);
        let g = sf.create_function(s, 1);

        let gf = Term::app(g, vec![Term::app(f, vec![n])]);
        assert!(gf.is_ground());
        assert!(!gf.is_primitive());
    }

    #[test]
    fn test_substitute() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let x = sf.create_variable(s);
        let n = Term::from(sf.create_name(s));
        let f = sf.create_function(s, 1);

        let fx = Term::app(f, vec![Term::from(x)]);
        let theta = Substitution::single(x, n.clone());
        assert_eq!(fx.substitute(&theta), Term::app(f, vec![n]));
    }

    #[test]
    fn test_substitution_composition() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let x = sf.create_variable(s);
        let y = sf.create_variable(s);
        let n = Term::from(sf.create_name(s));

        // x -> y, then y -> n: composing must send x straight to n.
        let theta1 = Substitution::single(x, Term::from(y));
        let theta2 = Substitution::single(y, n.clone());
        let composed = theta1.compose(&theta2);

        let tx = Term::from(x);
        assert_eq!(
            tx.substitute(&composed),
            tx.substitute(&theta1).substitute(&theta2)
        );
        assert_eq!(tx.substitute(&composed), n);
    }

    #[test]
    fn test_sorted_term_set() {
        let mut sf = SymbolFactory::new();
        let s1 = sf.create_sort();
        let s2 = sf.create_sort();
        let n1 = Term::from(sf.create_name(s1));
        let n2 = Term::from(sf.create_name(s1));
        let m = Term::from(sf.create_name(s2));

        let mut set = SortedTermSet::new();
        assert!(set.insert(n1.clone()));
        assert!(!set.insert(n1.clone()));
        set.insert(n2.clone());
        set.insert(m.clone());

        assert_eq!(set.count(s1), 2);
        assert_eq!(set.count(s2), 1);
        assert_eq!(set.len(), 3);
        assert_eq!(set.sorts().count(), 2);
        assert!(set.contains(&m));
        assert!(set.remove(&m));
        assert_eq!(set.count(s2), 0);
    }
}
