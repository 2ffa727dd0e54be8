//! Sorts, symbols, and the symbol factory.
//!
//! Symbols are interned by a [`SymbolFactory`] and carry `Copy` semantics:
//! a symbol is a `u32` id plus its sort, kind, and arity. Identity implies
//! equality, so comparison and hashing are O(1). Standard names minted as
//! quantifier witnesses ("plus names") are flagged so they can be excluded
//! from the name pool a query is grounded over.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::term::{SortedTermSet, Term};

/// An opaque sort id partitioning the term universe.
///
/// Terms of different sort are never equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sort(pub(crate) u32);

impl Sort {
    /// Get the raw id value (for debugging/serialization)
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// What a symbol stands for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolKind {
    /// A function symbol of fixed arity (arity 0 is a constant function).
    Function,
    /// A standard name: a rigid designator, distinct from every other name.
    Name,
    /// A schematic variable.
    Variable,
}

/// An interned symbol: function, standard name, or variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    id: u32,
    sort: Sort,
    kind: SymbolKind,
    arity: u8,
    plus: bool,
}

impl Symbol {
    pub fn id(self) -> u32 {
        self.id
    }

    pub fn sort(self) -> Sort {
        self.sort
    }

    pub fn kind(self) -> SymbolKind {
        self.kind
    }

    /// Arity of a function symbol; names and variables are nullary.
    pub fn arity(self) -> usize {
        self.arity as usize
    }

    pub fn is_function(self) -> bool {
        self.kind == SymbolKind::Function
    }

    pub fn is_name(self) -> bool {
        self.kind == SymbolKind::Name
    }

    pub fn is_variable(self) -> bool {
        self.kind == SymbolKind::Variable
    }

    /// True for pool-minted witness names. Plus names are not part of the
    /// name pool returned by [`SymbolFactory::sorted_names`].
    pub fn is_plus_name(self) -> bool {
        self.plus
    }
}

/// Factory for sorts and symbols.
///
/// Created symbols are stable for the factory's lifetime. The factory also
/// records every non-plus standard name per sort; [`sorted_names`] seeds the
/// finite name pool H⁺ that queries are grounded over.
///
/// [`sorted_names`]: SymbolFactory::sorted_names
#[derive(Debug, Clone, Default)]
pub struct SymbolFactory {
    next_sort: u32,
    next_symbol: u32,
    names: BTreeMap<Sort, Vec<Symbol>>,
}

impl SymbolFactory {
    pub fn new() -> Self {
        SymbolFactory::default()
    }

    /// Mint a fresh sort.
    pub fn create_sort(&mut self) -> Sort {
        let s = Sort(self.next_sort);
        self.next_sort += 1;
        s
    }

    fn create_symbol(&mut self, sort: Sort, kind: SymbolKind, arity: u8, plus: bool) -> Symbol {
        let sym = Symbol {
            id: self.next_symbol,
            sort,
            kind,
            arity,
            plus,
        };
        self.next_symbol += 1;
        sym
    }

    /// Mint a fresh standard name of the given sort.
    pub fn create_name(&mut self, sort: Sort) -> Symbol {
        let sym = self.create_symbol(sort, SymbolKind::Name, 0, false);
        self.names.entry(sort).or_default().push(sym);
        sym
    }

    /// Mint a fresh plus name: a witness for quantifiers during grounding.
    ///
    /// Plus names do not appear in [`sorted_names`](Self::sorted_names);
    /// their lifecycle is managed by the grounder's name pool.
    pub fn create_plus_name(&mut self, sort: Sort) -> Symbol {
        self.create_symbol(sort, SymbolKind::Name, 0, true)
    }

    /// Mint a fresh variable of the given sort.
    pub fn create_variable(&mut self, sort: Sort) -> Symbol {
        self.create_symbol(sort, SymbolKind::Variable, 0, false)
    }

    /// Mint a fresh function symbol with the given value sort and arity.
    pub fn create_function(&mut self, sort: Sort, arity: usize) -> Symbol {
        debug_assert!(arity <= u8::MAX as usize);
        self.create_symbol(sort, SymbolKind::Function, arity as u8, false)
    }

    /// The per-sort sets of all non-plus standard names created so far.
    pub fn sorted_names(&self) -> SortedTermSet {
        let mut set = SortedTermSet::new();
        for names in self.names.values() {
            for &n in names {
                set.insert(Term::from(n));
            }
        }
        set
    }

    /// Number of non-plus standard names of the given sort.
    pub fn name_count(&self, sort: Sort) -> usize {
        self.names.get(&sort).map_or(0, Vec::len)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SymbolKind::Function => write!(f, "f{}", self.id),
            SymbolKind::Name if self.plus => write!(f, "#+{}", self.id),
            SymbolKind::Name => write!(f, "#{}", self.id),
            SymbolKind::Variable => write!(f, "x{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_identity() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let n1 = sf.create_name(s);
        let n2 = sf.create_name(s);

        assert_ne!(n1, n2);
        assert_eq!(n1, n1);
        assert_eq!(n1.sort(), s);
        assert!(n1.is_name());
        assert!(!n1.is_plus_name());
    }

    #[test]
    fn test_kinds_and_arity() {
        let mut sf = SymbolFactory::new();
        let s = sf.create_sort();
        let f = sf.create_function(s, 2);
        let x = sf.create_variable(s);
        let n = sf.create_plus_name(s);

        assert!(f.is_function());
        assert_eq!(f.arity(), 2);
        assert!(x.is_variable());
        assert!(n.is_name());
        assert!(n.is_plus_name());
    }

    #[test]
    fn test_sorted_names_excludes_plus_names() {
        let mut sf = SymbolFactory::new();
        let s1 = sf.create_sort();
        let s2 = sf.create_sort();
        let n1 = sf.create_name(s1);
        let n2 = sf.create_name(s1);
        let n3 = sf.create_name(s2);
        sf.create_plus_name(s1);

        let pool = sf.sorted_names();
        assert_eq!(pool.count(s1), 2);
        assert_eq!(pool.count(s2), 1);
        assert!(pool.contains(&Term::from(n1)));
        assert!(pool.contains(&Term::from(n2)));
        assert!(pool.contains(&Term::from(n3)));
        assert_eq!(sf.name_count(s1), 2);
    }

    #[test]
    fn test_sorts_are_distinct() {
        let mut sf = SymbolFactory::new();
        let s1 = sf.create_sort();
        let s2 = sf.create_sort();
        assert_ne!(s1, s2);
    }
}
