//! The grounder: incremental management of the standard names substituted
//! for variables, and of the ground setup those substitutions induce.
//!
//! Every public mutator pushes a *ply* — a checkpoint frame recording the
//! clauses, names, relevance entries, and index entries added since the
//! previous checkpoint — and regrounds: open clauses from every ply are
//! instantiated over the grown name pool and fed to the active setup.
//! [`undo_last`](Grounder::undo_last) pops the top ply, truncates the shared
//! setup storage to the ply's entry mark, and returns the ply's plus-names
//! to the pool, restoring the grounder structurally. Ply operations are
//! strictly LIFO.

pub mod pool;

use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::fol::{
    substitute_seq, Clause, GuardedClause, Lhs, Literal, Sort, SortedTermSet, Substitution,
    Symbol, SymbolFactory, Term, TermSeq,
};
use crate::formula::Formula;
use crate::setup::{Setup, SetupMark, SetupResult};
use pool::{NamePool, VariablePool};

/// A clause template with its free variables, kept for regrounding.
#[derive(Debug, Clone)]
struct UngroundedClause {
    guarded: GuardedClause,
    vars: SortedTermSet,
}

/// A query literal with its free variables, feeding the lhs/rhs index.
#[derive(Debug, Clone)]
struct UngroundedLiteral {
    lit: Literal,
    vars: SortedTermSet,
}

/// A relevance template: a function term under an action prefix.
#[derive(Debug, Clone)]
struct UngroundedLhs {
    z: TermSeq,
    term: Term,
    vars: SortedTermSet,
}

/// One checkpoint frame of the grounder.
#[derive(Debug)]
struct Ply {
    ungrounded: Vec<UngroundedClause>,
    dnaii: bool,
    owns_setup: Option<Setup>,
    start_mark: Option<SetupMark>,
    filter: bool,
    relevant_ungrounded: Vec<UngroundedLhs>,
    relevant_terms: BTreeSet<Lhs>,
    mentioned: SortedTermSet,
    plus_max: SortedTermSet,
    plus_new: SortedTermSet,
    plus_mentioned: SortedTermSet,
    lhs_rhs_ungrounded: Vec<UngroundedLiteral>,
    lhs_rhs: BTreeMap<Lhs, BTreeSet<Term>>,
}

impl Ply {
    fn owning(setup: Setup, filter: bool) -> Ply {
        Ply {
            ungrounded: Vec::new(),
            dnaii: false,
            owns_setup: Some(setup),
            start_mark: None,
            filter,
            relevant_ungrounded: Vec::new(),
            relevant_terms: BTreeSet::new(),
            mentioned: SortedTermSet::new(),
            plus_max: SortedTermSet::new(),
            plus_new: SortedTermSet::new(),
            plus_mentioned: SortedTermSet::new(),
            lhs_rhs_ungrounded: Vec::new(),
            lhs_rhs: BTreeMap::new(),
        }
    }

    fn shallow(mark: SetupMark, filter: bool) -> Ply {
        let mut p = Ply::owning(Setup::new(), filter);
        p.owns_setup = None;
        p.start_mark = Some(mark);
        p
    }
}

/// Incremental, backtracking-friendly grounding of a proper+ knowledge base
/// and its queries.
#[derive(Debug, Default)]
pub struct Grounder {
    name_pool: NamePool,
    var_pool: VariablePool,
    plies: Vec<Ply>,
    empty_setup: Setup,
}

impl Grounder {
    pub fn new() -> Grounder {
        Grounder::default()
    }

    /// The plus-name pool, public so callers can handle free variables of
    /// representation-level queries themselves.
    pub fn name_pool(&self) -> &NamePool {
        &self.name_pool
    }

    pub fn num_plies(&self) -> usize {
        self.plies.len()
    }

    fn owner_index(&self) -> Option<usize> {
        self.plies.iter().rposition(|p| p.owns_setup.is_some())
    }

    /// The active setup view: the top ply's.
    pub fn setup(&self) -> &Setup {
        match self.owner_index() {
            Some(i) => self.plies[i].owns_setup.as_ref().expect("owner"),
            None => &self.empty_setup,
        }
    }

    /// Mutable access to the active setup, for entailment queries.
    pub fn setup_mut(&mut self) -> &mut Setup {
        match self.owner_index() {
            Some(i) => self.plies[i].owns_setup.as_mut().expect("owner"),
            None => &mut self.empty_setup,
        }
    }

    // === Ply bookkeeping ===

    fn new_ply(&mut self) -> &mut Ply {
        let ply = if self.plies.is_empty() {
            Ply::owning(Setup::new(), false)
        } else {
            let mark = self.setup().mark();
            let filter = self.plies.last().expect("non-empty").filter;
            Ply::shallow(mark, filter)
        };
        self.plies.push(ply);
        self.plies.last_mut().expect("just pushed")
    }

    fn pop_ply(&mut self) {
        let Some(p) = self.plies.pop() else { return };
        if p.owns_setup.is_none() {
            let mark = p.start_mark.expect("shallow ply carries its entry mark");
            self.setup_mut().truncate(mark);
        }
        for t in p.plus_max.iter() {
            self.name_pool.give_back(t.clone());
        }
        for t in p.plus_new.iter() {
            self.name_pool.give_back(t.clone());
        }
    }

    /// Pop the top ply, restoring the grounder to its pre-push state.
    pub fn undo_last(&mut self) {
        self.pop_ply();
    }

    // === Name management ===

    fn is_occurring_name(&self, n: &Term) -> bool {
        self.plies
            .iter()
            .any(|p| p.mentioned.contains(n) || p.plus_mentioned.contains(n))
    }

    /// All names available for a sort across the ply stack.
    pub fn names(&self, sort: Sort) -> Vec<Term> {
        self.names_in(sort, 0..self.plies.len()).into_iter().collect()
    }

    fn names_in(&self, sort: Sort, range: std::ops::Range<usize>) -> BTreeSet<Term> {
        let mut out = BTreeSet::new();
        for p in &self.plies[range] {
            out.extend(p.mentioned.of_sort(sort).cloned());
            out.extend(p.plus_max.of_sort(sort).cloned());
            out.extend(p.plus_new.of_sort(sort).cloned());
        }
        out
    }

    fn new_names(&self, sort: Sort) -> BTreeSet<Term> {
        let n = self.plies.len();
        self.names_in(sort, n.saturating_sub(1)..n)
    }

    fn classify_names(&self, visit: impl Fn(&mut dyn FnMut(&Term))) -> (SortedTermSet, SortedTermSet) {
        let mut mentioned = SortedTermSet::new();
        let mut plus_mentioned = SortedTermSet::new();
        visit(&mut |t: &Term| {
            if t.is_name() && !self.is_occurring_name(t) {
                if t.symbol().is_plus_name() {
                    plus_mentioned.insert(t.clone());
                } else {
                    mentioned.insert(t.clone());
                }
            }
        });
        (mentioned, plus_mentioned)
    }

    fn total_plus_max(&self, sort: Sort) -> usize {
        self.plies.iter().map(|p| p.plus_max.count(sort)).sum()
    }

    /// Top up the shared plus-name stock so every sort has at least
    /// `|vars of that sort| + extra` names across the whole stack.
    fn create_max_plus_names(&mut self, sf: &mut SymbolFactory, vars: &SortedTermSet, extra: usize) {
        let demands: Vec<(Sort, usize)> = vars
            .sorts()
            .map(|sort| (sort, vars.count(sort) + extra))
            .collect();
        for (sort, need) in demands {
            let have = self.total_plus_max(sort);
            for _ in have..need {
                let t = self.name_pool.create(sf, sort);
                self.plies.last_mut().expect("ply pushed").plus_max.insert(t);
            }
        }
    }

    fn create_max_plus_names_counts(&mut self, sf: &mut SymbolFactory, counts: &BTreeMap<Sort, usize>) {
        for (&sort, &need) in counts {
            let have = self.total_plus_max(sort);
            for _ in have..need {
                let t = self.name_pool.create(sf, sort);
                self.plies.last_mut().expect("ply pushed").plus_max.insert(t);
            }
        }
    }

    /// One fresh single-use plus-name per plus-name that reappeared in the
    /// input, so an unused witness always remains.
    fn create_new_plus_names(&mut self, sf: &mut SymbolFactory, counts: &BTreeMap<Sort, usize>) {
        for (&sort, &n) in counts {
            for _ in 0..n {
                let t = self.name_pool.create(sf, sort);
                self.plies.last_mut().expect("ply pushed").plus_new.insert(t);
            }
        }
    }

    // === Substitution enumeration ===

    fn cartesian(vars: &[Symbol], domains: &[Vec<Term>]) -> Vec<Substitution> {
        let mut result = vec![Substitution::new()];
        for (x, domain) in vars.iter().zip(domains) {
            if domain.is_empty() {
                return Vec::new();
            }
            let mut next = Vec::with_capacity(result.len() * domain.len());
            for theta in &result {
                for n in domain {
                    let mut t2 = theta.clone();
                    t2.insert(*x, n.clone());
                    next.push(t2);
                }
            }
            result = next;
        }
        result
    }

    /// Substitutions of all variables over the full name pool.
    fn all_groundings(&self, vars: &SortedTermSet) -> Vec<Substitution> {
        let var_list: Vec<Symbol> = vars.iter().map(Term::symbol).collect();
        let domains: Vec<Vec<Term>> = var_list
            .iter()
            .map(|x| self.names(x.sort()))
            .collect();
        Self::cartesian(&var_list, &domains)
    }

    /// Substitutions touching at least one name introduced by the top ply.
    fn new_groundings(&self, vars: &SortedTermSet) -> Vec<Substitution> {
        let mut out = Vec::new();
        let var_list: Vec<Symbol> = vars.iter().map(Term::symbol).collect();
        for (i, x) in var_list.iter().enumerate() {
            let news = self.new_names(x.sort());
            if news.is_empty() {
                continue;
            }
            let others: Vec<Symbol> = var_list
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, y)| *y)
                .collect();
            let domains: Vec<Vec<Term>> = others.iter().map(|y| self.names(y.sort())).collect();
            for n in &news {
                for mut theta in Self::cartesian(&others, &domains) {
                    theta.insert(*x, n.clone());
                    out.push(theta);
                }
            }
        }
        out
    }

    // === Relevance filtering ===

    fn is_relevant_key(&self, key: &Lhs) -> bool {
        self.plies.iter().any(|p| p.relevant_terms.contains(key))
    }

    fn is_relevant_clause(&self, c: &Clause) -> bool {
        if !self.plies.last().map_or(false, |p| p.filter) {
            return true;
        }
        c.iter()
            .any(|l| l.lhs().is_function() && self.is_relevant_key(&l.lhs_key()))
    }

    /// Close the relevant-term set under the given clauses: a clause sharing
    /// a left-hand side with the set contributes all its left-hand sides.
    fn close_relevance(&mut self, extra_clauses: &[Clause]) {
        let mut relevant: BTreeSet<Lhs> = self
            .plies
            .iter()
            .flat_map(|p| p.relevant_terms.iter().cloned())
            .collect();
        let initial = relevant.clone();
        let setup_clauses: Vec<Clause> = self.setup().clauses().cloned().collect();
        loop {
            let mut changed = false;
            for c in setup_clauses.iter().chain(extra_clauses.iter()) {
                let touches = c
                    .iter()
                    .any(|l| l.lhs().is_function() && relevant.contains(&l.lhs_key()));
                if touches {
                    for l in c.iter() {
                        if l.lhs().is_function() && relevant.insert(l.lhs_key()) {
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
        let last = self.plies.last_mut().expect("ply pushed");
        for key in relevant {
            if !initial.contains(&key) {
                last.relevant_terms.insert(key);
            }
        }
    }

    // === lhs/rhs index ===

    fn is_new_lhs_rhs(&self, key: &Lhs, rhs: &Term) -> bool {
        !self
            .plies
            .iter()
            .any(|p| p.lhs_rhs.get(key).is_some_and(|ns| ns.contains(rhs)))
    }

    /// All indexed left-hand sides.
    pub fn lhs_terms(&self) -> Vec<Lhs> {
        let keys: BTreeSet<Lhs> = self
            .plies
            .iter()
            .flat_map(|p| p.lhs_rhs.keys().cloned())
            .collect();
        keys.into_iter().collect()
    }

    /// Split candidates for an indexed left-hand side: the names seen in
    /// the index plus one fresh plus-name. The fresh name is recorded in the
    /// top ply and returns to the pool on undo.
    pub fn split_names(&mut self, sf: &mut SymbolFactory, key: &Lhs) -> Vec<Term> {
        let mut out: BTreeSet<Term> = self
            .plies
            .iter()
            .flat_map(|p| p.lhs_rhs.get(key).into_iter().flatten().cloned())
            .collect();
        debug_assert!(!self.plies.is_empty(), "prepare a query before splitting");
        let fresh = self.name_pool.create(sf, key.1.sort());
        out.insert(fresh.clone());
        self.plies
            .last_mut()
            .expect("ply pushed")
            .plus_max
            .insert(fresh);
        out.into_iter().collect()
    }

    // === Public mutators ===

    /// Add one clause. See [`add_guarded_clauses`](Self::add_guarded_clauses).
    pub fn add_clause(
        &mut self,
        sf: &mut SymbolFactory,
        c: Clause,
        do_not_add_if_inconsistent: bool,
    ) -> SetupResult {
        self.add_guarded_clauses(
            sf,
            vec![GuardedClause::unguarded(c)],
            do_not_add_if_inconsistent,
        )
    }

    /// Add plain clauses.
    pub fn add_clauses(&mut self, sf: &mut SymbolFactory, cs: Vec<Clause>) -> SetupResult {
        self.add_guarded_clauses(
            sf,
            cs.into_iter().map(GuardedClause::unguarded).collect(),
            false,
        )
    }

    /// Add guarded clause templates in a new ply and reground.
    ///
    /// Free variables are collected per clause; enough plus-names are
    /// allocated that every sort keeps one unused witness beyond its
    /// variable demand. With `do_not_add_if_inconsistent`, a trial unit
    /// whose flip is already subsumed is skipped instead of closing the
    /// setup.
    pub fn add_guarded_clauses(
        &mut self,
        sf: &mut SymbolFactory,
        cs: Vec<GuardedClause>,
        do_not_add_if_inconsistent: bool,
    ) -> SetupResult {
        self.new_ply();
        for gc in cs {
            let mut vars = SortedTermSet::new();
            gc.clause.collect_variables(&mut vars);
            gc.guard.collect_variables(&mut vars);
            let (mentioned, plus_mentioned) =
                self.classify_names(|f| gc.clause.visit_terms(&mut |t| f(t)));
            {
                let last = self.plies.last_mut().expect("ply pushed");
                last.mentioned.extend(&mentioned);
                last.plus_mentioned.extend(&plus_mentioned);
            }
            self.create_max_plus_names(sf, &vars, 1);
            self.plies
                .last_mut()
                .expect("ply pushed")
                .ungrounded
                .push(UngroundedClause { guarded: gc, vars });
        }
        let pm_counts = self.plies.last().expect("ply pushed").plus_mentioned.counts();
        self.create_new_plus_names(sf, &pm_counts);
        self.plies.last_mut().expect("ply pushed").dnaii = do_not_add_if_inconsistent;
        self.reground(sf)
    }

    /// Register a query's names, variables, and primitive literals in a new
    /// ply, allocate quantifier witnesses, and reground.
    pub fn prepare_for_query(&mut self, sf: &mut SymbolFactory, phi: &Formula) {
        self.new_ply();
        let (mentioned, plus_mentioned) =
            self.classify_names(|f| phi.visit_terms(&mut |t| f(t)));
        {
            let last = self.plies.last_mut().expect("ply pushed");
            last.mentioned.extend(&mentioned);
            last.plus_mentioned.extend(&plus_mentioned);
        }
        let mut fresh: Vec<UngroundedLiteral> = Vec::new();
        phi.visit_literals(&mut |l| {
            let norm = if l.sign() { l.clone() } else { l.flip() };
            if !norm.lhs().is_function() {
                return;
            }
            let known = self
                .plies
                .iter()
                .flat_map(|p| p.lhs_rhs_ungrounded.iter())
                .chain(fresh.iter())
                .any(|u| u.lit == norm);
            if !known {
                let mut vars = SortedTermSet::new();
                norm.collect_variables(&mut vars);
                fresh.push(UngroundedLiteral { lit: norm, vars });
            }
        });
        self.plies
            .last_mut()
            .expect("ply pushed")
            .lhs_rhs_ungrounded
            .extend(fresh);
        let pm_counts = self.plies.last().expect("ply pushed").plus_mentioned.counts();
        self.create_new_plus_names(sf, &pm_counts);
        let q_counts = phi.quantified_var_counts();
        self.create_max_plus_names_counts(sf, &q_counts);
        self.reground(sf);
    }

    /// Prepare a single term for splitting: its groundings are indexed
    /// against every name of its sort.
    pub fn prepare_for_term(&mut self, sf: &mut SymbolFactory, t: &Term) {
        let x = sf.create_variable(t.sort());
        let lit = Literal::eq(t.clone(), Term::from(x));
        let phi = Formula::lit(lit);
        self.prepare_for_query(sf, &phi);
    }

    /// Install the relevance filter: future plies drop ground clauses whose
    /// left-hand sides are not transitively reachable from the formula's
    /// function terms. The filter persists in descendant plies.
    pub fn guarantee_consistency(&mut self, alpha: &Formula) {
        let mut templates: Vec<UngroundedLhs> = Vec::new();
        alpha.visit_literals(&mut |l| {
            if l.lhs().is_function() {
                let mut vars = SortedTermSet::new();
                for a in l.z() {
                    a.collect_variables(&mut vars);
                }
                l.lhs().collect_variables(&mut vars);
                templates.push(UngroundedLhs {
                    z: l.z().clone(),
                    term: l.lhs().clone(),
                    vars,
                });
            }
        });
        self.install_relevance(templates);
    }

    /// Term overload of [`guarantee_consistency`](Self::guarantee_consistency).
    pub fn guarantee_consistency_term(&mut self, t: &Term) {
        debug_assert!(t.is_primitive());
        let templates = vec![UngroundedLhs {
            z: Vec::new(),
            term: t.clone(),
            vars: SortedTermSet::new(),
        }];
        self.install_relevance(templates);
    }

    fn install_relevance(&mut self, templates: Vec<UngroundedLhs>) {
        self.new_ply();
        self.plies.last_mut().expect("ply pushed").filter = true;
        let mut keys: Vec<Lhs> = Vec::new();
        for ut in &templates {
            for theta in self.all_groundings(&ut.vars) {
                let key = (substitute_seq(&ut.z, &theta), ut.term.substitute(&theta));
                if !self.is_relevant_key(&key) && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        {
            let last = self.plies.last_mut().expect("ply pushed");
            last.relevant_ungrounded = templates;
            last.relevant_terms.extend(keys);
        }
        self.close_relevance(&[]);
        self.rebuild_filtered_setup();
    }

    /// Materialize a fresh owning setup holding only the relevant clauses of
    /// the current view, and rebuild the top ply's lhs/rhs index from them.
    fn rebuild_filtered_setup(&mut self) {
        let old: Vec<Clause> = self.setup().clauses().cloned().collect();
        let mut kept = 0usize;
        let mut new_setup = Setup::new();
        let mut index: BTreeMap<Lhs, BTreeSet<Term>> = BTreeMap::new();
        for c in old {
            if self.is_relevant_clause(&c) {
                for l in c.iter() {
                    if l.lhs().is_function() {
                        index.entry(l.lhs_key()).or_default().insert(l.rhs().clone());
                    }
                }
                new_setup.add_clause(c);
                kept += 1;
            }
        }
        debug!("relevance filter keeps {} clauses", kept);
        let last = self.plies.last_mut().expect("ply pushed");
        last.owns_setup = Some(new_setup);
        last.start_mark = None;
        last.lhs_rhs = index;
    }

    /// Merge all plies into a single owning ply for long-lived use.
    pub fn consolidate(&mut self) {
        if self.plies.len() <= 1 {
            return;
        }
        let owner = self.owner_index().expect("first ply owns its setup");
        let plies = std::mem::take(&mut self.plies);
        let mut merged: Option<Ply> = None;
        let mut before: Vec<Ply> = Vec::new();
        let mut after: Vec<Ply> = Vec::new();
        for (i, p) in plies.into_iter().enumerate() {
            if i == owner {
                merged = Some(p);
            } else if i < owner {
                before.push(p);
            } else {
                after.push(p);
            }
        }
        let mut m = merged.expect("owner ply present");
        for p in before {
            debug_assert!(!p.dnaii);
            m.ungrounded.extend(p.ungrounded);
            m.mentioned.extend(&p.mentioned);
            m.plus_max.extend(&p.plus_max);
            m.plus_new.extend(&p.plus_new);
            m.plus_mentioned.extend(&p.plus_mentioned);
        }
        for p in after {
            debug_assert!(!p.dnaii);
            m.ungrounded.extend(p.ungrounded);
            m.mentioned.extend(&p.mentioned);
            m.plus_max.extend(&p.plus_max);
            m.plus_new.extend(&p.plus_new);
            m.plus_mentioned.extend(&p.plus_mentioned);
            m.relevant_ungrounded.extend(p.relevant_ungrounded);
            m.relevant_terms.extend(p.relevant_terms);
            m.lhs_rhs_ungrounded.extend(p.lhs_rhs_ungrounded);
            for (key, names) in p.lhs_rhs {
                m.lhs_rhs.entry(key).or_default().extend(names);
            }
            m.filter |= p.filter;
        }
        m.start_mark = None;
        self.plies = vec![m];
    }

    /// Rewrite a ground literal into its isomorphism witness: each distinct
    /// name of the left-hand side maps to a canonical variable, the right-
    /// hand side only when its name occurs on the left.
    pub fn variablify(&mut self, sf: &mut SymbolFactory, a: &Literal) -> Literal {
        debug_assert!(a.is_ground());
        let mut ns: Vec<Term> = Vec::new();
        a.lhs().visit(&mut |t| {
            if t.is_name() && !ns.contains(t) {
                ns.push(t.clone());
            }
        });
        let mut map: HashMap<Term, Term> = HashMap::new();
        for (i, n) in ns.iter().enumerate() {
            let v = self.var_pool.nth(sf, n.sort(), i);
            map.insert(n.clone(), v);
        }
        fn replace(t: &Term, map: &HashMap<Term, Term>) -> Term {
            if let Some(v) = map.get(t) {
                return v.clone();
            }
            match t {
                Term::App(f, args) => {
                    Term::App(*f, args.iter().map(|u| replace(u, map)).collect())
                }
                _ => t.clone(),
            }
        }
        Literal::new(
            a.z().iter().map(|t| replace(t, &map)).collect(),
            a.sign(),
            replace(a.lhs(), &map),
            replace(a.rhs(), &map),
        )
    }

    // === Regrounding ===

    /// Instantiate open clauses over the current name pool and feed the
    /// setup: old plies contribute only groundings touching a new name, the
    /// top ply grounds in full. Valid instances are skipped; the relevance
    /// filter applies when installed; finally the lhs/rhs index absorbs the
    /// new ground literals.
    fn reground(&mut self, _sf: &mut SymbolFactory) -> SetupResult {
        let last_idx = self.plies.len() - 1;

        // Candidate ground instances.
        let mut pending: Vec<(Clause, bool)> = Vec::new();
        for (i, ply) in self.plies.iter().enumerate() {
            for uc in &ply.ungrounded {
                let thetas = if i < last_idx {
                    self.new_groundings(&uc.vars)
                } else {
                    self.all_groundings(&uc.vars)
                };
                for theta in thetas {
                    if uc.guarded.guard.holds_under(&theta) {
                        let g = uc.guarded.clause.substitute(&theta);
                        debug_assert!(g.is_ground());
                        pending.push((g, ply.dnaii));
                    }
                }
            }
        }
        debug!("reground: {} candidate instances", pending.len());

        // Relevance: extend and close the relevant-term set before filtering.
        let filter = self.plies[last_idx].filter;
        if filter {
            let mut keys: Vec<Lhs> = Vec::new();
            for ply in &self.plies {
                for ut in &ply.relevant_ungrounded {
                    for theta in self.all_groundings(&ut.vars) {
                        let key = (substitute_seq(&ut.z, &theta), ut.term.substitute(&theta));
                        if !self.is_relevant_key(&key) && !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
            }
            self.plies[last_idx].relevant_terms.extend(keys);
            let clauses: Vec<Clause> = pending.iter().map(|(c, _)| c.clone()).collect();
            self.close_relevance(&clauses);
        }

        // Insert.
        let pre = self.setup().mark();
        let mut result = SetupResult::Subsumed;
        for (c, dnaii) in &pending {
            if c.is_valid() {
                continue;
            }
            if filter && !self.is_relevant_clause(c) {
                continue;
            }
            if *dnaii {
                if let Some(u) = c.unit_literal() {
                    if self.setup().subsumes(&Clause::unit(u.flip())) {
                        continue;
                    }
                }
            }
            match self.setup_mut().add_clause(c.clone()) {
                SetupResult::Inconsistent => return SetupResult::Inconsistent,
                SetupResult::Ok => result = SetupResult::Ok,
                SetupResult::Subsumed => {}
            }
        }
        if self.plies[last_idx].owns_setup.is_some() {
            self.setup_mut().minimize();
        }

        // Index every new ground literal, from the freshly added clauses and
        // from the registered query literals.
        let mut additions: BTreeSet<(Lhs, Term)> = BTreeSet::new();
        for c in self.setup().clauses_since(&pre) {
            for l in c.iter() {
                if l.lhs().is_function() && self.is_new_lhs_rhs(&l.lhs_key(), l.rhs()) {
                    additions.insert((l.lhs_key(), l.rhs().clone()));
                }
            }
        }
        for ply in &self.plies {
            for ul in &ply.lhs_rhs_ungrounded {
                for theta in self.all_groundings(&ul.vars) {
                    let g = ul.lit.substitute(&theta);
                    debug_assert!(g.is_ground());
                    if g.lhs().is_function() && self.is_new_lhs_rhs(&g.lhs_key(), g.rhs()) {
                        additions.insert((g.lhs_key(), g.rhs().clone()));
                    }
                }
            }
        }
        let last = self.plies.last_mut().expect("ply pushed");
        for (key, rhs) in additions {
            last.lhs_rhs.entry(key).or_default().insert(rhs);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fol::Ewff;

    struct World {
        sf: SymbolFactory,
        obj: Sort,
        bool_sort: Sort,
        p: Symbol,
        q: Symbol,
        n1: Term,
        n2: Term,
        tru: Term,
    }

    fn world() -> World {
        let mut sf = SymbolFactory::new();
        let obj = sf.create_sort();
        let bool_sort = sf.create_sort();
        let p = sf.create_function(bool_sort, 1);
        let q = sf.create_function(bool_sort, 1);
        let n1 = Term::from(sf.create_name(obj));
        let n2 = Term::from(sf.create_name(obj));
        let tru = Term::from(sf.create_name(bool_sort));
        World {
            sf,
            obj,
            bool_sort,
            p,
            q,
            n1,
            n2,
            tru,
        }
    }

    fn holds(w: &World, f: Symbol, arg: &Term) -> Literal {
        Literal::eq(Term::app(f, vec![arg.clone()]), w.tru.clone())
    }

    #[test]
    fn test_add_ground_clause() {
        let mut w = world();
        let mut g = Grounder::new();
        let c = Clause::new([holds(&w, w.p, &w.n1), holds(&w, w.p, &w.n2)]);
        assert_eq!(g.add_clause(&mut w.sf, c.clone(), false), SetupResult::Ok);
        assert!(g.setup().subsumes(&c));
        assert_eq!(g.num_plies(), 1);
    }

    #[test]
    fn test_open_clause_grounds_over_plus_names() {
        let mut w = world();
        let mut g = Grounder::new();
        let x = w.sf.create_variable(w.obj);
        // ∀x P(x): no object name is mentioned, so the domain is exactly
        // the allocated plus-names (|vars| + 1 = 2).
        let c = Clause::unit(holds(&w, w.p, &Term::from(x)));
        assert_eq!(g.add_clause(&mut w.sf, c, false), SetupResult::Ok);
        assert_eq!(g.names(w.obj).len(), 2);
        assert_eq!(g.setup().len(), 2);
    }

    #[test]
    fn test_incremental_regrounding_on_new_name() {
        let mut w = world();
        let mut g = Grounder::new();
        let x = w.sf.create_variable(w.obj);
        let open = Clause::unit(holds(&w, w.p, &Term::from(x)));
        g.add_clause(&mut w.sf, open, false);
        let before = g.setup().len();

        // A ground clause mentioning n1 regrounds the open clause at n1.
        let ground = Clause::unit(holds(&w, w.q, &w.n1));
        g.add_clause(&mut w.sf, ground, false);
        assert!(g.names(w.obj).contains(&w.n1));
        assert_eq!(g.setup().len(), before + 2);
        assert!(g
            .setup()
            .subsumes(&Clause::unit(holds(&w, w.p, &w.n1))));
    }

    #[test]
    fn test_undo_restores_structure() {
        let mut w = world();
        let mut g = Grounder::new();
        let c1 = Clause::new([holds(&w, w.p, &w.n1), holds(&w, w.p, &w.n2)]);
        g.add_clause(&mut w.sf, c1, false);

        let plies = g.num_plies();
        let clauses: Vec<Clause> = g.setup().clauses().cloned().collect();
        let outstanding = g.name_pool().total_outstanding();

        let x = w.sf.create_variable(w.obj);
        let lit = Clause::unit(holds(&w, w.q, &Term::from(x)));
        g.add_clause(&mut w.sf, lit, false);
        assert!(g.num_plies() > plies);
        assert!(g.name_pool().total_outstanding() > outstanding);

        g.undo_last();
        assert_eq!(g.num_plies(), plies);
        assert_eq!(g.name_pool().total_outstanding(), outstanding);
        let after: Vec<Clause> = g.setup().clauses().cloned().collect();
        assert_eq!(clauses, after);
    }

    #[test]
    fn test_guard_restricts_groundings() {
        let mut w = world();
        let mut g = Grounder::new();
        // Mention both names first.
        let c = Clause::new([holds(&w, w.q, &w.n1), holds(&w, w.q, &w.n2)]);
        g.add_clause(&mut w.sf, c, false);
        let x = w.sf.create_variable(w.obj);
        // P(x) for x ≠ n1.
        let gc = GuardedClause::new(
            Ewff::truth().and_neq(Term::from(x), w.n1.clone()),
            Clause::unit(holds(&w, w.p, &Term::from(x))),
        );
        g.add_guarded_clauses(&mut w.sf, vec![gc], false);
        assert!(!g.setup().subsumes(&Clause::unit(holds(&w, w.p, &w.n1))));
        assert!(g.setup().subsumes(&Clause::unit(holds(&w, w.p, &w.n2))));
    }

    #[test]
    fn test_prepare_for_query_indexes_literals() {
        let mut w = world();
        let mut g = Grounder::new();
        let c = Clause::unit(holds(&w, w.p, &w.n1));
        g.add_clause(&mut w.sf, c, false);

        let lit = holds(&w, w.p, &w.n2);
        let phi = Formula::lit(lit.clone());
        g.prepare_for_query(&mut w.sf, &phi);

        let key = lit.lhs_key();
        assert!(g.lhs_terms().contains(&key));
        let names = g.split_names(&mut w.sf, &key);
        assert!(names.contains(&w.tru));
        // One fresh witness beyond the indexed names.
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_do_not_add_if_inconsistent_skips_unit() {
        let mut w = world();
        let mut g = Grounder::new();
        let a = holds(&w, w.p, &w.n1);
        g.add_clause(&mut w.sf, Clause::unit(a.clone()), false);
        // The flip of a subsumed unit is skipped instead of closing the
        // setup.
        let r = g.add_clause(&mut w.sf, Clause::unit(a.flip()), true);
        assert_eq!(r, SetupResult::Subsumed);
        assert!(g.setup().consistent());
        // Without the flag it closes.
        let r = g.add_clause(&mut w.sf, Clause::unit(a.flip()), false);
        assert_eq!(r, SetupResult::Inconsistent);
        g.undo_last();
        assert!(g.setup().consistent());
    }

    #[test]
    fn test_relevance_filter_drops_unreachable() {
        let mut w = world();
        let mut g = Grounder::new();
        let c = Clause::unit(holds(&w, w.p, &w.n1));
        g.add_clause(&mut w.sf, c, false);
        let c = Clause::unit(holds(&w, w.q, &w.n2));
        g.add_clause(&mut w.sf, c, false);
        assert_eq!(g.setup().len(), 2);

        let alpha = Formula::lit(holds(&w, w.p, &w.n1));
        g.guarantee_consistency(&alpha);
        // Only the P clause survives in the filtered view.
        assert_eq!(g.setup().len(), 1);
        assert!(g.setup().subsumes(&Clause::unit(holds(&w, w.p, &w.n1))));
        assert!(!g.setup().subsumes(&Clause::unit(holds(&w, w.q, &w.n2))));

        // Future additions outside the relevant set are dropped too.
        let c = Clause::unit(holds(&w, w.q, &w.n1));
        g.add_clause(&mut w.sf, c, false);
        assert!(!g.setup().subsumes(&Clause::unit(holds(&w, w.q, &w.n1))));

        g.undo_last();
        g.undo_last();
        assert_eq!(g.setup().len(), 2);
    }

    #[test]
    fn test_relevance_closure_follows_shared_lhs() {
        let mut w = world();
        let mut g = Grounder::new();
        // q(n1) ∨ p(n1): shares the p(n1) lhs with the query, so q(n1)
        // becomes relevant transitively.
        let c0 = Clause::new([holds(&w, w.q, &w.n1), holds(&w, w.p, &w.n1)]);
        g.add_clause(&mut w.sf, c0, false);
        let c = Clause::unit(holds(&w, w.q, &w.n2));
        g.add_clause(&mut w.sf, c, false);

        g.guarantee_consistency(&Formula::lit(holds(&w, w.p, &w.n1)));
        assert_eq!(g.setup().len(), 1);
        let c = Clause::unit(holds(&w, w.q, &w.n1));
        g.add_clause(&mut w.sf, c, false);
        assert!(g.setup().subsumes(&Clause::unit(holds(&w, w.q, &w.n1))));
    }

    #[test]
    fn test_consolidate_preserves_view() {
        let mut w = world();
        let mut g = Grounder::new();
        let c = Clause::unit(holds(&w, w.p, &w.n1));
        g.add_clause(&mut w.sf, c, false);
        let c = Clause::unit(holds(&w, w.q, &w.n2));
        g.add_clause(&mut w.sf, c, false);
        let before: Vec<Clause> = g.setup().clauses().cloned().collect();

        g.consolidate();
        assert_eq!(g.num_plies(), 1);
        let after: Vec<Clause> = g.setup().clauses().cloned().collect();
        assert_eq!(before, after);

        // The merged ply still grounds new clauses over the folded names.
        let x = w.sf.create_variable(w.obj);
        let c = Clause::unit(holds(&w, w.p, &Term::from(x)));
        g.add_clause(&mut w.sf, c, false);
        assert!(g.setup().subsumes(&Clause::unit(holds(&w, w.p, &w.n2))));
    }

    #[test]
    fn test_variablify_isomorphism_witness() {
        let mut w = world();
        let mut g = Grounder::new();
        let f2 = w.sf.create_function(w.bool_sort, 2);
        let l1 = Literal::eq(
            Term::app(f2, vec![w.n1.clone(), w.n1.clone()]),
            w.tru.clone(),
        );
        let l2 = Literal::eq(
            Term::app(f2, vec![w.n2.clone(), w.n2.clone()]),
            w.tru.clone(),
        );
        let v1 = g.variablify(&mut w.sf, &l1);
        let v2 = g.variablify(&mut w.sf, &l2);
        assert_eq!(v1, v2);
        assert!(!v1.is_ground());

        // The rhs is rewritten only when its name occurs on the left.
        let l3 = Literal::eq(Term::app(f2, vec![w.n1.clone(), w.n2.clone()]), w.n2.clone());
        let v3 = g.variablify(&mut w.sf, &l3);
        assert!(v3.rhs().is_variable());
        let l4 = Literal::eq(Term::app(f2, vec![w.n1.clone(), w.n1.clone()]), w.n2.clone());
        let v4 = g.variablify(&mut w.sf, &l4);
        assert!(v4.rhs().is_name());
    }
}
