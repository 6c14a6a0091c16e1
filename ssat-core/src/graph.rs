//! The bipartite variable/clause factor graph and its fixing/propagation operations.
use std::ops::Range;

use ssat_formula::CnfFormula;

/// A 0-based variable index into a [`FactorGraph`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub fn from_index(index: usize) -> VarId {
        VarId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A 0-based clause index into a [`FactorGraph`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct ClauseId(u32);

impl ClauseId {
    #[inline]
    pub fn from_index(index: usize) -> ClauseId {
        ClauseId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A 0-based index of a directed literal-edge into a [`FactorGraph`]'s literal arena.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct LitId(u32);

impl LitId {
    #[inline]
    pub fn from_index(index: usize) -> LitId {
        LitId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-variable state.
///
/// `p`/`m`/`pzero`/`mzero` are only meaningful while `value == 0`; they hold the running
/// sub-products survey propagation needs to update each incident edge in O(1) rather than
/// O(variable degree). `wp`/`wm`/`wz` are the decimation biases, valid only right after
/// `compute_bias` has been called for this variable.
#[derive(Clone, Copy, Debug)]
pub(crate) struct VariableData {
    pub value: i8,
    pub p: f64,
    pub m: f64,
    pub pzero: u32,
    pub mzero: u32,
    pub wp: f64,
    pub wm: f64,
    pub wz: f64,
    pub ws_break: u32,
}

impl Default for VariableData {
    fn default() -> VariableData {
        VariableData {
            value: 0,
            p: 1.0,
            m: 1.0,
            pzero: 0,
            mzero: 0,
            wp: 0.0,
            wm: 0.0,
            wz: 0.0,
            ws_break: 0,
        }
    }
}

/// Per-clause state.
#[derive(Clone, Debug)]
pub(crate) struct ClauseData {
    pub range: Range<usize>,
    pub satisfied: bool,
    pub unassigned_literals: u32,
    pub true_literals: u32,
}

/// A directed literal-edge between a clause and one of its variables.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LiteralEdge {
    pub var: VarId,
    pub clause: ClauseId,
    /// `true` for a positive occurrence of the variable, `false` for a negated one. Named
    /// `positive` rather than `type` since the latter is a reserved word.
    pub positive: bool,
    pub enabled: bool,
    pub survey: f64,
}

impl LiteralEdge {
    #[inline]
    pub fn sign(&self) -> i8 {
        if self.positive {
            1
        } else {
            -1
        }
    }
}

/// Removes a `(1 - survey)` factor from a variable's running sub-product, crossing the
/// `pzero`/`mzero` threshold the same way it was crossed when the factor was added.
fn remove_factor(var: &mut VariableData, positive: bool, survey: f64, eps: f64) {
    let factor = 1.0 - survey;
    if positive {
        if factor > eps {
            var.m /= factor;
        } else {
            var.mzero -= 1;
        }
    } else if factor > eps {
        var.p /= factor;
    } else {
        var.pzero -= 1;
    }
}

/// Adds a `(1 - survey)` factor into a variable's running sub-product.
fn add_factor(var: &mut VariableData, positive: bool, survey: f64, eps: f64) {
    let factor = 1.0 - survey;
    if positive {
        if factor > eps {
            var.m *= factor;
        } else {
            var.mzero += 1;
        }
    } else if factor > eps {
        var.p *= factor;
    } else {
        var.pzero += 1;
    }
}

/// The bipartite variable/clause factor graph.
///
/// Built once from a [`CnfFormula`]; its topology never changes afterwards. Solving mutates
/// `enabled` flags on literal-edges, `value` on variables and `satisfied` on clauses; `reset`
/// restores the initial state without rebuilding any of the index structures.
pub struct FactorGraph {
    pub(crate) variables: Vec<VariableData>,
    pub(crate) clauses: Vec<ClauseData>,
    pub(crate) literals: Vec<LiteralEdge>,
    pub(crate) var_literals: Vec<Vec<LitId>>,
    unassigned_vars: usize,
    fixed_vars: Vec<(VarId, i8)>,
    eps: f64,
}

impl FactorGraph {
    /// Build a factor graph from a CNF formula. `eps` is the numerical zero-factor threshold
    /// (see [`crate::config::SolverConfig::eps`]) used whenever a literal's contribution to a
    /// variable's sub-product is added or removed.
    pub fn from_formula(formula: &CnfFormula, eps: f64) -> FactorGraph {
        let var_count = formula.var_count();
        let variables = vec![VariableData::default(); var_count];
        let mut clauses = Vec::with_capacity(formula.len());
        let mut literals = Vec::new();
        let mut var_literals: Vec<Vec<LitId>> = vec![Vec::new(); var_count];

        for clause in formula.iter() {
            let begin = literals.len();
            let clause_id = ClauseId::from_index(clauses.len());
            for &lit in clause {
                let lit_id = LitId::from_index(literals.len());
                literals.push(LiteralEdge {
                    var: VarId::from_index(lit.var().index()),
                    clause: clause_id,
                    positive: lit.is_positive(),
                    enabled: true,
                    survey: 0.0,
                });
                var_literals[lit.var().index()].push(lit_id);
            }
            let end = literals.len();
            clauses.push(ClauseData {
                range: begin..end,
                satisfied: false,
                unassigned_literals: (end - begin) as u32,
                true_literals: 0,
            });
        }

        FactorGraph {
            variables,
            clauses,
            literals,
            var_literals,
            unassigned_vars: var_count,
            fixed_vars: Vec::new(),
            eps,
        }
    }

    pub fn var_count(&self) -> usize {
        self.variables.len()
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub fn unassigned_vars(&self) -> usize {
        self.unassigned_vars
    }

    pub fn value(&self, var: VarId) -> i8 {
        self.variables[var.index()].value
    }

    /// All currently unassigned variables, in index order.
    pub fn unassigned_var_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.value == 0)
            .map(|(i, _)| VarId::from_index(i))
    }

    /// All clauses not yet satisfied, in index order.
    pub fn unsatisfied_clause_ids(&self) -> impl Iterator<Item = ClauseId> + '_ {
        self.clauses
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.satisfied)
            .map(|(i, _)| ClauseId::from_index(i))
    }

    /// `(id, value)` pairs pushed by propagation/decimation/WalkSAT since the last drain.
    pub fn drain_fixed_vars(&mut self) -> Vec<(VarId, i8)> {
        std::mem::take(&mut self.fixed_vars)
    }

    pub fn fixed_vars(&self) -> &[(VarId, i8)] {
        &self.fixed_vars
    }

    /// Fixes `var` to `value` (`+1` or `-1`). Cascades through unit propagation when `cascade`
    /// is set. Returns `false` on contradiction: some clause was driven to zero unassigned
    /// literals without being satisfied.
    ///
    /// Implemented with an explicit worklist rather than recursion (the original algorithm
    /// recurses into `fixUnitClause` for every chain of forced unit clauses), so propagation
    /// chains of unbounded length do not grow the call stack. This does not change which
    /// variables get fixed to which values, only how the fixed point is reached.
    pub fn fix(&mut self, var: VarId, value: i8, cascade: bool) -> bool {
        debug_assert!(value == 1 || value == -1);
        let mut unit_queue = Vec::new();
        if !self.assign(var, value, &mut unit_queue) {
            return false;
        }
        if cascade {
            while let Some(clause_id) = unit_queue.pop() {
                let cd = &self.clauses[clause_id.index()];
                if cd.satisfied || cd.unassigned_literals != 1 {
                    continue;
                }
                let (v, val) = self.lone_unassigned_literal(clause_id);
                if !self.assign(v, val, &mut unit_queue) {
                    return false;
                }
            }
        }
        true
    }

    /// Fixes the lone unassigned literal of a unit clause, cascading.
    pub fn fix_unit_clause(&mut self, clause_id: ClauseId) -> bool {
        let (var, value) = self.lone_unassigned_literal(clause_id);
        self.fix(var, value, true)
    }

    /// Scans all clauses once, fixing every unit clause found. Returns `false` on
    /// contradiction (including a clause that was empty, or became empty, before this scan
    /// reached it).
    pub fn unit_propagation(&mut self) -> bool {
        for i in 0..self.clauses.len() {
            let cd = &self.clauses[i];
            if cd.satisfied {
                continue;
            }
            if cd.unassigned_literals == 0 {
                return false;
            }
            if cd.unassigned_literals == 1 && !self.fix_unit_clause(ClauseId::from_index(i)) {
                return false;
            }
        }
        true
    }

    /// Restores the graph to its freshly-built state: every literal re-enabled, every variable
    /// unassigned, every clause unsatisfied. Does not re-randomize surveys; callers that want a
    /// fresh start for survey propagation do that separately (see
    /// [`crate::decimation::Decimation::reset`]).
    pub fn reset(&mut self) {
        for c in &mut self.clauses {
            c.satisfied = false;
            c.unassigned_literals = (c.range.end - c.range.start) as u32;
            c.true_literals = 0;
        }
        for l in &mut self.literals {
            l.enabled = true;
            l.survey = 0.0;
        }
        for v in &mut self.variables {
            *v = VariableData::default();
        }
        self.fixed_vars.clear();
        self.unassigned_vars = self.variables.len();
    }

    fn lone_unassigned_literal(&self, clause_id: ClauseId) -> (VarId, i8) {
        let range = self.clauses[clause_id.index()].range.clone();
        for idx in range {
            let lit = &self.literals[idx];
            if lit.enabled && self.variables[lit.var.index()].value == 0 {
                return (lit.var, lit.sign());
            }
        }
        unreachable!("a unit clause always has exactly one unassigned enabled literal")
    }

    fn assign(&mut self, var: VarId, value: i8, unit_queue: &mut Vec<ClauseId>) -> bool {
        debug_assert!(value == 1 || value == -1);
        debug_assert_eq!(self.variables[var.index()].value, 0);

        self.variables[var.index()].value = value;
        self.unassigned_vars -= 1;
        self.fixed_vars.push((var, value));

        let edges = self.var_literals[var.index()].clone();
        for lit_id in edges {
            if !self.literals[lit_id.index()].enabled {
                continue;
            }
            let clause_id = self.literals[lit_id.index()].clause;
            if self.clauses[clause_id.index()].satisfied {
                continue;
            }
            let sign = self.literals[lit_id.index()].sign();

            if sign == value {
                self.satisfy_clause(clause_id, lit_id);
            } else {
                self.disable_literal(lit_id);
                let cd = &self.clauses[clause_id.index()];
                if cd.unassigned_literals == 0 {
                    return false;
                }
                if cd.unassigned_literals == 1 {
                    unit_queue.push(clause_id);
                }
            }
        }
        true
    }

    /// Marks `clause_id` satisfied via `trigger_lit` and disables every other enabled literal
    /// of the clause, removing each one's contribution from its (still unassigned) variable's
    /// sub-products.
    fn satisfy_clause(&mut self, clause_id: ClauseId, trigger_lit: LitId) {
        let cd = &mut self.clauses[clause_id.index()];
        if cd.satisfied {
            return;
        }
        cd.satisfied = true;
        cd.true_literals += 1;
        cd.unassigned_literals = 0;
        let range = cd.range.clone();

        for idx in range {
            let lit_id = LitId::from_index(idx);
            if lit_id == trigger_lit {
                self.literals[idx].enabled = false;
                continue;
            }
            if !self.literals[idx].enabled {
                continue;
            }
            let var = self.literals[idx].var;
            let positive = self.literals[idx].positive;
            let survey = self.literals[idx].survey;
            if self.variables[var.index()].value == 0 {
                remove_factor(&mut self.variables[var.index()], positive, survey, self.eps);
            }
            self.literals[idx].enabled = false;
        }
    }

    fn disable_literal(&mut self, lit_id: LitId) {
        self.literals[lit_id.index()].enabled = false;
        let clause_id = self.literals[lit_id.index()].clause;
        self.clauses[clause_id.index()].unassigned_literals -= 1;
    }

    /// Recomputes `{p, m, pzero, mzero}` from scratch for every unassigned variable, scanning
    /// its enabled literals in unsatisfied clauses. Called once per `surveyPropagation()`
    /// invocation; everything afterwards maintains these incrementally.
    pub(crate) fn compute_sub_products(&mut self) {
        for var_index in 0..self.variables.len() {
            if self.variables[var_index].value != 0 {
                continue;
            }
            self.variables[var_index].p = 1.0;
            self.variables[var_index].m = 1.0;
            self.variables[var_index].pzero = 0;
            self.variables[var_index].mzero = 0;

            let edges = self.var_literals[var_index].clone();
            for lit_id in edges {
                let lit = self.literals[lit_id.index()];
                if !lit.enabled || self.clauses[lit.clause.index()].satisfied {
                    continue;
                }
                add_factor(
                    &mut self.variables[var_index],
                    lit.positive,
                    lit.survey,
                    self.eps,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssat_formula::CnfFormula;

    fn formula(clauses: &[&[isize]]) -> CnfFormula {
        CnfFormula::from(clauses.iter().map(|clause| {
            clause
                .iter()
                .map(|&dimacs| ssat_formula::Lit::from_dimacs(dimacs))
                .collect::<Vec<_>>()
        }))
    }

    #[test]
    fn fix_satisfies_clauses_and_disables_their_other_literals() {
        let cnf = formula(&[&[1, 2], &[-1, 3]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);

        assert!(fg.fix(VarId::from_index(0), 1, false));
        assert_eq!(fg.value(VarId::from_index(0)), 1);
        assert_eq!(fg.unassigned_vars(), 2);
        assert!(fg.clauses[0].satisfied);
        assert!(!fg.clauses[1].satisfied);
        assert_eq!(fg.clauses[1].unassigned_literals, 1);
    }

    #[test]
    fn fix_cascades_unit_propagation() {
        // fixing x1=true forces clause 2 (-1 v 2) to propagate x2=true, which then forces
        // clause 3 (-2 v 3) to propagate x3=true.
        let cnf = formula(&[&[1], &[-1, 2], &[-2, 3]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);

        assert!(fg.fix(VarId::from_index(0), 1, true));
        assert_eq!(fg.value(VarId::from_index(1)), 1);
        assert_eq!(fg.value(VarId::from_index(2)), 1);
        assert_eq!(fg.unassigned_vars(), 0);
    }

    #[test]
    fn unit_propagation_detects_contradiction() {
        let cnf = formula(&[&[1], &[-1]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);

        assert!(!fg.unit_propagation());
    }

    #[test]
    fn reset_restores_initial_state() {
        let cnf = formula(&[&[1, 2], &[-1, 3]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        fg.fix(VarId::from_index(0), 1, true);
        assert_ne!(fg.unassigned_vars(), fg.var_count());

        fg.reset();
        assert_eq!(fg.unassigned_vars(), fg.var_count());
        assert!(fg.unsatisfied_clause_ids().count() == fg.clause_count());
        assert!(fg.literals.iter().all(|l| l.enabled));
    }

    #[test]
    fn drain_fixed_vars_empties_after_read() {
        let cnf = formula(&[&[1, 2]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        fg.fix(VarId::from_index(0), 1, false);

        let drained = fg.drain_fixed_vars();
        assert_eq!(drained, vec![(VarId::from_index(0), 1)]);
        assert!(fg.drain_fixed_vars().is_empty());
    }
}
