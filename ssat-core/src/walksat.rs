//! The WalkSAT local-search fallback used once decimation goes paramagnetic.
use rand::Rng;

use crate::config::WalkSatVariant;
use crate::error::SolveError;
use crate::graph::{ClauseId, FactorGraph, VarId};

/// A WalkSAT run configured with the thresholds from [`crate::config::SolverConfig`].
pub struct WalkSat {
    noise: f64,
    max_tries: u32,
    max_steps_factor: u32,
    variant: WalkSatVariant,
}

impl WalkSat {
    pub fn new(noise: f64, max_tries: u32, max_steps_factor: u32, variant: WalkSatVariant) -> WalkSat {
        WalkSat {
            noise,
            max_tries,
            max_steps_factor,
            variant,
        }
    }

    /// Searches for a full assignment (one value per variable, including the ones decimation
    /// already fixed) that satisfies every clause not already satisfied by a fixed variable.
    ///
    /// Restarts up to `max_tries` times, each restart drawing a fresh random value for every
    /// still-unassigned variable and flipping for up to `max_steps_factor * var_count` steps.
    pub fn run<R: Rng + ?Sized>(&self, fg: &FactorGraph, rng: &mut R) -> Result<Vec<i8>, SolveError> {
        let unsatisfied: Vec<ClauseId> = fg.unsatisfied_clause_ids().collect();

        if unsatisfied.is_empty() {
            return Ok((0..fg.var_count())
                .map(|i| fg.value(VarId::from_index(i)))
                .collect());
        }

        let var_count = fg.var_count();
        let max_steps = self.max_steps_factor.saturating_mul(var_count.max(1) as u32);

        for _ in 0..self.max_tries {
            let mut values: Vec<i8> = (0..var_count)
                .map(|i| {
                    let fixed = fg.value(VarId::from_index(i));
                    if fixed != 0 {
                        fixed
                    } else if rng.gen::<bool>() {
                        1
                    } else {
                        -1
                    }
                })
                .collect();

            let mut true_literals = vec![0u32; fg.clause_count()];
            let mut pos = vec![usize::MAX; fg.clause_count()];
            let mut unsat_list: Vec<usize> = Vec::new();

            for &clause_id in &unsatisfied {
                let idx = clause_id.index();
                true_literals[idx] = count_true(fg, clause_id, &values);
                if true_literals[idx] == 0 {
                    pos[idx] = unsat_list.len();
                    unsat_list.push(idx);
                }
            }

            for _ in 0..max_steps {
                if unsat_list.is_empty() {
                    return Ok(values);
                }

                let pick = rng.gen_range(0..unsat_list.len());
                let clause_id = ClauseId::from_index(unsat_list[pick]);

                let var = self.pick_variable(fg, clause_id, &values, &true_literals, rng);

                flip(fg, var, &mut values, &mut true_literals, &mut unsat_list, &mut pos);
            }
        }

        Err(SolveError::WalkSatExhausted {
            tries: self.max_tries,
        })
    }

    /// Chooses which variable of an unsatisfied clause to flip next.
    fn pick_variable<R: Rng + ?Sized>(
        &self,
        fg: &FactorGraph,
        clause_id: ClauseId,
        values: &[i8],
        true_literals: &[u32],
        rng: &mut R,
    ) -> VarId {
        let candidates: Vec<VarId> = clause_vars(fg, clause_id);

        match self.variant {
            WalkSatVariant::FastBreakCount => {
                let (lowest, tied) = lowest_break_count(fg, &candidates, values, true_literals);
                // A zero-break variable is taken unconditionally (short-circuiting the noise
                // coin, same as the original's `lowestBreakCount == 0 || randomReal(rng) >
                // WS_NOISE`); otherwise the noise coin decides between the lowest-break-count
                // pick and a uniformly random one.
                if lowest == 0 || rng.gen::<f64>() > self.noise {
                    if tied.len() == 1 {
                        tied[0]
                    } else {
                        tied[rng.gen_range(0..tied.len())]
                    }
                } else {
                    candidates[rng.gen_range(0..candidates.len())]
                }
            }
            WalkSatVariant::SeparatingNonCaching => {
                let zero_break: Vec<VarId> = candidates
                    .iter()
                    .copied()
                    .filter(|&v| break_count(fg, v, values, true_literals) == 0)
                    .collect();
                if !zero_break.is_empty() {
                    return zero_break[rng.gen_range(0..zero_break.len())];
                }
                if rng.gen::<f64>() < self.noise {
                    return candidates[rng.gen_range(0..candidates.len())];
                }
                best_by_break_count(fg, &candidates, values, true_literals, rng)
            }
        }
    }
}

/// The distinct variables occurring as enabled literals of a clause.
fn clause_vars(fg: &FactorGraph, clause_id: ClauseId) -> Vec<VarId> {
    let range = fg.clauses[clause_id.index()].range.clone();
    range
        .filter_map(|idx| {
            let lit = fg.literals[idx];
            if lit.enabled {
                Some(lit.var)
            } else {
                None
            }
        })
        .collect()
}

fn count_true(fg: &FactorGraph, clause_id: ClauseId, values: &[i8]) -> u32 {
    let range = fg.clauses[clause_id.index()].range.clone();
    range
        .filter(|&idx| {
            let lit = fg.literals[idx];
            lit.enabled && lit.sign() == values[lit.var.index()]
        })
        .count() as u32
}

/// Counts how many currently-satisfied clauses would become unsatisfied if `var` were flipped.
fn break_count(fg: &FactorGraph, var: VarId, values: &[i8], true_literals: &[u32]) -> u32 {
    let mut count = 0;
    for &lit_id in &fg.var_literals[var.index()] {
        let lit = fg.literals[lit_id.index()];
        if !lit.enabled {
            continue;
        }
        let clause_idx = lit.clause.index();
        if true_literals[clause_idx] == 1 && lit.sign() == values[var.index()] {
            count += 1;
        }
    }
    count
}

/// The lowest break-count among `candidates` and every variable attaining it, without drawing
/// from `rng` — tie-breaking is left to the caller so it can skip the draw entirely when only
/// one variable attains the lowest count, matching the original's `lowestBreakCountVar.size()
/// == 1` short-circuit.
fn lowest_break_count(
    fg: &FactorGraph,
    candidates: &[VarId],
    values: &[i8],
    true_literals: &[u32],
) -> (u32, Vec<VarId>) {
    let mut lowest: Vec<VarId> = Vec::new();
    let mut lowest_count = u32::MAX;

    for &var in candidates {
        let count = break_count(fg, var, values, true_literals);
        if count < lowest_count {
            lowest_count = count;
            lowest.clear();
            lowest.push(var);
        } else if count == lowest_count {
            lowest.push(var);
        }
    }

    (lowest_count, lowest)
}

fn best_by_break_count<R: Rng + ?Sized>(
    fg: &FactorGraph,
    candidates: &[VarId],
    values: &[i8],
    true_literals: &[u32],
    rng: &mut R,
) -> VarId {
    let mut best: Vec<VarId> = Vec::new();
    let mut best_count = u32::MAX;

    for &var in candidates {
        let count = break_count(fg, var, values, true_literals);
        if count < best_count {
            best_count = count;
            best.clear();
            best.push(var);
        } else if count == best_count {
            best.push(var);
        }
    }

    best[rng.gen_range(0..best.len())]
}

/// Flips `var`'s trial value, updating every affected clause's true-literal count and the
/// unsatisfied-clause worklist (`unsat_list`/`pos`) in place.
fn flip(
    fg: &FactorGraph,
    var: VarId,
    values: &mut [i8],
    true_literals: &mut [u32],
    unsat_list: &mut Vec<usize>,
    pos: &mut [usize],
) {
    let old_value = values[var.index()];
    let new_value = -old_value;
    values[var.index()] = new_value;

    for &lit_id in &fg.var_literals[var.index()] {
        let lit = fg.literals[lit_id.index()];
        if !lit.enabled {
            continue;
        }
        let clause_idx = lit.clause.index();
        let was_true = lit.sign() == old_value;
        let is_true = lit.sign() == new_value;

        if was_true && !is_true {
            true_literals[clause_idx] -= 1;
            if true_literals[clause_idx] == 0 {
                pos[clause_idx] = unsat_list.len();
                unsat_list.push(clause_idx);
            }
        } else if !was_true && is_true {
            true_literals[clause_idx] += 1;
            if true_literals[clause_idx] == 1 {
                remove_from_unsat(unsat_list, pos, clause_idx);
            }
        }
    }
}

fn remove_from_unsat(unsat_list: &mut Vec<usize>, pos: &mut [usize], clause_idx: usize) {
    let at = pos[clause_idx];
    let last = unsat_list.len() - 1;
    unsat_list.swap(at, last);
    pos[unsat_list[at]] = at;
    unsat_list.pop();
    pos[clause_idx] = usize::MAX;
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use ssat_formula::{CnfFormula, Lit};

    use super::*;

    fn formula(clauses: &[&[isize]]) -> CnfFormula {
        CnfFormula::from(
            clauses
                .iter()
                .map(|clause| clause.iter().map(|&d| Lit::from_dimacs(d)).collect::<Vec<_>>()),
        )
    }

    #[test]
    fn finds_a_model_for_a_small_satisfiable_formula() {
        let cnf = formula(&[&[1, 2, 3], &[-1, 2, -3], &[1, -2, 3], &[-1, -2, -3]]);
        let fg = FactorGraph::from_formula(&cnf, 1e-16);
        let mut rng = SmallRng::seed_from_u64(5);

        let ws = WalkSat::new(0.57, 50, 100, WalkSatVariant::FastBreakCount);
        let values = ws.run(&fg, &mut rng).expect("should find a satisfying assignment");

        for clause_id in fg.unsatisfied_clause_ids() {
            assert!(count_true(&fg, clause_id, &values) > 0);
        }
    }

    #[test]
    fn returns_the_fixed_assignment_untouched_when_nothing_is_left_unsatisfied() {
        let cnf = formula(&[&[1, 2]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        fg.fix(VarId::from_index(0), 1, true);

        let mut rng = SmallRng::seed_from_u64(1);
        let ws = WalkSat::new(0.57, 10, 10, WalkSatVariant::FastBreakCount);
        let values = ws.run(&fg, &mut rng).unwrap();

        assert_eq!(values[0], 1);
    }

    #[test]
    fn exhausts_its_budget_on_an_unsatisfiable_formula() {
        let cnf = formula(&[&[1], &[-1]]);
        let fg = FactorGraph::from_formula(&cnf, 1e-16);
        let mut rng = SmallRng::seed_from_u64(3);

        let ws = WalkSat::new(0.57, 5, 5, WalkSatVariant::FastBreakCount);
        let err = ws.run(&fg, &mut rng).unwrap_err();
        assert_eq!(err, SolveError::WalkSatExhausted { tries: 5 });
    }
}
