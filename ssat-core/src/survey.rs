//! Survey propagation: the fixed-point iteration over edge messages (surveys).
use rand::seq::SliceRandom;
use rand::Rng;

use crate::graph::{ClauseId, FactorGraph, VariableData};

/// Randomizes every edge's survey to a fresh draw in `[0, 1)`.
///
/// Called once before the first decimation round of a solve (and again by
/// `Decimation::reset`); every later survey value is reached by iterating `SurveyPropagation`
/// from this starting point.
pub fn init_random_surveys<R: Rng + ?Sized>(fg: &mut FactorGraph, rng: &mut R) {
    for lit in &mut fg.literals {
        lit.survey = rng.gen::<f64>();
    }
}

/// Drives survey propagation to a fixed point on a [`FactorGraph`].
///
/// Holds only the numerical thresholds; all mutable state lives on the graph itself, so a
/// `SurveyPropagation` is cheap to construct and reuse across decimation steps.
pub struct SurveyPropagation {
    /// Convergence threshold on `max |Δsurvey|` across one sweep.
    epsilon: f64,
    /// Numerical zero-factor threshold for the `pzero`/`mzero` counter scheme.
    eps: f64,
    /// Maximum number of sweeps before giving up on convergence.
    iterations: u32,
}

impl SurveyPropagation {
    pub fn new(epsilon: f64, eps: f64, iterations: u32) -> SurveyPropagation {
        SurveyPropagation {
            epsilon,
            eps,
            iterations,
        }
    }

    /// Iterates survey updates until `max |Δsurvey| <= epsilon` (converged, returns `true`) or
    /// `iterations` sweeps elapse (returns `false`).
    ///
    /// Recomputes every unassigned variable's sub-products from scratch once at the start
    /// (`FactorGraph::compute_sub_products`), then performs whole-formula sweeps in a freshly
    /// shuffled clause order, same as the sweep it recomputes from is shuffled once per sweep
    /// rather than once per solve.
    pub fn run<R: Rng + ?Sized>(&self, fg: &mut FactorGraph, rng: &mut R) -> bool {
        fg.compute_sub_products();

        let mut order: Vec<ClauseId> = fg.unsatisfied_clause_ids().collect();

        for _ in 0..self.iterations {
            order.shuffle(rng);

            let mut maxeps = 0.0f64;
            for &clause_id in &order {
                let eps = self.update_survey(fg, clause_id);
                if eps > maxeps {
                    maxeps = eps;
                }
            }

            if maxeps <= self.epsilon {
                return true;
            }
        }

        false
    }

    /// Updates every edge's survey within one clause, returning the largest `|Δsurvey|` seen.
    ///
    /// This is the numerically sensitive kernel described in the module-level docs of
    /// `ssat-core`: for each enabled literal over an unassigned variable, the cavity products
    /// `u`/`s` are pulled out of the variable's aggregate `p`/`m` (dividing out this edge's own
    /// contribution, guarded by the `pzero`/`mzero` counters so a literal whose own factor is
    /// already at the numerical zero threshold doesn't require dividing by (near) zero).
    ///
    /// Unlike the reference implementation this does not short-circuit once a second
    /// sub-epsilon `prod` is seen within a clause — that early exit is a pure performance
    /// optimization (every literal past it would fall into the same "zeroes >= 2" branch
    /// regardless), so skipping it changes nothing observable.
    fn update_survey(&self, fg: &mut FactorGraph, clause_id: ClauseId) -> f64 {
        let range = fg.clauses[clause_id.index()].range.clone();

        let mut entries: Vec<(usize, f64)> = Vec::new();
        let mut allprod = 1.0f64;
        let mut zeroes = 0u32;

        for idx in range {
            let lit = fg.literals[idx];
            if !lit.enabled || fg.variables[lit.var.index()].value != 0 {
                continue;
            }
            let var = fg.variables[lit.var.index()];

            let (u, s) = cavity_products(&var, lit.positive, lit.survey, self.eps);

            let pu = (1.0 - u) * s;
            let ps = (1.0 - s) * u;
            let pz = s * u;

            let prod = if pu == 0.0 { 0.0 } else { pu / (pu + ps + pz) };

            if prod < self.eps {
                zeroes += 1;
            } else {
                allprod *= prod;
            }
            entries.push((idx, prod));
        }

        let mut max_delta = 0.0f64;

        for &(idx, prod) in &entries {
            let new_survey = if zeroes == 0 {
                allprod / prod
            } else if zeroes == 1 && prod < self.eps {
                allprod
            } else {
                0.0
            };

            let lit = fg.literals[idx];
            let old_survey = lit.survey;
            let var_index = lit.var.index();

            if lit.positive {
                let var = &mut fg.variables[var_index];
                replace_factor(&mut var.m, &mut var.mzero, old_survey, new_survey, self.eps);
            } else {
                let var = &mut fg.variables[var_index];
                replace_factor(&mut var.p, &mut var.pzero, old_survey, new_survey, self.eps);
            }

            let delta = (old_survey - new_survey).abs();
            if delta > max_delta {
                max_delta = delta;
            }

            fg.literals[idx].survey = new_survey;
        }

        max_delta
    }
}

/// Computes the `(u, s)` cavity products for a literal of the given polarity: `u` is the
/// product over clauses that disagree with this literal, `s` the product over clauses that
/// agree with it (excluding this edge's own clause), recovered from the variable's aggregate
/// `p`/`m` sub-products by dividing out this edge's own factor.
fn cavity_products(var: &VariableData, positive: bool, survey: f64, eps: f64) -> (f64, f64) {
    let factor = 1.0 - survey;
    if positive {
        let u = if var.pzero != 0 { 0.0 } else { var.p };
        let s = if var.mzero == 0 {
            var.m / factor
        } else if var.mzero == 1 && factor < eps {
            var.m
        } else {
            0.0
        };
        (u, s)
    } else {
        let u = if var.mzero != 0 { 0.0 } else { var.m };
        let s = if var.pzero == 0 {
            var.p / factor
        } else if var.pzero == 1 && factor < eps {
            var.p
        } else {
            0.0
        };
        (u, s)
    }
}

/// Replaces one edge's contribution to a running sub-product, crossing the zero-counter
/// threshold as needed, without recomputing the whole product.
fn replace_factor(target: &mut f64, zero_count: &mut u32, old_survey: f64, new_survey: f64, eps: f64) {
    let old_factor = 1.0 - old_survey;
    let new_factor = 1.0 - new_survey;

    if old_factor > eps {
        if new_factor > eps {
            *target *= new_factor / old_factor;
        } else {
            *target /= old_factor;
            *zero_count += 1;
        }
    } else if new_factor > eps {
        *target *= new_factor;
        *zero_count -= 1;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use ssat_formula::{CnfFormula, Lit};

    use super::*;
    use crate::graph::FactorGraph;

    fn formula(clauses: &[&[isize]]) -> CnfFormula {
        CnfFormula::from(
            clauses
                .iter()
                .map(|clause| clause.iter().map(|&d| Lit::from_dimacs(d)).collect::<Vec<_>>()),
        )
    }

    #[test]
    fn init_random_surveys_stays_in_unit_interval() {
        let cnf = formula(&[&[1, 2, 3], &[-1, 2, -3], &[1, -2, 3]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        let mut rng = SmallRng::seed_from_u64(1);

        init_random_surveys(&mut fg, &mut rng);

        for lit in &fg.literals {
            assert!(lit.survey >= 0.0 && lit.survey < 1.0);
        }
    }

    #[test]
    fn converges_on_a_small_satisfiable_formula() {
        let cnf = formula(&[&[1, 2, 3], &[-1, 2, -3], &[1, -2, 3], &[-1, -2, -3]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        let mut rng = SmallRng::seed_from_u64(42);

        let sp = SurveyPropagation::new(1e-3, 1e-16, 1000);
        init_random_surveys(&mut fg, &mut rng);

        assert!(sp.run(&mut fg, &mut rng));

        for lit in &fg.literals {
            assert!(lit.survey >= -1e-9 && lit.survey <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn a_trivially_satisfied_formula_converges_immediately() {
        let cnf = formula(&[&[1]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        fg.unit_propagation();
        let mut rng = SmallRng::seed_from_u64(7);

        let sp = SurveyPropagation::new(1e-3, 1e-16, 10);
        assert!(sp.run(&mut fg, &mut rng));
    }
}
