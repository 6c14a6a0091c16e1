//! Survey-inspired decimation: the outer loop that turns converged surveys into fixed
//! variables, one batch at a time, until the formula goes paramagnetic.
use log::debug;
use ordered_float::OrderedFloat;
use rand::Rng;

use crate::error::SolveError;
use crate::graph::{FactorGraph, VarId};
use crate::survey::{init_random_surveys, SurveyPropagation};
use crate::walksat::WalkSat;

/// What a single decimation round accomplished.
#[derive(Debug, PartialEq)]
pub enum DecimationOutcome {
    /// Fixed a batch of variables and propagated; the caller should run another round.
    Progress,
    /// The bias signal collapsed (`summag / unassigned_vars < paramagnet`): survey propagation
    /// is no longer informative and the remaining subformula should go to WalkSAT instead.
    Paramagnetic,
}

/// Drives the fix-a-fraction-of-variables loop described in the module docs.
pub struct Decimation {
    survey: SurveyPropagation,
    alpha: f64,
    paramagnet: f64,
    iterations: u32,
}

impl Decimation {
    pub fn new(epsilon: f64, eps: f64, iterations: u32, alpha: f64, paramagnet: f64) -> Decimation {
        Decimation {
            survey: SurveyPropagation::new(epsilon, eps, iterations),
            alpha,
            paramagnet,
            iterations,
        }
    }

    /// Randomizes surveys; the first thing a fresh solve (or a solve restarted via
    /// `FactorGraph::reset`) needs before any decimation round can run.
    pub fn init<R: Rng + ?Sized>(&self, fg: &mut FactorGraph, rng: &mut R) {
        init_random_surveys(fg, rng);
    }

    /// Runs the whole driver end to end: initial unit propagation, surveys, and decimation
    /// rounds until either the formula is fully assigned, a round detects a contradiction or
    /// fails to converge, or the bias signal collapses and control is handed to `walksat`.
    ///
    /// Mirrors `surveyInspiredDecimation()` in the original design: the top-level entry point a
    /// caller invokes once per solve attempt.
    pub fn survey_inspired_decimation<R: Rng + ?Sized>(
        &self,
        fg: &mut FactorGraph,
        rng: &mut R,
        walksat: &WalkSat,
    ) -> Result<(), SolveError> {
        if !fg.unit_propagation() {
            return Err(SolveError::Contradiction);
        }

        self.init(fg, rng);

        while fg.unassigned_vars() > 0 {
            match self.vars_to_assign(fg, rng)? {
                DecimationOutcome::Progress => continue,
                DecimationOutcome::Paramagnetic => {
                    let values = walksat.run(fg, rng)?;
                    apply_walksat_result(fg, &values);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Runs one decimation round (one batch, `varsToAssign()` in the original design): survey
    /// propagation to convergence, bias computation, then either a paramagnetic handoff or
    /// fixing the top `alpha` fraction of unassigned variables by `|bias|` and propagating the
    /// consequences. Useful on its own for an externally driven solver loop that wants to
    /// inspect `FactorGraph::fixed_vars` between rounds.
    pub fn vars_to_assign<R: Rng + ?Sized>(
        &self,
        fg: &mut FactorGraph,
        rng: &mut R,
    ) -> Result<DecimationOutcome, SolveError> {
        if !self.survey.run(fg, rng) {
            return Err(SolveError::NonConvergence {
                iterations: self.iterations,
            });
        }

        let unassigned = fg.unassigned_vars();
        debug_assert!(unassigned > 0);

        let mut biases: Vec<(VarId, f64)> = Vec::with_capacity(unassigned);
        let mut summag = 0.0f64;

        for var in fg.unassigned_var_ids() {
            let (_, _, bias) = compute_bias(fg, var);
            summag += bias;
            biases.push((var, bias));
        }

        let magnetization = summag / unassigned as f64;
        if magnetization < self.paramagnet {
            debug!(
                "magnetization {:.6} below paramagnet threshold {:.6}, {} variables unassigned",
                magnetization, self.paramagnet, unassigned
            );
            return Ok(DecimationOutcome::Paramagnetic);
        }

        biases.sort_by_key(|&(_, bias)| std::cmp::Reverse(OrderedFloat(bias)));

        let to_fix = ((self.alpha * unassigned as f64).floor() as usize).max(1).min(unassigned);

        // Sorting order is fixed for the whole batch (not re-sorted as variables get fixed),
        // but each pick's own bias is recomputed first: the fixes made earlier in this batch
        // perturbed its `{p, m, pzero, mzero}` via the edge-disabling side effects of `fix`.
        for &(var, _) in &biases[..to_fix] {
            if fg.value(var) != 0 {
                continue;
            }
            let (wp, wm, _) = compute_bias(fg, var);
            let val: i8 = if wp > wm { -1 } else { 1 };
            if !fg.fix(var, val, true) {
                return Err(SolveError::Contradiction);
            }
        }

        debug!(
            "fixed up to {} of {} unassigned variables, magnetization {:.6}",
            to_fix, unassigned, magnetization
        );

        Ok(DecimationOutcome::Progress)
    }
}

/// Commits WalkSAT's full assignment for every variable decimation left unassigned.
fn apply_walksat_result(fg: &mut FactorGraph, values: &[i8]) {
    for (i, &value) in values.iter().enumerate() {
        let var = VarId::from_index(i);
        if fg.value(var) == 0 {
            fg.fix(var, value, false);
        }
    }
}

/// Computes `(wp, wm, |wp - wm|)` for an unassigned variable from its converged sub-products,
/// normalizing the same three-way split (`wp`, `wm`, `wz`) survey updates use, but over the
/// variable's full `p`/`m` rather than a cavity with one edge excluded.
fn compute_bias(fg: &mut FactorGraph, var: VarId) -> (f64, f64, f64) {
    let (p, m) = {
        let v = &fg.variables[var.index()];
        let p = if v.pzero > 0 { 0.0 } else { v.p };
        let m = if v.mzero > 0 { 0.0 } else { v.m };
        (p, m)
    };

    let wp = (1.0 - p) * m;
    let wm = (1.0 - m) * p;
    let wz = p * m;
    let norm = wp + wm + wz;

    let (wp, wm) = if norm > 0.0 {
        (wp / norm, wm / norm)
    } else {
        (0.0, 0.0)
    };

    {
        let v = &mut fg.variables[var.index()];
        v.wp = wp;
        v.wm = wm;
        v.wz = 1.0 - wp - wm;
    }

    (wp, wm, (wp - wm).abs())
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
    fn vars_to_assign_eventually_empties_a_satisfiable_formula() {
        let cnf = formula(&[
            &[1, 2, 3],
            &[-1, 2, -3],
            &[1, -2, 3],
            &[-1, -2, -3],
            &[2, 3, -1],
        ]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        let mut rng = SmallRng::seed_from_u64(9);

        let decimation = Decimation::new(1e-3, 1e-16, 1000, 0.5, 0.01);
        decimation.init(&mut fg, &mut rng);

        let mut rounds = 0;
        loop {
            if fg.unassigned_vars() == 0 {
                break;
            }
            match decimation.vars_to_assign(&mut fg, &mut rng) {
                Ok(DecimationOutcome::Progress) => {}
                Ok(DecimationOutcome::Paramagnetic) => break,
                Err(_) => panic!("decimation step failed unexpectedly"),
            }
            rounds += 1;
            assert!(rounds < 100, "decimation did not terminate");
        }
    }

    #[test]
    fn compute_bias_normalizes_and_preserves_the_sign_convention() {
        let cnf = formula(&[&[1, 2]]);
        let mut fg = FactorGraph::from_formula(&cnf, 1e-16);
        // bypass survey propagation: a small p and large m means the variable is pulled
        // towards satisfying its positive occurrences, i.e. wp should dominate wm.
        fg.variables[0].p = 0.2;
        fg.variables[0].m = 0.8;

        let (wp, wm, bias) = compute_bias(&mut fg, VarId::from_index(0));

        assert!((wp + wm + fg.variables[0].wz - 1.0).abs() < 1e-9);
        assert!(wp > wm);
        assert!(bias > 0.0);
        // preserved as-is from the reference algorithm: wp > wm fixes the variable to -1.
        let assigned = if wp > wm { -1 } else { 1 };
        assert_eq!(assigned, -1);
    }
}
