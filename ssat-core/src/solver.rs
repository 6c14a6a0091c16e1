//! The public solver facade tying the factor graph, decimation and WalkSAT together.
use log::info;
use rand::rngs::SmallRng;
use ssat_formula::{CnfFormula, Lit, Var};

use crate::config::SolverConfig;
use crate::decimation::Decimation;
use crate::error::SolveError;
use crate::graph::{FactorGraph, VarId};
use crate::rng::seeded_rng;
use crate::walksat::WalkSat;

/// A survey-propagation-with-decimation solver bound to one formula.
///
/// Construct with [`Solver::new`], solve with [`Solver::solve`], then read the satisfying
/// assignment back with [`Solver::assignment`]. A solver can be reused across formulas'
/// worth of decimation attempts via [`Solver::reset`], which rewinds the factor graph without
/// re-parsing the input.
pub struct Solver {
    graph: FactorGraph,
    decimation: Decimation,
    walksat: WalkSat,
    rng: SmallRng,
    solved: bool,
}

impl Solver {
    pub fn new(formula: &CnfFormula, config: SolverConfig) -> Solver {
        let graph = FactorGraph::from_formula(formula, config.eps);
        let decimation = Decimation::new(
            config.epsilon,
            config.eps,
            config.iterations,
            config.alpha,
            config.paramagnet,
        );
        let walksat = WalkSat::new(
            config.ws_noise,
            config.ws_max_tries,
            config.ws_steps_factor,
            config.walksat_variant,
        );
        let rng = seeded_rng(config.seed);

        info!(
            "built factor graph with {} variables and {} clauses",
            graph.var_count(),
            graph.clause_count()
        );

        Solver {
            graph,
            decimation,
            walksat,
            rng,
            solved: false,
        }
    }

    /// Runs survey propagation with decimation to completion, falling back to WalkSAT once the
    /// bias signal goes paramagnetic.
    ///
    /// On success every variable has a value and [`Solver::assignment`] returns it. On
    /// failure the graph is left in whatever partial state the failing step produced; call
    /// [`Solver::reset`] before attempting another solve.
    pub fn solve(&mut self) -> Result<(), SolveError> {
        self.decimation
            .survey_inspired_decimation(&mut self.graph, &mut self.rng, &self.walksat)?;

        info!("solve finished, {} variables unassigned", self.graph.unassigned_vars());
        self.solved = true;
        Ok(())
    }

    /// The satisfying assignment as DIMACS-signed literals, one per variable in index order,
    /// or `None` if [`Solver::solve`] has not yet succeeded.
    pub fn assignment(&self) -> Option<Vec<Lit>> {
        if !self.solved || self.graph.unassigned_vars() > 0 {
            return None;
        }
        Some(
            (0..self.graph.var_count())
                .map(|i| {
                    let var = Var::from_index(i);
                    let value = self.graph.value(VarId::from_index(i));
                    var.lit(value > 0)
                })
                .collect(),
        )
    }

    /// Rewinds the factor graph to its freshly-built state so the same formula can be solved
    /// again. Reuses the existing RNG state rather than reseeding it, so immediately calling
    /// `solve` again after `reset` does *not* reproduce the previous run; use
    /// [`Solver::reset_with_seed`] for that.
    pub fn reset(&mut self) {
        self.graph.reset();
        self.solved = false;
    }

    /// Like [`Solver::reset`], but also reseeds the RNG. Solving twice after
    /// `reset_with_seed(Some(s))` with the same `s` reproduces the same `fixed_vars` sequence
    /// and the same assignment.
    pub fn reset_with_seed(&mut self, seed: Option<u64>) {
        self.graph.reset();
        self.rng = seeded_rng(seed);
        self.solved = false;
    }
}
