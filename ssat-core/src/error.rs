//! Errors produced by the solver.
use thiserror::Error;

/// Reasons the SID solver can fail to determine a satisfying assignment.
///
/// The original algorithm reports all three of these as a single `false` return value; we
/// promote them to a typed error since the distinction is useful to callers (a contradiction
/// means the current decimation path is dead, non-convergence means SP itself gave up, and
/// WalkSAT exhaustion means the local search never found a model for the paramagnetic
/// subformula).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// Unit propagation or decimation fixed a variable that falsified an already-critical
    /// clause, driving its count of unassigned literals to zero without satisfying it.
    #[error("propagation produced a contradiction")]
    Contradiction,

    /// Survey propagation failed to reach `max |Δsurvey| <= epsilon` within the configured
    /// iteration budget.
    #[error("survey propagation did not converge within {iterations} iterations")]
    NonConvergence {
        /// The iteration cap that was exceeded.
        iterations: u32,
    },

    /// WalkSAT exhausted its restart budget without finding a satisfying assignment for the
    /// (sub)formula handed to it.
    #[error("WalkSAT exhausted {tries} restarts without finding a satisfying assignment")]
    WalkSatExhausted {
        /// The number of restarts attempted.
        tries: u32,
    },
}
