//! Solver configuration.

/// Which WalkSAT variable-selection rule to use inside the fallback local search.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WalkSatVariant {
    /// Compute break-count directly from each clause's `true_literals` count. This is the
    /// variant the decimation driver actually uses.
    FastBreakCount,
    /// Liu (2015)'s separating-non-caching rule: prefer a variable with no "true literal
    /// count == 1" clause among its occurrences before falling back to a break-count
    /// comparison. Kept as an alternate strategy rather than removed, since nothing in this
    /// crate exercises it by default.
    SeparatingNonCaching,
}

impl Default for WalkSatVariant {
    fn default() -> WalkSatVariant {
        WalkSatVariant::FastBreakCount
    }
}

/// Configurable parameters used during solving.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Fraction of currently unassigned variables to fix per decimation step. (Default: 0.02)
    pub alpha: f64,

    /// Fixed RNG seed. When `None`, the solver seeds from wall-clock time at construction.
    /// (Default: None)
    pub seed: Option<u64>,

    /// Survey-propagation convergence threshold on `max |Δsurvey|`. (Default: 1e-3)
    pub epsilon: f64,

    /// Numerical zero-factor threshold used by the `pzero`/`mzero` counter scheme.
    /// (Default: 1e-16)
    pub eps: f64,

    /// Maximum number of survey-propagation sweeps per `surveyPropagation()` call.
    /// (Default: 1000)
    pub iterations: u32,

    /// Bias-sum threshold below which decimation hands off to WalkSAT. (Default: 0.01)
    pub paramagnet: f64,

    /// Probability of an unconditional random walk step in WalkSAT. (Default: 0.57)
    pub ws_noise: f64,

    /// Number of WalkSAT restarts before giving up. (Default: 100)
    pub ws_max_tries: u32,

    /// Multiplier used to derive `WS_MAX_STEPS = ws_steps_factor * variable_count`.
    /// (Default: 100)
    pub ws_steps_factor: u32,

    /// Which WalkSAT variable-selection rule to use. (Default: FastBreakCount)
    pub walksat_variant: WalkSatVariant,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            alpha: 0.02,
            seed: None,
            epsilon: 1e-3,
            eps: 1e-16,
            iterations: 1000,
            paramagnet: 0.01,
            ws_noise: 0.57,
            ws_max_tries: 100,
            ws_steps_factor: 100,
            walksat_variant: WalkSatVariant::default(),
        }
    }
}
