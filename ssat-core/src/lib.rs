//! A survey-propagation-with-decimation (SID) solver for Boolean satisfiability.
//!
//! SID is a statistical-physics heuristic: it estimates, for every still-unassigned variable,
//! how strongly the rest of the formula's constraints "pull" it towards `true` or `false`
//! (its *survey*, propagated as messages over the variable/clause factor graph), then commits
//! a small batch of the most strongly-pulled variables at a time (*decimation*). When the
//! pull signal collapses (the formula goes *paramagnetic*) the remaining subformula is handed
//! to a WalkSAT local search instead.
//!
//! [`Solver`] is the entry point: build one from a [`ssat_formula::CnfFormula`] and a
//! [`SolverConfig`], then call [`Solver::solve`].
pub mod config;
pub mod decimation;
pub mod error;
pub mod graph;
pub mod rng;
pub mod solver;
pub mod survey;
pub mod walksat;

pub use config::{SolverConfig, WalkSatVariant};
pub use error::SolveError;
pub use solver::Solver;
