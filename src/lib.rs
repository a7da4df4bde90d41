//! Exact and heuristic solvers for small Euclidean TSP instances, plus a
//! harness that measures heuristic optimality gaps against Held-Karp.

pub mod config;
pub mod construct;
pub mod error;
pub mod exact;
pub mod harness;
pub mod ils;
pub mod instance;
pub mod multi_chain;
pub mod tempering;
pub mod three_opt;
pub mod tour;
pub mod two_opt;

pub type Point = (f64, f64);
pub type NodeId = usize;

pub use config::SolverConfig;
pub use construct::Construction;
pub use error::{TspError, TspResult};
pub use exact::{ExactSolution, HeldKarp};
pub use harness::{run_experiment, ExperimentConfig, ExperimentReport, GapSummary, Pipeline, Refinement};
pub use ils::{IlsConfig, Solver};
pub use instance::{d_pt, Instance};
pub use multi_chain::{multi_chain, MultiChainConfig};
pub use tempering::{temper, TemperingConfig, Termination};
pub use tour::{Tour, TourSummary};
pub use three_opt::{three_opt, ThreeOptConfig};
pub use two_opt::{two_opt, LocalSearchStats, TwoOptConfig};
