//! Heuristics module for the PDPTW.
//!
//! This module exports the ALNS building blocks: destroy and repair operators,
//! simulated annealing acceptance, adaptive operator weights and the search loop.

pub mod alns;
pub mod annealing;
pub mod destroy;
pub mod repair;
pub mod weights;

pub use alns::{Alns, AlnsConfig, AlnsResult, IterationRecord, ScoreRewards};
pub use annealing::{ScoreClass, SimulatedAnnealing};
pub use destroy::{DestroyOperator, ShawWeights};
pub use repair::RepairOperator;
pub use weights::OperatorWeights;
