//! PDPTW ALNS Solver Library
//!
//! Adaptive Large Neighborhood Search for the Pickup and Delivery Problem with
//! Time Windows (PDPTW): a fleet of identical capacitated vehicles serves paired
//! pickup/delivery requests within time windows while minimizing total distance.
//!
//! # Features
//!
//! - Instance loading (location-list text format, JSON, programmatic builder)
//! - Four destroy operators (random, worst, Shaw, time-oriented)
//! - Three repair operators (random, greedy, regret-k insertion)
//! - Simulated annealing acceptance with adaptive operator weights
//! - Multi-seed benchmarking and SVG/CSV reporting
//!
//! # Example
//!
//! ```no_run
//! use pdptw_alns::instance::PDPTWInstance;
//! use pdptw_alns::heuristics::alns::{Alns, AlnsConfig};
//!
//! // Load instance
//! let instance = PDPTWInstance::from_file("lc101.txt").unwrap();
//!
//! // Search
//! let config = AlnsConfig::default().with_iterations(500).fit_removal_range(&instance);
//! let result = Alns::new(&instance, config).unwrap().run();
//!
//! println!("Best distance: {:.2}", result.best.distance());
//! ```

pub mod error;
pub mod instance;
pub mod route;
pub mod solution;
pub mod heuristics;
pub mod benchmark;
pub mod visualization;

pub use error::{ConfigError, InstanceError};
pub use instance::PDPTWInstance;
pub use route::Route;
pub use solution::Solution;
