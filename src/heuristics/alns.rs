//! Adaptive Large Neighborhood Search for the PDPTW.
//!
//! The search keeps a current and a best solution. Every iteration draws a
//! destroy and a repair operator by weight, removes `q` requests from a copy of
//! the current solution, reinserts them, and lets simulated annealing decide
//! whether the candidate replaces the current solution. The score class of the
//! decision feeds back into the operator weights.

use crate::error::ConfigError;
use crate::heuristics::annealing::{ScoreClass, SimulatedAnnealing};
use crate::heuristics::destroy::{DestroyOperator, ShawWeights};
use crate::heuristics::repair::RepairOperator;
use crate::heuristics::weights::OperatorWeights;
use crate::instance::PDPTWInstance;
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

/// Reward added to an operator's weight for each score class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreRewards {
    pub new_best: f64,
    pub improved: f64,
    pub accepted: f64,
    pub rejected: f64,
}

impl ScoreRewards {
    pub fn reward(&self, class: ScoreClass) -> f64 {
        match class {
            ScoreClass::NewBest => self.new_best,
            ScoreClass::Improved => self.improved,
            ScoreClass::AcceptedWorse => self.accepted,
            ScoreClass::Rejected => self.rejected,
        }
    }
}

impl Default for ScoreRewards {
    fn default() -> Self {
        ScoreRewards {
            new_best: 1.0,
            improved: 0.5,
            accepted: 0.3,
            rejected: 0.1,
        }
    }
}

/// ALNS parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlnsConfig {
    /// Number of destroy/repair iterations
    pub iterations: usize,
    /// Smallest neighborhood size q
    pub min_removal: usize,
    /// Largest neighborhood size q
    pub max_removal: usize,
    /// Temperature multiplier per iteration
    pub cooling_rate: f64,
    /// Weight memory: 1 keeps weights fixed, 0 replaces them by the last reward
    pub decay: f64,
    pub rewards: ScoreRewards,
    /// Overrides the temperature derived from the initial solution
    pub initial_temperature: Option<f64>,
    /// Probability of accepting a `start_worsening` worse solution at the start
    pub start_acceptance: f64,
    /// Relative worsening used to derive the initial temperature
    pub start_worsening: f64,
    /// k of regret-k insertion
    pub regret_k: usize,
    /// Extra cost over the cheapest option assumed for missing ranks in regret insertion
    pub regret_penalty: f64,
    pub shaw: ShawWeights,
    /// Random seed
    pub seed: u64,
}

impl Default for AlnsConfig {
    fn default() -> Self {
        AlnsConfig {
            iterations: 100,
            min_removal: 1,
            max_removal: 45,
            cooling_rate: 0.95,
            decay: 0.75,
            rewards: ScoreRewards::default(),
            initial_temperature: None,
            start_acceptance: 0.5,
            start_worsening: 0.05,
            regret_k: 2,
            regret_penalty: 1e6,
            shaw: ShawWeights::default(),
            seed: 1,
        }
    }
}

impl AlnsConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_removal_range(mut self, min: usize, max: usize) -> Self {
        self.min_removal = min;
        self.max_removal = max;
        self
    }

    pub fn with_cooling_rate(mut self, cooling_rate: f64) -> Self {
        self.cooling_rate = cooling_rate;
        self
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_rewards(mut self, rewards: ScoreRewards) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = Some(temperature);
        self
    }

    pub fn with_regret_k(mut self, k: usize) -> Self {
        self.regret_k = k;
        self
    }

    pub fn with_shaw_weights(mut self, shaw: ShawWeights) -> Self {
        self.shaw = shaw;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Shrink the removal range so it fits the servable requests of `instance`
    pub fn fit_removal_range(mut self, instance: &PDPTWInstance) -> Self {
        let servable = instance.servable_requests().len();
        if self.max_removal > servable {
            log::debug!("max_removal {} clamped to {} servable requests", self.max_removal, servable);
            self.max_removal = servable;
        }
        self.min_removal = self.min_removal.min(self.max_removal);
        self
    }

    /// Check every parameter against its range and the removal range against
    /// the number of servable requests of `instance`
    pub fn validate(&self, instance: &PDPTWInstance) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.min_removal < 1 {
            return Err(ConfigError::RemovalBelowOne(self.min_removal));
        }
        if self.min_removal > self.max_removal {
            return Err(ConfigError::RemovalRangeInverted {
                min: self.min_removal,
                max: self.max_removal,
            });
        }
        let servable = instance.servable_requests().len();
        if self.max_removal > servable {
            return Err(ConfigError::RemovalAboveServable {
                max: self.max_removal,
                servable,
            });
        }
        if self.regret_k < 2 {
            return Err(ConfigError::RegretBelowTwo(self.regret_k));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(ConfigError::CoolingRate(self.cooling_rate));
        }
        if !(0.0..=1.0).contains(&self.decay) {
            return Err(ConfigError::Decay(self.decay));
        }
        if !(self.start_acceptance > 0.0 && self.start_acceptance < 1.0) {
            return Err(ConfigError::StartAcceptance(self.start_acceptance));
        }
        if !(self.start_worsening > 0.0 && self.start_worsening.is_finite()) {
            return Err(ConfigError::StartWorsening(self.start_worsening));
        }
        if let Some(t) = self.initial_temperature {
            if !(t > 0.0 && t.is_finite()) {
                return Err(ConfigError::InitialTemperature(t));
            }
        }

        let rewards = [
            ("rewards.new_best", self.rewards.new_best),
            ("rewards.improved", self.rewards.improved),
            ("rewards.accepted", self.rewards.accepted),
            ("rewards.rejected", self.rewards.rejected),
        ];
        for (name, value) in rewards {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }

        let non_negative = [("shaw.distance", self.shaw.distance), ("shaw.time", self.shaw.time)];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        if !(self.regret_penalty.is_finite() && self.regret_penalty > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "regret_penalty",
                value: self.regret_penalty,
            });
        }

        Ok(())
    }
}

/// One line of the search log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: usize,
    pub current_distance: f64,
    pub best_distance: f64,
    /// Temperature used for the acceptance decision
    pub temperature: f64,
    pub destroy: DestroyOperator,
    pub repair: RepairOperator,
    /// Destroy weights after the update
    pub destroy_weights: Vec<f64>,
    /// Repair weights after the update
    pub repair_weights: Vec<f64>,
    /// Number of requests removed
    pub removal_size: usize,
    pub score: ScoreClass,
    pub candidate_distance: f64,
    /// Candidate routes every request feasibly
    pub feasible: bool,
    /// Requests left unserved by the candidate
    pub unserved: usize,
}

/// Outcome of an ALNS run
#[derive(Debug, Clone)]
pub struct AlnsResult {
    pub best: Solution,
    pub initial_distance: f64,
    pub log: Vec<IterationRecord>,
    /// Iterations actually performed
    pub iterations: usize,
    /// Stopped early by the observer
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// ALNS solver bound to one instance
pub struct Alns<'a> {
    instance: &'a PDPTWInstance,
    config: AlnsConfig,
}

impl<'a> Alns<'a> {
    pub fn new(instance: &'a PDPTWInstance, config: AlnsConfig) -> Result<Self, ConfigError> {
        config.validate(instance)?;
        Ok(Alns { instance, config })
    }

    pub fn config(&self) -> &AlnsConfig {
        &self.config
    }

    /// Initial solution: every servable request placed by random insertion
    pub fn construct_initial(&self, rng: &mut ChaCha8Rng) -> Solution {
        let empty = Solution::with_all_unserved(self.instance);
        RepairOperator::RandomInsertion.repair(
            self.instance,
            &empty,
            &self.instance.servable_requests(),
            self.config.regret_k,
            self.config.regret_penalty,
            rng,
        )
    }

    /// Run with the configured seed
    pub fn run(&self) -> AlnsResult {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.run_with(&mut rng, |_| ControlFlow::Continue(()))
    }

    /// Run with an explicit random source. `observer` sees every log record as
    /// it is produced and may stop the search by returning `ControlFlow::Break`.
    pub fn run_with<F>(&self, rng: &mut ChaCha8Rng, mut observer: F) -> AlnsResult
    where
        F: FnMut(&IterationRecord) -> ControlFlow<()>,
    {
        let start = Instant::now();
        let instance = self.instance;
        let config = &self.config;

        let initial = self.construct_initial(rng);
        let initial_distance = initial.distance();
        let mut current = initial.clone();
        let mut best = initial;

        let temperature = config.initial_temperature.unwrap_or_else(|| {
            SimulatedAnnealing::initial_temperature(initial_distance, config.start_acceptance, config.start_worsening)
        });
        let mut annealing = SimulatedAnnealing::new(temperature, config.cooling_rate);
        let mut destroy_weights = OperatorWeights::uniform(DestroyOperator::ALL.len());
        let mut repair_weights = OperatorWeights::uniform(RepairOperator::ALL.len());

        log::info!(
            "ALNS on {}: {} requests ({} unservable), initial distance {:.2}, T0 {:.4}",
            instance.name,
            instance.num_requests(),
            instance.unservable_requests().len(),
            initial_distance,
            temperature
        );

        let mut history = Vec::with_capacity(config.iterations);
        let mut cancelled = false;

        for iteration in 1..=config.iterations {
            let served = current.served_requests(instance).len();
            let q = rng.gen_range(config.min_removal..=config.max_removal).min(served);

            let d_idx = destroy_weights.select(rng);
            let r_idx = repair_weights.select(rng);
            let destroy = DestroyOperator::ALL[d_idx];
            let repair = RepairOperator::ALL[r_idx];

            let (partial, removed) = destroy.destroy(instance, &current, q, &config.shaw, rng);
            let candidate = repair.repair(instance, &partial, &removed, config.regret_k, config.regret_penalty, rng);

            let candidate_distance = candidate.distance();
            let feasible = candidate.is_feasible();
            let unserved = candidate.unserved.len();
            let score = annealing.decide(
                candidate.is_admissible(instance),
                candidate_distance,
                current.distance(),
                best.distance(),
                rng,
            );

            match score {
                ScoreClass::NewBest => {
                    log::info!(
                        "iteration {}: new best {:.2} ({} / {})",
                        iteration,
                        candidate_distance,
                        destroy.name(),
                        repair.name()
                    );
                    best = candidate.clone();
                    current = candidate;
                }
                ScoreClass::Improved | ScoreClass::AcceptedWorse => current = candidate,
                ScoreClass::Rejected => {}
            }

            let reward = config.rewards.reward(score);
            destroy_weights.update(d_idx, reward, config.decay);
            repair_weights.update(r_idx, reward, config.decay);

            let record = IterationRecord {
                iteration,
                current_distance: current.distance(),
                best_distance: best.distance(),
                temperature: annealing.temperature,
                destroy,
                repair,
                destroy_weights: destroy_weights.as_slice().to_vec(),
                repair_weights: repair_weights.as_slice().to_vec(),
                removal_size: removed.len(),
                score,
                candidate_distance,
                feasible,
                unserved,
            };
            annealing.cool();

            log::debug!(
                "iteration {}: q={} {} / {} -> {:.2} (class {}), current {:.2}, best {:.2}, T {:.4}",
                iteration,
                record.removal_size,
                destroy.name(),
                repair.name(),
                candidate_distance,
                score.number(),
                record.current_distance,
                record.best_distance,
                record.temperature
            );

            let flow = observer(&record);
            history.push(record);
            if flow.is_break() {
                cancelled = true;
                log::info!("ALNS cancelled after {} iterations", iteration);
                break;
            }
        }

        let elapsed = start.elapsed();
        log::info!(
            "ALNS finished: best distance {:.2} (initial {:.2}) in {:.2}s",
            best.distance(),
            initial_distance,
            elapsed.as_secs_f64()
        );

        AlnsResult {
            best,
            initial_distance,
            iterations: history.len(),
            log: history,
            cancelled,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::fixtures;

    fn small_config() -> AlnsConfig {
        AlnsConfig::default()
            .with_iterations(50)
            .with_decay(0.9)
            .with_cooling_rate(0.99)
            .with_removal_range(1, 2)
    }

    #[test]
    fn test_two_requests_reach_feasible_best() {
        let instance = fixtures::two_requests();
        let alns = Alns::new(&instance, small_config()).unwrap();
        let result = alns.run();

        assert!(result.best.is_feasible());
        assert!(result.best.distance() <= result.initial_distance + 1e-9);
        assert_eq!(result.log.len(), 50);
        assert_eq!(result.iterations, 50);
        assert!(!result.cancelled);
    }

    #[test]
    fn test_log_is_consistent() {
        let instance = fixtures::ring(10);
        let config = AlnsConfig::default().with_iterations(80).with_removal_range(1, 4);
        let result = Alns::new(&instance, config).unwrap().run();

        let mut previous_best = result.initial_distance;
        let mut previous_temperature = f64::INFINITY;
        for (i, record) in result.log.iter().enumerate() {
            assert_eq!(record.iteration, i + 1);
            assert!(record.best_distance <= previous_best + 1e-9);
            assert!(record.best_distance <= record.current_distance + 1e-9);
            assert!(record.temperature < previous_temperature);
            assert!((record.destroy_weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!((record.repair_weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!((1..=4).contains(&record.removal_size));
            previous_best = record.best_distance;
            previous_temperature = record.temperature;
        }
        assert!(result.best.is_feasible());
        assert!(result.best.is_consistent(&instance));
        assert!((result.best.distance() - previous_best).abs() < 1e-9);
    }

    #[test]
    fn test_oversized_request_never_served() {
        let instance = fixtures::with_oversized_request();
        let alns = Alns::new(&instance, small_config()).unwrap();
        let result = alns.run();

        assert!(result.log.iter().all(|r| !r.feasible && r.unserved >= 1));
        assert_eq!(result.best.unserved.iter().cloned().collect::<Vec<_>>(), vec![1]);
        assert!(result.best.is_admissible(&instance));
        assert!(!result.best.is_feasible());
    }

    #[test]
    fn test_same_seed_same_run() {
        let instance = fixtures::ring(8);
        let config = AlnsConfig::default().with_iterations(40).with_removal_range(1, 3).with_seed(17);
        let a = Alns::new(&instance, config.clone()).unwrap().run();
        let b = Alns::new(&instance, config).unwrap().run();

        let trace = |r: &AlnsResult| -> Vec<(f64, DestroyOperator, RepairOperator, ScoreClass)> {
            r.log
                .iter()
                .map(|x| (x.candidate_distance, x.destroy, x.repair, x.score))
                .collect()
        };
        assert_eq!(trace(&a), trace(&b));
        assert_eq!(a.best.distance(), b.best.distance());
    }

    #[test]
    fn test_observer_can_cancel() {
        let instance = fixtures::ring(6);
        let alns = Alns::new(&instance, AlnsConfig::default().with_removal_range(1, 3)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut seen = 0;
        let result = alns.run_with(&mut rng, |record| {
            seen += 1;
            if record.iteration == 5 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(seen, 5);
        assert!(result.cancelled);
        assert_eq!(result.log.len(), 5);
        assert_eq!(result.iterations, 5);
    }

    #[test]
    fn test_explicit_initial_temperature() {
        let instance = fixtures::two_requests();
        let config = small_config().with_initial_temperature(123.0);
        let result = Alns::new(&instance, config).unwrap().run();
        assert!((result.log[0].temperature - 123.0).abs() < 1e-12);
        assert!((result.log[1].temperature - 123.0 * 0.99).abs() < 1e-9);
    }

    #[test]
    fn test_config_validation() {
        let instance = fixtures::two_requests();
        let base = small_config();

        assert_eq!(base.validate(&instance), Ok(()));
        assert_eq!(
            base.clone().with_iterations(0).validate(&instance),
            Err(ConfigError::ZeroIterations)
        );
        assert_eq!(
            base.clone().with_removal_range(0, 2).validate(&instance),
            Err(ConfigError::RemovalBelowOne(0))
        );
        assert_eq!(
            base.clone().with_removal_range(2, 1).validate(&instance),
            Err(ConfigError::RemovalRangeInverted { min: 2, max: 1 })
        );
        assert_eq!(
            base.clone().with_removal_range(1, 3).validate(&instance),
            Err(ConfigError::RemovalAboveServable { max: 3, servable: 2 })
        );
        assert_eq!(
            base.clone().with_regret_k(1).validate(&instance),
            Err(ConfigError::RegretBelowTwo(1))
        );
        assert_eq!(
            base.clone().with_cooling_rate(1.0).validate(&instance),
            Err(ConfigError::CoolingRate(1.0))
        );
        assert_eq!(base.clone().with_decay(1.5).validate(&instance), Err(ConfigError::Decay(1.5)));
        let mut no_penalty = base.clone();
        no_penalty.regret_penalty = 0.0;
        assert_eq!(
            no_penalty.validate(&instance),
            Err(ConfigError::InvalidParameter {
                name: "regret_penalty",
                value: 0.0
            })
        );
        assert!(Alns::new(&instance, AlnsConfig::default()).is_err());
        assert!(Alns::new(&instance, AlnsConfig::default().fit_removal_range(&instance)).is_ok());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: AlnsConfig = serde_json::from_str(r#"{ "iterations": 250, "decay": 0.5 }"#).unwrap();
        assert_eq!(config.iterations, 250);
        assert_eq!(config.decay, 0.5);
        assert_eq!(config.cooling_rate, 0.95);
        assert_eq!(config.rewards, ScoreRewards::default());
    }
}
