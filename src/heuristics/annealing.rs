//! Simulated annealing acceptance for ALNS.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Outcome of an iteration, used both for acceptance and for operator rewards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreClass {
    /// Better than the best solution so far
    NewBest = 1,
    /// Better than the current solution
    Improved = 2,
    /// Not better, accepted by the annealing draw
    AcceptedWorse = 3,
    Rejected = 4,
}

impl ScoreClass {
    /// 1-based class number as logged
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn is_accepted(&self) -> bool {
        !matches!(self, ScoreClass::Rejected)
    }
}

/// Temperature schedule and acceptance rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedAnnealing {
    /// Current temperature
    pub temperature: f64,
    /// Multiplied into the temperature once per iteration
    pub cooling_rate: f64,
}

impl SimulatedAnnealing {
    pub fn new(temperature: f64, cooling_rate: f64) -> Self {
        SimulatedAnnealing {
            temperature,
            cooling_rate,
        }
    }

    /// Temperature at which a solution `start_worsening` (relative) worse than
    /// `initial_distance` is accepted with probability `start_acceptance`.
    ///
    /// Falls back to 1.0 when the result is not a positive finite number.
    pub fn initial_temperature(initial_distance: f64, start_acceptance: f64, start_worsening: f64) -> f64 {
        let t = -(start_worsening * initial_distance) / start_acceptance.ln();
        if t.is_finite() && t > 0.0 {
            t
        } else {
            1.0
        }
    }

    /// Probability of accepting a move from `current` to `candidate`
    pub fn acceptance_probability(&self, candidate: f64, current: f64) -> f64 {
        let delta = candidate - current;
        if delta <= 0.0 {
            1.0
        } else if self.temperature <= 0.0 {
            0.0
        } else {
            (-delta / self.temperature).exp()
        }
    }

    /// Classify a candidate. Inadmissible candidates are always rejected; the
    /// random draw only happens for candidates that are not improvements.
    pub fn decide(
        &self,
        admissible: bool,
        candidate: f64,
        current: f64,
        best: f64,
        rng: &mut ChaCha8Rng,
    ) -> ScoreClass {
        if !admissible {
            ScoreClass::Rejected
        } else if candidate < best {
            ScoreClass::NewBest
        } else if candidate < current {
            ScoreClass::Improved
        } else if rng.gen::<f64>() < self.acceptance_probability(candidate, current) {
            ScoreClass::AcceptedWorse
        } else {
            ScoreClass::Rejected
        }
    }

    pub fn cool(&mut self) {
        self.temperature *= self.cooling_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_initial_temperature_formula() {
        let t = SimulatedAnnealing::initial_temperature(1000.0, 0.5, 0.05);
        // a 5% worse solution (50) is accepted with probability 0.5
        assert!((t - 50.0 / std::f64::consts::LN_2).abs() < 1e-9);
        let sa = SimulatedAnnealing::new(t, 0.95);
        assert!((sa.acceptance_probability(1050.0, 1000.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_initial_temperature_fallback() {
        assert_eq!(SimulatedAnnealing::initial_temperature(0.0, 0.5, 0.05), 1.0);
    }

    #[test]
    fn test_temperature_strictly_decreasing() {
        let mut sa = SimulatedAnnealing::new(100.0, 0.95);
        let mut previous = sa.temperature;
        for _ in 0..200 {
            sa.cool();
            assert!(sa.temperature < previous);
            previous = sa.temperature;
        }
    }

    #[test]
    fn test_new_best_always_accepted() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for temperature in [1e-9, 1.0, 1e6] {
            let sa = SimulatedAnnealing::new(temperature, 0.9);
            assert_eq!(sa.decide(true, 90.0, 120.0, 100.0, &mut rng), ScoreClass::NewBest);
            assert_eq!(sa.decide(true, 110.0, 120.0, 100.0, &mut rng), ScoreClass::Improved);
        }
    }

    #[test]
    fn test_worse_candidates_rejected_when_cold() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sa = SimulatedAnnealing::new(1e-6, 0.9);
        assert!(sa.acceptance_probability(101.0, 100.0) < 1e-100);
        for _ in 0..100 {
            assert_eq!(sa.decide(true, 101.0, 100.0, 90.0, &mut rng), ScoreClass::Rejected);
        }

        let hot = SimulatedAnnealing::new(1e9, 0.9);
        let accepted = (0..100)
            .filter(|_| hot.decide(true, 101.0, 100.0, 90.0, &mut rng) == ScoreClass::AcceptedWorse)
            .count();
        assert!(accepted > 90);
    }

    #[test]
    fn test_inadmissible_always_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sa = SimulatedAnnealing::new(1e9, 0.9);
        assert_eq!(sa.decide(false, 1.0, 100.0, 100.0, &mut rng), ScoreClass::Rejected);
    }

    #[test]
    fn test_equal_distance_accepted() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sa = SimulatedAnnealing::new(1e-9, 0.9);
        assert_eq!(sa.decide(true, 100.0, 100.0, 90.0, &mut rng), ScoreClass::AcceptedWorse);
        assert_eq!(ScoreClass::AcceptedWorse.number(), 3);
    }
}
