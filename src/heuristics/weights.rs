//! Adaptive operator weights.
//!
//! One weight vector per operator family. Operators are drawn with probability
//! proportional to their weight; after each iteration the used operator is pulled
//! towards the reward of the outcome and the vector is renormalised to sum to one.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorWeights {
    weights: Vec<f64>,
}

impl OperatorWeights {
    pub fn uniform(n: usize) -> Self {
        OperatorWeights {
            weights: vec![1.0 / n as f64; n],
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub fn sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Roulette-wheel draw of an operator index
    pub fn select(&self, rng: &mut ChaCha8Rng) -> usize {
        match WeightedIndex::new(&self.weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..self.weights.len()),
        }
    }

    /// `w <- decay * w + (1 - decay) * reward` for one operator, then renormalise.
    /// Weights never go below zero.
    pub fn update(&mut self, index: usize, reward: f64, decay: f64) {
        let w = decay * self.weights[index] + (1.0 - decay) * reward;
        self.weights[index] = w.max(0.0);
        self.normalize();
    }

    /// Scale to sum 1; reset to uniform if every weight is zero
    pub fn normalize(&mut self) {
        let total = self.sum();
        if total > 0.0 && total.is_finite() {
            for w in &mut self.weights {
                *w /= total;
            }
        } else {
            *self = Self::uniform(self.weights.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_start() {
        let weights = OperatorWeights::uniform(4);
        assert!(weights.as_slice().iter().all(|&w| (w - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_weights_sum_to_one_for_any_decay() {
        let rewards = [1.0, 0.5, 0.3, 0.1];
        for decay in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let mut weights = OperatorWeights::uniform(4);
            for step in 0..50 {
                weights.update(step % 4, rewards[step % 3], decay);
                assert!((weights.sum() - 1.0).abs() < 1e-9, "decay {}", decay);
                assert!(weights.as_slice().iter().all(|&w| w >= 0.0));
            }
        }
    }

    #[test]
    fn test_rewarded_operator_gains_weight() {
        let mut weights = OperatorWeights::uniform(3);
        weights.update(1, 1.0, 0.5);
        let w = weights.as_slice();
        assert!(w[1] > w[0]);
        assert_eq!(w[0], w[2]);
    }

    #[test]
    fn test_negative_reward_clamped_and_reset() {
        let mut weights = OperatorWeights::uniform(1);
        weights.update(0, -5.0, 0.0);
        assert_eq!(weights.as_slice(), &[1.0]);

        let mut weights = OperatorWeights::uniform(2);
        weights.update(0, -10.0, 0.0);
        assert_eq!(weights.as_slice(), &[0.0, 1.0]);
        for _ in 0..20 {
            assert_eq!(weights.select(&mut ChaCha8Rng::seed_from_u64(9)), 1);
        }
    }

    #[test]
    fn test_select_follows_weights() {
        let mut weights = OperatorWeights::uniform(2);
        weights.update(0, 1.0, 0.0);
        weights.update(1, 0.0, 0.0);
        // [1, 0] after renormalisation
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!((0..100).all(|_| weights.select(&mut rng) == 0));
    }
}
