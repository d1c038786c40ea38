//! Destroy operators for ALNS.
//!
//! Each operator takes a copy of a solution, removes `q` served requests and
//! returns the reduced solution together with the removed ids. Removed requests
//! land in the unserved pool; untouched visits keep their relative order.
//!
//! - Random removal
//! - Worst removal (largest route-local saving first)
//! - Shaw removal (relatedness by pickup distance and pickup ready time)
//! - Time-oriented removal (narrowest pickup windows first)

use crate::instance::PDPTWInstance;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Weights of the two terms of the Shaw relatedness measure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShawWeights {
    /// Weight of the normalised pickup-to-pickup distance
    pub distance: f64,
    /// Weight of the normalised difference of pickup ready times
    pub time: f64,
}

impl Default for ShawWeights {
    fn default() -> Self {
        ShawWeights {
            distance: 1.0,
            time: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestroyOperator {
    RandomRemoval,
    WorstRemoval,
    ShawRemoval,
    TimeOrientedRemoval,
}

impl DestroyOperator {
    /// Operators in weight-vector order
    pub const ALL: [DestroyOperator; 4] = [
        DestroyOperator::RandomRemoval,
        DestroyOperator::WorstRemoval,
        DestroyOperator::ShawRemoval,
        DestroyOperator::TimeOrientedRemoval,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DestroyOperator::RandomRemoval => "Random Removal",
            DestroyOperator::WorstRemoval => "Worst Removal",
            DestroyOperator::ShawRemoval => "Shaw Removal",
            DestroyOperator::TimeOrientedRemoval => "Time-Oriented Removal",
        }
    }

    /// Remove up to `q` served requests from a copy of `solution`.
    ///
    /// `q` is capped at the number of served requests.
    pub fn destroy(
        &self,
        instance: &PDPTWInstance,
        solution: &Solution,
        q: usize,
        shaw: &ShawWeights,
        rng: &mut ChaCha8Rng,
    ) -> (Solution, Vec<usize>) {
        let mut reduced = solution.clone();
        let served = solution.served_requests(instance);
        let q = q.min(served.len());
        if q == 0 {
            return (reduced, Vec::new());
        }

        let removed = match self {
            DestroyOperator::RandomRemoval => random_removal(&served, q, rng),
            DestroyOperator::WorstRemoval => worst_removal(instance, solution, &served, q),
            DestroyOperator::ShawRemoval => shaw_removal(instance, &served, q, shaw, rng),
            DestroyOperator::TimeOrientedRemoval => time_oriented_removal(instance, &served, q),
        };

        for &request in &removed {
            reduced.remove_request(instance, request);
        }

        (reduced, removed)
    }
}

fn random_removal(served: &[usize], q: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    served.choose_multiple(rng, q).cloned().collect()
}

/// Repeatedly take out the request whose removal saves the most distance.
/// Only the route that lost a request has its savings recomputed.
fn worst_removal(instance: &PDPTWInstance, solution: &Solution, served: &[usize], q: usize) -> Vec<usize> {
    let mut solution = solution.clone();
    let mut savings: Vec<Option<f64>> = vec![None; instance.num_requests()];
    for route in &solution.routes {
        for r in route.requests(instance) {
            savings[r] = Some(route.removal_saving(instance, r));
        }
    }

    let mut removed = Vec::with_capacity(q);
    for _ in 0..q {
        let mut worst: Option<(usize, f64)> = None;
        for &r in served {
            if let Some(saving) = savings[r] {
                if worst.map_or(true, |(_, best)| saving > best) {
                    worst = Some((r, saving));
                }
            }
        }

        let Some((request, _)) = worst else { break };
        let route_idx = solution.route_of(instance, request);
        solution.remove_request(instance, request);
        savings[request] = None;
        removed.push(request);

        if let Some(idx) = route_idx {
            let route = &solution.routes[idx];
            for r in route.requests(instance) {
                savings[r] = Some(route.removal_saving(instance, r));
            }
        }
    }

    removed
}

fn relatedness(instance: &PDPTWInstance, a: usize, b: usize, weights: &ShawWeights) -> f64 {
    let pa = instance.node(instance.request(a).pickup);
    let pb = instance.node(instance.request(b).pickup);
    let distance = instance.distance(pa.id, pb.id) / instance.max_pickup_distance();
    let time = (pa.ready_time - pb.ready_time).abs() / instance.pickup_ready_span();
    weights.distance * distance + weights.time * time
}

fn shaw_removal(
    instance: &PDPTWInstance,
    served: &[usize],
    q: usize,
    weights: &ShawWeights,
    rng: &mut ChaCha8Rng,
) -> Vec<usize> {
    let mut remaining = served.to_vec();
    let seed = remaining.remove(rng.gen_range(0..remaining.len()));
    let mut removed = vec![seed];

    // Lowest relatedness to any removed request so far
    let mut closeness: Vec<f64> = remaining
        .iter()
        .map(|&r| relatedness(instance, r, seed, weights))
        .collect();

    while removed.len() < q && !remaining.is_empty() {
        let mut pick = 0;
        for i in 1..remaining.len() {
            if closeness[i] < closeness[pick] {
                pick = i;
            }
        }

        let request = remaining.remove(pick);
        closeness.remove(pick);
        removed.push(request);

        for (i, &r) in remaining.iter().enumerate() {
            closeness[i] = closeness[i].min(relatedness(instance, r, request, weights));
        }
    }

    removed
}

fn time_oriented_removal(instance: &PDPTWInstance, served: &[usize], q: usize) -> Vec<usize> {
    let mut ordered = served.to_vec();
    // stable: equal widths keep served order
    ordered.sort_by_key(|&r| OrderedFloat(instance.node(instance.request(r).pickup).window_width()));
    ordered.truncate(q);
    ordered
}
