//! Repair operators for ALNS.
//!
//! Reinsert removed requests into a partial solution. A request that fits no
//! existing route gets a fresh depot -> pickup -> delivery -> depot route when
//! that route is feasible; otherwise it stays in the unserved pool.

use crate::instance::PDPTWInstance;
use crate::route::{Insertion, Route};
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepairOperator {
    RandomInsertion,
    GreedyInsertion,
    RegretInsertion,
}

impl RepairOperator {
    /// Operators in weight-vector order
    pub const ALL: [RepairOperator; 3] = [
        RepairOperator::RandomInsertion,
        RepairOperator::GreedyInsertion,
        RepairOperator::RegretInsertion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RepairOperator::RandomInsertion => "Random Insertion",
            RepairOperator::GreedyInsertion => "Greedy Insertion",
            RepairOperator::RegretInsertion => "Regret Insertion",
        }
    }

    /// Reinsert `removed` into a copy of `solution`.
    ///
    /// Unservable requests are skipped. Empty routes are pruned at the end.
    pub fn repair(
        &self,
        instance: &PDPTWInstance,
        solution: &Solution,
        removed: &[usize],
        regret_k: usize,
        regret_penalty: f64,
        rng: &mut ChaCha8Rng,
    ) -> Solution {
        let mut repaired = solution.clone();
        let pending: Vec<usize> = removed.iter().cloned().filter(|&r| instance.is_servable(r)).collect();

        match self {
            RepairOperator::RandomInsertion => random_insertion(instance, &mut repaired, pending, rng),
            RepairOperator::GreedyInsertion => greedy_insertion(instance, &mut repaired, pending),
            RepairOperator::RegretInsertion => {
                regret_insertion(instance, &mut repaired, pending, regret_k, regret_penalty)
            }
        }

        repaired.prune_empty_routes();
        repaired
    }
}

fn place(instance: &PDPTWInstance, solution: &mut Solution, route: usize, request: usize, insertion: &Insertion) {
    solution.routes[route].insert_request(instance, request, insertion);
    solution.unserved.remove(&request);
}

/// Shared fallback: serve the request with a route of its own if possible
fn open_route(instance: &PDPTWInstance, solution: &mut Solution, request: usize) -> bool {
    let route = Route::direct(instance, request);
    if route.is_feasible() {
        solution.routes.push(route);
        solution.unserved.remove(&request);
        true
    } else {
        solution.unserved.insert(request);
        false
    }
}

/// Requests in random order; the first route (in random order) with a feasible
/// slot takes the request at its cheapest position
fn random_insertion(instance: &PDPTWInstance, solution: &mut Solution, mut pending: Vec<usize>, rng: &mut ChaCha8Rng) {
    pending.shuffle(rng);

    for request in pending {
        let mut order: Vec<usize> = (0..solution.routes.len()).collect();
        order.shuffle(rng);

        let target = order.into_iter().find_map(|idx| {
            solution.routes[idx]
                .cheapest_insertion(instance, request)
                .map(|ins| (idx, ins))
        });

        match target {
            Some((idx, ins)) => place(instance, solution, idx, request, &ins),
            None => {
                open_route(instance, solution, request);
            }
        }
    }
}

/// Globally cheapest (request, route) insertion first
fn greedy_insertion(instance: &PDPTWInstance, solution: &mut Solution, mut pending: Vec<usize>) {
    while !pending.is_empty() {
        let mut best: Option<(usize, usize, Insertion)> = None;

        for (i, &request) in pending.iter().enumerate() {
            for (idx, route) in solution.routes.iter().enumerate() {
                if let Some(ins) = route.cheapest_insertion(instance, request) {
                    if best.as_ref().map_or(true, |(_, _, b)| ins.delta < b.delta) {
                        best = Some((i, idx, ins));
                    }
                }
            }
        }

        match best {
            Some((i, idx, ins)) => {
                let request = pending.remove(i);
                place(instance, solution, idx, request, &ins);
            }
            None => {
                let request = pending.remove(0);
                open_route(instance, solution, request);
            }
        }
    }
}

/// Regret of one pending request: cheapest placement and k-th minus best cost
#[derive(Debug)]
struct RegretCandidate {
    pending_idx: usize,
    route: usize,
    insertion: Insertion,
    regret: f64,
    /// Routes able to take the request
    options: usize,
}

/// Gap between the k-th cheapest cost and the cheapest one. Missing ranks cost
/// `penalty` more than the cheapest, so scarce requests rank high whatever
/// the scale of the distances.
fn regret_value(costs: &[f64], k: usize, penalty: f64) -> f64 {
    let Some(&best) = costs.first() else {
        return 0.0;
    };
    let kth = costs.get(k - 1).copied().unwrap_or(best + penalty);
    kth - best
}

/// Pending request with the largest regret. Ties go to the request with fewer
/// feasible routes, then the smaller best cost, then pending order.
fn select_regret(
    instance: &PDPTWInstance,
    solution: &Solution,
    pending: &[usize],
    k: usize,
    penalty: f64,
) -> Option<RegretCandidate> {
    let mut chosen: Option<RegretCandidate> = None;

    for (i, &request) in pending.iter().enumerate() {
        let options: Vec<(usize, Insertion)> = solution
            .routes
            .iter()
            .enumerate()
            .filter_map(|(idx, route)| route.cheapest_insertion(instance, request).map(|ins| (idx, ins)))
            .collect();

        let Some(&(route, insertion)) = options
            .iter()
            .fold(None, |acc: Option<&(usize, Insertion)>, opt| match acc {
                Some(best) if best.1.delta <= opt.1.delta => Some(best),
                _ => Some(opt),
            })
        else {
            continue;
        };

        let mut costs: Vec<f64> = options.iter().map(|(_, ins)| ins.delta).collect();
        costs.sort_by(|a, b| a.total_cmp(b));
        let regret = regret_value(&costs, k, penalty);

        let better = match &chosen {
            None => true,
            Some(c) => {
                regret > c.regret
                    || (regret == c.regret
                        && (options.len() < c.options
                            || (options.len() == c.options && insertion.delta < c.insertion.delta)))
            }
        };
        if better {
            chosen = Some(RegretCandidate {
                pending_idx: i,
                route,
                insertion,
                regret,
                options: options.len(),
            });
        }
    }

    chosen
}

/// Insert the request that would lose the most by waiting
fn regret_insertion(instance: &PDPTWInstance, solution: &mut Solution, mut pending: Vec<usize>, k: usize, penalty: f64) {
    while !pending.is_empty() {
        match select_regret(instance, solution, &pending, k, penalty) {
            Some(c) => {
                let request = pending.remove(c.pending_idx);
                place(instance, solution, c.route, request, &c.insertion);
            }
            None => {
                let request = pending.remove(0);
                open_route(instance, solution, request);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::destroy::{DestroyOperator, ShawWeights};
    use crate::instance::{fixtures, Site};

    fn build(instance: &PDPTWInstance, op: RepairOperator, seed: u64) -> Solution {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let empty = Solution::with_all_unserved(instance);
        op.repair(instance, &empty, &instance.servable_requests(), 2, 1e6, &mut rng)
    }

    #[test]
    fn test_repair_from_scratch_serves_everything() {
        let instance = fixtures::ring(8);
        for op in RepairOperator::ALL {
            let solution = build(&instance, op, 5);
            assert!(solution.is_feasible(), "{}", op.name());
            assert!(solution.is_consistent(&instance), "{}", op.name());
            assert!(solution.routes.iter().all(|r| !r.is_empty()));
        }
    }

    #[test]
    fn test_unservable_request_left_in_pool() {
        let instance = fixtures::with_oversized_request();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let empty = Solution::with_all_unserved(&instance);
        for op in RepairOperator::ALL {
            let solution = op.repair(&instance, &empty, &[0, 1, 2], 2, 1e6, &mut rng);
            assert_eq!(solution.unserved.iter().cloned().collect::<Vec<_>>(), vec![1]);
            assert!(solution.is_admissible(&instance));
            assert!(!solution.is_feasible());
        }
    }

    #[test]
    fn test_destroy_repair_never_splits_requests() {
        let instance = fixtures::ring(10);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut solution = build(&instance, RepairOperator::GreedyInsertion, 0);

        for step in 0..60 {
            let destroy = DestroyOperator::ALL[step % 4];
            let repair = RepairOperator::ALL[step % 3];
            let (partial, removed) = destroy.destroy(&instance, &solution, 1 + step % 5, &ShawWeights::default(), &mut rng);
            assert!(partial.is_consistent(&instance));
            solution = repair.repair(&instance, &partial, &removed, 2, 1e6, &mut rng);
            assert!(solution.is_consistent(&instance));
            assert!(solution.is_feasible());
        }
    }

    #[test]
    fn test_regret_two_matches_greedy_for_single_request() {
        let instance = fixtures::ring(8);
        let base = build(&instance, RepairOperator::GreedyInsertion, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        for request in 0..instance.num_requests() {
            let mut partial = base.clone();
            partial.remove_request(&instance, request);

            let greedy = RepairOperator::GreedyInsertion.repair(&instance, &partial, &[request], 2, 1e6, &mut rng);
            let regret = RepairOperator::RegretInsertion.repair(&instance, &partial, &[request], 2, 1e6, &mut rng);

            let greedy_nodes: Vec<Vec<usize>> = greedy.routes.iter().map(|r| r.nodes.clone()).collect();
            let regret_nodes: Vec<Vec<usize>> = regret.routes.iter().map(|r| r.nodes.clone()).collect();
            assert_eq!(greedy_nodes, regret_nodes, "request {}", request);
        }
    }

    #[test]
    fn test_greedy_prefers_cheapest_route() {
        let instance = fixtures::two_requests();
        let mut solution = Solution::with_all_unserved(&instance);
        solution.routes.push(Route::direct(&instance, 0));
        solution.unserved.remove(&0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let repaired = RepairOperator::GreedyInsertion.repair(&instance, &solution, &[1], 2, 1e6, &mut rng);
        // sharing the route costs less than a second route of 40
        assert_eq!(repaired.routes.len(), 1);
        assert!(repaired.is_feasible());
        assert!(repaired.distance() < 80.0);
    }

    #[test]
    fn test_regret_value_pads_relative_to_best() {
        assert_eq!(regret_value(&[4.0, 9.0, 20.0], 2, 1e6), 5.0);
        assert_eq!(regret_value(&[4.0, 9.0, 20.0], 3, 1e6), 16.0);
        assert_eq!(regret_value(&[2.0e7], 2, 1e6), 1e6);
        assert_eq!(regret_value(&[2.0e7, 2.05e7], 3, 1e6), 1e6);
        assert_eq!(regret_value(&[], 2, 1e6), 0.0);
    }

    /// Two routes whose only request spans the whole horizon at the depot, so
    /// new requests must nest inside it. Request 0 loads 8, request 1 loads 1.
    /// Request 2 (load 5, far away) only fits the second route; request 3
    /// (load 2, next to the depot) fits both at the same cost.
    fn scarce_and_flexible() -> (PDPTWInstance, Solution) {
        let horizon = 1e8;
        let instance = PDPTWInstance::builder("scarce", 10)
            .depot(Site::new(0.0, 0.0).with_window(0.0, horizon))
            .request(
                Site::new(0.0, 0.0).with_window(0.0, 0.0),
                Site::new(0.0, 0.0).with_window(horizon, horizon),
                8,
            )
            .request(
                Site::new(0.0, 0.0).with_window(0.0, 0.0),
                Site::new(0.0, 0.0).with_window(horizon, horizon),
                1,
            )
            .request(Site::new(1e7, 0.0), Site::new(1e7, 1.0), 5)
            .request(Site::new(1.0, 0.0), Site::new(2.0, 0.0), 2)
            .build()
            .unwrap();

        let mut solution = Solution::with_all_unserved(&instance);
        for request in [0, 1] {
            solution.routes.push(Route::direct(&instance, request));
            solution.unserved.remove(&request);
        }
        (instance, solution)
    }

    #[test]
    fn test_regret_prefers_single_option_request_with_large_costs() {
        let (instance, solution) = scarce_and_flexible();
        assert!(solution.routes.iter().all(|r| r.is_feasible()));
        assert!(solution.routes[0].cheapest_insertion(&instance, 2).is_none());
        let only = solution.routes[1].cheapest_insertion(&instance, 2).unwrap();
        assert!(only.delta > 1e6);

        let chosen = select_regret(&instance, &solution, &[3, 2], 2, 1e6).unwrap();
        assert_eq!(chosen.pending_idx, 1);
        assert_eq!(chosen.route, 1);
        assert_eq!(chosen.options, 1);
        assert!((chosen.regret - 1e6).abs() < 1e-6);

        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let repaired = RepairOperator::RegretInsertion.repair(&instance, &solution, &[3, 2], 2, 1e6, &mut rng);
        assert!(repaired.is_feasible());
        assert_eq!(repaired.routes.len(), 2);
        assert_eq!(repaired.route_of(&instance, 2), Some(1));
    }
}
