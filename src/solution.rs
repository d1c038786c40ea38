//! Solution representation for the PDPTW.

use crate::instance::PDPTWInstance;
use crate::route::Route;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A set of routes plus the pool of requests that are not routed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub routes: Vec<Route>,
    /// Requests currently not served by any route
    pub unserved: BTreeSet<usize>,
}

impl Solution {
    /// No routes, every request in the pool
    pub fn with_all_unserved(instance: &PDPTWInstance) -> Self {
        Solution {
            routes: Vec::new(),
            unserved: (0..instance.num_requests()).collect(),
        }
    }

    /// Total distance over all routes
    pub fn distance(&self) -> f64 {
        self.routes.iter().map(|r| r.distance).sum()
    }

    /// Every request routed and every route feasible
    pub fn is_feasible(&self) -> bool {
        self.unserved.is_empty() && self.routes.iter().all(|r| r.is_feasible())
    }

    /// Every servable request routed and every route feasible. Requests that
    /// no vehicle can serve may stay in the pool.
    pub fn is_admissible(&self, instance: &PDPTWInstance) -> bool {
        self.routes.iter().all(|r| r.is_feasible()) && self.unserved.iter().all(|&r| !instance.is_servable(r))
    }

    /// Number of routes that visit at least one customer
    pub fn num_vehicles(&self) -> usize {
        self.routes.iter().filter(|r| !r.is_empty()).count()
    }

    /// Ids of all routed requests, ascending
    pub fn served_requests(&self, instance: &PDPTWInstance) -> Vec<usize> {
        let mut served: Vec<usize> = self.routes.iter().flat_map(|r| r.requests(instance)).collect();
        served.sort_unstable();
        served
    }

    /// Index of the route serving `request`
    pub fn route_of(&self, instance: &PDPTWInstance, request: usize) -> Option<usize> {
        self.routes.iter().position(|r| r.contains_request(instance, request))
    }

    /// Take `request` out of its route and put it in the pool. The emptied
    /// route, if any, is kept.
    pub fn remove_request(&mut self, instance: &PDPTWInstance, request: usize) -> bool {
        match self.route_of(instance, request) {
            Some(idx) => {
                self.routes[idx].remove_request(instance, request);
                self.unserved.insert(request);
                true
            }
            None => false,
        }
    }

    pub fn prune_empty_routes(&mut self) {
        self.routes.retain(|r| !r.is_empty());
    }

    /// Every request is either in the pool or has both nodes in exactly one route
    pub fn is_consistent(&self, instance: &PDPTWInstance) -> bool {
        let mut pickups = vec![0usize; instance.num_requests()];
        let mut deliveries = vec![0usize; instance.num_requests()];
        let mut route_of_pickup = vec![usize::MAX; instance.num_requests()];
        let mut route_of_delivery = vec![usize::MAX; instance.num_requests()];

        for (idx, route) in self.routes.iter().enumerate() {
            for &id in &route.nodes {
                let node = instance.node(id);
                if let Some(r) = node.request {
                    if node.is_pickup() {
                        pickups[r] += 1;
                        route_of_pickup[r] = idx;
                    } else {
                        deliveries[r] += 1;
                        route_of_delivery[r] = idx;
                    }
                }
            }
        }

        (0..instance.num_requests()).all(|r| {
            if self.unserved.contains(&r) {
                pickups[r] == 0 && deliveries[r] == 0
            } else {
                pickups[r] == 1 && deliveries[r] == 1 && route_of_pickup[r] == route_of_delivery[r]
            }
        })
    }

    /// Print the solution
    pub fn print(&self, instance: &PDPTWInstance) {
        println!("Solution for instance: {}", instance.name);
        println!("  Total distance: {:.2}", self.distance());
        println!("  Vehicles used: {}", self.num_vehicles());
        println!("  Feasible: {}", self.is_feasible());
        if !self.unserved.is_empty() {
            let labels: Vec<String> = self
                .unserved
                .iter()
                .map(|&r| instance.node(instance.request(r).pickup).label.clone())
                .collect();
            println!("  Unserved requests: {}", labels.join(", "));
        }
        for (i, route) in self.routes.iter().enumerate() {
            let labels: Vec<&str> = route.nodes.iter().map(|&id| instance.node(id).label.as_str()).collect();
            println!("  Route {} ({:.2}): {}", i + 1, route.distance, labels.join(" -> "));
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::fixtures;

    #[test]
    fn test_all_unserved() {
        let instance = fixtures::two_requests();
        let solution = Solution::with_all_unserved(&instance);
        assert_eq!(solution.unserved.len(), 2);
        assert_eq!(solution.distance(), 0.0);
        assert!(!solution.is_feasible());
        assert!(!solution.is_admissible(&instance));
        assert!(solution.is_consistent(&instance));
    }

    #[test]
    fn test_feasible_when_everything_routed() {
        let instance = fixtures::two_requests();
        let solution = Solution {
            routes: vec![Route::direct(&instance, 0), Route::direct(&instance, 1)],
            unserved: BTreeSet::new(),
        };
        assert!(solution.is_feasible());
        assert!(solution.is_admissible(&instance));
        assert!(solution.is_consistent(&instance));
        assert!((solution.distance() - 80.0).abs() < 1e-9);
        assert_eq!(solution.served_requests(&instance), vec![0, 1]);
        assert_eq!(solution.route_of(&instance, 1), Some(1));
    }

    #[test]
    fn test_remove_request_keeps_empty_route() {
        let instance = fixtures::two_requests();
        let mut solution = Solution {
            routes: vec![Route::direct(&instance, 0), Route::direct(&instance, 1)],
            unserved: BTreeSet::new(),
        };
        assert!(solution.remove_request(&instance, 0));
        assert_eq!(solution.routes.len(), 2);
        assert!(solution.routes[0].is_empty());
        assert!(solution.unserved.contains(&0));
        assert!(solution.is_consistent(&instance));

        solution.prune_empty_routes();
        assert_eq!(solution.routes.len(), 1);
        assert!(!solution.remove_request(&instance, 0));
    }

    #[test]
    fn test_unservable_request_blocks_feasibility_only() {
        let instance = fixtures::with_oversized_request();
        let solution = Solution {
            routes: vec![Route::direct(&instance, 0), Route::direct(&instance, 2)],
            unserved: [1].into_iter().collect(),
        };
        assert!(solution.is_admissible(&instance));
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_inconsistent_solution_detected() {
        let instance = fixtures::two_requests();
        let solution = Solution {
            routes: vec![Route::direct(&instance, 0), Route::direct(&instance, 0)],
            unserved: [1].into_iter().collect(),
        };
        assert!(!solution.is_consistent(&instance));
    }
}
