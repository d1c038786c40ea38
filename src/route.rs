//! Single-vehicle itinerary with its derived schedule.
//!
//! A route always starts and ends at the depot. Alongside the node sequence it
//! caches, for every position, the arrival time, waiting time, departure time and
//! the load carried after the visit, so insertion candidates can be checked from
//! the insertion point onwards without replaying the untouched prefix.

use crate::instance::{PDPTWInstance, DEPOT};
use serde::{Deserialize, Serialize};

/// Slack used when comparing times against a window's latest value
const TIME_EPS: f64 = 1e-9;

/// Derived state of one position in a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisitState {
    pub arrival: f64,
    pub wait: f64,
    pub departure: f64,
    /// Load on board after the visit
    pub load: i32,
}

/// Where to place a request in a route and what it costs.
///
/// Positions index the sequence *after* insertion: the pickup ends up at
/// `pickup_pos`, the delivery at `delivery_pos`, with
/// `1 <= pickup_pos < delivery_pos <= nodes.len()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insertion {
    pub pickup_pos: usize,
    pub delivery_pos: usize,
    /// Extra distance caused by the insertion
    pub delta: f64,
}

/// Ordered itinerary for one vehicle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Node ids, depot at both ends
    pub nodes: Vec<usize>,
    /// One state per entry of `nodes`
    pub schedule: Vec<VisitState>,
    /// Total distance of the closed tour
    pub distance: f64,
    feasible: bool,
}

impl Route {
    /// Depot -> depot
    pub fn empty(instance: &PDPTWInstance) -> Self {
        Self::from_nodes(instance, vec![DEPOT, DEPOT])
    }

    /// Depot -> pickup -> delivery -> depot for one request
    pub fn direct(instance: &PDPTWInstance, request: usize) -> Self {
        let req = instance.request(request);
        Self::from_nodes(instance, vec![DEPOT, req.pickup, req.delivery, DEPOT])
    }

    pub fn from_nodes(instance: &PDPTWInstance, nodes: Vec<usize>) -> Self {
        let mut route = Route {
            nodes,
            schedule: Vec::new(),
            distance: 0.0,
            feasible: false,
        };
        route.evaluate(instance);
        route
    }

    /// Recompute schedule, distance and feasibility from the node sequence
    pub fn evaluate(&mut self, instance: &PDPTWInstance) -> bool {
        self.schedule.clear();
        self.distance = 0.0;

        if self.nodes.len() < 2 || self.nodes[0] != DEPOT || self.nodes[self.nodes.len() - 1] != DEPOT {
            self.feasible = false;
            return false;
        }

        let depot = instance.depot();
        let mut feasible = true;
        let mut on_board = vec![false; instance.num_requests()];
        let mut delivered = vec![false; instance.num_requests()];

        let mut time = depot.ready_time;
        let mut load = 0;
        self.schedule.push(VisitState {
            arrival: time,
            wait: 0.0,
            departure: time,
            load,
        });

        for k in 1..self.nodes.len() {
            let prev = self.nodes[k - 1];
            let id = self.nodes[k];
            let node = instance.node(id);

            let travel = instance.distance(prev, id);
            self.distance += travel;

            let arrival = time + travel;
            if arrival > node.due_time + TIME_EPS {
                feasible = false;
            }
            let start = arrival.max(node.ready_time);
            let wait = start - arrival;
            time = start + node.service_time;
            load += node.demand;
            if load < 0 || load > instance.capacity {
                feasible = false;
            }

            if let Some(request) = node.request {
                if node.is_pickup() {
                    if on_board[request] || delivered[request] {
                        feasible = false;
                    }
                    on_board[request] = true;
                } else {
                    if !on_board[request] {
                        feasible = false;
                    }
                    on_board[request] = false;
                    delivered[request] = true;
                }
            } else if k != self.nodes.len() - 1 {
                // depot in the middle of a route
                feasible = false;
            }

            self.schedule.push(VisitState {
                arrival,
                wait,
                departure: time,
                load,
            });
        }

        if on_board.iter().any(|&open| open) {
            feasible = false;
        }

        self.feasible = feasible;
        feasible
    }

    /// Feasibility as of the last evaluation
    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    /// True for depot -> depot
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 2
    }

    /// Number of customer visits
    pub fn num_visits(&self) -> usize {
        self.nodes.len().saturating_sub(2)
    }

    /// Requests served by this route, in order of their pickups
    pub fn requests(&self, instance: &PDPTWInstance) -> Vec<usize> {
        self.nodes
            .iter()
            .filter_map(|&id| {
                let node = instance.node(id);
                if node.is_pickup() {
                    node.request
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn contains_request(&self, instance: &PDPTWInstance, request: usize) -> bool {
        let pickup = instance.request(request).pickup;
        self.nodes.contains(&pickup)
    }

    /// Cheapest feasible placement of `request`, or `None` if it fits nowhere.
    ///
    /// Every pair of slots with the pickup before the delivery is tried. Ties keep
    /// the first pair found (smallest pickup position, then delivery position).
    pub fn cheapest_insertion(&self, instance: &PDPTWInstance, request: usize) -> Option<Insertion> {
        let req = instance.request(request);
        if req.demand > instance.capacity || !self.feasible {
            return None;
        }

        let n = self.nodes.len();
        let (p_node, d_node) = (req.pickup, req.delivery);
        let mut best: Option<Insertion> = None;

        for p in 1..n {
            let before = self.nodes[p - 1];
            let after = self.nodes[p];
            let pickup_delta =
                instance.distance(before, p_node) + instance.distance(p_node, after) - instance.distance(before, after);

            for d in (p + 1)..=n {
                let delta = if d == p + 1 {
                    instance.distance(before, p_node)
                        + instance.distance(p_node, d_node)
                        + instance.distance(d_node, after)
                        - instance.distance(before, after)
                } else {
                    let d_before = self.nodes[d - 2];
                    let d_after = self.nodes[d - 1];
                    pickup_delta + instance.distance(d_before, d_node) + instance.distance(d_node, d_after)
                        - instance.distance(d_before, d_after)
                };

                if let Some(current) = &best {
                    if delta >= current.delta {
                        continue;
                    }
                }

                if self.placement_feasible(instance, p_node, d_node, p, d) {
                    best = Some(Insertion {
                        pickup_pos: p,
                        delivery_pos: d,
                        delta,
                    });
                }
            }
        }

        best
    }

    /// Simulate the route with the pickup at `p` and the delivery at `d`,
    /// starting from the cached state before position `p`
    fn placement_feasible(&self, instance: &PDPTWInstance, p_node: usize, d_node: usize, p: usize, d: usize) -> bool {
        let last = self.nodes.len() + 1;
        let mut prev = self.nodes[p - 1];
        let mut time = self.schedule[p - 1].departure;
        let mut load = self.schedule[p - 1].load;

        for k in p..=last {
            let (id, original) = if k == p {
                (p_node, None)
            } else if k == d {
                (d_node, None)
            } else {
                let shift = if k > d { 2 } else { 1 };
                (self.nodes[k - shift], Some(k - shift))
            };

            let node = instance.node(id);
            let arrival = time + instance.distance(prev, id);
            if arrival > node.due_time + TIME_EPS {
                return false;
            }
            time = arrival.max(node.ready_time) + node.service_time;
            load += node.demand;
            if load > instance.capacity || load < 0 {
                return false;
            }

            // Past the delivery the load matches the original route again; leaving
            // no later than before means the rest of the route stays on time.
            if let Some(orig) = original {
                if k > d && time <= self.schedule[orig].departure {
                    return true;
                }
            }
            prev = id;
        }

        true
    }

    /// Apply an insertion returned by [`Route::cheapest_insertion`]
    pub fn insert_request(&mut self, instance: &PDPTWInstance, request: usize, insertion: &Insertion) {
        let req = instance.request(request);
        self.nodes.insert(insertion.pickup_pos, req.pickup);
        self.nodes.insert(insertion.delivery_pos, req.delivery);
        self.evaluate(instance);
    }

    /// Remove both nodes of `request`, closing the gaps. Returns false if the
    /// request is not in this route.
    pub fn remove_request(&mut self, instance: &PDPTWInstance, request: usize) -> bool {
        let req = instance.request(request);
        let before = self.nodes.len();
        self.nodes.retain(|&id| id != req.pickup && id != req.delivery);
        if self.nodes.len() == before {
            return false;
        }
        self.evaluate(instance);
        true
    }

    /// Distance saved by removing `request` from this route
    pub fn removal_saving(&self, instance: &PDPTWInstance, request: usize) -> f64 {
        let req = instance.request(request);
        let p = match self.nodes.iter().position(|&id| id == req.pickup) {
            Some(p) => p,
            None => return 0.0,
        };
        let d = match self.nodes.iter().position(|&id| id == req.delivery) {
            Some(d) => d,
            None => return 0.0,
        };
        let (first, second) = if p < d { (p, d) } else { (d, p) };

        let a = self.nodes[first - 1];
        let x = self.nodes[first];
        if second == first + 1 {
            let y = self.nodes[second];
            let b = self.nodes[second + 1];
            instance.distance(a, x) + instance.distance(x, y) + instance.distance(y, b) - instance.distance(a, b)
        } else {
            let b = self.nodes[first + 1];
            let c = self.nodes[second - 1];
            let y = self.nodes[second];
            let e = self.nodes[second + 1];
            instance.distance(a, x) + instance.distance(x, b) - instance.distance(a, b) + instance.distance(c, y)
                + instance.distance(y, e)
                - instance.distance(c, e)
        }
    }
}
