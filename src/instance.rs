//! Module for parsing and representing PDPTW instances.
//!
//! This module handles the location-list format used for the Pickup and Delivery
//! Problem with Time Windows: one depot, customers paired as pickup/delivery
//! requests through a partner column, and a block of vehicle parameters.
//! Instances can also be described as JSON or assembled with [`InstanceBuilder`].

use crate::error::InstanceError;
use crate::route::Route;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Node id of the depot. The depot is always the first node.
pub const DEPOT: usize = 0;

/// Role of a node in the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Depot,
    Pickup,
    Delivery,
}

/// Represents a node (depot, pickup or delivery location) in the instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier, equal to its index in `PDPTWInstance::nodes`
    pub id: usize,
    /// Identifier used in the source file (e.g. `C12`)
    pub label: String,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Signed demand: positive = pickup, negative = delivery, 0 = depot
    pub demand: i32,
    /// Earliest service start
    pub ready_time: f64,
    /// Latest arrival
    pub due_time: f64,
    /// Service duration
    pub service_time: f64,
    pub role: NodeRole,
    /// Paired node for pickups and deliveries
    pub partner: Option<usize>,
    /// Owning request for pickups and deliveries
    pub request: Option<usize>,
}

impl Node {
    pub fn is_pickup(&self) -> bool {
        self.role == NodeRole::Pickup
    }

    pub fn is_delivery(&self) -> bool {
        self.role == NodeRole::Delivery
    }

    pub fn is_depot(&self) -> bool {
        self.role == NodeRole::Depot
    }

    /// Width of the time window (latest - earliest)
    pub fn window_width(&self) -> f64 {
        self.due_time - self.ready_time
    }

    /// No latest time was given for this node
    pub fn has_open_window(&self) -> bool {
        self.due_time >= f64::MAX
    }
}

/// A pickup/delivery pair that must be served by the same vehicle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: usize,
    pub pickup: usize,
    pub delivery: usize,
    /// Quantity loaded at the pickup and unloaded at the delivery
    pub demand: i32,
}

/// Metric used to fill the distance matrix. Travel time equals distance.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    pub fn between(&self, a: (f64, f64), b: (f64, f64)) -> f64 {
        let dx = a.0 - b.0;
        let dy = a.1 - b.1;
        match self {
            DistanceMetric::Euclidean => (dx * dx + dy * dy).sqrt(),
            DistanceMetric::Manhattan => dx.abs() + dy.abs(),
        }
    }
}

/// Why a request can never be part of a feasible route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnservableReason {
    /// Demand exceeds the vehicle capacity
    ExceedsCapacity,
    /// Pickup or delivery window has earliest > latest
    InvalidTimeWindow,
    /// Even the direct route depot -> pickup -> delivery -> depot misses a window
    Unreachable,
}

impl std::fmt::Display for UnservableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnservableReason::ExceedsCapacity => write!(f, "demand exceeds vehicle capacity"),
            UnservableReason::InvalidTimeWindow => write!(f, "time window has earliest > latest"),
            UnservableReason::Unreachable => write!(f, "direct route violates a time window"),
        }
    }
}

/// A location with its time window, as given in an instance description
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub ready_time: f64,
    #[serde(default = "Site::open_due_time")]
    pub due_time: f64,
    #[serde(default)]
    pub service_time: f64,
}

impl Site {
    /// A site with an unbounded time window and no service time
    pub fn new(x: f64, y: f64) -> Self {
        Site {
            x,
            y,
            ready_time: 0.0,
            due_time: Self::open_due_time(),
            service_time: 0.0,
        }
    }

    pub fn with_window(mut self, ready_time: f64, due_time: f64) -> Self {
        self.ready_time = ready_time;
        self.due_time = due_time;
        self
    }

    pub fn with_service(mut self, service_time: f64) -> Self {
        self.service_time = service_time;
        self
    }

    fn open_due_time() -> f64 {
        f64::MAX
    }
}

/// JSON description of a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub pickup: Site,
    pub delivery: Site,
    pub demand: i32,
}

/// JSON description of a whole instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub capacity: i32,
    #[serde(default)]
    pub metric: DistanceMetric,
    pub depot: Site,
    pub requests: Vec<RequestSpec>,
}

/// Incrementally assembles a [`PDPTWInstance`]
#[derive(Debug, Clone)]
pub struct InstanceBuilder {
    name: String,
    capacity: i32,
    metric: DistanceMetric,
    depot: Option<(String, Site)>,
    requests: Vec<PendingRequest>,
    duplicate_depot: bool,
}

#[derive(Debug, Clone)]
struct PendingRequest {
    pickup_label: String,
    pickup: Site,
    delivery_label: String,
    delivery: Site,
    demand: i32,
}

impl InstanceBuilder {
    pub fn new(name: &str, capacity: i32) -> Self {
        InstanceBuilder {
            name: name.to_string(),
            capacity,
            metric: DistanceMetric::Euclidean,
            depot: None,
            requests: Vec::new(),
            duplicate_depot: false,
        }
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn depot(self, site: Site) -> Self {
        self.labeled_depot("D0", site)
    }

    pub fn labeled_depot(mut self, label: &str, site: Site) -> Self {
        if self.depot.is_some() {
            self.duplicate_depot = true;
        }
        self.depot = Some((label.to_string(), site));
        self
    }

    pub fn request(self, pickup: Site, delivery: Site, demand: i32) -> Self {
        let n = self.requests.len();
        self.labeled_request(
            &format!("P{}", n),
            pickup,
            &format!("Q{}", n),
            delivery,
            demand,
        )
    }

    pub fn labeled_request(
        mut self,
        pickup_label: &str,
        pickup: Site,
        delivery_label: &str,
        delivery: Site,
        demand: i32,
    ) -> Self {
        self.requests.push(PendingRequest {
            pickup_label: pickup_label.to_string(),
            pickup,
            delivery_label: delivery_label.to_string(),
            delivery,
            demand,
        });
        self
    }

    pub fn build(self) -> Result<PDPTWInstance, InstanceError> {
        if self.capacity <= 0 {
            return Err(InstanceError::InvalidCapacity(self.capacity));
        }
        if self.duplicate_depot {
            return Err(InstanceError::DuplicateDepot);
        }
        let (depot_label, depot) = self.depot.ok_or(InstanceError::MissingDepot)?;
        if depot.ready_time > depot.due_time {
            return Err(InstanceError::InvalidDepotWindow {
                earliest: depot.ready_time,
                latest: depot.due_time,
            });
        }
        check_finite(&depot_label, &depot)?;

        let mut nodes = Vec::with_capacity(1 + 2 * self.requests.len());
        nodes.push(Node {
            id: DEPOT,
            label: depot_label,
            x: depot.x,
            y: depot.y,
            demand: 0,
            ready_time: depot.ready_time,
            due_time: depot.due_time,
            service_time: depot.service_time,
            role: NodeRole::Depot,
            partner: None,
            request: None,
        });

        let mut requests = Vec::with_capacity(self.requests.len());
        for (id, pending) in self.requests.into_iter().enumerate() {
            if pending.demand <= 0 {
                return Err(InstanceError::InvalidDemand {
                    request: id,
                    demand: pending.demand,
                });
            }
            check_finite(&pending.pickup_label, &pending.pickup)?;
            check_finite(&pending.delivery_label, &pending.delivery)?;

            let pickup = nodes.len();
            let delivery = pickup + 1;
            nodes.push(site_node(
                pickup,
                pending.pickup_label,
                &pending.pickup,
                pending.demand,
                NodeRole::Pickup,
                delivery,
                id,
            ));
            nodes.push(site_node(
                delivery,
                pending.delivery_label,
                &pending.delivery,
                -pending.demand,
                NodeRole::Delivery,
                pickup,
                id,
            ));
            requests.push(Request {
                id,
                pickup,
                delivery,
                demand: pending.demand,
            });
        }

        let distance_matrix = compute_distance_matrix(&nodes, self.metric);
        let (max_pickup_distance, pickup_ready_span) = relatedness_scales(&nodes, &requests, &distance_matrix);

        let mut instance = PDPTWInstance {
            name: self.name,
            capacity: self.capacity,
            metric: self.metric,
            nodes,
            requests,
            distance_matrix,
            servable: Vec::new(),
            unservable: Vec::new(),
            max_pickup_distance,
            pickup_ready_span,
        };
        instance.classify_requests();
        Ok(instance)
    }
}

fn check_finite(label: &str, site: &Site) -> Result<(), InstanceError> {
    if site.x.is_finite() && site.y.is_finite() {
        Ok(())
    } else {
        Err(InstanceError::NonFiniteCoordinate(label.to_string()))
    }
}

fn site_node(
    id: usize,
    label: String,
    site: &Site,
    demand: i32,
    role: NodeRole,
    partner: usize,
    request: usize,
) -> Node {
    Node {
        id,
        label,
        x: site.x,
        y: site.y,
        demand,
        ready_time: site.ready_time,
        due_time: site.due_time,
        service_time: site.service_time,
        role,
        partner: Some(partner),
        request: Some(request),
    }
}

/// Compute the full distance matrix for a metric
fn compute_distance_matrix(nodes: &[Node], metric: DistanceMetric) -> Vec<Vec<f64>> {
    let n = nodes.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..n {
            if i != j {
                matrix[i][j] = metric.between((nodes[i].x, nodes[i].y), (nodes[j].x, nodes[j].y));
            }
        }
    }

    matrix
}

/// Normalisation constants for Shaw relatedness, never zero
fn relatedness_scales(nodes: &[Node], requests: &[Request], matrix: &[Vec<f64>]) -> (f64, f64) {
    let mut max_distance: f64 = 0.0;
    let mut min_ready = f64::INFINITY;
    let mut max_ready = f64::NEG_INFINITY;

    for a in requests {
        min_ready = min_ready.min(nodes[a.pickup].ready_time);
        max_ready = max_ready.max(nodes[a.pickup].ready_time);
        for b in requests {
            max_distance = max_distance.max(matrix[a.pickup][b.pickup]);
        }
    }

    let span = if max_ready > min_ready { max_ready - min_ready } else { 1.0 };
    let distance = if max_distance > 0.0 { max_distance } else { 1.0 };
    (distance, span)
}

/// Represents a complete PDPTW instance
#[derive(Debug, Clone)]
pub struct PDPTWInstance {
    /// Name of the instance
    pub name: String,
    /// Capacity shared by every vehicle
    pub capacity: i32,
    pub metric: DistanceMetric,
    /// All nodes, depot first, then pickup/delivery pairs
    pub nodes: Vec<Node>,
    /// All requests, indexed by id
    pub requests: Vec<Request>,
    distance_matrix: Vec<Vec<f64>>,
    servable: Vec<bool>,
    unservable: Vec<(usize, UnservableReason)>,
    max_pickup_distance: f64,
    pickup_ready_span: f64,
}

impl PDPTWInstance {
    pub fn builder(name: &str, capacity: i32) -> InstanceBuilder {
        InstanceBuilder::new(name, capacity)
    }

    /// Load an instance, choosing the format from the file extension
    /// (`.json` for [`InstanceSpec`], anything else for the text format).
    /// JSON files keep their own `metric`; text files use Euclidean distances.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InstanceError> {
        Self::load(path.as_ref(), None)
    }

    /// Like [`PDPTWInstance::from_file`], but `metric` replaces whatever the
    /// file declares
    pub fn from_file_with_metric<P: AsRef<Path>>(
        path: P,
        metric: DistanceMetric,
    ) -> Result<Self, InstanceError> {
        Self::load(path.as_ref(), Some(metric))
    }

    fn load(path: &Path, metric: Option<DistanceMetric>) -> Result<Self, InstanceError> {
        let content = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "instance".to_string());

        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let mut spec: InstanceSpec = serde_json::from_str(&content)?;
            if let Some(metric) = metric {
                if metric != spec.metric {
                    log::info!("{}: metric {:?} overrides {:?} from the file", spec.name, metric, spec.metric);
                }
                spec.metric = metric;
            }
            Self::from_spec(spec)
        } else {
            Self::parse_text(&name, &content, metric.unwrap_or_default())
        }
    }

    pub fn from_spec(spec: InstanceSpec) -> Result<Self, InstanceError> {
        let mut builder = InstanceBuilder::new(&spec.name, spec.capacity)
            .metric(spec.metric)
            .depot(spec.depot);
        for request in spec.requests {
            builder = builder.request(request.pickup, request.delivery, request.demand);
        }
        builder.build()
    }

    /// Parse the location-list text format.
    ///
    /// Location lines read `StringID Type x y demand ReadyTime DueDate ServiceTime PartnerID`.
    /// The vehicle load capacity is the `/value/` on the line mentioning "load capacity".
    pub fn parse_text(name: &str, content: &str, metric: DistanceMetric) -> Result<Self, InstanceError> {
        let mut depot: Option<(String, Site)> = None;
        let mut duplicate_depot = false;
        let mut capacity: Option<i32> = None;
        let mut unmatched: HashMap<String, (Site, i32, bool)> = HashMap::new();
        let mut pairs: Vec<PendingRequest> = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if line.to_ascii_lowercase().contains("load capacity") {
                capacity = Some(parse_slashed_value(line, line_no)?);
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 9 || parts[0].eq_ignore_ascii_case("StringID") {
                continue;
            }

            let label = parts[0];
            if label.starts_with('S') {
                log::debug!("skipping recharge station {}", label);
                continue;
            }
            if !label.starts_with('D') && !label.starts_with('C') {
                continue;
            }

            let site = Site {
                x: parse_field(parts[2], "x coordinate", line_no)?,
                y: parse_field(parts[3], "y coordinate", line_no)?,
                ready_time: parse_field(parts[5], "ready time", line_no)?,
                due_time: parse_field(parts[6], "due date", line_no)?,
                service_time: parse_field(parts[7], "service time", line_no)?,
            };

            if label.starts_with('D') {
                if depot.is_some() {
                    duplicate_depot = true;
                }
                depot = Some((label.to_string(), site));
                continue;
            }

            let demand = parse_field(parts[4], "demand", line_no)?.round() as i32;
            let is_pickup = match parts[1] {
                "cp" => true,
                "cd" => false,
                other => {
                    return Err(InstanceError::Parse {
                        line: line_no,
                        message: format!("unknown location type '{}'", other),
                    })
                }
            };

            let partner = parts[8];
            match unmatched.remove(partner) {
                Some((partner_site, partner_demand, partner_is_pickup)) => {
                    if partner_is_pickup == is_pickup {
                        return Err(InstanceError::Parse {
                            line: line_no,
                            message: format!("{} and {} have the same type", label, partner),
                        });
                    }
                    let (pickup_label, pickup, pickup_demand, delivery_label, delivery) = if is_pickup {
                        (label, site, demand, partner, partner_site)
                    } else {
                        (partner, partner_site, partner_demand, label, site)
                    };
                    pairs.push(PendingRequest {
                        pickup_label: pickup_label.to_string(),
                        pickup,
                        delivery_label: delivery_label.to_string(),
                        delivery,
                        demand: pickup_demand.abs(),
                    });
                }
                None => {
                    unmatched.insert(label.to_string(), (site, demand, is_pickup));
                }
            }
        }

        if !unmatched.is_empty() {
            let mut labels: Vec<&String> = unmatched.keys().collect();
            labels.sort();
            return Err(InstanceError::UnmatchedPartner(labels[0].clone()));
        }

        let capacity = capacity.ok_or(InstanceError::MissingCapacity)?;
        let (depot_label, depot_site) = depot.ok_or(InstanceError::MissingDepot)?;

        let mut builder = InstanceBuilder::new(name, capacity)
            .metric(metric)
            .labeled_depot(&depot_label, depot_site);
        builder.duplicate_depot = duplicate_depot;
        for pair in pairs {
            builder = builder.labeled_request(
                &pair.pickup_label,
                pair.pickup,
                &pair.delivery_label,
                pair.delivery,
                pair.demand,
            );
        }
        builder.build()
    }

    /// Flag requests that no route can ever serve
    fn classify_requests(&mut self) {
        let mut servable = vec![true; self.requests.len()];
        let mut unservable = Vec::new();

        for request in &self.requests {
            let pickup = &self.nodes[request.pickup];
            let delivery = &self.nodes[request.delivery];

            let reason = if request.demand > self.capacity {
                Some(UnservableReason::ExceedsCapacity)
            } else if pickup.ready_time > pickup.due_time || delivery.ready_time > delivery.due_time {
                Some(UnservableReason::InvalidTimeWindow)
            } else if !Route::direct(self, request.id).is_feasible() {
                Some(UnservableReason::Unreachable)
            } else {
                None
            };

            if let Some(reason) = reason {
                log::warn!(
                    "request {} ({} -> {}) is unservable: {}",
                    request.id,
                    pickup.label,
                    delivery.label,
                    reason
                );
                servable[request.id] = false;
                unservable.push((request.id, reason));
            }
        }

        self.servable = servable;
        self.unservable = unservable;
    }

    /// Get the distance (and travel time) between two nodes
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance_matrix[i][j]
    }

    pub fn depot(&self) -> &Node {
        &self.nodes[DEPOT]
    }

    #[inline]
    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn request(&self, id: usize) -> &Request {
        &self.requests[id]
    }

    pub fn num_requests(&self) -> usize {
        self.requests.len()
    }

    /// Requests detected as unservable at construction, with the reason
    pub fn unservable_requests(&self) -> &[(usize, UnservableReason)] {
        &self.unservable
    }

    pub fn is_servable(&self, request: usize) -> bool {
        self.servable[request]
    }

    /// Ids of all servable requests, ascending
    pub fn servable_requests(&self) -> Vec<usize> {
        (0..self.requests.len()).filter(|&r| self.servable[r]).collect()
    }

    /// Largest distance between two pickup nodes (1.0 if all coincide)
    pub fn max_pickup_distance(&self) -> f64 {
        self.max_pickup_distance
    }

    /// Spread of pickup ready times (1.0 if all equal)
    pub fn pickup_ready_span(&self) -> f64 {
        self.pickup_ready_span
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.nodes.len() {
            for j in i + 1..self.nodes.len() {
                distances.push(self.distance(i, j));
            }
        }
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<f64>() / distances.len() as f64
        };
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        let total_demand: i32 = self.requests.iter().map(|r| r.demand).sum();
        // a pickup is bounded by its own window or, failing that, the depot's
        let depot = self.depot();
        let bounded: Vec<f64> = self
            .requests
            .iter()
            .map(|r| &self.nodes[r.pickup])
            .filter(|p| !(p.has_open_window() && depot.has_open_window()))
            .map(|p| p.due_time.min(depot.due_time) - p.ready_time)
            .collect();
        let avg_pickup_window = if bounded.is_empty() {
            None
        } else {
            Some(bounded.iter().sum::<f64>() / bounded.len() as f64)
        };

        InstanceStatistics {
            name: self.name.clone(),
            num_nodes: self.nodes.len(),
            num_requests: self.requests.len(),
            num_unservable: self.unservable.len(),
            capacity: self.capacity,
            total_demand,
            horizon: (!depot.has_open_window()).then_some(depot.due_time),
            avg_pickup_window,
            avg_distance,
            max_distance,
        }
    }
}

fn parse_field(token: &str, what: &str, line: usize) -> Result<f64, InstanceError> {
    token.parse::<f64>().map_err(|_| InstanceError::Parse {
        line,
        message: format!("invalid {} '{}'", what, token),
    })
}

/// Extract the value written between slashes, e.g. `C Vehicle load capacity /200.0/`
fn parse_slashed_value(line: &str, line_no: usize) -> Result<i32, InstanceError> {
    let value = line
        .split('/')
        .nth(1)
        .ok_or_else(|| InstanceError::Parse {
            line: line_no,
            message: "capacity value must be written as /value/".to_string(),
        })?;
    Ok(parse_field(value.trim(), "capacity", line_no)?.round() as i32)
}

/// Statistics about a PDPTW instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_nodes: usize,
    pub num_requests: usize,
    pub num_unservable: usize,
    pub capacity: i32,
    pub total_demand: i32,
    /// Depot closing time, `None` when the depot window is open
    pub horizon: Option<f64>,
    /// Mean width of the bounded pickup windows, `None` when every one is open
    pub avg_pickup_window: Option<f64>,
    pub avg_distance: f64,
    pub max_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {} (1 depot + {} requests)", self.num_nodes, self.num_requests)?;
        writeln!(f, "  Unservable requests: {}", self.num_unservable)?;
        writeln!(f, "  Capacity: {}", self.capacity)?;
        writeln!(f, "  Total demand: {}", self.total_demand)?;
        match self.horizon {
            Some(h) => writeln!(f, "  Horizon: {:.2}", h)?,
            None => writeln!(f, "  Horizon: open")?,
        }
        match self.avg_pickup_window {
            Some(w) => writeln!(f, "  Avg pickup window: {:.2}", w)?,
            None => writeln!(f, "  Avg pickup window: open")?,
        }
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
StringID   Type       x          y          demand     ReadyTime  DueDate    ServiceTime PartnerID
D0         d          40.0       50.0       0.0        0.0        1236.0     0.0        0
C20        cd         30.0       50.0       -10.0      10.0       1127.0     90.0       C24
C24        cp         25.0       50.0       10.0       0.0        1131.0     90.0       C20
S1         f          38.0       48.0       0.0        0.0        1236.0     0.0        0
C30        cp         20.0       55.0       20.0       500.0      1000.0     90.0       C31
C31        cd         25.0       60.0       -20.0      0.0        1200.0     90.0       C30

Q Vehicle fuel tank capacity /77.75/
C Vehicle load capacity /200.0/
r fuel consumption rate /1.0/
g inverse refueling rate /3.47/
v average Velocity /1.0/
";

    #[test]
    fn test_parse_text_pairs_requests() {
        let instance = PDPTWInstance::parse_text("sample", SAMPLE, DistanceMetric::Euclidean).unwrap();

        assert_eq!(instance.capacity, 200);
        assert_eq!(instance.num_requests(), 2);
        assert_eq!(instance.nodes.len(), 5);
        assert_eq!(instance.depot().label, "D0");
        assert!((instance.depot().due_time - 1236.0).abs() < 1e-9);

        // C20 appears first but is a delivery: the request is completed by C24
        let first = instance.request(0);
        assert_eq!(instance.node(first.pickup).label, "C24");
        assert_eq!(instance.node(first.delivery).label, "C20");
        assert_eq!(first.demand, 10);
        assert_eq!(instance.node(first.delivery).demand, -10);

        for request in &instance.requests {
            assert_eq!(instance.node(request.pickup).request, Some(request.id));
            assert_eq!(instance.node(request.delivery).request, Some(request.id));
            assert_eq!(instance.node(request.pickup).partner, Some(request.delivery));
        }
        assert!(instance.unservable_requests().is_empty());
    }

    #[test]
    fn test_parse_text_rejects_unmatched_partner() {
        let broken = SAMPLE.replace("90.0       C30", "90.0       C99");
        let result = PDPTWInstance::parse_text("broken", &broken, DistanceMetric::Euclidean);
        assert!(matches!(result, Err(InstanceError::UnmatchedPartner(_))));
    }

    #[test]
    fn test_parse_text_requires_capacity() {
        let without: String = SAMPLE
            .lines()
            .filter(|l| !l.contains("load capacity"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = PDPTWInstance::parse_text("nocap", &without, DistanceMetric::Euclidean);
        assert!(matches!(result, Err(InstanceError::MissingCapacity)));
    }

    #[test]
    fn test_distance_calculation() {
        let instance = PDPTWInstance::builder("d", 10)
            .depot(Site::new(0.0, 0.0))
            .request(Site::new(3.0, 4.0), Site::new(6.0, 8.0), 1)
            .build()
            .unwrap();

        assert!((instance.distance(0, 1) - 5.0).abs() < 1e-10);
        assert!((instance.distance(1, 0) - 5.0).abs() < 1e-10);
        assert_eq!(instance.distance(2, 2), 0.0);

        let manhattan = PDPTWInstance::builder("m", 10)
            .metric(DistanceMetric::Manhattan)
            .depot(Site::new(0.0, 0.0))
            .request(Site::new(3.0, 4.0), Site::new(6.0, 8.0), 1)
            .build()
            .unwrap();
        assert!((manhattan.distance(0, 1) - 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_unservable_requests_detected() {
        let instance = fixtures::with_oversized_request();
        assert_eq!(instance.unservable_requests(), &[(1, UnservableReason::ExceedsCapacity)]);
        assert!(!instance.is_servable(1));
        assert_eq!(instance.servable_requests(), vec![0, 2]);

        let windows = PDPTWInstance::builder("tw", 10)
            .depot(Site::new(0.0, 0.0).with_window(0.0, 100.0))
            .request(Site::new(1.0, 0.0).with_window(50.0, 10.0), Site::new(2.0, 0.0), 1)
            .request(Site::new(90.0, 0.0).with_window(0.0, 95.0), Site::new(95.0, 0.0), 1)
            .build()
            .unwrap();
        assert_eq!(
            windows.unservable_requests(),
            &[(0, UnservableReason::InvalidTimeWindow), (1, UnservableReason::Unreachable)]
        );
    }

    #[test]
    fn test_builder_errors() {
        assert!(matches!(
            PDPTWInstance::builder("c", 0).depot(Site::new(0.0, 0.0)).build(),
            Err(InstanceError::InvalidCapacity(0))
        ));
        assert!(matches!(
            PDPTWInstance::builder("nodepot", 5).build(),
            Err(InstanceError::MissingDepot)
        ));
        assert!(matches!(
            PDPTWInstance::builder("demand", 5)
                .depot(Site::new(0.0, 0.0))
                .request(Site::new(1.0, 0.0), Site::new(2.0, 0.0), 0)
                .build(),
            Err(InstanceError::InvalidDemand { request: 0, demand: 0 })
        ));
    }

    #[test]
    fn test_json_spec_round_trip() {
        let spec = InstanceSpec {
            name: "json".to_string(),
            capacity: 10,
            metric: DistanceMetric::Euclidean,
            depot: Site::new(0.0, 0.0).with_window(0.0, 500.0),
            requests: vec![RequestSpec {
                pickup: Site::new(1.0, 1.0),
                delivery: Site::new(2.0, 2.0),
                demand: 3,
            }],
        };
        let text = serde_json::to_string(&spec).unwrap();
        let parsed: InstanceSpec = serde_json::from_str(&text).unwrap();
        let instance = PDPTWInstance::from_spec(parsed).unwrap();
        assert_eq!(instance.num_requests(), 1);
        assert_eq!(instance.request(0).demand, 3);
    }

    #[test]
    fn test_json_file_keeps_its_metric() {
        let json = r#"{
            "name": "grid",
            "capacity": 10,
            "metric": "manhattan",
            "depot": { "x": 0.0, "y": 0.0 },
            "requests": [
                { "pickup": { "x": 3.0, "y": 4.0 }, "delivery": { "x": 6.0, "y": 8.0 }, "demand": 2 }
            ]
        }"#;
        let path = std::env::temp_dir().join(format!("pdptw-metric-{}.json", std::process::id()));
        std::fs::write(&path, json).unwrap();

        let from_file = PDPTWInstance::from_file(&path).unwrap();
        let overridden = PDPTWInstance::from_file_with_metric(&path, DistanceMetric::Euclidean).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(from_file.metric, DistanceMetric::Manhattan);
        assert!((from_file.distance(0, 1) - 7.0).abs() < 1e-10);
        assert_eq!(overridden.metric, DistanceMetric::Euclidean);
        assert!((overridden.distance(0, 1) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_statistics() {
        let stats = fixtures::two_requests().statistics();
        assert_eq!(stats.num_nodes, 5);
        assert_eq!(stats.num_requests, 2);
        assert_eq!(stats.total_demand, 9);
        assert_eq!(stats.horizon, Some(1000.0));
        assert_eq!(stats.avg_pickup_window, Some(1000.0));
        assert!(format!("{}", stats).contains("two-requests"));
    }

    #[test]
    fn test_statistics_with_open_windows() {
        let open = PDPTWInstance::builder("open", 10)
            .depot(Site::new(0.0, 0.0))
            .request(Site::new(3.0, 4.0), Site::new(6.0, 8.0), 1)
            .build()
            .unwrap();
        let stats = open.statistics();
        assert_eq!(stats.horizon, None);
        assert_eq!(stats.avg_pickup_window, None);
        let text = format!("{}", stats);
        assert!(text.contains("Horizon: open"));
        assert!(text.contains("Avg pickup window: open"));
        assert!(!text.contains("inf"));

        // an open pickup window is bounded by the depot's
        let depot_bounded = PDPTWInstance::builder("depot-bounded", 10)
            .depot(Site::new(0.0, 0.0).with_window(0.0, 300.0))
            .request(Site::new(3.0, 4.0).with_window(100.0, f64::MAX), Site::new(6.0, 8.0), 1)
            .build()
            .unwrap();
        assert_eq!(depot_bounded.statistics().avg_pickup_window, Some(200.0));
    }
}
