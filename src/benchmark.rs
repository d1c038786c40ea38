//! Benchmarking and reporting module for the PDPTW solver.
//!
//! Provides the feasibility summary printed after a run, and tools for running
//! ALNS with several seeds over a set of instances, collecting statistics and
//! exporting them.

use crate::heuristics::alns::{Alns, AlnsConfig, AlnsResult, IterationRecord};
use crate::instance::PDPTWInstance;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// Share of iterations whose candidate was feasible
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeasibilitySummary {
    pub feasible: usize,
    pub total: usize,
    pub percentage: f64,
}

impl FeasibilitySummary {
    pub fn from_log(log: &[IterationRecord]) -> Self {
        let total = log.len();
        let feasible = log.iter().filter(|r| r.feasible).count();
        let percentage = if total == 0 {
            0.0
        } else {
            feasible as f64 / total as f64 * 100.0
        };
        FeasibilitySummary {
            feasible,
            total,
            percentage,
        }
    }
}

impl std::fmt::Display for FeasibilitySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Feasible candidates: {}/{} ({:.2}%)",
            self.feasible, self.total, self.percentage
        )
    }
}

/// Result of one ALNS run on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Instance name
    pub instance: String,
    pub seed: u64,
    /// Number of requests
    pub requests: usize,
    /// Requests no vehicle can serve
    pub unservable: usize,
    pub initial_distance: f64,
    pub best_distance: f64,
    /// Improvement of best over initial, in percent
    pub improvement: f64,
    pub vehicles: usize,
    /// Best solution serves every request
    pub feasible: bool,
    /// Percentage of feasible candidates over the run
    pub feasible_candidates: f64,
    pub iterations: usize,
    /// Computation time in seconds
    pub time: f64,
    /// RFC 3339 time at which the run finished
    pub timestamp: String,
}

impl RunResult {
    pub fn from_alns(instance: &PDPTWInstance, seed: u64, result: &AlnsResult) -> Self {
        let best_distance = result.best.distance();
        let improvement = if result.initial_distance > 0.0 {
            (result.initial_distance - best_distance) / result.initial_distance * 100.0
        } else {
            0.0
        };

        RunResult {
            instance: instance.name.clone(),
            seed,
            requests: instance.num_requests(),
            unservable: instance.unservable_requests().len(),
            initial_distance: result.initial_distance,
            best_distance,
            improvement,
            vehicles: result.best.num_vehicles(),
            feasible: result.best.is_feasible(),
            feasible_candidates: FeasibilitySummary::from_log(&result.log).percentage,
            iterations: result.iterations,
            time: result.elapsed.as_secs_f64(),
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Aggregated statistics over the runs of one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    pub instance: String,
    pub runs: usize,
    /// Runs whose best solution serves every request
    pub num_feasible: usize,
    pub avg_distance: f64,
    pub best_distance: f64,
    pub worst_distance: f64,
    /// Sample standard deviation (0 for a single run)
    pub std_distance: f64,
    pub avg_improvement: f64,
    pub avg_time: f64,
    pub total_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of seeds per instance
    pub num_runs: usize,
    /// Seed of the first run; run i uses `first_seed + i`
    pub first_seed: u64,
    /// Search parameters shared by every run
    pub alns: AlnsConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            first_seed: 1,
            alns: AlnsConfig::default(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    /// Run every seed on one instance
    pub fn run_instance(&mut self, instance: &PDPTWInstance) {
        log::info!("Running benchmark on instance: {}", instance.name);

        for run in 0..self.config.num_runs {
            let seed = self.config.first_seed + run as u64;
            let config = self.config.alns.clone().with_seed(seed).fit_removal_range(instance);

            match Alns::new(instance, config) {
                Ok(alns) => {
                    let result = alns.run();
                    self.results.push(RunResult::from_alns(instance, seed, &result));
                }
                Err(e) => {
                    log::error!("{} (seed {}): {}", instance.name, seed, e);
                }
            }
        }
    }

    pub fn run_on_instances(&mut self, instances: &[PDPTWInstance]) {
        for instance in instances {
            self.run_instance(instance);
        }
    }

    /// Compute statistics for each instance
    pub fn compute_statistics(&self) -> Vec<RunStatistics> {
        let mut by_instance: BTreeMap<&str, Vec<&RunResult>> = BTreeMap::new();
        for result in &self.results {
            by_instance.entry(result.instance.as_str()).or_default().push(result);
        }

        by_instance
            .into_iter()
            .map(|(instance, runs)| {
                let distances: Vec<f64> = runs.iter().map(|r| r.best_distance).collect();
                let times: Vec<f64> = runs.iter().map(|r| r.time).collect();
                let improvements: Vec<f64> = runs.iter().map(|r| r.improvement).collect();

                let std_distance = Statistics::std_dev(distances.iter());

                RunStatistics {
                    instance: instance.to_string(),
                    runs: runs.len(),
                    num_feasible: runs.iter().filter(|r| r.feasible).count(),
                    avg_distance: Statistics::mean(distances.iter()),
                    best_distance: distances.iter().cloned().fold(f64::INFINITY, f64::min),
                    worst_distance: distances.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    std_distance: if std_distance.is_nan() { 0.0 } else { std_distance },
                    avg_improvement: Statistics::mean(improvements.iter()),
                    avg_time: Statistics::mean(times.iter()),
                    total_time: times.iter().sum(),
                }
            })
            .collect()
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       PDPTW ALNS Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        report.push_str(&format!(
            "Runs per instance: {}, iterations per run: {}\n\n",
            self.config.num_runs, self.config.alns.iterations
        ));

        report.push_str("-".repeat(96).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>10} {:>12} {:>12} {:>12} {:>10} {:>10}\n",
            "Instance", "Feasible", "Avg Dist", "Best Dist", "Std Dev", "Impr %", "Avg Time"
        ));
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            report.push_str(&format!(
                "{:<20} {:>10} {:>12.2} {:>12.2} {:>12.2} {:>10.2} {:>10.4}\n",
                stat.instance,
                format!("{}/{}", stat.num_feasible, stat.runs),
                stat.avg_distance,
                stat.best_distance,
                stat.std_distance,
                stat.avg_improvement,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(96).as_str());
        report.push('\n');
        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }
}

/// Load every instance file (`.txt` or `.json`) of a directory, sorted by name.
/// Files that fail to load are logged and skipped.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<PDPTWInstance>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("json"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut instances = Vec::with_capacity(paths.len());
    for path in paths {
        match PDPTWInstance::from_file(&path) {
            Ok(instance) => instances.push(instance),
            Err(e) => log::error!("skipping {}: {}", path.display(), e),
        }
    }

    Ok(instances)
}
