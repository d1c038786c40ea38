//! PDPTW ALNS Solver - Command Line Interface
//!
//! Solves Pickup and Delivery Problems with Time Windows with Adaptive Large
//! Neighborhood Search.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdptw_alns::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig, FeasibilitySummary};
use pdptw_alns::heuristics::alns::{Alns, AlnsConfig};
use pdptw_alns::instance::{DistanceMetric, PDPTWInstance};
use pdptw_alns::visualization::{export_log_csv, Visualizer, WeightFamily};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::error::Error;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pdptw-alns")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "ALNS solver for the Pickup and Delivery Problem with Time Windows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance
    Solve {
        /// Path to the instance file (.txt or .json)
        #[arg(short, long)]
        instance: PathBuf,

        /// JSON file with ALNS parameters; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of iterations
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Temperature multiplier per iteration
        #[arg(long)]
        cooling_rate: Option<f64>,

        /// Weight decay in [0, 1]
        #[arg(long)]
        decay: Option<f64>,

        /// Smallest number of requests removed per iteration
        #[arg(long)]
        min_removal: Option<usize>,

        /// Largest number of requests removed per iteration
        #[arg(long)]
        max_removal: Option<usize>,

        /// k of regret-k insertion
        #[arg(long)]
        regret_k: Option<usize>,

        /// Distance metric (defaults to the one in a JSON file, euclidean otherwise)
        #[arg(long, value_enum)]
        metric: Option<Metric>,

        /// Write the best solution as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the iteration log as CSV
        #[arg(long)]
        log_csv: Option<PathBuf>,

        /// Directory for SVG plots (routes, distance history, operator weights)
        #[arg(long)]
        plots: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run several seeds on every instance of a directory
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Number of runs (seeds) per instance
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Iterations per run
        #[arg(short = 'n', long, default_value = "100")]
        iterations: usize,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Distance metric (defaults to the one in a JSON file, euclidean otherwise)
        #[arg(long, value_enum)]
        metric: Option<Metric>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Metric {
    Euclidean,
    Manhattan,
}

impl From<Metric> for DistanceMetric {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Euclidean => DistanceMetric::Euclidean,
            Metric::Manhattan => DistanceMetric::Manhattan,
        }
    }
}

/// Flags of the `solve` command that override configuration values
struct Overrides {
    iterations: Option<usize>,
    seed: Option<u64>,
    cooling_rate: Option<f64>,
    decay: Option<f64>,
    min_removal: Option<usize>,
    max_removal: Option<usize>,
    regret_k: Option<usize>,
}

/// Where to write the artefacts of a `solve` run
struct Outputs {
    output: Option<PathBuf>,
    log_csv: Option<PathBuf>,
    plots: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve {
            instance,
            config,
            iterations,
            seed,
            cooling_rate,
            decay,
            min_removal,
            max_removal,
            regret_k,
            metric,
            output,
            log_csv,
            plots,
            verbose,
        } => {
            let overrides = Overrides {
                iterations,
                seed,
                cooling_rate,
                decay,
                min_removal,
                max_removal,
                regret_k,
            };
            let outputs = Outputs { output, log_csv, plots };
            solve_instance(&instance, config.as_deref(), overrides, metric.map(Into::into), outputs, verbose)
        }

        Commands::Benchmark {
            dir,
            output,
            runs,
            iterations,
        } => run_benchmark(&dir, &output, runs, iterations),

        Commands::Analyze { instance, metric } => analyze_instance(&instance, metric.map(Into::into)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_instance(path: &Path, metric: Option<DistanceMetric>) -> Result<PDPTWInstance, Box<dyn Error>> {
    let instance = match metric {
        Some(metric) => PDPTWInstance::from_file_with_metric(path, metric)?,
        None => PDPTWInstance::from_file(path)?,
    };
    Ok(instance)
}

fn build_config(
    instance: &PDPTWInstance,
    config_path: Option<&Path>,
    overrides: &Overrides,
) -> Result<AlnsConfig, Box<dyn Error>> {
    let mut config = match config_path {
        Some(path) => serde_json::from_str::<AlnsConfig>(&std::fs::read_to_string(path)?)?,
        None => AlnsConfig::default(),
    };

    if let Some(v) = overrides.iterations {
        config.iterations = v;
    }
    if let Some(v) = overrides.seed {
        config.seed = v;
    }
    if let Some(v) = overrides.cooling_rate {
        config.cooling_rate = v;
    }
    if let Some(v) = overrides.decay {
        config.decay = v;
    }
    if let Some(v) = overrides.min_removal {
        config.min_removal = v;
    }
    if let Some(v) = overrides.regret_k {
        config.regret_k = v;
    }
    match overrides.max_removal {
        Some(v) => config.max_removal = v,
        None => config = config.fit_removal_range(instance),
    }

    Ok(config)
}

fn solve_instance(
    path: &Path,
    config_path: Option<&Path>,
    overrides: Overrides,
    metric: Option<DistanceMetric>,
    outputs: Outputs,
    verbose: bool,
) -> Result<(), Box<dyn Error>> {
    println!("Loading instance from {:?}...", path);
    let instance = load_instance(path, metric)?;

    if verbose {
        println!("{}", instance.statistics());
    }
    for (request, reason) in instance.unservable_requests() {
        let req = instance.request(*request);
        println!(
            "Warning: request {} -> {} cannot be served ({})",
            instance.node(req.pickup).label,
            instance.node(req.delivery).label,
            reason
        );
    }

    let config = build_config(&instance, config_path, &overrides)?;
    let alns = Alns::new(&instance, config)?;
    let config = alns.config();

    println!(
        "Solving with ALNS: {} iterations, q in [{}, {}], seed {}...",
        config.iterations, config.min_removal, config.max_removal, config.seed
    );

    let progress = ProgressBar::new(config.iterations as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}") {
        progress.set_style(style);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let result = alns.run_with(&mut rng, |record| {
        progress.set_message(format!("best {:.2}", record.best_distance));
        progress.inc(1);
        ControlFlow::Continue(())
    });
    progress.finish_and_clear();

    let best = &result.best;
    let improvement = if result.initial_distance > 0.0 {
        (result.initial_distance - best.distance()) / result.initial_distance * 100.0
    } else {
        0.0
    };

    println!("\n========== Results ==========");
    println!("Instance: {}", instance.name);
    println!("Initial distance: {:.2}", result.initial_distance);
    println!("Best distance: {:.2} ({:.2}% improvement)", best.distance(), improvement);
    println!("Vehicles: {}", best.num_vehicles());
    println!("Feasible: {}", best.is_feasible());
    println!("Served requests: {}/{}", best.served_requests(&instance).len(), instance.num_requests());
    println!("{}", FeasibilitySummary::from_log(&result.log));
    println!("Time: {:.4}s", result.elapsed.as_secs_f64());

    if verbose {
        println!();
        best.print(&instance);
    }

    if let Some(output_path) = outputs.output {
        let json = serde_json::json!({
            "instance": instance.name,
            "seed": config.seed,
            "initial_distance": result.initial_distance,
            "distance": best.distance(),
            "feasible": best.is_feasible(),
            "iterations": result.iterations,
            "solution": best,
        });
        std::fs::write(&output_path, serde_json::to_string_pretty(&json)?)?;
        println!("Solution saved to {:?}", output_path);
    }

    if let Some(log_path) = outputs.log_csv {
        export_log_csv(&result.log, &log_path)?;
        println!("Iteration log saved to {:?}", log_path);
    }

    if let Some(dir) = outputs.plots {
        std::fs::create_dir_all(&dir)?;
        let viz = Visualizer::new();
        let plots = [
            ("routes.svg", viz.generate_route_svg(&instance, best)),
            ("distance_history.svg", viz.generate_history_svg(&result.log)),
            ("destroy_weights.svg", viz.generate_weights_svg(&result.log, WeightFamily::Destroy)),
            ("repair_weights.svg", viz.generate_weights_svg(&result.log, WeightFamily::Repair)),
        ];
        for (name, svg) in &plots {
            viz.save_svg(svg, dir.join(name))?;
        }
        println!("Plots saved to {:?}", dir);
    }

    Ok(())
}

fn run_benchmark(dir: &Path, output: &Path, runs: usize, iterations: usize) -> Result<(), Box<dyn Error>> {
    println!("Loading instances from {:?}...", dir);
    let instances = load_instances_from_dir(dir)?;
    println!("Found {} instances", instances.len());

    if instances.is_empty() {
        return Err("no instances found".into());
    }

    std::fs::create_dir_all(output)?;

    let config = BenchmarkConfig {
        num_runs: runs,
        alns: AlnsConfig::default().with_iterations(iterations),
        ..Default::default()
    };
    let mut benchmark = Benchmark::new(config);

    for (i, instance) in instances.iter().enumerate() {
        println!(
            "\n[{}/{}] Processing {} ({} requests)...",
            i + 1,
            instances.len(),
            instance.name,
            instance.num_requests()
        );
        benchmark.run_instance(instance);
    }

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn analyze_instance(path: &Path, metric: Option<DistanceMetric>) -> Result<(), Box<dyn Error>> {
    let instance = load_instance(path, metric)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let demands: Vec<i32> = instance.requests.iter().map(|r| r.demand).collect();
    if let (Some(min), Some(max)) = (demands.iter().min(), demands.iter().max()) {
        let avg = demands.iter().sum::<i32>() as f64 / demands.len() as f64;
        println!("Demand Statistics:");
        println!("  Average: {:.2}", avg);
        println!("  Min: {}", min);
        println!("  Max: {}", max);
        println!("  Capacity utilization ratio: {:.2}%", avg / instance.capacity as f64 * 100.0);
    }

    let depot = instance.depot();
    println!("\nTime Windows:");
    if depot.has_open_window() {
        println!("  Depot: [{:.2}, open)", depot.ready_time);
    } else {
        println!("  Depot: [{:.2}, {:.2}]", depot.ready_time, depot.due_time);
    }
    let tightest = instance
        .nodes
        .iter()
        .filter(|n| !n.is_depot() && !n.has_open_window())
        .map(|n| n.window_width())
        .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.min(w))));
    match tightest {
        Some(w) => println!("  Tightest customer window: {:.2}", w),
        None => println!("  Tightest customer window: open"),
    }

    let unservable = instance.unservable_requests();
    println!("\nUnservable requests: {}", unservable.len());
    for (request, reason) in unservable {
        let req = instance.request(*request);
        println!(
            "  {} -> {} (demand {}): {}",
            instance.node(req.pickup).label,
            instance.node(req.delivery).label,
            req.demand,
            reason
        );
    }

    Ok(())
}
