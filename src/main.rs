use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tsp_lab::{
    harness::seed_range, run_experiment, ExperimentReport, Instance, SolverConfig, TourSummary, TspError,
};

#[derive(Parser)]
#[command(name = "tsp-lab", about = "Exact and heuristic solvers for small Euclidean TSP instances")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve one instance, exactly when it is small enough.
    Solve {
        /// Point file with `id x y` lines; a seeded random instance otherwise.
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 12)]
        cities: usize,
        #[arg(long, default_value_t = 109)]
        seed: u64,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Compare every configured pipeline against the exact optimum.
    Bench {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        cities: Option<usize>,
        #[arg(long)]
        first_seed: Option<u64>,
        #[arg(long)]
        count: Option<u64>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct SolveOutput {
    method: String,
    exact: bool,
    #[serde(flatten)]
    tour: TourSummary,
}

fn load_config(path: Option<&Path>) -> Result<SolverConfig> {
    match path {
        Some(p) => SolverConfig::from_path(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(SolverConfig::default()),
    }
}

fn solve(input: Option<&Path>, cities: usize, seed: u64, config: &SolverConfig) -> Result<SolveOutput> {
    let tsp = match input {
        Some(p) => {
            let f = File::open(p).with_context(|| format!("opening {}", p.display()))?;
            Instance::from_reader(BufReader::new(f))
                .with_context(|| format!("reading {}", p.display()))?
        }
        None => Instance::random(cities, seed)?,
    };
    info!(cities = tsp.n(), "instance loaded");

    match config.exact.solve(&tsp) {
        Ok(sol) => Ok(SolveOutput {
            method: "held-karp".to_string(),
            exact: true,
            tour: sol.tour.summary(),
        }),
        Err(TspError::InstanceTooLarge { cities, max }) => {
            warn!(cities, max, pipeline = %config.fallback.label(), "too large for exact, using fallback");
            let t = config.fallback.run(&tsp, config, seed)?;
            Ok(SolveOutput {
                method: config.fallback.label(),
                exact: false,
                tour: t.summary(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn print_table(report: &ExperimentReport) {
    for inst in &report.instances {
        println!("seed {:>6}: optimal={:.3} states={}", inst.seed, inst.optimal_cost, inst.states);
        for r in &inst.results {
            println!("{:>36}: cost={:>9.3} gap={:>7.2}%", r.pipeline, r.cost, r.gap_percent);
        }
    }
    println!();
    for s in &report.summaries {
        println!(
            "{:>36}: [gap%] min={:>6.2} max={:>6.2} mean={:>6.2} stdev={:>6.2} optimal={}/{}",
            s.pipeline, s.min, s.max, s.mean, s.std_dev, s.optimal_hits, s.instances
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Solve {
            input,
            cities,
            seed,
            config,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let out = solve(input.as_deref(), cities, seed, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{} cost={:.3}", out.method, out.tour.cost);
                for x in &out.tour.tour {
                    println!("{}", x);
                }
            }
        }
        Command::Bench {
            config,
            cities,
            first_seed,
            count,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(n) = cities {
                config.experiment.cities = n;
            }
            if first_seed.is_some() || count.is_some() {
                let first = first_seed.unwrap_or(100);
                let count = count.unwrap_or(config.experiment.seeds.len() as u64);
                config.experiment.seeds = seed_range(first, count);
            }
            let report = run_experiment(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_table(&report);
            }
        }
    }
    Ok(())
}
