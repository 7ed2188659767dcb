//! Training runs on the multiplexer

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use lcs_rl::{run_parallel, ExperimentReport, Multiplexer, PopulationSnapshot};

use crate::config::Config;

#[derive(Args)]
pub struct RunArgs {
    /// Seed of the first run (overrides experiment.seed)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of independent runs (overrides experiment.runs)
    #[arg(short, long)]
    runs: Option<usize>,

    /// Training cycles (overrides experiment.training_cycles)
    #[arg(long)]
    cycles: Option<u64>,

    /// Write the population of the best run to this file
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Start every run from the population in this checkpoint
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: RunArgs, config: Config) -> Result<()> {
    let mut experiment = config.experiment.clone();
    if let Some(seed) = args.seed {
        experiment.seed = seed;
    }
    if let Some(runs) = args.runs {
        experiment.runs = runs;
    }
    if let Some(cycles) = args.cycles {
        experiment.training_cycles = cycles;
    }

    let address_bits = config.environment.address_bits;
    info!(
        "Starting {} run(s) on the {}-multiplexer",
        experiment.runs,
        address_bits + (1 << address_bits)
    );

    let resume = match &args.resume {
        Some(path) => {
            let snapshot = PopulationSnapshot::load(path)
                .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
            info!(
                "Resuming from {} ({} classifiers)",
                path.display(),
                snapshot.classifiers.len()
            );
            Some(snapshot)
        }
        None => None,
    };

    let results = run_parallel(config.xcs.clone(), experiment, resume, move |seed| {
        Multiplexer::new(address_bits, seed)
    })
    .await?;

    let reports: Vec<&ExperimentReport> = results.iter().map(|(report, _)| report).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
        if reports.len() > 1 {
            print_summary(&reports);
        }
    }

    if let Some(path) = &args.checkpoint {
        let best = results
            .iter()
            .max_by(|(a, _), (b, _)| {
                a.evaluation_average_reward
                    .total_cmp(&b.evaluation_average_reward)
            })
            .context("No runs completed")?;
        best.1
            .save(path)
            .with_context(|| format!("Failed to write checkpoint {}", path.display()))?;
        info!("Checkpoint of seed {} written to {:?}", best.0.seed, path);
    }

    Ok(())
}

fn print_report(report: &ExperimentReport) {
    println!("Run {} (seed {})", report.run_id, report.seed);
    println!("  Environment:        {}", report.environment);
    println!("  Training cycles:    {}", report.training_cycles);
    println!(
        "  Evaluation reward:  {:.1} ({:.1}%) over {} cycles",
        report.evaluation_average_reward,
        report.evaluation_performance * 100.0,
        report.evaluation_cycles
    );
    println!(
        "  Best window:        {:.1}%",
        report.best_window_performance * 100.0
    );
    match report.converged_at {
        Some(cycle) => println!("  Converged at cycle: {cycle}"),
        None => println!("  Converged:          no"),
    }
    println!(
        "  Population:         {} macro / {} micro, mean error {:.2}, generality {:.3}",
        report.population.macro_classifiers,
        report.population.micro_classifiers,
        report.population.mean_error,
        report.population.mean_generality
    );
    println!(
        "  Duration:           {:.1}s\n",
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
}

fn print_summary(reports: &[&ExperimentReport]) {
    let count = reports.len() as f64;
    let mean = reports
        .iter()
        .map(|r| r.evaluation_performance)
        .sum::<f64>()
        / count;
    let converged = reports.iter().filter(|r| r.converged_at.is_some()).count();
    println!("Summary over {} runs", reports.len());
    println!("  Mean evaluation performance: {:.1}%", mean * 100.0);
    println!("  Converged runs:              {}/{}", converged, reports.len());
}
