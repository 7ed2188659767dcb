//! Checkpoint inspection

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use lcs_rl::PopulationSnapshot;

#[derive(Args)]
pub struct InspectArgs {
    /// Snapshot file written by `lcs run --checkpoint`
    path: PathBuf,

    /// Number of rules to list, fittest first
    #[arg(short, long, default_value_t = 20)]
    top: usize,

    /// Print statistics and rules as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: InspectArgs) -> Result<()> {
    let snapshot = PopulationSnapshot::load(&args.path)
        .with_context(|| format!("Failed to load snapshot {}", args.path.display()))?;
    let population = snapshot
        .to_population()
        .context("Snapshot holds an invalid population")?;
    let stats = population.stats();
    let fittest = population.fittest(args.top);

    if args.json {
        let rules: Vec<_> = fittest
            .iter()
            .map(|cl| lcs_rl::ClassifierRecord::from(*cl))
            .collect();
        let output = serde_json::json!({
            "saved_at": snapshot.saved_at,
            "condition_length": snapshot.condition_length,
            "num_actions": snapshot.num_actions,
            "stats": stats,
            "fittest": rules,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Snapshot: {}", args.path.display());
    println!("=========\n");
    println!("Saved at:          {}", snapshot.saved_at.to_rfc3339());
    println!("Condition length:  {}", snapshot.condition_length);
    println!("Actions:           {}", snapshot.num_actions);
    println!("Macro-classifiers: {}", stats.macro_classifiers);
    println!("Micro-classifiers: {}", stats.micro_classifiers);
    println!("Mean prediction:   {:.2}", stats.mean_prediction);
    println!("Mean error:        {:.3}", stats.mean_error);
    println!("Mean fitness:      {:.4}", stats.mean_fitness);
    println!("Mean experience:   {:.1}", stats.mean_experience);
    println!("Mean generality:   {:.3}", stats.mean_generality);

    if fittest.is_empty() {
        println!("\nNo rules.");
        return Ok(());
    }

    println!("\nTop {} rules by fitness:", fittest.len());
    for (rank, cl) in fittest.iter().enumerate() {
        println!("{:>4}. {}", rank + 1, cl);
    }
    Ok(())
}
