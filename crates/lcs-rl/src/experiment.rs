//! Experiment runner - training schedule, evaluation window and reports
//!
//! A run trains for a budget of cycles (one cycle is one episode) with an
//! exploration probability decayed linearly from `initial_explore` to
//! `final_explore`, then measures performance over an exploit-only
//! evaluation window. Training statistics are collected per window and the
//! run is marked converged once they stay within `tolerance` for
//! `stable_windows` successive windows. Failing to converge is reported, not
//! treated as an error.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use lcs_core::{LcsError, Result, XcsParams};

use crate::engine::{StepMode, XcsEngine};
use crate::environment::Environment;
use crate::population::PopulationStats;
use crate::snapshot::PopulationSnapshot;

/// Training and evaluation schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub training_cycles: u64,
    pub evaluation_cycles: u64,
    pub initial_explore: f64,
    pub final_explore: f64,
    /// Cycles per statistics window
    pub window: u64,
    /// Largest relative change between windows still counted as stable
    pub tolerance: f64,
    pub stable_windows: usize,
    pub stop_on_convergence: bool,
    /// Keep crediting (without exploring) during the evaluation window
    pub learn_during_evaluation: bool,
    pub max_steps_per_episode: u64,
    pub seed: u64,
    pub runs: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            training_cycles: 10_000,
            evaluation_cycles: 1_000,
            initial_explore: 0.5,
            final_explore: 0.0,
            window: 500,
            tolerance: 0.05,
            stable_windows: 4,
            stop_on_convergence: false,
            learn_during_evaluation: true,
            max_steps_per_episode: 50,
            seed: 1,
            runs: 1,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("initial_explore", self.initial_explore),
            ("final_explore", self.final_explore),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LcsError::config(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if self.tolerance < 0.0 || !self.tolerance.is_finite() {
            return Err(LcsError::config(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        if self.max_steps_per_episode == 0 {
            return Err(LcsError::config("max_steps_per_episode must be positive"));
        }
        if self.runs == 0 {
            return Err(LcsError::config("runs must be positive"));
        }
        Ok(())
    }

    /// Exploration probability for training cycle `cycle`
    pub fn explore_probability(&self, cycle: u64) -> f64 {
        if self.training_cycles <= 1 {
            return self.initial_explore;
        }
        let progress = cycle as f64 / (self.training_cycles - 1) as f64;
        self.initial_explore + (self.final_explore - self.initial_explore) * progress.min(1.0)
    }
}

/// Statistics of one training window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub end_cycle: u64,
    /// Mean episode reward as a fraction of the environment's maximum
    pub performance: f64,
    pub macro_classifiers: usize,
    pub mean_error: f64,
}

impl WindowStats {
    fn close_to(&self, other: &WindowStats, tolerance: f64) -> bool {
        let relative = |a: f64, b: f64| (a - b).abs() / a.abs().max(b.abs()).max(1.0);
        relative(self.performance, other.performance) <= tolerance
            && relative(self.macro_classifiers as f64, other.macro_classifiers as f64) <= tolerance
            && relative(self.mean_error, other.mean_error) <= tolerance
    }
}

/// Outcome of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub run_id: Uuid,
    pub environment: String,
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub training_cycles: u64,
    pub evaluation_cycles: u64,
    /// Mean episode reward over the evaluation window
    pub evaluation_average_reward: f64,
    /// `evaluation_average_reward` as a fraction of the maximum reward
    pub evaluation_performance: f64,
    pub best_window_performance: f64,
    pub converged_at: Option<u64>,
    pub population: PopulationStats,
    pub windows: Vec<WindowStats>,
}

/// One run: an environment and the engine learning it
pub struct Experiment<E: Environment> {
    env: E,
    engine: XcsEngine,
    config: ExperimentConfig,
}

impl<E: Environment> Experiment<E> {
    pub fn new(env: E, params: XcsParams, config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        let engine = XcsEngine::for_environment(params, &env, config.seed)?;
        Ok(Self {
            env,
            engine,
            config,
        })
    }

    /// Start from an existing population
    pub fn with_snapshot(mut self, snapshot: &PopulationSnapshot) -> Result<Self> {
        self.engine.restore(snapshot)?;
        Ok(self)
    }

    pub fn engine(&self) -> &XcsEngine {
        &self.engine
    }

    /// Train, then evaluate
    pub fn run(&mut self) -> Result<ExperimentReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let max_reward = self.env.max_reward();
        let normalise = |reward: f64| if max_reward > 0.0 { reward / max_reward } else { 0.0 };

        info!(
            "Run {} on {}: {} training + {} evaluation cycles",
            run_id,
            self.env.name(),
            self.config.training_cycles,
            self.config.evaluation_cycles
        );

        let mut windows: Vec<WindowStats> = Vec::new();
        let mut window_reward = 0.0;
        let mut window_cycles = 0u64;
        let mut stable = 0usize;
        let mut converged_at = None;
        let mut trained = 0u64;

        for cycle in 0..self.config.training_cycles {
            let mode = self.engine.draw_mode(self.config.explore_probability(cycle));
            let summary =
                self.engine
                    .run_episode(&mut self.env, mode, self.config.max_steps_per_episode)?;
            trained += 1;
            window_reward += summary.total_reward;
            window_cycles += 1;

            if self.config.window > 0 && window_cycles == self.config.window {
                let stats = self.engine.population().stats();
                let window = WindowStats {
                    end_cycle: cycle + 1,
                    performance: normalise(window_reward / window_cycles as f64),
                    macro_classifiers: stats.macro_classifiers,
                    mean_error: stats.mean_error,
                };
                debug!(
                    "Window ending {}: performance {:.3}, {} rules, error {:.2}",
                    window.end_cycle, window.performance, window.macro_classifiers, window.mean_error
                );

                match windows.last() {
                    Some(last) if last.close_to(&window, self.config.tolerance) => stable += 1,
                    _ => stable = 0,
                }
                windows.push(window);
                window_reward = 0.0;
                window_cycles = 0;

                if converged_at.is_none()
                    && self.config.stable_windows > 0
                    && stable >= self.config.stable_windows
                {
                    converged_at = Some(cycle + 1);
                    info!("Run {} converged at cycle {}", run_id, cycle + 1);
                    if self.config.stop_on_convergence {
                        break;
                    }
                }
            }
        }

        let evaluation_mode = if self.config.learn_during_evaluation {
            StepMode::Exploit
        } else {
            StepMode::Evaluate
        };
        let mut evaluation_reward = 0.0;
        for _ in 0..self.config.evaluation_cycles {
            let summary = self.engine.run_episode(
                &mut self.env,
                evaluation_mode,
                self.config.max_steps_per_episode,
            )?;
            evaluation_reward += summary.total_reward;
        }

        let evaluation_average_reward = if self.config.evaluation_cycles > 0 {
            evaluation_reward / self.config.evaluation_cycles as f64
        } else {
            0.0
        };
        let best_window_performance = windows
            .iter()
            .map(|w| w.performance)
            .fold(0.0, f64::max);

        let report = ExperimentReport {
            run_id,
            environment: self.env.name().to_string(),
            seed: self.config.seed,
            started_at,
            finished_at: Utc::now(),
            training_cycles: trained,
            evaluation_cycles: self.config.evaluation_cycles,
            evaluation_average_reward,
            evaluation_performance: normalise(evaluation_average_reward),
            best_window_performance,
            converged_at,
            population: self.engine.population().stats(),
            windows,
        };

        info!(
            "Run {} finished: evaluation reward {:.1} ({:.1}%), {} rules",
            run_id,
            report.evaluation_average_reward,
            report.evaluation_performance * 100.0,
            report.population.macro_classifiers
        );
        Ok(report)
    }
}

/// Run `config.runs` independent experiments in parallel
///
/// Run `i` uses seed `config.seed + i` for both the engine and the
/// environment factory. Each run owns its environment and population.
/// Results are returned in seed order. With `resume`, every run starts from
/// that population instead of an empty one.
pub async fn run_parallel<E, F>(
    params: XcsParams,
    config: ExperimentConfig,
    resume: Option<PopulationSnapshot>,
    make_env: F,
) -> anyhow::Result<Vec<(ExperimentReport, PopulationSnapshot)>>
where
    E: Environment + 'static,
    F: Fn(u64) -> Result<E> + Send + Sync + Clone + 'static,
{
    let mut tasks = JoinSet::new();

    config.validate()?;

    for i in 0..config.runs {
        let seed = config.seed.wrapping_add(i as u64);
        let params = params.clone();
        let run_config = ExperimentConfig {
            seed,
            ..config.clone()
        };
        let make_env = make_env.clone();
        let resume = resume.clone();

        tasks.spawn_blocking(move || -> anyhow::Result<(ExperimentReport, PopulationSnapshot)> {
            let env = make_env(seed).context("Failed to create environment")?;
            let mut experiment = Experiment::new(env, params, run_config)?;
            if let Some(snapshot) = &resume {
                experiment = experiment
                    .with_snapshot(snapshot)
                    .context("Failed to resume from snapshot")?;
            }
            let report = experiment.run()?;
            Ok((report, experiment.engine().snapshot()))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|e| anyhow!("Experiment task failed: {}", e))??;
        results.push(result);
    }
    results.sort_by_key(|(report, _)| report.seed);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Multiplexer;

    #[test]
    fn test_explore_schedule_decays() {
        let config = ExperimentConfig::default();
        assert_eq!(config.explore_probability(0), 0.5);
        assert!((config.explore_probability(config.training_cycles - 1)).abs() < 1e-12);

        let mid = config.explore_probability(config.training_cycles / 2);
        assert!(mid > 0.2 && mid < 0.3);
    }

    #[test]
    fn test_short_run_report() {
        let config = ExperimentConfig {
            training_cycles: 600,
            evaluation_cycles: 100,
            window: 200,
            ..ExperimentConfig::default()
        };
        let env = Multiplexer::new(2, 7).unwrap();
        let mut experiment = Experiment::new(env, XcsParams::default(), config).unwrap();

        let report = experiment.run().unwrap();

        assert_eq!(report.training_cycles, 600);
        assert_eq!(report.windows.len(), 3);
        assert_eq!(report.environment, "6-multiplexer");
        assert!(report.evaluation_performance >= 0.0 && report.evaluation_performance <= 1.0);
        assert!(report.population.micro_classifiers <= 400);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_stop_on_convergence() {
        // tolerance 1.0 treats any two windows as stable
        let config = ExperimentConfig {
            training_cycles: 1_000,
            evaluation_cycles: 10,
            window: 100,
            tolerance: 1.0,
            stable_windows: 2,
            stop_on_convergence: true,
            ..ExperimentConfig::default()
        };
        let env = Multiplexer::new(2, 1).unwrap();
        let mut experiment = Experiment::new(env, XcsParams::default(), config).unwrap();

        let report = experiment.run().unwrap();
        assert_eq!(report.converged_at, Some(300));
        assert_eq!(report.training_cycles, 300);
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        let config = ExperimentConfig {
            initial_explore: 1.5,
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ExperimentConfig {
            runs: 0,
            ..ExperimentConfig::default()
        };
        let env = Multiplexer::new(2, 1).unwrap();
        assert!(Experiment::new(env, XcsParams::default(), config).is_err());
    }

    #[test]
    fn test_window_similarity() {
        let a = WindowStats {
            end_cycle: 100,
            performance: 0.9,
            macro_classifiers: 100,
            mean_error: 20.0,
        };
        let b = WindowStats {
            end_cycle: 200,
            performance: 0.92,
            macro_classifiers: 103,
            mean_error: 20.5,
        };
        assert!(a.close_to(&b, 0.05));
        assert!(!a.close_to(&b, 0.01));
    }
}
