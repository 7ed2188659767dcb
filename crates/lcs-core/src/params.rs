//! Learning parameters for the XCS classifier system
//!
//! Field names follow the usual XCS symbols; the symbol is given in each
//! field's doc comment. Defaults are the standard values for Boolean
//! multiplexer problems with a 0/1000 payoff scale.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LcsError, Result};

/// Parent selection scheme used by the genetic component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Fitness-proportionate (roulette wheel)
    Roulette,
    /// Tournament over a fraction of the action set
    Tournament,
}

/// Crossover operator applied to conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverMethod {
    OnePoint,
    TwoPoint,
    Uniform,
}

/// Condition mutation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationMethod {
    /// Toggle between `#` and the current input bit, so the child keeps matching
    Niche,
    /// Replace with one of the two other symbols, uniformly
    Free,
}

/// Full parameter set of an XCS run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XcsParams {
    /// N - maximum population size in micro-classifiers
    pub population_size: usize,
    /// β - learning rate for prediction, error, fitness and action set size
    pub learning_rate: f64,
    /// α - accuracy fall-off scale
    pub accuracy_scale: f64,
    /// ε₀ - error below which a classifier counts as accurate
    pub error_threshold: f64,
    /// ν - accuracy fall-off exponent
    pub accuracy_exponent: f64,
    /// γ - discount factor for multi-step problems
    pub discount_factor: f64,
    /// θ_GA - GA invocation threshold (mean time since last GA in the action set)
    pub ga_threshold: f64,
    /// χ - crossover probability
    pub crossover_rate: f64,
    /// μ - per-position mutation probability
    pub mutation_rate: f64,
    /// θ_del - experience needed before low fitness raises the deletion vote
    pub deletion_threshold: u64,
    /// δ - fraction of mean fitness below which the deletion vote is raised
    pub deletion_fitness_fraction: f64,
    /// θ_sub - experience needed to subsume
    pub subsumption_threshold: u64,
    /// P_# - wildcard probability during covering
    pub wildcard_probability: f64,
    /// p_I - prediction of newly covered classifiers
    pub initial_prediction: f64,
    /// ε_I - error of newly covered classifiers
    pub initial_error: f64,
    /// F_I - fitness of newly covered classifiers
    pub initial_fitness: f64,
    /// Factor applied to the parents' fitness when creating offspring
    pub fitness_reduction: f64,
    /// p_exp - probability of an exploration step
    pub explore_probability: f64,
    /// θ_mna - minimum distinct actions in a match set; `None` means every action
    pub min_actions: Option<usize>,
    pub do_ga_subsumption: bool,
    pub selection: SelectionMethod,
    /// Fraction of the action set entering a tournament
    pub tournament_fraction: f64,
    pub crossover: CrossoverMethod,
    pub mutation: MutationMethod,
}

impl Default for XcsParams {
    fn default() -> Self {
        Self {
            population_size: 400,
            learning_rate: 0.2,
            accuracy_scale: 0.1,
            error_threshold: 10.0,
            accuracy_exponent: 5.0,
            discount_factor: 0.71,
            ga_threshold: 25.0,
            crossover_rate: 0.8,
            mutation_rate: 0.04,
            deletion_threshold: 20,
            deletion_fitness_fraction: 0.1,
            subsumption_threshold: 20,
            wildcard_probability: 0.33,
            initial_prediction: 10.0,
            initial_error: 0.0,
            initial_fitness: 0.01,
            fitness_reduction: 0.1,
            explore_probability: 0.5,
            min_actions: None,
            do_ga_subsumption: false,
            selection: SelectionMethod::Roulette,
            tournament_fraction: 0.4,
            crossover: CrossoverMethod::TwoPoint,
            mutation: MutationMethod::Niche,
        }
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LcsError::config(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(LcsError::config(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

impl XcsParams {
    /// Effective θ_mna for an environment offering `num_actions` actions
    pub fn min_actions_for(&self, num_actions: usize) -> usize {
        self.min_actions.unwrap_or(num_actions).min(num_actions)
    }

    /// Check every rate and threshold
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(LcsError::config("population_size must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(LcsError::config(format!(
                "learning_rate must lie in (0, 1], got {}",
                self.learning_rate
            )));
        }

        check_probability("crossover_rate", self.crossover_rate)?;
        check_probability("mutation_rate", self.mutation_rate)?;
        check_probability("wildcard_probability", self.wildcard_probability)?;
        check_probability("explore_probability", self.explore_probability)?;
        check_probability("discount_factor", self.discount_factor)?;
        check_probability("deletion_fitness_fraction", self.deletion_fitness_fraction)?;
        check_probability("fitness_reduction", self.fitness_reduction)?;
        check_probability("initial_fitness", self.initial_fitness)?;
        check_probability("accuracy_scale", self.accuracy_scale)?;

        check_positive("error_threshold", self.error_threshold)?;
        check_positive("accuracy_exponent", self.accuracy_exponent)?;

        if !(self.tournament_fraction > 0.0 && self.tournament_fraction <= 1.0) {
            return Err(LcsError::config(format!(
                "tournament_fraction must lie in (0, 1], got {}",
                self.tournament_fraction
            )));
        }
        if self.ga_threshold < 0.0 || !self.ga_threshold.is_finite() {
            return Err(LcsError::config(format!(
                "ga_threshold must be non-negative, got {}",
                self.ga_threshold
            )));
        }
        if self.initial_error < 0.0 {
            return Err(LcsError::config(format!(
                "initial_error must be non-negative, got {}",
                self.initial_error
            )));
        }
        if let Some(min_actions) = self.min_actions {
            if min_actions == 0 {
                return Err(LcsError::config("min_actions must be at least 1"));
            }
            if min_actions > self.population_size {
                return Err(LcsError::config(format!(
                    "population_size {} cannot hold min_actions {}",
                    self.population_size, min_actions
                )));
            }
        }

        debug!("Parameters validated: N={}", self.population_size);
        Ok(())
    }

    /// Validate against a concrete environment
    pub fn validate_for(&self, num_actions: usize) -> Result<()> {
        self.validate()?;
        if num_actions == 0 {
            return Err(LcsError::config("environment offers no actions"));
        }
        if self.min_actions_for(num_actions) > self.population_size {
            return Err(LcsError::config(format!(
                "population_size {} is smaller than the {} actions covering must provide",
                self.population_size,
                self.min_actions_for(num_actions)
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = XcsParams::default();
        assert!(params.validate().is_ok());
        assert!(params.validate_for(2).is_ok());
    }

    #[test]
    fn test_zero_population_rejected() {
        let params = XcsParams {
            population_size: 0,
            ..XcsParams::default()
        };
        assert!(matches!(
            params.validate(),
            Err(LcsError::Configuration(_))
        ));
    }

    #[test]
    fn test_out_of_range_rates_rejected() {
        let cases = [
            XcsParams {
                learning_rate: 0.0,
                ..XcsParams::default()
            },
            XcsParams {
                crossover_rate: 1.5,
                ..XcsParams::default()
            },
            XcsParams {
                mutation_rate: -0.1,
                ..XcsParams::default()
            },
            XcsParams {
                error_threshold: 0.0,
                ..XcsParams::default()
            },
            XcsParams {
                tournament_fraction: 0.0,
                ..XcsParams::default()
            },
        ];

        for params in cases {
            assert!(params.validate().is_err(), "accepted {params:?}");
        }
    }

    #[test]
    fn test_min_actions_defaults_to_action_count() {
        let params = XcsParams::default();
        assert_eq!(params.min_actions_for(2), 2);

        let params = XcsParams {
            min_actions: Some(5),
            ..XcsParams::default()
        };
        assert_eq!(params.min_actions_for(2), 2);
        assert_eq!(params.min_actions_for(8), 5);
    }

    #[test]
    fn test_population_smaller_than_actions() {
        let params = XcsParams {
            population_size: 2,
            ..XcsParams::default()
        };
        assert!(params.validate_for(4).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: XcsParams =
            serde_json::from_str(r#"{"population_size": 800, "selection": "tournament"}"#)
                .unwrap();
        assert_eq!(params.population_size, 800);
        assert_eq!(params.selection, SelectionMethod::Tournament);
        assert_eq!(params.learning_rate, 0.2);
        assert_eq!(params.crossover, CrossoverMethod::TwoPoint);
    }
}
