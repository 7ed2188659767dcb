//! XCS Engine - the sense, match, act and learn control loop

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use lcs_core::{LcsError, Result, XcsParams};

use crate::environment::Environment;
use crate::genetic;
use crate::matching::MatchSet;
use crate::population::{Population, PopulationStats};
use crate::prediction::{ActionSet, PredictionArray, Selection};
use crate::reinforcement;
use crate::snapshot::PopulationSnapshot;
use crate::state::{Action, Reward, Situation};

/// How a single step is run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    /// Random action, learning on
    Explore,
    /// Best action, learning on
    Exploit,
    /// Best action, no credit assignment or GA; covering still applies
    Evaluate,
}

impl StepMode {
    pub fn learns(self) -> bool {
        self != StepMode::Evaluate
    }

    fn selection(self) -> Selection {
        match self {
            StepMode::Explore => Selection::Explore,
            StepMode::Exploit | StepMode::Evaluate => Selection::Exploit,
        }
    }
}

/// Phase of the control loop, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Sense,
    Match,
    Predict,
    Act,
    Credit,
    Genetic,
}

/// What happened during one step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub situation: Situation,
    pub action: Action,
    pub reward: Reward,
    pub end_of_task: bool,
    /// System prediction for the chosen action
    pub prediction: f64,
    pub match_set_size: usize,
    pub action_set_size: usize,
    pub ga_invoked: bool,
}

/// Totals of one episode
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeSummary {
    pub steps: u64,
    pub total_reward: Reward,
    pub ended: bool,
}

/// Learning state carried from one step to the next within an episode
#[derive(Debug, Clone)]
struct Carry {
    action_set: ActionSet,
    reward: Reward,
    situation: Situation,
}

/// XCS engine owning one population and its random source
pub struct XcsEngine {
    params: XcsParams,
    population: Population,
    rng: StdRng,
    num_actions: usize,
    situation_length: usize,
    time: u64,
    phase: Phase,
    previous: Option<Carry>,
    total_steps: u64,
    total_rewards: f64,
    episodes: u64,
    ga_invocations: u64,
}

impl XcsEngine {
    /// Create an engine for situations of `situation_length` bits and `num_actions` actions
    pub fn new(
        params: XcsParams,
        situation_length: usize,
        num_actions: usize,
        seed: u64,
    ) -> Result<Self> {
        params.validate_for(num_actions)?;
        if situation_length == 0 {
            return Err(LcsError::config("situation_length must be positive"));
        }

        info!(
            "XCS engine initialized: N={}, {} bits, {} actions, seed {}",
            params.population_size, situation_length, num_actions, seed
        );

        Ok(Self {
            params,
            population: Population::new(),
            rng: StdRng::seed_from_u64(seed),
            num_actions,
            situation_length,
            time: 0,
            phase: Phase::Sense,
            previous: None,
            total_steps: 0,
            total_rewards: 0.0,
            episodes: 0,
            ga_invocations: 0,
        })
    }

    /// Create an engine sized for `env`
    pub fn for_environment<E>(params: XcsParams, env: &E, seed: u64) -> Result<Self>
    where
        E: Environment + ?Sized,
    {
        Self::new(params, env.situation_length(), env.num_actions(), seed)
    }

    /// Replace the population with one restored from a snapshot
    pub fn restore(&mut self, snapshot: &PopulationSnapshot) -> Result<()> {
        if snapshot.condition_length != self.situation_length {
            return Err(LcsError::config(format!(
                "snapshot conditions have {} bits, engine expects {}",
                snapshot.condition_length, self.situation_length
            )));
        }
        let population = snapshot.to_population()?;
        if population.numerosity() > self.params.population_size {
            return Err(LcsError::config(format!(
                "snapshot holds {} micro-classifiers, population_size is {}",
                population.numerosity(),
                self.params.population_size
            )));
        }
        if let Some(cl) = population.iter().find(|cl| cl.action.to_index() >= self.num_actions) {
            return Err(LcsError::config(format!(
                "snapshot action {} is outside {} actions",
                cl.action, self.num_actions
            )));
        }
        self.population = population;
        self.time = self.population.iter().map(|cl| cl.timestamp).max().unwrap_or(0);
        self.previous = None;
        info!("Restored {} classifiers", self.population.len());
        Ok(())
    }

    /// Snapshot of the current population
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot::capture(&self.population, self.situation_length, self.num_actions)
    }

    pub fn params(&self) -> &XcsParams {
        &self.params
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Draw explore or exploit for the next episode
    pub fn draw_mode(&mut self, explore_probability: f64) -> StepMode {
        if self.rng.gen::<f64>() < explore_probability {
            StepMode::Explore
        } else {
            StepMode::Exploit
        }
    }

    /// Draw explore or exploit with the configured `p_exp`
    pub fn next_mode(&mut self) -> StepMode {
        self.draw_mode(self.params.explore_probability)
    }

    fn enter(&mut self, phase: Phase) {
        trace!("t={} phase {:?} -> {:?}", self.time, self.phase, phase);
        self.phase = phase;
    }

    /// Forget the previous action set, reward and situation
    pub fn reset_episode(&mut self) {
        self.previous = None;
        self.phase = Phase::Sense;
    }

    /// Run one sense, match, act and learn cycle against `env`
    pub fn step<E>(&mut self, env: &mut E, mode: StepMode) -> Result<StepOutcome>
    where
        E: Environment + ?Sized,
    {
        self.enter(Phase::Sense);
        let situation = env.sense();
        if situation.len() != self.situation_length {
            self.previous = None;
            return Err(LcsError::protocol(format!(
                "{} sensed {} bits, expected {}",
                env.name(),
                situation.len(),
                self.situation_length
            )));
        }

        self.enter(Phase::Match);
        let match_set = MatchSet::build(
            &mut self.population,
            &situation,
            self.num_actions,
            self.time,
            &self.params,
            &mut self.rng,
        )?;

        self.enter(Phase::Predict);
        let prediction_array = PredictionArray::new(&match_set, &self.population, self.num_actions);

        let mut ga_invoked = false;
        if !mode.learns() {
            self.previous = None;
        } else if let Some(previous) = self.previous.take() {
            self.enter(Phase::Credit);
            let payoff =
                reinforcement::payoff(previous.reward, Some(&prediction_array), &self.params);
            ga_invoked |= self.learn(&previous.action_set, &previous.situation, payoff);
        }

        self.enter(Phase::Act);
        let action = prediction_array
            .select(mode.selection(), &mut self.rng)
            .ok_or_else(|| LcsError::invariant(format!("no action advocated for {situation}")))?;
        let prediction = prediction_array.get(action).unwrap_or_default();
        let mut action_set = ActionSet::new(&match_set, action);

        let outcome = match env.act(action) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.previous = None;
                return Err(e);
            }
        };

        self.total_steps += 1;
        self.total_rewards += outcome.reward;

        if mode.learns() {
            action_set.prune(&self.population);
            if outcome.end_of_task {
                self.enter(Phase::Credit);
                let payoff = reinforcement::payoff(outcome.reward, None, &self.params);
                ga_invoked |= self.learn(&action_set, &situation, payoff);
            } else {
                self.previous = Some(Carry {
                    action_set: action_set.clone(),
                    reward: outcome.reward,
                    situation: situation.clone(),
                });
            }
        }
        if outcome.end_of_task {
            self.previous = None;
        }

        self.time += 1;
        self.enter(Phase::Sense);

        Ok(StepOutcome {
            situation,
            action,
            reward: outcome.reward,
            end_of_task: outcome.end_of_task,
            prediction,
            match_set_size: match_set.len(),
            action_set_size: action_set.len(),
            ga_invoked,
        })
    }

    /// Credit `payoff` to `action_set` and run the GA on it when due
    fn learn(&mut self, action_set: &ActionSet, situation: &Situation, payoff: Reward) -> bool {
        let mut action_set = action_set.clone();
        action_set.prune(&self.population);
        if action_set.is_empty() {
            return false;
        }

        reinforcement::update_action_set(&mut self.population, &action_set, payoff, &self.params);

        self.enter(Phase::Genetic);
        let report = genetic::run(
            &mut self.population,
            &action_set,
            situation,
            self.num_actions,
            self.time,
            &self.params,
            &mut self.rng,
        );
        if report.is_some() {
            self.ga_invocations += 1;
        }
        report.is_some()
    }

    /// Reset `env` and step until the task ends or `max_steps` is reached
    pub fn run_episode<E>(&mut self, env: &mut E, mode: StepMode, max_steps: u64) -> Result<EpisodeSummary>
    where
        E: Environment + ?Sized,
    {
        self.reset_episode();
        env.reset();

        let mut summary = EpisodeSummary::default();
        while summary.steps < max_steps {
            let outcome = self.step(env, mode)?;
            summary.steps += 1;
            summary.total_reward += outcome.reward;
            if outcome.end_of_task {
                summary.ended = true;
                break;
            }
        }

        if !summary.ended {
            debug!("Episode cut off after {} steps", summary.steps);
        }
        self.reset_episode();
        self.episodes += 1;
        Ok(summary)
    }

    /// Get statistics
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            time: self.time,
            total_steps: self.total_steps,
            total_rewards: self.total_rewards,
            average_reward: if self.total_steps > 0 {
                self.total_rewards / self.total_steps as f64
            } else {
                0.0
            },
            episodes: self.episodes,
            ga_invocations: self.ga_invocations,
            population: self.population.stats(),
        }
    }

    /// Get parameters as JSON
    pub fn get_params(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or(serde_json::Value::Null)
    }
}

/// Engine statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub time: u64,
    pub total_steps: u64,
    pub total_rewards: f64,
    pub average_reward: f64,
    pub episodes: u64,
    pub ga_invocations: u64,
    pub population: PopulationStats,
}
