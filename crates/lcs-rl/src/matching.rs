//! Matcher - match set formation and covering

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use lcs_core::{LcsError, Result, XcsParams};

use crate::classifier::{Classifier, ClassifierKey, Condition};
use crate::population::Population;
use crate::state::{Action, Situation};

/// Upper bound on covering rounds per action still missing
const COVERING_ROUNDS_PER_ACTION: usize = 1000;

/// Classifiers whose condition matches the current situation
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    keys: Vec<ClassifierKey>,
}

impl MatchSet {
    /// Match set without covering
    pub fn matching(population: &Population, situation: &Situation) -> Self {
        Self {
            keys: population.matching(situation),
        }
    }

    /// Build the match set, covering until `θ_mna` distinct actions are advocated
    pub fn build<R>(
        population: &mut Population,
        situation: &Situation,
        num_actions: usize,
        time: u64,
        params: &XcsParams,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: Rng + ?Sized,
    {
        let min_actions = params.min_actions_for(num_actions);
        let mut match_set = Self::matching(population, situation);

        let mut rounds = 0;
        while match_set.distinct_actions(population).len() < min_actions {
            if rounds >= COVERING_ROUNDS_PER_ACTION * min_actions {
                return Err(LcsError::invariant(format!(
                    "covering could not provide {min_actions} actions for {situation}"
                )));
            }
            rounds += 1;

            let action = match_set.missing_action(population, num_actions, rng);
            let condition = Condition::cover(situation, params.wildcard_probability, rng);
            let covered = Classifier::new(condition, action, time, params);
            debug!("Covering {} : {} for {}", covered.condition, action, situation);

            let key = population.insert(covered);
            population.enforce_capacity(params, rng);

            // deletion may have taken members (or the newcomer) away
            match_set.keys.retain(|k| population.contains(k));
            if population.contains(&key) && !match_set.keys.contains(&key) {
                match_set.keys.push(key);
            }
        }

        if match_set.keys.is_empty() {
            return Err(LcsError::invariant(format!(
                "match set empty after covering for {situation}"
            )));
        }
        Ok(match_set)
    }

    /// Actions advocated by members still present in the population
    pub fn distinct_actions(&self, population: &Population) -> BTreeSet<Action> {
        self.iter(population).map(|cl| cl.action).collect()
    }

    fn missing_action<R>(&self, population: &Population, num_actions: usize, rng: &mut R) -> Action
    where
        R: Rng + ?Sized,
    {
        let present = self.distinct_actions(population);
        let missing: Vec<Action> = Action::all(num_actions)
            .filter(|a| !present.contains(a))
            .collect();
        match missing.choose(rng) {
            Some(action) => *action,
            None => Action(rng.gen_range(0..num_actions)),
        }
    }

    pub fn keys(&self) -> &[ClassifierKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Members still present in the population
    pub fn iter<'a>(&'a self, population: &'a Population) -> impl Iterator<Item = &'a Classifier> + 'a {
        self.keys.iter().filter_map(|key| population.get(key))
    }
}
