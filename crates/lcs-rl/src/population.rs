//! Population manager - classifier storage, merging and deletion

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use lcs_core::XcsParams;

use crate::classifier::{Classifier, ClassifierKey};
use crate::state::Situation;

/// Classifier records keyed by (condition, action)
///
/// Identical rules are never stored twice: inserting an existing key adds to
/// the numerosity of the stored record. The map is ordered so that a seeded
/// run visits classifiers in the same order every time.
#[derive(Debug, Clone, Default)]
pub struct Population {
    classifiers: BTreeMap<ClassifierKey, Classifier>,
    numerosity: usize,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of macro-classifiers (distinct rules)
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Number of micro-classifiers (sum of numerosities)
    pub fn numerosity(&self) -> usize {
        self.numerosity
    }

    pub fn get(&self, key: &ClassifierKey) -> Option<&Classifier> {
        self.classifiers.get(key)
    }

    pub fn get_mut(&mut self, key: &ClassifierKey) -> Option<&mut Classifier> {
        self.classifiers.get_mut(key)
    }

    pub fn contains(&self, key: &ClassifierKey) -> bool {
        self.classifiers.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Classifier> {
        self.classifiers.values()
    }

    /// Insert a classifier, merging with an identical rule if present
    pub fn insert(&mut self, classifier: Classifier) -> ClassifierKey {
        let key = classifier.key();
        self.numerosity += classifier.numerosity as usize;
        match self.classifiers.get_mut(&key) {
            Some(existing) => {
                existing.numerosity += classifier.numerosity;
                trace!("Merged into {} (num={})", existing.condition, existing.numerosity);
            }
            None => {
                self.classifiers.insert(key.clone(), classifier);
            }
        }
        key
    }

    /// Add one copy to an existing record; false when the key is unknown
    pub fn increment(&mut self, key: &ClassifierKey) -> bool {
        match self.classifiers.get_mut(key) {
            Some(classifier) => {
                classifier.numerosity += 1;
                self.numerosity += 1;
                true
            }
            None => false,
        }
    }

    /// Keys of every classifier matching `situation`
    pub fn matching(&self, situation: &Situation) -> Vec<ClassifierKey> {
        self.classifiers
            .iter()
            .filter(|(_, cl)| cl.matches(situation))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Sum of numerosities of the given keys that are still present
    pub fn numerosity_of(&self, keys: &[ClassifierKey]) -> u32 {
        keys.iter()
            .filter_map(|key| self.classifiers.get(key))
            .map(|cl| cl.numerosity)
            .sum()
    }

    /// Mean fitness per micro-classifier
    pub fn mean_micro_fitness(&self) -> f64 {
        if self.numerosity == 0 {
            return 0.0;
        }
        let total: f64 = self.classifiers.values().map(|cl| cl.fitness).sum();
        total / self.numerosity as f64
    }

    /// Remove one micro-classifier chosen by roulette wheel over deletion votes
    ///
    /// Returns the key that lost a copy, or `None` when the population holds
    /// at most one micro-classifier.
    pub fn delete_one<R>(&mut self, params: &XcsParams, rng: &mut R) -> Option<ClassifierKey>
    where
        R: Rng + ?Sized,
    {
        if self.numerosity <= 1 {
            return None;
        }

        let mean_fitness = self.mean_micro_fitness();
        let votes: Vec<f64> = self
            .classifiers
            .values()
            .map(|cl| cl.deletion_vote(mean_fitness, params))
            .collect();
        let total: f64 = votes.iter().sum();

        let index = if total > 0.0 && total.is_finite() {
            let point = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            votes
                .iter()
                .position(|vote| {
                    acc += vote;
                    acc > point
                })
                .unwrap_or(votes.len() - 1)
        } else {
            rng.gen_range(0..votes.len())
        };

        let key = self.classifiers.keys().nth(index)?.clone();
        self.remove_copy(&key);
        Some(key)
    }

    /// Delete until the population fits `params.population_size`
    pub fn enforce_capacity<R>(&mut self, params: &XcsParams, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        let mut deleted = 0;
        while self.numerosity > params.population_size {
            match self.delete_one(params, rng) {
                Some(key) => {
                    debug!("Deleted one copy of {} : {}", key.condition, key.action);
                    deleted += 1;
                }
                None => break,
            }
        }
        deleted
    }

    fn remove_copy(&mut self, key: &ClassifierKey) {
        let emptied = match self.classifiers.get_mut(key) {
            Some(classifier) => {
                classifier.numerosity -= 1;
                self.numerosity -= 1;
                classifier.numerosity == 0
            }
            None => false,
        };
        if emptied {
            self.classifiers.remove(key);
        }
    }

    /// Summary statistics over the whole population
    pub fn stats(&self) -> PopulationStats {
        let micro = self.numerosity as f64;
        let weighted = |f: fn(&Classifier) -> f64| -> f64 {
            if micro == 0.0 {
                return 0.0;
            }
            self.classifiers
                .values()
                .map(|cl| f(cl) * f64::from(cl.numerosity))
                .sum::<f64>()
                / micro
        };

        PopulationStats {
            macro_classifiers: self.len(),
            micro_classifiers: self.numerosity,
            mean_prediction: weighted(|cl| cl.prediction),
            mean_error: weighted(|cl| cl.error),
            mean_fitness: self.mean_micro_fitness(),
            mean_experience: weighted(|cl| cl.experience as f64),
            mean_generality: weighted(|cl| cl.condition.generality()),
        }
    }

    /// Classifiers sorted by fitness, fittest first
    pub fn fittest(&self, count: usize) -> Vec<&Classifier> {
        let mut all: Vec<&Classifier> = self.classifiers.values().collect();
        all.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        all.truncate(count);
        all
    }
}

/// Population statistics, numerosity-weighted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub macro_classifiers: usize,
    pub micro_classifiers: usize,
    pub mean_prediction: f64,
    pub mean_error: f64,
    pub mean_fitness: f64,
    pub mean_experience: f64,
    pub mean_generality: f64,
}
