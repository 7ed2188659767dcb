//! Action selector - prediction array, explore/exploit choice and action sets

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, ClassifierKey};
use crate::matching::MatchSet;
use crate::population::Population;
use crate::state::Action;

/// How an action is picked from the prediction array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Uniform among advocated actions
    Explore,
    /// Highest prediction, ties broken uniformly
    Exploit,
}

/// Fitness-weighted payoff prediction per action
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionArray {
    /// `None` for actions no member of the match set advocates
    values: Vec<Option<f64>>,
}

impl PredictionArray {
    pub fn new(match_set: &MatchSet, population: &Population, num_actions: usize) -> Self {
        let mut weighted = vec![0.0; num_actions];
        let mut fitness_sum = vec![0.0; num_actions];
        let mut plain = vec![0.0; num_actions];
        let mut counts = vec![0usize; num_actions];

        for cl in match_set.iter(population) {
            let slot = cl.action.to_index();
            if slot >= num_actions {
                continue;
            }
            weighted[slot] += cl.prediction * cl.fitness;
            fitness_sum[slot] += cl.fitness;
            plain[slot] += cl.prediction;
            counts[slot] += 1;
        }

        let values = (0..num_actions)
            .map(|i| match counts[i] {
                0 => None,
                _ if fitness_sum[i] > 0.0 => Some(weighted[i] / fitness_sum[i]),
                n => Some(plain[i] / n as f64),
            })
            .collect();

        Self { values }
    }

    pub fn get(&self, action: Action) -> Option<f64> {
        self.values.get(action.to_index()).copied().flatten()
    }

    /// Actions advocated by the match set
    pub fn actions(&self) -> Vec<Action> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(i, _)| Action(i))
            .collect()
    }

    /// Highest prediction over advocated actions
    pub fn max(&self) -> Option<f64> {
        self.values
            .iter()
            .flatten()
            .copied()
            .fold(None, |best, v| Some(best.map_or(v, |b: f64| b.max(v))))
    }

    /// Every action sharing the highest prediction
    pub fn best_actions(&self) -> Vec<Action> {
        let Some(best) = self.max() else {
            return Vec::new();
        };
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == Some(best))
            .map(|(i, _)| Action(i))
            .collect()
    }

    /// Choose an action; `None` only for an empty array
    pub fn select<R>(&self, selection: Selection, rng: &mut R) -> Option<Action>
    where
        R: Rng + ?Sized,
    {
        let candidates = match selection {
            Selection::Explore => self.actions(),
            Selection::Exploit => self.best_actions(),
        };
        candidates.choose(rng).copied()
    }
}

/// Members of the match set advocating the chosen action
#[derive(Debug, Clone, Default)]
pub struct ActionSet {
    action: Option<Action>,
    keys: Vec<ClassifierKey>,
}

impl ActionSet {
    pub fn new(match_set: &MatchSet, action: Action) -> Self {
        Self {
            action: Some(action),
            keys: match_set
                .keys()
                .iter()
                .filter(|key| key.action == action)
                .cloned()
                .collect(),
        }
    }

    pub fn from_keys(action: Action, keys: Vec<ClassifierKey>) -> Self {
        Self {
            action: Some(action),
            keys,
        }
    }

    pub fn action(&self) -> Option<Action> {
        self.action
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

    /// Sum of numerosities of the members still present
    pub fn numerosity(&self, population: &Population) -> u32 {
        population.numerosity_of(&self.keys)
    }

    /// Forget members that deletion removed
    pub(crate) fn prune(&mut self, population: &Population) {
        self.keys.retain(|key| population.contains(key));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use lcs_core::XcsParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::state::Situation;

    fn with_stats(condition: &str, action: usize, prediction: f64, fitness: f64) -> Classifier {
        let mut cl = Classifier::new(condition.parse().unwrap(), Action(action), 0, &XcsParams::default());
        cl.prediction = prediction;
        cl.fitness = fitness;
        cl
    }

    fn setup(classifiers: Vec<Classifier>) -> (Population, MatchSet) {
        let mut population = Population::new();
        for cl in classifiers {
            population.insert(cl);
        }
        let situation: Situation = "101".parse().unwrap();
        let match_set = MatchSet::matching(&population, &situation);
        (population, match_set)
    }

    #[test]
    fn test_fitness_weighted_prediction() {
        let (population, match_set) = setup(vec![
            with_stats("1##", 0, 1000.0, 0.9),
            with_stats("##1", 0, 0.0, 0.1),
            with_stats("#0#", 1, 500.0, 0.5),
        ]);

        let array = PredictionArray::new(&match_set, &population, 3);
        assert!((array.get(Action(0)).unwrap() - 900.0).abs() < 1e-9);
        assert!((array.get(Action(1)).unwrap() - 500.0).abs() < 1e-9);
        assert_eq!(array.get(Action(2)), None);
        assert_eq!(array.actions(), vec![Action(0), Action(1)]);
    }

    #[test]
    fn test_zero_fitness_falls_back_to_mean() {
        let (population, match_set) = setup(vec![
            with_stats("1##", 0, 100.0, 0.0),
            with_stats("##1", 0, 300.0, 0.0),
        ]);

        let array = PredictionArray::new(&match_set, &population, 2);
        assert!((array.get(Action(0)).unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_exploit_picks_best() {
        let (population, match_set) = setup(vec![
            with_stats("1##", 0, 10.0, 0.5),
            with_stats("1##", 1, 900.0, 0.5),
        ]);
        let array = PredictionArray::new(&match_set, &population, 2);
        let mut rng = StdRng::seed_from_u64(0);

        for _ in 0..20 {
            assert_eq!(array.select(Selection::Exploit, &mut rng), Some(Action(1)));
        }
    }

    #[test]
    fn test_exploit_ties_are_uniform() {
        let (population, match_set) = setup(vec![
            with_stats("1##", 0, 500.0, 0.5),
            with_stats("1##", 1, 500.0, 0.5),
            with_stats("1##", 2, 10.0, 0.5),
        ]);
        let array = PredictionArray::new(&match_set, &population, 3);
        let mut rng = StdRng::seed_from_u64(4);

        let chosen: HashSet<Action> = (0..100)
            .filter_map(|_| array.select(Selection::Exploit, &mut rng))
            .collect();
        assert_eq!(chosen, HashSet::from([Action(0), Action(1)]));
    }

    #[test]
    fn test_explore_covers_all_present_actions() {
        let (population, match_set) = setup(vec![
            with_stats("1##", 0, 500.0, 0.5),
            with_stats("1##", 2, 10.0, 0.5),
        ]);
        let array = PredictionArray::new(&match_set, &population, 3);
        let mut rng = StdRng::seed_from_u64(8);

        let chosen: HashSet<Action> = (0..100)
            .filter_map(|_| array.select(Selection::Explore, &mut rng))
            .collect();
        assert_eq!(chosen, HashSet::from([Action(0), Action(2)]));
    }

    #[test]
    fn test_action_set_filters_match_set() {
        let (population, match_set) = setup(vec![
            with_stats("1##", 0, 500.0, 0.5),
            with_stats("##1", 0, 500.0, 0.5),
            with_stats("1##", 1, 10.0, 0.5),
        ]);

        let action_set = ActionSet::new(&match_set, Action(0));
        assert_eq!(action_set.len(), 2);
        assert_eq!(action_set.numerosity(&population), 2);
        assert!(action_set.iter(&population).all(|cl| cl.action == Action(0)));
    }

    #[test]
    fn test_empty_array_selects_nothing() {
        let array = PredictionArray::new(&MatchSet::default(), &Population::new(), 2);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(array.select(Selection::Exploit, &mut rng).is_none());
        assert!(array.max().is_none());
    }
}
