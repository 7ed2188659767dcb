//! Genetic component - niche GA over action sets
//!
//! The GA fires on an action set once the numerosity-weighted mean time since
//! its members last took part in a GA exceeds θ_GA. Two parents are selected,
//! copied, recombined and mutated; the offspring are merged into the
//! population (or subsumed by a more general member), and every insertion is
//! followed by deletion when the population is over capacity.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lcs_core::{CrossoverMethod, MutationMethod, SelectionMethod, XcsParams};

use crate::classifier::{Allele, Classifier, ClassifierKey, Condition};
use crate::population::Population;
use crate::prediction::ActionSet;
use crate::state::{Action, Situation};

/// What one GA invocation did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaReport {
    pub crossed: bool,
    pub inserted: usize,
    pub subsumed: usize,
    pub deleted: usize,
}

/// Whether the GA is due on `action_set` at `time`
pub fn is_due(population: &Population, action_set: &ActionSet, time: u64, params: &XcsParams) -> bool {
    let mut weighted = 0.0;
    let mut numerosity = 0.0;
    for cl in action_set.iter(population) {
        weighted += cl.timestamp as f64 * f64::from(cl.numerosity);
        numerosity += f64::from(cl.numerosity);
    }
    numerosity > 0.0 && time as f64 - weighted / numerosity > params.ga_threshold
}

/// Run the GA on `action_set` if it is due
pub fn run<R>(
    population: &mut Population,
    action_set: &ActionSet,
    situation: &Situation,
    num_actions: usize,
    time: u64,
    params: &XcsParams,
    rng: &mut R,
) -> Option<GaReport>
where
    R: Rng + ?Sized,
{
    if !is_due(population, action_set, time, params) {
        return None;
    }

    for key in action_set.keys() {
        if let Some(cl) = population.get_mut(key) {
            cl.timestamp = time;
        }
    }

    let members: Vec<Classifier> = action_set.iter(population).cloned().collect();
    let first = select_parent(&members, params, rng)?.clone();
    let second = select_parent(&members, params, rng)?.clone();

    let mut children = [offspring(&first, time), offspring(&second, time)];
    let mut report = GaReport::default();

    if rng.gen::<f64>() < params.crossover_rate {
        let [left, right] = &mut children;
        crossover(&mut left.condition, &mut right.condition, params.crossover, rng);

        let prediction = (first.prediction + second.prediction) / 2.0;
        let error = (first.error + second.error) / 2.0;
        let fitness = (first.fitness + second.fitness) / 2.0;
        for child in &mut children {
            child.prediction = prediction;
            child.error = error;
            child.fitness = fitness;
        }
        report.crossed = true;
    }

    for child in &mut children {
        child.fitness *= params.fitness_reduction;
        mutate(child, situation, num_actions, params, rng);
    }

    for child in children {
        if params.do_ga_subsumption {
            if let Some(key) = find_subsumer(population, &[&first, &second], action_set, &child, params) {
                population.increment(&key);
                report.subsumed += 1;
                report.deleted += population.enforce_capacity(params, rng);
                continue;
            }
        }
        population.insert(child);
        report.inserted += 1;
        report.deleted += population.enforce_capacity(params, rng);
    }

    debug!(
        "GA at t={}: inserted={}, subsumed={}, deleted={}",
        time, report.inserted, report.subsumed, report.deleted
    );
    Some(report)
}

/// Copy of a parent with reset counters
fn offspring(parent: &Classifier, time: u64) -> Classifier {
    Classifier {
        numerosity: 1,
        experience: 0,
        timestamp: time,
        ..parent.clone()
    }
}

/// Pick one parent according to the configured selection scheme
pub fn select_parent<'a, R>(
    members: &'a [Classifier],
    params: &XcsParams,
    rng: &mut R,
) -> Option<&'a Classifier>
where
    R: Rng + ?Sized,
{
    if members.is_empty() {
        return None;
    }
    match params.selection {
        SelectionMethod::Roulette => roulette(members, rng),
        SelectionMethod::Tournament => tournament(members, params.tournament_fraction, rng),
    }
}

fn roulette<'a, R>(members: &'a [Classifier], rng: &mut R) -> Option<&'a Classifier>
where
    R: Rng + ?Sized,
{
    let total: f64 = members.iter().map(|cl| cl.fitness).sum();
    if total <= 0.0 {
        return members.get(rng.gen_range(0..members.len()));
    }
    let point = rng.gen::<f64>() * total;
    let mut acc = 0.0;
    members
        .iter()
        .find(|cl| {
            acc += cl.fitness;
            acc > point
        })
        .or_else(|| members.last())
}

/// Every micro-classifier enters with probability `fraction`; the entrant
/// with the highest micro-fitness wins
fn tournament<'a, R>(members: &'a [Classifier], fraction: f64, rng: &mut R) -> Option<&'a Classifier>
where
    R: Rng + ?Sized,
{
    let mut winner: Option<&Classifier> = None;
    for cl in members {
        let entered = (0..cl.numerosity).any(|_| rng.gen::<f64>() < fraction);
        if entered && winner.map_or(true, |w| cl.micro_fitness() > w.micro_fitness()) {
            winner = Some(cl);
        }
    }
    winner.or_else(|| members.get(rng.gen_range(0..members.len())))
}

/// Recombine two conditions in place
pub fn crossover<R>(left: &mut Condition, right: &mut Condition, method: CrossoverMethod, rng: &mut R)
where
    R: Rng + ?Sized,
{
    let len = left.len().min(right.len());
    if len == 0 {
        return;
    }
    let (a, b) = (left.alleles_mut(), right.alleles_mut());

    match method {
        CrossoverMethod::OnePoint => {
            let point = rng.gen_range(0..len);
            for i in point..len {
                std::mem::swap(&mut a[i], &mut b[i]);
            }
        }
        CrossoverMethod::TwoPoint => {
            let mut x = rng.gen_range(0..=len);
            let mut y = rng.gen_range(0..=len);
            if x > y {
                std::mem::swap(&mut x, &mut y);
            }
            for i in x..y {
                std::mem::swap(&mut a[i], &mut b[i]);
            }
        }
        CrossoverMethod::Uniform => {
            for i in 0..len {
                if rng.gen_bool(0.5) {
                    std::mem::swap(&mut a[i], &mut b[i]);
                }
            }
        }
    }
}

/// Mutate condition positions and the action with probability μ each.
/// Returns whether anything changed.
pub fn mutate<R>(
    child: &mut Classifier,
    situation: &Situation,
    num_actions: usize,
    params: &XcsParams,
    rng: &mut R,
) -> bool
where
    R: Rng + ?Sized,
{
    let mut changed = false;
    let bits = situation.bits();

    for (i, allele) in child.condition.alleles_mut().iter_mut().enumerate() {
        if rng.gen::<f64>() >= params.mutation_rate {
            continue;
        }
        *allele = match params.mutation {
            MutationMethod::Niche => match *allele {
                Allele::Wildcard => bits
                    .get(i)
                    .map_or(Allele::Wildcard, |&bit| Allele::from_bit(bit)),
                _ => Allele::Wildcard,
            },
            MutationMethod::Free => {
                let others: Vec<Allele> = [Allele::Zero, Allele::One, Allele::Wildcard]
                    .into_iter()
                    .filter(|a| *a != *allele)
                    .collect();
                others[rng.gen_range(0..others.len())]
            }
        };
        changed = true;
    }

    if num_actions > 1 && rng.gen::<f64>() < params.mutation_rate {
        let shift = rng.gen_range(1..num_actions);
        child.action = Action((child.action.to_index() + shift) % num_actions);
        changed = true;
    }

    changed
}

/// A parent, or failing that any member of the action set, that subsumes `child`
fn find_subsumer(
    population: &Population,
    parents: &[&Classifier],
    action_set: &ActionSet,
    child: &Classifier,
    params: &XcsParams,
) -> Option<ClassifierKey> {
    parents
        .iter()
        .map(|parent| parent.key())
        .chain(action_set.keys().iter().cloned())
        .find(|key| {
            population
                .get(key)
                .is_some_and(|cl| cl.does_subsume(child, params))
        })
}
