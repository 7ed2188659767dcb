//! Credit assignment - prediction, error, set size and fitness updates

use tracing::trace;

use lcs_core::XcsParams;

use crate::classifier::{accuracy, ClassifierKey};
use crate::population::Population;
use crate::prediction::{ActionSet, PredictionArray};
use crate::state::Reward;

/// Payoff credited to an action set
///
/// At the end of a task the immediate reward is used directly; otherwise the
/// reward is combined with the discounted best prediction of the next step.
pub fn payoff(
    reward: Reward,
    next: Option<&PredictionArray>,
    params: &XcsParams,
) -> Reward {
    match next.and_then(PredictionArray::max) {
        Some(best) => reward + params.discount_factor * best,
        None => reward,
    }
}

struct Update {
    key: ClassifierKey,
    prediction: f64,
    error: f64,
    action_set_size: f64,
    weighted_accuracy: f64,
}

/// Apply one reinforcement step to every member of `action_set`
///
/// All new statistics are computed from a snapshot of the set before any
/// member is written, so the outcome does not depend on member order.
/// Returns the number of classifiers updated.
pub fn update_action_set(
    population: &mut Population,
    action_set: &ActionSet,
    payoff: Reward,
    params: &XcsParams,
) -> usize {
    let beta = params.learning_rate;
    let set_size = f64::from(action_set.numerosity(population));

    let updates: Vec<Update> = action_set
        .iter(population)
        .map(|cl| {
            let error = cl.error + beta * ((payoff - cl.prediction).abs() - cl.error);
            let prediction = cl.prediction + beta * (payoff - cl.prediction);
            let action_set_size = cl.action_set_size + beta * (set_size - cl.action_set_size);
            let weighted_accuracy = accuracy(error, params) * f64::from(cl.numerosity);

            Update {
                key: cl.key(),
                prediction,
                error,
                action_set_size,
                weighted_accuracy,
            }
        })
        .collect();

    let accuracy_sum: f64 = updates.iter().map(|u| u.weighted_accuracy).sum();

    for update in &updates {
        if let Some(cl) = population.get_mut(&update.key) {
            cl.experience += 1;
            cl.prediction = update.prediction;
            cl.error = update.error;
            cl.action_set_size = update.action_set_size;
            if accuracy_sum > 0.0 {
                let relative = update.weighted_accuracy / accuracy_sum;
                cl.fitness += beta * (relative - cl.fitness);
            }
            trace!("Credited {}", cl);
        }
    }

    updates.len()
}
