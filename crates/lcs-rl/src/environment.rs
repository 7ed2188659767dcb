//! Environment contract and the Boolean multiplexer reference problem

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use lcs_core::{LcsError, Result};

use crate::state::{Action, Reward, Situation};

/// Result of executing an action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub reward: Reward,
    /// The task (episode) ended with this action
    pub end_of_task: bool,
}

/// Trait for environments the classifier system learns from
pub trait Environment: Send {
    /// Environment name
    fn name(&self) -> &str;

    /// Length of every sensed situation
    fn situation_length(&self) -> usize;

    /// Number of discrete actions
    fn num_actions(&self) -> usize;

    /// Start a new task and return its first situation
    fn reset(&mut self) -> Situation;

    /// Current situation
    fn sense(&self) -> Situation;

    /// Execute an action in the current situation
    fn act(&mut self, action: Action) -> Result<Outcome>;

    /// Largest reward a single action can earn
    fn max_reward(&self) -> Reward;
}

/// Reward paid for the correct multiplexer output
pub const MULTIPLEXER_REWARD: Reward = 1000.0;

/// Boolean multiplexer: `k` address bits select one of `2^k` data bits, and
/// the correct action is the value of the selected bit
#[derive(Debug, Clone)]
pub struct Multiplexer {
    address_bits: usize,
    current: Situation,
    rng: StdRng,
    name: String,
}

impl Multiplexer {
    pub fn new(address_bits: usize, seed: u64) -> Result<Self> {
        if address_bits == 0 || address_bits > 5 {
            return Err(LcsError::config(format!(
                "multiplexer address_bits must lie in 1..=5, got {address_bits}"
            )));
        }
        let length = address_bits + (1 << address_bits);
        Ok(Self {
            address_bits,
            current: Situation::from_bits(0, length),
            rng: StdRng::seed_from_u64(seed),
            name: format!("{length}-multiplexer"),
        })
    }

    /// The correct output for `situation`; `None` when it has the wrong length
    pub fn answer(&self, situation: &Situation) -> Option<bool> {
        if situation.len() != self.situation_length() {
            return None;
        }
        let bits = situation.bits();
        let address = bits[..self.address_bits]
            .iter()
            .fold(0usize, |acc, &bit| (acc << 1) | usize::from(bit));
        bits.get(self.address_bits + address).copied()
    }
}

impl Environment for Multiplexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn situation_length(&self) -> usize {
        self.address_bits + (1 << self.address_bits)
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Situation {
        let length = self.situation_length();
        self.current = Situation::new((0..length).map(|_| self.rng.gen_bool(0.5)).collect());
        self.current.clone()
    }

    fn sense(&self) -> Situation {
        self.current.clone()
    }

    fn act(&mut self, action: Action) -> Result<Outcome> {
        if action.to_index() >= self.num_actions() {
            return Err(LcsError::protocol(format!(
                "action {action} is outside the multiplexer's 2 actions"
            )));
        }
        let correct = self.answer(&self.current).map(usize::from).ok_or_else(|| {
            LcsError::protocol(format!("{} holds a malformed situation", self.name))
        })?;
        let reward = if action.to_index() == correct {
            MULTIPLEXER_REWARD
        } else {
            0.0
        };
        Ok(Outcome {
            reward,
            end_of_task: true,
        })
    }

    fn max_reward(&self) -> Reward {
        MULTIPLEXER_REWARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_multiplexer_answers() {
        let mux = Multiplexer::new(2, 0).unwrap();
        assert_eq!(mux.situation_length(), 6);
        assert_eq!(mux.name(), "6-multiplexer");

        // address 00 selects data bit 0
        assert_eq!(mux.answer(&"001000".parse().unwrap()), Some(true));
        assert_eq!(mux.answer(&"000111".parse().unwrap()), Some(false));
        // address 10 selects data bit 2
        assert_eq!(mux.answer(&"100010".parse().unwrap()), Some(true));
        // address 11 selects data bit 3
        assert_eq!(mux.answer(&"110001".parse().unwrap()), Some(true));
    }

    #[test]
    fn test_answer_rejects_wrong_length() {
        let mux = Multiplexer::new(2, 0).unwrap();
        assert_eq!(mux.answer(&"0010".parse().unwrap()), None);
        assert_eq!(mux.answer(&"0010001".parse().unwrap()), None);
        assert_eq!(mux.answer(&Situation::new(Vec::new())), None);
    }

    #[test]
    fn test_reward_for_correct_action() {
        let mut mux = Multiplexer::new(2, 17).unwrap();
        for _ in 0..20 {
            let situation = mux.reset();
            assert_eq!(situation.len(), 6);
            assert_eq!(mux.sense(), situation);

            let correct = Action(usize::from(mux.answer(&situation).unwrap()));
            let wrong = Action(1 - correct.to_index());
            assert_eq!(mux.act(correct).unwrap().reward, MULTIPLEXER_REWARD);
            let outcome = mux.act(wrong).unwrap();
            assert_eq!(outcome.reward, 0.0);
            assert!(outcome.end_of_task);
        }
    }

    #[test]
    fn test_invalid_action_is_protocol_error() {
        let mut mux = Multiplexer::new(2, 0).unwrap();
        mux.reset();
        assert!(matches!(
            mux.act(Action(2)),
            Err(LcsError::EnvironmentProtocol(_))
        ));
    }

    #[test]
    fn test_address_bits_bounds() {
        assert!(Multiplexer::new(0, 0).is_err());
        assert!(Multiplexer::new(6, 0).is_err());
        assert_eq!(Multiplexer::new(3, 0).unwrap().situation_length(), 11);
    }
}
