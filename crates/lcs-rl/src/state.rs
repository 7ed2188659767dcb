//! Situation, Action, and Reward types for the classifier system

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use lcs_core::LcsError;

/// Reward value from environment
pub type Reward = f64;

/// Binary input sensed from the environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Situation(Vec<bool>);

impl Situation {
    pub fn new(bits: Vec<bool>) -> Self {
        Self(bits)
    }

    /// Build a situation of `len` bits from the low bits of `value`, most significant first
    pub fn from_bits(value: u64, len: usize) -> Self {
        Self(
            (0..len)
                .rev()
                .map(|shift| (value >> shift) & 1 == 1)
                .collect(),
        )
    }

    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.0 {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Situation {
    type Err = LcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(LcsError::protocol(format!(
                    "invalid situation symbol '{other}' in \"{s}\""
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// A discrete action of the environment, identified by its index
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Action(pub usize);

impl Action {
    /// Convert action to index for discrete action spaces
    pub fn to_index(self) -> usize {
        self.0
    }

    /// Every action of a space of `size` actions
    pub fn all(size: usize) -> impl Iterator<Item = Action> {
        (0..size).map(Action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_situation_parse_and_display() {
        let situation: Situation = "010011".parse().unwrap();
        assert_eq!(situation.len(), 6);
        assert!(situation.bits()[1]);
        assert_eq!(situation.to_string(), "010011");
    }

    #[test]
    fn test_situation_rejects_wildcards() {
        let err = "01#0".parse::<Situation>().unwrap_err();
        assert!(matches!(err, LcsError::EnvironmentProtocol(_)));
    }

    #[test]
    fn test_situation_from_bits() {
        assert_eq!(Situation::from_bits(0b101, 3).to_string(), "101");
        assert_eq!(Situation::from_bits(0b1, 4).to_string(), "0001");
        assert!(Situation::from_bits(0, 0).is_empty());
    }

    #[test]
    fn test_action_space() {
        assert_eq!(Action(1).to_index(), 1);
        assert_eq!(Action::all(3).collect::<Vec<_>>(), vec![Action(0), Action(1), Action(2)]);
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&Action(3)).unwrap();
        assert_eq!(json, "3");
        let parsed: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.to_index(), 3);
    }
}
