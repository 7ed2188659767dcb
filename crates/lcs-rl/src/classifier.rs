//! Classifier - a condition-action rule with learned payoff statistics

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use lcs_core::{LcsError, Result, XcsParams};

use crate::state::{Action, Situation};

/// One position of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Allele {
    Zero,
    One,
    /// `#` - matches either bit
    Wildcard,
}

impl Allele {
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            Allele::One
        } else {
            Allele::Zero
        }
    }

    pub fn matches(self, bit: bool) -> bool {
        match self {
            Allele::Wildcard => true,
            Allele::One => bit,
            Allele::Zero => !bit,
        }
    }

    pub fn is_wildcard(self) -> bool {
        self == Allele::Wildcard
    }

    pub fn symbol(self) -> char {
        match self {
            Allele::Zero => '0',
            Allele::One => '1',
            Allele::Wildcard => '#',
        }
    }
}

/// Fixed-length sequence over {0, 1, #}
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Condition(Vec<Allele>);

impl Condition {
    pub fn new(alleles: Vec<Allele>) -> Self {
        Self(alleles)
    }

    /// Condition matching exactly `situation`
    pub fn specific(situation: &Situation) -> Self {
        Self(situation.bits().iter().map(|&b| Allele::from_bit(b)).collect())
    }

    /// Covering condition: a copy of `situation` where each bit becomes `#`
    /// with probability `wildcard_probability`
    pub fn cover<R>(situation: &Situation, wildcard_probability: f64, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self(
            situation
                .bits()
                .iter()
                .map(|&bit| {
                    if rng.gen::<f64>() < wildcard_probability {
                        Allele::Wildcard
                    } else {
                        Allele::from_bit(bit)
                    }
                })
                .collect(),
        )
    }

    pub fn alleles(&self) -> &[Allele] {
        &self.0
    }

    pub(crate) fn alleles_mut(&mut self) -> &mut [Allele] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every position is `#` or equal to the input bit
    pub fn matches(&self, situation: &Situation) -> bool {
        self.0.len() == situation.len()
            && self
                .0
                .iter()
                .zip(situation.bits())
                .all(|(allele, &bit)| allele.matches(bit))
    }

    pub fn wildcard_count(&self) -> usize {
        self.0.iter().filter(|a| a.is_wildcard()).count()
    }

    /// Fraction of wildcard positions
    pub fn generality(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.wildcard_count() as f64 / self.0.len() as f64
    }

    /// Strictly more general: matches every input `other` matches, and more
    pub fn is_more_general(&self, other: &Condition) -> bool {
        if self.0.len() != other.0.len() || self.wildcard_count() <= other.wildcard_count() {
            return false;
        }
        self.0
            .iter()
            .zip(&other.0)
            .all(|(mine, theirs)| mine.is_wildcard() || mine == theirs)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for allele in &self.0 {
            write!(f, "{}", allele.symbol())?;
        }
        Ok(())
    }
}

impl FromStr for Condition {
    type Err = LcsError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(Allele::Zero),
                '1' => Ok(Allele::One),
                '#' => Ok(Allele::Wildcard),
                other => Err(LcsError::config(format!(
                    "invalid condition symbol '{other}' in \"{s}\""
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl Serialize for Condition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// κ for a given prediction error
pub fn accuracy(error: f64, params: &XcsParams) -> f64 {
    if error < params.error_threshold {
        1.0
    } else {
        params.accuracy_scale * (error / params.error_threshold).powf(-params.accuracy_exponent)
    }
}

/// Identity of a classifier in the population
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassifierKey {
    pub condition: Condition,
    pub action: Action,
}

/// A condition-action rule with its learned statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    pub condition: Condition,
    pub action: Action,
    pub prediction: f64,
    pub error: f64,
    pub fitness: f64,
    pub experience: u64,
    pub numerosity: u32,
    pub action_set_size: f64,
    pub timestamp: u64,
}

impl Classifier {
    /// Fresh classifier carrying the initial statistics p_I, ε_I, F_I
    pub fn new(condition: Condition, action: Action, timestamp: u64, params: &XcsParams) -> Self {
        Self {
            condition,
            action,
            prediction: params.initial_prediction,
            error: params.initial_error,
            fitness: params.initial_fitness,
            experience: 0,
            numerosity: 1,
            action_set_size: 1.0,
            timestamp,
        }
    }

    pub fn key(&self) -> ClassifierKey {
        ClassifierKey {
            condition: self.condition.clone(),
            action: self.action,
        }
    }

    pub fn matches(&self, situation: &Situation) -> bool {
        self.condition.matches(situation)
    }

    /// Fitness of a single micro-classifier
    pub fn micro_fitness(&self) -> f64 {
        self.fitness / f64::from(self.numerosity)
    }

    /// κ - 1 below the error threshold, power-law fall-off above it
    pub fn accuracy(&self, params: &XcsParams) -> f64 {
        accuracy(self.error, params)
    }

    /// Experienced and accurate enough to absorb more specific rules
    pub fn could_subsume(&self, params: &XcsParams) -> bool {
        self.experience >= params.subsumption_threshold && self.error < params.error_threshold
    }

    pub fn does_subsume(&self, other: &Classifier, params: &XcsParams) -> bool {
        self.action == other.action
            && self.could_subsume(params)
            && self.condition.is_more_general(&other.condition)
    }

    /// Deletion vote; raised for experienced classifiers of low fitness
    pub fn deletion_vote(&self, mean_fitness: f64, params: &XcsParams) -> f64 {
        let vote = self.action_set_size * f64::from(self.numerosity);
        let micro_fitness = self.micro_fitness();
        if self.experience > params.deletion_threshold
            && micro_fitness < params.deletion_fitness_fraction * mean_fitness
            && micro_fitness > 0.0
        {
            vote * mean_fitness / micro_fitness
        } else {
            vote
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {}  p={:.1} e={:.2} F={:.3} exp={} num={} as={:.1}",
            self.condition,
            self.action,
            self.prediction,
            self.error,
            self.fitness,
            self.experience,
            self.numerosity,
            self.action_set_size
        )
    }
}
