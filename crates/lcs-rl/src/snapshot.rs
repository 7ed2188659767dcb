//! Population snapshots - classifier records for inspection and checkpointing

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use lcs_core::{LcsError, Result};

use crate::classifier::{Classifier, Condition};
use crate::population::Population;
use crate::state::Action;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// One classifier as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRecord {
    pub condition: String,
    pub action: usize,
    pub prediction: f64,
    pub error: f64,
    pub fitness: f64,
    pub experience: u64,
    pub numerosity: u32,
    pub action_set_size: f64,
    #[serde(default)]
    pub timestamp: u64,
}

impl From<&Classifier> for ClassifierRecord {
    fn from(cl: &Classifier) -> Self {
        Self {
            condition: cl.condition.to_string(),
            action: cl.action.to_index(),
            prediction: cl.prediction,
            error: cl.error,
            fitness: cl.fitness,
            experience: cl.experience,
            numerosity: cl.numerosity,
            action_set_size: cl.action_set_size,
            timestamp: cl.timestamp,
        }
    }
}

impl TryFrom<&ClassifierRecord> for Classifier {
    type Error = LcsError;

    fn try_from(record: &ClassifierRecord) -> Result<Self> {
        let condition: Condition = record.condition.parse()?;
        if record.numerosity == 0 {
            return Err(LcsError::config(format!(
                "classifier {} has zero numerosity",
                record.condition
            )));
        }
        for (name, value) in [
            ("error", record.error),
            ("fitness", record.fitness),
            ("action_set_size", record.action_set_size),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(LcsError::config(format!(
                    "classifier {} has invalid {} {}",
                    record.condition, name, value
                )));
            }
        }
        if !record.prediction.is_finite() {
            return Err(LcsError::config(format!(
                "classifier {} has invalid prediction {}",
                record.condition, record.prediction
            )));
        }
        Ok(Classifier {
            condition,
            action: Action(record.action),
            prediction: record.prediction,
            error: record.error,
            fitness: record.fitness,
            experience: record.experience,
            numerosity: record.numerosity,
            action_set_size: record.action_set_size,
            timestamp: record.timestamp,
        })
    }
}

/// A population as a list of classifier records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub condition_length: usize,
    pub num_actions: usize,
    pub classifiers: Vec<ClassifierRecord>,
}

impl PopulationSnapshot {
    pub fn capture(population: &Population, condition_length: usize, num_actions: usize) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            condition_length,
            num_actions,
            classifiers: population.iter().map(ClassifierRecord::from).collect(),
        }
    }

    /// Rebuild the population; records sharing a rule are merged
    pub fn to_population(&self) -> Result<Population> {
        if self.version > SNAPSHOT_VERSION {
            return Err(LcsError::config(format!(
                "snapshot version {} is newer than supported {}",
                self.version, SNAPSHOT_VERSION
            )));
        }

        let mut population = Population::new();
        for record in &self.classifiers {
            let classifier = Classifier::try_from(record)?;
            if classifier.condition.len() != self.condition_length {
                return Err(LcsError::config(format!(
                    "condition {} does not have {} bits",
                    record.condition, self.condition_length
                )));
            }
            population.insert(classifier);
        }
        Ok(population)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        info!("Saved {} classifiers to {:?}", self.classifiers.len(), path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}
