//! LCS RL - XCS learning classifier system
//!
//! This crate provides the XCS population, its matching, prediction,
//! credit assignment, genetic search and deletion, the engine driving them,
//! and the experiment runner used by the `lcs` binary.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod classifier;
pub mod engine;
pub mod environment;
pub mod experiment;
pub mod genetic;
pub mod matching;
pub mod population;
pub mod prediction;
pub mod reinforcement;
pub mod snapshot;
pub mod state;

pub use classifier::{Allele, Classifier, ClassifierKey, Condition};
pub use engine::{EngineStats, EpisodeSummary, Phase, StepMode, StepOutcome, XcsEngine};
pub use environment::{Environment, Multiplexer, Outcome, MULTIPLEXER_REWARD};
pub use experiment::{run_parallel, Experiment, ExperimentConfig, ExperimentReport, WindowStats};
pub use matching::MatchSet;
pub use population::{Population, PopulationStats};
pub use prediction::{ActionSet, PredictionArray, Selection};
pub use snapshot::{ClassifierRecord, PopulationSnapshot};
pub use state::{Action, Reward, Situation};
