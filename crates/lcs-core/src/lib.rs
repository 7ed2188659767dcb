//! LCS Core - Error taxonomy and learning parameters
//!
//! This crate provides the foundational types shared by the classifier
//! system and its command line front end.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod params;

pub use error::{LcsError, Result};
pub use params::{CrossoverMethod, MutationMethod, SelectionMethod, XcsParams};
