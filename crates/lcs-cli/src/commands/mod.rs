//! CLI command modules

pub mod config;
pub mod inspect;
pub mod run;
