//! HLO analysis CLI library.
//!
//! This crate provides the CLI interface for analyzing recorded sessions.

mod cli;
pub mod commands;
mod config;

pub use cli::{AnalyzeArgs, Cli, Commands};
pub use config::Config;
