//! CLI subcommand implementations.

pub mod analyze;
pub mod blocks;
pub mod csv;
pub mod game;
pub mod import;
pub mod util;
