//! Calendar time analyzer CLI library.
//!
//! This crate provides the CLI interface for the time analyzer.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, RunArgs};
pub use config::Config;
