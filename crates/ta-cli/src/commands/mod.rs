//! CLI subcommand implementations.

pub mod run;
pub mod summary;
pub mod util;
