//! Command-line surface: one subcommand per coordinator operation.

mod commands;
pub mod error;
pub mod handlers;
pub mod setup;

pub use commands::build_cli;
