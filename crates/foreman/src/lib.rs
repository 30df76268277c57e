//! Foreman - coordination engine for fleets of AI agents
//!
//! A SQLite-backed store that hands tasks to agents by role and skill,
//! enforces exclusive task locks, walks tasks through a fixed lifecycle,
//! and carries the shared documents, mentions and service heartbeats the
//! agents use to talk to each other.
//!
//! Everything is reached through [`Coordinator`].

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

mod agents;
pub mod cli;
pub mod config;
mod coordinator;
pub mod db;
mod documents;
mod feed;
mod hierarchy;
mod locks;
mod mentions;
mod rows;
mod selector;
mod services;
mod tasks;
mod transitions;

pub use config::{load_config, Config};
pub use coordinator::Coordinator;
pub use db::Database;
pub use foreman_core::{Error, Result};
pub use transitions::AdvanceOutcome;
