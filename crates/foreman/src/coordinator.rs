//! The coordination engine.
//!
//! [`Coordinator`] is the whole operation surface. Its methods are spread
//! over one module per component (`hierarchy`, `agents`, `tasks`, `locks`,
//! `transitions`, `selector`, `documents`, `mentions`, `feed`,
//! `services`); this module only holds the shared state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use foreman_core::{format_timestamp, Clock, Result, SystemClock};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{
    config::Config,
    db::{db_error, Database},
};

/// Handle to a coordination store. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Coordinator {
    db: Database,
    config: Arc<Config>,
    clock: Arc<dyn Clock>,
}

impl Coordinator {
    /// Create a coordinator on the wall clock.
    #[must_use]
    pub fn new(db: Database, config: Config) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    /// Create a coordinator with an explicit time source.
    #[must_use]
    pub fn with_clock(db: Database, config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            clock,
        }
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) const fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current time in storage format.
    pub(crate) fn stamp(&self) -> String {
        format_timestamp(self.now())
    }

    /// Open a transaction that already holds the store's write lock.
    ///
    /// Rows a change-feed reader can see must be stamped after this
    /// returns. A writer that waited on the lock then stamps a time later
    /// than any feed read that finished while it waited.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool()
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(db_error)
    }
}
