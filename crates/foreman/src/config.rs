//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: `<config dir>/foreman/config.toml`
//! 3. Project config: `.foreman/config.toml`
//! 4. Environment variables: `FOREMAN_*`
//! 5. CLI flags (`--db`)
//!
//! # Example Config
//!
//! ```toml
//! database = ".foreman/foreman.db"
//!
//! [selector]
//! poll_interval_ms = 2000
//! default_wait_secs = 180
//! max_wait_secs = 600
//!
//! [services]
//! stale_after_secs = 60
//!
//! [agents]
//! stale_after_secs = 300
//!
//! [tasks]
//! creator_roles = ["project_manager", "architect"]
//!
//! [feed]
//! settle_ms = 1000
//! ```

use std::{path::PathBuf, time::Duration};

use foreman_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Refuse to read config files larger than this.
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Path of the `SQLite` store.
    pub database: String,
    pub selector: SelectorConfig,
    pub services: ServicesConfig,
    pub agents: AgentsConfig,
    pub tasks: TasksConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorConfig {
    /// Re-poll interval while waiting for work.
    pub poll_interval_ms: u64,
    /// Wait used when the caller does not give one.
    pub default_wait_secs: u64,
    /// Upper bound on any requested wait.
    pub max_wait_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicesConfig {
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentsConfig {
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TasksConfig {
    /// Roles allowed to create tasks. Empty admits every project agent.
    pub creator_roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    /// How far the returned cursor trails the read.
    pub settle_ms: u64,
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT IMPLEMENTATIONS
// ═══════════════════════════════════════════════════════════════════════════

impl Default for Config {
    fn default() -> Self {
        Self {
            database: ".foreman/foreman.db".to_string(),
            selector: SelectorConfig::default(),
            services: ServicesConfig::default(),
            agents: AgentsConfig::default(),
            tasks: TasksConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            default_wait_secs: 180,
            max_wait_secs: 600,
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 60,
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 300,
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            creator_roles: vec!["project_manager".to_string(), "architect".to_string()],
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { settle_ms: 1000 }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PARTIAL CONFIG (explicit-key merge semantics)
// ═══════════════════════════════════════════════════════════════════════════

/// Config file contents. Only keys present in the file are `Some`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub selector: Option<PartialSelectorConfig>,
    #[serde(default)]
    pub services: Option<PartialStaleConfig>,
    #[serde(default)]
    pub agents: Option<PartialStaleConfig>,
    #[serde(default)]
    pub tasks: Option<PartialTasksConfig>,
    #[serde(default)]
    pub feed: Option<PartialFeedConfig>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialSelectorConfig {
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub default_wait_secs: Option<u64>,
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialStaleConfig {
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialTasksConfig {
    #[serde(default)]
    pub creator_roles: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PartialFeedConfig {
    #[serde(default)]
    pub settle_ms: Option<u64>,
}

impl Config {
    /// Merge a partial config, only overriding keys it sets.
    pub fn merge_partial(&mut self, partial: PartialConfig) {
        if let Some(database) = partial.database {
            self.database = database;
        }
        if let Some(selector) = partial.selector {
            if let Some(v) = selector.poll_interval_ms {
                self.selector.poll_interval_ms = v;
            }
            if let Some(v) = selector.default_wait_secs {
                self.selector.default_wait_secs = v;
            }
            if let Some(v) = selector.max_wait_secs {
                self.selector.max_wait_secs = v;
            }
        }
        if let Some(v) = partial.services.and_then(|s| s.stale_after_secs) {
            self.services.stale_after_secs = v;
        }
        if let Some(v) = partial.agents.and_then(|a| a.stale_after_secs) {
            self.agents.stale_after_secs = v;
        }
        if let Some(roles) = partial.tasks.and_then(|t| t.creator_roles) {
            self.tasks.creator_roles = roles;
        }
        if let Some(v) = partial.feed.and_then(|f| f.settle_ms) {
            self.feed.settle_ms = v;
        }
    }

    /// Apply environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns error if environment variable values are invalid
    fn apply_env_vars(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("FOREMAN_DATABASE") {
            self.database = value;
        }
        if let Some(v) = env_u64("FOREMAN_SELECTOR_POLL_INTERVAL_MS")? {
            self.selector.poll_interval_ms = v;
        }
        if let Some(v) = env_u64("FOREMAN_SELECTOR_DEFAULT_WAIT_SECS")? {
            self.selector.default_wait_secs = v;
        }
        if let Some(v) = env_u64("FOREMAN_SELECTOR_MAX_WAIT_SECS")? {
            self.selector.max_wait_secs = v;
        }
        if let Some(v) = env_u64("FOREMAN_SERVICES_STALE_AFTER_SECS")? {
            self.services.stale_after_secs = v;
        }
        if let Some(v) = env_u64("FOREMAN_AGENTS_STALE_AFTER_SECS")? {
            self.agents.stale_after_secs = v;
        }
        if let Ok(value) = std::env::var("FOREMAN_TASKS_CREATOR_ROLES") {
            self.tasks.creator_roles = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = env_u64("FOREMAN_FEED_SETTLE_MS")? {
            self.feed.settle_ms = v;
        }
        Ok(())
    }

    /// Validate config values
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::InvalidConfig("database path cannot be empty".into()));
        }
        if !(10..=60_000).contains(&self.selector.poll_interval_ms) {
            return Err(Error::InvalidConfig(
                "selector.poll_interval_ms must be 10-60000".into(),
            ));
        }
        if self.selector.default_wait_secs > self.selector.max_wait_secs {
            return Err(Error::InvalidConfig(
                "selector.default_wait_secs cannot exceed selector.max_wait_secs".into(),
            ));
        }
        if self.services.stale_after_secs == 0 {
            return Err(Error::InvalidConfig(
                "services.stale_after_secs must be positive".into(),
            ));
        }
        if self.agents.stale_after_secs == 0 {
            return Err(Error::InvalidConfig(
                "agents.stale_after_secs must be positive".into(),
            ));
        }
        for role in &self.tasks.creator_roles {
            foreman_core::Role::parse(role.as_str())
                .map_err(|e| Error::InvalidConfig(format!("tasks.creator_roles: {e}")))?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.selector.poll_interval_ms)
    }

    #[must_use]
    pub const fn default_wait(&self) -> Duration {
        Duration::from_secs(self.selector.default_wait_secs)
    }

    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.selector.max_wait_secs)
    }

    #[must_use]
    pub fn service_stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(saturating_i64(self.services.stale_after_secs))
    }

    #[must_use]
    pub fn agent_stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(saturating_i64(self.agents.stale_after_secs))
    }

    #[must_use]
    pub fn feed_settle(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(saturating_i64(self.feed.settle_ms))
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    std::env::var(name).ok().map_or(Ok(None), |value| {
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("Invalid {name} value: {e}")))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════

/// Load configuration from all sources
///
/// # Errors
///
/// Returns error if:
/// - Config file is malformed TOML or has unknown keys
/// - Config values fail validation
pub async fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Ok(global_path) = global_config_path() {
        match load_partial_toml_file(&global_path).await {
            Ok(global) => config.merge_partial(global),
            Err(Error::IoError(_)) => {}
            Err(e) => return Err(e),
        }
    }

    if let Ok(project_path) = project_config_path() {
        match load_partial_toml_file(&project_path).await {
            Ok(project) => config.merge_partial(project),
            Err(Error::IoError(_)) => {}
            Err(e) => return Err(e),
        }
    }

    config.apply_env_vars()?;
    config.validate()?;

    tracing::debug!(database = %config.database, "configuration loaded");
    Ok(config)
}

fn project_config_path() -> Result<PathBuf> {
    std::env::current_dir()
        .map(|dir| dir.join(".foreman/config.toml"))
        .map_err(|e| Error::IoError(format!("Failed to get current directory: {e}")))
}

fn global_config_path() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "foreman")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
        .ok_or_else(|| Error::IoError("Failed to determine global config directory".to_string()))
}

/// Load a TOML file into a `PartialConfig`.
///
/// # Errors
///
/// Returns `IoError` if the file cannot be read, `ValidationError` if it is
/// oversized, and `ParseError` for malformed TOML or unknown keys.
pub async fn load_partial_toml_file(path: &std::path::Path) -> Result<PartialConfig> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        Error::IoError(format!(
            "Failed to read config file metadata {}: {e}",
            path.display()
        ))
    })?;

    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(Error::ValidationError(format!(
            "Config file {} exceeds maximum size of {MAX_CONFIG_FILE_SIZE} bytes",
            path.display()
        )));
    }

    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::IoError(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    toml::from_str(&content)
        .map_err(|e| Error::ParseError(format!("Failed to parse config: {}: {e}", path.display())))
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════
