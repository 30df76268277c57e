//! Project, Epic, Feature: the containers above a Task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, ProjectId, Result};

/// Top-level scope. Agents, tasks, documents and services all live in one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub id: i64,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A Feature belongs to exactly one Epic; `project_id` is denormalised
/// from the Epic so that project-scoped queries need no join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: i64,
    pub epic_id: i64,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Reject blank titles and names.
///
/// # Errors
///
/// Returns `ValidationError` if `value` is empty after trimming.
pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::ValidationError(format!("{field} cannot be empty")));
    }
    Ok(())
}
