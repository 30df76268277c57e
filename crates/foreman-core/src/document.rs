//! Shared documents and task comments. Both are mention sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{hierarchy::require_text, AgentId, ProjectId, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
    Note,
    Specification,
    Guideline,
    Report,
    Handoff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub project_id: ProjectId,
    pub doc_type: DocumentType,
    pub title: String,
    pub content: String,
    pub author_id: AgentId,
    /// Agents referenced from `content`, derived on write.
    pub mentions: Vec<AgentId>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Creation request. The project is the author's project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub author_id: AgentId,
    pub title: String,
    pub content: String,
    pub doc_type: DocumentType,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewDocument {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank title.
    pub fn validate(&self) -> Result<()> {
        require_text("document title", &self.title)
    }
}

/// Free-form remark on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: i64,
    pub task_id: i64,
    pub project_id: ProjectId,
    pub author_id: AgentId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
