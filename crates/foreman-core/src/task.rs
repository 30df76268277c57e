//! Tasks: the atomic assignable unit of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{hierarchy::require_text, AgentId, Error, ProjectId, Result, Role, SkillLevel, TaskStatus};

/// Lowest accepted difficulty.
pub const MIN_DIFFICULTY: u8 = 1;
/// Highest accepted difficulty.
pub const MAX_DIFFICULTY: u8 = 5;

/// Informational size marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Complexity {
    Minor,
    Major,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: ProjectId,
    pub feature_id: i64,
    pub title: String,
    pub description: String,
    pub target_role: Role,
    pub target_skill: SkillLevel,
    pub difficulty: u8,
    pub complexity: Complexity,
    pub status: TaskStatus,
    /// Current lock holder. Exclusive while set.
    pub locked_by: Option<AgentId>,
    pub locked_at: Option<DateTime<Utc>>,
    /// Last agent to move the task forward. Advisory.
    pub assigned_to: Option<AgentId>,
    pub branch_name: Option<String>,
    pub created_by: AgentId,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    #[must_use]
    pub fn is_locked_by(&self, agent: &AgentId) -> bool {
        self.locked_by.as_ref() == Some(agent)
    }
}

/// Creation request. The project comes from the feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub feature_id: i64,
    pub title: String,
    pub description: String,
    pub target_role: Role,
    pub target_skill: SkillLevel,
    pub difficulty: u8,
    pub complexity: Complexity,
    pub created_by: AgentId,
}

impl NewTask {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank title or a difficulty outside 1-5.
    pub fn validate(&self) -> Result<()> {
        require_text("task title", &self.title)?;
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(Error::ValidationError(format!(
                "difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {}",
                self.difficulty
            )));
        }
        Ok(())
    }
}

/// Project-scoped task query. Unset fields do not filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub project_id: ProjectId,
    pub status: Option<TaskStatus>,
    pub target_role: Option<Role>,
    pub feature_id: Option<i64>,
    pub locked_by: Option<AgentId>,
}

impl TaskFilter {
    #[must_use]
    pub const fn project(project_id: ProjectId) -> Self {
        Self {
            project_id,
            status: None,
            target_role: None,
            feature_id: None,
            locked_by: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.target_role = Some(role);
        self
    }

    #[must_use]
    pub fn with_feature(mut self, feature_id: i64) -> Self {
        self.feature_id = Some(feature_id);
        self
    }

    #[must_use]
    pub fn with_locked_by(mut self, agent: AgentId) -> Self {
        self.locked_by = Some(agent);
        self
    }
}

/// Immutable record of one status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub id: i64,
    pub task_id: i64,
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    pub agent_id: AgentId,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One line of a task's running notes, tagged with the status it was
/// recorded against. Lines are joined with `\n` in storage.
#[must_use]
pub fn note_line(status: TaskStatus, note: &str) -> String {
    format!("[{status}] {}", note.trim())
}
