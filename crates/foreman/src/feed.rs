//! Change feed.
//!
//! Clients poll with the cursor from their previous call. Every mutable row
//! carries a fixed-width timestamp of its last change, so "changed after the
//! cursor" is a plain string comparison.

use chrono::{DateTime, Utc};
use foreman_core::{format_timestamp, AgentId, ChangeSet, ProjectId, Result};

use crate::{
    db::db_error,
    rows::{
        parse_document_row, parse_mention_row, parse_service_row, parse_task_row,
        DOCUMENT_COLUMNS, MENTION_COLUMNS, SERVICE_COLUMNS, TASK_COLUMNS,
    },
    Coordinator,
};

impl Coordinator {
    /// Rows in a project changed strictly after `since`.
    ///
    /// With `agent_id`, mentions are limited to that agent and its
    /// `last_seen` is refreshed. The returned cursor trails the read by
    /// `feed.settle_ms`, so some rows may be delivered twice.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project, or for an agent that is not
    /// registered in it.
    pub async fn get_changes(
        &self,
        project_id: &ProjectId,
        since: DateTime<Utc>,
        agent_id: Option<&AgentId>,
    ) -> Result<ChangeSet> {
        let started = self.now();
        self.get_project(project_id).await?;
        if let Some(agent_id) = agent_id {
            self.require_agent_in(agent_id, project_id).await?;
        }

        let since = format_timestamp(since);
        let now = format_timestamp(started);

        let tasks = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE project_id = ? AND updated_at > ?
             ORDER BY updated_at, id"
        ))
        .bind(project_id.as_str())
        .bind(&since)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_task_row)
        .collect::<Result<Vec<_>>>()?;

        let documents = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE project_id = ? AND updated_at > ?
               AND (expires_at IS NULL OR expires_at > ?)
             ORDER BY updated_at, id"
        ))
        .bind(project_id.as_str())
        .bind(&since)
        .bind(&now)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_document_row)
        .collect::<Result<Vec<_>>>()?;

        let target = agent_id.map(AgentId::as_str);
        let mentions = sqlx::query(&format!(
            "SELECT {MENTION_COLUMNS} FROM mentions
             WHERE project_id = ? AND updated_at > ?
               AND (? IS NULL OR target_agent = ?)
             ORDER BY updated_at, id"
        ))
        .bind(project_id.as_str())
        .bind(&since)
        .bind(target)
        .bind(target)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_mention_row)
        .collect::<Result<Vec<_>>>()?;

        let services = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services
             WHERE project_id = ? AND last_heartbeat > ?
             ORDER BY last_heartbeat, name"
        ))
        .bind(project_id.as_str())
        .bind(&since)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(|row| parse_service_row(row).map(|record| self.with_health(record)))
        .collect::<Result<Vec<_>>>()?;

        if let Some(agent_id) = agent_id {
            self.touch_agent(agent_id).await?;
        }

        let changes = ChangeSet {
            cursor: started - self.config().feed_settle(),
            tasks,
            documents,
            mentions,
            services,
        };
        tracing::debug!(
            project = %project_id,
            tasks = changes.tasks.len(),
            documents = changes.documents.len(),
            mentions = changes.mentions.len(),
            services = changes.services.len(),
            "changes read"
        );
        Ok(changes)
    }
}
