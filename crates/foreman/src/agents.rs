//! Agent registry.
//!
//! Registration is an idempotent upsert keyed by agent id. An agent's
//! current task is derived from the task table, never stored.

use foreman_core::{Agent, AgentId, AgentPresence, Error, NewAgent, ProjectId, Result, Role, Task};

use crate::{
    db::db_error,
    rows::{parse_agent_row, parse_task_row, AGENT_COLUMNS, TASK_COLUMNS},
    Coordinator,
};

impl Coordinator {
    /// Register an agent, or update role/skill/mode if it already exists in
    /// the same project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project, `ValidationError` if the id
    /// is registered in a different project.
    pub async fn register_agent(&self, agent: &NewAgent) -> Result<Agent> {
        self.get_project(&agent.project_id).await?;
        let now = self.stamp();

        let result = sqlx::query(
            "INSERT INTO agents (id, project_id, role, skill_level, connection_mode, registered_at, last_seen)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 role = excluded.role,
                 skill_level = excluded.skill_level,
                 connection_mode = excluded.connection_mode,
                 last_seen = excluded.last_seen
             WHERE agents.project_id = excluded.project_id",
        )
        .bind(agent.id.as_str())
        .bind(agent.project_id.as_str())
        .bind(agent.role.as_str())
        .bind(agent.skill_level.as_str())
        .bind(agent.connection_mode.to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::ValidationError(format!(
                "agent '{}' is registered in another project",
                agent.id
            )));
        }

        tracing::info!(
            agent = %agent.id,
            project = %agent.project_id,
            role = %agent.role,
            skill = %agent.skill_level,
            "agent registered"
        );
        self.get_agent(&agent.id).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown agent.
    pub async fn get_agent(&self, id: &AgentId) -> Result<Agent> {
        sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(db_error)?
            .map_or_else(
                || Err(Error::NotFound(format!("agent {id}"))),
                |row| parse_agent_row(&row),
            )
    }

    /// Agents of a project, optionally only one role.
    pub async fn list_agents(&self, project_id: &ProjectId, role: Option<&Role>) -> Result<Vec<Agent>> {
        let role = role.map(Role::as_str);
        sqlx::query(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents
             WHERE project_id = ? AND (? IS NULL OR role = ?)
             ORDER BY id"
        ))
        .bind(project_id.as_str())
        .bind(role)
        .bind(role)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_agent_row)
        .collect()
    }

    /// Liveness of an agent against `agents.stale_after_secs`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown agent.
    pub async fn agent_presence(&self, id: &AgentId) -> Result<AgentPresence> {
        let agent = self.get_agent(id).await?;
        Ok(agent.presence(self.now(), self.config().agent_stale_after()))
    }

    /// The task the agent is working on, if any.
    pub async fn current_task(&self, id: &AgentId) -> Result<Option<Task>> {
        sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE locked_by = ? AND status = 'under_work'"
        ))
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(db_error)?
        .as_ref()
        .map(parse_task_row)
        .transpose()
    }

    /// Remove an agent. Locks it holds on hand-off stages are released.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown agent and `AgentBusy` while it owns
    /// an `under_work` task.
    pub async fn delete_agent(&self, id: &AgentId) -> Result<()> {
        self.get_agent(id).await?;
        let mut tx = self.begin_write().await?;
        let now = self.stamp();

        let released = sqlx::query(
            "UPDATE tasks SET locked_by = NULL, locked_at = NULL, updated_at = ?
             WHERE locked_by = ? AND status <> 'under_work'",
        )
        .bind(&now)
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        let deleted = sqlx::query(
            "DELETE FROM agents WHERE id = ?
             AND NOT EXISTS (SELECT 1 FROM tasks WHERE locked_by = ? AND status = 'under_work')",
        )
        .bind(id.as_str())
        .bind(id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(db_error)?;
            return match self.current_task(id).await? {
                Some(task) => Err(Error::AgentBusy {
                    agent_id: id.to_string(),
                    task_id: task.id,
                }),
                None => Err(Error::NotFound(format!("agent {id}"))),
            };
        }

        tx.commit().await.map_err(db_error)?;
        tracing::info!(agent = %id, released_locks = released, "agent deleted");
        Ok(())
    }

    /// Refresh `last_seen`.
    pub(crate) async fn touch_agent(&self, id: &AgentId) -> Result<()> {
        sqlx::query("UPDATE agents SET last_seen = ? WHERE id = ?")
            .bind(self.stamp())
            .bind(id.as_str())
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(db_error)
    }

    /// Agent lookup constrained to a project.
    pub(crate) async fn require_agent_in(&self, id: &AgentId, project_id: &ProjectId) -> Result<Agent> {
        let agent = self.get_agent(id).await?;
        if &agent.project_id != project_id {
            return Err(Error::NotFound(format!("agent {id} in project {project_id}")));
        }
        Ok(agent)
    }
}
