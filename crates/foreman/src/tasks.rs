//! Task records: creation, queries, deletion, history.

use foreman_core::{
    require_text, AgentId, Error, NewTask, Result, Role, Task, TaskFilter, TaskHistoryEntry,
    TaskStatus,
};

use crate::{
    db::db_error,
    rows::{parse_history_row, parse_task_row, HISTORY_COLUMNS, TASK_COLUMNS},
    Coordinator,
};

impl Coordinator {
    /// Create a task in `created` under an existing feature.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown feature or creator
    /// - `PermissionDenied` if the creator's role is not a creator role
    /// - `ValidationError` for a blank title or out-of-range difficulty
    pub async fn create_task(&self, task: &NewTask) -> Result<Task> {
        task.validate()?;
        let feature = self.get_feature(task.feature_id).await?;
        let creator = self.require_agent_in(&task.created_by, &feature.project_id).await?;

        let creator_roles = &self.config().tasks.creator_roles;
        if !creator_roles.is_empty() && !creator_roles.iter().any(|r| r == creator.role.as_str()) {
            return Err(Error::PermissionDenied(format!(
                "role '{}' cannot create tasks",
                creator.role
            )));
        }

        let mut tx = self.begin_write().await?;
        let now = self.stamp();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tasks (project_id, feature_id, title, description, target_role,
                 target_skill, difficulty, complexity, status, created_by, notes,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'created', ?, '', ?, ?)
             RETURNING id",
        )
        .bind(feature.project_id.as_str())
        .bind(feature.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.target_role.as_str())
        .bind(task.target_skill.as_str())
        .bind(i64::from(task.difficulty))
        .bind(task.complexity.to_string())
        .bind(creator.id.as_str())
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        tracing::info!(
            task = id,
            project = %feature.project_id,
            role = %task.target_role,
            skill = %task.target_skill,
            creator = %creator.id,
            "task created"
        );
        self.get_task(id).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task.
    pub async fn get_task(&self, id: i64) -> Result<Task> {
        self.find_task(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    pub(crate) async fn find_task(&self, id: i64) -> Result<Option<Task>> {
        sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error)?
            .as_ref()
            .map(parse_task_row)
            .transpose()
    }

    /// Tasks matching `filter`, oldest first.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let status = filter.status.map(|s| s.as_str());
        let role = filter.target_role.as_ref().map(Role::as_str);
        let locked_by = filter.locked_by.as_ref().map(AgentId::as_str);

        sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE project_id = ?
               AND (? IS NULL OR status = ?)
               AND (? IS NULL OR target_role = ?)
               AND (? IS NULL OR feature_id = ?)
               AND (? IS NULL OR locked_by = ?)
             ORDER BY created_at, id"
        ))
        .bind(filter.project_id.as_str())
        .bind(status)
        .bind(status)
        .bind(role)
        .bind(role)
        .bind(filter.feature_id)
        .bind(filter.feature_id)
        .bind(locked_by)
        .bind(locked_by)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_task_row)
        .collect()
    }

    /// Delete a task with its comments, comment mentions and history.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task.
    pub async fn delete_task(&self, id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(db_error)?;

        sqlx::query(
            "DELETE FROM mentions WHERE source_kind = 'comment'
             AND source_id IN (SELECT id FROM task_comments WHERE task_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let deleted = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(Error::NotFound(format!("task {id}")));
        }

        tx.commit().await.map_err(db_error)?;
        tracing::info!(task = id, "task deleted");
        Ok(())
    }

    /// Transition history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task.
    pub async fn history(&self, task_id: i64) -> Result<Vec<TaskHistoryEntry>> {
        self.get_task(task_id).await?;
        sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM task_history WHERE task_id = ? ORDER BY id"
        ))
        .bind(task_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_history_row)
        .collect()
    }

    /// Record the VCS branch for a task. Lock holder only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task, `NotLockHolder` if the caller
    /// does not hold the lock, and `ValidationError` for a blank branch.
    pub async fn set_branch(&self, task_id: i64, agent_id: &AgentId, branch: &str) -> Result<Task> {
        require_text("branch name", branch)?;

        let mut tx = self.begin_write().await?;
        let updated = sqlx::query(
            "UPDATE tasks SET branch_name = ?, updated_at = ? WHERE id = ? AND locked_by = ?",
        )
        .bind(branch.trim())
        .bind(self.stamp())
        .bind(task_id)
        .bind(agent_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.map_err(db_error)?;
            self.get_task(task_id).await?;
            return Err(Error::NotLockHolder {
                task_id,
                agent_id: agent_id.to_string(),
            });
        }
        tx.commit().await.map_err(db_error)?;

        tracing::debug!(task = task_id, agent = %agent_id, branch, "branch recorded");
        self.get_task(task_id).await
    }

    /// Append one history row inside an open transaction.
    pub(crate) async fn insert_history(
        conn: &mut sqlx::SqliteConnection,
        task_id: i64,
        from: TaskStatus,
        to: TaskStatus,
        agent_id: &AgentId,
        notes: Option<&str>,
        at: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO task_history (task_id, from_status, to_status, agent_id, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(agent_id.as_str())
        .bind(notes)
        .bind(at)
        .execute(conn)
        .await
        .map(|_| ())
        .map_err(db_error)
    }
}
