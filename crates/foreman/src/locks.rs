//! Lock & assignment manager.
//!
//! A lock is the `locked_by`/`locked_at` pair on the task row. It is taken
//! with a single conditional `UPDATE` so that two callers can never both
//! succeed; when the update matches nothing the current row is re-read to
//! report why.

use foreman_core::{Agent, AgentId, Error, Result, Task, TaskStatus};

use crate::{
    db::{db_error, is_unique_violation},
    rows::{parse_task_row, TASK_COLUMNS},
    Coordinator,
};

/// Committed tasks are frozen. Locking a `created` task is a claim and
/// needs a matching role and skill.
fn check_lockable(task: &Task, agent: &Agent) -> Result<()> {
    if task.status.is_terminal() {
        return Err(Error::InvalidTransition {
            task_id: task.id,
            from: task.status,
            to: task.status,
        });
    }
    if task.status == TaskStatus::Created && !agent.can_claim(&task.target_role, task.target_skill) {
        return Err(Error::PermissionDenied(format!(
            "agent {} ({} {}) cannot take task {} targeted at {} {}",
            agent.id, agent.skill_level, agent.role, task.id, task.target_skill, task.target_role
        )));
    }
    Ok(())
}

impl Coordinator {
    /// Take the exclusive lock on a task. Re-locking by the holder is a no-op.
    ///
    /// Locking a `created` task is a claim and is gated on the agent's role
    /// and skill. Hand-off stages can be locked by any project agent.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown task or agent
    /// - `AlreadyLocked` if another agent holds the lock
    /// - `AgentBusy` if the caller owns a different `under_work` task
    /// - `PermissionDenied` if the caller may not claim a `created` task
    /// - `InvalidTransition` for a committed task
    pub async fn lock_task(&self, task_id: i64, agent_id: &AgentId) -> Result<Task> {
        let task = self.get_task(task_id).await?;
        let agent = self.require_agent_in(agent_id, &task.project_id).await?;

        let mut tx = self.begin_write().await?;
        // Re-read under the write lock; the gate and the update must see the
        // same status.
        let task = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .map_or_else(
                || Err(Error::NotFound(format!("task {task_id}"))),
                |row| parse_task_row(&row),
            )?;
        if let Err(e) = check_lockable(&task, &agent) {
            tx.rollback().await.map_err(db_error)?;
            return Err(e);
        }

        let now = self.stamp();
        let updated = sqlx::query(
            "UPDATE tasks
             SET locked_at = CASE WHEN locked_by = ?1 THEN locked_at ELSE ?2 END,
                 locked_by = ?1,
                 updated_at = ?2
             WHERE id = ?3
               AND status = ?4
               AND (locked_by IS NULL OR locked_by = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM tasks AS other
                   WHERE other.locked_by = ?1 AND other.status = 'under_work' AND other.id <> ?3
               )",
        )
        .bind(agent_id.as_str())
        .bind(&now)
        .bind(task_id)
        .bind(task.status.as_str())
        .execute(&mut *tx)
        .await;

        let granted = match updated {
            Ok(result) => result.rows_affected() == 1,
            Err(e) if is_unique_violation(&e) => false,
            Err(e) => return Err(db_error(e)),
        };

        if !granted {
            tx.rollback().await.map_err(db_error)?;
            let err = self.lock_conflict(task_id, agent_id).await;
            tracing::info!(task = task_id, agent = %agent_id, error = %err, "lock denied");
            return Err(err);
        }
        tx.commit().await.map_err(db_error)?;

        self.touch_agent(agent_id).await?;
        tracing::info!(task = task_id, agent = %agent_id, status = %task.status, "lock granted");
        self.get_task(task_id).await
    }

    /// Release a lock on a hand-off stage. Releasing an unlocked task is a no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown task
    /// - `NotLockHolder` if another agent holds the lock
    /// - `InvalidTransition` for an `under_work` task, which can only move
    ///   forward
    pub async fn unlock_task(&self, task_id: i64, agent_id: &AgentId) -> Result<Task> {
        let task = self.get_task(task_id).await?;

        match &task.locked_by {
            None => return Ok(task),
            Some(holder) if holder != agent_id => {
                return Err(Error::NotLockHolder {
                    task_id,
                    agent_id: agent_id.to_string(),
                })
            }
            Some(_) => {}
        }

        if task.status == TaskStatus::UnderWork {
            return Err(Error::InvalidTransition {
                task_id,
                from: TaskStatus::UnderWork,
                to: TaskStatus::Created,
            });
        }

        let mut tx = self.begin_write().await?;
        let released = sqlx::query(
            "UPDATE tasks SET locked_by = NULL, locked_at = NULL, updated_at = ?
             WHERE id = ? AND locked_by = ? AND status <> 'under_work'",
        )
        .bind(self.stamp())
        .bind(task_id)
        .bind(agent_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if released == 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(Error::NotLockHolder {
                task_id,
                agent_id: agent_id.to_string(),
            });
        }

        tx.commit().await.map_err(db_error)?;
        tracing::info!(task = task_id, agent = %agent_id, "lock released");
        self.get_task(task_id).await
    }

    /// Explain why a conditional lock update matched nothing.
    async fn lock_conflict(&self, task_id: i64, agent_id: &AgentId) -> Error {
        let task = match self.find_task(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => return Error::NotFound(format!("task {task_id}")),
            Err(e) => return e,
        };

        if let Some(holder) = task.locked_by.as_ref().filter(|h| *h != agent_id) {
            return Error::AlreadyLocked {
                task_id,
                holder: holder.to_string(),
            };
        }
        if task.status.is_terminal() {
            return Error::InvalidTransition {
                task_id,
                from: task.status,
                to: task.status,
            };
        }
        match self.current_task(agent_id).await {
            Ok(Some(active)) if active.id != task_id => Error::AgentBusy {
                agent_id: agent_id.to_string(),
                task_id: active.id,
            },
            Ok(_) => Error::AlreadyLocked {
                task_id,
                holder: task
                    .locked_by
                    .map_or_else(|| "another agent".to_string(), |h| h.to_string()),
            },
            Err(e) => e,
        }
    }
}
