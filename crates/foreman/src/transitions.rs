//! Status state machine applied to stored tasks.
//!
//! The pure rules live in `foreman_core::status`; this module applies a
//! validated transition with one conditional `UPDATE` plus a history insert
//! in a single transaction. If the update matches nothing, the transaction
//! is rolled back and the current row is re-read to explain the conflict.

use std::time::Duration;

use foreman_core::{note_line, AgentId, Error, Result, Task, TaskStatus, TransitionKind};
use serde::Serialize;

use crate::{db::db_error, db::is_unique_violation, Coordinator};

/// Appends `?3` (the formatted note line, or NULL) to the running notes.
const APPEND_NOTES: &str =
    "notes = CASE WHEN ?3 IS NULL THEN notes WHEN notes = '' THEN ?3 ELSE notes || char(10) || ?3 END";

/// Parameters: ?1 agent, ?2 now, ?3 note line, ?4 task id.
pub(crate) fn claim_sql() -> String {
    format!(
        "UPDATE tasks
         SET status = 'under_work',
             locked_at = CASE WHEN locked_by = ?1 THEN locked_at ELSE ?2 END,
             locked_by = ?1,
             assigned_to = ?1,
             {APPEND_NOTES},
             updated_at = ?2
         WHERE id = ?4
           AND status = 'created'
           AND (locked_by IS NULL OR locked_by = ?1)
           AND NOT EXISTS (
               SELECT 1 FROM tasks AS other
               WHERE other.locked_by = ?1 AND other.status = 'under_work' AND other.id <> ?4
           )"
    )
}

/// Parameters: ?1 agent, ?2 now, ?3 note line, ?4 task id, ?5 target, ?6 expected current.
fn forward_sql() -> String {
    format!(
        "UPDATE tasks
         SET status = ?5,
             locked_by = NULL,
             locked_at = NULL,
             assigned_to = ?1,
             {APPEND_NOTES},
             updated_at = ?2
         WHERE id = ?4 AND status = ?6 AND locked_by = ?1"
    )
}

/// Parameters: ?1 agent, ?2 now, ?3 note line, ?4 task id.
fn reject_sql() -> String {
    format!(
        "UPDATE tasks
         SET status = 'created',
             locked_by = NULL,
             locked_at = NULL,
             assigned_to = NULL,
             {APPEND_NOTES},
             updated_at = ?2
         WHERE id = ?4 AND status = 'qa_done' AND locked_by = ?1"
    )
}

/// Result of [`Coordinator::advance_then_next`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    /// The task after the transition.
    pub task: Task,
    /// The next task claimed for the same agent, if any arrived in time.
    pub next: Option<Task>,
}

impl Coordinator {
    /// Move a task to `status`.
    ///
    /// The caller must hold the lock, except for `created -> under_work`,
    /// which takes it. Leaving `under_work` or a hand-off stage releases the
    /// lock and records the caller as advisory owner; the QA rejection edge
    /// clears both.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown task or agent
    /// - `InvalidTransition` if `status` is not a legal step from the current one
    /// - `NotLockHolder` if the caller does not hold the lock
    /// - `AlreadyLocked`, `AgentBusy` or `PermissionDenied` when claiming
    pub async fn update_task_status(
        &self,
        task_id: i64,
        agent_id: &AgentId,
        status: TaskStatus,
        notes: Option<&str>,
    ) -> Result<Task> {
        let task = self.get_task(task_id).await?;
        let agent = self.require_agent_in(agent_id, &task.project_id).await?;

        let kind = task
            .status
            .validate_transition(status)
            .map_err(|e| Error::InvalidTransition {
                task_id,
                from: e.from,
                to: e.to,
            })?;

        if kind == TransitionKind::Claim && !agent.can_claim(&task.target_role, task.target_skill) {
            return Err(Error::PermissionDenied(format!(
                "agent {agent_id} ({} {}) cannot take task {task_id} targeted at {} {}",
                agent.skill_level, agent.role, task.target_skill, task.target_role
            )));
        }

        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let line = notes.map(|n| note_line(status, n));

        let mut tx = self.begin_write().await?;
        let now = self.stamp();

        let sql = match kind {
            TransitionKind::Claim => claim_sql(),
            TransitionKind::Forward => forward_sql(),
            TransitionKind::Reject => reject_sql(),
        };
        let mut query = sqlx::query(&sql)
            .bind(agent_id.as_str())
            .bind(&now)
            .bind(line.as_deref())
            .bind(task_id);
        if kind == TransitionKind::Forward {
            query = query.bind(status.as_str()).bind(task.status.as_str());
        }

        let applied = match query.execute(&mut *tx).await {
            Ok(result) => result.rows_affected() == 1,
            Err(e) if is_unique_violation(&e) => false,
            Err(e) => return Err(db_error(e)),
        };

        if !applied {
            tx.rollback().await.map_err(db_error)?;
            let err = self.transition_conflict(task_id, agent_id, task.status, status, kind).await;
            tracing::info!(
                task = task_id,
                agent = %agent_id,
                from = %task.status,
                to = %status,
                error = %err,
                "transition refused"
            );
            return Err(err);
        }

        Self::insert_history(&mut *tx, task_id, task.status, status, agent_id, notes, &now).await?;
        tx.commit().await.map_err(db_error)?;

        self.touch_agent(agent_id).await?;
        tracing::info!(
            task = task_id,
            agent = %agent_id,
            from = %task.status,
            to = %status,
            "task transitioned"
        );
        self.get_task(task_id).await
    }

    /// Advance a task, then wait for the same agent's next task.
    ///
    /// # Errors
    ///
    /// Any error from [`Coordinator::update_task_status`] or
    /// [`Coordinator::next_task`]. A failed advance does not poll.
    pub async fn advance_then_next(
        &self,
        task_id: i64,
        agent_id: &AgentId,
        status: TaskStatus,
        notes: Option<&str>,
        wait: Option<Duration>,
    ) -> Result<AdvanceOutcome> {
        let task = self.update_task_status(task_id, agent_id, status, notes).await?;
        let agent = self.get_agent(agent_id).await?;
        let next = self
            .next_task(agent_id, &agent.role, agent.skill_level, wait)
            .await?;
        Ok(AdvanceOutcome { task, next })
    }

    async fn transition_conflict(
        &self,
        task_id: i64,
        agent_id: &AgentId,
        expected: TaskStatus,
        target: TaskStatus,
        kind: TransitionKind,
    ) -> Error {
        let task = match self.find_task(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => return Error::NotFound(format!("task {task_id}")),
            Err(e) => return e,
        };

        if task.status != expected {
            return Error::InvalidTransition {
                task_id,
                from: task.status,
                to: target,
            };
        }

        if kind != TransitionKind::Claim {
            return Error::NotLockHolder {
                task_id,
                agent_id: agent_id.to_string(),
            };
        }

        if let Some(holder) = task.locked_by.as_ref().filter(|h| *h != agent_id) {
            return Error::AlreadyLocked {
                task_id,
                holder: holder.to_string(),
            };
        }
        match self.current_task(agent_id).await {
            Ok(Some(active)) => Error::AgentBusy {
                agent_id: agent_id.to_string(),
                task_id: active.id,
            },
            Ok(None) => Error::AlreadyLocked {
                task_id,
                holder: "another agent".to_string(),
            },
            Err(e) => e,
        }
    }
}
