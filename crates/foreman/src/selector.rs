//! Next-task selector.
//!
//! Candidates are `created`, unlocked tasks in the agent's project whose
//! target role equals the agent's role and whose target skill is in the
//! agent's eligibility row, oldest first. Each candidate is claimed with the
//! same conditional update as a manual `created -> under_work` step, so a
//! lost race just moves on to the next one. With no candidate the call
//! sleeps and re-polls until its deadline; it never holds a transaction
//! while waiting.

use std::time::Duration;

use foreman_core::{Agent, AgentId, Error, Result, Role, SkillLevel, Task, TaskStatus};
use itertools::Itertools;
use tokio::time::Instant;

use crate::{
    db::{db_error, is_unique_violation},
    transitions::claim_sql,
    Coordinator,
};

/// Candidates fetched per query.
const CANDIDATE_BATCH: i64 = 16;

/// Re-queries within one poll when every fetched candidate was lost to a race.
const MAX_RACE_ROUNDS: usize = 3;

impl Coordinator {
    /// Claim the oldest eligible task for an agent, waiting up to `wait`.
    ///
    /// `wait` defaults to `selector.default_wait_secs` and is clamped to
    /// `selector.max_wait_secs`. A zero wait polls once. Running out of time
    /// is `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown agent
    /// - `PermissionDenied` if `role`/`skill` differ from the registration
    /// - `AgentBusy` if the agent already owns an `under_work` task
    pub async fn next_task(
        &self,
        agent_id: &AgentId,
        role: &Role,
        skill: SkillLevel,
        wait: Option<Duration>,
    ) -> Result<Option<Task>> {
        let agent = self.get_agent(agent_id).await?;
        if &agent.role != role || agent.skill_level != skill {
            return Err(Error::PermissionDenied(format!(
                "agent {agent_id} is registered as {} {}, not {skill} {role}",
                agent.skill_level, agent.role
            )));
        }
        if let Some(active) = self.current_task(agent_id).await? {
            return Err(Error::AgentBusy {
                agent_id: agent_id.to_string(),
                task_id: active.id,
            });
        }

        let wait = wait
            .unwrap_or_else(|| self.config().default_wait())
            .min(self.config().max_wait());
        let poll_interval = self.config().poll_interval();
        let deadline = Instant::now() + wait;
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            if let Some(task) = self.try_claim_next(&agent).await? {
                self.touch_agent(agent_id).await?;
                tracing::info!(agent = %agent_id, task = task.id, polls, "next task assigned");
                return Ok(Some(task));
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::info!(agent = %agent_id, polls, "no eligible task before deadline");
                return Ok(None);
            }
            tracing::debug!(agent = %agent_id, polls, "no eligible task, waiting");
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    /// One poll: fetch candidates and try them in order.
    async fn try_claim_next(&self, agent: &Agent) -> Result<Option<Task>> {
        let eligible = agent.skill_level.eligible_targets();
        let placeholders = eligible.iter().map(|_| "?").join(", ");
        let sql = format!(
            "SELECT id FROM tasks
             WHERE project_id = ? AND status = 'created' AND locked_by IS NULL
               AND target_role = ? AND target_skill IN ({placeholders})
             ORDER BY created_at, id
             LIMIT {CANDIDATE_BATCH}"
        );

        for _ in 0..MAX_RACE_ROUNDS {
            let mut query = sqlx::query_scalar::<_, i64>(&sql)
                .bind(agent.project_id.as_str())
                .bind(agent.role.as_str());
            for tier in eligible {
                query = query.bind(tier.as_str());
            }
            let candidates = query.fetch_all(self.pool()).await.map_err(db_error)?;
            if candidates.is_empty() {
                return Ok(None);
            }

            for task_id in candidates {
                if self.claim_candidate(task_id, &agent.id).await? {
                    return self.get_task(task_id).await.map(Some);
                }
                tracing::debug!(agent = %agent.id, task = task_id, "lost race for candidate");
            }
        }
        Ok(None)
    }

    /// Claim one candidate atomically. `false` means someone else got it.
    async fn claim_candidate(&self, task_id: i64, agent_id: &AgentId) -> Result<bool> {
        let sql = claim_sql();
        let mut tx = self.begin_write().await?;
        let now = self.stamp();

        let claimed = match sqlx::query(&sql)
            .bind(agent_id.as_str())
            .bind(&now)
            .bind(Option::<&str>::None)
            .bind(task_id)
            .execute(&mut *tx)
            .await
        {
            Ok(result) => result.rows_affected() == 1,
            Err(e) if is_unique_violation(&e) => false,
            Err(e) => return Err(db_error(e)),
        };

        if !claimed {
            tx.rollback().await.map_err(db_error)?;
            if let Some(active) = self.current_task(agent_id).await? {
                return Err(Error::AgentBusy {
                    agent_id: agent_id.to_string(),
                    task_id: active.id,
                });
            }
            return Ok(false);
        }

        Self::insert_history(
            &mut *tx,
            task_id,
            TaskStatus::Created,
            TaskStatus::UnderWork,
            agent_id,
            None,
            &now,
        )
        .await?;
        tx.commit().await.map_err(db_error)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use foreman_core::{Complexity, ConnectionMode, NewAgent, NewTask, ProjectId};

    use super::*;
    use crate::{config::Config, db::Database};

    struct Fixture {
        c: Coordinator,
        feature_id: i64,
    }

    async fn fixture() -> Result<Fixture> {
        let mut config = Config::default();
        config.selector.poll_interval_ms = 20;
        let c = Coordinator::new(Database::open_in_memory().await?, config);
        let shop = ProjectId::parse("shop")?;
        c.create_project(&shop, "Shop", "").await?;
        let epic = c.create_epic(&shop, "Checkout", "").await?;
        let feature = c.create_feature(epic.id, "Payments", "").await?;

        for (id, role, skill) in [
            ("pm_01", "project_manager", SkillLevel::Principal),
            ("junior_01", "backend_dev", SkillLevel::Junior),
            ("senior_01", "backend_dev", SkillLevel::Senior),
            ("principal_01", "backend_dev", SkillLevel::Principal),
            ("fe_01", "frontend_dev", SkillLevel::Principal),
        ] {
            c.register_agent(&NewAgent {
                id: AgentId::parse(id)?,
                project_id: shop.clone(),
                role: Role::parse(role)?,
                skill_level: skill,
                connection_mode: ConnectionMode::Mcp,
            })
            .await?;
        }
        Ok(Fixture {
            c,
            feature_id: feature.id,
        })
    }

    async fn add_task(f: &Fixture, title: &str, skill: SkillLevel) -> Result<Task> {
        f.c.create_task(&NewTask {
            feature_id: f.feature_id,
            title: title.into(),
            description: String::new(),
            target_role: Role::parse("backend_dev")?,
            target_skill: skill,
            difficulty: 1,
            complexity: Complexity::Minor,
            created_by: AgentId::parse("pm_01")?,
        })
        .await
    }

    async fn next(f: &Fixture, id: &str, skill: SkillLevel) -> Result<Option<Task>> {
        f.c.next_task(
            &AgentId::parse(id)?,
            &Role::parse("backend_dev")?,
            skill,
            Some(Duration::ZERO),
        )
        .await
    }

    #[tokio::test]
    async fn test_fifo_order() -> Result<()> {
        let f = fixture().await?;
        let first = add_task(&f, "first", SkillLevel::Junior).await?;
        add_task(&f, "second", SkillLevel::Junior).await?;

        let got = next(&f, "senior_01", SkillLevel::Senior).await?;
        assert_eq!(got.map(|t| t.id), Some(first.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_skill_absorption() -> Result<()> {
        let f = fixture().await?;
        let principal_task = add_task(&f, "hard", SkillLevel::Principal).await?;

        assert!(next(&f, "junior_01", SkillLevel::Junior).await?.is_none());
        assert!(next(&f, "senior_01", SkillLevel::Senior).await?.is_none());
        let got = next(&f, "principal_01", SkillLevel::Principal).await?;
        assert_eq!(got.map(|t| t.id), Some(principal_task.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_role_must_match_exactly() -> Result<()> {
        let f = fixture().await?;
        add_task(&f, "backend only", SkillLevel::Junior).await?;
        let fe = AgentId::parse("fe_01")?;
        let got = f
            .c
            .next_task(&fe, &Role::parse("frontend_dev")?, SkillLevel::Principal, Some(Duration::ZERO))
            .await?;
        assert!(got.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_moves_to_under_work_with_history() -> Result<()> {
        let f = fixture().await?;
        let task = add_task(&f, "work", SkillLevel::Junior).await?;
        let junior = AgentId::parse("junior_01")?;

        let got = next(&f, "junior_01", SkillLevel::Junior).await?;
        let got = got.ok_or_else(|| Error::NotFound("claimed task".into()))?;
        assert_eq!(got.id, task.id);
        assert_eq!(got.status, TaskStatus::UnderWork);
        assert!(got.is_locked_by(&junior));
        assert_eq!(f.c.current_task(&junior).await?.map(|t| t.id), Some(task.id));
        assert_eq!(f.c.history(task.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_busy_agent_rejected() -> Result<()> {
        let f = fixture().await?;
        add_task(&f, "one", SkillLevel::Junior).await?;
        add_task(&f, "two", SkillLevel::Junior).await?;

        next(&f, "junior_01", SkillLevel::Junior).await?;
        assert!(matches!(
            next(&f, "junior_01", SkillLevel::Junior).await,
            Err(Error::AgentBusy { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_mismatched_registration_denied() -> Result<()> {
        let f = fixture().await?;
        assert!(matches!(
            next(&f, "junior_01", SkillLevel::Principal).await,
            Err(Error::PermissionDenied(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_wait_picks_up_late_task() -> Result<()> {
        let f = fixture().await?;
        let c = f.c.clone();
        let feature_id = f.feature_id;

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            c.create_task(&NewTask {
                feature_id,
                title: "late".into(),
                description: String::new(),
                target_role: Role::parse("backend_dev")?,
                target_skill: SkillLevel::Junior,
                difficulty: 1,
                complexity: Complexity::Minor,
                created_by: AgentId::parse("pm_01")?,
            })
            .await
        });

        let got = f
            .c
            .next_task(
                &AgentId::parse("junior_01")?,
                &Role::parse("backend_dev")?,
                SkillLevel::Junior,
                Some(Duration::from_secs(5)),
            )
            .await?;
        let late = producer
            .await
            .map_err(|e| Error::IoError(e.to_string()))??;
        assert_eq!(got.map(|t| t.id), Some(late.id));
        Ok(())
    }
}
