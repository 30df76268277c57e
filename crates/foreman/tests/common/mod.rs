//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use foreman::{Config, Coordinator, Database, Result};
use foreman_core::{
    AgentId, Clock, Complexity, ConnectionMode, NewAgent, NewTask, ProjectId, Role, SkillLevel,
    SystemClock, Task,
};
use tempfile::TempDir;

/// A coordinator over an on-disk store, so concurrent callers get separate
/// connections.
pub struct Fixture {
    pub coordinator: Coordinator,
    pub project: ProjectId,
    pub feature_id: i64,
    pub pm: AgentId,
    _dir: TempDir,
}

pub async fn fixture(config: Config) -> Result<Fixture> {
    fixture_with_clock(config, Arc::new(SystemClock)).await
}

pub async fn fixture_with_clock(mut config: Config, clock: Arc<dyn Clock>) -> Result<Fixture> {
    let dir = tempfile::tempdir().map_err(|e| foreman::Error::IoError(e.to_string()))?;
    let path = dir.path().join("foreman.db");
    config.database = path.display().to_string();

    let coordinator = Coordinator::with_clock(Database::open(&path).await?, config, clock);
    let project = ProjectId::parse("shop")?;
    coordinator.create_project(&project, "Shop", "Storefront rewrite").await?;
    let epic = coordinator.create_epic(&project, "Checkout", "").await?;
    let feature = coordinator.create_feature(epic.id, "Payments", "").await?;

    let fixture = Fixture {
        coordinator,
        project,
        feature_id: feature.id,
        pm: AgentId::parse("pm_01")?,
        _dir: dir,
    };
    fixture.register("pm_01", "project_manager", SkillLevel::Principal).await?;
    Ok(fixture)
}

/// Config with a fast selector poll.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.selector.poll_interval_ms = 20;
    config
}

impl Fixture {
    pub async fn register(&self, id: &str, role: &str, skill: SkillLevel) -> Result<AgentId> {
        let agent = self
            .coordinator
            .register_agent(&NewAgent {
                id: AgentId::parse(id)?,
                project_id: self.project.clone(),
                role: Role::parse(role)?,
                skill_level: skill,
                connection_mode: ConnectionMode::Mcp,
            })
            .await?;
        Ok(agent.id)
    }

    pub async fn add_task(&self, title: &str, role: &str, skill: SkillLevel) -> Result<Task> {
        self.coordinator
            .create_task(&NewTask {
                feature_id: self.feature_id,
                title: title.into(),
                description: String::new(),
                target_role: Role::parse(role)?,
                target_skill: skill,
                difficulty: 2,
                complexity: Complexity::Minor,
                created_by: self.pm.clone(),
            })
            .await
    }
}
