//! Registered worker agents.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{AgentId, ProjectId, Role, SkillLevel};

/// How the agent talks to the coordinator. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionMode {
    Mcp,
    Http,
    Cli,
}

/// Presentational liveness. Never triggers deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentPresence {
    Online,
    Stale,
}

/// A worker agent registered in a project.
///
/// The task an agent currently owns is not stored here; it is derived from
/// the task table (`locked_by = id AND status = 'under_work'`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub project_id: ProjectId,
    pub role: Role,
    pub skill_level: SkillLevel,
    pub connection_mode: ConnectionMode,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Agent {
    /// Online if seen within `threshold` of `now`.
    #[must_use]
    pub fn presence(&self, now: DateTime<Utc>, threshold: Duration) -> AgentPresence {
        if now - self.last_seen <= threshold {
            AgentPresence::Online
        } else {
            AgentPresence::Stale
        }
    }

    /// Whether this agent may claim work aimed at `target_role`/`target_skill`.
    #[must_use]
    pub fn can_claim(&self, target_role: &Role, target_skill: SkillLevel) -> bool {
        &self.role == target_role && self.skill_level.covers(target_skill)
    }
}

/// Registration request. Re-registering an existing id in the same project
/// updates role, skill and connection mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgent {
    pub id: AgentId,
    pub project_id: ProjectId,
    pub role: Role,
    pub skill_level: SkillLevel,
    pub connection_mode: ConnectionMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;

    fn agent(skill: SkillLevel, last_seen: DateTime<Utc>) -> Result<Agent> {
        Ok(Agent {
            id: AgentId::parse("backend_senior_01")?,
            project_id: ProjectId::parse("shop")?,
            role: Role::parse("backend_dev")?,
            skill_level: skill,
            connection_mode: ConnectionMode::Mcp,
            registered_at: last_seen,
            last_seen,
        })
    }

    #[test]
    fn test_presence_threshold_is_inclusive() -> Result<()> {
        let now = Utc::now();
        let a = agent(SkillLevel::Senior, now - Duration::seconds(300))?;
        assert_eq!(a.presence(now, Duration::seconds(300)), AgentPresence::Online);
        assert_eq!(a.presence(now, Duration::seconds(299)), AgentPresence::Stale);
        Ok(())
    }

    #[test]
    fn test_can_claim_needs_role_and_skill() -> Result<()> {
        let a = agent(SkillLevel::Senior, Utc::now())?;
        let backend = Role::parse("backend_dev")?;
        let frontend = Role::parse("frontend_dev")?;
        assert!(a.can_claim(&backend, SkillLevel::Junior));
        assert!(a.can_claim(&backend, SkillLevel::Senior));
        assert!(!a.can_claim(&backend, SkillLevel::Principal));
        assert!(!a.can_claim(&frontend, SkillLevel::Junior));
        Ok(())
    }

    #[test]
    fn test_connection_mode_strings() {
        assert_eq!(ConnectionMode::Http.to_string(), "http");
        assert_eq!("cli".parse::<ConnectionMode>().ok(), Some(ConnectionMode::Cli));
        assert!("smoke-signal".parse::<ConnectionMode>().is_err());
    }
}
