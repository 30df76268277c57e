//! Agent registry handlers

use anyhow::Result;
use clap::ArgMatches;
use foreman_core::{AgentId, NewAgent, Role};
use serde_json::json;

use super::{parsed, parsed_opt, print_json, unknown};
use crate::Coordinator;

pub async fn handle_agent(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("register", m)) => {
            let agent = NewAgent {
                id: parsed(m, "id")?,
                project_id: parsed(m, "project")?,
                role: parsed(m, "role")?,
                skill_level: parsed(m, "skill")?,
                connection_mode: parsed(m, "mode")?,
            };
            print_json(&c.register_agent(&agent).await?)
        }
        Some(("get", m)) => print_json(&c.get_agent(&parsed(m, "id")?).await?),
        Some(("list", m)) => {
            let role: Option<Role> = parsed_opt(m, "role")?;
            print_json(&c.list_agents(&parsed(m, "project")?, role.as_ref()).await?)
        }
        Some(("current", m)) => {
            let agent: AgentId = parsed(m, "id")?;
            let task = c.current_task(&agent).await?;
            print_json(&json!({ "agent": agent, "task": task }))
        }
        Some(("presence", m)) => {
            let agent: AgentId = parsed(m, "id")?;
            let presence = c.agent_presence(&agent).await?;
            print_json(&json!({ "agent": agent, "presence": presence }))
        }
        Some(("delete", m)) => {
            let agent: AgentId = parsed(m, "id")?;
            c.delete_agent(&agent).await?;
            print_json(&json!({ "deleted": agent }))
        }
        Some((name, _)) => Err(unknown("agent", name)),
        None => Err(unknown("agent", "")),
    }
}
