//! Service registry and change feed handlers

use anyhow::{Context, Result};
use clap::ArgMatches;
use foreman_core::{parse_timestamp, AgentId, ProjectId};
use serde_json::json;

use super::{arg, parsed, parsed_opt, print_json, unknown};
use crate::Coordinator;

pub async fn handle_service(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("register", m)) => {
            let metadata: serde_json::Value = serde_json::from_str(arg(m, "metadata")?)
                .context("--metadata must be valid JSON")?;
            let service = c
                .register_service(&parsed(m, "project")?, arg(m, "name")?, arg(m, "url")?, &metadata)
                .await?;
            print_json(&service)
        }
        Some(("heartbeat", m)) => {
            let name = arg(m, "name")?;
            let at = c.heartbeat(&parsed(m, "project")?, name).await?;
            print_json(&json!({ "service": name, "last_heartbeat": at }))
        }
        Some(("get", m)) => {
            print_json(&c.get_service(&parsed(m, "project")?, arg(m, "name")?).await?)
        }
        Some(("list", m)) => print_json(&c.list_services(&parsed(m, "project")?).await?),
        Some(("unregister", m)) => {
            let name = arg(m, "name")?;
            c.unregister_service(&parsed(m, "project")?, name).await?;
            print_json(&json!({ "unregistered": name }))
        }
        Some((name, _)) => Err(unknown("service", name)),
        None => Err(unknown("service", "")),
    }
}

pub async fn handle_changes(c: &Coordinator, m: &ArgMatches) -> Result<()> {
    let project: ProjectId = parsed(m, "project")?;
    let since = parse_timestamp(arg(m, "since")?)?;
    let agent: Option<AgentId> = parsed_opt(m, "agent")?;
    print_json(&c.get_changes(&project, since, agent.as_ref()).await?)
}
