//! Task lifecycle and comment handlers

use anyhow::Result;
use clap::ArgMatches;
use foreman_core::{AgentId, NewTask, TaskFilter, TaskStatus};
use serde_json::json;

use super::{arg, id, opt, parsed, parsed_opt, print_json, unknown, wait};
use crate::Coordinator;

pub async fn handle_task(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("create", m)) => handle_create(c, m).await,
        Some(("get", m)) => print_json(&c.get_task(id(m, "id")?).await?),
        Some(("list", m)) => handle_list(c, m).await,
        Some(("delete", m)) => {
            let task_id = id(m, "id")?;
            c.delete_task(task_id).await?;
            print_json(&json!({ "deleted": task_id }))
        }
        Some(("lock", m)) => print_json(&c.lock_task(id(m, "id")?, &parsed(m, "agent")?).await?),
        Some(("unlock", m)) => {
            print_json(&c.unlock_task(id(m, "id")?, &parsed(m, "agent")?).await?)
        }
        Some(("status", m)) => {
            let status: TaskStatus = parsed(m, "status")?;
            let task = c
                .update_task_status(id(m, "id")?, &parsed(m, "agent")?, status, opt(m, "notes"))
                .await?;
            print_json(&task)
        }
        Some(("history", m)) => print_json(&c.history(id(m, "id")?).await?),
        Some(("branch", m)) => {
            let task = c
                .set_branch(id(m, "id")?, &parsed(m, "agent")?, arg(m, "branch")?)
                .await?;
            print_json(&task)
        }
        Some(("next", m)) => {
            let agent: AgentId = parsed(m, "agent")?;
            let task = c
                .next_task(&agent, &parsed(m, "role")?, parsed(m, "skill")?, wait(m))
                .await?;
            print_json(&json!({ "agent": agent, "task": task }))
        }
        Some(("advance", m)) => {
            let status: TaskStatus = parsed(m, "status")?;
            let outcome = c
                .advance_then_next(
                    id(m, "id")?,
                    &parsed(m, "agent")?,
                    status,
                    opt(m, "notes"),
                    wait(m),
                )
                .await?;
            print_json(&outcome)
        }
        Some((name, _)) => Err(unknown("task", name)),
        None => Err(unknown("task", "")),
    }
}

async fn handle_create(c: &Coordinator, m: &ArgMatches) -> Result<()> {
    let task = NewTask {
        feature_id: id(m, "feature")?,
        title: arg(m, "title")?.to_string(),
        description: arg(m, "description")?.to_string(),
        target_role: parsed(m, "role")?,
        target_skill: parsed(m, "skill")?,
        difficulty: m.get_one::<u8>("difficulty").copied().unwrap_or(1),
        complexity: parsed(m, "complexity")?,
        created_by: parsed(m, "by")?,
    };
    print_json(&c.create_task(&task).await?)
}

async fn handle_list(c: &Coordinator, m: &ArgMatches) -> Result<()> {
    let filter = TaskFilter {
        project_id: parsed(m, "project")?,
        status: parsed_opt(m, "status")?,
        target_role: parsed_opt(m, "role")?,
        feature_id: m.get_one::<i64>("feature").copied(),
        locked_by: parsed_opt(m, "locked-by")?,
    };
    print_json(&c.list_tasks(&filter).await?)
}

pub async fn handle_comment(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("add", m)) => {
            let comment = c
                .create_comment(id(m, "id")?, &parsed(m, "agent")?, arg(m, "content")?)
                .await?;
            print_json(&comment)
        }
        Some(("list", m)) => print_json(&c.comments(id(m, "id")?).await?),
        Some((name, _)) => Err(unknown("comment", name)),
        None => Err(unknown("comment", "")),
    }
}
