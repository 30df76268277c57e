//! Document and mention handlers

use anyhow::{anyhow, Result};
use chrono::Duration;
use clap::ArgMatches;
use foreman_core::{MentionTarget, NewDocument, ProjectId};
use serde_json::json;

use super::{arg, id, opt, parsed, parsed_opt, print_json, unknown};
use crate::Coordinator;

pub async fn handle_doc(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("create", m)) => {
            let expires_at = m
                .get_one::<u64>("expires-in")
                .map(|secs| {
                    i64::try_from(*secs)
                        .ok()
                        .and_then(Duration::try_seconds)
                        .and_then(|ttl| c.now().checked_add_signed(ttl))
                        .ok_or_else(|| anyhow!("--expires-in is out of range"))
                })
                .transpose()?;
            let doc = NewDocument {
                author_id: parsed(m, "author")?,
                title: arg(m, "title")?.to_string(),
                content: arg(m, "content")?.to_string(),
                doc_type: parsed(m, "type")?,
                expires_at,
            };
            print_json(&c.create_document(&doc).await?)
        }
        Some(("get", m)) => print_json(&c.get_document(id(m, "id")?).await?),
        Some(("list", m)) => {
            let doc_type = parsed_opt(m, "type")?;
            print_json(&c.list_documents(&parsed(m, "project")?, doc_type).await?)
        }
        Some(("update", m)) => {
            let doc = c
                .update_document(
                    id(m, "id")?,
                    &parsed(m, "agent")?,
                    opt(m, "title"),
                    opt(m, "content"),
                )
                .await?;
            print_json(&doc)
        }
        Some(("delete", m)) => {
            let doc_id = id(m, "id")?;
            c.delete_document(doc_id, &parsed(m, "agent")?).await?;
            print_json(&json!({ "deleted": doc_id }))
        }
        Some((name, _)) => Err(unknown("doc", name)),
        None => Err(unknown("doc", "")),
    }
}

pub async fn handle_mention(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("list", m)) => {
            let project: ProjectId = parsed(m, "project")?;
            let target = match parsed_opt(m, "agent")? {
                Some(agent) => MentionTarget::Agent(agent),
                None => MentionTarget::Role(parsed(m, "role")?),
            };
            print_json(&c.get_mentions(&project, &target, m.get_flag("unread")).await?)
        }
        Some(("read", m)) => print_json(&c.mark_read(id(m, "id")?).await?),
        Some((name, _)) => Err(unknown("mention", name)),
        None => Err(unknown("mention", "")),
    }
}
