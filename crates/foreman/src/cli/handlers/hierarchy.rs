//! Project, epic and feature handlers

use anyhow::Result;
use clap::ArgMatches;
use foreman_core::ProjectId;

use super::{arg, id, parsed, print_json, unknown};
use crate::Coordinator;

pub async fn handle_project(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("create", m)) => {
            let project = c
                .create_project(&parsed::<ProjectId>(m, "id")?, arg(m, "name")?, arg(m, "description")?)
                .await?;
            print_json(&project)
        }
        Some(("get", m)) => print_json(&c.get_project(&parsed(m, "id")?).await?),
        Some(("list", _)) => print_json(&c.list_projects().await?),
        Some((name, _)) => Err(unknown("project", name)),
        None => Err(unknown("project", "")),
    }
}

pub async fn handle_epic(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("create", m)) => {
            let epic = c
                .create_epic(&parsed(m, "project")?, arg(m, "title")?, arg(m, "description")?)
                .await?;
            print_json(&epic)
        }
        Some(("get", m)) => print_json(&c.get_epic(id(m, "id")?).await?),
        Some(("list", m)) => print_json(&c.list_epics(&parsed(m, "project")?).await?),
        Some((name, _)) => Err(unknown("epic", name)),
        None => Err(unknown("epic", "")),
    }
}

pub async fn handle_feature(c: &Coordinator, sub_m: &ArgMatches) -> Result<()> {
    match sub_m.subcommand() {
        Some(("create", m)) => {
            let feature = c
                .create_feature(id(m, "epic")?, arg(m, "title")?, arg(m, "description")?)
                .await?;
            print_json(&feature)
        }
        Some(("get", m)) => print_json(&c.get_feature(id(m, "id")?).await?),
        Some(("list", m)) => {
            let epic = m.get_one::<i64>("epic").copied();
            print_json(&c.list_features(&parsed(m, "project")?, epic).await?)
        }
        Some((name, _)) => Err(unknown("feature", name)),
        None => Err(unknown("feature", "")),
    }
}
