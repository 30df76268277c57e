//! Command handlers. Each one calls a single coordinator operation and
//! prints its result as JSON on stdout.

mod agent;
mod collab;
mod hierarchy;
mod service;
mod task;

use std::{fmt::Display, path::Path, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use serde::Serialize;

use crate::{cli::build_cli, load_config, Coordinator, Database};

/// Parse the process arguments and run the selected command.
pub async fn run_cli() -> Result<()> {
    let matches = build_cli().get_matches();
    dispatch(&matches).await
}

/// Run an already-parsed command line.
pub async fn dispatch(matches: &ArgMatches) -> Result<()> {
    let coordinator = open_coordinator(matches).await?;

    match matches.subcommand() {
        Some(("init", _)) => handle_init(&coordinator).await,
        Some(("project", sub_m)) => hierarchy::handle_project(&coordinator, sub_m).await,
        Some(("epic", sub_m)) => hierarchy::handle_epic(&coordinator, sub_m).await,
        Some(("feature", sub_m)) => hierarchy::handle_feature(&coordinator, sub_m).await,
        Some(("agent", sub_m)) => agent::handle_agent(&coordinator, sub_m).await,
        Some(("task", sub_m)) => task::handle_task(&coordinator, sub_m).await,
        Some(("comment", sub_m)) => task::handle_comment(&coordinator, sub_m).await,
        Some(("doc", sub_m)) => collab::handle_doc(&coordinator, sub_m).await,
        Some(("mention", sub_m)) => collab::handle_mention(&coordinator, sub_m).await,
        Some(("service", sub_m)) => service::handle_service(&coordinator, sub_m).await,
        Some(("changes", sub_m)) => service::handle_changes(&coordinator, sub_m).await,
        Some((name, _)) => Err(unknown("foreman", name)),
        None => Err(anyhow!("No command given. Run 'foreman --help' for usage.")),
    }
}

async fn open_coordinator(matches: &ArgMatches) -> Result<Coordinator> {
    let mut config = load_config().await?;
    if let Some(db) = matches.get_one::<String>("db") {
        config.database.clone_from(db);
        config.validate()?;
    }

    let db = Database::open(Path::new(&config.database)).await?;
    tracing::debug!(database = %config.database, "store opened");
    Ok(Coordinator::new(db, config))
}

async fn handle_init(coordinator: &Coordinator) -> Result<()> {
    let version = coordinator.database().schema_version().await?;
    print_json(&serde_json::json!({
        "database": coordinator.config().database,
        "schema_version": version,
    }))
}

pub(super) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

pub(super) fn unknown(group: &str, name: &str) -> anyhow::Error {
    anyhow!("Unknown {group} subcommand: {name}")
}

/// A string argument clap has already marked required.
pub(super) fn arg<'a>(m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: {name}"))
}

pub(super) fn opt<'a>(m: &'a ArgMatches, name: &str) -> Option<&'a str> {
    m.get_one::<String>(name).map(String::as_str)
}

pub(super) fn id(m: &ArgMatches, name: &str) -> Result<i64> {
    m.get_one::<i64>(name)
        .copied()
        .ok_or_else(|| anyhow!("Missing argument: {name}"))
}

/// Parse a string argument into a domain value. Failures are validation
/// errors, so they exit with the user-error code.
pub(super) fn parsed<T>(m: &ArgMatches, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let value = arg(m, name)?;
    parse_value(name, value)
}

pub(super) fn parsed_opt<T>(m: &ArgMatches, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    opt(m, name).map(|value| parse_value(name, value)).transpose()
}

fn parse_value<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| {
        anyhow::Error::new(foreman_core::Error::ValidationError(format!(
            "Invalid {name} '{value}': {e}"
        )))
    })
}

pub(super) fn wait(m: &ArgMatches) -> Option<Duration> {
    m.get_one::<u64>("wait").copied().map(Duration::from_secs)
}
