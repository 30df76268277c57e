//! CLI command definitions using `clap`

use clap::{value_parser, Arg, ArgAction, ArgGroup, Command};

/// Root command. Every subcommand prints JSON to stdout.
pub fn build_cli() -> Command {
    Command::new("foreman")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Task coordination for fleets of AI agents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_name("PATH")
                .help("SQLite store to use (overrides config and FOREMAN_DATABASE)"),
        )
        .subcommand(Command::new("init").about("Create the store and print its schema version"))
        .subcommand(cmd_project())
        .subcommand(cmd_epic())
        .subcommand(cmd_feature())
        .subcommand(cmd_agent())
        .subcommand(cmd_task())
        .subcommand(cmd_comment())
        .subcommand(cmd_doc())
        .subcommand(cmd_mention())
        .subcommand(cmd_service())
        .subcommand(cmd_changes())
}

fn required(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).required(true).help(help)
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).value_name(value_name(name)).help(help)
}

fn required_flag(name: &'static str, help: &'static str) -> Arg {
    flag(name, help).required(true)
}

fn value_name(name: &'static str) -> &'static str {
    match name {
        "project" => "PROJECT",
        "agent" | "author" | "by" => "AGENT",
        "role" => "ROLE",
        "skill" => "SKILL",
        _ => "VALUE",
    }
}

fn id_arg(help: &'static str) -> Arg {
    required("id", help).value_parser(value_parser!(i64))
}

fn wait_arg() -> Arg {
    Arg::new("wait")
        .long("wait")
        .value_name("SECS")
        .value_parser(value_parser!(u64))
        .help("Seconds to wait for an eligible task (0 polls once)")
}

fn cmd_project() -> Command {
    Command::new("project")
        .about("Manage projects")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a project")
                .arg(required("id", "Project id"))
                .arg(required_flag("name", "Display name"))
                .arg(flag("description", "Free-form description").default_value("")),
        )
        .subcommand(
            Command::new("get")
                .about("Show a project")
                .arg(required("id", "Project id")),
        )
        .subcommand(Command::new("list").about("List projects"))
}

fn cmd_epic() -> Command {
    Command::new("epic")
        .about("Manage epics")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create an epic in a project")
                .arg(required_flag("project", "Owning project"))
                .arg(required_flag("title", "Epic title"))
                .arg(flag("description", "Free-form description").default_value("")),
        )
        .subcommand(Command::new("get").about("Show an epic").arg(id_arg("Epic id")))
        .subcommand(
            Command::new("list")
                .about("List a project's epics")
                .arg(required_flag("project", "Project to list")),
        )
}

fn cmd_feature() -> Command {
    Command::new("feature")
        .about("Manage features")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a feature under an epic")
                .arg(
                    required_flag("epic", "Owning epic id").value_parser(value_parser!(i64)),
                )
                .arg(required_flag("title", "Feature title"))
                .arg(flag("description", "Free-form description").default_value("")),
        )
        .subcommand(Command::new("get").about("Show a feature").arg(id_arg("Feature id")))
        .subcommand(
            Command::new("list")
                .about("List a project's features")
                .arg(required_flag("project", "Project to list"))
                .arg(flag("epic", "Only this epic").value_parser(value_parser!(i64))),
        )
}

fn cmd_agent() -> Command {
    Command::new("agent")
        .about("Manage agents")
        .subcommand_required(true)
        .subcommand(
            Command::new("register")
                .about("Register an agent, or update its role and skill")
                .arg(required("id", "Agent id, e.g. backend_senior_001"))
                .arg(required_flag("project", "Project the agent works in"))
                .arg(required_flag("role", "Role, e.g. backend_dev"))
                .arg(required_flag("skill", "junior, senior or principal"))
                .arg(flag("mode", "mcp, http or cli").default_value("cli")),
        )
        .subcommand(Command::new("get").about("Show an agent").arg(required("id", "Agent id")))
        .subcommand(
            Command::new("list")
                .about("List a project's agents")
                .arg(required_flag("project", "Project to list"))
                .arg(flag("role", "Only this role")),
        )
        .subcommand(
            Command::new("current")
                .about("Show the task the agent is working on")
                .arg(required("id", "Agent id")),
        )
        .subcommand(
            Command::new("presence")
                .about("Show whether the agent is online or stale")
                .arg(required("id", "Agent id")),
        )
        .subcommand(
            Command::new("delete")
                .about("Remove an agent and release its locks")
                .arg(required("id", "Agent id")),
        )
}

fn cmd_task() -> Command {
    Command::new("task")
        .about("Manage tasks")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a task under a feature")
                .arg(required_flag("feature", "Owning feature id").value_parser(value_parser!(i64)))
                .arg(required_flag("title", "Task title"))
                .arg(flag("description", "Free-form description").default_value(""))
                .arg(required_flag("role", "Role that should do the work"))
                .arg(required_flag("skill", "Minimum skill: junior, senior or principal"))
                .arg(
                    flag("difficulty", "1 (trivial) to 5 (hard)")
                        .value_parser(value_parser!(u8))
                        .default_value("1"),
                )
                .arg(flag("complexity", "minor or major").default_value("minor"))
                .arg(required_flag("by", "Creating agent")),
        )
        .subcommand(Command::new("get").about("Show a task").arg(id_arg("Task id")))
        .subcommand(
            Command::new("list")
                .about("List a project's tasks")
                .arg(required_flag("project", "Project to list"))
                .arg(flag("status", "Only this status"))
                .arg(flag("role", "Only this target role"))
                .arg(flag("feature", "Only this feature").value_parser(value_parser!(i64)))
                .arg(flag("locked-by", "Only tasks locked by this agent")),
        )
        .subcommand(Command::new("delete").about("Delete a task").arg(id_arg("Task id")))
        .subcommand(
            Command::new("lock")
                .about("Take the exclusive lock on a task")
                .arg(id_arg("Task id"))
                .arg(required_flag("agent", "Locking agent")),
        )
        .subcommand(
            Command::new("unlock")
                .about("Release a lock on a hand-off stage")
                .arg(id_arg("Task id"))
                .arg(required_flag("agent", "Lock holder")),
        )
        .subcommand(
            Command::new("status")
                .about("Move a task to a new status")
                .arg(id_arg("Task id"))
                .arg(required("status", "Target status"))
                .arg(required_flag("agent", "Acting agent"))
                .arg(flag("notes", "Note appended to the task")),
        )
        .subcommand(
            Command::new("history")
                .about("Show a task's transitions")
                .arg(id_arg("Task id")),
        )
        .subcommand(
            Command::new("branch")
                .about("Record the VCS branch for a task")
                .arg(id_arg("Task id"))
                .arg(required("branch", "Branch name"))
                .arg(required_flag("agent", "Lock holder")),
        )
        .subcommand(
            Command::new("next")
                .about("Claim the next eligible task, waiting if none is ready")
                .arg(required_flag("agent", "Claiming agent"))
                .arg(required_flag("role", "Agent role"))
                .arg(required_flag("skill", "Agent skill level"))
                .arg(wait_arg()),
        )
        .subcommand(
            Command::new("advance")
                .about("Move a task forward, then claim the agent's next task")
                .arg(id_arg("Task id"))
                .arg(required("status", "Target status"))
                .arg(required_flag("agent", "Acting agent"))
                .arg(flag("notes", "Note appended to the task"))
                .arg(wait_arg()),
        )
}

fn cmd_comment() -> Command {
    Command::new("comment")
        .about("Comment on tasks")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add a comment; @agent_id notifies that agent")
                .arg(id_arg("Task id"))
                .arg(required_flag("agent", "Commenting agent"))
                .arg(required_flag("content", "Comment text")),
        )
        .subcommand(
            Command::new("list")
                .about("List a task's comments")
                .arg(id_arg("Task id")),
        )
}

fn cmd_doc() -> Command {
    Command::new("doc")
        .about("Shared documents")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Publish a document; @agent_id notifies that agent")
                .arg(required_flag("author", "Authoring agent"))
                .arg(required_flag("title", "Document title"))
                .arg(required_flag("content", "Document body"))
                .arg(
                    flag("type", "note, specification, guideline, report or handoff")
                        .default_value("note"),
                )
                .arg(
                    flag("expires-in", "Hide the document after this many seconds")
                        .value_parser(value_parser!(u64)),
                ),
        )
        .subcommand(Command::new("get").about("Show a document").arg(id_arg("Document id")))
        .subcommand(
            Command::new("list")
                .about("List a project's documents")
                .arg(required_flag("project", "Project to list"))
                .arg(flag("type", "Only this document type")),
        )
        .subcommand(
            Command::new("update")
                .about("Edit a document (author only)")
                .arg(id_arg("Document id"))
                .arg(required_flag("agent", "Author"))
                .arg(flag("title", "New title"))
                .arg(flag("content", "New body")),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a document (author only)")
                .arg(id_arg("Document id"))
                .arg(required_flag("agent", "Author")),
        )
}

fn cmd_mention() -> Command {
    Command::new("mention")
        .about("Mention notifications")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List mentions of an agent, or of every agent in a role")
                .arg(required_flag("project", "Project to search"))
                .arg(flag("agent", "Mentioned agent"))
                .arg(flag("role", "Mentioned role"))
                .group(
                    ArgGroup::new("target")
                        .args(["agent", "role"])
                        .required(true),
                )
                .arg(
                    Arg::new("unread")
                        .long("unread")
                        .action(ArgAction::SetTrue)
                        .help("Only unread mentions"),
                ),
        )
        .subcommand(
            Command::new("read")
                .about("Mark a mention read")
                .arg(id_arg("Mention id")),
        )
}

fn cmd_service() -> Command {
    Command::new("service")
        .about("Auxiliary service heartbeats")
        .subcommand_required(true)
        .subcommand(
            Command::new("register")
                .about("Register a service, or refresh its registration")
                .arg(required("name", "Service name"))
                .arg(required_flag("project", "Owning project"))
                .arg(required_flag("url", "Ping URL"))
                .arg(flag("metadata", "JSON metadata").default_value("{}")),
        )
        .subcommand(
            Command::new("heartbeat")
                .about("Record a heartbeat")
                .arg(required("name", "Service name"))
                .arg(required_flag("project", "Owning project")),
        )
        .subcommand(
            Command::new("get")
                .about("Show a service and its health")
                .arg(required("name", "Service name"))
                .arg(required_flag("project", "Owning project")),
        )
        .subcommand(
            Command::new("list")
                .about("List a project's services")
                .arg(required_flag("project", "Project to list")),
        )
        .subcommand(
            Command::new("unregister")
                .about("Remove a service")
                .arg(required("name", "Service name"))
                .arg(required_flag("project", "Owning project")),
        )
}

fn cmd_changes() -> Command {
    Command::new("changes")
        .about("Rows changed after a cursor")
        .arg(required_flag("project", "Project to watch"))
        .arg(required_flag("since", "RFC 3339 cursor from the previous call"))
        .arg(flag("agent", "Only this agent's mentions; refreshes its last_seen"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_task_next_parses() {
        let matches = build_cli().try_get_matches_from([
            "foreman",
            "--db",
            "/tmp/f.db",
            "task",
            "next",
            "--agent",
            "backend_senior_001",
            "--role",
            "backend_dev",
            "--skill",
            "senior",
            "--wait",
            "0",
        ]);
        let matches = match matches {
            Ok(m) => m,
            Err(e) => panic!("parse failed: {e}"),
        };
        assert_eq!(matches.get_one::<String>("db").map(String::as_str), Some("/tmp/f.db"));
        let Some(("task", task)) = matches.subcommand() else {
            panic!("expected task subcommand");
        };
        let Some(("next", next)) = task.subcommand() else {
            panic!("expected next subcommand");
        };
        assert_eq!(next.get_one::<u64>("wait").copied(), Some(0));
    }

    #[test]
    fn test_mention_list_needs_a_target() {
        let result = build_cli().try_get_matches_from(["foreman", "mention", "list", "--project", "shop"]);
        assert!(result.is_err());
    }
}
