//! Row parsing for database reads.

use std::str::FromStr;

use foreman_core::{
    parse_timestamp, Agent, AgentId, ConnectionMode, Document, DocumentType, Epic, Error, Feature,
    Mention, MentionSource, Project, ProjectId, Result, Role, SkillLevel, Task, TaskComment,
    TaskHistoryEntry, TaskStatus,
};
use sqlx::{sqlite::SqliteRow, Row, Sqlite};

pub(crate) const PROJECT_COLUMNS: &str = "id, name, description, created_at";
pub(crate) const EPIC_COLUMNS: &str = "id, project_id, title, description, created_at";
pub(crate) const FEATURE_COLUMNS: &str =
    "id, epic_id, project_id, title, description, created_at";
pub(crate) const AGENT_COLUMNS: &str =
    "id, project_id, role, skill_level, connection_mode, registered_at, last_seen";
pub(crate) const TASK_COLUMNS: &str = "id, project_id, feature_id, title, description, \
     target_role, target_skill, difficulty, complexity, status, locked_by, locked_at, \
     assigned_to, branch_name, created_by, notes, created_at, updated_at";
pub(crate) const HISTORY_COLUMNS: &str =
    "id, task_id, from_status, to_status, agent_id, notes, created_at";
pub(crate) const COMMENT_COLUMNS: &str =
    "id, task_id, project_id, author_id, content, created_at";
pub(crate) const DOCUMENT_COLUMNS: &str = "id, project_id, doc_type, title, content, \
     author_id, mentions, expires_at, created_at, updated_at";
pub(crate) const MENTION_COLUMNS: &str = "id, project_id, source_kind, source_id, \
     target_agent, author_id, read, created_at, updated_at";
pub(crate) const SERVICE_COLUMNS: &str =
    "project_id, name, ping_url, metadata, registered_at, last_heartbeat";

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| Error::DatabaseError(format!("Failed to read {name}: {e}")))
}

fn timestamp(row: &SqliteRow, name: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(&column::<String>(row, name)?)
}

fn optional_timestamp(row: &SqliteRow, name: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    column::<Option<String>>(row, name)?
        .as_deref()
        .map(parse_timestamp)
        .transpose()
}

fn optional_agent(row: &SqliteRow, name: &str) -> Result<Option<AgentId>> {
    column::<Option<String>>(row, name)?
        .map(AgentId::parse)
        .transpose()
}

fn parse_enum<T>(row: &SqliteRow, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|e| Error::ParseError(format!("Invalid {name} '{raw}': {e}")))
}

pub(crate) fn parse_project_row(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: ProjectId::parse(column::<String>(row, "id")?)?,
        name: column(row, "name")?,
        description: column(row, "description")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn parse_epic_row(row: &SqliteRow) -> Result<Epic> {
    Ok(Epic {
        id: column(row, "id")?,
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn parse_feature_row(row: &SqliteRow) -> Result<Feature> {
    Ok(Feature {
        id: column(row, "id")?,
        epic_id: column(row, "epic_id")?,
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn parse_agent_row(row: &SqliteRow) -> Result<Agent> {
    Ok(Agent {
        id: AgentId::parse(column::<String>(row, "id")?)?,
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        role: Role::parse(column::<String>(row, "role")?)?,
        skill_level: parse_enum::<SkillLevel>(row, "skill_level")?,
        connection_mode: parse_enum::<ConnectionMode>(row, "connection_mode")?,
        registered_at: timestamp(row, "registered_at")?,
        last_seen: timestamp(row, "last_seen")?,
    })
}

pub(crate) fn parse_task_row(row: &SqliteRow) -> Result<Task> {
    let difficulty: i64 = column(row, "difficulty")?;
    Ok(Task {
        id: column(row, "id")?,
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        feature_id: column(row, "feature_id")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        target_role: Role::parse(column::<String>(row, "target_role")?)?,
        target_skill: parse_enum::<SkillLevel>(row, "target_skill")?,
        difficulty: u8::try_from(difficulty)
            .map_err(|e| Error::ParseError(format!("Invalid difficulty {difficulty}: {e}")))?,
        complexity: parse_enum(row, "complexity")?,
        status: parse_enum::<TaskStatus>(row, "status")?,
        locked_by: optional_agent(row, "locked_by")?,
        locked_at: optional_timestamp(row, "locked_at")?,
        assigned_to: optional_agent(row, "assigned_to")?,
        branch_name: column(row, "branch_name")?,
        created_by: AgentId::parse(column::<String>(row, "created_by")?)?,
        notes: column(row, "notes")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn parse_history_row(row: &SqliteRow) -> Result<TaskHistoryEntry> {
    Ok(TaskHistoryEntry {
        id: column(row, "id")?,
        task_id: column(row, "task_id")?,
        from_status: parse_enum::<TaskStatus>(row, "from_status")?,
        to_status: parse_enum::<TaskStatus>(row, "to_status")?,
        agent_id: AgentId::parse(column::<String>(row, "agent_id")?)?,
        notes: column(row, "notes")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn parse_comment_row(row: &SqliteRow) -> Result<TaskComment> {
    Ok(TaskComment {
        id: column(row, "id")?,
        task_id: column(row, "task_id")?,
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        author_id: AgentId::parse(column::<String>(row, "author_id")?)?,
        content: column(row, "content")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn parse_document_row(row: &SqliteRow) -> Result<Document> {
    let mentions_json: String = column(row, "mentions")?;
    let mentions: Vec<AgentId> = serde_json::from_str(&mentions_json)
        .map_err(|e| Error::ParseError(format!("Invalid mentions JSON: {e}")))?;

    Ok(Document {
        id: column(row, "id")?,
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        doc_type: parse_enum::<DocumentType>(row, "doc_type")?,
        title: column(row, "title")?,
        content: column(row, "content")?,
        author_id: AgentId::parse(column::<String>(row, "author_id")?)?,
        mentions,
        expires_at: optional_timestamp(row, "expires_at")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn parse_mention_row(row: &SqliteRow) -> Result<Mention> {
    let kind: String = column(row, "source_kind")?;
    Ok(Mention {
        id: column(row, "id")?,
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        source: MentionSource::from_parts(&kind, column(row, "source_id")?)?,
        target_agent: AgentId::parse(column::<String>(row, "target_agent")?)?,
        author_id: AgentId::parse(column::<String>(row, "author_id")?)?,
        read: column(row, "read")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

/// Service columns before health is derived.
pub(crate) struct ServiceRecord {
    pub project_id: ProjectId,
    pub name: String,
    pub ping_url: String,
    pub metadata: serde_json::Value,
    pub registered_at: chrono::DateTime<chrono::Utc>,
    pub last_heartbeat: chrono::DateTime<chrono::Utc>,
}

pub(crate) fn parse_service_row(row: &SqliteRow) -> Result<ServiceRecord> {
    let metadata: String = column(row, "metadata")?;
    Ok(ServiceRecord {
        project_id: ProjectId::parse(column::<String>(row, "project_id")?)?,
        name: column(row, "name")?,
        ping_url: column(row, "ping_url")?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| Error::ParseError(format!("Invalid metadata JSON: {e}")))?,
        registered_at: timestamp(row, "registered_at")?,
        last_heartbeat: timestamp(row, "last_heartbeat")?,
    })
}
