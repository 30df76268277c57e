//! Mention extraction and the mention record.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{AgentId, Error, ProjectId, Result, Role};

/// `@agent_id` at the start of the text or after a character that cannot
/// appear in an email's local part, so `ops@dev_01.io` is not a mention.
#[allow(clippy::expect_used)]
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_.+-])@([A-Za-z0-9_-]+)").expect("mention pattern compiles")
});

/// Where a mention came from. Exactly one source per mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MentionSource {
    Document(i64),
    Comment(i64),
}

impl MentionSource {
    /// Stored discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Document(_) => "document",
            Self::Comment(_) => "comment",
        }
    }

    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Document(id) | Self::Comment(id) => *id,
        }
    }

    /// Rebuild from the stored (kind, id) pair.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` for an unknown kind.
    pub fn from_parts(kind: &str, id: i64) -> Result<Self> {
        match kind {
            "document" => Ok(Self::Document(id)),
            "comment" => Ok(Self::Comment(id)),
            other => Err(Error::ParseError(format!("unknown mention source: {other}"))),
        }
    }
}

/// Who a mention query is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionTarget {
    /// One agent.
    Agent(AgentId),
    /// Every current member of a role in the project.
    Role(Role),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub id: i64,
    pub project_id: ProjectId,
    pub source: MentionSource,
    pub target_agent: AgentId,
    pub author_id: AgentId,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Find `@id` references to known agents in `content`.
///
/// Tokens must equal a known agent id exactly. The author is never
/// notified about their own text. The result is deduplicated and keeps
/// first-occurrence order.
#[must_use]
pub fn extract_mentions(content: &str, known: &[AgentId], author: &AgentId) -> Vec<AgentId> {
    MENTION_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|token| *token != author.as_str())
        .filter_map(|token| known.iter().find(|id| id.as_str() == token))
        .unique()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Result<Vec<AgentId>> {
        raw.iter().map(|s| AgentId::parse(*s)).collect()
    }

    #[test]
    fn test_only_known_agents_match() -> Result<()> {
        let known = ids(&["qa_senior_001", "dev_01"])?;
        let author = AgentId::parse("pm_01")?;
        let found = extract_mentions(
            "@qa_senior_001 please review, cc @nobody and @dev_01.",
            &known,
            &author,
        );
        assert_eq!(found, ids(&["qa_senior_001", "dev_01"])?);
        Ok(())
    }

    #[test]
    fn test_prefix_of_known_id_does_not_match() -> Result<()> {
        let known = ids(&["qa_senior_001"])?;
        let author = AgentId::parse("pm_01")?;
        assert!(extract_mentions("@qa_senior", &known, &author).is_empty());
        assert!(extract_mentions("@qa_senior_0011", &known, &author).is_empty());
        Ok(())
    }

    #[test]
    fn test_author_and_duplicates_dropped() -> Result<()> {
        let known = ids(&["pm_01", "dev_01"])?;
        let author = AgentId::parse("pm_01")?;
        let found = extract_mentions("@pm_01 @dev_01 @dev_01", &known, &author);
        assert_eq!(found, ids(&["dev_01"])?);
        Ok(())
    }

    #[test]
    fn test_email_addresses_are_not_mentions() -> Result<()> {
        let known = ids(&["dev_01", "qa_01"])?;
        let author = AgentId::parse("pm_01")?;
        assert!(extract_mentions("mail ops@dev_01.io or first.last@qa_01", &known, &author).is_empty());
        assert_eq!(
            extract_mentions("(@dev_01) and\n@qa_01", &known, &author),
            ids(&["dev_01", "qa_01"])?
        );
        Ok(())
    }

    #[test]
    fn test_source_parts() -> Result<()> {
        let src = MentionSource::Comment(7);
        assert_eq!(MentionSource::from_parts(src.kind(), src.id())?, src);
        assert!(MentionSource::from_parts("email", 1).is_err());
        Ok(())
    }
}
