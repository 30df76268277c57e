//! Mention notifications.
//!
//! Mentions are derived from document and comment content on write. A
//! (source, target) pair is stored at most once; re-processing the same
//! content is absorbed by `INSERT OR IGNORE` on the unique key.

use foreman_core::{AgentId, Error, Mention, MentionSource, MentionTarget, ProjectId, Result};

use crate::{
    db::db_error,
    rows::{parse_mention_row, MENTION_COLUMNS},
    Coordinator,
};

impl Coordinator {
    /// Mentions addressed to an agent, or to every current member of a role.
    /// Newest first.
    pub async fn get_mentions(
        &self,
        project_id: &ProjectId,
        target: &MentionTarget,
        unread_only: bool,
    ) -> Result<Vec<Mention>> {
        let (target_clause, first, second) = match target {
            MentionTarget::Agent(agent) => ("target_agent = ?", agent.as_str(), None),
            MentionTarget::Role(role) => (
                "target_agent IN (SELECT id FROM agents WHERE project_id = ? AND role = ?)",
                project_id.as_str(),
                Some(role.as_str()),
            ),
        };

        let sql = format!(
            "SELECT {MENTION_COLUMNS} FROM mentions
             WHERE project_id = ? AND {target_clause} AND (? = 0 OR read = 0)
             ORDER BY created_at DESC, id DESC"
        );

        let mut query = sqlx::query(&sql).bind(project_id.as_str()).bind(first);
        if let Some(second) = second {
            query = query.bind(second);
        }
        query
            .bind(unread_only)
            .fetch_all(self.pool())
            .await
            .map_err(db_error)?
            .iter()
            .map(parse_mention_row)
            .collect()
    }

    /// Mark a mention read. Marking an already-read mention changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown mention.
    pub async fn mark_read(&self, mention_id: i64) -> Result<Mention> {
        let mut tx = self.begin_write().await?;
        let updated = sqlx::query("UPDATE mentions SET read = 1, updated_at = ? WHERE id = ? AND read = 0")
            .bind(self.stamp())
            .bind(mention_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();
        tx.commit().await.map_err(db_error)?;

        let mention = self.get_mention(mention_id).await?;
        if updated == 1 {
            tracing::debug!(mention = mention_id, agent = %mention.target_agent, "mention read");
        }
        Ok(mention)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown mention.
    pub async fn get_mention(&self, mention_id: i64) -> Result<Mention> {
        sqlx::query(&format!("SELECT {MENTION_COLUMNS} FROM mentions WHERE id = ?"))
            .bind(mention_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error)?
            .map_or_else(
                || Err(Error::NotFound(format!("mention {mention_id}"))),
                |row| parse_mention_row(&row),
            )
    }

    /// Ids of every agent registered in a project.
    pub(crate) async fn project_agent_ids(&self, project_id: &ProjectId) -> Result<Vec<AgentId>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM agents WHERE project_id = ? ORDER BY id")
            .bind(project_id.as_str())
            .fetch_all(self.pool())
            .await
            .map_err(db_error)?;
        ids.into_iter().map(AgentId::parse).collect()
    }

    /// Store one mention per target inside an open transaction. Pairs
    /// already recorded for this source are skipped.
    pub(crate) async fn record_mentions(
        conn: &mut sqlx::SqliteConnection,
        project_id: &ProjectId,
        source: MentionSource,
        targets: &[AgentId],
        author_id: &AgentId,
        at: &str,
    ) -> Result<()> {
        let mut inserted = 0;
        for target in targets {
            inserted += sqlx::query(
                "INSERT OR IGNORE INTO mentions
                     (project_id, source_kind, source_id, target_agent, author_id, read, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
            )
            .bind(project_id.as_str())
            .bind(source.kind())
            .bind(source.id())
            .bind(target.as_str())
            .bind(author_id.as_str())
            .bind(at)
            .bind(at)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?
            .rows_affected();
        }

        if inserted > 0 {
            tracing::info!(
                source = source.kind(),
                source_id = source.id(),
                author = %author_id,
                created = inserted,
                "mentions recorded"
            );
        }
        Ok(())
    }
}
