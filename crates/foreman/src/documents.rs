//! Shared documents and task comments.
//!
//! Both record mentions of other agents in the same transaction as the
//! content itself. Expired documents are invisible to every read.

use foreman_core::{
    extract_mentions, format_timestamp, require_text, AgentId, Document, DocumentType, Error,
    MentionSource, NewDocument, ProjectId, Result, TaskComment,
};

use crate::{
    db::db_error,
    rows::{parse_comment_row, parse_document_row, COMMENT_COLUMNS, DOCUMENT_COLUMNS},
    Coordinator,
};

fn mentions_json(mentions: &[AgentId]) -> Result<String> {
    serde_json::to_string(mentions)
        .map_err(|e| Error::ParseError(format!("Failed to encode mentions: {e}")))
}

impl Coordinator {
    /// Publish a document in the author's project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown author and `ValidationError` for a
    /// blank title.
    pub async fn create_document(&self, doc: &NewDocument) -> Result<Document> {
        doc.validate()?;
        let author = self.get_agent(&doc.author_id).await?;
        let known = self.project_agent_ids(&author.project_id).await?;
        let mentioned = extract_mentions(&doc.content, &known, &author.id);

        let mut tx = self.begin_write().await?;
        let now = self.stamp();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO documents (project_id, doc_type, title, content, author_id, mentions,
                 expires_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(author.project_id.as_str())
        .bind(doc.doc_type.to_string())
        .bind(doc.title.trim())
        .bind(&doc.content)
        .bind(author.id.as_str())
        .bind(mentions_json(&mentioned)?)
        .bind(doc.expires_at.map(format_timestamp))
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        Self::record_mentions(
            &mut *tx,
            &author.project_id,
            MentionSource::Document(id),
            &mentioned,
            &author.id,
            &now,
        )
        .await?;
        tx.commit().await.map_err(db_error)?;

        self.touch_agent(&author.id).await?;
        tracing::info!(
            document = id,
            project = %author.project_id,
            doc_type = %doc.doc_type,
            mentions = mentioned.len(),
            "document created"
        );
        self.get_document(id).await
    }

    /// Edit a document's title and/or content. Author only.
    ///
    /// Mentions are re-derived from the new content. Agents already
    /// notified for this document are not notified again.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or expired document
    /// - `PermissionDenied` if `agent_id` is not the author
    /// - `ValidationError` for a blank title
    pub async fn update_document(
        &self,
        id: i64,
        agent_id: &AgentId,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Document> {
        let doc = self.get_document(id).await?;
        if &doc.author_id != agent_id {
            return Err(Error::PermissionDenied(format!(
                "document {id} belongs to {}",
                doc.author_id
            )));
        }

        let title = title.unwrap_or(&doc.title);
        require_text("document title", title)?;
        let content = content.unwrap_or(&doc.content);

        let known = self.project_agent_ids(&doc.project_id).await?;
        let mentioned = extract_mentions(content, &known, agent_id);

        let mut tx = self.begin_write().await?;
        let now = self.stamp();
        sqlx::query(
            "UPDATE documents SET title = ?, content = ?, mentions = ?, updated_at = ? WHERE id = ?",
        )
        .bind(title.trim())
        .bind(content)
        .bind(mentions_json(&mentioned)?)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        Self::record_mentions(
            &mut *tx,
            &doc.project_id,
            MentionSource::Document(id),
            &mentioned,
            agent_id,
            &now,
        )
        .await?;
        tx.commit().await.map_err(db_error)?;

        tracing::info!(document = id, agent = %agent_id, "document updated");
        self.get_document(id).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown or expired document.
    pub async fn get_document(&self, id: i64) -> Result<Document> {
        sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE id = ? AND (expires_at IS NULL OR expires_at > ?)"
        ))
        .bind(id)
        .bind(self.stamp())
        .fetch_optional(self.pool())
        .await
        .map_err(db_error)?
        .map_or_else(
            || Err(Error::NotFound(format!("document {id}"))),
            |row| parse_document_row(&row),
        )
    }

    /// Unexpired documents in a project, oldest first.
    pub async fn list_documents(
        &self,
        project_id: &ProjectId,
        doc_type: Option<DocumentType>,
    ) -> Result<Vec<Document>> {
        let doc_type = doc_type.map(|t| t.to_string());
        sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE project_id = ?
               AND (? IS NULL OR doc_type = ?)
               AND (expires_at IS NULL OR expires_at > ?)
             ORDER BY created_at, id"
        ))
        .bind(project_id.as_str())
        .bind(doc_type.as_deref())
        .bind(doc_type.as_deref())
        .bind(self.stamp())
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_document_row)
        .collect()
    }

    /// Delete a document and the mentions it produced. Author only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown document and `PermissionDenied` if
    /// `agent_id` is not the author.
    pub async fn delete_document(&self, id: i64, agent_id: &AgentId) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(db_error)?;
        let deleted = sqlx::query("DELETE FROM documents WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(agent_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(db_error)?;
            let author: Option<String> =
                sqlx::query_scalar("SELECT author_id FROM documents WHERE id = ?")
                    .bind(id)
                    .fetch_optional(self.pool())
                    .await
                    .map_err(db_error)?;
            return Err(match author {
                Some(author) => {
                    Error::PermissionDenied(format!("document {id} belongs to {author}"))
                }
                None => Error::NotFound(format!("document {id}")),
            });
        }

        sqlx::query("DELETE FROM mentions WHERE source_kind = 'document' AND source_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        tracing::info!(document = id, agent = %agent_id, "document deleted");
        Ok(())
    }

    /// Comment on a task. Mentions in `content` notify the named agents.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task or an author outside the
    /// task's project, and `ValidationError` for blank content.
    pub async fn create_comment(
        &self,
        task_id: i64,
        agent_id: &AgentId,
        content: &str,
    ) -> Result<TaskComment> {
        require_text("comment", content)?;
        let task = self.get_task(task_id).await?;
        let author = self.require_agent_in(agent_id, &task.project_id).await?;
        let known = self.project_agent_ids(&task.project_id).await?;
        let mentioned = extract_mentions(content, &known, &author.id);

        let mut tx = self.begin_write().await?;
        let now = self.stamp();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO task_comments (task_id, project_id, author_id, content, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(task_id)
        .bind(task.project_id.as_str())
        .bind(author.id.as_str())
        .bind(content)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        Self::record_mentions(
            &mut *tx,
            &task.project_id,
            MentionSource::Comment(id),
            &mentioned,
            &author.id,
            &now,
        )
        .await?;
        tx.commit().await.map_err(db_error)?;

        self.touch_agent(&author.id).await?;
        tracing::info!(task = task_id, comment = id, agent = %agent_id, "comment added");

        sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM task_comments WHERE id = ?"))
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(db_error)
            .and_then(|row| parse_comment_row(&row))
    }

    /// Comments on a task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown task.
    pub async fn comments(&self, task_id: i64) -> Result<Vec<TaskComment>> {
        self.get_task(task_id).await?;
        sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM task_comments WHERE task_id = ? ORDER BY id"
        ))
        .bind(task_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_comment_row)
        .collect()
    }
}
