//! Project → Epic → Feature containment.

use foreman_core::{require_text, Epic, Error, Feature, Project, ProjectId, Result};

use crate::{
    db::db_error,
    rows::{parse_epic_row, parse_feature_row, parse_project_row, EPIC_COLUMNS, FEATURE_COLUMNS, PROJECT_COLUMNS},
    Coordinator,
};

impl Coordinator {
    /// Create a project.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the name is blank or the id is taken.
    pub async fn create_project(
        &self,
        id: &ProjectId,
        name: &str,
        description: &str,
    ) -> Result<Project> {
        require_text("project name", name)?;
        let now = self.stamp();

        let result = sqlx::query(
            "INSERT INTO projects (id, name, description, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(description)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::ValidationError(format!("project '{id}' already exists")));
        }

        tracing::info!(project = %id, "project created");
        self.get_project(id).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project.
    pub async fn get_project(&self, id: &ProjectId) -> Result<Project> {
        sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(db_error)?
            .map_or_else(
                || Err(Error::NotFound(format!("project {id}"))),
                |row| parse_project_row(&row),
            )
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"))
            .fetch_all(self.pool())
            .await
            .map_err(db_error)?
            .iter()
            .map(parse_project_row)
            .collect()
    }

    /// Create an epic in an existing project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project, `ValidationError` for a blank title.
    pub async fn create_epic(
        &self,
        project_id: &ProjectId,
        title: &str,
        description: &str,
    ) -> Result<Epic> {
        require_text("epic title", title)?;
        self.get_project(project_id).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO epics (project_id, title, description, created_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(project_id.as_str())
        .bind(title)
        .bind(description)
        .bind(self.stamp())
        .fetch_one(self.pool())
        .await
        .map_err(db_error)?;

        tracing::info!(project = %project_id, epic = id, "epic created");
        self.get_epic(id).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown epic.
    pub async fn get_epic(&self, id: i64) -> Result<Epic> {
        sqlx::query(&format!("SELECT {EPIC_COLUMNS} FROM epics WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error)?
            .map_or_else(
                || Err(Error::NotFound(format!("epic {id}"))),
                |row| parse_epic_row(&row),
            )
    }

    pub async fn list_epics(&self, project_id: &ProjectId) -> Result<Vec<Epic>> {
        sqlx::query(&format!(
            "SELECT {EPIC_COLUMNS} FROM epics WHERE project_id = ? ORDER BY id"
        ))
        .bind(project_id.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_epic_row)
        .collect()
    }

    /// Create a feature under an epic. The feature inherits the epic's project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown epic, `ValidationError` for a blank title.
    pub async fn create_feature(&self, epic_id: i64, title: &str, description: &str) -> Result<Feature> {
        require_text("feature title", title)?;
        let epic = self.get_epic(epic_id).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO features (epic_id, project_id, title, description, created_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(epic.id)
        .bind(epic.project_id.as_str())
        .bind(title)
        .bind(description)
        .bind(self.stamp())
        .fetch_one(self.pool())
        .await
        .map_err(db_error)?;

        tracing::info!(project = %epic.project_id, epic = epic.id, feature = id, "feature created");
        self.get_feature(id).await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown feature.
    pub async fn get_feature(&self, id: i64) -> Result<Feature> {
        sqlx::query(&format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error)?
            .map_or_else(
                || Err(Error::NotFound(format!("feature {id}"))),
                |row| parse_feature_row(&row),
            )
    }

    /// Features of a project, optionally narrowed to one epic.
    pub async fn list_features(
        &self,
        project_id: &ProjectId,
        epic_id: Option<i64>,
    ) -> Result<Vec<Feature>> {
        sqlx::query(&format!(
            "SELECT {FEATURE_COLUMNS} FROM features
             WHERE project_id = ? AND (? IS NULL OR epic_id = ?)
             ORDER BY id"
        ))
        .bind(project_id.as_str())
        .bind(epic_id)
        .bind(epic_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(parse_feature_row)
        .collect()
    }
}
