//! Service health registry.
//!
//! Services are keyed by (project, name). Only `last_heartbeat` is stored;
//! health is derived on every read from `services.stale_after_secs`.

use chrono::{DateTime, Utc};
use foreman_core::{require_text, Error, ProjectId, Result, Service, ServiceHealth};

use crate::{
    db::db_error,
    rows::{parse_service_row, ServiceRecord, SERVICE_COLUMNS},
    Coordinator,
};

impl Coordinator {
    /// Register a service, or refresh an existing registration.
    ///
    /// Re-registering keeps `registered_at` and replaces the ping URL and
    /// metadata. Either way the call counts as a heartbeat.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown project and `ValidationError` for a
    /// blank name or ping URL.
    pub async fn register_service(
        &self,
        project_id: &ProjectId,
        name: &str,
        ping_url: &str,
        metadata: &serde_json::Value,
    ) -> Result<Service> {
        require_text("service name", name)?;
        require_text("ping url", ping_url)?;
        self.get_project(project_id).await?;
        let name = name.trim();

        let metadata = serde_json::to_string(metadata)
            .map_err(|e| Error::ParseError(format!("Failed to encode metadata: {e}")))?;
        let mut tx = self.begin_write().await?;
        let now = self.stamp();
        sqlx::query(
            "INSERT INTO services (project_id, name, ping_url, metadata, registered_at, last_heartbeat)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(project_id, name) DO UPDATE SET
                 ping_url = excluded.ping_url,
                 metadata = excluded.metadata,
                 last_heartbeat = excluded.last_heartbeat",
        )
        .bind(project_id.as_str())
        .bind(name)
        .bind(ping_url.trim())
        .bind(metadata)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        tracing::info!(project = %project_id, service = name, url = ping_url.trim(), "service registered");
        self.get_service(project_id, name).await
    }

    /// Record a heartbeat. Returns the stored heartbeat time.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the service is not registered.
    pub async fn heartbeat(&self, project_id: &ProjectId, name: &str) -> Result<DateTime<Utc>> {
        let name = name.trim();
        let mut tx = self.begin_write().await?;
        let now = self.now();
        let updated = sqlx::query(
            "UPDATE services SET last_heartbeat = ? WHERE project_id = ? AND name = ?",
        )
        .bind(foreman_core::format_timestamp(now))
        .bind(project_id.as_str())
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(Error::NotFound(format!("service '{name}' in project {project_id}")));
        }
        tx.commit().await.map_err(db_error)?;
        tracing::debug!(project = %project_id, service = name, "heartbeat");
        Ok(now)
    }

    /// # Errors
    ///
    /// Returns `NotFound` if the service is not registered.
    pub async fn get_service(&self, project_id: &ProjectId, name: &str) -> Result<Service> {
        let name = name.trim();
        let row = sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE project_id = ? AND name = ?"
        ))
        .bind(project_id.as_str())
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::NotFound(format!("service '{name}' in project {project_id}")))?;

        parse_service_row(&row).map(|record| self.with_health(record))
    }

    /// Every service in a project, by name.
    pub async fn list_services(&self, project_id: &ProjectId) -> Result<Vec<Service>> {
        sqlx::query(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE project_id = ? ORDER BY name"
        ))
        .bind(project_id.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(db_error)?
        .iter()
        .map(|row| parse_service_row(row).map(|record| self.with_health(record)))
        .collect()
    }

    /// # Errors
    ///
    /// Returns `NotFound` if the service is not registered.
    pub async fn unregister_service(&self, project_id: &ProjectId, name: &str) -> Result<()> {
        let name = name.trim();
        let deleted = sqlx::query("DELETE FROM services WHERE project_id = ? AND name = ?")
            .bind(project_id.as_str())
            .bind(name)
            .execute(self.pool())
            .await
            .map_err(db_error)?
            .rows_affected();

        if deleted == 0 {
            return Err(Error::NotFound(format!("service '{name}' in project {project_id}")));
        }
        tracing::info!(project = %project_id, service = name, "service unregistered");
        Ok(())
    }

    pub(crate) fn with_health(&self, record: ServiceRecord) -> Service {
        let health = ServiceHealth::at(
            record.last_heartbeat,
            self.now(),
            self.config().service_stale_after(),
        );
        Service {
            project_id: record.project_id,
            name: record.name,
            ping_url: record.ping_url,
            metadata: record.metadata,
            registered_at: record.registered_at,
            last_heartbeat: record.last_heartbeat,
            health,
        }
    }
}
