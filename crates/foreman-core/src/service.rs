//! Auxiliary service liveness.
//!
//! Health is never stored. It is computed from `now - last_heartbeat`
//! every time a service is read.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::ProjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceHealth {
    Active,
    Inactive,
}

impl ServiceHealth {
    /// Active iff the last heartbeat is no older than `stale_after`.
    #[must_use]
    pub fn at(last_heartbeat: DateTime<Utc>, now: DateTime<Utc>, stale_after: Duration) -> Self {
        if now - last_heartbeat <= stale_after {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

/// A registered service as seen at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub project_id: ProjectId,
    pub name: String,
    pub ping_url: String,
    pub metadata: serde_json::Value,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub health: ServiceHealth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_boundary() {
        let beat = Utc::now();
        let limit = Duration::seconds(60);
        assert_eq!(ServiceHealth::at(beat, beat, limit), ServiceHealth::Active);
        assert_eq!(
            ServiceHealth::at(beat, beat + Duration::seconds(60), limit),
            ServiceHealth::Active
        );
        assert_eq!(
            ServiceHealth::at(beat, beat + Duration::seconds(61), limit),
            ServiceHealth::Inactive
        );
    }

    #[test]
    fn test_health_serializes_lowercase() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&ServiceHealth::Inactive)?, "\"inactive\"");
        Ok(())
    }
}
