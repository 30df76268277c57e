//! Change feed payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Document, Mention, Service, Task};

/// Rows mutated after a cursor.
///
/// Pass `cursor` back as `since` on the next poll. It trails the read by a
/// settle window, so rows may be delivered more than once; apply them
/// idempotently by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub cursor: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub documents: Vec<Document>,
    pub mentions: Vec<Mention>,
    pub services: Vec<Service>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
            && self.documents.is_empty()
            && self.mentions.is_empty()
            && self.services.is_empty()
    }
}
