//! Identifier newtypes.
//!
//! Each type validates at construction time, so a value that exists is valid.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Reserved keywords that cannot be used as identifiers.
const RESERVED_KEYWORDS: &[&str] = &["null", "undefined", "true", "false", "none", "default"];

/// Maximum allowed identifier length.
const MAX_ID_LENGTH: usize = 128;

fn validate_token(kind: &str, s: &str) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::ValidationError(format!("{kind} cannot be empty")));
    }

    if s.len() > MAX_ID_LENGTH {
        return Err(Error::ValidationError(format!(
            "{kind} exceeds maximum length of {MAX_ID_LENGTH} characters"
        )));
    }

    let invalid_chars: String = s
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        .collect();
    if !invalid_chars.is_empty() {
        return Err(Error::ValidationError(format!(
            "{kind} contains invalid characters: {invalid_chars}"
        )));
    }

    let lower = s.to_lowercase();
    if RESERVED_KEYWORDS.contains(&lower.as_str()) {
        return Err(Error::ValidationError(format!(
            "{kind} '{s}' is a reserved keyword"
        )));
    }

    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate.
            pub fn parse(s: impl Into<String>) -> Result<Self> {
                let s = s.into();
                validate_token($kind, &s)?;
                Ok(Self(s))
            }

            /// Get the string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }
    };
}

string_id!(
    /// Unique agent identifier, e.g. `qa_senior_001`.
    AgentId,
    "Agent ID"
);

string_id!(
    /// Project identifier (slug).
    ProjectId,
    "Project ID"
);

string_id!(
    /// Agent role, e.g. `backend_dev`. Roles are open-ended; matching is exact.
    Role,
    "Role"
);
