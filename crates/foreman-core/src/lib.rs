//! Foreman-core - Core coordination types and rules
//!
//! This crate provides:
//! - Identifier newtypes (parse, don't validate)
//! - Work hierarchy and agent entities
//! - Task status state machine and skill eligibility table
//! - Mention extraction
//! - Service and agent liveness rules
//!
//! Nothing in here touches a database or an async runtime.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod agent;
pub mod changes;
pub mod clock;
pub mod document;
pub mod error;
pub mod hierarchy;
pub mod ids;
pub mod mention;
pub mod service;
pub mod skill;
pub mod status;
pub mod task;

pub use agent::{Agent, AgentPresence, ConnectionMode, NewAgent};
pub use changes::ChangeSet;
pub use clock::{format_timestamp, parse_timestamp, Clock, ManualClock, SystemClock};
pub use document::{Document, DocumentType, NewDocument, TaskComment};
pub use error::{Error, ErrorKind, Result};
pub use hierarchy::{require_text, Epic, Feature, Project};
pub use ids::{AgentId, ProjectId, Role};
pub use mention::{extract_mentions, Mention, MentionSource, MentionTarget};
pub use service::{Service, ServiceHealth};
pub use skill::SkillLevel;
pub use status::{TaskStatus, TransitionError, TransitionKind};
pub use task::{
    note_line, Complexity, NewTask, Task, TaskFilter, TaskHistoryEntry, MAX_DIFFICULTY,
    MIN_DIFFICULTY,
};
