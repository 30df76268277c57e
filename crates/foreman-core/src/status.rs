//! Task Status State Machine (Pure Domain Logic)
//!
//! # State Machine
//!
//! ```text
//! created -> under_work -> dev_done -> qa_done -> documentation_done -> committed
//!    ^                                    |
//!    +------------------------------------+   (QA rejection)
//! ```
//!
//! Terminal state: `committed`.
//!
//! Legacy inputs `evaluation` and `approved` parse as `created` and
//! `under_work`; they are never produced.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Error;

/// Error type for invalid task state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid state transition: cannot transition from {from} to {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// How a valid transition affects the task lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// `created -> under_work`: acquires the lock as part of the step.
    Claim,
    /// Any other forward step: caller must hold the lock, which is released.
    Forward,
    /// `qa_done -> created`: clears lock and advisory owner.
    Reject,
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up.
    #[serde(alias = "evaluation")]
    Created,
    /// Exclusively held by one agent doing the work.
    #[serde(alias = "approved")]
    UnderWork,
    /// Implementation finished, awaiting QA.
    DevDone,
    /// QA passed, awaiting documentation.
    QaDone,
    /// Documentation written, awaiting commit.
    DocumentationDone,
    /// Finished.
    Committed,
}

impl TaskStatus {
    /// Returns the canonical string representation of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::UnderWork => "under_work",
            Self::DevDone => "dev_done",
            Self::QaDone => "qa_done",
            Self::DocumentationDone => "documentation_done",
            Self::Committed => "committed",
        }
    }

    /// Returns true if this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Hand-off stages between the exclusive work phase and commit.
    #[must_use]
    pub const fn is_handoff(&self) -> bool {
        matches!(self, Self::DevDone | Self::QaDone | Self::DocumentationDone)
    }

    /// The single forward successor, if any.
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::UnderWork),
            Self::UnderWork => Some(Self::DevDone),
            Self::DevDone => Some(Self::QaDone),
            Self::QaDone => Some(Self::DocumentationDone),
            Self::DocumentationDone => Some(Self::Committed),
            Self::Committed => None,
        }
    }

    /// Validates a transition from `self` to `target` and classifies it.
    pub fn validate_transition(
        &self,
        target: Self,
    ) -> std::result::Result<TransitionKind, TransitionError> {
        match (self, target) {
            (Self::Created, Self::UnderWork) => Ok(TransitionKind::Claim),
            (Self::QaDone, Self::Created) => Ok(TransitionKind::Reject),
            (from, to) if from.next() == Some(to) => Ok(TransitionKind::Forward),
            (from, to) => Err(TransitionError { from: *from, to }),
        }
    }

    /// Returns true if a transition from `self` to `target` is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        self.validate_transition(target).is_ok()
    }

    /// Returns all statuses in lifecycle order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Created,
            Self::UnderWork,
            Self::DevDone,
            Self::QaDone,
            Self::DocumentationDone,
            Self::Committed,
        ]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" | "evaluation" => Ok(Self::Created),
            "under_work" | "approved" => Ok(Self::UnderWork),
            "dev_done" => Ok(Self::DevDone),
            "qa_done" => Ok(Self::QaDone),
            "documentation_done" => Ok(Self::DocumentationDone),
            "committed" => Ok(Self::Committed),
            _ => Err(Error::ParseError(format!("Invalid task status: {s}"))),
        }
    }
}
