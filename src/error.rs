//! Crate-wide error and blocker types.
//!
//! `KairosError` is the closed taxonomy described in the spec's error
//! handling design: validation errors, structural errors, and infrastructure
//! errors. Blockers are deliberately *not* part of this enum — they are
//! first-class response data (see [`BlockerCode`] and `crate::domain::Blocker`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KairosError {
    #[error("available_min must be > 0")]
    InvalidAvailableMin,

    #[error("no schedulable candidates after filters")]
    NoCandidates,

    #[error("no active projects")]
    NoActiveProjects,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("transient write conflict, retry")]
    Conflict,

    #[error("operation cancelled")]
    Cancelled,

    #[error("entity not found: {0}")]
    NotFound(String),
}

impl KairosError {
    /// Stable machine-readable code, mirrored in `spec.md` §6's closed set.
    pub fn code(&self) -> &'static str {
        match self {
            KairosError::InvalidAvailableMin => "INVALID_AVAILABLE_MIN",
            KairosError::NoCandidates => "NO_CANDIDATES",
            KairosError::NoActiveProjects => "NO_ACTIVE_PROJECTS",
            KairosError::Validation(_) => "VALIDATION",
            KairosError::Store(_) => "STORE",
            KairosError::Conflict => "CONFLICT",
            KairosError::Cancelled => "CANCELLED",
            KairosError::NotFound(_) => "NOT_FOUND",
        }
    }

    /// Infrastructure errors are the only ones worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KairosError::Conflict)
    }
}

pub type KairosResult<T> = Result<T, KairosError>;

/// Closed set of blocker codes from `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockerCode {
    Dependency,
    NotBefore,
    WorkComplete,
    SessionMinExceedsAvail,
    NotInCriticalScope,
}

impl BlockerCode {
    pub fn message(&self, title: &str) -> String {
        match self {
            BlockerCode::Dependency => {
                format!("{title} is blocked by an unfinished predecessor")
            }
            BlockerCode::NotBefore => format!("{title} is not eligible yet (not_before)"),
            BlockerCode::WorkComplete => {
                format!("{title} has logged at least its planned minutes")
            }
            BlockerCode::SessionMinExceedsAvail => {
                format!("{title}'s minimum session length exceeds the available time")
            }
            BlockerCode::NotInCriticalScope => {
                format!("{title} is not part of the critical project scope right now")
            }
        }
    }
}
