use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KairosError, KairosResult};

/// A project: a deadline-bearing container of plan nodes and work items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    /// Short human code, `[A-Z]{3,6}[0-9]{2}`.
    pub code: String,
    pub name: String,
    pub domain_tag: String,
    pub start_date: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
    pub status: ProjectStatus,
    pub archived_at: Option<DateTime<Utc>>,

    /// Fallback session-length policy for work items under this project that
    /// don't override it themselves.
    pub default_min_session: u32,
    pub default_max_session: u32,
    pub default_default_session: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Archived,
}

/// Validates `[A-Z]{3,6}[0-9]{2}` without pulling in `regex` for a single
/// fixed-shape pattern.
pub fn validate_project_code(code: &str) -> KairosResult<()> {
    let bytes = code.as_bytes();
    let len = bytes.len();
    if !(5..=8).contains(&len) {
        return Err(KairosError::Validation(format!(
            "project code '{code}' has invalid length"
        )));
    }
    let digit_start = bytes
        .iter()
        .position(|b| b.is_ascii_digit())
        .unwrap_or(len);
    let letters = &bytes[..digit_start];
    let digits = &bytes[digit_start..];
    if !(3..=6).contains(&letters.len()) || digits.len() != 2 {
        return Err(KairosError::Validation(format!(
            "project code '{code}' must match [A-Z]{{3,6}}[0-9]{{2}}"
        )));
    }
    if !letters.iter().all(|b| b.is_ascii_uppercase())
        || !digits.iter().all(|b| b.is_ascii_digit())
    {
        return Err(KairosError::Validation(format!(
            "project code '{code}' must match [A-Z]{{3,6}}[0-9]{{2}}"
        )));
    }
    Ok(())
}

impl Project {
    pub fn new(
        code: String,
        name: String,
        domain_tag: String,
        start_date: DateTime<Utc>,
        target_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> KairosResult<Self> {
        validate_project_code(&code)?;
        Ok(Self {
            id: Uuid::new_v4(),
            code,
            name,
            domain_tag,
            start_date,
            target_date,
            status: ProjectStatus::Active,
            archived_at: None,
            default_min_session: 15,
            default_max_session: 90,
            default_default_session: 30,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    /// Archives the project: sets `archived_at` and flips status. Idempotent.
    pub fn archive(&mut self, now: DateTime<Utc>) {
        if self.status != ProjectStatus::Archived {
            self.status = ProjectStatus::Archived;
            self.archived_at = Some(now);
            self.updated_at = now;
        }
    }

    /// Unarchives the project: clears `archived_at` and restores active status.
    pub fn unarchive(&mut self, now: DateTime<Utc>) {
        if self.status != ProjectStatus::Active {
            self.status = ProjectStatus::Active;
            self.archived_at = None;
            self.updated_at = now;
        }
    }

    /// A project must be archived before hard deletion unless `force` is set.
    pub fn can_hard_delete(&self, force: bool) -> bool {
        force || self.status == ProjectStatus::Archived
    }
}
