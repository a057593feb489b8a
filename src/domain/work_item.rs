use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KairosError, KairosResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Todo,
    InProgress,
    Done,
    Skipped,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationMode {
    Estimate,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationSource {
    Manual,
    System,
}

/// Optional units-tracking triple: e.g. 10 pages total, 4 read so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsTracking {
    pub kind: String,
    pub total: u32,
    pub done: u32,
}

/// The scheduling atom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub node_id: Uuid,
    pub title: String,
    /// Open tag set: reading, practice, assignment, review, task, zettel, ...
    pub type_tag: String,
    pub status: WorkItemStatus,
    pub planned_min: u32,
    pub logged_min: u32,
    pub units: Option<UnitsTracking>,
    pub duration_mode: DurationMode,
    pub duration_source: DurationSource,
    pub min_session: Option<u32>,
    pub max_session: Option<u32>,
    pub default_session: Option<u32>,
    pub splittable: bool,
    pub not_before: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    /// Monotonically-assigned per-project sequence number.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Effective per-item session window after inheriting project defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub min_session: u32,
    pub max_session: u32,
    pub default_session: u32,
}

impl WorkItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: Uuid,
        title: String,
        type_tag: String,
        planned_min: u32,
        units: Option<UnitsTracking>,
        duration_mode: DurationMode,
        min_session: Option<u32>,
        max_session: Option<u32>,
        default_session: Option<u32>,
        splittable: bool,
        not_before: Option<DateTime<Utc>>,
        due_date: Option<DateTime<Utc>>,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id,
            title,
            type_tag,
            status: WorkItemStatus::Todo,
            planned_min,
            logged_min: 0,
            units,
            duration_mode,
            duration_source: DurationSource::Manual,
            min_session,
            max_session,
            default_session,
            splittable,
            not_before,
            due_date,
            seq,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolves this item's effective session window, clamped per
    /// `0 <= min <= default <= max`, inheriting project defaults where absent.
    pub fn session_window(
        &self,
        project_min: u32,
        project_max: u32,
        project_default: u32,
    ) -> SessionWindow {
        let min_session = self.min_session.unwrap_or(project_min);
        let max_session = self.max_session.unwrap_or(project_max).max(min_session);
        let default_raw = self.default_session.unwrap_or(project_default);
        let default_session = default_raw.clamp(min_session, max_session);
        SessionWindow {
            min_session,
            max_session,
            default_session,
        }
    }

    /// `effective_logged_min = planned_min if status in {done, skipped} else
    /// max(logged_min, 0)`. Used for aggregated progress even when logging
    /// lags reality.
    pub fn effective_logged_min(&self) -> u32 {
        match self.status {
            WorkItemStatus::Done | WorkItemStatus::Skipped => self.planned_min,
            _ => self.logged_min,
        }
    }

    /// Blocked from further recommendation, but not auto-finished.
    pub fn is_work_complete(&self) -> bool {
        self.planned_min > 0 && self.logged_min >= self.planned_min
    }

    pub fn is_schedulable_status(&self) -> bool {
        matches!(self.status, WorkItemStatus::Todo | WorkItemStatus::InProgress)
    }

    pub fn remaining_planned_min(&self) -> u32 {
        self.planned_min.saturating_sub(self.logged_min)
    }

    /// Pure state transition: increments `logged_min`/`units.done`; promotes
    /// `todo` -> `in_progress` on first successful minutes logged.
    pub fn apply_session(
        &mut self,
        delta_minutes: i64,
        delta_units: i64,
        now: DateTime<Utc>,
    ) -> KairosResult<()> {
        if delta_minutes < 0 {
            return Err(KairosError::Validation(
                "session minutes must be >= 0".into(),
            ));
        }
        if self.status == WorkItemStatus::Todo && delta_minutes > 0 {
            self.status = WorkItemStatus::InProgress;
        }
        self.logged_min = self.logged_min.saturating_add(delta_minutes as u32);
        if let Some(units) = self.units.as_mut() {
            let done = units.done as i64 + delta_units;
            units.done = done.clamp(0, units.total as i64) as u32;
        }
        self.updated_at = now;
        Ok(())
    }

    /// True iff duration-mode is `estimate`, `units_total > 0`,
    /// `units_done > 0`, `logged_min > 0`.
    pub fn eligible_for_reestimate(&self) -> bool {
        if self.duration_mode != DurationMode::Estimate {
            return false;
        }
        let Some(units) = &self.units else {
            return false;
        };
        units.total > 0 && units.done > 0 && self.logged_min > 0
    }

    /// Replaces `planned_min` if changed, marks the source `system`.
    pub fn apply_reestimate(&mut self, new_planned: u32, now: DateTime<Utc>) -> bool {
        if new_planned != self.planned_min {
            self.planned_min = new_planned;
            self.duration_source = DurationSource::System;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    /// `implied_total = (logged_min / units_done) * units_total`,
    /// `new_planned = round(0.7 * planned_min + 0.3 * implied_total)`.
    /// Shared by the replan loop (§4.8) and session logging (§4.9).
    pub fn reestimate_smoothing(&self) -> Option<u32> {
        let units = self.units.as_ref()?;
        if units.done == 0 {
            return None;
        }
        let implied_total = (self.logged_min as f64 / units.done as f64) * units.total as f64;
        let new_planned = 0.7 * self.planned_min as f64 + 0.3 * implied_total;
        Some(new_planned.round() as u32)
    }
}
