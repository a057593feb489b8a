//! Scoring engine (C5): per-candidate weighted factor score, plus the
//! canonical deterministic sort that backs both `what-now` and `status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserProfile;
use crate::risk::RiskLevel;

/// Deadline pressure saturates to 1.0 once the effective due date is this
/// close (or past); it decays linearly to 0 at `DEADLINE_PRESSURE_WINDOW_DAYS`
/// out.
const DEADLINE_PRESSURE_SATURATION_DAYS: f64 = 2.0;
const DEADLINE_PRESSURE_WINDOW_DAYS: f64 = 14.0;

/// Spacing saturates to 1.0 at this many days since the last session (or no
/// session at all, which scores as "long ago").
const SPACING_WINDOW_DAYS: f64 = 7.0;

/// Earliest of the work item's own due date, its owning node's due date, and
/// its owning project's target date.
pub fn effective_due_date(
    work_item_due: Option<DateTime<Utc>>,
    node_due: Option<DateTime<Utc>>,
    project_target: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    [work_item_due, node_due, project_target]
        .into_iter()
        .flatten()
        .min()
}

fn deadline_pressure(now: DateTime<Utc>, due: Option<DateTime<Utc>>) -> f64 {
    let Some(due) = due else {
        return 0.0;
    };
    let days_until = (due - now).num_milliseconds() as f64 / (1000.0 * 3600.0 * 24.0);
    if days_until <= DEADLINE_PRESSURE_SATURATION_DAYS {
        return 1.0;
    }
    if days_until >= DEADLINE_PRESSURE_WINDOW_DAYS {
        return 0.0;
    }
    let span = DEADLINE_PRESSURE_WINDOW_DAYS - DEADLINE_PRESSURE_SATURATION_DAYS;
    1.0 - (days_until - DEADLINE_PRESSURE_SATURATION_DAYS) / span
}

fn behind_pace(risk: RiskLevel) -> f64 {
    match risk {
        RiskLevel::Critical => 1.0,
        RiskLevel::AtRisk => 0.5,
        RiskLevel::OnTrack => 0.0,
    }
}

/// `days_since_last` is `None` when the item has no session in the lookback
/// window — scored as "long ago" (a bonus), never as a penalty.
fn spacing(days_since_last: Option<f64>) -> f64 {
    match days_since_last {
        None => 1.0,
        Some(days) => (days.max(0.0) / SPACING_WINDOW_DAYS).min(1.0),
    }
}

/// Per-candidate input to the scoring engine. Everything here is already
/// resolved by the aggregate/resolve-blocks phases — scoring itself is a
/// pure function of this row.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub work_item_id: Uuid,
    pub project_id: Uuid,
    pub work_item_seq: u64,
    pub project_risk: RiskLevel,
    pub effective_due_date: Option<DateTime<Utc>>,
    pub days_since_last_session: Option<f64>,
    pub now: DateTime<Utc>,
}

/// Scored candidate, carrying enough of its input forward for sorting and
/// allocation without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub work_item_id: Uuid,
    pub project_id: Uuid,
    pub work_item_seq: u64,
    pub project_risk: RiskLevel,
    pub effective_due_date: Option<DateTime<Utc>>,
    pub factor_deadline_pressure: f64,
    pub factor_behind_pace: f64,
    pub factor_spacing: f64,
    pub factor_variation: f64,
    pub total_score: f64,
}

/// Computes the four factor scores and the weighted total for one candidate.
/// `factor_variation` is always 0 here — the allocator (§4.6-equivalent) is
/// the only stage that acts on variation.
pub fn score(input: &ScoringInput, profile: &UserProfile) -> ScoredCandidate {
    let factor_deadline_pressure = deadline_pressure(input.now, input.effective_due_date);
    let factor_behind_pace = behind_pace(input.project_risk);
    let factor_spacing = spacing(input.days_since_last_session);
    let factor_variation = 0.0;

    let total_score = profile.weight_deadline_pressure * factor_deadline_pressure
        + profile.weight_behind_pace * factor_behind_pace
        + profile.weight_spacing * factor_spacing
        + profile.weight_variation * factor_variation;

    ScoredCandidate {
        work_item_id: input.work_item_id,
        project_id: input.project_id,
        work_item_seq: input.work_item_seq,
        project_risk: input.project_risk,
        effective_due_date: input.effective_due_date,
        factor_deadline_pressure,
        factor_behind_pace,
        factor_spacing,
        factor_variation,
        total_score,
    }
}

/// Canonical tie-break chain (spec §4.5):
/// 1. Lower risk priority (critical < at_risk < on_track) first.
/// 2. Earlier effective due date first; absent dates sort last.
/// 3. Higher total score first.
/// 4. Lower work-item sequence number first.
/// 5. Lower work-item ID (lexicographic) last.
pub fn canonical_sort(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        a.project_risk
            .priority()
            .cmp(&b.project_risk.priority())
            .then_with(|| match (a.effective_due_date, b.effective_due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| {
                b.total_score
                    .partial_cmp(&a.total_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.work_item_seq.cmp(&b.work_item_seq))
            .then_with(|| a.work_item_id.cmp(&b.work_item_id))
    });
}
