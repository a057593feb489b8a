//! Risk engine (C4): given per-project aggregates, computes a risk level and
//! derived metrics (remaining minutes, required daily pace, slack).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `RiskPriority(critical) = 0 < at_risk = 1 < on_track = 2` — declaration
/// order doubles as priority order for the canonical sort (spec §4.4/§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Critical,
    AtRisk,
    OnTrack,
}

impl RiskLevel {
    pub fn priority(self) -> u8 {
        match self {
            RiskLevel::Critical => 0,
            RiskLevel::AtRisk => 1,
            RiskLevel::OnTrack => 2,
        }
    }
}

/// Per-project aggregate inputs to the risk engine.
#[derive(Debug, Clone)]
pub struct RiskInput {
    pub now: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
    /// Aggregate `planned_min` across this project's currently schedulable
    /// (non-terminal) work items — the work still outstanding.
    pub remaining_planned_min: u32,
    /// Aggregate `logged_min` across the same set.
    pub remaining_logged_min: u32,
    pub buffer_pct: f64,
    /// Sum of session minutes in the last 7 days for this project, / 7.
    pub recent_daily_min: f64,
    pub baseline_daily_min: f64,
    /// Structural progress ratio from the completed-work summary.
    pub progress_pct: f64,
    pub time_elapsed_pct: f64,
    /// Share of total planned work whose effective due date is <= now.
    pub due_based_expected_pct: f64,
}

/// Derived risk assessment for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub remaining_min: u32,
    pub days_left: Option<u32>,
    pub required_daily_min: Option<f64>,
    pub effective_daily_min: f64,
    pub recent_daily_min: f64,
    pub slack_min_per_day: Option<f64>,
    pub ratio: Option<f64>,
    pub progress_pct: f64,
    pub time_elapsed_pct: f64,
    pub on_pace_by_due_date: bool,
}

const RATIO_CRITICAL_THRESHOLD: f64 = 1.5;
const RATIO_AT_RISK_THRESHOLD: f64 = 1.0;
const ON_PACE_EPSILON: f64 = 1e-6;

/// `max(0, ceil(hours_until(target_date) / 24))`.
fn days_left(now: DateTime<Utc>, target_date: DateTime<Utc>) -> u32 {
    let hours = (target_date - now).num_milliseconds() as f64 / (1000.0 * 3600.0);
    if hours <= 0.0 {
        return 0;
    }
    (hours / 24.0).ceil() as u32
}

/// Classifies project risk and derives remaining-work metrics (spec §4.4).
/// First matching rule wins.
pub fn assess(input: &RiskInput) -> RiskAssessment {
    let effective_daily_min = input.recent_daily_min.max(input.baseline_daily_min);
    let remaining_min = {
        let delta = input.remaining_planned_min as f64 - input.remaining_logged_min as f64;
        let buffered = delta * (1.0 + input.buffer_pct);
        buffered.max(0.0).round() as u32
    };
    let on_pace_by_due_date = input.due_based_expected_pct <= input.progress_pct + ON_PACE_EPSILON;

    let Some(target_date) = input.target_date else {
        // Rule 1: no target date -> on_track, remaining still reported.
        return RiskAssessment {
            risk_level: RiskLevel::OnTrack,
            remaining_min,
            days_left: None,
            required_daily_min: None,
            effective_daily_min,
            recent_daily_min: input.recent_daily_min,
            slack_min_per_day: None,
            ratio: None,
            progress_pct: input.progress_pct,
            time_elapsed_pct: input.time_elapsed_pct,
            on_pace_by_due_date,
        };
    };

    let days = days_left(input.now, target_date);

    // Rule 1b: required_daily_min <= 0 (nothing left to do) -> on_track.
    if remaining_min == 0 {
        return RiskAssessment {
            risk_level: RiskLevel::OnTrack,
            remaining_min,
            days_left: Some(days),
            required_daily_min: Some(0.0),
            effective_daily_min,
            recent_daily_min: input.recent_daily_min,
            slack_min_per_day: Some(effective_daily_min),
            ratio: Some(0.0),
            progress_pct: input.progress_pct,
            time_elapsed_pct: input.time_elapsed_pct,
            on_pace_by_due_date,
        };
    }

    // Rule 2: no days left but work remains -> critical.
    if days == 0 {
        return RiskAssessment {
            risk_level: RiskLevel::Critical,
            remaining_min,
            days_left: Some(0),
            required_daily_min: None,
            effective_daily_min,
            recent_daily_min: input.recent_daily_min,
            slack_min_per_day: None,
            ratio: None,
            progress_pct: input.progress_pct,
            time_elapsed_pct: input.time_elapsed_pct,
            on_pace_by_due_date,
        };
    }

    // Rule 3: baseline explicitly disabled, no recent work, work remains -> critical.
    if effective_daily_min == 0.0 {
        return RiskAssessment {
            risk_level: RiskLevel::Critical,
            remaining_min,
            days_left: Some(days),
            required_daily_min: None,
            effective_daily_min,
            recent_daily_min: input.recent_daily_min,
            slack_min_per_day: None,
            ratio: None,
            progress_pct: input.progress_pct,
            time_elapsed_pct: input.time_elapsed_pct,
            on_pace_by_due_date,
        };
    }

    let required_daily_min = remaining_min as f64 / days as f64;
    let slack_min_per_day = effective_daily_min - required_daily_min;
    let ratio = required_daily_min / effective_daily_min;

    let risk_level = if ratio > RATIO_CRITICAL_THRESHOLD {
        if on_pace_by_due_date {
            RiskLevel::AtRisk // rule 5: back-loaded but on schedule
        } else {
            RiskLevel::Critical // rule 4
        }
    } else if ratio > RATIO_AT_RISK_THRESHOLD {
        RiskLevel::AtRisk // rule 6
    } else {
        RiskLevel::OnTrack // rule 7
    };

    RiskAssessment {
        risk_level,
        remaining_min,
        days_left: Some(days),
        required_daily_min: Some(required_daily_min),
        effective_daily_min,
        recent_daily_min: input.recent_daily_min,
        slack_min_per_day: Some(slack_min_per_day),
        ratio: Some(ratio),
        progress_pct: input.progress_pct,
        time_elapsed_pct: input.time_elapsed_pct,
        on_pace_by_due_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_input(now: DateTime<Utc>) -> RiskInput {
        RiskInput {
            now,
            target_date: None,
            remaining_planned_min: 300,
            remaining_logged_min: 0,
            buffer_pct: 0.0,
            recent_daily_min: 0.0,
            baseline_daily_min: 30.0,
            progress_pct: 0.0,
            time_elapsed_pct: 0.0,
            due_based_expected_pct: 0.0,
        }
    }

    #[test]
    fn no_target_date_is_on_track() {
        let now = Utc::now();
        let assessment = assess(&base_input(now));
        assert_eq!(assessment.risk_level, RiskLevel::OnTrack);
        assert_eq!(assessment.days_left, None);
    }

    #[test]
    fn zero_days_left_with_remaining_work_is_critical() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.target_date = Some(now); // due right now
        let assessment = assess(&input);
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
        assert_eq!(assessment.days_left, Some(0));
    }

    #[test]
    fn zero_baseline_no_recent_activity_is_critical() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.target_date = Some(now + Duration::days(10));
        input.baseline_daily_min = 0.0;
        input.recent_daily_min = 0.0;
        let assessment = assess(&input);
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn heavy_ratio_but_on_pace_by_due_date_caps_at_risk() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.target_date = Some(now + Duration::days(1));
        input.remaining_planned_min = 300; // ratio way above 1.5 at 30 min/day baseline
        input.due_based_expected_pct = 0.0;
        input.progress_pct = 1.0; // everything due so far is done
        let assessment = assess(&input);
        assert_eq!(assessment.risk_level, RiskLevel::AtRisk);
    }

    #[test]
    fn heavy_ratio_and_behind_is_critical() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.target_date = Some(now + Duration::days(1));
        input.remaining_planned_min = 300;
        input.due_based_expected_pct = 1.0;
        input.progress_pct = 0.0;
        let assessment = assess(&input);
        assert_eq!(assessment.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn moderate_ratio_is_at_risk() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.target_date = Some(now + Duration::days(10));
        input.remaining_planned_min = 350; // 35/day vs 30 baseline => ratio ~1.17
        let assessment = assess(&input);
        assert_eq!(assessment.risk_level, RiskLevel::AtRisk);
    }

    #[test]
    fn comfortable_pace_is_on_track() {
        let now = Utc::now();
        let mut input = base_input(now);
        input.target_date = Some(now + Duration::days(30));
        input.remaining_planned_min = 60; // 2/day vs 30 baseline
        let assessment = assess(&input);
        assert_eq!(assessment.risk_level, RiskLevel::OnTrack);
    }

    #[test]
    fn priority_ordering_matches_spec() {
        assert!(RiskLevel::Critical < RiskLevel::AtRisk);
        assert!(RiskLevel::AtRisk < RiskLevel::OnTrack);
    }
}
