//! `what-now` recommendation pipeline (C7): Validate -> Load -> Aggregate ->
//! Determine mode -> Resolve blocks -> Score -> Sort -> Allocate -> Assemble.
//!
//! No writes occur on this path (spec §5) — every phase after Load is a pure
//! function of the previous phase's output.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::allocation::{self, AllocationCandidate, WorkSlice};
use crate::error::{BlockerCode, KairosError, KairosResult};
use crate::repository::{Repositories, SchedulableCandidate};
use crate::risk::{self, RiskAssessment, RiskLevel};
use crate::scoring::{self, ScoredCandidate, ScoringInput};

const RECENT_SESSION_DAYS: i64 = 7;
const DEFAULT_MAX_SLICES: usize = 3;

#[derive(Debug, Clone)]
pub struct WhatNowRequest {
    pub available_min: u32,
    pub now: Option<DateTime<Utc>>,
    pub max_slices: usize,
    pub include_archived: bool,
    pub project_scope: Vec<Uuid>,
    pub enforce_variation: bool,
}

impl Default for WhatNowRequest {
    fn default() -> Self {
        Self {
            available_min: 0,
            now: None,
            max_slices: DEFAULT_MAX_SLICES,
            include_archived: false,
            project_scope: Vec::new(),
            enforce_variation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Critical,
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blocker {
    pub entity_type: String,
    pub entity_id: Uuid,
    pub code: BlockerCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRiskSummary {
    pub project_id: Uuid,
    pub project_name: String,
    pub risk: RiskAssessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatNowResponse {
    pub generated_at: DateTime<Utc>,
    pub mode: Mode,
    pub requested_min: u32,
    pub allocated_min: u32,
    pub unallocated_min: u32,
    pub recommendations: Vec<WorkSlice>,
    pub blockers: Vec<Blocker>,
    pub top_risk_projects: Vec<ProjectRiskSummary>,
    pub policy_messages: Vec<String>,
}

/// Per-project bucket accumulated during the Aggregate phase.
pub(crate) struct ProjectAggregate {
    pub project_id: Uuid,
    pub project_name: String,
    pub start_date: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
    pub remaining_planned_min: u32,
    pub remaining_logged_min: u32,
    pub completed_planned_min: u32,
    pub due_by_now_planned_min: u32,
    pub recent_session_min: f64,
}

impl ProjectAggregate {
    fn new(
        project_id: Uuid,
        project_name: String,
        start_date: DateTime<Utc>,
        target_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            project_id,
            project_name,
            start_date,
            target_date,
            remaining_planned_min: 0,
            remaining_logged_min: 0,
            completed_planned_min: 0,
            due_by_now_planned_min: 0,
            recent_session_min: 0.0,
        }
    }

    fn total_planned_min(&self) -> u32 {
        self.remaining_planned_min + self.completed_planned_min
    }

    fn progress_pct(&self) -> f64 {
        let total = self.total_planned_min();
        if total == 0 {
            1.0
        } else {
            self.completed_planned_min as f64 / total as f64
        }
    }

    fn due_based_expected_pct(&self) -> f64 {
        let total = self.total_planned_min();
        if total == 0 {
            1.0
        } else {
            (self.completed_planned_min + self.due_by_now_planned_min) as f64 / total as f64
        }
    }

    fn time_elapsed_pct(&self, now: DateTime<Utc>) -> f64 {
        let Some(target) = self.target_date else {
            return 0.0;
        };
        let span = (target - self.start_date).num_milliseconds() as f64;
        if span <= 0.0 {
            return 1.0;
        }
        let elapsed = (now - self.start_date).num_milliseconds() as f64;
        (elapsed / span).clamp(0.0, 1.0)
    }
}

pub struct WhatNowService {
    repos: Arc<dyn Repositories>,
}

impl WhatNowService {
    pub fn new(repos: Arc<dyn Repositories>) -> Self {
        Self { repos }
    }

    fn check_cancelled(token: Option<&CancellationToken>) -> KairosResult<()> {
        if token.map(|t| t.is_cancelled()).unwrap_or(false) {
            return Err(KairosError::Cancelled);
        }
        Ok(())
    }

    pub async fn recommend(
        &self,
        request: &WhatNowRequest,
        cancellation: Option<&CancellationToken>,
    ) -> KairosResult<WhatNowResponse> {
        // 1. Validate.
        if request.available_min == 0 {
            return Err(KairosError::InvalidAvailableMin);
        }
        Self::check_cancelled(cancellation)?;

        // 2. Load.
        let now = request.now.unwrap_or_else(Utc::now);
        let profile = self.repos.get_profile().await?;
        let candidates = self
            .repos
            .list_schedulable(request.include_archived, &request.project_scope)
            .await?;
        if candidates.is_empty() {
            return Err(KairosError::NoCandidates);
        }
        let recent_sessions = self.repos.list_recent(RECENT_SESSION_DAYS, now).await?;
        let completed_summary = self.repos.list_completed_summary_by_project().await?;
        let titles: HashMap<Uuid, String> = candidates
            .iter()
            .map(|c| (c.work_item.id, c.work_item.title.clone()))
            .collect();
        Self::check_cancelled(cancellation)?;

        // 3. Aggregate.
        let (aggregates, last_session_by_item) =
            aggregate(&candidates, &recent_sessions, &completed_summary, now);
        let risk_by_project: HashMap<Uuid, RiskAssessment> = aggregates
            .iter()
            .map(|(id, agg)| {
                let input = risk::RiskInput {
                    now,
                    target_date: agg.target_date,
                    remaining_planned_min: agg.remaining_planned_min,
                    remaining_logged_min: agg.remaining_logged_min,
                    buffer_pct: profile.buffer_pct,
                    recent_daily_min: agg.recent_session_min / RECENT_SESSION_DAYS as f64,
                    baseline_daily_min: profile.baseline_daily_min,
                    progress_pct: agg.progress_pct(),
                    time_elapsed_pct: agg.time_elapsed_pct(now),
                    due_based_expected_pct: agg.due_based_expected_pct(),
                };
                (*id, risk::assess(&input))
            })
            .collect();
        Self::check_cancelled(cancellation)?;

        // 4. Determine mode.
        let mode = if risk_by_project
            .values()
            .any(|r| r.risk_level == RiskLevel::Critical)
        {
            Mode::Critical
        } else {
            Mode::Balanced
        };

        // 5. Resolve blocks.
        let candidate_ids: Vec<Uuid> = candidates.iter().map(|c| c.work_item.id).collect();
        let dependency_blocked = self.repos.list_blocked_work_item_ids(&candidate_ids).await?;
        Self::check_cancelled(cancellation)?;

        let mut blockers = Vec::new();
        let mut schedulable = Vec::new();
        for candidate in &candidates {
            let title = &candidate.work_item.title;
            if dependency_blocked.contains(&candidate.work_item.id) {
                blockers.push(Blocker {
                    entity_type: "work_item".into(),
                    entity_id: candidate.work_item.id,
                    code: BlockerCode::Dependency,
                    message: BlockerCode::Dependency.message(title),
                });
                continue;
            }
            if let Some(not_before) = candidate.work_item.not_before {
                if not_before > now {
                    blockers.push(Blocker {
                        entity_type: "work_item".into(),
                        entity_id: candidate.work_item.id,
                        code: BlockerCode::NotBefore,
                        message: BlockerCode::NotBefore.message(title),
                    });
                    continue;
                }
            }
            if candidate.work_item.is_work_complete() {
                blockers.push(Blocker {
                    entity_type: "work_item".into(),
                    entity_id: candidate.work_item.id,
                    code: BlockerCode::WorkComplete,
                    message: BlockerCode::WorkComplete.message(title),
                });
                continue;
            }
            if mode == Mode::Critical {
                let project_risk = risk_by_project
                    .get(&candidate.project_id)
                    .map(|r| r.risk_level)
                    .unwrap_or(RiskLevel::OnTrack);
                if project_risk != RiskLevel::Critical {
                    blockers.push(Blocker {
                        entity_type: "work_item".into(),
                        entity_id: candidate.work_item.id,
                        code: BlockerCode::NotInCriticalScope,
                        message: BlockerCode::NotInCriticalScope.message(title),
                    });
                    continue;
                }
            }
            schedulable.push(candidate);
        }

        // 6. Score.
        let mut scored: Vec<(ScoredCandidate, AllocationCandidate)> = Vec::new();
        for candidate in &schedulable {
            let window = candidate.work_item.session_window(
                candidate.project_default_min_session,
                candidate.project_default_max_session,
                candidate.project_default_default_session,
            );
            let effective_due = scoring::effective_due_date(
                candidate.work_item.due_date,
                candidate.node_due_date,
                candidate.project_target_date,
            );
            let days_since_last = last_session_by_item
                .get(&candidate.work_item.id)
                .map(|last| (now - *last).num_milliseconds() as f64 / (1000.0 * 3600.0 * 24.0));
            let project_risk = risk_by_project
                .get(&candidate.project_id)
                .map(|r| r.risk_level)
                .unwrap_or(RiskLevel::OnTrack);

            let scoring_input = ScoringInput {
                work_item_id: candidate.work_item.id,
                project_id: candidate.project_id,
                work_item_seq: candidate.work_item.seq,
                project_risk,
                effective_due_date: effective_due,
                days_since_last_session: days_since_last,
                now,
            };
            let scored_candidate = scoring::score(&scoring_input, &profile);
            let remaining = candidate.work_item.remaining_planned_min();
            let allocation_candidate = AllocationCandidate {
                scored: scored_candidate.clone(),
                min_session: window.min_session,
                max_session: window.max_session,
                default_session: window.default_session,
                remaining_planned_min: if remaining > 0 { Some(remaining) } else { None },
            };
            scored.push((scored_candidate, allocation_candidate));
        }
        Self::check_cancelled(cancellation)?;

        // 7. Canonical sort.
        let mut scored_only: Vec<ScoredCandidate> =
            scored.iter().map(|(s, _)| s.clone()).collect();
        scoring::canonical_sort(&mut scored_only);
        let order: HashMap<Uuid, usize> = scored_only
            .iter()
            .enumerate()
            .map(|(i, c)| (c.work_item_id, i))
            .collect();
        scored.sort_by_key(|(s, _)| order[&s.work_item_id]);
        let allocation_candidates: Vec<AllocationCandidate> =
            scored.into_iter().map(|(_, a)| a).collect();

        // 8. Allocate.
        let allocation_result = allocation::allocate(
            &allocation_candidates,
            request.available_min,
            request.max_slices.max(1),
            request.enforce_variation,
            mode == Mode::Critical,
        );
        for blocker in &allocation_result.blockers {
            let title = titles
                .get(&blocker.work_item_id)
                .map(String::as_str)
                .unwrap_or("work item");
            blockers.push(Blocker {
                entity_type: "work_item".into(),
                entity_id: blocker.work_item_id,
                code: blocker.code,
                message: blocker.code.message(title),
            });
        }

        // 9. Assemble response.
        let mut top_risk_projects: Vec<ProjectRiskSummary> = aggregates
            .values()
            .map(|agg| ProjectRiskSummary {
                project_id: agg.project_id,
                project_name: agg.project_name.clone(),
                risk: risk_by_project[&agg.project_id].clone(),
            })
            .collect();
        top_risk_projects.sort_by(|a, b| {
            a.risk
                .risk_level
                .priority()
                .cmp(&b.risk.risk_level.priority())
                .then_with(|| a.project_name.cmp(&b.project_name))
        });

        let policy_messages = top_risk_projects
            .iter()
            .filter(|p| p.risk.risk_level == RiskLevel::OnTrack)
            .map(|p| format!("{} is on track, secondary work is safe", p.project_name))
            .collect();

        let allocated_min: u32 = allocation_result.slices.iter().map(|s| s.allocated_min).sum();

        Ok(WhatNowResponse {
            generated_at: now,
            mode,
            requested_min: request.available_min,
            allocated_min,
            unallocated_min: allocation_result.unallocated_min,
            recommendations: allocation_result.slices,
            blockers,
            top_risk_projects,
            policy_messages,
        })
    }
}

/// Bucket candidates by project, summing planned/logged minutes, due-by-now
/// minutes, and recent session minutes via a work-item -> project index built
/// in the same pass. Returns the aggregates plus the most recent session
/// timestamp seen per work item (used for the spacing factor).
pub(crate) fn aggregate(
    candidates: &[SchedulableCandidate],
    recent_sessions: &[crate::domain::SessionLog],
    completed_summary: &HashMap<Uuid, crate::repository::CompletedSummary>,
    now: DateTime<Utc>,
) -> (HashMap<Uuid, ProjectAggregate>, HashMap<Uuid, DateTime<Utc>>) {
    let mut aggregates: HashMap<Uuid, ProjectAggregate> = HashMap::new();
    let mut item_to_project: HashMap<Uuid, Uuid> = HashMap::new();

    for candidate in candidates {
        let agg = aggregates.entry(candidate.project_id).or_insert_with(|| {
            ProjectAggregate::new(
                candidate.project_id,
                candidate.project_name.clone(),
                candidate.project_start_date,
                candidate.project_target_date,
            )
        });
        agg.remaining_planned_min += candidate.work_item.planned_min;
        agg.remaining_logged_min += candidate.work_item.logged_min;
        let effective_due = scoring::effective_due_date(
            candidate.work_item.due_date,
            candidate.node_due_date,
            candidate.project_target_date,
        );
        if let Some(due) = effective_due {
            if due <= now {
                agg.due_by_now_planned_min += candidate.work_item.planned_min;
            }
        }
        item_to_project.insert(candidate.work_item.id, candidate.project_id);
    }

    for (project_id, summary) in completed_summary {
        // Projects with only completed items (no schedulable candidates)
        // never entered `aggregates` above and are skipped here: they
        // contribute nothing schedulable and we don't have their name/dates
        // without an extra repository round-trip.
        if let Some(agg) = aggregates.get_mut(project_id) {
            agg.completed_planned_min += summary.total_planned_min;
        }
    }

    let mut last_session_by_item: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
    for session in recent_sessions {
        let entry = last_session_by_item.entry(session.work_item_id).or_insert(session.started_at);
        if session.started_at > *entry {
            *entry = session.started_at;
        }
        if let Some(project_id) = item_to_project.get(&session.work_item_id) {
            if let Some(agg) = aggregates.get_mut(project_id) {
                agg.recent_session_min += session.duration_min as f64;
            }
        }
    }

    (aggregates, last_session_by_item)
}
