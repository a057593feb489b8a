//! Replan service (C9): iterative re-estimation to a fixed point via the
//! shared exponential-smoothing formula on `WorkItem`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserProfile;
use crate::error::{KairosError, KairosResult};
use crate::repository::{InMemoryUnitOfWork, Repositories};
use crate::risk::{self, RiskAssessment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplanTrigger {
    Manual,
    Automatic,
}

#[derive(Debug, Clone)]
pub struct ReplanRequest {
    pub trigger: ReplanTrigger,
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectReplanDelta {
    pub project_id: Uuid,
    pub project_name: String,
    pub risk_before: RiskAssessment,
    pub risk_after: RiskAssessment,
    pub changed_items_count: u32,
    pub remaining_min_before: u32,
    pub remaining_min_after: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplanResponse {
    pub generated_at: DateTime<Utc>,
    pub trigger: ReplanTrigger,
    pub deltas: Vec<ProjectReplanDelta>,
    pub recomputed_project_count: u32,
    pub global_mode: crate::pipeline::Mode,
}

pub struct ReplanService {
    repos: Arc<dyn Repositories>,
    uow: InMemoryUnitOfWork,
}

impl ReplanService {
    pub fn new(repos: Arc<dyn Repositories>, uow: InMemoryUnitOfWork) -> Self {
        Self { repos, uow }
    }

    /// Risk for one project from its current work items + recent sessions,
    /// without going through the full pipeline aggregation (replan only
    /// needs a single project at a time).
    async fn project_risk(
        &self,
        project: &crate::domain::Project,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> KairosResult<(RiskAssessment, u32, u32)> {
        let items = self.repos.list_work_items_by_project(project.id).await?;
        let sessions = self
            .repos
            .list_recent_by_project(project.id, 7, now)
            .await?;
        let recent_session_min: f64 = sessions.iter().map(|s| s.duration_min as f64).sum();

        let mut remaining_planned_min = 0u32;
        let mut remaining_logged_min = 0u32;
        let mut completed_planned_min = 0u32;
        for item in &items {
            if item.is_schedulable_status() {
                remaining_planned_min += item.planned_min;
                remaining_logged_min += item.logged_min;
            } else if matches!(
                item.status,
                crate::domain::WorkItemStatus::Done | crate::domain::WorkItemStatus::Skipped
            ) {
                completed_planned_min += item.planned_min;
            }
        }
        let total = remaining_planned_min + completed_planned_min;
        let progress_pct = if total == 0 {
            1.0
        } else {
            completed_planned_min as f64 / total as f64
        };
        let time_elapsed_pct = match project.target_date {
            None => 0.0,
            Some(target) => {
                let span = (target - project.start_date).num_milliseconds() as f64;
                if span <= 0.0 {
                    1.0
                } else {
                    ((now - project.start_date).num_milliseconds() as f64 / span).clamp(0.0, 1.0)
                }
            }
        };

        let input = risk::RiskInput {
            now,
            target_date: project.target_date,
            remaining_planned_min,
            remaining_logged_min,
            buffer_pct: profile.buffer_pct,
            recent_daily_min: recent_session_min / 7.0,
            baseline_daily_min: profile.baseline_daily_min,
            progress_pct,
            time_elapsed_pct,
            // Replan doesn't resolve per-item effective due dates across the
            // whole project the way the pipeline's aggregate phase does;
            // treated as fully caught-up so it never suppresses a genuine
            // ratio-driven critical/at_risk classification (rules 4-7).
            due_based_expected_pct: 0.0,
        };
        Ok((risk::assess(&input), remaining_planned_min, remaining_logged_min))
    }

    pub async fn replan(&self, request: &ReplanRequest) -> KairosResult<ReplanResponse> {
        let now = request.now.unwrap_or_else(Utc::now);
        let profile = self.repos.get_profile().await?;
        let projects = self.repos.list_projects(false).await?;
        if projects.is_empty() {
            return Err(KairosError::NoActiveProjects);
        }

        let mut deltas = Vec::new();
        for project in &projects {
            let (risk_before, remaining_min_before, _) =
                self.project_risk(project, &profile, now).await?;

            let project_id = project.id;
            let changed_items_count: u32 = self
                .uow
                .within_tx(|repos| async move {
                    let items = repos.list_work_items_by_project(project_id).await?;
                    let mut changed = 0u32;
                    for mut item in items {
                        if !item.eligible_for_reestimate() {
                            continue;
                        }
                        let Some(new_planned) = item.reestimate_smoothing() else {
                            continue;
                        };
                        if item.apply_reestimate(new_planned, now) {
                            repos.update_work_item(item).await?;
                            changed += 1;
                        }
                    }
                    Ok(changed)
                })
                .await?;

            let (risk_after, remaining_min_after, _) =
                self.project_risk(project, &profile, now).await?;

            deltas.push(ProjectReplanDelta {
                project_id: project.id,
                project_name: project.name.clone(),
                risk_before,
                risk_after,
                changed_items_count,
                remaining_min_before,
                remaining_min_after,
            });
        }

        let global_mode = if deltas
            .iter()
            .any(|d| d.risk_after.risk_level == crate::risk::RiskLevel::Critical)
        {
            crate::pipeline::Mode::Critical
        } else {
            crate::pipeline::Mode::Balanced
        };

        Ok(ReplanResponse {
            generated_at: now,
            trigger: request.trigger,
            recomputed_project_count: deltas.len() as u32,
            deltas,
            global_mode,
        })
    }
}
