//! Status service (C8): the same Load/Aggregate/Determine-mode phases as the
//! `what-now` pipeline, with no block resolution or allocation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KairosResult;
use crate::pipeline::{aggregate, Mode};
use crate::repository::Repositories;
use crate::risk::{self, RiskAssessment, RiskLevel};

const DEFAULT_RECENT_SESSION_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct StatusRequest {
    pub now: Option<DateTime<Utc>>,
    pub include_archived: bool,
    pub project_scope: Vec<Uuid>,
    pub include_recent_session_days: i64,
}

impl Default for StatusRequest {
    fn default() -> Self {
        Self {
            now: None,
            include_archived: false,
            project_scope: Vec::new(),
            include_recent_session_days: DEFAULT_RECENT_SESSION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatusView {
    pub project_id: Uuid,
    pub project_name: String,
    pub risk: RiskAssessment,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub critical_count: u32,
    pub at_risk_count: u32,
    pub on_track_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub generated_at: DateTime<Utc>,
    pub global_mode: Mode,
    pub summary: GlobalSummary,
    pub projects: Vec<ProjectStatusView>,
    pub policy_message: String,
}

pub struct StatusService {
    repos: Arc<dyn Repositories>,
}

impl StatusService {
    pub fn new(repos: Arc<dyn Repositories>) -> Self {
        Self { repos }
    }

    pub async fn status(&self, request: &StatusRequest) -> KairosResult<StatusResponse> {
        let now = request.now.unwrap_or_else(Utc::now);
        let profile = self.repos.get_profile().await?;
        let candidates = self
            .repos
            .list_schedulable(request.include_archived, &request.project_scope)
            .await?;
        let recent_sessions = self
            .repos
            .list_recent(request.include_recent_session_days, now)
            .await?;
        let completed_summary = self.repos.list_completed_summary_by_project().await?;

        let (aggregates, _) = aggregate(&candidates, &recent_sessions, &completed_summary, now);

        let mut projects: Vec<ProjectStatusView> = aggregates
            .values()
            .map(|agg| {
                let input = risk::RiskInput {
                    now,
                    target_date: agg.target_date,
                    remaining_planned_min: agg.remaining_planned_min,
                    remaining_logged_min: agg.remaining_logged_min,
                    buffer_pct: profile.buffer_pct,
                    recent_daily_min: agg.recent_session_min
                        / request.include_recent_session_days.max(1) as f64,
                    baseline_daily_min: profile.baseline_daily_min,
                    progress_pct: agg.progress_pct(),
                    time_elapsed_pct: agg.time_elapsed_pct(now),
                    due_based_expected_pct: agg.due_based_expected_pct(),
                };
                ProjectStatusView {
                    project_id: agg.project_id,
                    project_name: agg.project_name.clone(),
                    risk: risk::assess(&input),
                }
            })
            .collect();

        projects.sort_by(|a, b| {
            a.risk
                .risk_level
                .priority()
                .cmp(&b.risk.risk_level.priority())
                .then_with(|| match (
                    aggregates[&a.project_id].target_date,
                    aggregates[&b.project_id].target_date,
                ) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.project_name.cmp(&b.project_name))
        });

        let mut summary = GlobalSummary::default();
        for project in &projects {
            match project.risk.risk_level {
                RiskLevel::Critical => summary.critical_count += 1,
                RiskLevel::AtRisk => summary.at_risk_count += 1,
                RiskLevel::OnTrack => summary.on_track_count += 1,
            }
        }

        let global_mode = if summary.critical_count > 0 {
            Mode::Critical
        } else {
            Mode::Balanced
        };

        let policy_message = if summary.critical_count > 0 {
            format!(
                "{} project(s) critical — focus there before anything else",
                summary.critical_count
            )
        } else if summary.at_risk_count > 0 {
            format!(
                "{} project(s) at risk, the rest on track",
                summary.at_risk_count
            )
        } else if projects.is_empty() {
            "no schedulable work right now".to_string()
        } else {
            "all projects on track".to_string()
        };

        Ok(StatusResponse {
            generated_at: now,
            global_mode,
            summary,
            projects,
            policy_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DurationMode, PlanNode, Project, WorkItem};
    use crate::repository::{InMemoryRepositories, PlanNodeRepository, ProjectRepository, WorkItemRepository};

    #[tokio::test]
    async fn empty_store_reports_balanced_with_no_projects() {
        let repos = Arc::new(InMemoryRepositories::new());
        let service = StatusService::new(repos.clone());
        let response = service.status(&StatusRequest::default()).await.unwrap();
        assert_eq!(response.global_mode, Mode::Balanced);
        assert!(response.projects.is_empty());
    }

    #[tokio::test]
    async fn sorts_critical_projects_first() {
        let repos = Arc::new(InMemoryRepositories::new());
        let now = Utc::now();

        let p1 = Project::new("AAA11".into(), "Calm".into(), "study".into(), now, Some(now + chrono::Duration::days(60)), now).unwrap();
        let p1_id = p1.id;
        repos.insert_project(p1).await.unwrap();
        let seq1 = repos.next_node_seq(p1_id).await.unwrap();
        let n1 = PlanNode::new(p1_id, None, "W1".into(), "week".into(), 1, None, seq1, now);
        let n1_id = n1.id;
        repos.insert_node(n1).await.unwrap();
        let item1 = WorkItem::new(n1_id, "Light".into(), "reading".into(), 30, None, DurationMode::Fixed, Some(15), Some(60), Some(30), true, None, None, 1, now);
        repos.insert_work_item(item1).await.unwrap();

        let p2 = Project::new("BBB22".into(), "Cram".into(), "study".into(), now, Some(now + chrono::Duration::days(1)), now).unwrap();
        let p2_id = p2.id;
        repos.insert_project(p2).await.unwrap();
        let seq2 = repos.next_node_seq(p2_id).await.unwrap();
        let n2 = PlanNode::new(p2_id, None, "W1".into(), "week".into(), 1, None, seq2, now);
        let n2_id = n2.id;
        repos.insert_node(n2).await.unwrap();
        let item2 = WorkItem::new(n2_id, "Heavy".into(), "reading".into(), 600, None, DurationMode::Fixed, Some(15), Some(60), Some(30), true, None, None, 1, now);
        repos.insert_work_item(item2).await.unwrap();

        let service = StatusService::new(repos.clone());
        let request = StatusRequest {
            now: Some(now),
            ..Default::default()
        };
        let response = service.status(&request).await.unwrap();
        assert_eq!(response.global_mode, Mode::Critical);
        assert_eq!(response.projects[0].project_name, "Cram");
    }
}
