//! Session logging service (C10): the transactional apply-session +
//! conditional re-estimate + persist + insert-log sequence from spec §4.9.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::SessionLog;
use crate::error::{KairosError, KairosResult};
use crate::repository::{InMemoryUnitOfWork, Repositories};

#[derive(Debug, Clone)]
pub struct LogSessionRequest {
    pub work_item_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_min: u32,
    pub units_delta: Option<i64>,
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSessionResponse {
    pub session: SessionLog,
    pub reestimated: bool,
    pub new_planned_min: Option<u32>,
}

pub struct SessionService {
    #[allow(dead_code)]
    repos: Arc<dyn Repositories>,
    uow: InMemoryUnitOfWork,
}

impl SessionService {
    pub fn new(repos: Arc<dyn Repositories>, uow: InMemoryUnitOfWork) -> Self {
        Self { repos, uow }
    }

    pub async fn log_session(
        &self,
        request: &LogSessionRequest,
    ) -> KairosResult<LogSessionResponse> {
        let now = request.now.unwrap_or_else(Utc::now);
        let work_item_id = request.work_item_id;
        let started_at = request.started_at;
        let duration_min = request.duration_min;
        let units_delta = request.units_delta.unwrap_or(0);

        self.uow
            .within_tx(|repos| async move {
                let mut item = repos
                    .get_work_item(work_item_id)
                    .await?
                    .ok_or_else(|| KairosError::NotFound(format!("work item {work_item_id}")))?;

                item.apply_session(duration_min as i64, units_delta, now)?;

                let mut reestimated = false;
                let mut new_planned_min = None;
                if item.eligible_for_reestimate() {
                    if let Some(new_planned) = item.reestimate_smoothing() {
                        if item.apply_reestimate(new_planned, now) {
                            reestimated = true;
                            new_planned_min = Some(new_planned);
                        }
                    }
                }

                repos.update_work_item(item).await?;

                let session = SessionLog::new(work_item_id, started_at, duration_min, request.units_delta, now);
                repos.insert_session(session.clone()).await?;

                Ok(LogSessionResponse {
                    session,
                    reestimated,
                    new_planned_min,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DurationMode, PlanNode, Project, UnitsTracking, WorkItem};
    use crate::repository::{
        InMemoryRepositories, PlanNodeRepository, ProjectRepository, SessionRepository,
        WorkItemRepository,
    };

    async fn seed_item(repos: &InMemoryRepositories, now: DateTime<Utc>) -> Uuid {
        let project = Project::new("ABC12".into(), "P".into(), "study".into(), now, None, now).unwrap();
        let project_id = project.id;
        repos.insert_project(project).await.unwrap();
        let seq = repos.next_node_seq(project_id).await.unwrap();
        let node = PlanNode::new(project_id, None, "W1".into(), "week".into(), 1, None, seq, now);
        let node_id = node.id;
        repos.insert_node(node).await.unwrap();
        let item = WorkItem::new(
            node_id,
            "Read".into(),
            "reading".into(),
            100,
            Some(UnitsTracking { kind: "pages".into(), total: 10, done: 0 }),
            DurationMode::Estimate,
            Some(15),
            Some(60),
            Some(30),
            true,
            None,
            None,
            1,
            now,
        );
        let item_id = item.id;
        repos.insert_work_item(item).await.unwrap();
        item_id
    }

    #[tokio::test]
    async fn logs_session_and_reestimates() {
        let repos = Arc::new(InMemoryRepositories::new());
        let now = Utc::now();
        let item_id = seed_item(&repos, now).await;
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let service = SessionService::new(repos.clone(), uow);

        let response = service
            .log_session(&LogSessionRequest {
                work_item_id: item_id,
                started_at: now,
                duration_min: 30,
                units_delta: Some(2),
                now: Some(now),
            })
            .await
            .unwrap();

        assert!(response.reestimated);
        assert_eq!(response.new_planned_min, Some(115));

        let stored = repos.get_work_item(item_id).await.unwrap().unwrap();
        assert_eq!(stored.logged_min, 30);
        assert_eq!(stored.planned_min, 115);

        let sessions = repos.list_recent(7, now + chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn unknown_work_item_rolls_back() {
        let repos = Arc::new(InMemoryRepositories::new());
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let service = SessionService::new(repos.clone(), uow);
        let now = Utc::now();

        let err = service
            .log_session(&LogSessionRequest {
                work_item_id: Uuid::new_v4(),
                started_at: now,
                duration_min: 30,
                units_delta: None,
                now: Some(now),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, KairosError::NotFound(_)));

        let sessions = repos.list_recent(7, now).await.unwrap();
        assert!(sessions.is_empty());
    }
}
