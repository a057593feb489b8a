//! End-to-end scenarios from `spec.md` §8, exercised against the in-memory
//! store through the public service API — the same integration-test shape
//! the teacher's pack favors (`#[tokio::test]` against a mock store), placed
//! in `tests/` rather than colocated since these span multiple services.

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use kairos::domain::{DurationMode, PlanNode, Project, UnitsTracking, WorkItem};
use kairos::error::BlockerCode;
use kairos::pipeline::{Mode, WhatNowRequest, WhatNowService};
use kairos::repository::{
    DependencyRepository, InMemoryRepositories, InMemoryUnitOfWork, PlanNodeRepository,
    ProjectRepository, WorkItemRepository,
};
use kairos::session::{LogSessionRequest, SessionService};

async fn seed_project(
    repos: &InMemoryRepositories,
    now: chrono::DateTime<Utc>,
    code: &str,
    name: &str,
    target_days: Option<i64>,
) -> (Uuid, Uuid) {
    let project = Project::new(
        code.into(),
        name.into(),
        "study".into(),
        now,
        target_days.map(|d| now + Duration::days(d)),
        now,
    )
    .unwrap();
    let project_id = project.id;
    repos.insert_project(project).await.unwrap();
    let seq = repos.next_node_seq(project_id).await.unwrap();
    let node = PlanNode::new(project_id, None, "W1".into(), "week".into(), 1, None, seq, now);
    let node_id = node.id;
    repos.insert_node(node).await.unwrap();
    (project_id, node_id)
}

fn todo_item(
    node_id: Uuid,
    title: &str,
    planned_min: u32,
    seq: u64,
    now: chrono::DateTime<Utc>,
) -> WorkItem {
    WorkItem::new(
        node_id,
        title.into(),
        "reading".into(),
        planned_min,
        None,
        DurationMode::Fixed,
        Some(15),
        Some(60),
        Some(30),
        true,
        None,
        None,
        seq,
        now,
    )
}

#[tokio::test]
async fn scenario_1_critical_mode_excludes_other_projects() {
    let repos = Arc::new(InMemoryRepositories::new());
    let now = Utc::now();

    let (critical_project, critical_node) =
        seed_project(&repos, now, "CRAM01", "Cram", Some(1)).await;
    let critical_item = todo_item(critical_node, "Cram reading", 300, 1, now);
    repos.insert_work_item(critical_item).await.unwrap();

    let (_, calm_node) = seed_project(&repos, now, "CALM01", "Calm", Some(365)).await;
    let calm_item = todo_item(calm_node, "Light reading", 30, 1, now);
    repos.insert_work_item(calm_item).await.unwrap();

    let service = WhatNowService::new(repos.clone());
    let response = service
        .recommend(
            &WhatNowRequest {
                available_min: 60,
                now: Some(now),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.mode, Mode::Critical);
    assert!(!response.recommendations.is_empty());
    for slice in &response.recommendations {
        assert_eq!(slice.project_id, critical_project);
    }
}

#[tokio::test]
async fn scenario_2_dependency_chain_unblocks_as_predecessors_complete() {
    let repos = Arc::new(InMemoryRepositories::new());
    let now = Utc::now();
    let (_, node_id) = seed_project(&repos, now, "CHAIN01", "Chain", Some(90)).await;

    let a = todo_item(node_id, "A", 30, 1, now);
    let b = todo_item(node_id, "B", 30, 2, now);
    let c = todo_item(node_id, "C", 30, 3, now);
    let a_id = a.id;
    let b_id = b.id;
    let c_id = c.id;
    repos.insert_work_item(a).await.unwrap();
    repos.insert_work_item(b).await.unwrap();
    repos.insert_work_item(c).await.unwrap();
    repos
        .insert_dependency(kairos::domain::Dependency::new(a_id, b_id))
        .await
        .unwrap();
    repos
        .insert_dependency(kairos::domain::Dependency::new(b_id, c_id))
        .await
        .unwrap();

    let service = WhatNowService::new(repos.clone());
    let request = WhatNowRequest {
        available_min: 120,
        now: Some(now),
        ..Default::default()
    };
    let response = service.recommend(&request, None).await.unwrap();
    let rec_ids: Vec<Uuid> = response.recommendations.iter().map(|s| s.work_item_id).collect();
    assert!(rec_ids.contains(&a_id));
    assert!(response
        .blockers
        .iter()
        .any(|b| b.entity_id == b_id && b.code == BlockerCode::Dependency));
    assert!(response
        .blockers
        .iter()
        .any(|b| b.entity_id == c_id && b.code == BlockerCode::Dependency));

    // Mark A done; B should now be recommendable, C still blocked.
    let mut stored_a = repos.get_work_item(a_id).await.unwrap().unwrap();
    stored_a.status = kairos::domain::WorkItemStatus::Done;
    repos.update_work_item(stored_a).await.unwrap();

    let response = service.recommend(&request, None).await.unwrap();
    let rec_ids: Vec<Uuid> = response.recommendations.iter().map(|s| s.work_item_id).collect();
    assert!(rec_ids.contains(&b_id));
    assert!(response
        .blockers
        .iter()
        .any(|b| b.entity_id == c_id && b.code == BlockerCode::Dependency));

    // Mark B done; C should now be recommendable.
    let mut stored_b = repos.get_work_item(b_id).await.unwrap().unwrap();
    stored_b.status = kairos::domain::WorkItemStatus::Done;
    repos.update_work_item(stored_b).await.unwrap();

    let response = service.recommend(&request, None).await.unwrap();
    let rec_ids: Vec<Uuid> = response.recommendations.iter().map(|s| s.work_item_id).collect();
    assert!(rec_ids.contains(&c_id));
}

#[tokio::test]
async fn scenario_3_reestimation_smoothing_matches_spec_formula() {
    let repos = Arc::new(InMemoryRepositories::new());
    let now = Utc::now();
    let (_, node_id) = seed_project(&repos, now, "SMOOTH01", "Smoothing", Some(90)).await;

    let item = WorkItem::new(
        node_id,
        "Read".into(),
        "reading".into(),
        100,
        Some(UnitsTracking {
            kind: "pages".into(),
            total: 10,
            done: 0,
        }),
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

    let stored = repos.get_work_item(item_id).await.unwrap().unwrap();
    assert_eq!(stored.logged_min, 30);
    assert_eq!(stored.units.as_ref().unwrap().done, 2);
    assert_eq!(stored.status, kairos::domain::WorkItemStatus::InProgress);
    // implied_total = (30/2)*10 = 150; round(0.7*100 + 0.3*150) = 115.
    assert_eq!(stored.planned_min, 115);
    assert_eq!(response.new_planned_min, Some(115));
}

#[tokio::test]
async fn scenario_5_session_minimum_blocker() {
    let repos = Arc::new(InMemoryRepositories::new());
    let now = Utc::now();
    let (_, node_id) = seed_project(&repos, now, "MINSES01", "MinSession", None).await;

    let item = WorkItem::new(
        node_id,
        "Deep work block".into(),
        "practice".into(),
        120,
        None,
        DurationMode::Fixed,
        Some(45),
        Some(90),
        Some(60),
        true,
        None,
        None,
        1,
        now,
    );
    repos.insert_work_item(item).await.unwrap();

    let service = WhatNowService::new(repos.clone());
    let response = service
        .recommend(
            &WhatNowRequest {
                available_min: 20,
                now: Some(now),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(response.recommendations.is_empty());
    assert_eq!(response.unallocated_min, 20);
    assert!(response
        .blockers
        .iter()
        .any(|b| b.code == BlockerCode::SessionMinExceedsAvail));
}

#[tokio::test]
async fn scenario_6_variation_spreads_slices_across_projects() {
    let repos = Arc::new(InMemoryRepositories::new());
    let now = Utc::now();

    let mut project_ids = Vec::new();
    for (i, code) in ["AAA01", "BBB02", "CCC03"].iter().enumerate() {
        let (project_id, node_id) =
            seed_project(&repos, now, code, &format!("Project {i}"), Some(60)).await;
        project_ids.push(project_id);
        let item = todo_item(node_id, "Steady work", 90, 1, now);
        repos.insert_work_item(item).await.unwrap();
    }

    let service = WhatNowService::new(repos.clone());
    let response = service
        .recommend(
            &WhatNowRequest {
                available_min: 180,
                now: Some(now),
                enforce_variation: true,
                max_slices: 3,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    let distinct_projects: std::collections::HashSet<Uuid> =
        response.recommendations.iter().map(|s| s.project_id).collect();
    assert!(distinct_projects.len() >= 2);
}

#[tokio::test]
async fn archived_projects_are_excluded_unless_requested() {
    let repos = Arc::new(InMemoryRepositories::new());
    let now = Utc::now();
    let (project_id, node_id) = seed_project(&repos, now, "ARCH01", "Archived", Some(30)).await;
    let item = todo_item(node_id, "Old task", 30, 1, now);
    let item_id = item.id;
    repos.insert_work_item(item).await.unwrap();

    let mut project = repos.get_project(project_id).await.unwrap().unwrap();
    project.archive(now);
    repos.update_project(project).await.unwrap();

    let service = WhatNowService::new(repos.clone());
    let err = service
        .recommend(
            &WhatNowRequest {
                available_min: 30,
                now: Some(now),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, kairos::error::KairosError::NoCandidates));

    // Direct lookup still returns the item unchanged.
    let stored = repos.get_work_item(item_id).await.unwrap().unwrap();
    assert_eq!(stored.planned_min, 30);

    let response = service
        .recommend(
            &WhatNowRequest {
                available_min: 30,
                now: Some(now),
                include_archived: true,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(response.recommendations.len(), 1);
}
