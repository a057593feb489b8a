//! Deterministic explanation (C12): from a recommendation or replan result,
//! builds a flat trace of evidence keys and a structured list of factors
//! whose `evidence_ref_key` is always a member of that trace.
//!
//! Confidence is fixed at 1.0 — this is a deterministic readout of already-
//! computed state, not an inference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::WhatNowResponse;
use crate::replan::ReplanResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationFactor {
    pub label: String,
    pub detail: String,
    /// Must be a key present in the parent `Explanation::trace`.
    pub evidence_ref_key: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub factors: Vec<ExplanationFactor>,
    /// Flat scalar trace keyed the way §4.12 specifies: `mode`,
    /// `requested_min`, `allocated_min`, `rec.<id>.score`,
    /// `rec.<id>.risk_level`, `rec.<id>.allocated_min`, `risk.<id>.risk_level`,
    /// `blocker.<n>.code`. Values are stringified for uniform serialization.
    pub trace: HashMap<String, String>,
}

fn factor(
    trace: &HashMap<String, String>,
    label: &str,
    detail: String,
    evidence_ref_key: String,
) -> ExplanationFactor {
    debug_assert!(
        trace.contains_key(&evidence_ref_key),
        "evidence_ref_key '{evidence_ref_key}' must be present in the trace"
    );
    ExplanationFactor {
        label: label.to_string(),
        detail,
        evidence_ref_key,
        confidence: 1.0,
    }
}

/// Builds the deterministic explanation for a `what-now` response.
pub fn explain_what_now(response: &WhatNowResponse) -> Explanation {
    let mut trace = HashMap::new();
    trace.insert("mode".to_string(), format!("{:?}", response.mode));
    trace.insert(
        "requested_min".to_string(),
        response.requested_min.to_string(),
    );
    trace.insert(
        "allocated_min".to_string(),
        response.allocated_min.to_string(),
    );
    trace.insert(
        "unallocated_min".to_string(),
        response.unallocated_min.to_string(),
    );

    for rec in &response.recommendations {
        let id = rec.work_item_id;
        trace.insert(
            format!("rec.{id}.score"),
            format!("{:.6}", rec.score_for_display),
        );
        trace.insert(
            format!("rec.{id}.allocated_min"),
            rec.allocated_min.to_string(),
        );
    }

    for project in &response.top_risk_projects {
        trace.insert(
            format!("risk.{}.risk_level", project.project_id),
            format!("{:?}", project.risk.risk_level),
        );
    }

    for (i, blocker) in response.blockers.iter().enumerate() {
        trace.insert(format!("blocker.{i}.code"), format!("{:?}", blocker.code));
        trace.insert(
            format!("blocker.{i}.entity_id"),
            blocker.entity_id.to_string(),
        );
    }

    // Attach each recommendation's project risk level so the per-rec factor
    // can reference an already-present key instead of duplicating one.
    let project_risk_by_id: HashMap<_, _> = response
        .top_risk_projects
        .iter()
        .map(|p| (p.project_id, p.risk.risk_level))
        .collect();

    let mut factors = Vec::new();
    factors.push(factor(
        &trace,
        "mode",
        format!(
            "global plan regime is {:?}: requested {} min, allocated {} min",
            response.mode, response.requested_min, response.allocated_min
        ),
        "mode".to_string(),
    ));

    for rec in &response.recommendations {
        let id = rec.work_item_id;
        let risk_level = project_risk_by_id
            .get(&rec.project_id)
            .copied()
            .map(|r| format!("{r:?}"))
            .unwrap_or_else(|| "unknown".to_string());
        factors.push(factor(
            &trace,
            "recommendation",
            format!(
                "{id} allocated {} min (score {:.3}), owning project risk {risk_level}",
                rec.allocated_min, rec.score_for_display
            ),
            format!("rec.{id}.allocated_min"),
        ));
    }

    for (i, blocker) in response.blockers.iter().enumerate() {
        factors.push(factor(
            &trace,
            "blocker",
            blocker.message.clone(),
            format!("blocker.{i}.code"),
        ));
    }

    let summary = format!(
        "{:?} mode: {} of {} min allocated across {} recommendation(s), {} blocker(s)",
        response.mode,
        response.allocated_min,
        response.requested_min,
        response.recommendations.len(),
        response.blockers.len()
    );

    Explanation {
        summary,
        factors,
        trace,
    }
}

/// Builds the deterministic explanation for a replan response.
pub fn explain_replan(response: &ReplanResponse) -> Explanation {
    let mut trace = HashMap::new();
    trace.insert("mode".to_string(), format!("{:?}", response.global_mode));
    trace.insert(
        "recomputed_project_count".to_string(),
        response.recomputed_project_count.to_string(),
    );

    for delta in &response.deltas {
        let id = delta.project_id;
        trace.insert(
            format!("risk.{id}.risk_level"),
            format!("{:?}", delta.risk_after.risk_level),
        );
        trace.insert(
            format!("risk.{id}.changed_items_count"),
            delta.changed_items_count.to_string(),
        );
        trace.insert(
            format!("risk.{id}.remaining_min_after"),
            delta.remaining_min_after.to_string(),
        );
    }

    let mut factors = Vec::new();
    factors.push(factor(
        &trace,
        "mode",
        format!(
            "global mode after replan is {:?} across {} project(s)",
            response.global_mode, response.recomputed_project_count
        ),
        "mode".to_string(),
    ));

    for delta in &response.deltas {
        let id = delta.project_id;
        factors.push(factor(
            &trace,
            "project_delta",
            format!(
                "{} ({id}): {:?} -> {:?}, {} item(s) re-estimated, remaining {} -> {} min",
                delta.project_name,
                delta.risk_before.risk_level,
                delta.risk_after.risk_level,
                delta.changed_items_count,
                delta.remaining_min_before,
                delta.remaining_min_after
            ),
            format!("risk.{id}.risk_level"),
        ));
    }

    let summary = format!(
        "replan recomputed {} project(s), global mode {:?}",
        response.recomputed_project_count, response.global_mode
    );

    Explanation {
        summary,
        factors,
        trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Mode, WhatNowRequest, WhatNowService};
    use crate::replan::{ReplanRequest, ReplanService, ReplanTrigger};
    use crate::repository::{
        InMemoryRepositories, InMemoryUnitOfWork, PlanNodeRepository, ProjectRepository,
        WorkItemRepository,
    };
    use crate::domain::{DurationMode, PlanNode, Project, WorkItem};
    use chrono::Utc;
    use std::sync::Arc;

    async fn seed(repos: &InMemoryRepositories, now: chrono::DateTime<Utc>) {
        let project =
            Project::new("ABC12".into(), "Test".into(), "study".into(), now, None, now).unwrap();
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
            60,
            None,
            DurationMode::Fixed,
            Some(15),
            Some(60),
            Some(30),
            true,
            None,
            None,
            1,
            now,
        );
        repos.insert_work_item(item).await.unwrap();
    }

    #[tokio::test]
    async fn every_factor_evidence_key_is_in_trace() {
        let repos = Arc::new(InMemoryRepositories::new());
        let now = Utc::now();
        seed(&repos, now).await;

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
        assert_eq!(response.mode, Mode::Balanced);

        let explanation = explain_what_now(&response);
        for f in &explanation.factors {
            assert!(
                explanation.trace.contains_key(&f.evidence_ref_key),
                "missing trace key {}",
                f.evidence_ref_key
            );
            assert_eq!(f.confidence, 1.0);
        }
    }

    #[tokio::test]
    async fn replan_explanation_keys_are_consistent() {
        let repos = Arc::new(InMemoryRepositories::new());
        let now = Utc::now();
        seed(&repos, now).await;

        let uow = InMemoryUnitOfWork::new(repos.clone());
        let service = ReplanService::new(repos.clone(), uow);
        let response = service
            .replan(&ReplanRequest {
                trigger: ReplanTrigger::Manual,
                now: Some(now),
            })
            .await
            .unwrap();

        let explanation = explain_replan(&response);
        for f in &explanation.factors {
            assert!(explanation.trace.contains_key(&f.evidence_ref_key));
        }
    }
}
