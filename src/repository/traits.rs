use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Dependency, PlanNode, Project, SessionLog, UserProfile, WorkItem};
use crate::error::KairosResult;

/// A work item enriched with its owning project and node, as returned by
/// `list_schedulable`. Candidates are **not** filtered for dependency,
/// `not_before`, or work-complete — those are evaluated in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulableCandidate {
    pub work_item: WorkItem,
    pub project_id: Uuid,
    pub project_name: String,
    pub project_start_date: DateTime<Utc>,
    pub project_target_date: Option<DateTime<Utc>>,
    pub project_default_min_session: u32,
    pub project_default_max_session: u32,
    pub project_default_default_session: u32,
    pub node_id: Uuid,
    pub node_title: String,
    pub node_due_date: Option<DateTime<Utc>>,
}

/// Per-project total planned-minutes across done+skipped items — work that
/// has left the schedulable set but must still count toward progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CompletedSummary {
    pub total_planned_min: u32,
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert_project(&self, project: Project) -> KairosResult<()>;
    async fn get_project(&self, id: Uuid) -> KairosResult<Option<Project>>;
    async fn update_project(&self, project: Project) -> KairosResult<()>;
    async fn list_projects(&self, include_archived: bool) -> KairosResult<Vec<Project>>;
    async fn delete_project(&self, id: Uuid, force: bool) -> KairosResult<()>;
}

#[async_trait]
pub trait PlanNodeRepository: Send + Sync {
    async fn insert_node(&self, node: PlanNode) -> KairosResult<()>;
    async fn get_node(&self, id: Uuid) -> KairosResult<Option<PlanNode>>;
    async fn list_nodes_by_project(&self, project_id: Uuid) -> KairosResult<Vec<PlanNode>>;
    async fn next_node_seq(&self, project_id: Uuid) -> KairosResult<u64>;
}

#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    async fn insert_work_item(&self, item: WorkItem) -> KairosResult<()>;
    async fn get_work_item(&self, id: Uuid) -> KairosResult<Option<WorkItem>>;
    async fn update_work_item(&self, item: WorkItem) -> KairosResult<()>;

    /// Work items whose status in {todo, in_progress}, whose project is
    /// active (unless `include_archived`), optionally restricted to
    /// `project_scope`.
    async fn list_schedulable(
        &self,
        include_archived: bool,
        project_scope: &[Uuid],
    ) -> KairosResult<Vec<SchedulableCandidate>>;

    /// Per-project total planned-minutes across done+skipped items.
    async fn list_completed_summary_by_project(
        &self,
    ) -> KairosResult<HashMap<Uuid, CompletedSummary>>;

    async fn list_work_items_by_project(&self, project_id: Uuid) -> KairosResult<Vec<WorkItem>>;

    /// Allocates the next monotonic per-project work-item sequence number.
    async fn next_work_item_seq(&self, project_id: Uuid) -> KairosResult<u64>;
}

#[async_trait]
pub trait DependencyRepository: Send + Sync {
    async fn insert_dependency(&self, dep: Dependency) -> KairosResult<()>;

    /// Batched dependency resolver: returns IDs among `candidate_ids` that
    /// have at least one predecessor whose status is neither done nor
    /// skipped. Must be called once per recommendation, not once per
    /// candidate.
    async fn list_blocked_work_item_ids(
        &self,
        candidate_ids: &[Uuid],
    ) -> KairosResult<HashSet<Uuid>>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: SessionLog) -> KairosResult<()>;
    async fn delete_session(&self, id: Uuid) -> KairosResult<()>;

    /// Sessions started within the last `days`.
    async fn list_recent(&self, days: i64, now: DateTime<Utc>) -> KairosResult<Vec<SessionLog>>;

    /// Same, constrained to one project (joins through work_item -> node).
    async fn list_recent_by_project(
        &self,
        project_id: Uuid,
        days: i64,
        now: DateTime<Utc>,
    ) -> KairosResult<Vec<SessionLog>>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self) -> KairosResult<UserProfile>;
    async fn upsert_profile(&self, profile: UserProfile) -> KairosResult<()>;
}

/// Composed repository surface the pipeline depends on. Any type
/// implementing every concern trait gets this for free.
pub trait Repositories:
    ProjectRepository
    + PlanNodeRepository
    + WorkItemRepository
    + DependencyRepository
    + SessionRepository
    + ProfileRepository
    + Send
    + Sync
{
}

impl<T> Repositories for T where
    T: ProjectRepository
        + PlanNodeRepository
        + WorkItemRepository
        + DependencyRepository
        + SessionRepository
        + ProfileRepository
        + Send
        + Sync
{
}
