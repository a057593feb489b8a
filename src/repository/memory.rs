use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Dependency, PlanNode, Project, ProjectStatus, SessionLog, UserProfile, WorkItem,
    WorkItemStatus,
};
use crate::error::{KairosError, KairosResult};

use super::traits::{
    CompletedSummary, DependencyRepository, PlanNodeRepository, ProfileRepository,
    ProjectRepository, SchedulableCandidate, SessionRepository, WorkItemRepository,
};

/// In-memory implementation of every repository trait, mirroring the
/// teacher's `MockGraphStore`: one `tokio::sync::RwLock<HashMap<..>>` per
/// entity kind. This is the crate's only concrete store — the real
/// relational store is an external collaborator per spec §1.
pub struct InMemoryRepositories {
    pub(crate) projects: RwLock<HashMap<Uuid, Project>>,
    pub(crate) nodes: RwLock<HashMap<Uuid, PlanNode>>,
    pub(crate) work_items: RwLock<HashMap<Uuid, WorkItem>>,
    pub(crate) dependencies: RwLock<HashMap<Uuid, Dependency>>,
    pub(crate) sessions: RwLock<HashMap<Uuid, SessionLog>>,
    pub(crate) profile: RwLock<UserProfile>,
    node_seq: RwLock<HashMap<Uuid, u64>>,
    work_item_seq: RwLock<HashMap<Uuid, u64>>,
}

/// Full copy of the store's mutable state, taken before a unit-of-work
/// closure runs and restored verbatim if the closure errors.
pub(crate) struct Snapshot {
    projects: HashMap<Uuid, Project>,
    nodes: HashMap<Uuid, PlanNode>,
    work_items: HashMap<Uuid, WorkItem>,
    dependencies: HashMap<Uuid, Dependency>,
    sessions: HashMap<Uuid, SessionLog>,
    profile: UserProfile,
    node_seq: HashMap<Uuid, u64>,
    work_item_seq: HashMap<Uuid, u64>,
}

impl Default for InMemoryRepositories {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
            work_items: RwLock::new(HashMap::new()),
            dependencies: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            profile: RwLock::new(UserProfile::default()),
            node_seq: RwLock::new(HashMap::new()),
            work_item_seq: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn snapshot(&self) -> Snapshot {
        Snapshot {
            projects: self.projects.read().await.clone(),
            nodes: self.nodes.read().await.clone(),
            work_items: self.work_items.read().await.clone(),
            dependencies: self.dependencies.read().await.clone(),
            sessions: self.sessions.read().await.clone(),
            profile: self.profile.read().await.clone(),
            node_seq: self.node_seq.read().await.clone(),
            work_item_seq: self.work_item_seq.read().await.clone(),
        }
    }

    pub(crate) async fn restore(&self, snapshot: Snapshot) {
        *self.projects.write().await = snapshot.projects;
        *self.nodes.write().await = snapshot.nodes;
        *self.work_items.write().await = snapshot.work_items;
        *self.dependencies.write().await = snapshot.dependencies;
        *self.sessions.write().await = snapshot.sessions;
        *self.profile.write().await = snapshot.profile;
        *self.node_seq.write().await = snapshot.node_seq;
        *self.work_item_seq.write().await = snapshot.work_item_seq;
    }

    async fn project_id_of_node(&self, node_id: Uuid) -> Option<Uuid> {
        self.nodes.read().await.get(&node_id).map(|n| n.project_id)
    }
}

#[async_trait]
impl ProjectRepository for InMemoryRepositories {
    async fn insert_project(&self, project: Project) -> KairosResult<()> {
        self.projects.write().await.insert(project.id, project);
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> KairosResult<Option<Project>> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn update_project(&self, project: Project) -> KairosResult<()> {
        let mut guard = self.projects.write().await;
        if !guard.contains_key(&project.id) {
            return Err(KairosError::NotFound(format!("project {}", project.id)));
        }
        guard.insert(project.id, project);
        Ok(())
    }

    async fn list_projects(&self, include_archived: bool) -> KairosResult<Vec<Project>> {
        let guard = self.projects.read().await;
        Ok(guard
            .values()
            .filter(|p| include_archived || p.status == ProjectStatus::Active)
            .cloned()
            .collect())
    }

    async fn delete_project(&self, id: Uuid, force: bool) -> KairosResult<()> {
        let mut guard = self.projects.write().await;
        let Some(project) = guard.get(&id) else {
            return Err(KairosError::NotFound(format!("project {id}")));
        };
        if !project.can_hard_delete(force) {
            return Err(KairosError::Validation(
                "project must be archived before hard deletion unless force is set".into(),
            ));
        }
        guard.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl PlanNodeRepository for InMemoryRepositories {
    async fn insert_node(&self, node: PlanNode) -> KairosResult<()> {
        self.nodes.write().await.insert(node.id, node);
        Ok(())
    }

    async fn get_node(&self, id: Uuid) -> KairosResult<Option<PlanNode>> {
        Ok(self.nodes.read().await.get(&id).cloned())
    }

    async fn list_nodes_by_project(&self, project_id: Uuid) -> KairosResult<Vec<PlanNode>> {
        let guard = self.nodes.read().await;
        Ok(guard
            .values()
            .filter(|n| n.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn next_node_seq(&self, project_id: Uuid) -> KairosResult<u64> {
        let mut guard = self.node_seq.write().await;
        let counter = guard.entry(project_id).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl WorkItemRepository for InMemoryRepositories {
    async fn insert_work_item(&self, item: WorkItem) -> KairosResult<()> {
        self.work_items.write().await.insert(item.id, item);
        Ok(())
    }

    async fn get_work_item(&self, id: Uuid) -> KairosResult<Option<WorkItem>> {
        Ok(self.work_items.read().await.get(&id).cloned())
    }

    async fn update_work_item(&self, item: WorkItem) -> KairosResult<()> {
        let mut guard = self.work_items.write().await;
        if !guard.contains_key(&item.id) {
            return Err(KairosError::NotFound(format!("work item {}", item.id)));
        }
        guard.insert(item.id, item);
        Ok(())
    }

    async fn list_schedulable(
        &self,
        include_archived: bool,
        project_scope: &[Uuid],
    ) -> KairosResult<Vec<SchedulableCandidate>> {
        let projects = self.projects.read().await;
        let nodes = self.nodes.read().await;
        let items = self.work_items.read().await;

        let mut out = Vec::new();
        for item in items.values() {
            if !item.is_schedulable_status() {
                continue;
            }
            let Some(node) = nodes.get(&item.node_id) else {
                continue;
            };
            let Some(project) = projects.get(&node.project_id) else {
                continue;
            };
            if !include_archived && project.status != ProjectStatus::Active {
                continue;
            }
            if !project_scope.is_empty() && !project_scope.contains(&project.id) {
                continue;
            }
            out.push(SchedulableCandidate {
                work_item: item.clone(),
                project_id: project.id,
                project_name: project.name.clone(),
                project_start_date: project.start_date,
                project_target_date: project.target_date,
                project_default_min_session: project.default_min_session,
                project_default_max_session: project.default_max_session,
                project_default_default_session: project.default_default_session,
                node_id: node.id,
                node_title: node.title.clone(),
                node_due_date: node.due_date,
            });
        }
        Ok(out)
    }

    async fn list_completed_summary_by_project(
        &self,
    ) -> KairosResult<HashMap<Uuid, CompletedSummary>> {
        let nodes = self.nodes.read().await;
        let items = self.work_items.read().await;
        let mut out: HashMap<Uuid, CompletedSummary> = HashMap::new();
        for item in items.values() {
            if !matches!(item.status, WorkItemStatus::Done | WorkItemStatus::Skipped) {
                continue;
            }
            let Some(node) = nodes.get(&item.node_id) else {
                continue;
            };
            out.entry(node.project_id).or_default().total_planned_min += item.planned_min;
        }
        Ok(out)
    }

    async fn list_work_items_by_project(&self, project_id: Uuid) -> KairosResult<Vec<WorkItem>> {
        let nodes = self.nodes.read().await;
        let items = self.work_items.read().await;
        Ok(items
            .values()
            .filter(|item| {
                nodes
                    .get(&item.node_id)
                    .map(|n| n.project_id == project_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn next_work_item_seq(&self, project_id: Uuid) -> KairosResult<u64> {
        let mut guard = self.work_item_seq.write().await;
        let counter = guard.entry(project_id).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl DependencyRepository for InMemoryRepositories {
    async fn insert_dependency(&self, dep: Dependency) -> KairosResult<()> {
        self.dependencies.write().await.insert(dep.id, dep);
        Ok(())
    }

    async fn list_blocked_work_item_ids(
        &self,
        candidate_ids: &[Uuid],
    ) -> KairosResult<HashSet<Uuid>> {
        let deps = self.dependencies.read().await;
        let items = self.work_items.read().await;
        let candidates: HashSet<Uuid> = candidate_ids.iter().copied().collect();

        let mut blocked = HashSet::new();
        for dep in deps.values() {
            if !candidates.contains(&dep.successor_id) {
                continue;
            }
            let predecessor_done = items
                .get(&dep.predecessor_id)
                .map(|p| matches!(p.status, WorkItemStatus::Done | WorkItemStatus::Skipped))
                .unwrap_or(false);
            if !predecessor_done {
                blocked.insert(dep.successor_id);
            }
        }
        Ok(blocked)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepositories {
    async fn insert_session(&self, session: SessionLog) -> KairosResult<()> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> KairosResult<()> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn list_recent(&self, days: i64, now: DateTime<Utc>) -> KairosResult<Vec<SessionLog>> {
        let cutoff = now - Duration::days(days);
        let guard = self.sessions.read().await;
        Ok(guard
            .values()
            .filter(|s| s.started_at >= cutoff)
            .cloned()
            .collect())
    }

    async fn list_recent_by_project(
        &self,
        project_id: Uuid,
        days: i64,
        now: DateTime<Utc>,
    ) -> KairosResult<Vec<SessionLog>> {
        let cutoff = now - Duration::days(days);
        let guard = self.sessions.read().await;
        let mut out = Vec::new();
        for s in guard.values() {
            if s.started_at < cutoff {
                continue;
            }
            if self.project_id_of_node_of_work_item(s.work_item_id).await == Some(project_id) {
                out.push(s.clone());
            }
        }
        Ok(out)
    }
}

impl InMemoryRepositories {
    async fn project_id_of_node_of_work_item(&self, work_item_id: Uuid) -> Option<Uuid> {
        let node_id = self.work_items.read().await.get(&work_item_id)?.node_id;
        self.project_id_of_node(node_id).await
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepositories {
    async fn get_profile(&self) -> KairosResult<UserProfile> {
        Ok(self.profile.read().await.clone())
    }

    async fn upsert_profile(&self, profile: UserProfile) -> KairosResult<()> {
        *self.profile.write().await = profile;
        Ok(())
    }
}
