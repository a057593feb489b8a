//! Import service (C11): atomically materializes a validated project
//! description (project + nodes + work items + dependencies) under one
//! transaction.
//!
//! Input refs are symbolic (`String` keys chosen by the caller) and resolved
//! to generated `Uuid`s during conversion. Validation runs entirely before
//! any write, per §7's "validation must run entirely before any write".

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    validate_project_code, Dependency, DurationMode, PlanNode, Project, UnitsTracking, WorkItem,
    WorkItemStatus,
};
use crate::error::{KairosError, KairosResult};
use crate::repository::{InMemoryUnitOfWork, Repositories};

/// Default session policy applied to nodes/work items that don't override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPolicyDefaults {
    pub min_session: Option<u32>,
    pub max_session: Option<u32>,
    pub default_session: Option<u32>,
    pub splittable: bool,
}

impl Default for SessionPolicyDefaults {
    fn default() -> Self {
        Self {
            min_session: None,
            max_session: None,
            default_session: None,
            splittable: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDefaults {
    #[serde(default = "default_duration_mode")]
    pub duration_mode: DurationMode,
    #[serde(default)]
    pub session_policy: SessionPolicyDefaults,
}

fn default_duration_mode() -> DurationMode {
    DurationMode::Estimate
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            duration_mode: DurationMode::Estimate,
            session_policy: SessionPolicyDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProjectBlock {
    pub code: String,
    pub name: String,
    pub domain_tag: String,
    pub start_date: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportNode {
    pub node_ref: String,
    pub parent_ref: Option<String>,
    pub title: String,
    pub kind: String,
    pub order: i32,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportUnits {
    pub kind: String,
    pub total: u32,
    #[serde(default)]
    pub done: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportWorkItem {
    pub item_ref: String,
    pub node_ref: String,
    pub title: String,
    pub type_tag: String,
    #[serde(default)]
    pub planned_min: u32,
    pub units: Option<ImportUnits>,
    pub duration_mode: Option<DurationMode>,
    pub min_session: Option<u32>,
    pub max_session: Option<u32>,
    pub default_session: Option<u32>,
    pub splittable: Option<bool>,
    pub not_before: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDependency {
    pub predecessor_ref: String,
    pub successor_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDescription {
    pub project: ImportProjectBlock,
    #[serde(default)]
    pub defaults: ImportDefaults,
    pub nodes: Vec<ImportNode>,
    pub work_items: Vec<ImportWorkItem>,
    #[serde(default)]
    pub dependencies: Vec<ImportDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub project_id: Uuid,
    pub node_count: u32,
    pub work_item_count: u32,
    pub dependency_count: u32,
}

/// Validates refs (unknown node refs, duplicate refs, bad short-ID pattern,
/// missing required fields) before anything is written. Returns the node-ref
/// -> generated-id map up front so the write phase doesn't need to re-derive it.
fn validate(description: &ImportDescription) -> KairosResult<()> {
    validate_project_code(&description.project.code)?;

    if description.nodes.is_empty() {
        return Err(KairosError::Validation(
            "import description must contain at least one node".into(),
        ));
    }

    let mut node_refs = std::collections::HashSet::new();
    for node in &description.nodes {
        if node.node_ref.is_empty() {
            return Err(KairosError::Validation("node_ref must not be empty".into()));
        }
        if !node_refs.insert(node.node_ref.as_str()) {
            return Err(KairosError::Validation(format!(
                "duplicate node_ref '{}'",
                node.node_ref
            )));
        }
    }
    for node in &description.nodes {
        if let Some(parent_ref) = &node.parent_ref {
            if !node_refs.contains(parent_ref.as_str()) {
                return Err(KairosError::Validation(format!(
                    "node '{}' references unknown parent_ref '{}'",
                    node.node_ref, parent_ref
                )));
            }
        }
    }

    let mut item_refs = std::collections::HashSet::new();
    for item in &description.work_items {
        if item.item_ref.is_empty() {
            return Err(KairosError::Validation("item_ref must not be empty".into()));
        }
        if !item_refs.insert(item.item_ref.as_str()) {
            return Err(KairosError::Validation(format!(
                "duplicate item_ref '{}'",
                item.item_ref
            )));
        }
        if !node_refs.contains(item.node_ref.as_str()) {
            return Err(KairosError::Validation(format!(
                "work item '{}' references unknown node_ref '{}'",
                item.item_ref, item.node_ref
            )));
        }
        if item.title.trim().is_empty() {
            return Err(KairosError::Validation(format!(
                "work item '{}' must have a non-empty title",
                item.item_ref
            )));
        }
    }

    for dep in &description.dependencies {
        if !item_refs.contains(dep.predecessor_ref.as_str()) {
            return Err(KairosError::Validation(format!(
                "dependency references unknown predecessor_ref '{}'",
                dep.predecessor_ref
            )));
        }
        if !item_refs.contains(dep.successor_ref.as_str()) {
            return Err(KairosError::Validation(format!(
                "dependency references unknown successor_ref '{}'",
                dep.successor_ref
            )));
        }
    }

    Ok(())
}

pub struct ImportService {
    #[allow(dead_code)]
    repos: Arc<dyn Repositories>,
    uow: InMemoryUnitOfWork,
}

impl ImportService {
    pub fn new(repos: Arc<dyn Repositories>, uow: InMemoryUnitOfWork) -> Self {
        Self { repos, uow }
    }

    pub async fn import(
        &self,
        description: ImportDescription,
        now: DateTime<Utc>,
    ) -> KairosResult<ImportResponse> {
        validate(&description)?;

        self.uow
            .within_tx(|repos| async move {
                let project = Project::new(
                    description.project.code.clone(),
                    description.project.name.clone(),
                    description.project.domain_tag.clone(),
                    description.project.start_date,
                    description.project.target_date,
                    now,
                )?;
                let project_id = project.id;
                repos.insert_project(project).await?;

                // Nodes in input order; a node referencing a parent not yet
                // converted is resolved via a ref -> id map built as we go
                // (parents are validated to exist somewhere in the file, but
                // not necessarily earlier in the list).
                let mut node_ids: HashMap<String, Uuid> = HashMap::new();
                for node in &description.nodes {
                    let seq = repos.next_node_seq(project_id).await?;
                    let plan_node = PlanNode::new(
                        project_id,
                        None, // parent resolved below once all ids are known
                        node.title.clone(),
                        node.kind.clone(),
                        node.order,
                        node.due_date,
                        seq,
                        now,
                    );
                    node_ids.insert(node.node_ref.clone(), plan_node.id);
                    repos.insert_node(plan_node).await?;
                }
                for node in &description.nodes {
                    if let Some(parent_ref) = &node.parent_ref {
                        let id = node_ids[&node.node_ref];
                        let mut stored = repos
                            .get_node(id)
                            .await?
                            .ok_or_else(|| KairosError::NotFound(format!("node {id}")))?;
                        stored.parent_id = node_ids.get(parent_ref).copied();
                        // Re-insert rather than a dedicated update: nodes have
                        // no `NodeRepository::update`, mirroring the spec's
                        // decision that plan nodes are write-once after
                        // import (only work items mutate post-import).
                        repos.insert_node(stored).await?;
                    }
                }

                let mut item_ids: HashMap<String, Uuid> = HashMap::new();
                for item in &description.work_items {
                    let node_id = node_ids[&item.node_ref];
                    let duration_mode = item.duration_mode.unwrap_or(description.defaults.duration_mode);
                    let splittable = item
                        .splittable
                        .unwrap_or(description.defaults.session_policy.splittable);
                    let min_session = item
                        .min_session
                        .or(description.defaults.session_policy.min_session);
                    let max_session = item
                        .max_session
                        .or(description.defaults.session_policy.max_session);
                    let default_session = item
                        .default_session
                        .or(description.defaults.session_policy.default_session);
                    let units = item.units.as_ref().map(|u| UnitsTracking {
                        kind: u.kind.clone(),
                        total: u.total,
                        done: u.done,
                    });

                    let seq = repos.next_work_item_seq(project_id).await?;
                    let mut work_item = WorkItem::new(
                        node_id,
                        item.title.clone(),
                        item.type_tag.clone(),
                        item.planned_min,
                        units,
                        duration_mode,
                        min_session,
                        max_session,
                        default_session,
                        splittable,
                        item.not_before,
                        item.due_date,
                        seq,
                        now,
                    );
                    work_item.status = WorkItemStatus::Todo;
                    item_ids.insert(item.item_ref.clone(), work_item.id);
                    repos.insert_work_item(work_item).await?;
                }

                for dep in &description.dependencies {
                    let predecessor_id = item_ids[&dep.predecessor_ref];
                    let successor_id = item_ids[&dep.successor_ref];
                    repos
                        .insert_dependency(Dependency::new(predecessor_id, successor_id))
                        .await?;
                }

                Ok(ImportResponse {
                    project_id,
                    node_count: description.nodes.len() as u32,
                    work_item_count: description.work_items.len() as u32,
                    dependency_count: description.dependencies.len() as u32,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryRepositories, ProjectRepository, WorkItemRepository};

    fn sample() -> ImportDescription {
        ImportDescription {
            project: ImportProjectBlock {
                code: "ABC12".into(),
                name: "Algorithms".into(),
                domain_tag: "study".into(),
                start_date: Utc::now(),
                target_date: None,
            },
            defaults: ImportDefaults::default(),
            nodes: vec![
                ImportNode {
                    node_ref: "w1".into(),
                    parent_ref: None,
                    title: "Week 1".into(),
                    kind: "week".into(),
                    order: 1,
                    due_date: None,
                },
                ImportNode {
                    node_ref: "w1-s1".into(),
                    parent_ref: Some("w1".into()),
                    title: "Section 1".into(),
                    kind: "section".into(),
                    order: 1,
                    due_date: None,
                },
            ],
            work_items: vec![ImportWorkItem {
                item_ref: "t1".into(),
                node_ref: "w1-s1".into(),
                title: "Read chapter 1".into(),
                type_tag: "reading".into(),
                planned_min: 60,
                units: None,
                duration_mode: None,
                min_session: None,
                max_session: None,
                default_session: None,
                splittable: None,
                not_before: None,
                due_date: None,
            }],
            dependencies: vec![],
        }
    }

    #[tokio::test]
    async fn imports_project_tree_in_one_transaction() {
        let repos = Arc::new(InMemoryRepositories::new());
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let service = ImportService::new(repos.clone(), uow);

        let response = service.import(sample(), Utc::now()).await.unwrap();
        assert_eq!(response.node_count, 2);
        assert_eq!(response.work_item_count, 1);

        let project = repos.get_project(response.project_id).await.unwrap();
        assert!(project.is_some());
    }

    #[tokio::test]
    async fn unknown_node_ref_fails_validation_before_any_write() {
        let repos = Arc::new(InMemoryRepositories::new());
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let service = ImportService::new(repos.clone(), uow);

        let mut description = sample();
        description.work_items[0].node_ref = "does-not-exist".into();

        let err = service.import(description, Utc::now()).await.unwrap_err();
        assert!(matches!(err, KairosError::Validation(_)));
        assert!(repos.list_projects(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_project_code_fails_before_any_write() {
        let repos = Arc::new(InMemoryRepositories::new());
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let service = ImportService::new(repos.clone(), uow);

        let mut description = sample();
        description.project.code = "bad".into();

        let err = service.import(description, Utc::now()).await.unwrap_err();
        assert!(matches!(err, KairosError::Validation(_)));
        assert!(repos.list_projects(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dependencies_resolve_symbolic_refs_to_ids() {
        let repos = Arc::new(InMemoryRepositories::new());
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let service = ImportService::new(repos.clone(), uow);

        let mut description = sample();
        description.work_items.push(ImportWorkItem {
            item_ref: "t2".into(),
            node_ref: "w1-s1".into(),
            title: "Read chapter 2".into(),
            type_tag: "reading".into(),
            planned_min: 60,
            units: None,
            duration_mode: None,
            min_session: None,
            max_session: None,
            default_session: None,
            splittable: None,
            not_before: None,
            due_date: None,
        });
        description.dependencies.push(ImportDependency {
            predecessor_ref: "t1".into(),
            successor_ref: "t2".into(),
        });

        let response = service.import(description, Utc::now()).await.unwrap();
        assert_eq!(response.dependency_count, 1);

        let items = repos.list_work_items_by_project(response.project_id).await.unwrap();
        assert_eq!(items.len(), 2);
    }
}
