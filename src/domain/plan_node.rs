use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hierarchical container under a project. Forms a forest: multiple roots
/// per project are allowed, `parent_id` links within the same project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: Uuid,
    pub project_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    /// Open-ended tag: week, module, section, assessment, book, stage, generic, ...
    pub kind: String,
    pub order: i32,
    pub due_date: Option<DateTime<Utc>>,
    /// Monotonically-assigned per-project sequence number.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: Uuid,
        parent_id: Option<Uuid>,
        title: String,
        kind: String,
        order: i32,
        due_date: Option<DateTime<Utc>>,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            parent_id,
            title,
            kind,
            order,
            due_date,
            seq,
            created_at: now,
            updated_at: now,
        }
    }
}
