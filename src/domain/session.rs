use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable append-only work session log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    pub id: Uuid,
    pub work_item_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_min: u32,
    pub units_done_delta: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl SessionLog {
    pub fn new(
        work_item_id: Uuid,
        started_at: DateTime<Utc>,
        duration_min: u32,
        units_done_delta: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            work_item_id,
            started_at,
            duration_min,
            units_done_delta,
            created_at: now,
        }
    }
}
