use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed edge between two work items: predecessor -> successor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Uuid,
    pub predecessor_id: Uuid,
    pub successor_id: Uuid,
}

impl Dependency {
    pub fn new(predecessor_id: Uuid, successor_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            predecessor_id,
            successor_id,
        }
    }
}
