//! Domain model (C1): entity types, invariants, enumerations, and the pure
//! state transitions exposed on them (`apply_session`, `apply_reestimate`,
//! `eligible_for_reestimate`, project archive/unarchive).
//!
//! Every entity here is a plain data struct plus inherent methods — no I/O,
//! no references to repositories. Persistence is the repository layer's job.

mod dependency;
mod plan_node;
mod profile;
mod project;
mod session;
mod work_item;

pub use dependency::Dependency;
pub use plan_node::PlanNode;
pub use profile::UserProfile;
pub use project::{validate_project_code, Project, ProjectStatus};
pub use session::SessionLog;
pub use work_item::{
    DurationMode, DurationSource, SessionWindow, UnitsTracking, WorkItem, WorkItemStatus,
};
