//! Repository contracts (C2) and Unit of Work (C3).
//!
//! The pipeline depends on these query surfaces, not their storage — see
//! `spec.md` §4.2/§4.3. `traits` defines the abstract interfaces (one trait
//! per entity concern, the way the teacher's `GraphStore` trait groups
//! methods by concern within one big trait; here we split per concern and
//! compose with a blanket `Repositories` supertrait so a single concrete
//! store can still be passed around as `Arc<dyn Repositories>`).
//! `memory` is this crate's only concrete implementation: an in-memory store
//! that serves both as the runnable default (the real relational store is an
//! external collaborator per spec §1) and as what the test suite exercises.

mod memory;
mod traits;
mod uow;

pub use memory::InMemoryRepositories;
pub use traits::{
    CompletedSummary, DependencyRepository, PlanNodeRepository, ProfileRepository,
    ProjectRepository, Repositories, SchedulableCandidate, SessionRepository, WorkItemRepository,
};
pub use uow::InMemoryUnitOfWork;
