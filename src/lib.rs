//! Kairos: a deterministic planning engine that schedules a single person's
//! knowledge work across many concurrent, deadline-bearing projects.
//!
//! - [`domain`] — entity types and pure state transitions (C1).
//! - [`repository`] — repository contracts, the in-memory store, and the
//!   unit-of-work transactional boundary (C2/C3).
//! - [`risk`] — per-project risk classification (C4).
//! - [`scoring`] — per-candidate weighted scoring and canonical sort (C5).
//! - [`allocation`] — time-budget allocation with the variation policy (C6).
//! - [`pipeline`] — the `what-now` recommendation pipeline (C7).
//! - [`status`] — project/global risk status, no allocation (C8).
//! - [`replan`] — iterative re-estimation to a fixed point (C9).
//! - [`session`] — transactional session logging (C10).
//! - [`import`] — atomic project-tree import (C11).
//! - [`explain`] — deterministic explanation of a result (C12).
//! - [`config`] — environment-driven CLI configuration.
//! - [`error`] — the closed `KairosError` taxonomy and blocker codes.

pub mod allocation;
pub mod config;
pub mod domain;
pub mod error;
pub mod explain;
pub mod import;
pub mod pipeline;
pub mod replan;
pub mod repository;
pub mod risk;
pub mod scoring;
pub mod session;
pub mod status;

use std::sync::Arc;

use repository::{InMemoryRepositories, InMemoryUnitOfWork, Repositories};

/// Bundles the in-memory store with the unit-of-work view over it, and
/// constructs each service on demand. Analogous to the teacher's `AppState`,
/// minus any network client — everything here is in-process.
pub struct KairosApp {
    repos: Arc<InMemoryRepositories>,
}

impl Default for KairosApp {
    fn default() -> Self {
        Self::new()
    }
}

impl KairosApp {
    pub fn new() -> Self {
        Self {
            repos: Arc::new(InMemoryRepositories::new()),
        }
    }

    pub fn repos(&self) -> Arc<dyn Repositories> {
        self.repos.clone()
    }

    fn uow(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork::new(self.repos.clone())
    }

    pub fn what_now_service(&self) -> pipeline::WhatNowService {
        pipeline::WhatNowService::new(self.repos())
    }

    pub fn status_service(&self) -> status::StatusService {
        status::StatusService::new(self.repos())
    }

    pub fn replan_service(&self) -> replan::ReplanService {
        replan::ReplanService::new(self.repos(), self.uow())
    }

    pub fn session_service(&self) -> session::SessionService {
        session::SessionService::new(self.repos(), self.uow())
    }

    pub fn import_service(&self) -> import::ImportService {
        import::ImportService::new(self.repos(), self.uow())
    }
}
