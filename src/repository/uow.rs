use std::future::Future;
use std::sync::Arc;

use super::memory::InMemoryRepositories;
use super::traits::Repositories;
use crate::error::KairosResult;

/// Transactional boundary (C3): runs a closure against a transaction-scoped
/// view of the repositories. Commits on success, rolls back on any error.
///
/// The in-memory store has no native transaction support, so "transaction
/// scoped" is realised as snapshot-then-restore: the closure runs directly
/// against the live store (so it observes its own writes, the way a real
/// DB transaction would), and on error every map is restored to its
/// pre-closure state.
pub struct InMemoryUnitOfWork {
    repos: Arc<InMemoryRepositories>,
}

impl InMemoryUnitOfWork {
    pub fn new(repos: Arc<InMemoryRepositories>) -> Self {
        Self { repos }
    }

    /// Exposes the same repository interfaces as the outer store so callers
    /// don't need to branch on whether they hold a transaction.
    pub fn repos(&self) -> Arc<dyn Repositories> {
        self.repos.clone()
    }

    pub async fn within_tx<F, Fut, T>(&self, f: F) -> KairosResult<T>
    where
        F: FnOnce(Arc<dyn Repositories>) -> Fut,
        Fut: Future<Output = KairosResult<T>>,
    {
        let snapshot = self.repos.snapshot().await;
        let repos: Arc<dyn Repositories> = self.repos.clone();
        match f(repos).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.repos.restore(snapshot).await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Project;
    use crate::error::KairosError;
    use crate::repository::ProjectRepository;
    use chrono::Utc;

    #[tokio::test]
    async fn rolls_back_on_error() {
        let repos = Arc::new(InMemoryRepositories::new());
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let now = Utc::now();
        let project = Project::new("ABC12".into(), "P".into(), "d".into(), now, None, now).unwrap();
        let id = project.id;

        let result: KairosResult<()> = uow
            .within_tx(|repos| {
                let project = project.clone();
                async move {
                    repos.insert_project(project).await?;
                    Err(KairosError::Conflict)
                }
            })
            .await;

        assert!(result.is_err());
        assert!(repos.get_project(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commits_on_success() {
        let repos = Arc::new(InMemoryRepositories::new());
        let uow = InMemoryUnitOfWork::new(repos.clone());
        let now = Utc::now();
        let project = Project::new("ABC12".into(), "P".into(), "d".into(), now, None, now).unwrap();
        let id = project.id;

        uow.within_tx(|repos| {
            let project = project.clone();
            async move { repos.insert_project(project).await }
        })
        .await
        .unwrap();

        assert!(repos.get_project(id).await.unwrap().is_some());
    }
}
