use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::CorrelationId;

use crate::error::Result;
use crate::instance::{SagaId, SagaInstance};
use crate::repository::{SagaRepository, SagaStatistics};

/// In-memory saga repository for testing.
///
/// Stores full instances in a map and provides the same interface as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemorySagaRepository {
    sagas: Arc<RwLock<HashMap<SagaId, SagaInstance>>>,
}

impl InMemorySagaRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of sagas stored.
    pub async fn saga_count(&self) -> usize {
        self.sagas.read().await.len()
    }

    /// Clears all sagas.
    pub async fn clear(&self) {
        self.sagas.write().await.clear();
    }

    async fn collect_where(
        &self,
        predicate: impl Fn(&SagaInstance) -> bool,
    ) -> Vec<SagaInstance> {
        let sagas = self.sagas.read().await;
        let mut matched: Vec<_> = sagas.values().filter(|s| predicate(s)).cloned().collect();
        matched.sort_by_key(|s| s.started_at);
        matched
    }
}

#[async_trait]
impl SagaRepository for InMemorySagaRepository {
    async fn save(&self, saga: &SagaInstance) -> Result<()> {
        self.sagas
            .write()
            .await
            .insert(saga.saga_id, saga.clone());
        Ok(())
    }

    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        Ok(self.sagas.read().await.get(&saga_id).cloned())
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<SagaInstance>> {
        Ok(self
            .collect_where(|s| &s.correlation_id == correlation_id)
            .await)
    }

    async fn list_running(&self) -> Result<Vec<SagaInstance>> {
        Ok(self.collect_where(|s| s.status.is_active()).await)
    }

    async fn list_failed(&self) -> Result<Vec<SagaInstance>> {
        Ok(self.collect_where(|s| s.status.needs_attention()).await)
    }

    async fn statistics(&self) -> Result<SagaStatistics> {
        let sagas = self.sagas.read().await;
        let mut stats = SagaStatistics::default();

        for saga in sagas.values() {
            stats.total += 1;
            *stats
                .by_status
                .entry(saga.status.as_str().to_string())
                .or_insert(0) += 1;
            *stats
                .by_kind
                .entry(saga.kind.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(stats)
    }

    async fn delete(&self, saga_id: SagaId) -> Result<bool> {
        Ok(self.sagas.write().await.remove(&saga_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::SagaKind;

    fn saga_for(correlation: &str) -> SagaInstance {
        SagaInstance::new(
            SagaKind::OrderFulfillment,
            CorrelationId::from(correlation),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn save_and_get_round_trip() {
        let repo = InMemorySagaRepository::new();
        let saga = saga_for("corr-1");

        repo.save(&saga).await.unwrap();

        let loaded = repo.get(saga.saga_id).await.unwrap().unwrap();
        assert_eq!(loaded, saga);
    }

    #[tokio::test]
    async fn save_replaces_existing_instance() {
        let repo = InMemorySagaRepository::new();
        let mut saga = saga_for("corr-1");

        repo.save(&saga).await.unwrap();
        saga.mark_failed("boom");
        repo.save(&saga).await.unwrap();

        assert_eq!(repo.saga_count().await, 1);
        let loaded = repo.get(saga.saga_id).await.unwrap().unwrap();
        assert_eq!(loaded.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn get_missing_saga_returns_none() {
        let repo = InMemorySagaRepository::new();
        assert!(repo.get(SagaId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_correlation_matches_exactly() {
        let repo = InMemorySagaRepository::new();
        repo.save(&saga_for("corr-a")).await.unwrap();
        repo.save(&saga_for("corr-a")).await.unwrap();
        repo.save(&saga_for("corr-b")).await.unwrap();

        let found = repo
            .find_by_correlation(&CorrelationId::from("corr-a"))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|s| s.correlation_id.as_str() == "corr-a"));
    }

    #[tokio::test]
    async fn listings_partition_by_status() {
        let repo = InMemorySagaRepository::new();

        let running = saga_for("corr-1");
        repo.save(&running).await.unwrap();

        let mut completed = saga_for("corr-2");
        completed.mark_completed();
        repo.save(&completed).await.unwrap();

        let mut failed = saga_for("corr-3");
        failed.mark_failed("card declined");
        repo.save(&failed).await.unwrap();

        let mut compensating = saga_for("corr-4");
        compensating.mark_compensating();
        repo.save(&compensating).await.unwrap();

        let active = repo.list_running().await.unwrap();
        assert_eq!(active.len(), 2);

        let attention = repo.list_failed().await.unwrap();
        assert_eq!(attention.len(), 2);
        assert!(attention.iter().all(|s| s.status.needs_attention()));
    }

    #[tokio::test]
    async fn statistics_count_by_status_and_kind() {
        let repo = InMemorySagaRepository::new();

        repo.save(&saga_for("corr-1")).await.unwrap();

        let mut failed = saga_for("corr-2");
        failed.mark_failed("boom");
        repo.save(&failed).await.unwrap();

        let cancellation = SagaInstance::new(
            SagaKind::OrderCancellation,
            CorrelationId::from("corr-3"),
            serde_json::json!({}),
        );
        repo.save(&cancellation).await.unwrap();

        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count_for_status("RUNNING"), 2);
        assert_eq!(stats.count_for_status("FAILED"), 1);
        assert_eq!(stats.count_for_kind("order_fulfillment"), 2);
        assert_eq!(stats.count_for_kind("order_cancellation"), 1);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let repo = InMemorySagaRepository::new();
        let saga = saga_for("corr-1");
        repo.save(&saga).await.unwrap();

        assert!(repo.delete(saga.saga_id).await.unwrap());
        assert!(!repo.delete(saga.saga_id).await.unwrap());
        assert!(repo.get(saga.saga_id).await.unwrap().is_none());
    }
}
