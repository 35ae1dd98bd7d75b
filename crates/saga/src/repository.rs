//! Saga persistence abstraction.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use common::CorrelationId;

use crate::error::Result;
use crate::instance::{SagaId, SagaInstance};

/// Storage for saga instances.
///
/// The orchestrator persists the whole instance after every transition, so
/// [`save`](SagaRepository::save) must behave as insert-or-update. Any
/// implementation is the single source of truth for saga progress; losing a
/// write loses a transition.
#[async_trait]
pub trait SagaRepository: Send + Sync {
    /// Inserts or fully replaces a saga instance.
    async fn save(&self, saga: &SagaInstance) -> Result<()>;

    /// Loads a saga by ID.
    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>>;

    /// Finds all sagas started for a correlation ID, oldest first.
    async fn find_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<SagaInstance>>;

    /// Lists sagas that are still making progress.
    async fn list_running(&self) -> Result<Vec<SagaInstance>>;

    /// Lists sagas that need operator attention.
    async fn list_failed(&self) -> Result<Vec<SagaInstance>>;

    /// Counts sagas by status and by kind.
    async fn statistics(&self) -> Result<SagaStatistics>;

    /// Deletes a saga. Returns true if it existed.
    async fn delete(&self, saga_id: SagaId) -> Result<bool>;
}

/// Saga counts grouped by status and kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SagaStatistics {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
    pub by_kind: HashMap<String, u64>,
}

impl SagaStatistics {
    /// Returns the count for one status name, zero when absent.
    pub fn count_for_status(&self, status: &str) -> u64 {
        self.by_status.get(status).copied().unwrap_or(0)
    }

    /// Returns the count for one kind name, zero when absent.
    pub fn count_for_kind(&self, kind: &str) -> u64 {
        self.by_kind.get(kind).copied().unwrap_or(0)
    }
}
