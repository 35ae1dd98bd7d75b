//! Notification service trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::CustomerId;

use crate::error::SagaError;

/// Trait for customer notifications.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Tells the customer their order is confirmed.
    async fn order_confirmation(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
    ) -> Result<(), SagaError>;

    /// Tells the customer their order was cancelled.
    async fn cancellation_notice(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
    ) -> Result<(), SagaError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeKind {
    Confirmation,
    Cancellation,
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<(NoticeKind, AggregateId)>,
    fail_on_send: bool,
}

/// In-memory notification service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    /// Creates a new in-memory notification service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail every send.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns the total number of notices sent.
    pub fn sent_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }

    /// Returns the number of confirmation notices sent.
    pub fn confirmation_count(&self) -> usize {
        self.count_kind(NoticeKind::Confirmation)
    }

    /// Returns the number of cancellation notices sent.
    pub fn cancellation_count(&self) -> usize {
        self.count_kind(NoticeKind::Cancellation)
    }

    fn count_kind(&self, kind: NoticeKind) -> usize {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn record(&self, kind: NoticeKind, order_id: AggregateId) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_send {
            return Err(SagaError::Notification("Delivery failed".to_string()));
        }
        state.sent.push((kind, order_id));
        Ok(())
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn order_confirmation(
        &self,
        order_id: AggregateId,
        _customer_id: CustomerId,
    ) -> Result<(), SagaError> {
        self.record(NoticeKind::Confirmation, order_id)
    }

    async fn cancellation_notice(
        &self,
        order_id: AggregateId,
        _customer_id: CustomerId,
    ) -> Result<(), SagaError> {
        self.record(NoticeKind::Cancellation, order_id)
    }
}
