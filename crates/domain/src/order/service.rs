//! Order service providing a simplified API for order operations.

use std::time::Duration;

use common::AggregateId;
use event_store::EventStore;

use crate::error::DomainError;
use crate::repository::{AggregateRepository, CommandResult};

use super::{
    ApproveCancellation, CancelOrder, CancellationDisposition, CreateOrder, MarkDelivered,
    MarkShipped, Order, OrderError, OrderEvent, RecordPaymentAuthorized, RecordPaymentCaptured,
    RecordPaymentFailed, RecordRefundCompleted, RejectCancellation, RequestCancellation,
    UpdateOrderStatus,
};

impl From<super::OrderError> for DomainError {
    fn from(e: super::OrderError) -> Self {
        DomainError::Order(e)
    }
}

/// How many times a command runs before a concurrency conflict is
/// surfaced to the caller.
const MAX_CONFLICT_ATTEMPTS: u32 = 3;

/// Base backoff between conflict retries, scaled by the attempt number.
const CONFLICT_BACKOFF: Duration = Duration::from_millis(100);

/// Service for managing orders.
///
/// Provides a high-level API for order operations, wrapping the aggregate
/// repository and retrying transparently when a command loses an
/// optimistic concurrency race.
pub struct OrderService<S: EventStore> {
    repository: AggregateRepository<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            repository: AggregateRepository::new(store),
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &AggregateRepository<S, Order> {
        &self.repository
    }

    /// Places a new order with its full cart.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<CommandResult<Order>, DomainError> {
        let order_id = cmd.order_id;
        self.execute_with_retry(order_id, move |order| order.create(&cmd))
            .await
    }

    /// Moves the order along its status table.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        cmd: UpdateOrderStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, move |order| order.update_status(cmd.new_status))
            .await
    }

    /// Asks for the order to be cancelled and reports the disposition.
    ///
    /// A request against a status that cannot be cancelled at all comes
    /// back as a rejection rather than an error; the caller gets a
    /// decision either way.
    #[tracing::instrument(skip(self))]
    pub async fn request_cancellation(
        &self,
        cmd: RequestCancellation,
    ) -> Result<CancellationDisposition, DomainError> {
        let order_id = cmd.order_id;
        let result = self
            .execute_with_retry(order_id, move |order| {
                order.request_cancellation(cmd.reason.clone(), cmd.requested_by.clone())
            })
            .await;

        match result {
            Ok(result) => {
                let approved = result.events.iter().find_map(|event| match event {
                    OrderEvent::CancellationApproved(data) => Some(data.refund_amount),
                    _ => None,
                });
                match approved {
                    Some(refund_amount) => {
                        Ok(CancellationDisposition::AutoApproved { refund_amount })
                    }
                    None => Ok(CancellationDisposition::PendingApproval),
                }
            }
            Err(DomainError::Order(err @ OrderError::NotCancellable { .. })) => {
                tracing::info!(%order_id, %err, "cancellation request turned down");
                Ok(CancellationDisposition::Rejected {
                    reason: err.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Approves the open cancellation request.
    #[tracing::instrument(skip(self))]
    pub async fn approve_cancellation(
        &self,
        cmd: ApproveCancellation,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, |order| order.approve_cancellation())
            .await
    }

    /// Turns down the open cancellation request.
    #[tracing::instrument(skip(self))]
    pub async fn reject_cancellation(
        &self,
        cmd: RejectCancellation,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, move |order| {
            order.reject_cancellation(cmd.reason.clone())
        })
        .await
    }

    /// Cancels an order with an approved cancellation.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, cmd: CancelOrder) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, |order| order.cancel())
            .await
    }

    /// Records a payment authorization.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment_authorized(
        &self,
        cmd: RecordPaymentAuthorized,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, move |order| {
            order.record_payment_authorized(cmd.payment_id.clone())
        })
        .await
    }

    /// Records a payment capture.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment_captured(
        &self,
        cmd: RecordPaymentCaptured,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, move |order| {
            order.record_payment_captured(cmd.payment_id.clone())
        })
        .await
    }

    /// Records a failed payment attempt.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment_failed(
        &self,
        cmd: RecordPaymentFailed,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, move |order| {
            order.record_payment_failed(cmd.reason.clone())
        })
        .await
    }

    /// Records a completed refund.
    #[tracing::instrument(skip(self))]
    pub async fn record_refund_completed(
        &self,
        cmd: RecordRefundCompleted,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, move |order| {
            order.record_refund_completed(cmd.amount)
        })
        .await
    }

    /// Records that the order left the warehouse.
    #[tracing::instrument(skip(self))]
    pub async fn mark_shipped(&self, cmd: MarkShipped) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, move |order| {
            order.mark_shipped(cmd.tracking_number.clone())
        })
        .await
    }

    /// Records that the order reached the customer.
    #[tracing::instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        cmd: MarkDelivered,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.execute_with_retry(cmd.order_id, |order| order.mark_delivered())
            .await
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        Ok(self
            .repository
            .load_existing(order_id)
            .await?
            .map(|root| root.state().clone()))
    }

    /// Runs a command, retrying when it loses an optimistic concurrency
    /// race against a concurrent writer.
    async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<Order>, DomainError>
    where
        F: Fn(&Order) -> Result<Vec<OrderEvent>, OrderError>,
    {
        let mut attempt: u32 = 1;
        loop {
            match self
                .repository
                .execute(aggregate_id, None, &command_fn)
                .await
            {
                Err(err) if err.is_concurrency_conflict() && attempt < MAX_CONFLICT_ATTEMPTS => {
                    metrics::counter!("concurrency_conflicts_total").increment(1);
                    tracing::warn!(
                        %aggregate_id,
                        attempt,
                        "order command hit a concurrency conflict, retrying"
                    );
                    tokio::time::sleep(CONFLICT_BACKOFF * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
