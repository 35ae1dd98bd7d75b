//! Concrete step and compensation handlers for the known saga plans.
//!
//! Fulfillment: authorize payment, hold stock, book the shipment, confirm
//! the order, capture the payment, notify the customer. Cancellation:
//! release held stock, refund, flip the order to cancelled, notify.
//!
//! Handlers read their input from the saga context and from earlier steps'
//! recorded output; they are written to be retry-safe, since the
//! orchestrator re-runs a failed step in place.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use common::AggregateId;
use domain::inventory::ReservationId;
use domain::{
    CancelOrder, CustomerId, DomainError, InventoryError, InventoryService, Money, OrderService,
    OrderStatus, RecordPaymentAuthorized, RecordPaymentCaptured, RecordRefundCompleted,
    ReserveStock, UpdateOrderStatus,
};
use event_store::EventStore;

use crate::collaborators::{NotificationService, PaymentGateway, ShippingProvider};
use crate::error::{Result, SagaError};
use crate::handler::{CompensationHandler, HandlerRegistry, StepHandler};
use crate::instance::SagaInstance;
use crate::step::{SagaStep, StepKind};

/// Business payload of an order fulfillment saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentContext {
    /// The order being fulfilled.
    pub order_id: AggregateId,

    /// The customer who placed it.
    pub customer_id: CustomerId,

    /// The order total, in cents.
    pub amount_cents: i64,

    /// The stock to hold, one line per inventory item.
    pub lines: Vec<FulfillmentLine>,
}

/// One inventory line of a fulfillment saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentLine {
    /// The inventory item to reserve from.
    pub item_id: AggregateId,

    /// Units to hold.
    pub quantity: u32,
}

/// Business payload of an order cancellation saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationContext {
    /// The order being cancelled.
    pub order_id: AggregateId,

    /// The customer who placed it.
    pub customer_id: CustomerId,

    /// The refund owed per the cancellation policy, in cents.
    pub refund_cents: i64,

    /// The gateway payment to refund, when one was taken.
    pub payment_id: Option<String>,

    /// Stock holds to release.
    #[serde(default)]
    pub releases: Vec<ReservationRef>,
}

/// Pointer to one stock hold on one inventory item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRef {
    pub item_id: AggregateId,
    pub reservation_id: ReservationId,
}

/// Output of the reserve-inventory step, read back by later steps and by
/// its own compensation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReservationsOutput {
    reservations: Vec<ReservationRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PaymentOutput {
    payment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShipmentOutput {
    tracking_number: String,
}

/// Everything the step handlers need, bundled for registration.
pub struct SagaServices<S: EventStore> {
    pub orders: Arc<OrderService<S>>,
    pub inventory: Arc<InventoryService<S>>,
    pub payments: Arc<dyn PaymentGateway>,
    pub shipping: Arc<dyn ShippingProvider>,
    pub notifications: Arc<dyn NotificationService>,

    /// How long an unconfirmed stock hold lives.
    pub reservation_ttl: chrono::Duration,
}

impl<S: EventStore> Clone for SagaServices<S> {
    fn clone(&self) -> Self {
        Self {
            orders: Arc::clone(&self.orders),
            inventory: Arc::clone(&self.inventory),
            payments: Arc::clone(&self.payments),
            shipping: Arc::clone(&self.shipping),
            notifications: Arc::clone(&self.notifications),
            reservation_ttl: self.reservation_ttl,
        }
    }
}

/// Builds the handler registry covering both saga plans.
///
/// Compensations: authorize → void, reserve → release, shipment → cancel,
/// capture → refund. Confirm and the notification steps have nothing to
/// undo; the order-status step keeps a recorded no-op (rolling a cancelled
/// order back is unresolved business policy).
pub fn handler_registry<S: EventStore + 'static>(services: SagaServices<S>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register_step(
        StepKind::AuthorizePayment,
        Arc::new(AuthorizePaymentHandler(services.clone())),
    );
    registry.register_compensation(
        StepKind::AuthorizePayment,
        Arc::new(VoidPaymentHandler(services.clone())),
    );
    registry.register_step(
        StepKind::ReserveInventory,
        Arc::new(ReserveInventoryHandler(services.clone())),
    );
    registry.register_compensation(
        StepKind::ReserveInventory,
        Arc::new(ReleaseReservationsHandler(services.clone())),
    );
    registry.register_step(
        StepKind::CreateShipment,
        Arc::new(CreateShipmentHandler(services.clone())),
    );
    registry.register_compensation(
        StepKind::CreateShipment,
        Arc::new(CancelShipmentHandler(services.clone())),
    );
    registry.register_step(
        StepKind::ConfirmOrder,
        Arc::new(ConfirmOrderHandler(services.clone())),
    );
    registry.register_step(
        StepKind::CapturePayment,
        Arc::new(CapturePaymentHandler(services.clone())),
    );
    registry.register_compensation(
        StepKind::CapturePayment,
        Arc::new(RefundCaptureHandler(services.clone())),
    );
    registry.register_step(
        StepKind::SendConfirmation,
        Arc::new(SendConfirmationHandler(services.clone())),
    );

    registry.register_step(
        StepKind::ReleaseInventory,
        Arc::new(ReleaseInventoryHandler(services.clone())),
    );
    registry.register_step(
        StepKind::InitiateRefund,
        Arc::new(InitiateRefundHandler(services.clone())),
    );
    registry.register_step(
        StepKind::UpdateOrderStatus,
        Arc::new(UpdateOrderStatusHandler(services.clone())),
    );
    registry.register_compensation(
        StepKind::UpdateOrderStatus,
        Arc::new(OrderStatusRollbackStub),
    );
    registry.register_step(
        StepKind::SendCancellationNotice,
        Arc::new(SendCancellationNoticeHandler(services)),
    );

    registry
}

/// Decodes the saga context into the plan's typed payload.
fn context<T: DeserializeOwned>(saga: &SagaInstance) -> Result<T> {
    Ok(serde_json::from_value(saga.context.clone())?)
}

/// Decodes a completed step's recorded output.
fn completed_output<T: DeserializeOwned>(
    saga: &SagaInstance,
    source: StepKind,
    reader: StepKind,
) -> Result<T> {
    let value = saga.step_output(source).ok_or_else(|| SagaError::StepFailed {
        step: reader,
        reason: format!("missing output from step {source}"),
    })?;
    Ok(serde_json::from_value(value.clone())?)
}

/// Cancels one stock hold, treating an already-released hold as done.
async fn release_hold<S: EventStore>(
    inventory: &InventoryService<S>,
    release: &ReservationRef,
    reason: &str,
) -> Result<bool> {
    match inventory
        .cancel_reservation(release.item_id, release.reservation_id, reason)
        .await
    {
        Ok(_) => Ok(true),
        Err(DomainError::Inventory(
            InventoryError::ReservationNotFound { .. }
            | InventoryError::InvalidReservationState { .. },
        )) => {
            tracing::warn!(
                item_id = %release.item_id,
                reservation_id = %release.reservation_id,
                "hold already released, skipping"
            );
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

struct AuthorizePaymentHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for AuthorizePaymentHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: FulfillmentContext = context(saga)?;

        let auth = self
            .0
            .payments
            .authorize(ctx.order_id, ctx.customer_id, Money::from_cents(ctx.amount_cents))
            .await?;
        self.0
            .orders
            .record_payment_authorized(RecordPaymentAuthorized::new(
                ctx.order_id,
                auth.payment_id.clone(),
            ))
            .await?;

        Ok(serde_json::to_value(PaymentOutput {
            payment_id: auth.payment_id,
        })?)
    }
}

struct VoidPaymentHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> CompensationHandler for VoidPaymentHandler<S> {
    async fn compensate(&self, _saga: &SagaInstance, step: &SagaStep) -> Result<()> {
        let output: PaymentOutput = serde_json::from_value(
            step.output.clone().unwrap_or(serde_json::Value::Null),
        )?;
        self.0.payments.void(&output.payment_id).await
    }
}

struct ReserveInventoryHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for ReserveInventoryHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: FulfillmentContext = context(saga)?;

        let mut reservations: Vec<ReservationRef> = Vec::with_capacity(ctx.lines.len());
        for line in &ctx.lines {
            let cmd = ReserveStock::new(line.item_id, ctx.order_id, ctx.customer_id, line.quantity)
                .with_ttl(self.0.reservation_ttl);
            match self.0.inventory.reserve_stock(cmd).await {
                Ok(reservation_id) => reservations.push(ReservationRef {
                    item_id: line.item_id,
                    reservation_id,
                }),
                Err(err) => {
                    // The step never completed, so its compensation will not
                    // run; release the partial holds here to stay retry-safe.
                    for held in &reservations {
                        let _ = release_hold(&self.0.inventory, held, "partial reservation rollback")
                            .await;
                    }
                    return Err(err.into());
                }
            }
        }

        Ok(serde_json::to_value(ReservationsOutput { reservations })?)
    }
}

struct ReleaseReservationsHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> CompensationHandler for ReleaseReservationsHandler<S> {
    async fn compensate(&self, _saga: &SagaInstance, step: &SagaStep) -> Result<()> {
        let output: ReservationsOutput = serde_json::from_value(
            step.output.clone().unwrap_or(serde_json::Value::Null),
        )?;
        for held in &output.reservations {
            release_hold(&self.0.inventory, held, "saga rollback").await?;
        }
        Ok(())
    }
}

struct CreateShipmentHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for CreateShipmentHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: FulfillmentContext = context(saga)?;
        let shipment = self.0.shipping.create_shipment(ctx.order_id).await?;
        Ok(serde_json::to_value(ShipmentOutput {
            tracking_number: shipment.tracking_number,
        })?)
    }
}

struct CancelShipmentHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> CompensationHandler for CancelShipmentHandler<S> {
    async fn compensate(&self, _saga: &SagaInstance, step: &SagaStep) -> Result<()> {
        let output: ShipmentOutput = serde_json::from_value(
            step.output.clone().unwrap_or(serde_json::Value::Null),
        )?;
        self.0.shipping.cancel_shipment(&output.tracking_number).await
    }
}

struct ConfirmOrderHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for ConfirmOrderHandler<S> {
    async fn execute(&self, saga: &SagaInstance, step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: FulfillmentContext = context(saga)?;

        self.0
            .orders
            .update_status(UpdateOrderStatus::new(ctx.order_id, OrderStatus::Confirmed))
            .await?;

        // The holds taken earlier become firm once the order is confirmed.
        let output: ReservationsOutput =
            completed_output(saga, StepKind::ReserveInventory, step.kind)?;
        for held in &output.reservations {
            self.0
                .inventory
                .confirm_reservation(held.item_id, held.reservation_id)
                .await?;
        }

        Ok(serde_json::json!({
            "status": OrderStatus::Confirmed,
            "reservations_confirmed": output.reservations.len(),
        }))
    }
}

struct CapturePaymentHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for CapturePaymentHandler<S> {
    async fn execute(&self, saga: &SagaInstance, step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: FulfillmentContext = context(saga)?;
        let auth: PaymentOutput = completed_output(saga, StepKind::AuthorizePayment, step.kind)?;

        self.0.payments.capture(&auth.payment_id).await?;
        self.0
            .orders
            .record_payment_captured(RecordPaymentCaptured::new(
                ctx.order_id,
                auth.payment_id.clone(),
            ))
            .await?;

        Ok(serde_json::to_value(auth)?)
    }
}

struct RefundCaptureHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> CompensationHandler for RefundCaptureHandler<S> {
    async fn compensate(&self, saga: &SagaInstance, step: &SagaStep) -> Result<()> {
        let ctx: FulfillmentContext = context(saga)?;
        let output: PaymentOutput = serde_json::from_value(
            step.output.clone().unwrap_or(serde_json::Value::Null),
        )?;

        let amount = Money::from_cents(ctx.amount_cents);
        self.0.payments.refund(&output.payment_id, amount).await?;
        self.0
            .orders
            .record_refund_completed(RecordRefundCompleted::new(ctx.order_id, amount))
            .await?;
        Ok(())
    }
}

struct SendConfirmationHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for SendConfirmationHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: FulfillmentContext = context(saga)?;

        // Notification trouble never rolls back a fulfilled order.
        match self
            .0
            .notifications
            .order_confirmation(ctx.order_id, ctx.customer_id)
            .await
        {
            Ok(()) => Ok(serde_json::json!({"delivered": true})),
            Err(err) => {
                tracing::warn!(order_id = %ctx.order_id, %err, "confirmation notice not delivered");
                Ok(serde_json::json!({"delivered": false, "error": err.to_string()}))
            }
        }
    }
}

struct ReleaseInventoryHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for ReleaseInventoryHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: CancellationContext = context(saga)?;

        let mut released = 0usize;
        for hold in &ctx.releases {
            if release_hold(&self.0.inventory, hold, "order cancelled").await? {
                released += 1;
            }
        }

        Ok(serde_json::json!({"released": released}))
    }
}

struct InitiateRefundHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for InitiateRefundHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: CancellationContext = context(saga)?;

        let Some(payment_id) = &ctx.payment_id else {
            return Ok(serde_json::json!({"refunded": false}));
        };
        if ctx.refund_cents <= 0 {
            return Ok(serde_json::json!({"refunded": false}));
        }

        let amount = Money::from_cents(ctx.refund_cents);
        self.0.payments.refund(payment_id, amount).await?;
        self.0
            .orders
            .record_refund_completed(RecordRefundCompleted::new(ctx.order_id, amount))
            .await?;

        Ok(serde_json::json!({"refunded": true, "amount_cents": ctx.refund_cents}))
    }
}

struct UpdateOrderStatusHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for UpdateOrderStatusHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: CancellationContext = context(saga)?;
        self.0
            .orders
            .cancel_order(CancelOrder::new(ctx.order_id))
            .await?;
        Ok(serde_json::json!({"status": OrderStatus::Cancelled}))
    }
}

/// Recorded no-op: rolling a cancelled order back to its previous status
/// is unresolved business policy, so the compensation only logs.
struct OrderStatusRollbackStub;

#[async_trait]
impl CompensationHandler for OrderStatusRollbackStub {
    async fn compensate(&self, saga: &SagaInstance, step: &SagaStep) -> Result<()> {
        tracing::warn!(
            saga_id = %saga.saga_id,
            step = %step.kind,
            "order status rollback is a recorded no-op; the order stays cancelled"
        );
        Ok(())
    }
}

struct SendCancellationNoticeHandler<S: EventStore>(SagaServices<S>);

#[async_trait]
impl<S: EventStore + 'static> StepHandler for SendCancellationNoticeHandler<S> {
    async fn execute(&self, saga: &SagaInstance, _step: &SagaStep) -> Result<serde_json::Value> {
        let ctx: CancellationContext = context(saga)?;
        self.0
            .notifications
            .cancellation_notice(ctx.order_id, ctx.customer_id)
            .await?;
        Ok(serde_json::json!({"delivered": true}))
    }
}
