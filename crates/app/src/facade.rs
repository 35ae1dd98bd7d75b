//! The order-facing application facade.
//!
//! These operations tie an aggregate command to the saga that carries out
//! its side effects: placing an order starts a fulfillment saga, an approved
//! cancellation starts a cancellation saga. The order ID doubles as the
//! correlation key, so a later cancellation can find what its fulfillment
//! saga recorded (payment ID, stock holds).

use serde::{Deserialize, Serialize};

use common::{AggregateId, CorrelationId};
use domain::{
    ApproveCancellation, CancellationDisposition, CreateOrder, CustomerId, Money, OrderItem,
    RequestCancellation,
};
use event_store::EventStore;
use saga::{
    CancellationContext, FulfillmentContext, FulfillmentLine, ReservationRef, SagaError, SagaId,
    SagaInstance, SagaKind, SagaRepository, StepKind,
};

use crate::context::AppContext;
use crate::error::AppError;

/// One line of a cart handed to [`AppContext::create_order_from_cart`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    /// The inventory item backing this product.
    pub item_id: AggregateId,

    /// Catalog product identifier.
    pub product_id: String,

    /// Display name, denormalized onto the order.
    pub product_name: String,

    /// Units ordered.
    pub quantity: u32,

    /// Price per unit.
    pub unit_price: Money,
}

/// What placing an order hands back: the aggregate and the saga driving it.
#[derive(Debug, Clone, Copy)]
pub struct OrderPlacement {
    pub order_id: AggregateId,
    pub saga_id: SagaId,
}

/// Outcome of a cancellation request.
///
/// The saga ID is present only when the request was auto-approved and a
/// cancellation saga was started.
#[derive(Debug, Clone)]
pub struct CancellationReceipt {
    pub disposition: CancellationDisposition,
    pub saga_id: Option<SagaId>,
}

impl<S: EventStore + Clone + 'static, R: SagaRepository + 'static> AppContext<S, R> {
    /// Places an order for the cart and starts its fulfillment saga.
    #[tracing::instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn create_order_from_cart(
        &self,
        customer_id: CustomerId,
        cart: Vec<CartLine>,
    ) -> Result<OrderPlacement, AppError> {
        if cart.is_empty() {
            return Err(AppError::EmptyCart);
        }
        if let Some(line) = cart.iter().find(|line| line.quantity == 0) {
            return Err(AppError::ZeroQuantity {
                product_id: line.product_id.clone(),
            });
        }

        let items: Vec<OrderItem> = cart
            .iter()
            .map(|line| {
                OrderItem::new(
                    line.product_id.clone(),
                    line.product_name.clone(),
                    line.quantity,
                    line.unit_price,
                )
            })
            .collect();

        let cmd = CreateOrder::for_customer(customer_id, items);
        let order_id = cmd.order_id;
        let result = self.orders.create_order(cmd).await?;

        let context = FulfillmentContext {
            order_id,
            customer_id,
            amount_cents: result.aggregate.total_amount().cents(),
            lines: cart
                .iter()
                .map(|line| FulfillmentLine {
                    item_id: line.item_id,
                    quantity: line.quantity,
                })
                .collect(),
        };
        let saga_id = self
            .orchestrator
            .start_saga(
                SagaKind::OrderFulfillment,
                order_correlation(order_id),
                serde_json::to_value(&context).map_err(SagaError::from)?,
            )
            .await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(%order_id, %saga_id, "order placed, fulfillment started");
        Ok(OrderPlacement { order_id, saga_id })
    }

    /// Asks for an order to be cancelled.
    ///
    /// Auto-approved requests start the cancellation saga right away;
    /// PROCESSING orders come back as pending until an operator calls
    /// [`AppContext::approve_order_cancellation`].
    #[tracing::instrument(skip(self, reason, requested_by))]
    pub async fn cancel_order(
        &self,
        order_id: AggregateId,
        reason: impl Into<String> + std::fmt::Debug,
        requested_by: impl Into<String> + std::fmt::Debug,
    ) -> Result<CancellationReceipt, AppError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(AppError::OrderNotFound(order_id))?;
        let customer_id = order.customer_id().unwrap_or_default();

        let disposition = self
            .orders
            .request_cancellation(RequestCancellation::new(order_id, reason, requested_by))
            .await?;

        let saga_id = match &disposition {
            CancellationDisposition::AutoApproved { refund_amount } => Some(
                self.start_cancellation(order_id, customer_id, *refund_amount)
                    .await?,
            ),
            CancellationDisposition::PendingApproval => {
                tracing::info!(%order_id, "cancellation recorded, awaiting approval");
                None
            }
            CancellationDisposition::Rejected { reason } => {
                tracing::info!(%order_id, %reason, "cancellation rejected");
                None
            }
        };

        Ok(CancellationReceipt {
            disposition,
            saga_id,
        })
    }

    /// Approves a pending cancellation and starts the cancellation saga.
    #[tracing::instrument(skip(self))]
    pub async fn approve_order_cancellation(
        &self,
        order_id: AggregateId,
    ) -> Result<SagaId, AppError> {
        let result = self
            .orders
            .approve_cancellation(ApproveCancellation::new(order_id))
            .await?;

        let customer_id = result.aggregate.customer_id().unwrap_or_default();
        let refund = result
            .aggregate
            .approved_cancellation()
            .map(|approved| approved.refund_amount)
            .unwrap_or_else(Money::zero);

        self.start_cancellation(order_id, customer_id, refund).await
    }

    /// Builds the cancellation context from the fulfillment saga's records
    /// and starts the cancellation saga.
    async fn start_cancellation(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        refund: Money,
    ) -> Result<SagaId, AppError> {
        let correlation = order_correlation(order_id);
        let fulfillment = self
            .orchestrator
            .find_by_correlation(&correlation)
            .await?
            .into_iter()
            .filter(|saga| saga.kind == SagaKind::OrderFulfillment)
            .next_back();

        let context = CancellationContext {
            order_id,
            customer_id,
            refund_cents: refund.cents(),
            payment_id: fulfillment.as_ref().and_then(recorded_payment_id),
            releases: fulfillment.as_ref().map(recorded_holds).unwrap_or_default(),
        };

        let saga_id = self
            .orchestrator
            .start_saga(
                SagaKind::OrderCancellation,
                correlation,
                serde_json::to_value(&context).map_err(SagaError::from)?,
            )
            .await?;
        tracing::info!(%order_id, %saga_id, "cancellation saga started");
        Ok(saga_id)
    }
}

/// The correlation key every saga for an order is filed under.
fn order_correlation(order_id: AggregateId) -> CorrelationId {
    CorrelationId::from_string(format!("order-{order_id}"))
}

/// The payment the fulfillment saga authorized, if it got that far.
fn recorded_payment_id(saga: &SagaInstance) -> Option<String> {
    saga.step_output(StepKind::AuthorizePayment)
        .and_then(|output| output["payment_id"].as_str())
        .map(String::from)
}

/// The stock holds the fulfillment saga took, if it got that far.
fn recorded_holds(saga: &SagaInstance) -> Vec<ReservationRef> {
    saga.step_output(StepKind::ReserveInventory)
        .and_then(|output| serde_json::from_value(output["reservations"].clone()).ok())
        .unwrap_or_default()
}
