//! End-to-end saga tests: real handler registry, in-memory store, repository,
//! and collaborator fakes.

use std::sync::Arc;

use common::{AggregateId, CorrelationId};
use domain::{
    CreateItem, CreateOrder, CustomerId, InventoryService, Money, OrderItem, OrderService,
    OrderStatus, PaymentStatus, RequestCancellation,
};
use event_store::InMemoryEventStore;
use saga::{
    CancellationContext, FulfillmentContext, FulfillmentLine, InMemoryNotificationService,
    InMemoryPaymentGateway, InMemorySagaRepository, InMemoryShippingProvider, ReservationRef,
    SagaInstance, SagaKind, SagaOrchestrator, SagaServices, SagaStatus, StepKind, StepStatus,
    handler_registry,
};

struct Harness {
    orchestrator: SagaOrchestrator<InMemorySagaRepository>,
    orders: Arc<OrderService<InMemoryEventStore>>,
    inventory: Arc<InventoryService<InMemoryEventStore>>,
    payments: Arc<InMemoryPaymentGateway>,
    shipping: Arc<InMemoryShippingProvider>,
    notifications: Arc<InMemoryNotificationService>,
}

impl Harness {
    fn new() -> Self {
        let store = InMemoryEventStore::new();
        let orders = Arc::new(OrderService::new(store.clone()));
        let inventory = Arc::new(InventoryService::new(store));
        let payments = Arc::new(InMemoryPaymentGateway::new());
        let shipping = Arc::new(InMemoryShippingProvider::new());
        let notifications = Arc::new(InMemoryNotificationService::new());

        let registry = handler_registry(SagaServices {
            orders: Arc::clone(&orders),
            inventory: Arc::clone(&inventory),
            payments: payments.clone(),
            shipping: shipping.clone(),
            notifications: notifications.clone(),
            reservation_ttl: chrono::Duration::minutes(30),
        });
        let orchestrator =
            SagaOrchestrator::new(Arc::new(InMemorySagaRepository::new()), Arc::new(registry));

        Self {
            orchestrator,
            orders,
            inventory,
            payments,
            shipping,
            notifications,
        }
    }

    async fn stocked_item(&self, sku: &str, quantity: u32) -> AggregateId {
        let cmd = CreateItem::for_product(
            "PROD-001",
            sku,
            quantity,
            Money::from_cents(1000),
            Money::from_cents(600),
        );
        let item_id = cmd.item_id;
        self.inventory.create_item(cmd).await.unwrap();
        item_id
    }

    /// Places a 2-unit, 2000-cent order and builds its fulfillment context.
    async fn placed_order(&self, item_id: AggregateId) -> FulfillmentContext {
        let customer_id = CustomerId::new();
        let cmd = CreateOrder::for_customer(
            customer_id,
            vec![OrderItem::new("PROD-001", "Widget", 2, Money::from_cents(1000))],
        );
        let order_id = cmd.order_id;
        self.orders.create_order(cmd).await.unwrap();

        FulfillmentContext {
            order_id,
            customer_id,
            amount_cents: 2000,
            lines: vec![FulfillmentLine {
                item_id,
                quantity: 2,
            }],
        }
    }

    async fn run_fulfillment(&self, ctx: &FulfillmentContext) -> SagaInstance {
        self.run_saga(SagaKind::OrderFulfillment, serde_json::to_value(ctx).unwrap())
            .await
    }

    async fn run_cancellation(&self, ctx: &CancellationContext) -> SagaInstance {
        self.run_saga(SagaKind::OrderCancellation, serde_json::to_value(ctx).unwrap())
            .await
    }

    async fn run_saga(&self, kind: SagaKind, context: serde_json::Value) -> SagaInstance {
        let saga_id = self
            .orchestrator
            .start_saga(kind, CorrelationId::new(), context)
            .await
            .unwrap();
        assert!(self.orchestrator.join_saga(saga_id).await);
        self.orchestrator.get_saga(saga_id).await.unwrap().unwrap()
    }

    /// Builds the cancellation context out of what a completed fulfillment
    /// saga recorded.
    fn cancellation_context(
        &self,
        ctx: &FulfillmentContext,
        fulfillment: &SagaInstance,
    ) -> CancellationContext {
        let payment_output = fulfillment.step_output(StepKind::AuthorizePayment).unwrap();
        CancellationContext {
            order_id: ctx.order_id,
            customer_id: ctx.customer_id,
            refund_cents: ctx.amount_cents,
            payment_id: payment_output["payment_id"].as_str().map(String::from),
            releases: reservations_of(fulfillment),
        }
    }
}

/// Pulls the reservation refs the fulfillment saga recorded.
fn reservations_of(saga: &SagaInstance) -> Vec<ReservationRef> {
    let output = saga.step_output(StepKind::ReserveInventory).unwrap();
    serde_json::from_value(output["reservations"].clone()).unwrap()
}

#[tokio::test]
async fn test_fulfillment_happy_path() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 50).await;
    let ctx = harness.placed_order(item_id).await;

    let saga = harness.run_fulfillment(&ctx).await;

    assert_eq!(saga.status, SagaStatus::Completed);
    assert!(
        saga.steps
            .iter()
            .all(|step| step.status == StepStatus::Completed)
    );

    // Order confirmed and paid.
    let order = harness.orders.get_order(ctx.order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Confirmed);
    assert_eq!(order.payment_status(), PaymentStatus::Paid);

    // Stock held and the hold made firm.
    let item = harness.inventory.get_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.reserved_quantity(), 2);
    assert_eq!(item.available_quantity(), 48);

    // Collaborators touched exactly once each.
    assert_eq!(harness.payments.payment_count(), 1);
    assert!(harness.payments.is_captured("PAY-0001"));
    assert_eq!(harness.shipping.shipment_count(), 1);
    assert_eq!(harness.notifications.confirmation_count(), 1);
}

#[tokio::test]
async fn test_payment_decline_leaves_nothing_behind() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 50).await;
    let ctx = harness.placed_order(item_id).await;

    harness.payments.set_fail_on_authorize(true);
    let saga = harness.run_fulfillment(&ctx).await;

    // The first step failed, so nothing completed and nothing needs undoing.
    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.steps[0].status, StepStatus::Failed);
    assert_eq!(saga.steps[0].retry_count, 3);
    assert!(
        saga.steps[1..]
            .iter()
            .all(|step| step.status == StepStatus::Pending)
    );

    let item = harness.inventory.get_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.reserved_quantity(), 0);
    assert_eq!(harness.shipping.shipment_count(), 0);
    assert_eq!(harness.notifications.sent_count(), 0);
}

#[tokio::test]
async fn test_shipping_failure_compensates_in_reverse() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 50).await;
    let ctx = harness.placed_order(item_id).await;

    harness.shipping.set_fail_on_create(true);
    let saga = harness.run_fulfillment(&ctx).await;

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.steps[0].status, StepStatus::Compensated);
    assert_eq!(saga.steps[1].status, StepStatus::Compensated);
    assert_eq!(saga.steps[2].status, StepStatus::Failed);
    assert_eq!(saga.steps[3].status, StepStatus::Pending);

    // The hold was voided and the stock released.
    assert!(harness.payments.is_voided("PAY-0001"));
    let item = harness.inventory.get_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.reserved_quantity(), 0);
    assert_eq!(item.available_quantity(), 50);

    // Confirm never ran, so the order never moved.
    let order = harness.orders.get_order(ctx.order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Pending);
}

#[tokio::test]
async fn test_transient_gateway_outage_is_retried_in_place() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 50).await;
    let ctx = harness.placed_order(item_id).await;

    harness.payments.fail_next_authorizations(2);
    let saga = harness.run_fulfillment(&ctx).await;

    assert_eq!(saga.status, SagaStatus::Completed);
    assert_eq!(saga.steps[0].retry_count, 2);
    assert_eq!(harness.payments.payment_count(), 1);
}

#[tokio::test]
async fn test_insufficient_stock_fails_and_voids_the_authorization() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 1).await;
    let ctx = harness.placed_order(item_id).await; // wants 2 units

    let saga = harness.run_fulfillment(&ctx).await;

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.steps[1].status, StepStatus::Failed);
    assert!(harness.payments.is_voided("PAY-0001"));

    let item = harness.inventory.get_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.reserved_quantity(), 0);
}

#[tokio::test]
async fn test_cancellation_saga_end_to_end() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 50).await;
    let ctx = harness.placed_order(item_id).await;

    let fulfillment = harness.run_fulfillment(&ctx).await;
    assert_eq!(fulfillment.status, SagaStatus::Completed);

    // A confirmed order cancels on the spot with a full refund.
    let disposition = harness
        .orders
        .request_cancellation(RequestCancellation::new(
            ctx.order_id,
            "changed my mind",
            "customer",
        ))
        .await
        .unwrap();
    assert_eq!(
        disposition,
        domain::CancellationDisposition::AutoApproved {
            refund_amount: Money::from_cents(2000),
        }
    );

    let cancel_ctx = harness.cancellation_context(&ctx, &fulfillment);
    let saga = harness.run_cancellation(&cancel_ctx).await;
    assert_eq!(saga.status, SagaStatus::Completed);

    let order = harness.orders.get_order(ctx.order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(order.payment_status(), PaymentStatus::Refunded);

    assert!(harness.payments.is_refunded("PAY-0001"));
    assert_eq!(
        harness.payments.refunded_amount("PAY-0001"),
        Some(Money::from_cents(2000))
    );

    // The firm hold went back to available stock.
    let item = harness.inventory.get_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.reserved_quantity(), 0);
    assert_eq!(item.available_quantity(), 50);

    assert_eq!(harness.notifications.cancellation_count(), 1);
}

#[tokio::test]
async fn test_failed_refund_compensates_then_retry_resumes() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 50).await;
    let ctx = harness.placed_order(item_id).await;

    let fulfillment = harness.run_fulfillment(&ctx).await;
    harness
        .orders
        .request_cancellation(RequestCancellation::new(ctx.order_id, "regret", "customer"))
        .await
        .unwrap();
    let cancel_ctx = harness.cancellation_context(&ctx, &fulfillment);

    harness.payments.set_fail_on_refund(true);
    let saga = harness.run_cancellation(&cancel_ctx).await;

    // The refund exhausted its retries; the released inventory has no
    // registered undo, so compensation finishes cleanly.
    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.steps[0].status, StepStatus::Compensated);
    assert_eq!(saga.steps[1].status, StepStatus::Failed);
    assert_eq!(saga.steps[1].retry_count, 3);
    assert_eq!(saga.current_step_index, 1);

    // The gateway recovers; resume from the failed step.
    harness.payments.set_fail_on_refund(false);
    assert!(harness.orchestrator.retry_saga(saga.saga_id).await.unwrap());
    harness.orchestrator.join_saga(saga.saga_id).await;

    let saga = harness
        .orchestrator
        .get_saga(saga.saga_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saga.status, SagaStatus::Completed);
    assert!(harness.payments.is_refunded("PAY-0001"));

    let order = harness.orders.get_order(ctx.order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(harness.notifications.cancellation_count(), 1);
}

#[tokio::test]
async fn test_saga_listings_reflect_outcomes() {
    let harness = Harness::new();
    let item_id = harness.stocked_item("SKU-001", 50).await;

    let ok_ctx = harness.placed_order(item_id).await;
    harness.run_fulfillment(&ok_ctx).await;

    harness.payments.set_fail_on_authorize(true);
    let bad_ctx = harness.placed_order(item_id).await;
    harness.run_fulfillment(&bad_ctx).await;

    assert!(
        harness
            .orchestrator
            .list_running_sagas()
            .await
            .unwrap()
            .is_empty()
    );
    // A cleanly compensated saga is terminal, not an operator problem.
    assert!(
        harness
            .orchestrator
            .list_failed_sagas()
            .await
            .unwrap()
            .is_empty()
    );

    let stats = harness.orchestrator.statistics().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.count_for_status("COMPLETED"), 1);
    assert_eq!(stats.count_for_status("COMPENSATED"), 1);
    assert_eq!(stats.count_for_kind("order_fulfillment"), 2);
}
