//! Order commands.

use common::AggregateId;

use crate::repository::Command;
use crate::value_objects::{CustomerId, Money, OrderItem};

use super::Order;
use super::state::OrderStatus;

/// Command to place a new order with its full cart.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The order ID to create.
    pub order_id: AggregateId,

    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// The cart lines.
    pub items: Vec<OrderItem>,

    /// ISO currency code for the order total.
    pub currency: String,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(order_id: AggregateId, customer_id: CustomerId, items: Vec<OrderItem>) -> Self {
        Self {
            order_id,
            customer_id,
            items,
            currency: "USD".to_string(),
        }
    }

    /// Creates a new CreateOrder command with a generated order ID.
    pub fn for_customer(customer_id: CustomerId, items: Vec<OrderItem>) -> Self {
        Self::new(AggregateId::new(), customer_id, items)
    }

    /// Sets the currency code.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

impl Command for CreateOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to move an order along its status table.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    /// The order to move.
    pub order_id: AggregateId,

    /// The target status.
    pub new_status: OrderStatus,
}

impl UpdateOrderStatus {
    /// Creates a new UpdateOrderStatus command.
    pub fn new(order_id: AggregateId, new_status: OrderStatus) -> Self {
        Self {
            order_id,
            new_status,
        }
    }
}

impl Command for UpdateOrderStatus {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to ask for an order to be cancelled.
#[derive(Debug, Clone)]
pub struct RequestCancellation {
    /// The order to cancel.
    pub order_id: AggregateId,

    /// Reason for the request.
    pub reason: String,

    /// Who is asking.
    pub requested_by: String,
}

impl RequestCancellation {
    /// Creates a new RequestCancellation command.
    pub fn new(
        order_id: AggregateId,
        reason: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            reason: reason.into(),
            requested_by: requested_by.into(),
        }
    }
}

impl Command for RequestCancellation {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to approve a pending cancellation request.
#[derive(Debug, Clone)]
pub struct ApproveCancellation {
    /// The order with the pending request.
    pub order_id: AggregateId,
}

impl ApproveCancellation {
    /// Creates a new ApproveCancellation command.
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for ApproveCancellation {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to turn down a pending cancellation request.
#[derive(Debug, Clone)]
pub struct RejectCancellation {
    /// The order with the pending request.
    pub order_id: AggregateId,

    /// Why the request was turned down.
    pub reason: String,
}

impl RejectCancellation {
    /// Creates a new RejectCancellation command.
    pub fn new(order_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

impl Command for RejectCancellation {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to cancel an order whose cancellation was approved.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    /// The order to cancel.
    pub order_id: AggregateId,
}

impl CancelOrder {
    /// Creates a new CancelOrder command.
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to record a payment authorization.
#[derive(Debug, Clone)]
pub struct RecordPaymentAuthorized {
    /// The order the payment belongs to.
    pub order_id: AggregateId,

    /// Gateway payment reference.
    pub payment_id: String,
}

impl RecordPaymentAuthorized {
    /// Creates a new RecordPaymentAuthorized command.
    pub fn new(order_id: AggregateId, payment_id: impl Into<String>) -> Self {
        Self {
            order_id,
            payment_id: payment_id.into(),
        }
    }
}

impl Command for RecordPaymentAuthorized {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to record a payment capture.
#[derive(Debug, Clone)]
pub struct RecordPaymentCaptured {
    /// The order the payment belongs to.
    pub order_id: AggregateId,

    /// Gateway payment reference.
    pub payment_id: String,
}

impl RecordPaymentCaptured {
    /// Creates a new RecordPaymentCaptured command.
    pub fn new(order_id: AggregateId, payment_id: impl Into<String>) -> Self {
        Self {
            order_id,
            payment_id: payment_id.into(),
        }
    }
}

impl Command for RecordPaymentCaptured {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to record a failed payment attempt.
#[derive(Debug, Clone)]
pub struct RecordPaymentFailed {
    /// The order the payment belongs to.
    pub order_id: AggregateId,

    /// Gateway failure reason.
    pub reason: String,
}

impl RecordPaymentFailed {
    /// Creates a new RecordPaymentFailed command.
    pub fn new(order_id: AggregateId, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            reason: reason.into(),
        }
    }
}

impl Command for RecordPaymentFailed {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to record a completed refund.
#[derive(Debug, Clone)]
pub struct RecordRefundCompleted {
    /// The order the refund belongs to.
    pub order_id: AggregateId,

    /// Amount handed back.
    pub amount: Money,
}

impl RecordRefundCompleted {
    /// Creates a new RecordRefundCompleted command.
    pub fn new(order_id: AggregateId, amount: Money) -> Self {
        Self { order_id, amount }
    }
}

impl Command for RecordRefundCompleted {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to record that the order left the warehouse.
#[derive(Debug, Clone)]
pub struct MarkShipped {
    /// The order that shipped.
    pub order_id: AggregateId,

    /// Carrier tracking number.
    pub tracking_number: String,
}

impl MarkShipped {
    /// Creates a new MarkShipped command.
    pub fn new(order_id: AggregateId, tracking_number: impl Into<String>) -> Self {
        Self {
            order_id,
            tracking_number: tracking_number.into(),
        }
    }
}

impl Command for MarkShipped {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to record that the order reached the customer.
#[derive(Debug, Clone)]
pub struct MarkDelivered {
    /// The order that arrived.
    pub order_id: AggregateId,
}

impl MarkDelivered {
    /// Creates a new MarkDelivered command.
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for MarkDelivered {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
