//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::value_objects::{CustomerId, Money, OrderItem};

use super::{
    OrderError, OrderEvent,
    commands::CreateOrder,
    events::{
        CancellationApprovedData, CancellationRequestedData, OrderCreatedData, OrderShippedData,
        PaymentAuthorizedData, PaymentCapturedData, ReleaseQuantity, StatusChangedData,
    },
    state::{FulfillmentStatus, OrderStatus, PaymentStatus},
};

/// An open cancellation request awaiting a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationRequest {
    pub reason: String,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
}

/// An approved cancellation, ready for the cancel command.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedCancellation {
    pub refund_amount: Money,
    pub release_quantities: Vec<ReleaseQuantity>,
}

/// Order aggregate root.
///
/// Carries the full lifecycle of an order: status, payment and fulfillment
/// tracking, and the cancellation request/approval flow.
#[derive(Debug, Clone, Default)]
pub struct Order {
    /// Unique order identifier.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    version: Version,

    /// Customer who placed the order.
    customer_id: Option<CustomerId>,

    /// Current lifecycle status.
    status: OrderStatus,

    /// Where the money stands.
    payment_status: PaymentStatus,

    /// Where the goods stand.
    fulfillment_status: FulfillmentStatus,

    /// The cart, fixed at creation.
    items: Vec<OrderItem>,

    /// Total amount of the order.
    total_amount: Money,

    /// ISO currency code.
    currency: String,

    /// Gateway payment reference, once authorized.
    payment_id: Option<String>,

    /// Carrier tracking number, once shipped.
    tracking_number: Option<String>,

    /// Open cancellation request, if any.
    pending_cancellation: Option<CancellationRequest>,

    /// Approved cancellation waiting for the cancel command.
    approved_cancellation: Option<ApprovedCancellation>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderCreated(data) => self.apply_order_created(data),
            OrderEvent::StatusChanged(data) => self.apply_status_changed(data),
            OrderEvent::CancellationRequested(data) => self.apply_cancellation_requested(data),
            OrderEvent::CancellationApproved(data) => self.apply_cancellation_approved(data),
            OrderEvent::CancellationRejected(_) => {
                self.pending_cancellation = None;
            }
            OrderEvent::OrderCancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
            OrderEvent::PaymentAuthorized(data) => self.apply_payment_authorized(data),
            OrderEvent::PaymentCaptured(data) => self.apply_payment_captured(data),
            OrderEvent::PaymentFailed(_) => {
                self.payment_status = PaymentStatus::Failed;
            }
            OrderEvent::RefundCompleted(_) => {
                self.payment_status = PaymentStatus::Refunded;
            }
            OrderEvent::OrderShipped(data) => self.apply_order_shipped(data),
            OrderEvent::OrderDelivered(_) => {
                self.status = OrderStatus::Delivered;
                self.fulfillment_status = FulfillmentStatus::Delivered;
            }
        }
    }
}

// Query methods
impl Order {
    /// Returns the customer ID.
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Returns the current lifecycle status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the payment status.
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// Returns the fulfillment status.
    pub fn fulfillment_status(&self) -> FulfillmentStatus {
        self.fulfillment_status
    }

    /// Returns the cart lines.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the number of cart lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Returns the total amount.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the ISO currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Returns the gateway payment reference, once authorized.
    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    /// Returns the carrier tracking number, once shipped.
    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    /// Returns the open cancellation request, if any.
    pub fn pending_cancellation(&self) -> Option<&CancellationRequest> {
        self.pending_cancellation.as_ref()
    }

    /// Returns the approved cancellation, if any.
    pub fn approved_cancellation(&self) -> Option<&ApprovedCancellation> {
        self.approved_cancellation.as_ref()
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Places the order with its full cart.
    pub fn create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }

        if cmd.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        for item in &cmd.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    price: item.unit_price.cents(),
                });
            }
        }

        let total = cmd
            .items
            .iter()
            .fold(Money::zero(), |acc, item| acc + item.total_price());
        if !total.is_positive() {
            return Err(OrderError::InvalidAmount {
                amount: total.cents(),
            });
        }

        Ok(vec![OrderEvent::order_created(
            cmd.order_id,
            cmd.customer_id,
            cmd.items.clone(),
            total,
            cmd.currency.clone(),
        )])
    }

    /// Moves the order along its status table.
    ///
    /// Cancellation is not reachable here; it goes through the
    /// request/approve/cancel flow.
    pub fn update_status(&self, new_status: OrderStatus) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;

        if new_status == OrderStatus::Cancelled {
            return Err(OrderError::ApprovalRequired);
        }

        if !self.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: new_status,
            });
        }

        Ok(vec![OrderEvent::status_changed(self.status, new_status)])
    }

    /// Asks for the order to be cancelled.
    ///
    /// Statuses that allow immediate cancellation also emit the approval
    /// in the same command; PROCESSING records the request for an
    /// operator to decide.
    pub fn request_cancellation(
        &self,
        reason: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;

        if !self.status.is_cancellable() {
            return Err(OrderError::NotCancellable {
                status: self.status,
            });
        }

        let mut events = vec![OrderEvent::cancellation_requested(reason, requested_by)];

        if self.status.can_cancel_immediately() {
            events.push(OrderEvent::cancellation_approved(
                self.status.refund_amount(self.total_amount),
                self.release_quantities(),
            ));
        }

        Ok(events)
    }

    /// Approves the open cancellation request.
    pub fn approve_cancellation(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;

        if self.pending_cancellation.is_none() {
            return Err(OrderError::NoPendingCancellation);
        }

        Ok(vec![OrderEvent::cancellation_approved(
            self.status.refund_amount(self.total_amount),
            self.release_quantities(),
        )])
    }

    /// Turns down the open cancellation request.
    pub fn reject_cancellation(
        &self,
        reason: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;

        if self.pending_cancellation.is_none() {
            return Err(OrderError::NoPendingCancellation);
        }

        Ok(vec![OrderEvent::cancellation_rejected(reason)])
    }

    /// Cancels the order. Requires an approved cancellation.
    pub fn cancel(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;

        let approved = self
            .approved_cancellation
            .as_ref()
            .ok_or(OrderError::ApprovalRequired)?;

        if !self.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }

        Ok(vec![OrderEvent::order_cancelled(
            self.status,
            approved.refund_amount,
        )])
    }

    /// Records a payment authorization.
    pub fn record_payment_authorized(
        &self,
        payment_id: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;
        Ok(vec![OrderEvent::payment_authorized(payment_id)])
    }

    /// Records a payment capture.
    pub fn record_payment_captured(
        &self,
        payment_id: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;
        Ok(vec![OrderEvent::payment_captured(payment_id)])
    }

    /// Records a failed payment attempt.
    pub fn record_payment_failed(
        &self,
        reason: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;
        Ok(vec![OrderEvent::payment_failed(reason)])
    }

    /// Records a completed refund.
    pub fn record_refund_completed(&self, amount: Money) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;
        Ok(vec![OrderEvent::refund_completed(amount)])
    }

    /// Records that the order left the warehouse.
    pub fn mark_shipped(
        &self,
        tracking_number: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;

        if !self.status.can_transition_to(OrderStatus::Shipped) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: OrderStatus::Shipped,
            });
        }

        Ok(vec![OrderEvent::order_shipped(tracking_number)])
    }

    /// Records that the order reached the customer.
    pub fn mark_delivered(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.require_created()?;

        if !self.status.can_transition_to(OrderStatus::Delivered) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: OrderStatus::Delivered,
            });
        }

        Ok(vec![OrderEvent::order_delivered()])
    }

    fn require_created(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotCreated);
        }
        Ok(())
    }

    fn release_quantities(&self) -> Vec<ReleaseQuantity> {
        self.items
            .iter()
            .map(|item| ReleaseQuantity {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect()
    }
}

// Apply event helpers
impl Order {
    fn apply_order_created(&mut self, data: OrderCreatedData) {
        self.id = Some(data.order_id);
        self.customer_id = Some(data.customer_id);
        self.items = data.items;
        self.total_amount = data.total_amount;
        self.currency = data.currency;
        self.status = OrderStatus::Pending;
    }

    fn apply_status_changed(&mut self, data: StatusChangedData) {
        self.status = data.new_status;
        match data.new_status {
            OrderStatus::Processing => self.fulfillment_status = FulfillmentStatus::Processing,
            OrderStatus::Shipped => self.fulfillment_status = FulfillmentStatus::Shipped,
            OrderStatus::Delivered => self.fulfillment_status = FulfillmentStatus::Delivered,
            OrderStatus::Returned => self.fulfillment_status = FulfillmentStatus::Returned,
            _ => {}
        }
    }

    fn apply_cancellation_requested(&mut self, data: CancellationRequestedData) {
        self.pending_cancellation = Some(CancellationRequest {
            reason: data.reason,
            requested_by: data.requested_by,
            requested_at: data.requested_at,
        });
    }

    fn apply_cancellation_approved(&mut self, data: CancellationApprovedData) {
        self.approved_cancellation = Some(ApprovedCancellation {
            refund_amount: data.refund_amount,
            release_quantities: data.release_quantities,
        });
        self.pending_cancellation = None;
    }

    fn apply_payment_authorized(&mut self, data: PaymentAuthorizedData) {
        self.payment_status = PaymentStatus::Authorized;
        self.payment_id = Some(data.payment_id);
    }

    fn apply_payment_captured(&mut self, data: PaymentCapturedData) {
        self.payment_status = PaymentStatus::Paid;
        self.payment_id = Some(data.payment_id);
    }

    fn apply_order_shipped(&mut self, data: OrderShippedData) {
        self.status = OrderStatus::Shipped;
        self.fulfillment_status = FulfillmentStatus::Shipped;
        self.tracking_number = Some(data.tracking_number);
    }
}
