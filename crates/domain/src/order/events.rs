//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{CustomerId, Money, OrderItem, ProductId};

use super::state::OrderStatus;

/// A stock quantity to hand back to inventory when an order dies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseQuantity {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Events that can occur on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// The order was placed with its full cart.
    OrderCreated(OrderCreatedData),

    /// The order moved along its status table.
    StatusChanged(StatusChangedData),

    /// A cancellation was asked for.
    CancellationRequested(CancellationRequestedData),

    /// A cancellation request was approved.
    CancellationApproved(CancellationApprovedData),

    /// A cancellation request was turned down.
    CancellationRejected(CancellationRejectedData),

    /// The order was cancelled.
    OrderCancelled(OrderCancelledData),

    /// Funds were held on the customer's card.
    PaymentAuthorized(PaymentAuthorizedData),

    /// Held funds were captured.
    PaymentCaptured(PaymentCapturedData),

    /// A payment attempt failed.
    PaymentFailed(PaymentFailedData),

    /// A refund finished processing.
    RefundCompleted(RefundCompletedData),

    /// The order left the warehouse.
    OrderShipped(OrderShippedData),

    /// The order reached the customer.
    OrderDelivered(OrderDeliveredData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRequestedData {
    pub reason: String,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationApprovedData {
    pub refund_amount: Money,
    pub release_quantities: Vec<ReleaseQuantity>,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRejectedData {
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub previous_status: OrderStatus,
    pub refund_amount: Money,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAuthorizedData {
    pub payment_id: String,
    pub authorized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCapturedData {
    pub payment_id: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundCompletedData {
    pub amount: Money,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub tracking_number: String,
    pub shipped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDeliveredData {
    pub delivered_at: DateTime<Utc>,
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::CancellationRequested(_) => "CancellationRequested",
            OrderEvent::CancellationApproved(_) => "CancellationApproved",
            OrderEvent::CancellationRejected(_) => "CancellationRejected",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::PaymentAuthorized(_) => "PaymentAuthorized",
            OrderEvent::PaymentCaptured(_) => "PaymentCaptured",
            OrderEvent::PaymentFailed(_) => "PaymentFailed",
            OrderEvent::RefundCompleted(_) => "RefundCompleted",
            OrderEvent::OrderShipped(_) => "OrderShipped",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
        }
    }

    fn event_types() -> &'static [&'static str] {
        &[
            "OrderCreated",
            "StatusChanged",
            "CancellationRequested",
            "CancellationApproved",
            "CancellationRejected",
            "OrderCancelled",
            "PaymentAuthorized",
            "PaymentCaptured",
            "PaymentFailed",
            "RefundCompleted",
            "OrderShipped",
            "OrderDelivered",
        ]
    }
}

// Convenience constructors for events
impl OrderEvent {
    /// Creates an OrderCreated event.
    pub fn order_created(
        order_id: AggregateId,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        total_amount: Money,
        currency: impl Into<String>,
    ) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            customer_id,
            items,
            total_amount,
            currency: currency.into(),
            created_at: Utc::now(),
        })
    }

    /// Creates a StatusChanged event.
    pub fn status_changed(previous_status: OrderStatus, new_status: OrderStatus) -> Self {
        OrderEvent::StatusChanged(StatusChangedData {
            previous_status,
            new_status,
            changed_at: Utc::now(),
        })
    }

    /// Creates a CancellationRequested event.
    pub fn cancellation_requested(
        reason: impl Into<String>,
        requested_by: impl Into<String>,
    ) -> Self {
        OrderEvent::CancellationRequested(CancellationRequestedData {
            reason: reason.into(),
            requested_by: requested_by.into(),
            requested_at: Utc::now(),
        })
    }

    /// Creates a CancellationApproved event.
    pub fn cancellation_approved(
        refund_amount: Money,
        release_quantities: Vec<ReleaseQuantity>,
    ) -> Self {
        OrderEvent::CancellationApproved(CancellationApprovedData {
            refund_amount,
            release_quantities,
            approved_at: Utc::now(),
        })
    }

    /// Creates a CancellationRejected event.
    pub fn cancellation_rejected(reason: impl Into<String>) -> Self {
        OrderEvent::CancellationRejected(CancellationRejectedData {
            reason: reason.into(),
            rejected_at: Utc::now(),
        })
    }

    /// Creates an OrderCancelled event.
    pub fn order_cancelled(previous_status: OrderStatus, refund_amount: Money) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            previous_status,
            refund_amount,
            cancelled_at: Utc::now(),
        })
    }

    /// Creates a PaymentAuthorized event.
    pub fn payment_authorized(payment_id: impl Into<String>) -> Self {
        OrderEvent::PaymentAuthorized(PaymentAuthorizedData {
            payment_id: payment_id.into(),
            authorized_at: Utc::now(),
        })
    }

    /// Creates a PaymentCaptured event.
    pub fn payment_captured(payment_id: impl Into<String>) -> Self {
        OrderEvent::PaymentCaptured(PaymentCapturedData {
            payment_id: payment_id.into(),
            captured_at: Utc::now(),
        })
    }

    /// Creates a PaymentFailed event.
    pub fn payment_failed(reason: impl Into<String>) -> Self {
        OrderEvent::PaymentFailed(PaymentFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }

    /// Creates a RefundCompleted event.
    pub fn refund_completed(amount: Money) -> Self {
        OrderEvent::RefundCompleted(RefundCompletedData {
            amount,
            completed_at: Utc::now(),
        })
    }

    /// Creates an OrderShipped event.
    pub fn order_shipped(tracking_number: impl Into<String>) -> Self {
        OrderEvent::OrderShipped(OrderShippedData {
            tracking_number: tracking_number.into(),
            shipped_at: Utc::now(),
        })
    }

    /// Creates an OrderDelivered event.
    pub fn order_delivered() -> Self {
        OrderEvent::OrderDelivered(OrderDeliveredData {
            delivered_at: Utc::now(),
        })
    }
}
