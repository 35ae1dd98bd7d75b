//! Order state machines.

use serde::{Deserialize, Serialize};

use crate::value_objects::Money;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// PENDING ──► CONFIRMED ──► PROCESSING ──► SHIPPED ──► DELIVERED ──► COMPLETED
///    │            │             │             │            │             │
///    ▼            ▼             ▼             ▼            ▼             ▼
/// CANCELLED   CANCELLED     CANCELLED      RETURNED     RETURNED      RETURNED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation.
    #[default]
    Pending,

    /// Order confirmed, stock promised.
    Confirmed,

    /// Payment flow underway, order being prepared.
    Processing,

    /// Order handed to the carrier.
    Shipped,

    /// Order received by the customer.
    Delivered,

    /// Order closed successfully.
    Completed,

    /// Order was cancelled (terminal).
    Cancelled,

    /// Order was returned after delivery (terminal).
    Returned,
}

impl OrderStatus {
    /// Returns true if the order may move from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Returned)
                | (Delivered, Completed)
                | (Delivered, Returned)
                | (Completed, Returned)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Returns true if a cancellation request is approved on the spot.
    pub fn can_cancel_immediately(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if a cancellation request needs explicit approval.
    pub fn requires_cancellation_approval(&self) -> bool {
        matches!(self, OrderStatus::Processing)
    }

    /// Returns true if a cancellation request is accepted at all.
    pub fn is_cancellable(&self) -> bool {
        self.can_cancel_immediately() || self.requires_cancellation_approval()
    }

    /// Refund owed when cancelling from this status.
    ///
    /// A full refund before processing starts; 95% (a 5% processing fee is
    /// retained) once processing is underway; nothing after that.
    pub fn refund_amount(&self, total: Money) -> Money {
        match self {
            OrderStatus::Pending | OrderStatus::Confirmed => total,
            OrderStatus::Processing => total.percentage(95),
            _ => Money::zero(),
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the order's money stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// No payment activity yet.
    #[default]
    Pending,

    /// Funds held on the customer's card.
    Authorized,

    /// Funds captured.
    Paid,

    /// Payment attempt failed.
    Failed,

    /// Captured funds returned.
    Refunded,
}

impl PaymentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Authorized => "AUTHORIZED",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the physical goods stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    /// Nothing picked yet.
    #[default]
    Pending,

    /// Being picked and packed.
    Processing,

    /// With the carrier.
    Shipped,

    /// Arrived.
    Delivered,

    /// Sent back.
    Returned,
}

impl FulfillmentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "PENDING",
            FulfillmentStatus::Processing => "PROCESSING",
            FulfillmentStatus::Shipped => "SHIPPED",
            FulfillmentStatus::Delivered => "DELIVERED",
            FulfillmentStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationDisposition {
    /// Cancelled on the spot; this refund is owed.
    AutoApproved { refund_amount: Money },

    /// Recorded; an operator has to approve it.
    PendingApproval,

    /// The order's status does not admit cancellation.
    Rejected { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(FulfillmentStatus::default(), FulfillmentStatus::Pending);
    }

    #[test]
    fn test_forward_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_cancellation_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_return_transitions() {
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Returned));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Returned));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Returned));
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_no_moving_backward() {
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Returned.is_terminal());
        assert!(!OrderStatus::Completed.is_terminal());

        for next in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Completed,
            OrderStatus::Returned,
        ] {
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
            assert!(!OrderStatus::Returned.can_transition_to(next));
        }
    }

    #[test]
    fn test_cancellation_policy() {
        assert!(OrderStatus::Pending.can_cancel_immediately());
        assert!(OrderStatus::Confirmed.can_cancel_immediately());
        assert!(!OrderStatus::Processing.can_cancel_immediately());

        assert!(OrderStatus::Processing.requires_cancellation_approval());
        assert!(!OrderStatus::Pending.requires_cancellation_approval());

        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(!OrderStatus::Delivered.is_cancellable());
        assert!(!OrderStatus::Completed.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
        assert!(!OrderStatus::Returned.is_cancellable());
    }

    #[test]
    fn test_refund_policy() {
        let total = Money::from_cents(10000);

        assert_eq!(OrderStatus::Pending.refund_amount(total).cents(), 10000);
        assert_eq!(OrderStatus::Confirmed.refund_amount(total).cents(), 10000);
        assert_eq!(OrderStatus::Processing.refund_amount(total).cents(), 9500);
        assert_eq!(OrderStatus::Shipped.refund_amount(total).cents(), 0);
        assert_eq!(OrderStatus::Delivered.refund_amount(total).cents(), 0);
    }

    #[test]
    fn test_refund_rounds_down_to_whole_cents() {
        let total = Money::from_cents(999);
        assert_eq!(OrderStatus::Processing.refund_amount(total).cents(), 949);
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderStatus::Pending.to_string(), "PENDING");
        assert_eq!(OrderStatus::Processing.to_string(), "PROCESSING");
        assert_eq!(PaymentStatus::Authorized.to_string(), "AUTHORIZED");
        assert_eq!(FulfillmentStatus::Shipped.to_string(), "SHIPPED");
    }

    #[test]
    fn test_serialization_uses_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");

        let status: OrderStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(status, OrderStatus::Cancelled);

        assert!(serde_json::from_str::<OrderStatus>("\"Pending\"").is_err());
    }
}
