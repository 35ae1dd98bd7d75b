//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::{ApprovedCancellation, CancellationRequest, Order};
pub use commands::*;
pub use events::{
    CancellationApprovedData, CancellationRejectedData, CancellationRequestedData,
    OrderCancelledData, OrderCreatedData, OrderDeliveredData, OrderEvent, OrderShippedData,
    PaymentAuthorizedData, PaymentCapturedData, PaymentFailedData, RefundCompletedData,
    ReleaseQuantity, StatusChangedData,
};
pub use service::OrderService;
pub use state::{CancellationDisposition, FulfillmentStatus, OrderStatus, PaymentStatus};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    EmptyOrder,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must be greater than 0)")]
    InvalidPrice { price: i64 },

    /// Order total must be positive.
    #[error("Invalid order total: {amount}")]
    InvalidAmount { amount: i64 },

    /// The status table does not allow this move.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    /// The order's status does not allow cancellation.
    #[error("Order in status {status} cannot be cancelled")]
    NotCancellable { status: OrderStatus },

    /// Cancellation needs an approved request first.
    #[error("Cancellation requires approval")]
    ApprovalRequired,

    /// No cancellation request is open.
    #[error("No pending cancellation request")]
    NoPendingCancellation,

    /// Order is already created.
    #[error("Order already created")]
    AlreadyCreated,

    /// Order does not exist yet.
    #[error("Order has not been created")]
    NotCreated,
}
