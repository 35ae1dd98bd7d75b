//! Domain layer for the event-sourcing system.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait with a compile-time type registry for replay
//! - AggregateRoot and AggregateRepository for loading and committing
//! - Inventory aggregate with reservations, adjustments, and counts
//! - Order aggregate with its lifecycle state machine and cancellation flow

pub mod aggregate;
pub mod error;
pub mod inventory;
pub mod order;
pub mod repository;
pub mod root;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent};
pub use error::DomainError;
pub use inventory::{
    AdjustStock, CreateItem, Inventory, InventoryError, InventoryEvent, InventoryService,
    RecordPhysicalCount, ReserveStock, UpdateItemDetails,
};
pub use order::{
    ApproveCancellation, CancelOrder, CancellationDisposition, CreateOrder, MarkDelivered,
    MarkShipped, Order, OrderError, OrderEvent, OrderService, OrderStatus, PaymentStatus,
    RecordPaymentAuthorized, RecordPaymentCaptured, RecordPaymentFailed, RecordRefundCompleted,
    RejectCancellation, RequestCancellation, UpdateOrderStatus,
};
pub use repository::{AggregateRepository, Command, CommandResult};
pub use root::AggregateRoot;
pub use value_objects::{CustomerId, Money, OrderItem, ProductId};
