//! Inventory aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod item;
mod service;
mod state;

pub use aggregate::Inventory;
pub use commands::*;
pub use events::{
    CountDiscrepancyData, InventoryEvent, ItemCreatedData, ItemUpdatedData, LowStockData,
    MovementDirection, MovementReference, ReorderRequiredData, ReservationCancelledData,
    ReservationConflictData, ReservationConfirmedData, ReservationExpiredData, StatusChangedData,
    StockAdjustedData, StockFulfilledData, StockMovementData, StockReservedData,
    ValuationChangedData,
};
pub use item::{
    AdjustmentId, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_REORDER_POINT, DEFAULT_REORDER_QUANTITY,
    DEFAULT_RESERVATION_TTL_SECS, InventoryAdjustment, InventoryItem, ReservationId,
    StockReservation,
};
pub use service::InventoryService;
pub use state::{AdjustmentType, ItemStatus, ReservationStatus};

use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Quantity must be greater than zero.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Price is out of range for its role.
    #[error("Invalid price: {price}")]
    InvalidPrice { price: i64 },

    /// SKU must be non-empty.
    #[error("SKU is required")]
    SkuRequired,

    /// Another item already carries this SKU.
    #[error("SKU already in use: {sku}")]
    DuplicateSku { sku: String },

    /// Item is not accepting reservations.
    #[error("Item is not active (status: {status})")]
    ItemNotActive { status: ItemStatus },

    /// Not enough unreserved stock.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// Open reservations already claim the stock this request needs.
    #[error(
        "Reservation conflict: requested {requested} with {available} available \
         and {pending_reserved} already held"
    )]
    ReservationConflict {
        requested: u32,
        available: u32,
        pending_reserved: u32,
    },

    /// No reservation with this ID.
    #[error("Reservation not found: {reservation_id}")]
    ReservationNotFound { reservation_id: ReservationId },

    /// Reservation is not in a state that allows the operation.
    #[error("Reservation {reservation_id} is in state {status}")]
    InvalidReservationState {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },

    /// Adjustment would drop recorded stock below the reserved level.
    #[error("Adjustment would leave {new_total} units with {reserved} reserved")]
    AdjustmentBelowReserved { new_total: i64, reserved: u32 },

    /// Adjustment would drop recorded stock below zero.
    #[error("Adjustment would leave {new_total} units")]
    AdjustmentBelowZero { new_total: i64 },

    /// Inventory item is already created.
    #[error("Inventory item already created")]
    AlreadyCreated,

    /// Inventory item does not exist yet.
    #[error("Inventory item not created")]
    NotCreated,
}
