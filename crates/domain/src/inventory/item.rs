//! Inventory item entity and the records attached to it.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{CustomerId, Money, ProductId};

use super::state::{AdjustmentType, ItemStatus, ReservationStatus};

/// Default threshold below which a low-stock alert is raised.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 10;

/// Default threshold below which a reorder is suggested.
pub const DEFAULT_REORDER_POINT: u32 = 5;

/// Default quantity suggested when a reorder is raised.
pub const DEFAULT_REORDER_QUANTITY: u32 = 100;

/// Default lifetime of an unconfirmed reservation, in seconds.
pub const DEFAULT_RESERVATION_TTL_SECS: i64 = 1800;

/// Unique identifier for a stock reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random reservation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a reservation ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ReservationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ReservationId> for Uuid {
    fn from(id: ReservationId) -> Self {
        id.0
    }
}

/// Unique identifier for a stock adjustment audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjustmentId(Uuid);

impl AdjustmentId {
    /// Creates a new random adjustment ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an adjustment ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AdjustmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AdjustmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stocked product variant with its quantities, pricing, and thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// The catalog product this item stocks.
    pub product_id: ProductId,

    /// Optional variant discriminator (size, color, ...).
    pub variant_id: Option<String>,

    /// Warehouse stock-keeping unit. Unique across items.
    pub sku: String,

    /// Lifecycle status.
    pub status: ItemStatus,

    /// Units physically on hand.
    pub total_quantity: u32,

    /// Units promised to open reservations.
    pub reserved_quantity: u32,

    /// Selling price per unit.
    pub unit_price: Money,

    /// Acquisition cost per unit.
    pub cost_price: Money,

    /// Available-quantity level at which a low-stock alert fires.
    pub low_stock_threshold: u32,

    /// Available-quantity level at which a reorder is suggested.
    pub reorder_point: u32,

    /// Quantity suggested when a reorder fires.
    pub reorder_quantity: u32,
}

impl InventoryItem {
    /// Units that can still be promised: on hand minus already reserved,
    /// floored at zero.
    pub fn available_quantity(&self) -> u32 {
        self.total_quantity.saturating_sub(self.reserved_quantity)
    }

    /// Returns true if a reservation for `quantity` units could be taken.
    pub fn can_reserve(&self, quantity: u32) -> bool {
        self.status.is_active() && quantity > 0 && quantity <= self.available_quantity()
    }

    /// Returns true if available stock is at or below the low-stock threshold.
    pub fn is_low_stock(&self) -> bool {
        self.available_quantity() <= self.low_stock_threshold
    }

    /// Returns true if available stock is at or below the reorder point.
    pub fn needs_reorder(&self) -> bool {
        self.available_quantity() <= self.reorder_point
    }

    /// Value of the stock on hand at cost price.
    pub fn stock_value(&self) -> Money {
        self.cost_price.multiply(self.total_quantity)
    }
}

/// A hold on stock taken for an order, pending confirmation or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservation {
    /// Unique reservation identifier.
    pub reservation_id: ReservationId,

    /// The order the stock is held for.
    pub order_id: AggregateId,

    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// Units held.
    pub quantity: u32,

    /// Unit price at reservation time.
    pub unit_price: Money,

    /// Lifecycle status.
    pub status: ReservationStatus,

    /// When the hold was taken.
    pub reserved_at: DateTime<Utc>,

    /// When an unconfirmed hold lapses.
    pub expires_at: DateTime<Utc>,
}

impl StockReservation {
    /// Returns true if the reservation is PENDING and past its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.can_expire() && self.expires_at <= now
    }
}

/// Audit record of a manual or automatic stock level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    /// Unique adjustment identifier.
    pub adjustment_id: AdjustmentId,

    /// Why the stock level changed.
    pub adjustment_type: AdjustmentType,

    /// Signed change in units.
    pub quantity_delta: i64,

    /// Units on hand before the adjustment.
    pub previous_quantity: u32,

    /// Units on hand after the adjustment.
    pub new_quantity: u32,

    /// Free-form justification.
    pub reason: String,

    /// Who performed the adjustment.
    pub adjusted_by: String,

    /// When the adjustment happened.
    pub adjusted_at: DateTime<Utc>,
}
