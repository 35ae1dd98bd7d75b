//! State machines for inventory items and stock reservations.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an inventory item.
///
/// ACTIVE and OUT_OF_STOCK flip automatically as stock levels move;
/// INACTIVE and DISCONTINUED are set explicitly through a details update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// Item is sellable and accepts reservations.
    #[default]
    Active,

    /// Item is temporarily not sellable.
    Inactive,

    /// Item is permanently retired from the catalog.
    Discontinued,

    /// Item has no stock on hand.
    OutOfStock,
}

impl ItemStatus {
    /// Returns true if the item accepts new reservations.
    pub fn is_active(&self) -> bool {
        matches!(self, ItemStatus::Active)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Active => "ACTIVE",
            ItemStatus::Inactive => "INACTIVE",
            ItemStatus::Discontinued => "DISCONTINUED",
            ItemStatus::OutOfStock => "OUT_OF_STOCK",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a stock reservation.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed ──┬──► (removed on fulfillment)
///           │                └──► Cancelled
///           ├──► Cancelled
///           └──► Expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Reservation holds stock but awaits confirmation; expires after its TTL.
    #[default]
    Pending,

    /// Reservation is confirmed and no longer subject to expiry.
    Confirmed,

    /// Reservation lapsed before confirmation (terminal).
    Expired,

    /// Reservation was released (terminal).
    Cancelled,
}

impl ReservationStatus {
    /// Returns true while the reservation counts against available stock.
    pub fn holds_stock(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    /// Returns true if the reservation can be confirmed.
    pub fn can_confirm(&self) -> bool {
        matches!(self, ReservationStatus::Pending)
    }

    /// Returns true if the reservation can be cancelled.
    pub fn can_cancel(&self) -> bool {
        self.holds_stock()
    }

    /// Returns true if the reservation is subject to TTL expiry.
    pub fn can_expire(&self) -> bool {
        matches!(self, ReservationStatus::Pending)
    }

    /// Returns true if the reservation can be fulfilled.
    pub fn can_fulfill(&self) -> bool {
        matches!(self, ReservationStatus::Confirmed)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Expired | ReservationStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Expired => "EXPIRED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a stock adjustment for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    /// Operator-initiated correction.
    Manual,

    /// Reconciliation against a physical count.
    Recount,

    /// Stock written off as damaged.
    Damage,

    /// Stock returned by a customer.
    Return,

    /// System correction of a recording error.
    Correction,
}

impl AdjustmentType {
    /// Returns the adjustment type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::Manual => "MANUAL",
            AdjustmentType::Recount => "RECOUNT",
            AdjustmentType::Damage => "DAMAGE",
            AdjustmentType::Return => "RETURN",
            AdjustmentType::Correction => "CORRECTION",
        }
    }
}

impl std::fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
