//! Inventory domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Money;

use super::item::{AdjustmentId, InventoryAdjustment, InventoryItem, ReservationId, StockReservation};
use super::state::ItemStatus;

/// Events that can occur on an inventory aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    /// Inventory item was created.
    ItemCreated(ItemCreatedData),

    /// Pricing or threshold details were updated.
    ItemUpdated(ItemUpdatedData),

    /// Item lifecycle status changed.
    StatusChanged(StatusChangedData),

    /// Item pricing changed in a way that moves the stock valuation.
    ValuationChanged(ValuationChangedData),

    /// Stock was reserved for an order.
    StockReserved(StockReservedData),

    /// A pending reservation was confirmed.
    ReservationConfirmed(ReservationConfirmedData),

    /// A reservation was released back to available stock.
    ReservationCancelled(ReservationCancelledData),

    /// A pending reservation lapsed past its deadline.
    ReservationExpired(ReservationExpiredData),

    /// A confirmed reservation was fulfilled and stock left the warehouse.
    StockFulfilled(StockFulfilledData),

    /// Stock level was adjusted outside the reservation flow.
    StockAdjusted(StockAdjustedData),

    /// A physical count disagreed with the recorded stock level.
    CountDiscrepancyRecorded(CountDiscrepancyData),

    /// Units physically moved in or out of the warehouse.
    StockMovementRecorded(StockMovementData),

    /// Available stock dropped to or below the low-stock threshold.
    LowStockDetected(LowStockData),

    /// Available stock dropped to or below the reorder point.
    ReorderRequired(ReorderRequiredData),

    /// A reservation attempt lost the race for the last available units.
    ReservationConflictDetected(ReservationConflictData),
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "ItemCreated",
            InventoryEvent::ItemUpdated(_) => "ItemUpdated",
            InventoryEvent::StatusChanged(_) => "StatusChanged",
            InventoryEvent::ValuationChanged(_) => "ValuationChanged",
            InventoryEvent::StockReserved(_) => "StockReserved",
            InventoryEvent::ReservationConfirmed(_) => "ReservationConfirmed",
            InventoryEvent::ReservationCancelled(_) => "ReservationCancelled",
            InventoryEvent::ReservationExpired(_) => "ReservationExpired",
            InventoryEvent::StockFulfilled(_) => "StockFulfilled",
            InventoryEvent::StockAdjusted(_) => "StockAdjusted",
            InventoryEvent::CountDiscrepancyRecorded(_) => "CountDiscrepancyRecorded",
            InventoryEvent::StockMovementRecorded(_) => "StockMovementRecorded",
            InventoryEvent::LowStockDetected(_) => "LowStockDetected",
            InventoryEvent::ReorderRequired(_) => "ReorderRequired",
            InventoryEvent::ReservationConflictDetected(_) => "ReservationConflictDetected",
        }
    }

    fn event_types() -> &'static [&'static str] {
        &[
            "ItemCreated",
            "ItemUpdated",
            "StatusChanged",
            "ValuationChanged",
            "StockReserved",
            "ReservationConfirmed",
            "ReservationCancelled",
            "ReservationExpired",
            "StockFulfilled",
            "StockAdjusted",
            "CountDiscrepancyRecorded",
            "StockMovementRecorded",
            "LowStockDetected",
            "ReorderRequired",
            "ReservationConflictDetected",
        ]
    }
}

/// Data for ItemCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCreatedData {
    /// The unique inventory item ID.
    pub item_id: AggregateId,

    /// The full initial item record.
    pub item: InventoryItem,

    /// When the item was created.
    pub created_at: DateTime<Utc>,
}

/// Data for ItemUpdated event. Only the changed fields are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUpdatedData {
    /// New unit price, if it changed.
    pub unit_price: Option<Money>,

    /// New cost price, if it changed.
    pub cost_price: Option<Money>,

    /// New low-stock threshold, if it changed.
    pub low_stock_threshold: Option<u32>,

    /// New reorder point, if it changed.
    pub reorder_point: Option<u32>,

    /// New reorder quantity, if it changed.
    pub reorder_quantity: Option<u32>,

    /// When the details were updated.
    pub updated_at: DateTime<Utc>,
}

/// Data for StatusChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    /// Status before the change.
    pub previous_status: ItemStatus,

    /// Status after the change.
    pub new_status: ItemStatus,

    /// Why the status changed.
    pub reason: String,

    /// When the status changed.
    pub changed_at: DateTime<Utc>,
}

/// Data for ValuationChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationChangedData {
    /// Unit price before the change.
    pub previous_unit_price: Money,

    /// Unit price after the change.
    pub new_unit_price: Money,

    /// Cost price before the change.
    pub previous_cost_price: Money,

    /// Cost price after the change.
    pub new_cost_price: Money,

    /// Units on hand when the prices moved.
    pub quantity_on_hand: u32,

    /// Change in total stock value at cost.
    pub valuation_impact: Money,

    /// When the valuation changed.
    pub changed_at: DateTime<Utc>,
}

/// Data for StockReserved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReservedData {
    /// The full reservation record.
    pub reservation: StockReservation,
}

/// Data for ReservationConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfirmedData {
    /// The reservation that was confirmed.
    pub reservation_id: ReservationId,

    /// The order the stock is held for.
    pub order_id: AggregateId,

    /// Units held.
    pub quantity: u32,

    /// When the reservation was confirmed.
    pub confirmed_at: DateTime<Utc>,
}

/// Data for ReservationCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCancelledData {
    /// The reservation that was released.
    pub reservation_id: ReservationId,

    /// The order the stock was held for.
    pub order_id: AggregateId,

    /// Units released back to available stock.
    pub quantity: u32,

    /// Why the reservation was released.
    pub reason: String,

    /// When the reservation was released.
    pub cancelled_at: DateTime<Utc>,
}

/// Data for ReservationExpired event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationExpiredData {
    /// The reservation that lapsed.
    pub reservation_id: ReservationId,

    /// The order the stock was held for.
    pub order_id: AggregateId,

    /// Units released back to available stock.
    pub quantity: u32,

    /// When the expiry was recorded.
    pub expired_at: DateTime<Utc>,
}

/// Data for StockFulfilled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockFulfilledData {
    /// The reservation that was fulfilled.
    pub reservation_id: ReservationId,

    /// The order the stock shipped for.
    pub order_id: AggregateId,

    /// Units shipped.
    pub quantity: u32,

    /// Unit price at reservation time.
    pub unit_price: Money,

    /// Total value of the shipped units.
    pub total_amount: Money,

    /// When the stock was fulfilled.
    pub fulfilled_at: DateTime<Utc>,
}

/// Data for StockAdjusted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustedData {
    /// The full adjustment audit record.
    pub adjustment: InventoryAdjustment,
}

/// Data for CountDiscrepancyRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountDiscrepancyData {
    /// Units the system had on record.
    pub system_quantity: u32,

    /// Units found in the physical count.
    pub counted_quantity: u32,

    /// Counted minus recorded.
    pub discrepancy: i64,

    /// Who performed the count.
    pub counted_by: String,

    /// Free-form notes from the counter.
    pub notes: Option<String>,

    /// When the count was recorded.
    pub counted_at: DateTime<Utc>,
}

/// Direction of a physical stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementDirection {
    /// Units entered the warehouse.
    Inbound,

    /// Units left the warehouse.
    Outbound,
}

/// What caused a physical stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementReference {
    /// Movement driven by an order fulfillment.
    Order(AggregateId),

    /// Movement driven by a stock adjustment.
    Adjustment(AdjustmentId),
}

/// Data for StockMovementRecorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementData {
    /// Whether units entered or left the warehouse.
    pub direction: MovementDirection,

    /// Units moved.
    pub quantity: u32,

    /// The order or adjustment that caused the movement.
    pub reference: MovementReference,

    /// When the movement was recorded.
    pub moved_at: DateTime<Utc>,
}

/// Data for LowStockDetected event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowStockData {
    /// Available units at detection time.
    pub available_quantity: u32,

    /// Threshold that was crossed.
    pub low_stock_threshold: u32,

    /// When the condition was detected.
    pub detected_at: DateTime<Utc>,
}

/// Data for ReorderRequired event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequiredData {
    /// Available units at detection time.
    pub available_quantity: u32,

    /// Reorder point that was crossed.
    pub reorder_point: u32,

    /// Suggested reorder quantity.
    pub reorder_quantity: u32,

    /// When the condition was detected.
    pub detected_at: DateTime<Utc>,
}

/// Data for ReservationConflictDetected event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConflictData {
    /// The order whose reservation attempt lost.
    pub order_id: AggregateId,

    /// Units the attempt asked for.
    pub requested: u32,

    /// Units available at the time.
    pub available: u32,

    /// Units already promised to open reservations.
    pub pending_reserved: u32,

    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,
}

// Convenience constructors for events
impl InventoryEvent {
    /// Creates an ItemCreated event.
    pub fn item_created(item_id: AggregateId, item: InventoryItem) -> Self {
        InventoryEvent::ItemCreated(ItemCreatedData {
            item_id,
            item,
            created_at: Utc::now(),
        })
    }

    /// Creates an ItemUpdated event carrying only the changed fields.
    pub fn item_updated(
        unit_price: Option<Money>,
        cost_price: Option<Money>,
        low_stock_threshold: Option<u32>,
        reorder_point: Option<u32>,
        reorder_quantity: Option<u32>,
    ) -> Self {
        InventoryEvent::ItemUpdated(ItemUpdatedData {
            unit_price,
            cost_price,
            low_stock_threshold,
            reorder_point,
            reorder_quantity,
            updated_at: Utc::now(),
        })
    }

    /// Creates a StatusChanged event.
    pub fn status_changed(
        previous_status: ItemStatus,
        new_status: ItemStatus,
        reason: impl Into<String>,
    ) -> Self {
        InventoryEvent::StatusChanged(StatusChangedData {
            previous_status,
            new_status,
            reason: reason.into(),
            changed_at: Utc::now(),
        })
    }

    /// Creates a ValuationChanged event, computing the impact at cost.
    pub fn valuation_changed(
        previous_unit_price: Money,
        new_unit_price: Money,
        previous_cost_price: Money,
        new_cost_price: Money,
        quantity_on_hand: u32,
    ) -> Self {
        let valuation_impact =
            new_cost_price.multiply(quantity_on_hand) - previous_cost_price.multiply(quantity_on_hand);
        InventoryEvent::ValuationChanged(ValuationChangedData {
            previous_unit_price,
            new_unit_price,
            previous_cost_price,
            new_cost_price,
            quantity_on_hand,
            valuation_impact,
            changed_at: Utc::now(),
        })
    }

    /// Creates a StockReserved event.
    pub fn stock_reserved(reservation: StockReservation) -> Self {
        InventoryEvent::StockReserved(StockReservedData { reservation })
    }

    /// Creates a ReservationConfirmed event.
    pub fn reservation_confirmed(reservation: &StockReservation) -> Self {
        InventoryEvent::ReservationConfirmed(ReservationConfirmedData {
            reservation_id: reservation.reservation_id,
            order_id: reservation.order_id,
            quantity: reservation.quantity,
            confirmed_at: Utc::now(),
        })
    }

    /// Creates a ReservationCancelled event.
    pub fn reservation_cancelled(reservation: &StockReservation, reason: impl Into<String>) -> Self {
        InventoryEvent::ReservationCancelled(ReservationCancelledData {
            reservation_id: reservation.reservation_id,
            order_id: reservation.order_id,
            quantity: reservation.quantity,
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }

    /// Creates a ReservationExpired event.
    pub fn reservation_expired(reservation: &StockReservation) -> Self {
        InventoryEvent::ReservationExpired(ReservationExpiredData {
            reservation_id: reservation.reservation_id,
            order_id: reservation.order_id,
            quantity: reservation.quantity,
            expired_at: Utc::now(),
        })
    }

    /// Creates a StockFulfilled event.
    pub fn stock_fulfilled(reservation: &StockReservation) -> Self {
        InventoryEvent::StockFulfilled(StockFulfilledData {
            reservation_id: reservation.reservation_id,
            order_id: reservation.order_id,
            quantity: reservation.quantity,
            unit_price: reservation.unit_price,
            total_amount: reservation.unit_price.multiply(reservation.quantity),
            fulfilled_at: Utc::now(),
        })
    }

    /// Creates a StockAdjusted event.
    pub fn stock_adjusted(adjustment: InventoryAdjustment) -> Self {
        InventoryEvent::StockAdjusted(StockAdjustedData { adjustment })
    }

    /// Creates a CountDiscrepancyRecorded event.
    pub fn count_discrepancy(
        system_quantity: u32,
        counted_quantity: u32,
        counted_by: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        InventoryEvent::CountDiscrepancyRecorded(CountDiscrepancyData {
            system_quantity,
            counted_quantity,
            discrepancy: counted_quantity as i64 - system_quantity as i64,
            counted_by: counted_by.into(),
            notes,
            counted_at: Utc::now(),
        })
    }

    /// Creates a StockMovementRecorded event.
    pub fn stock_movement(
        direction: MovementDirection,
        quantity: u32,
        reference: MovementReference,
    ) -> Self {
        InventoryEvent::StockMovementRecorded(StockMovementData {
            direction,
            quantity,
            reference,
            moved_at: Utc::now(),
        })
    }

    /// Creates a LowStockDetected event.
    pub fn low_stock_detected(available_quantity: u32, low_stock_threshold: u32) -> Self {
        InventoryEvent::LowStockDetected(LowStockData {
            available_quantity,
            low_stock_threshold,
            detected_at: Utc::now(),
        })
    }

    /// Creates a ReorderRequired event.
    pub fn reorder_required(
        available_quantity: u32,
        reorder_point: u32,
        reorder_quantity: u32,
    ) -> Self {
        InventoryEvent::ReorderRequired(ReorderRequiredData {
            available_quantity,
            reorder_point,
            reorder_quantity,
            detected_at: Utc::now(),
        })
    }

    /// Creates a ReservationConflictDetected event.
    pub fn reservation_conflict(
        order_id: AggregateId,
        requested: u32,
        available: u32,
        pending_reserved: u32,
    ) -> Self {
        InventoryEvent::ReservationConflictDetected(ReservationConflictData {
            order_id,
            requested,
            available,
            pending_reserved,
            detected_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::state::ReservationStatus;
    use crate::value_objects::{CustomerId, ProductId};

    fn reservation() -> StockReservation {
        let now = Utc::now();
        StockReservation {
            reservation_id: ReservationId::new(),
            order_id: AggregateId::new(),
            customer_id: CustomerId::new(),
            quantity: 3,
            unit_price: Money::from_cents(1200),
            status: ReservationStatus::Pending,
            reserved_at: now,
            expires_at: now + chrono::Duration::minutes(30),
        }
    }

    #[test]
    fn test_event_type_registry_covers_all_constructors() {
        let item = InventoryItem {
            product_id: ProductId::new("PROD-001"),
            variant_id: None,
            sku: "SKU-001".to_string(),
            status: Default::default(),
            total_quantity: 10,
            reserved_quantity: 0,
            unit_price: Money::from_cents(1000),
            cost_price: Money::from_cents(500),
            low_stock_threshold: 10,
            reorder_point: 5,
            reorder_quantity: 100,
        };
        let res = reservation();
        let adjustment = InventoryAdjustment {
            adjustment_id: AdjustmentId::new(),
            adjustment_type: crate::inventory::state::AdjustmentType::Manual,
            quantity_delta: -2,
            previous_quantity: 10,
            new_quantity: 8,
            reason: "damage".to_string(),
            adjusted_by: "ops".to_string(),
            adjusted_at: Utc::now(),
        };

        let events = vec![
            InventoryEvent::item_created(AggregateId::new(), item),
            InventoryEvent::item_updated(Some(Money::from_cents(1100)), None, None, None, None),
            InventoryEvent::status_changed(ItemStatus::Active, ItemStatus::OutOfStock, "sold out"),
            InventoryEvent::valuation_changed(
                Money::from_cents(1000),
                Money::from_cents(1100),
                Money::from_cents(500),
                Money::from_cents(550),
                10,
            ),
            InventoryEvent::stock_reserved(res.clone()),
            InventoryEvent::reservation_confirmed(&res),
            InventoryEvent::reservation_cancelled(&res, "order cancelled"),
            InventoryEvent::reservation_expired(&res),
            InventoryEvent::stock_fulfilled(&res),
            InventoryEvent::stock_adjusted(adjustment.clone()),
            InventoryEvent::count_discrepancy(10, 8, "ops", None),
            InventoryEvent::stock_movement(
                MovementDirection::Outbound,
                2,
                MovementReference::Adjustment(adjustment.adjustment_id),
            ),
            InventoryEvent::low_stock_detected(4, 10),
            InventoryEvent::reorder_required(4, 5, 100),
            InventoryEvent::reservation_conflict(AggregateId::new(), 5, 4, 6),
        ];

        assert_eq!(events.len(), InventoryEvent::event_types().len());
        for event in &events {
            assert!(InventoryEvent::event_types().contains(&event.event_type()));
        }
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let res = reservation();
        let event = InventoryEvent::stock_reserved(res.clone());

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StockReserved"));

        let deserialized: InventoryEvent = serde_json::from_str(&json).unwrap();
        if let InventoryEvent::StockReserved(data) = deserialized {
            assert_eq!(data.reservation.reservation_id, res.reservation_id);
            assert_eq!(data.reservation.quantity, 3);
        } else {
            panic!("Expected StockReserved event");
        }
    }

    #[test]
    fn test_valuation_impact_computed_at_cost() {
        let event = InventoryEvent::valuation_changed(
            Money::from_cents(1000),
            Money::from_cents(1200),
            Money::from_cents(500),
            Money::from_cents(600),
            10,
        );

        if let InventoryEvent::ValuationChanged(data) = event {
            assert_eq!(data.valuation_impact, Money::from_cents(1000));
        } else {
            panic!("Expected ValuationChanged event");
        }
    }

    #[test]
    fn test_count_discrepancy_sign() {
        let short = InventoryEvent::count_discrepancy(10, 7, "ops", None);
        if let InventoryEvent::CountDiscrepancyRecorded(data) = short {
            assert_eq!(data.discrepancy, -3);
        } else {
            panic!("Expected CountDiscrepancyRecorded event");
        }

        let over = InventoryEvent::count_discrepancy(10, 12, "ops", Some("found a pallet".into()));
        if let InventoryEvent::CountDiscrepancyRecorded(data) = over {
            assert_eq!(data.discrepancy, 2);
        } else {
            panic!("Expected CountDiscrepancyRecorded event");
        }
    }
}
