//! Inventory aggregate implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{
    InventoryError, InventoryEvent,
    commands::{AdjustStock, CreateItem, RecordPhysicalCount, ReserveStock, UpdateItemDetails},
    events::{
        ItemCreatedData, ItemUpdatedData, MovementDirection, MovementReference,
        ReservationCancelledData, ReservationConfirmedData, ReservationExpiredData,
        StatusChangedData, StockAdjustedData, StockFulfilledData, StockReservedData,
    },
    item::{AdjustmentId, InventoryAdjustment, InventoryItem, ReservationId, StockReservation},
    state::{AdjustmentType, ItemStatus, ReservationStatus},
};

/// Inventory aggregate root.
///
/// Tracks one stocked item together with the reservations held against it
/// and the audit trail of stock adjustments.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Unique inventory item identifier.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    version: Version,

    /// The stocked item, once created.
    item: Option<InventoryItem>,

    /// All reservations ever taken, keyed by reservation ID. Terminal
    /// reservations stay in the map for audit; fulfilled ones are removed.
    /// BTreeMap keeps expiry sweeps in a stable order across replays.
    reservations: BTreeMap<ReservationId, StockReservation>,

    /// Audit trail of stock adjustments, oldest first.
    adjustments: Vec<InventoryAdjustment>,
}

impl Aggregate for Inventory {
    type Event = InventoryEvent;
    type Error = InventoryError;

    fn aggregate_type() -> &'static str {
        "Inventory"
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
            InventoryEvent::ItemCreated(data) => self.apply_item_created(data),
            InventoryEvent::ItemUpdated(data) => self.apply_item_updated(data),
            InventoryEvent::StatusChanged(data) => self.apply_status_changed(data),
            InventoryEvent::ValuationChanged(_) => {
                // Audit only; prices move via ItemUpdated.
            }
            InventoryEvent::StockReserved(data) => self.apply_stock_reserved(data),
            InventoryEvent::ReservationConfirmed(data) => self.apply_reservation_confirmed(data),
            InventoryEvent::ReservationCancelled(data) => self.apply_reservation_cancelled(data),
            InventoryEvent::ReservationExpired(data) => self.apply_reservation_expired(data),
            InventoryEvent::StockFulfilled(data) => self.apply_stock_fulfilled(data),
            InventoryEvent::StockAdjusted(data) => self.apply_stock_adjusted(data),
            InventoryEvent::CountDiscrepancyRecorded(_)
            | InventoryEvent::StockMovementRecorded(_)
            | InventoryEvent::LowStockDetected(_)
            | InventoryEvent::ReorderRequired(_)
            | InventoryEvent::ReservationConflictDetected(_) => {
                // Audit only.
            }
        }
    }
}

// Query methods
impl Inventory {
    /// Returns the stocked item, if created.
    pub fn item(&self) -> Option<&InventoryItem> {
        self.item.as_ref()
    }

    /// Returns the item's lifecycle status, if created.
    pub fn status(&self) -> Option<ItemStatus> {
        self.item.as_ref().map(|item| item.status)
    }

    /// Units physically on hand.
    pub fn total_quantity(&self) -> u32 {
        self.item.as_ref().map_or(0, |item| item.total_quantity)
    }

    /// Units promised to open reservations.
    pub fn reserved_quantity(&self) -> u32 {
        self.item.as_ref().map_or(0, |item| item.reserved_quantity)
    }

    /// Units that can still be promised.
    pub fn available_quantity(&self) -> u32 {
        self.item.as_ref().map_or(0, |item| item.available_quantity())
    }

    /// Returns a reservation by ID.
    pub fn reservation(&self, reservation_id: ReservationId) -> Option<&StockReservation> {
        self.reservations.get(&reservation_id)
    }

    /// Returns all reservations, including terminal ones.
    pub fn reservations(&self) -> impl Iterator<Item = &StockReservation> {
        self.reservations.values()
    }

    /// Returns the reservations that currently hold stock.
    pub fn open_reservations(&self) -> impl Iterator<Item = &StockReservation> {
        self.reservations
            .values()
            .filter(|res| res.status.holds_stock())
    }

    /// Sum of quantities held by PENDING and CONFIRMED reservations.
    pub fn open_reserved_total(&self) -> u32 {
        self.open_reservations().map(|res| res.quantity).sum()
    }

    /// Returns true if any PENDING reservation is past its deadline.
    pub fn has_expired_reservations(&self, now: DateTime<Utc>) -> bool {
        self.reservations.values().any(|res| res.is_expired(now))
    }

    /// Returns the adjustment audit trail, oldest first.
    pub fn adjustments(&self) -> &[InventoryAdjustment] {
        &self.adjustments
    }

    /// Returns true if available stock is at or below the low-stock threshold.
    pub fn is_low_stock(&self) -> bool {
        self.item.as_ref().is_some_and(|item| item.is_low_stock())
    }
}

// Command methods (return events)
impl Inventory {
    /// Creates the inventory item.
    pub fn create(&self, cmd: &CreateItem) -> Result<Vec<InventoryEvent>, InventoryError> {
        if self.id.is_some() {
            return Err(InventoryError::AlreadyCreated);
        }

        if cmd.sku.trim().is_empty() {
            return Err(InventoryError::SkuRequired);
        }

        if !cmd.unit_price.is_positive() {
            return Err(InventoryError::InvalidPrice {
                price: cmd.unit_price.cents(),
            });
        }

        if cmd.cost_price.is_negative() {
            return Err(InventoryError::InvalidPrice {
                price: cmd.cost_price.cents(),
            });
        }

        let item = InventoryItem {
            product_id: cmd.product_id.clone(),
            variant_id: cmd.variant_id.clone(),
            sku: cmd.sku.clone(),
            status: ItemStatus::Active,
            total_quantity: cmd.initial_quantity,
            reserved_quantity: 0,
            unit_price: cmd.unit_price,
            cost_price: cmd.cost_price,
            low_stock_threshold: cmd.low_stock_threshold,
            reorder_point: cmd.reorder_point,
            reorder_quantity: cmd.reorder_quantity,
        };

        let mut events = vec![InventoryEvent::item_created(cmd.item_id, item.clone())];
        events.extend(Self::stock_level_events(&item));
        Ok(events)
    }

    /// Updates pricing, thresholds, or status.
    ///
    /// Emits only what actually changed; a fully redundant update
    /// produces no events.
    pub fn update_details(
        &self,
        cmd: &UpdateItemDetails,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        let item = self.item.as_ref().ok_or(InventoryError::NotCreated)?;

        if let Some(price) = cmd.unit_price
            && !price.is_positive()
        {
            return Err(InventoryError::InvalidPrice {
                price: price.cents(),
            });
        }
        if let Some(price) = cmd.cost_price
            && price.is_negative()
        {
            return Err(InventoryError::InvalidPrice {
                price: price.cents(),
            });
        }

        let unit_price = cmd.unit_price.filter(|price| *price != item.unit_price);
        let cost_price = cmd.cost_price.filter(|price| *price != item.cost_price);
        let low_stock_threshold = cmd
            .low_stock_threshold
            .filter(|threshold| *threshold != item.low_stock_threshold);
        let reorder_point = cmd
            .reorder_point
            .filter(|point| *point != item.reorder_point);
        let reorder_quantity = cmd
            .reorder_quantity
            .filter(|quantity| *quantity != item.reorder_quantity);

        let mut events = Vec::new();

        if unit_price.is_some()
            || cost_price.is_some()
            || low_stock_threshold.is_some()
            || reorder_point.is_some()
            || reorder_quantity.is_some()
        {
            events.push(InventoryEvent::item_updated(
                unit_price,
                cost_price,
                low_stock_threshold,
                reorder_point,
                reorder_quantity,
            ));
        }

        if unit_price.is_some() || cost_price.is_some() {
            events.push(InventoryEvent::valuation_changed(
                item.unit_price,
                unit_price.unwrap_or(item.unit_price),
                item.cost_price,
                cost_price.unwrap_or(item.cost_price),
                item.total_quantity,
            ));
        }

        if let Some(status) = cmd.status
            && status != item.status
        {
            let reason = cmd
                .status_reason
                .clone()
                .unwrap_or_else(|| "details update".to_string());
            events.push(InventoryEvent::status_changed(item.status, status, reason));
        }

        Ok(events)
    }

    /// Reserves stock for an order.
    ///
    /// Performs two checks: the quantity must fit in available stock, and
    /// the sum of all open reservation quantities plus the new one must
    /// also fit. The second is the authoritative guard against reservations
    /// racing for the same units; losing it is reported as a conflict so
    /// the service layer can record it before surfacing the rejection.
    pub fn reserve_stock(&self, cmd: &ReserveStock) -> Result<Vec<InventoryEvent>, InventoryError> {
        let item = self.item.as_ref().ok_or(InventoryError::NotCreated)?;

        if cmd.quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                quantity: cmd.quantity,
            });
        }

        if !item.status.is_active() {
            return Err(InventoryError::ItemNotActive {
                status: item.status,
            });
        }

        let available = item.available_quantity();
        if cmd.quantity > available {
            return Err(InventoryError::InsufficientStock {
                requested: cmd.quantity,
                available,
            });
        }

        let pending_reserved = self.open_reserved_total();
        if pending_reserved + cmd.quantity > available {
            return Err(InventoryError::ReservationConflict {
                requested: cmd.quantity,
                available,
                pending_reserved,
            });
        }

        let now = Utc::now();
        let reservation = StockReservation {
            reservation_id: cmd.reservation_id,
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            quantity: cmd.quantity,
            unit_price: item.unit_price,
            status: ReservationStatus::Pending,
            reserved_at: now,
            expires_at: now + cmd.ttl,
        };

        let mut projected = item.clone();
        projected.reserved_quantity += cmd.quantity;

        let mut events = vec![InventoryEvent::stock_reserved(reservation)];
        events.extend(Self::stock_level_events(&projected));
        Ok(events)
    }

    /// Confirms a pending reservation, exempting it from expiry.
    pub fn confirm_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        self.item.as_ref().ok_or(InventoryError::NotCreated)?;
        let reservation = self.require_reservation(reservation_id)?;

        if !reservation.status.can_confirm() {
            return Err(InventoryError::InvalidReservationState {
                reservation_id,
                status: reservation.status,
            });
        }

        Ok(vec![InventoryEvent::reservation_confirmed(reservation)])
    }

    /// Releases a reservation back to available stock.
    pub fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
        reason: impl Into<String>,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        let item = self.item.as_ref().ok_or(InventoryError::NotCreated)?;
        let reservation = self.require_reservation(reservation_id)?;

        if !reservation.status.can_cancel() {
            return Err(InventoryError::InvalidReservationState {
                reservation_id,
                status: reservation.status,
            });
        }

        let mut projected = item.clone();
        projected.reserved_quantity = projected.reserved_quantity.saturating_sub(reservation.quantity);

        let mut events = vec![InventoryEvent::reservation_cancelled(reservation, reason)];
        events.extend(Self::stock_level_events(&projected));
        Ok(events)
    }

    /// Fulfills a confirmed reservation: the units leave the warehouse.
    pub fn fulfill_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        let item = self.item.as_ref().ok_or(InventoryError::NotCreated)?;
        let reservation = self.require_reservation(reservation_id)?;

        if !reservation.status.can_fulfill() {
            return Err(InventoryError::InvalidReservationState {
                reservation_id,
                status: reservation.status,
            });
        }

        let mut projected = item.clone();
        projected.total_quantity = projected.total_quantity.saturating_sub(reservation.quantity);
        projected.reserved_quantity = projected.reserved_quantity.saturating_sub(reservation.quantity);

        let mut events = vec![
            InventoryEvent::stock_fulfilled(reservation),
            InventoryEvent::stock_movement(
                MovementDirection::Outbound,
                reservation.quantity,
                MovementReference::Order(reservation.order_id),
            ),
        ];

        if projected.total_quantity == 0 && item.status != ItemStatus::OutOfStock {
            events.push(InventoryEvent::status_changed(
                item.status,
                ItemStatus::OutOfStock,
                "stock depleted",
            ));
        }

        events.extend(Self::stock_level_events(&projected));
        Ok(events)
    }

    /// Adjusts the stock level outside the reservation flow.
    pub fn adjust_stock(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, InventoryError> {
        let item = self.item.as_ref().ok_or(InventoryError::NotCreated)?;

        if cmd.quantity_delta == 0 {
            return Ok(vec![]);
        }

        let new_total = item.total_quantity as i64 + cmd.quantity_delta;
        if new_total < 0 {
            return Err(InventoryError::AdjustmentBelowZero { new_total });
        }
        if new_total < item.reserved_quantity as i64 {
            return Err(InventoryError::AdjustmentBelowReserved {
                new_total,
                reserved: item.reserved_quantity,
            });
        }

        let adjustment = InventoryAdjustment {
            adjustment_id: AdjustmentId::new(),
            adjustment_type: cmd.adjustment_type,
            quantity_delta: cmd.quantity_delta,
            previous_quantity: item.total_quantity,
            new_quantity: new_total as u32,
            reason: cmd.reason.clone(),
            adjusted_by: cmd.adjusted_by.clone(),
            adjusted_at: Utc::now(),
        };

        let direction = if cmd.quantity_delta > 0 {
            MovementDirection::Inbound
        } else {
            MovementDirection::Outbound
        };

        let mut events = vec![
            InventoryEvent::stock_adjusted(adjustment.clone()),
            InventoryEvent::stock_movement(
                direction,
                cmd.quantity_delta.unsigned_abs() as u32,
                MovementReference::Adjustment(adjustment.adjustment_id),
            ),
        ];

        if new_total == 0 && item.status != ItemStatus::OutOfStock {
            events.push(InventoryEvent::status_changed(
                item.status,
                ItemStatus::OutOfStock,
                "stock depleted",
            ));
        } else if new_total > 0 && item.status == ItemStatus::OutOfStock {
            events.push(InventoryEvent::status_changed(
                item.status,
                ItemStatus::Active,
                "stock replenished",
            ));
        }

        let mut projected = item.clone();
        projected.total_quantity = new_total as u32;
        events.extend(Self::stock_level_events(&projected));
        Ok(events)
    }

    /// Records a physical count and optionally reconciles the recorded
    /// level to match it.
    pub fn record_physical_count(
        &self,
        cmd: &RecordPhysicalCount,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        let item = self.item.as_ref().ok_or(InventoryError::NotCreated)?;

        let discrepancy = cmd.counted_quantity as i64 - item.total_quantity as i64;

        let mut events = vec![InventoryEvent::count_discrepancy(
            item.total_quantity,
            cmd.counted_quantity,
            cmd.counted_by.clone(),
            cmd.notes.clone(),
        )];

        if cmd.auto_adjust && discrepancy != 0 {
            let adjust = AdjustStock::new(
                cmd.item_id,
                AdjustmentType::Recount,
                discrepancy,
                "physical count reconciliation",
                cmd.counted_by.clone(),
            );
            events.extend(self.adjust_stock(&adjust)?);
        }

        Ok(events)
    }

    /// Expires every PENDING reservation whose deadline has passed.
    ///
    /// Already-expired reservations are skipped, so re-running a sweep
    /// over the same instant produces no events.
    pub fn expire_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        let item = self.item.as_ref().ok_or(InventoryError::NotCreated)?;

        let expired: Vec<&StockReservation> = self
            .reservations
            .values()
            .filter(|res| res.is_expired(now))
            .collect();

        if expired.is_empty() {
            return Ok(vec![]);
        }

        let released: u32 = expired.iter().map(|res| res.quantity).sum();
        let mut projected = item.clone();
        projected.reserved_quantity = projected.reserved_quantity.saturating_sub(released);

        let mut events: Vec<InventoryEvent> = expired
            .into_iter()
            .map(InventoryEvent::reservation_expired)
            .collect();
        events.extend(Self::stock_level_events(&projected));
        Ok(events)
    }

    /// Records that a reservation attempt lost the authoritative race
    /// check. Used by the service layer on the conflict rejection path.
    pub fn record_reservation_conflict(
        &self,
        order_id: AggregateId,
        requested: u32,
        available: u32,
        pending_reserved: u32,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        self.item.as_ref().ok_or(InventoryError::NotCreated)?;

        Ok(vec![InventoryEvent::reservation_conflict(
            order_id,
            requested,
            available,
            pending_reserved,
        )])
    }

    fn require_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<&StockReservation, InventoryError> {
        self.reservations
            .get(&reservation_id)
            .ok_or(InventoryError::ReservationNotFound { reservation_id })
    }

    /// Low-stock and reorder alerts for the given (projected) item state.
    /// Re-emitted on every qualifying mutation; consumers must dedup.
    fn stock_level_events(item: &InventoryItem) -> Vec<InventoryEvent> {
        let mut events = Vec::new();
        if item.is_low_stock() {
            events.push(InventoryEvent::low_stock_detected(
                item.available_quantity(),
                item.low_stock_threshold,
            ));
        }
        if item.needs_reorder() {
            events.push(InventoryEvent::reorder_required(
                item.available_quantity(),
                item.reorder_point,
                item.reorder_quantity,
            ));
        }
        events
    }
}

// Apply event helpers
impl Inventory {
    fn apply_item_created(&mut self, data: ItemCreatedData) {
        self.id = Some(data.item_id);
        self.item = Some(data.item);
    }

    fn apply_item_updated(&mut self, data: ItemUpdatedData) {
        if let Some(item) = self.item.as_mut() {
            if let Some(unit_price) = data.unit_price {
                item.unit_price = unit_price;
            }
            if let Some(cost_price) = data.cost_price {
                item.cost_price = cost_price;
            }
            if let Some(low_stock_threshold) = data.low_stock_threshold {
                item.low_stock_threshold = low_stock_threshold;
            }
            if let Some(reorder_point) = data.reorder_point {
                item.reorder_point = reorder_point;
            }
            if let Some(reorder_quantity) = data.reorder_quantity {
                item.reorder_quantity = reorder_quantity;
            }
        }
    }

    fn apply_status_changed(&mut self, data: StatusChangedData) {
        if let Some(item) = self.item.as_mut() {
            item.status = data.new_status;
        }
    }

    fn apply_stock_reserved(&mut self, data: StockReservedData) {
        if let Some(item) = self.item.as_mut() {
            item.reserved_quantity += data.reservation.quantity;
        }
        self.reservations
            .insert(data.reservation.reservation_id, data.reservation);
    }

    fn apply_reservation_confirmed(&mut self, data: ReservationConfirmedData) {
        if let Some(reservation) = self.reservations.get_mut(&data.reservation_id) {
            reservation.status = ReservationStatus::Confirmed;
        }
    }

    fn apply_reservation_cancelled(&mut self, data: ReservationCancelledData) {
        if let Some(reservation) = self.reservations.get_mut(&data.reservation_id) {
            reservation.status = ReservationStatus::Cancelled;
        }
        if let Some(item) = self.item.as_mut() {
            item.reserved_quantity = item.reserved_quantity.saturating_sub(data.quantity);
        }
    }

    fn apply_reservation_expired(&mut self, data: ReservationExpiredData) {
        if let Some(reservation) = self.reservations.get_mut(&data.reservation_id) {
            reservation.status = ReservationStatus::Expired;
        }
        if let Some(item) = self.item.as_mut() {
            item.reserved_quantity = item.reserved_quantity.saturating_sub(data.quantity);
        }
    }

    fn apply_stock_fulfilled(&mut self, data: StockFulfilledData) {
        self.reservations.remove(&data.reservation_id);
        if let Some(item) = self.item.as_mut() {
            item.reserved_quantity = item.reserved_quantity.saturating_sub(data.quantity);
            item.total_quantity = item.total_quantity.saturating_sub(data.quantity);
        }
    }

    fn apply_stock_adjusted(&mut self, data: StockAdjustedData) {
        if let Some(item) = self.item.as_mut() {
            item.total_quantity = data.adjustment.new_quantity;
        }
        self.adjustments.push(data.adjustment);
    }
}
