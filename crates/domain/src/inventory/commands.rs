//! Inventory commands.

use chrono::Duration;
use common::AggregateId;

use crate::repository::Command;
use crate::value_objects::{CustomerId, Money, ProductId};

use super::Inventory;
use super::item::{
    DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_REORDER_POINT, DEFAULT_REORDER_QUANTITY,
    DEFAULT_RESERVATION_TTL_SECS, ReservationId,
};
use super::state::{AdjustmentType, ItemStatus};

/// Command to create a new inventory item.
#[derive(Debug, Clone)]
pub struct CreateItem {
    /// The inventory item ID to create.
    pub item_id: AggregateId,

    /// The catalog product this item stocks.
    pub product_id: ProductId,

    /// Optional variant discriminator.
    pub variant_id: Option<String>,

    /// Warehouse stock-keeping unit.
    pub sku: String,

    /// Units on hand at creation.
    pub initial_quantity: u32,

    /// Selling price per unit.
    pub unit_price: Money,

    /// Acquisition cost per unit.
    pub cost_price: Money,

    /// Low-stock alert threshold.
    pub low_stock_threshold: u32,

    /// Reorder suggestion threshold.
    pub reorder_point: u32,

    /// Quantity suggested when a reorder fires.
    pub reorder_quantity: u32,
}

impl CreateItem {
    /// Creates a new CreateItem command with a generated item ID and
    /// default thresholds.
    pub fn for_product(
        product_id: impl Into<ProductId>,
        sku: impl Into<String>,
        initial_quantity: u32,
        unit_price: Money,
        cost_price: Money,
    ) -> Self {
        Self {
            item_id: AggregateId::new(),
            product_id: product_id.into(),
            variant_id: None,
            sku: sku.into(),
            initial_quantity,
            unit_price,
            cost_price,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            reorder_point: DEFAULT_REORDER_POINT,
            reorder_quantity: DEFAULT_REORDER_QUANTITY,
        }
    }

    /// Sets the variant discriminator.
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Overrides the default stock thresholds.
    pub fn with_thresholds(
        mut self,
        low_stock_threshold: u32,
        reorder_point: u32,
        reorder_quantity: u32,
    ) -> Self {
        self.low_stock_threshold = low_stock_threshold;
        self.reorder_point = reorder_point;
        self.reorder_quantity = reorder_quantity;
        self
    }
}

impl Command for CreateItem {
    type Aggregate = Inventory;

    fn aggregate_id(&self) -> AggregateId {
        self.item_id
    }
}

/// Command to update item pricing, thresholds, or status.
///
/// Unset fields are left unchanged.
#[derive(Debug, Clone)]
pub struct UpdateItemDetails {
    /// The item to update.
    pub item_id: AggregateId,

    /// New selling price.
    pub unit_price: Option<Money>,

    /// New acquisition cost.
    pub cost_price: Option<Money>,

    /// New low-stock threshold.
    pub low_stock_threshold: Option<u32>,

    /// New reorder point.
    pub reorder_point: Option<u32>,

    /// New reorder quantity.
    pub reorder_quantity: Option<u32>,

    /// New lifecycle status.
    pub status: Option<ItemStatus>,

    /// Why the status changed, when it does.
    pub status_reason: Option<String>,
}

impl UpdateItemDetails {
    /// Creates an empty update for the given item.
    pub fn new(item_id: AggregateId) -> Self {
        Self {
            item_id,
            unit_price: None,
            cost_price: None,
            low_stock_threshold: None,
            reorder_point: None,
            reorder_quantity: None,
            status: None,
            status_reason: None,
        }
    }

    /// Sets a new selling price.
    pub fn unit_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    /// Sets a new acquisition cost.
    pub fn cost_price(mut self, cost_price: Money) -> Self {
        self.cost_price = Some(cost_price);
        self
    }

    /// Sets new stock thresholds.
    pub fn thresholds(
        mut self,
        low_stock_threshold: u32,
        reorder_point: u32,
        reorder_quantity: u32,
    ) -> Self {
        self.low_stock_threshold = Some(low_stock_threshold);
        self.reorder_point = Some(reorder_point);
        self.reorder_quantity = Some(reorder_quantity);
        self
    }

    /// Sets a new lifecycle status.
    pub fn status(mut self, status: ItemStatus, reason: impl Into<String>) -> Self {
        self.status = Some(status);
        self.status_reason = Some(reason.into());
        self
    }
}

impl Command for UpdateItemDetails {
    type Aggregate = Inventory;

    fn aggregate_id(&self) -> AggregateId {
        self.item_id
    }
}

/// Command to reserve stock for an order.
#[derive(Debug, Clone)]
pub struct ReserveStock {
    /// The item to reserve from.
    pub item_id: AggregateId,

    /// The reservation ID to assign.
    pub reservation_id: ReservationId,

    /// The order the stock is held for.
    pub order_id: AggregateId,

    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// Units to hold.
    pub quantity: u32,

    /// How long an unconfirmed hold lives.
    pub ttl: Duration,
}

impl ReserveStock {
    /// Creates a new ReserveStock command with a generated reservation ID
    /// and the default TTL.
    pub fn new(
        item_id: AggregateId,
        order_id: AggregateId,
        customer_id: CustomerId,
        quantity: u32,
    ) -> Self {
        Self {
            item_id,
            reservation_id: ReservationId::new(),
            order_id,
            customer_id,
            quantity,
            ttl: Duration::seconds(DEFAULT_RESERVATION_TTL_SECS),
        }
    }

    /// Overrides the reservation TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Command for ReserveStock {
    type Aggregate = Inventory;

    fn aggregate_id(&self) -> AggregateId {
        self.item_id
    }
}

/// Command to adjust the stock level outside the reservation flow.
#[derive(Debug, Clone)]
pub struct AdjustStock {
    /// The item to adjust.
    pub item_id: AggregateId,

    /// Why the stock level changed.
    pub adjustment_type: AdjustmentType,

    /// Signed change in units.
    pub quantity_delta: i64,

    /// Free-form justification.
    pub reason: String,

    /// Who performed the adjustment.
    pub adjusted_by: String,
}

impl AdjustStock {
    /// Creates a new AdjustStock command.
    pub fn new(
        item_id: AggregateId,
        adjustment_type: AdjustmentType,
        quantity_delta: i64,
        reason: impl Into<String>,
        adjusted_by: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            adjustment_type,
            quantity_delta,
            reason: reason.into(),
            adjusted_by: adjusted_by.into(),
        }
    }
}

impl Command for AdjustStock {
    type Aggregate = Inventory;

    fn aggregate_id(&self) -> AggregateId {
        self.item_id
    }
}

/// Command to record a physical stock count.
#[derive(Debug, Clone)]
pub struct RecordPhysicalCount {
    /// The item that was counted.
    pub item_id: AggregateId,

    /// Units found in the count.
    pub counted_quantity: u32,

    /// Who performed the count.
    pub counted_by: String,

    /// Free-form notes from the counter.
    pub notes: Option<String>,

    /// Whether to adjust the recorded level to match the count.
    pub auto_adjust: bool,
}

impl RecordPhysicalCount {
    /// Creates a new RecordPhysicalCount command.
    pub fn new(
        item_id: AggregateId,
        counted_quantity: u32,
        counted_by: impl Into<String>,
        auto_adjust: bool,
    ) -> Self {
        Self {
            item_id,
            counted_quantity,
            counted_by: counted_by.into(),
            notes: None,
            auto_adjust,
        }
    }

    /// Attaches notes to the count.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Command for RecordPhysicalCount {
    type Aggregate = Inventory;

    fn aggregate_id(&self) -> AggregateId {
        self.item_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_item_defaults() {
        let cmd = CreateItem::for_product(
            "PROD-001",
            "SKU-001",
            50,
            Money::from_cents(1000),
            Money::from_cents(600),
        );

        assert_eq!(cmd.aggregate_id(), cmd.item_id);
        assert_eq!(cmd.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(cmd.reorder_point, DEFAULT_REORDER_POINT);
        assert_eq!(cmd.reorder_quantity, DEFAULT_REORDER_QUANTITY);
        assert!(cmd.variant_id.is_none());
    }

    #[test]
    fn test_create_item_builders() {
        let cmd = CreateItem::for_product(
            "PROD-001",
            "SKU-001",
            50,
            Money::from_cents(1000),
            Money::from_cents(600),
        )
        .with_variant("blue/medium")
        .with_thresholds(20, 10, 200);

        assert_eq!(cmd.variant_id.as_deref(), Some("blue/medium"));
        assert_eq!(cmd.low_stock_threshold, 20);
        assert_eq!(cmd.reorder_point, 10);
        assert_eq!(cmd.reorder_quantity, 200);
    }

    #[test]
    fn test_update_details_builder() {
        let item_id = AggregateId::new();
        let cmd = UpdateItemDetails::new(item_id)
            .unit_price(Money::from_cents(1200))
            .status(ItemStatus::Inactive, "seasonal");

        assert_eq!(cmd.aggregate_id(), item_id);
        assert_eq!(cmd.unit_price, Some(Money::from_cents(1200)));
        assert!(cmd.cost_price.is_none());
        assert_eq!(cmd.status, Some(ItemStatus::Inactive));
        assert_eq!(cmd.status_reason.as_deref(), Some("seasonal"));
    }

    #[test]
    fn test_reserve_stock_defaults() {
        let item_id = AggregateId::new();
        let order_id = AggregateId::new();
        let cmd = ReserveStock::new(item_id, order_id, CustomerId::new(), 3);

        assert_eq!(cmd.aggregate_id(), item_id);
        assert_eq!(cmd.ttl, Duration::seconds(DEFAULT_RESERVATION_TTL_SECS));

        let shorter = cmd.with_ttl(Duration::minutes(5));
        assert_eq!(shorter.ttl, Duration::minutes(5));
    }

    #[test]
    fn test_physical_count_command() {
        let item_id = AggregateId::new();
        let cmd = RecordPhysicalCount::new(item_id, 47, "ops", true).with_notes("aisle 3");

        assert_eq!(cmd.aggregate_id(), item_id);
        assert_eq!(cmd.counted_quantity, 47);
        assert!(cmd.auto_adjust);
        assert_eq!(cmd.notes.as_deref(), Some("aisle 3"));
    }
}
