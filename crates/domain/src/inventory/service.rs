//! Inventory service providing a simplified API for stock operations.

use std::time::Duration;

use common::AggregateId;
use event_store::{EventQuery, EventStore};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::repository::{AggregateRepository, CommandResult};

use super::{
    AdjustStock, CreateItem, Inventory, InventoryError, InventoryEvent, RecordPhysicalCount,
    ReservationId, ReserveStock, UpdateItemDetails,
};

impl From<super::InventoryError> for DomainError {
    fn from(e: super::InventoryError) -> Self {
        DomainError::Inventory(e)
    }
}

/// How many times a command runs before a concurrency conflict is
/// surfaced to the caller.
const MAX_CONFLICT_ATTEMPTS: u32 = 3;

/// Base backoff between conflict retries, scaled by the attempt number.
const CONFLICT_BACKOFF: Duration = Duration::from_millis(100);

/// Service for managing inventory items.
///
/// Provides a high-level API for stock operations, wrapping the aggregate
/// repository and retrying transparently when a command loses an
/// optimistic concurrency race.
pub struct InventoryService<S: EventStore> {
    repository: AggregateRepository<S, Inventory>,
}

impl<S: EventStore> InventoryService<S> {
    /// Creates a new inventory service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            repository: AggregateRepository::new(store),
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &AggregateRepository<S, Inventory> {
        &self.repository
    }

    /// Creates a new inventory item.
    ///
    /// The SKU must not be carried by any existing item.
    #[tracing::instrument(skip(self))]
    pub async fn create_item(
        &self,
        cmd: CreateItem,
    ) -> Result<CommandResult<Inventory>, DomainError> {
        self.ensure_unique_sku(&cmd.sku).await?;

        let item_id = cmd.item_id;
        self.execute_with_retry(item_id, move |inventory| inventory.create(&cmd))
            .await
    }

    /// Updates pricing, thresholds, or status of an item.
    #[tracing::instrument(skip(self))]
    pub async fn update_details(
        &self,
        cmd: UpdateItemDetails,
    ) -> Result<CommandResult<Inventory>, DomainError> {
        let item_id = cmd.item_id;
        self.execute_with_retry(item_id, move |inventory| inventory.update_details(&cmd))
            .await
    }

    /// Reserves stock for an order and returns the reservation ID.
    ///
    /// When the reservation loses the race against other open holds, the
    /// conflict is recorded as an audit event on the item's stream and the
    /// caller sees an insufficient-stock rejection.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_stock(&self, cmd: ReserveStock) -> Result<ReservationId, DomainError> {
        let item_id = cmd.item_id;
        let order_id = cmd.order_id;
        let reservation_id = cmd.reservation_id;

        let reserve = cmd.clone();
        match self
            .execute_with_retry(item_id, move |inventory| inventory.reserve_stock(&reserve))
            .await
        {
            Ok(_) => Ok(reservation_id),
            Err(DomainError::Inventory(InventoryError::ReservationConflict {
                requested,
                available,
                pending_reserved,
            })) => {
                tracing::warn!(
                    %item_id,
                    %order_id,
                    requested,
                    available,
                    pending_reserved,
                    "reservation lost the race against open holds"
                );
                self.execute_with_retry(item_id, move |inventory| {
                    inventory.record_reservation_conflict(
                        order_id,
                        requested,
                        available,
                        pending_reserved,
                    )
                })
                .await?;
                Err(InventoryError::InsufficientStock {
                    requested,
                    available,
                }
                .into())
            }
            Err(err) => Err(err),
        }
    }

    /// Confirms a pending reservation.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_reservation(
        &self,
        item_id: AggregateId,
        reservation_id: ReservationId,
    ) -> Result<CommandResult<Inventory>, DomainError> {
        self.execute_with_retry(item_id, move |inventory| {
            inventory.confirm_reservation(reservation_id)
        })
        .await
    }

    /// Cancels a reservation, releasing its stock.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_reservation(
        &self,
        item_id: AggregateId,
        reservation_id: ReservationId,
        reason: impl Into<String>,
    ) -> Result<CommandResult<Inventory>, DomainError> {
        let reason = reason.into();
        self.execute_with_retry(item_id, move |inventory| {
            inventory.cancel_reservation(reservation_id, reason.clone())
        })
        .await
    }

    /// Fulfills a confirmed reservation, shipping the stock out.
    #[tracing::instrument(skip(self))]
    pub async fn fulfill_reservation(
        &self,
        item_id: AggregateId,
        reservation_id: ReservationId,
    ) -> Result<CommandResult<Inventory>, DomainError> {
        self.execute_with_retry(item_id, move |inventory| {
            inventory.fulfill_reservation(reservation_id)
        })
        .await
    }

    /// Adjusts the stock level outside the reservation flow.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        cmd: AdjustStock,
    ) -> Result<CommandResult<Inventory>, DomainError> {
        let item_id = cmd.item_id;
        self.execute_with_retry(item_id, move |inventory| inventory.adjust_stock(&cmd))
            .await
    }

    /// Records a physical count, optionally reconciling the recorded level.
    #[tracing::instrument(skip(self))]
    pub async fn record_physical_count(
        &self,
        cmd: RecordPhysicalCount,
    ) -> Result<CommandResult<Inventory>, DomainError> {
        let item_id = cmd.item_id;
        self.execute_with_retry(item_id, move |inventory| {
            inventory.record_physical_count(&cmd)
        })
        .await
    }

    /// Expires overdue reservations across up to `limit` items.
    ///
    /// Returns the number of reservations expired. Intended to be driven
    /// by a periodic sweep.
    #[tracing::instrument(skip(self))]
    pub async fn expire_due_reservations(&self, limit: usize) -> Result<usize, DomainError> {
        let item_ids = self.known_item_ids(limit).await?;
        let now = chrono::Utc::now();

        let mut expired = 0;
        for item_id in item_ids {
            let result = self
                .execute_with_retry(item_id, move |inventory| inventory.expire_reservations(now))
                .await?;
            expired += result
                .events
                .iter()
                .filter(|event| matches!(event, InventoryEvent::ReservationExpired(_)))
                .count();
        }

        if expired > 0 {
            tracing::info!(expired, "released overdue reservations");
        }
        Ok(expired)
    }

    /// Returns every item whose available stock is at or below its
    /// low-stock threshold.
    #[tracing::instrument(skip(self))]
    pub async fn low_stock_items(&self) -> Result<Vec<Inventory>, DomainError> {
        let item_ids = self.known_item_ids(usize::MAX).await?;

        let mut items = Vec::new();
        for item_id in item_ids {
            if let Some(root) = self.repository.load_existing(item_id).await?
                && root.is_low_stock()
            {
                items.push(root.state().clone());
            }
        }
        Ok(items)
    }

    /// Loads an item by ID.
    ///
    /// Returns None if the item doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, item_id: AggregateId) -> Result<Option<Inventory>, DomainError> {
        Ok(self
            .repository
            .load_existing(item_id)
            .await?
            .map(|root| root.state().clone()))
    }

    /// Runs a command, retrying when it loses an optimistic concurrency
    /// race against a concurrent writer.
    async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<Inventory>, DomainError>
    where
        F: Fn(&Inventory) -> Result<Vec<InventoryEvent>, InventoryError>,
    {
        let mut attempt: u32 = 1;
        loop {
            match self
                .repository
                .execute(aggregate_id, None, &command_fn)
                .await
            {
                Err(err) if err.is_concurrency_conflict() && attempt < MAX_CONFLICT_ATTEMPTS => {
                    metrics::counter!("concurrency_conflicts_total").increment(1);
                    tracing::warn!(
                        %aggregate_id,
                        attempt,
                        "inventory command hit a concurrency conflict, retrying"
                    );
                    tokio::time::sleep(CONFLICT_BACKOFF * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Rejects item creation when the SKU is already in use.
    async fn ensure_unique_sku(&self, sku: &str) -> Result<(), DomainError> {
        let query = EventQuery::for_event_type("ItemCreated")
            .aggregate_type(Inventory::aggregate_type());
        let envelopes = self.repository.store().query_events(query).await?;

        for envelope in envelopes {
            let event: InventoryEvent = serde_json::from_value(envelope.payload)?;
            if let InventoryEvent::ItemCreated(data) = event
                && data.item.sku == sku
            {
                return Err(InventoryError::DuplicateSku {
                    sku: sku.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Enumerates up to `limit` created inventory item IDs.
    async fn known_item_ids(&self, limit: usize) -> Result<Vec<AggregateId>, DomainError> {
        let query = EventQuery::for_event_type("ItemCreated")
            .aggregate_type(Inventory::aggregate_type());
        let envelopes = self.repository.store().query_events(query).await?;

        let mut ids: Vec<AggregateId> = Vec::new();
        for envelope in envelopes {
            if ids.len() >= limit {
                break;
            }
            if !ids.contains(&envelope.aggregate_id) {
                ids.push(envelope.aggregate_id);
            }
        }
        Ok(ids)
    }
}
