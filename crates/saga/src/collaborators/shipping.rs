//! Shipping provider trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;

use crate::error::SagaError;

/// Result of a successful shipment creation.
#[derive(Debug, Clone)]
pub struct Shipment {
    /// The tracking number assigned by the provider.
    pub tracking_number: String,
}

/// Trait for shipping operations.
#[async_trait]
pub trait ShippingProvider: Send + Sync {
    /// Creates a shipment for an order.
    async fn create_shipment(&self, order_id: AggregateId) -> Result<Shipment, SagaError>;

    /// Cancels a previously created shipment.
    async fn cancel_shipment(&self, tracking_number: &str) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryShippingState {
    shipments: HashMap<String, AggregateId>,
    next_id: u32,
    fail_on_create: bool,
    create_failures_remaining: u32,
}

/// In-memory shipping provider for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShippingProvider {
    state: Arc<RwLock<InMemoryShippingState>>,
}

impl InMemoryShippingProvider {
    /// Creates a new in-memory shipping provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the provider to fail every create_shipment call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Configures the provider to fail the next `count` create calls, then
    /// succeed again.
    pub fn fail_next_creates(&self, count: u32) {
        self.state.write().unwrap().create_failures_remaining = count;
    }

    /// Returns the number of active shipments.
    pub fn shipment_count(&self) -> usize {
        self.state.read().unwrap().shipments.len()
    }

    /// Returns true if a shipment exists with the given tracking number.
    pub fn has_shipment(&self, tracking_number: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .shipments
            .contains_key(tracking_number)
    }
}

#[async_trait]
impl ShippingProvider for InMemoryShippingProvider {
    async fn create_shipment(&self, order_id: AggregateId) -> Result<Shipment, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.create_failures_remaining > 0 {
            state.create_failures_remaining -= 1;
            return Err(SagaError::ShippingProvider(
                "Carrier temporarily unavailable".to_string(),
            ));
        }
        if state.fail_on_create {
            return Err(SagaError::ShippingProvider(
                "Shipping unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let tracking_number = format!("TRACK-{:04}", state.next_id);
        state.shipments.insert(tracking_number.clone(), order_id);

        Ok(Shipment { tracking_number })
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        state.shipments.remove(tracking_number);
        Ok(())
    }
}
