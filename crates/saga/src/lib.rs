//! Saga orchestration for multi-step commerce transactions.
//!
//! A saga is a persisted plan of steps with compensating actions. The
//! orchestrator runs each instance as its own supervised task: steps execute
//! sequentially with bounded in-place retries, and when a step fails for
//! good the completed steps are compensated in reverse order. Two plans are
//! defined here: order fulfillment (authorize, reserve, ship, confirm,
//! capture, notify) and order cancellation (release, refund, cancel,
//! notify).
//!
//! Instances are stored whole through a [`SagaRepository`], so a failed or
//! interrupted saga stays queryable and can be resumed with
//! [`SagaOrchestrator::retry_saga`].

pub mod collaborators;
pub mod definitions;
pub mod error;
pub mod handler;
pub mod instance;
pub mod memory;
pub mod orchestrator;
pub mod postgres;
pub mod repository;
pub mod state;
pub mod step;

pub use collaborators::{
    InMemoryNotificationService, InMemoryPaymentGateway, InMemoryShippingProvider,
    NotificationService, PaymentAuthorization, PaymentGateway, Shipment, ShippingProvider,
};
pub use definitions::{
    CancellationContext, FulfillmentContext, FulfillmentLine, ReservationRef, SagaServices,
    handler_registry,
};
pub use error::{Result, SagaError};
pub use handler::{CompensationHandler, HandlerRegistry, StepHandler};
pub use instance::{SagaId, SagaInstance, SagaKind};
pub use memory::InMemorySagaRepository;
pub use orchestrator::SagaOrchestrator;
pub use postgres::PostgresSagaRepository;
pub use repository::{SagaRepository, SagaStatistics};
pub use state::{SagaStatus, StepStatus};
pub use step::{SagaStep, StepKind};
