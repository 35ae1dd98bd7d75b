//! Composition root for the event-sourced commerce system.
//!
//! Wires the event store, domain services, saga orchestrator, and external
//! collaborators into one [`AppContext`] with an explicit lifecycle, and
//! exposes the order-facing facade: place an order from a cart, cancel an
//! order, approve a pending cancellation.

pub mod config;
pub mod context;
pub mod error;
pub mod facade;
pub mod telemetry;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::AppError;
pub use facade::{CancellationReceipt, CartLine, OrderPlacement};
pub use telemetry::init_telemetry;
