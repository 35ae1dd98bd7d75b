//! Application-level errors.

use common::AggregateId;
use domain::DomainError;
use saga::SagaError;
use thiserror::Error;

/// Errors surfaced by the application facade and context lifecycle.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("cart line for product {product_id} has zero quantity")]
    ZeroQuantity { product_id: String },

    #[error("order not found: {0}")]
    OrderNotFound(AggregateId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Saga(#[from] SagaError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
