//! Saga error types.

use domain::DomainError;
use thiserror::Error;

use crate::instance::SagaId;
use crate::state::SagaStatus;
use crate::step::StepKind;

/// Errors that can occur while running or managing sagas.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A step exhausted its retries and failed for good.
    #[error("Saga step '{step}' failed: {reason}")]
    StepFailed { step: StepKind, reason: String },

    /// A compensation failed while rolling back.
    #[error("Compensation for step '{step}' failed: {reason}")]
    CompensationFailed { step: StepKind, reason: String },

    /// No handler is registered for a step kind in the plan.
    #[error("No handler registered for step '{0}'")]
    UnknownHandler(StepKind),

    /// Saga is in the wrong status for the requested operation.
    #[error("Invalid saga status: expected {expected}, actual {actual}")]
    InvalidStatus { expected: String, actual: SagaStatus },

    /// Saga not found in the repository.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// Saga is not in a retryable status.
    #[error("Saga in status {0} cannot be retried")]
    NotRetryable(SagaStatus),

    /// Repository failure while persisting or loading a saga.
    #[error("Saga repository error: {0}")]
    Repository(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Domain error surfaced by a step handler.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payment gateway failure.
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    /// Shipping provider failure.
    #[error("Shipping provider error: {0}")]
    ShippingProvider(String),

    /// Notification delivery failure.
    #[error("Notification error: {0}")]
    Notification(String),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
