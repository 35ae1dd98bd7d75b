//! Saga step model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::StepStatus;

/// The known step kinds across all saga plans.
///
/// Handlers are registered per kind; the plans in
/// [`SagaKind`](crate::instance::SagaKind) decide order and retry budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    // Fulfillment
    AuthorizePayment,
    ReserveInventory,
    CreateShipment,
    ConfirmOrder,
    CapturePayment,
    SendConfirmation,

    // Cancellation
    ReleaseInventory,
    InitiateRefund,
    UpdateOrderStatus,
    SendCancellationNotice,
}

impl StepKind {
    /// Returns the kind name as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::AuthorizePayment => "authorize_payment",
            StepKind::ReserveInventory => "reserve_inventory",
            StepKind::CreateShipment => "create_shipment",
            StepKind::ConfirmOrder => "confirm_order",
            StepKind::CapturePayment => "capture_payment",
            StepKind::SendConfirmation => "send_confirmation",
            StepKind::ReleaseInventory => "release_inventory",
            StepKind::InitiateRefund => "initiate_refund",
            StepKind::UpdateOrderStatus => "update_order_status",
            StepKind::SendCancellationNotice => "send_cancellation_notice",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of a saga plan.
///
/// Pure data; the orchestrator drives the transitions and persists the
/// owning instance after each one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStep {
    /// Unique step identifier.
    pub step_id: Uuid,

    /// Human-readable step name.
    pub name: String,

    /// Which handler runs this step.
    pub kind: StepKind,

    /// Current status.
    pub status: StepStatus,

    /// Input passed to the handler.
    pub input: serde_json::Value,

    /// Output recorded on completion, readable by later steps.
    pub output: Option<serde_json::Value>,

    /// How many retries have been spent.
    pub retry_count: u32,

    /// How many retries the plan allows.
    pub max_retries: u32,

    /// Last failure message, if any.
    pub error_message: Option<String>,

    /// When the handler first started.
    pub started_at: Option<DateTime<Utc>>,

    /// When the step reached a finished status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl SagaStep {
    /// Creates a pending step for the given kind.
    pub fn new(kind: StepKind, max_retries: u32) -> Self {
        Self {
            step_id: Uuid::new_v4(),
            name: kind.as_str().to_string(),
            kind,
            status: StepStatus::Pending,
            input: serde_json::Value::Null,
            output: None,
            retry_count: 0,
            max_retries,
            error_message: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Sets the handler input.
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    /// Marks the step as running.
    pub fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Marks the step as completed with its output.
    pub fn mark_completed(&mut self, output: serde_json::Value) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.finished_at = Some(Utc::now());
    }

    /// Marks the step as failed with the final error.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error_message = Some(error.into());
        self.finished_at = Some(Utc::now());
    }

    /// Marks the step's effect as rolled back.
    pub fn mark_compensated(&mut self) {
        self.status = StepStatus::Compensated;
    }

    /// Returns true if the step has retries left.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Spends one retry.
    pub fn record_retry(&mut self) {
        self.retry_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_step_is_pending() {
        let step = SagaStep::new(StepKind::AuthorizePayment, 3);
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.name, "authorize_payment");
        assert_eq!(step.retry_count, 0);
        assert_eq!(step.max_retries, 3);
        assert!(step.started_at.is_none());
        assert!(step.output.is_none());
    }

    #[test]
    fn test_running_to_completed() {
        let mut step = SagaStep::new(StepKind::ReserveInventory, 2);

        step.mark_running();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());

        step.mark_completed(serde_json::json!({"reservation_id": "abc"}));
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.finished_at.is_some());
        assert_eq!(
            step.output.as_ref().unwrap()["reservation_id"],
            serde_json::json!("abc")
        );
    }

    #[test]
    fn test_started_at_survives_retries() {
        let mut step = SagaStep::new(StepKind::CreateShipment, 2);
        step.mark_running();
        let first_start = step.started_at;

        step.record_retry();
        step.mark_running();
        assert_eq!(step.started_at, first_start);
    }

    #[test]
    fn test_retry_budget() {
        let mut step = SagaStep::new(StepKind::CapturePayment, 2);
        assert!(step.can_retry());

        step.record_retry();
        assert!(step.can_retry());

        step.record_retry();
        assert!(!step.can_retry());
    }

    #[test]
    fn test_failure_records_error() {
        let mut step = SagaStep::new(StepKind::InitiateRefund, 3);
        step.mark_running();
        step.mark_failed("gateway timeout");

        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error_message.as_deref(), Some("gateway timeout"));
        assert!(step.finished_at.is_some());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&StepKind::SendCancellationNotice).unwrap();
        assert_eq!(json, "\"send_cancellation_notice\"");

        let kind: StepKind = serde_json::from_str("\"authorize_payment\"").unwrap();
        assert_eq!(kind, StepKind::AuthorizePayment);
    }

    #[test]
    fn test_step_round_trip() {
        let mut step = SagaStep::new(StepKind::AuthorizePayment, 3)
            .with_input(serde_json::json!({"amount": 2500}));
        step.mark_running();
        step.mark_completed(serde_json::json!({"payment_id": "PAY-0001"}));

        let json = serde_json::to_string(&step).unwrap();
        let back: SagaStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }
}
