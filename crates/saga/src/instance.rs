//! Saga instances and their step plans.
//!
//! A saga is a plain state machine persisted through the
//! [`SagaRepository`](crate::repository::SagaRepository), not an
//! event-sourced aggregate: the orchestrator rewrites the whole instance
//! after every transition, and the current row is the whole truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::CorrelationId;

use crate::state::{SagaStatus, StepStatus};
use crate::step::{SagaStep, StepKind};

/// Unique identifier for a saga instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaId(Uuid);

impl SagaId {
    /// Generates a new random saga ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a saga ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SagaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SagaId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<SagaId> for Uuid {
    fn from(id: SagaId) -> Self {
        id.0
    }
}

/// The saga flavors this crate knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaKind {
    OrderFulfillment,
    OrderCancellation,
}

impl SagaKind {
    /// Returns the kind name as serialized and stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaKind::OrderFulfillment => "order_fulfillment",
            SagaKind::OrderCancellation => "order_cancellation",
        }
    }

    /// Builds the pending step plan for this kind.
    ///
    /// Retry budgets reflect how flaky each collaborator is in practice:
    /// payment calls get three retries, order status updates get one.
    pub fn step_plan(&self) -> Vec<SagaStep> {
        match self {
            SagaKind::OrderFulfillment => vec![
                SagaStep::new(StepKind::AuthorizePayment, 3),
                SagaStep::new(StepKind::ReserveInventory, 2),
                SagaStep::new(StepKind::CreateShipment, 2),
                SagaStep::new(StepKind::ConfirmOrder, 1),
                SagaStep::new(StepKind::CapturePayment, 3),
                SagaStep::new(StepKind::SendConfirmation, 2),
            ],
            SagaKind::OrderCancellation => vec![
                SagaStep::new(StepKind::ReleaseInventory, 2),
                SagaStep::new(StepKind::InitiateRefund, 3),
                SagaStep::new(StepKind::UpdateOrderStatus, 1),
                SagaStep::new(StepKind::SendCancellationNotice, 2),
            ],
        }
    }
}

impl std::fmt::Display for SagaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SagaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_fulfillment" => Ok(SagaKind::OrderFulfillment),
            "order_cancellation" => Ok(SagaKind::OrderCancellation),
            other => Err(format!("unknown saga kind: {other}")),
        }
    }
}

/// A running or finished saga with its full step plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaInstance {
    /// Unique saga identifier.
    pub saga_id: SagaId,

    /// Which plan this saga runs.
    pub kind: SagaKind,

    /// Current status.
    pub status: SagaStatus,

    /// Correlation ID linking the saga to the triggering request.
    pub correlation_id: CorrelationId,

    /// Business payload shared by all steps (order ID, items, amounts).
    pub context: serde_json::Value,

    /// The step plan, in execution order.
    pub steps: Vec<SagaStep>,

    /// Index of the step the orchestrator works on next.
    pub current_step_index: usize,

    /// Accumulated failure text, if any.
    pub error_message: Option<String>,

    /// When the saga started.
    pub started_at: DateTime<Utc>,

    /// Last persisted transition.
    pub updated_at: DateTime<Utc>,
}

impl SagaInstance {
    /// Creates a new running saga with the plan for `kind` already laid out.
    pub fn new(kind: SagaKind, correlation_id: CorrelationId, context: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            saga_id: SagaId::new(),
            kind,
            status: SagaStatus::Running,
            correlation_id,
            context,
            steps: kind.step_plan(),
            current_step_index: 0,
            error_message: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Appends an extra step to the plan.
    pub fn add_step(&mut self, step: SagaStep) {
        self.steps.push(step);
        self.touch();
    }

    /// Returns the step the orchestrator works on next, if any remain.
    pub fn current_step(&self) -> Option<&SagaStep> {
        self.steps.get(self.current_step_index)
    }

    /// Mutable access to the current step.
    pub fn current_step_mut(&mut self) -> Option<&mut SagaStep> {
        self.steps.get_mut(self.current_step_index)
    }

    /// Returns the completed steps in execution order.
    pub fn completed_steps(&self) -> Vec<&SagaStep> {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .collect()
    }

    /// Moves on to the next step.
    pub fn advance(&mut self) {
        self.current_step_index += 1;
        self.touch();
    }

    /// Marks the saga as successfully finished.
    pub fn mark_completed(&mut self) {
        self.status = SagaStatus::Completed;
        self.touch();
    }

    /// Marks the saga as failed with the final error.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SagaStatus::Failed;
        self.append_error(error);
        self.touch();
    }

    /// Marks the saga as rolling back.
    pub fn mark_compensating(&mut self) {
        self.status = SagaStatus::Compensating;
        self.touch();
    }

    /// Marks the rollback as finished.
    pub fn mark_compensated(&mut self) {
        self.status = SagaStatus::Compensated;
        self.touch();
    }

    /// Marks the rollback itself as failed; needs manual intervention.
    pub fn mark_compensation_failed(&mut self) {
        self.status = SagaStatus::CompensationFailed;
        self.touch();
    }

    /// Resets the failed step back to pending for a manual retry.
    ///
    /// Returns false when no step is in the failed state. The step index is
    /// left where it was, so the orchestrator resumes at the same position.
    pub fn reset_failed_step(&mut self) -> bool {
        let Some(step) = self
            .steps
            .iter_mut()
            .find(|step| step.status == StepStatus::Failed)
        else {
            return false;
        };

        step.status = StepStatus::Pending;
        step.retry_count = 0;
        step.error_message = None;
        step.finished_at = None;
        self.touch();
        true
    }

    /// Returns the recorded output of a completed step, by kind.
    ///
    /// This is how later steps read what earlier ones produced, e.g. capture
    /// reading the payment ID that authorize recorded.
    pub fn step_output(&self, kind: StepKind) -> Option<&serde_json::Value> {
        self.steps
            .iter()
            .find(|step| step.kind == kind && step.status == StepStatus::Completed)
            .and_then(|step| step.output.as_ref())
    }

    /// Appends failure text to the saga error, keeping earlier entries.
    pub fn append_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.error_message = Some(match self.error_message.take() {
            Some(previous) => format!("{previous}; {error}"),
            None => error,
        });
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fulfillment_saga() -> SagaInstance {
        SagaInstance::new(
            SagaKind::OrderFulfillment,
            CorrelationId::from("corr-1"),
            serde_json::json!({"order_id": "o-1"}),
        )
    }

    #[test]
    fn test_new_saga_carries_full_plan() {
        let saga = fulfillment_saga();

        assert_eq!(saga.status, SagaStatus::Running);
        assert_eq!(saga.current_step_index, 0);
        assert_eq!(saga.steps.len(), 6);
        assert_eq!(
            saga.current_step().map(|step| step.kind),
            Some(StepKind::AuthorizePayment)
        );
        assert!(saga.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_cancellation_plan_order() {
        let saga = SagaInstance::new(
            SagaKind::OrderCancellation,
            CorrelationId::from("corr-2"),
            serde_json::Value::Null,
        );

        let kinds: Vec<StepKind> = saga.steps.iter().map(|step| step.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::ReleaseInventory,
                StepKind::InitiateRefund,
                StepKind::UpdateOrderStatus,
                StepKind::SendCancellationNotice,
            ]
        );
    }

    #[test]
    fn test_advance_walks_the_plan() {
        let mut saga = fulfillment_saga();

        saga.advance();
        assert_eq!(
            saga.current_step().map(|step| step.kind),
            Some(StepKind::ReserveInventory)
        );

        for _ in 0..5 {
            saga.advance();
        }
        assert!(saga.current_step().is_none());
    }

    #[test]
    fn test_step_output_reads_completed_steps_only() {
        let mut saga = fulfillment_saga();

        assert!(saga.step_output(StepKind::AuthorizePayment).is_none());

        if let Some(step) = saga.current_step_mut() {
            step.mark_running();
            step.mark_completed(serde_json::json!({"payment_id": "PAY-0001"}));
        }
        saga.advance();

        let output = saga.step_output(StepKind::AuthorizePayment).unwrap();
        assert_eq!(output["payment_id"], serde_json::json!("PAY-0001"));
        assert!(saga.step_output(StepKind::ReserveInventory).is_none());
    }

    #[test]
    fn test_completed_steps_in_execution_order() {
        let mut saga = fulfillment_saga();

        for _ in 0..3 {
            if let Some(step) = saga.current_step_mut() {
                step.mark_completed(serde_json::Value::Null);
            }
            saga.advance();
        }

        let kinds: Vec<StepKind> = saga
            .completed_steps()
            .iter()
            .map(|step| step.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::AuthorizePayment,
                StepKind::ReserveInventory,
                StepKind::CreateShipment,
            ]
        );
    }

    #[test]
    fn test_reset_failed_step() {
        let mut saga = fulfillment_saga();

        if let Some(step) = saga.current_step_mut() {
            step.record_retry();
            step.record_retry();
            step.record_retry();
            step.mark_failed("card declined");
        }
        saga.mark_failed("step authorize_payment failed");

        assert!(saga.reset_failed_step());

        let step = saga.current_step().unwrap();
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.retry_count, 0);
        assert!(step.error_message.is_none());
        assert_eq!(saga.current_step_index, 0);
    }

    #[test]
    fn test_reset_without_failed_step_is_a_no_op() {
        let mut saga = fulfillment_saga();
        assert!(!saga.reset_failed_step());
    }

    #[test]
    fn test_append_error_keeps_history() {
        let mut saga = fulfillment_saga();

        saga.append_error("first failure");
        saga.append_error("compensation for create_shipment failed");

        assert_eq!(
            saga.error_message.as_deref(),
            Some("first failure; compensation for create_shipment failed")
        );
    }

    #[test]
    fn test_kind_round_trip() {
        let json = serde_json::to_string(&SagaKind::OrderCancellation).unwrap();
        assert_eq!(json, "\"order_cancellation\"");

        let kind: SagaKind = serde_json::from_str("\"order_fulfillment\"").unwrap();
        assert_eq!(kind, SagaKind::OrderFulfillment);
    }
}
