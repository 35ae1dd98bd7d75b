//! Saga and step status machines.

use serde::{Deserialize, Serialize};

/// The status of a saga in its lifecycle.
///
/// Status transitions:
/// ```text
/// RUNNING ──┬──► COMPLETED
///           └──► FAILED ──► COMPENSATING ──┬──► COMPENSATED
///                  ▲                       └──► COMPENSATION_FAILED
///                  │
///            (retry_saga, also from COMPENSATED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Saga steps are being executed.
    #[default]
    Running,

    /// All steps completed successfully (terminal).
    Completed,

    /// A step exhausted its retries; compensation is about to run or a
    /// retry is awaited.
    Failed,

    /// Compensating transactions are in progress.
    Compensating,

    /// Every completed step was rolled back (retryable).
    Compensated,

    /// At least one compensation failed; manual intervention needed.
    CompensationFailed,
}

impl SagaStatus {
    /// Returns true if the saga is still executing or rolling back.
    pub fn is_active(&self) -> bool {
        matches!(self, SagaStatus::Running | SagaStatus::Compensating)
    }

    /// Returns true if execution has ended, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed
                | SagaStatus::Failed
                | SagaStatus::Compensated
                | SagaStatus::CompensationFailed
        )
    }

    /// Returns true if `retry_saga` may resume this saga.
    pub fn can_retry(&self) -> bool {
        matches!(self, SagaStatus::Failed | SagaStatus::Compensated)
    }

    /// Returns true if the saga shows up in the failure listing.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            SagaStatus::Failed | SagaStatus::Compensating | SagaStatus::CompensationFailed
        )
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Running => "RUNNING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Compensated => "COMPENSATED",
            SagaStatus::CompensationFailed => "COMPENSATION_FAILED",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SagaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(SagaStatus::Running),
            "COMPLETED" => Ok(SagaStatus::Completed),
            "FAILED" => Ok(SagaStatus::Failed),
            "COMPENSATING" => Ok(SagaStatus::Compensating),
            "COMPENSATED" => Ok(SagaStatus::Compensated),
            "COMPENSATION_FAILED" => Ok(SagaStatus::CompensationFailed),
            other => Err(format!("unknown saga status: {other}")),
        }
    }
}

/// The status of a single step within a saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Step has not run yet.
    #[default]
    Pending,

    /// Step handler is executing.
    Running,

    /// Step finished and produced its output.
    Completed,

    /// Step exhausted its retries.
    Failed,

    /// Step's effect was rolled back.
    Compensated,
}

impl StepStatus {
    /// Returns true if the step finished one way or another.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Compensated
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Running => "RUNNING",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Compensated => "COMPENSATED",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_running() {
        assert_eq!(SagaStatus::default(), SagaStatus::Running);
    }

    #[test]
    fn test_active_statuses() {
        assert!(SagaStatus::Running.is_active());
        assert!(SagaStatus::Compensating.is_active());
        assert!(!SagaStatus::Completed.is_active());
        assert!(!SagaStatus::Failed.is_active());
        assert!(!SagaStatus::Compensated.is_active());
        assert!(!SagaStatus::CompensationFailed.is_active());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
        assert!(SagaStatus::CompensationFailed.is_terminal());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(SagaStatus::Failed.can_retry());
        assert!(SagaStatus::Compensated.can_retry());
        assert!(!SagaStatus::Running.can_retry());
        assert!(!SagaStatus::Completed.can_retry());
        assert!(!SagaStatus::Compensating.can_retry());
        assert!(!SagaStatus::CompensationFailed.can_retry());
    }

    #[test]
    fn test_needs_attention() {
        assert!(SagaStatus::Failed.needs_attention());
        assert!(SagaStatus::Compensating.needs_attention());
        assert!(SagaStatus::CompensationFailed.needs_attention());
        assert!(!SagaStatus::Running.needs_attention());
        assert!(!SagaStatus::Completed.needs_attention());
        assert!(!SagaStatus::Compensated.needs_attention());
    }

    #[test]
    fn test_step_finished() {
        assert!(!StepStatus::Pending.is_finished());
        assert!(!StepStatus::Running.is_finished());
        assert!(StepStatus::Completed.is_finished());
        assert!(StepStatus::Failed.is_finished());
        assert!(StepStatus::Compensated.is_finished());
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaStatus::Running.to_string(), "RUNNING");
        assert_eq!(SagaStatus::CompensationFailed.to_string(), "COMPENSATION_FAILED");
        assert_eq!(StepStatus::Pending.to_string(), "PENDING");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&SagaStatus::CompensationFailed).unwrap();
        assert_eq!(json, "\"COMPENSATION_FAILED\"");

        let status: SagaStatus = serde_json::from_str("\"COMPENSATING\"").unwrap();
        assert_eq!(status, SagaStatus::Compensating);

        let json = serde_json::to_string(&StepStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
