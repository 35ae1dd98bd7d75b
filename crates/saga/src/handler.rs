//! Step handler traits and the handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, SagaError};
use crate::instance::SagaInstance;
use crate::step::{SagaStep, StepKind};

/// Executes the forward action of one step kind.
///
/// Handlers receive the whole saga so they can read the shared context and
/// the recorded outputs of earlier steps. The returned value is persisted as
/// the step output.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, saga: &SagaInstance, step: &SagaStep) -> Result<serde_json::Value>;
}

/// Undoes the effect of a completed step during rollback.
#[async_trait]
pub trait CompensationHandler: Send + Sync {
    async fn compensate(&self, saga: &SagaInstance, step: &SagaStep) -> Result<()>;
}

/// Maps step kinds to their handlers.
///
/// Every kind appearing in a plan must have a step handler; a missing
/// compensation handler means the step has nothing to undo.
#[derive(Default)]
pub struct HandlerRegistry {
    steps: HashMap<StepKind, Arc<dyn StepHandler>>,
    compensations: HashMap<StepKind, Arc<dyn CompensationHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the forward handler for a step kind.
    pub fn register_step(&mut self, kind: StepKind, handler: Arc<dyn StepHandler>) {
        self.steps.insert(kind, handler);
    }

    /// Registers the rollback handler for a step kind.
    pub fn register_compensation(&mut self, kind: StepKind, handler: Arc<dyn CompensationHandler>) {
        self.compensations.insert(kind, handler);
    }

    /// Looks up the forward handler for a step kind.
    pub fn step_handler(&self, kind: StepKind) -> Result<Arc<dyn StepHandler>> {
        self.steps
            .get(&kind)
            .cloned()
            .ok_or(SagaError::UnknownHandler(kind))
    }

    /// Looks up the rollback handler for a step kind, if one exists.
    pub fn compensation_handler(&self, kind: StepKind) -> Option<Arc<dyn CompensationHandler>> {
        self.compensations.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl StepHandler for EchoHandler {
        async fn execute(&self, _saga: &SagaInstance, step: &SagaStep) -> Result<serde_json::Value> {
            Ok(step.input.clone())
        }
    }

    #[async_trait]
    impl CompensationHandler for EchoHandler {
        async fn compensate(&self, _saga: &SagaInstance, _step: &SagaStep) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_registered_handler_is_found() {
        let mut registry = HandlerRegistry::new();
        registry.register_step(StepKind::AuthorizePayment, Arc::new(EchoHandler));

        assert!(registry.step_handler(StepKind::AuthorizePayment).is_ok());
    }

    #[test]
    fn test_missing_step_handler_is_an_error() {
        let registry = HandlerRegistry::new();

        let err = registry
            .step_handler(StepKind::CreateShipment)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SagaError::UnknownHandler(StepKind::CreateShipment)
        ));
    }

    #[test]
    fn test_missing_compensation_handler_is_not_an_error() {
        let mut registry = HandlerRegistry::new();
        registry.register_compensation(StepKind::AuthorizePayment, Arc::new(EchoHandler));

        assert!(
            registry
                .compensation_handler(StepKind::AuthorizePayment)
                .is_some()
        );
        assert!(
            registry
                .compensation_handler(StepKind::SendConfirmation)
                .is_none()
        );
    }
}
