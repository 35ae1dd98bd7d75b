//! Saga orchestrator: runs saga instances step by step.
//!
//! Each saga executes as one supervised tokio task; steps within a saga are
//! strictly sequential because later steps read earlier steps' output. The
//! orchestrator persists the instance after every transition, so a crash
//! leaves a resumable row behind (`retry_saga`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, watch};
use tokio::task::JoinHandle;

use common::CorrelationId;

use crate::error::{Result, SagaError};
use crate::handler::HandlerRegistry;
use crate::instance::{SagaId, SagaInstance, SagaKind};
use crate::repository::{SagaRepository, SagaStatistics};
use crate::state::{SagaStatus, StepStatus};

/// Default bound on concurrently executing sagas.
const DEFAULT_MAX_CONCURRENT: usize = 64;

/// Base backoff between step retries, scaled by the retry count.
const STEP_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// An in-flight saga task with its cancellation signal.
struct TrackedSaga {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

/// Drives saga instances to a terminal status.
///
/// Holds the handler registry, the saga repository, and a registry of
/// in-flight tasks keyed by saga ID for cancellation and shutdown.
pub struct SagaOrchestrator<R: SagaRepository + 'static> {
    worker: SagaWorker<R>,
    semaphore: Arc<Semaphore>,
    tasks: Mutex<HashMap<SagaId, TrackedSaga>>,
}

impl<R: SagaRepository + 'static> SagaOrchestrator<R> {
    /// Creates an orchestrator with the default concurrency bound.
    pub fn new(repository: Arc<R>, registry: Arc<HandlerRegistry>) -> Self {
        Self::with_max_concurrent(repository, registry, DEFAULT_MAX_CONCURRENT)
    }

    /// Creates an orchestrator bounding concurrent sagas to `max_concurrent`.
    pub fn with_max_concurrent(
        repository: Arc<R>,
        registry: Arc<HandlerRegistry>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            worker: SagaWorker {
                repository,
                registry,
            },
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a new saga and returns its ID immediately.
    ///
    /// The saga runs in the background; its outcome stays queryable by ID.
    #[tracing::instrument(skip(self, context), fields(kind = %kind))]
    pub async fn start_saga(
        &self,
        kind: SagaKind,
        correlation_id: CorrelationId,
        context: serde_json::Value,
    ) -> Result<SagaId> {
        let saga = SagaInstance::new(kind, correlation_id, context);
        let saga_id = saga.saga_id;

        self.worker.repository.save(&saga).await?;
        metrics::counter!("saga_started_total").increment(1);
        tracing::info!(%saga_id, "saga started");

        self.spawn(saga).await;
        Ok(saga_id)
    }

    /// Resumes a FAILED or COMPENSATED saga from its current step.
    ///
    /// Resets the failed step to PENDING and respawns execution; completed
    /// steps are not rewound. Returns false when the saga's status does not
    /// admit a retry.
    #[tracing::instrument(skip(self))]
    pub async fn retry_saga(&self, saga_id: SagaId) -> Result<bool> {
        let Some(mut saga) = self.worker.repository.get(saga_id).await? else {
            return Err(SagaError::SagaNotFound(saga_id));
        };

        if !saga.status.can_retry() {
            tracing::info!(%saga_id, status = %saga.status, "saga is not retryable");
            return Ok(false);
        }
        if !saga.reset_failed_step() {
            return Ok(false);
        }

        saga.status = SagaStatus::Running;
        saga.error_message = None;
        self.worker.repository.save(&saga).await?;
        metrics::counter!("saga_retries_total").increment(1);
        tracing::info!(%saga_id, step_index = saga.current_step_index, "saga retried");

        self.spawn(saga).await;
        Ok(true)
    }

    /// Loads a saga instance by ID.
    pub async fn get_saga(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        self.worker.repository.get(saga_id).await
    }

    /// Returns the current status of a saga.
    pub async fn get_saga_status(&self, saga_id: SagaId) -> Result<Option<SagaStatus>> {
        Ok(self
            .worker
            .repository
            .get(saga_id)
            .await?
            .map(|saga| saga.status))
    }

    /// Lists sagas that are still making progress.
    pub async fn list_running_sagas(&self) -> Result<Vec<SagaInstance>> {
        self.worker.repository.list_running().await
    }

    /// Lists sagas that need operator attention.
    pub async fn list_failed_sagas(&self) -> Result<Vec<SagaInstance>> {
        self.worker.repository.list_failed().await
    }

    /// Finds all sagas started for a correlation ID, oldest first.
    pub async fn find_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Vec<SagaInstance>> {
        self.worker.repository.find_by_correlation(correlation_id).await
    }

    /// Counts sagas by status and kind.
    pub async fn statistics(&self) -> Result<SagaStatistics> {
        self.worker.repository.statistics().await
    }

    /// Waits for a tracked saga task to finish.
    ///
    /// Returns false when no task is tracked under the ID (already joined,
    /// or the saga predates this process).
    pub async fn join_saga(&self, saga_id: SagaId) -> bool {
        let tracked = self.tasks.lock().await.remove(&saga_id);
        match tracked {
            Some(tracked) => {
                if let Err(err) = tracked.handle.await {
                    tracing::error!(%saga_id, %err, "saga task panicked");
                }
                true
            }
            None => false,
        }
    }

    /// Signals one in-flight saga to stop and waits for its task.
    ///
    /// The step left mid-execution is abandoned without compensation; the
    /// saga stays RUNNING in the repository until `retry_saga` resumes it.
    pub async fn cancel_saga(&self, saga_id: SagaId) -> bool {
        let tracked = self.tasks.lock().await.remove(&saga_id);
        match tracked {
            Some(tracked) => {
                let _ = tracked.cancel.send(true);
                if let Err(err) = tracked.handle.await {
                    tracing::error!(%saga_id, %err, "saga task panicked");
                }
                true
            }
            None => false,
        }
    }

    /// Signals every in-flight saga and waits for all tasks to finish.
    ///
    /// Mid-execution steps are abandoned; recovery after restart is an
    /// explicit `retry_saga`, relying on idempotent step handlers.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let tracked: Vec<(SagaId, TrackedSaga)> =
            self.tasks.lock().await.drain().collect();
        if tracked.is_empty() {
            return;
        }

        tracing::info!(in_flight = tracked.len(), "shutting down saga tasks");
        for (_, saga) in &tracked {
            let _ = saga.cancel.send(true);
        }
        for (saga_id, saga) in tracked {
            if let Err(err) = saga.handle.await {
                tracing::error!(%saga_id, %err, "saga task panicked during shutdown");
            }
        }
        tracing::info!("saga orchestrator shut down");
    }

    /// Spawns the supervised task that runs a saga to a terminal status.
    async fn spawn(&self, saga: SagaInstance) {
        let saga_id = saga.saga_id;
        let worker = self.worker.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            worker.run(saga, cancel_rx).await;
        });

        let mut tasks = self.tasks.lock().await;
        tasks.retain(|_, tracked| !tracked.handle.is_finished());
        tasks.insert(
            saga_id,
            TrackedSaga {
                handle,
                cancel: cancel_tx,
            },
        );
    }
}

/// What a saga execution pass ended with.
enum RunOutcome {
    /// Every step completed.
    Completed,
    /// A step failed for good; compensation is due.
    Failed,
    /// Cancelled mid-run; the saga stays as persisted.
    Abandoned,
}

/// The part of the orchestrator that lives inside each saga task.
struct SagaWorker<R> {
    repository: Arc<R>,
    registry: Arc<HandlerRegistry>,
}

impl<R> Clone for SagaWorker<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<R: SagaRepository> SagaWorker<R> {
    /// Runs a saga to a terminal status, compensating on failure.
    async fn run(&self, mut saga: SagaInstance, mut cancel: watch::Receiver<bool>) {
        let saga_id = saga.saga_id;
        let started = std::time::Instant::now();

        match self.execute_steps(&mut saga, &mut cancel).await {
            RunOutcome::Completed => {
                saga.mark_completed();
                self.persist_final(&saga).await;
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(%saga_id, "saga completed");
            }
            RunOutcome::Failed => {
                metrics::counter!("saga_failed").increment(1);
                self.compensate(&mut saga, &mut cancel).await;
            }
            RunOutcome::Abandoned => {
                tracing::warn!(%saga_id, step_index = saga.current_step_index, "saga abandoned mid-step");
                return;
            }
        }

        metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
    }

    /// Executes the step plan from the current index.
    ///
    /// On a final failure the step and saga are already marked FAILED and
    /// persisted when this returns.
    async fn execute_steps(
        &self,
        saga: &mut SagaInstance,
        cancel: &mut watch::Receiver<bool>,
    ) -> RunOutcome {
        let saga_id = saga.saga_id;

        while saga.current_step_index < saga.steps.len() {
            if *cancel.borrow() {
                return RunOutcome::Abandoned;
            }

            let kind = match saga.current_step() {
                Some(step) => step.kind,
                None => break,
            };

            let handler = match self.registry.step_handler(kind) {
                Ok(handler) => handler,
                Err(err) => {
                    // No handler can ever succeed; skip the retry budget.
                    tracing::error!(%saga_id, step = %kind, %err, "step has no handler");
                    return self.fail_current_step(saga, err.to_string()).await;
                }
            };

            if let Some(step) = saga.current_step_mut() {
                step.mark_running();
            }
            if let Err(err) = self.repository.save(saga).await {
                return self.fail_internal(saga, err).await;
            }

            let snapshot = saga.clone();
            let step_snapshot = snapshot.steps[saga.current_step_index].clone();
            tracing::debug!(%saga_id, step = %kind, retry = step_snapshot.retry_count, "executing step");

            let result = tokio::select! {
                changed = cancel.changed() => {
                    // A closed channel means the orchestrator is gone.
                    let _ = changed;
                    return RunOutcome::Abandoned;
                }
                result = handler.execute(&snapshot, &step_snapshot) => result,
            };

            match result {
                Ok(output) => {
                    if let Some(step) = saga.current_step_mut() {
                        step.mark_completed(output);
                    }
                    saga.advance();
                    if let Err(err) = self.repository.save(saga).await {
                        return self.fail_internal(saga, err).await;
                    }
                }
                Err(err) => {
                    let retry_count = match saga.current_step_mut() {
                        Some(step) if step.can_retry() => {
                            step.record_retry();
                            Some(step.retry_count)
                        }
                        _ => None,
                    };
                    match retry_count {
                        Some(retry) => {
                            tracing::warn!(
                                %saga_id,
                                step = %kind,
                                retry,
                                %err,
                                "step failed, retrying"
                            );
                            if let Err(err) = self.repository.save(saga).await {
                                return self.fail_internal(saga, err).await;
                            }
                            tokio::time::sleep(STEP_RETRY_BACKOFF * retry).await;
                        }
                        None => {
                            tracing::error!(%saga_id, step = %kind, %err, "step exhausted its retries");
                            return self.fail_current_step(saga, err.to_string()).await;
                        }
                    }
                }
            }
        }

        RunOutcome::Completed
    }

    /// Marks the current step and the saga as failed and persists.
    async fn fail_current_step(&self, saga: &mut SagaInstance, reason: String) -> RunOutcome {
        let step_name = saga
            .current_step()
            .map(|step| step.kind.as_str())
            .unwrap_or("unknown");
        if let Some(step) = saga.current_step_mut() {
            step.mark_failed(reason.clone());
        }
        saga.mark_failed(format!("step {step_name} failed: {reason}"));
        self.persist_final(saga).await;
        RunOutcome::Failed
    }

    /// Handles an orchestrator-internal error: fail the saga, then let the
    /// caller still attempt compensation.
    async fn fail_internal(&self, saga: &mut SagaInstance, err: SagaError) -> RunOutcome {
        tracing::error!(saga_id = %saga.saga_id, %err, "orchestrator-internal error");
        saga.mark_failed(format!("internal error: {err}"));
        self.persist_final(saga).await;
        RunOutcome::Failed
    }

    /// Rolls back completed steps in strict reverse order.
    ///
    /// A compensation failure is recorded on the saga but never aborts the
    /// remaining compensations; the saga always reaches a terminal status.
    async fn compensate(&self, saga: &mut SagaInstance, cancel: &mut watch::Receiver<bool>) {
        let saga_id = saga.saga_id;
        saga.mark_compensating();
        self.persist_final(saga).await;
        tracing::info!(%saga_id, "compensating saga");

        let completed: Vec<usize> = saga
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.status == StepStatus::Completed)
            .map(|(index, _)| index)
            .collect();

        let mut all_succeeded = true;
        for index in completed.into_iter().rev() {
            if *cancel.borrow() {
                tracing::warn!(%saga_id, "compensation abandoned mid-walk");
                return;
            }

            let snapshot = saga.clone();
            let step_snapshot = snapshot.steps[index].clone();
            let kind = step_snapshot.kind;

            match self.registry.compensation_handler(kind) {
                None => {
                    tracing::warn!(%saga_id, step = %kind, "no compensation handler, skipping");
                    saga.steps[index].mark_compensated();
                }
                Some(handler) => match handler.compensate(&snapshot, &step_snapshot).await {
                    Ok(()) => {
                        tracing::info!(%saga_id, step = %kind, "step compensated");
                        saga.steps[index].mark_compensated();
                    }
                    Err(err) => {
                        all_succeeded = false;
                        metrics::counter!("saga_compensation_failures_total").increment(1);
                        tracing::error!(%saga_id, step = %kind, %err, "compensation failed");
                        saga.append_error(format!("compensation for {kind} failed: {err}"));
                    }
                },
            }
            self.persist_final(saga).await;
        }

        if all_succeeded {
            saga.mark_compensated();
            metrics::counter!("saga_compensated").increment(1);
            tracing::info!(%saga_id, "saga compensated");
        } else {
            saga.mark_compensation_failed();
            tracing::error!(%saga_id, "saga compensation incomplete, manual intervention needed");
        }
        self.persist_final(saga).await;
    }

    /// Persists the saga, logging instead of propagating a failure.
    ///
    /// Used on paths that must keep making progress toward a terminal
    /// status even when the repository misbehaves.
    async fn persist_final(&self, saga: &SagaInstance) {
        if let Err(err) = self.repository.save(saga).await {
            tracing::error!(saga_id = %saga.saga_id, %err, "failed to persist saga transition");
        }
    }
}
