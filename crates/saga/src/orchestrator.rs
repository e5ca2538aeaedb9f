//! Saga lifecycle: start, execute, compensate, retry and sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use saga_store::{
    DefinitionId, DefinitionQuery, EventQuery, EventType, SagaDefinition, SagaEvent, SagaId,
    SagaQuery, SagaStatistics, SagaStatus, SagaStep, SagaStore, SagaStoreExt, SagaTransaction,
    SagaTransition, SagaType, StepStatus,
};

use crate::client::ServiceClient;
use crate::compensation::CompensationEngine;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SagaError};
use crate::executor::{StepExecutor, StepOutcome};
use crate::flow::{FlowRegistry, SagaFlow};
use crate::queue::{WorkItem, WorkQueue};
use crate::registry::ServiceRegistry;

/// Request to start a saga.
#[derive(Debug, Clone)]
pub struct StartSaga {
    pub saga_type: SagaType,
    pub user_id: i64,
    /// Must be a JSON object.
    pub input_data: Value,
    /// Generated when absent.
    pub correlation_id: Option<String>,
}

/// A saga together with its steps and audit log.
#[derive(Debug, Clone, Serialize)]
pub struct SagaDetails {
    #[serde(flatten)]
    pub saga: SagaTransaction,
    pub steps: Vec<SagaStep>,
    pub events: Vec<SagaEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub percentage: f64,
}

impl Progress {
    pub fn from_steps(steps: &[SagaStep]) -> Self {
        let total_steps = steps.len();
        let completed_steps = steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        let failed_steps = steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .count();
        let percentage = if total_steps == 0 {
            0.0
        } else {
            (completed_steps as f64 / total_steps as f64 * 10_000.0).round() / 100.0
        };
        Self {
            total_steps,
            completed_steps,
            failed_steps,
            percentage,
        }
    }
}

/// Compact progress view of one saga.
#[derive(Debug, Clone, Serialize)]
pub struct SagaStatusView {
    pub saga_id: SagaId,
    pub status: SagaStatus,
    pub progress: Progress,
    pub current_step: Option<String>,
    pub error_message: Option<String>,
}

/// First step, by order, that has not run to completion yet.
pub(crate) fn current_step(steps: &[SagaStep]) -> Option<&SagaStep> {
    steps
        .iter()
        .filter(|s| matches!(s.status, StepStatus::Pending | StepStatus::InProgress))
        .min_by_key(|s| s.step_order)
}

fn generate_correlation_id(saga_type: SagaType, user_id: i64) -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!(
        "saga_{}_{}_{}_{}",
        saga_type,
        Utc::now().timestamp(),
        user_id,
        &short[..8]
    )
}

/// Drives sagas through their lifecycle.
///
/// Every status change is a compare-and-set in the store, so a worker and a
/// sweeper racing on the same saga cannot both move it.
pub struct SagaOrchestrator<S, C> {
    pub(crate) store: S,
    executor: StepExecutor<S, C>,
    pub(crate) compensation: CompensationEngine<S, C>,
    pub(crate) flows: FlowRegistry,
    pub(crate) queue: WorkQueue,
}

impl<S, C> SagaOrchestrator<S, C>
where
    S: SagaStore + Clone,
    C: ServiceClient + Clone,
{
    pub fn new(store: S, client: C, registry: ServiceRegistry, queue: WorkQueue) -> Self {
        let dispatcher = Dispatcher::new(client, Arc::new(registry));
        Self {
            executor: StepExecutor::new(store.clone(), dispatcher.clone()),
            compensation: CompensationEngine::new(store.clone(), dispatcher),
            store,
            flows: FlowRegistry::default(),
            queue,
        }
    }

    /// Replaces the flow registry.
    pub fn with_flows(mut self, flows: FlowRegistry) -> Self {
        self.flows = flows;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a saga and queues it for execution.
    #[tracing::instrument(skip(self, request), fields(saga_type = %request.saga_type, user_id = request.user_id))]
    pub async fn start(&self, request: StartSaga) -> Result<SagaDetails> {
        let saga = self.create(request).await?;
        let details = self.get_saga_details(saga.id).await?;
        self.queue.enqueue(WorkItem::Execute(saga.id));
        Ok(details)
    }

    /// Persists a saga, its step snapshots and `SAGA_STARTED` without queueing it.
    pub(crate) async fn create(&self, request: StartSaga) -> Result<SagaTransaction> {
        let Value::Object(input) = request.input_data else {
            return Err(SagaError::Validation(
                "input_data must be a JSON object".to_string(),
            ));
        };

        let correlation_id = request
            .correlation_id
            .unwrap_or_else(|| generate_correlation_id(request.saga_type, request.user_id));
        if self
            .store
            .find_by_correlation_id(&correlation_id)
            .await?
            .is_some()
        {
            return Err(SagaError::Conflict(format!(
                "Saga with correlation_id {correlation_id} already exists"
            )));
        }

        let definition = self
            .store
            .active_definition(request.saga_type)
            .await?
            .ok_or_else(|| {
                SagaError::NotFound(format!(
                    "No active definition found for saga type {}",
                    request.saga_type
                ))
            })?;

        let saga =
            SagaTransaction::from_definition(&definition, request.user_id, correlation_id, input);
        let steps = definition
            .steps
            .iter()
            .enumerate()
            .map(|(i, template)| {
                SagaStep::from_template(saga.id, i as u32 + 1, template, definition.max_retries)
            })
            .collect();
        let event = SagaEvent::new(
            saga.id,
            EventType::SagaStarted,
            format!("Saga {} started", saga.saga_type),
        )
        .with_payload(json!({
            "definition": definition.name,
            "version": definition.version,
            "correlation_id": saga.correlation_id,
        }));

        self.store.create_saga(saga.clone(), steps, event).await?;

        metrics::counter!("saga_started_total", "saga_type" => saga.saga_type.as_str()).increment(1);
        tracing::info!(saga_id = %saga.id, correlation_id = %saga.correlation_id, "saga created");
        Ok(saga)
    }

    /// Claims a pending saga and runs it to a resting status.
    ///
    /// A saga that is not pending is left alone and its current status returned.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, id: SagaId) -> Result<SagaStatus> {
        let claimed = self
            .store
            .transition_saga(
                id,
                SagaTransition::new(&[SagaStatus::Pending], SagaStatus::InProgress),
            )
            .await?;
        match claimed {
            Some(_) => self.run(id).await,
            None => {
                let current = self.store.require_saga(id).await?;
                tracing::info!(status = %current.status, "saga not pending, skipping");
                Ok(current.status)
            }
        }
    }

    /// Continues an in-progress saga from its first unfinished step.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, id: SagaId) -> Result<SagaStatus> {
        let current = self.store.require_saga(id).await?;
        if current.status != SagaStatus::InProgress {
            tracing::info!(status = %current.status, "saga not in progress, skipping");
            return Ok(current.status);
        }
        self.run(id).await
    }

    async fn run(&self, id: SagaId) -> Result<SagaStatus> {
        match self.drive(id).await {
            Ok(status) => Ok(status),
            Err(err) => {
                if let Err(mark_err) = self.fail(id, &err).await {
                    tracing::error!(error = %mark_err, "could not mark saga failed");
                }
                Err(err)
            }
        }
    }

    async fn drive(&self, id: SagaId) -> Result<SagaStatus> {
        let saga = self.store.require_saga(id).await?;
        let flow = self.flows.get(saga.saga_type);

        for step in self.store.steps_for_saga(id).await? {
            match step.status {
                StepStatus::Completed | StepStatus::Skipped => continue,
                StepStatus::Pending | StepStatus::InProgress => {}
                other if other.is_unwinding() && saga.status == SagaStatus::InProgress => {
                    let err = SagaError::Conflict(format!(
                        "Step {} is {other} and cannot run again",
                        step.step_name
                    ));
                    self.fail(id, &err).await?;
                    return Ok(self.store.require_saga(id).await?.status);
                }
                other => {
                    tracing::info!(step = %step.step_name, status = %other, "step not runnable, halting");
                    return Ok(saga.status);
                }
            }

            let current = self.store.require_saga(id).await?;
            if current.status != SagaStatus::InProgress {
                tracing::info!(status = %current.status, "saga no longer in progress, halting");
                return Ok(current.status);
            }

            match self.executor.execute(&current, step, flow.as_ref()).await? {
                StepOutcome::Completed(_) => {}
                StepOutcome::Failed { step, reason } => {
                    return self.compensate(&current, &step, &reason, flow.as_ref()).await;
                }
            }
        }

        self.complete(id).await
    }

    async fn complete(&self, id: SagaId) -> Result<SagaStatus> {
        let saga = self.store.require_saga(id).await?;
        let result = Value::Object(saga.context_data.clone());
        let transition = SagaTransition::new(&[SagaStatus::InProgress], SagaStatus::Completed)
            .with_result(result.clone());

        let Some(done) = self.store.transition_saga(id, transition).await? else {
            let current = self.store.require_saga(id).await?;
            return Ok(current.status);
        };

        self.store
            .append_event(
                SagaEvent::new(id, EventType::SagaCompleted, "Saga completed successfully")
                    .with_payload(json!({"result": result})),
            )
            .await?;

        metrics::counter!("saga_completed", "saga_type" => done.saga_type.as_str()).increment(1);
        if let (Some(started), Some(finished)) = (done.started_at, done.completed_at) {
            let seconds = (finished - started).num_milliseconds() as f64 / 1000.0;
            metrics::histogram!("saga_duration_seconds").record(seconds);
        }
        tracing::info!(saga_id = %id, "saga completed");
        Ok(SagaStatus::Completed)
    }

    async fn compensate(
        &self,
        saga: &SagaTransaction,
        failed: &SagaStep,
        reason: &str,
        flow: &dyn SagaFlow,
    ) -> Result<SagaStatus> {
        let message = format!("Step {} failed: {}", failed.step_name, reason);
        let transition = SagaTransition::new(&[SagaStatus::InProgress], SagaStatus::Compensating)
            .with_error(message.clone());
        let Some(saga) = self.store.transition_saga(saga.id, transition).await? else {
            let current = self.store.require_saga(saga.id).await?;
            return Ok(current.status);
        };

        self.store
            .append_event(
                SagaEvent::new(saga.id, EventType::CompensationStarted, message)
                    .for_step(failed.id),
            )
            .await?;

        let report = self.compensation.unwind(&saga, flow, None).await?;
        let (to, transition) = if report.is_complete() {
            (
                SagaStatus::Compensated,
                SagaTransition::new(&[SagaStatus::Compensating], SagaStatus::Compensated),
            )
        } else {
            (
                SagaStatus::PartiallyCompensated,
                SagaTransition::new(&[SagaStatus::Compensating], SagaStatus::PartiallyCompensated)
                    .with_error(format!(
                        "Compensation failed for steps: {}",
                        report.failed.join(", ")
                    )),
            )
        };

        if self.store.transition_saga(saga.id, transition).await?.is_none() {
            let current = self.store.require_saga(saga.id).await?;
            return Ok(current.status);
        }

        self.store
            .append_event(
                SagaEvent::new(saga.id, EventType::CompensationCompleted, format!("Saga {to}"))
                    .with_payload(serde_json::to_value(&report)?),
            )
            .await?;

        metrics::counter!("saga_compensated", "outcome" => to.as_str()).increment(1);
        tracing::info!(saga_id = %saga.id, status = %to, "saga compensation finished");
        Ok(to)
    }

    async fn fail(&self, id: SagaId, err: &SagaError) -> Result<()> {
        let transition = SagaTransition::new(
            &[SagaStatus::InProgress, SagaStatus::Compensating],
            SagaStatus::Failed,
        )
        .with_error(err.to_string());
        if self.store.transition_saga(id, transition).await?.is_some() {
            self.store
                .append_event(SagaEvent::new(
                    id,
                    EventType::SagaFailed,
                    format!("Saga failed: {err}"),
                ))
                .await?;
            metrics::counter!("saga_failed").increment(1);
            tracing::error!(saga_id = %id, error = %err, "saga failed");
        }
        Ok(())
    }

    /// Reopens a failed or timed-out saga and queues it again.
    #[tracing::instrument(skip(self))]
    pub async fn retry_saga(&self, id: SagaId) -> Result<SagaTransaction> {
        let saga = self.store.require_saga(id).await?;
        if !saga.status.is_retryable() {
            return Err(SagaError::Conflict(
                "Only failed or timed out sagas can be retried".to_string(),
            ));
        }
        if saga.retry_count >= saga.max_retries {
            return Err(SagaError::Conflict(
                "Maximum retry attempts exceeded".to_string(),
            ));
        }
        self.ensure_not_unwound(id).await?;

        let now = Utc::now();
        let mut transition =
            SagaTransition::new(&[SagaStatus::Failed, SagaStatus::Timeout], SagaStatus::Pending)
                .clearing_error()
                .counting_retry();
        if let Some(deadline) = saga.timeout_at {
            transition = transition.with_deadline(now + (deadline - saga.created_at));
        }

        let reopened = self
            .store
            .transition_saga(id, transition)
            .await?
            .ok_or_else(|| SagaError::Conflict("Saga status changed concurrently".to_string()))?;

        self.store
            .reset_steps(id, &[StepStatus::Failed, StepStatus::InProgress])
            .await?;
        self.store
            .append_event(SagaEvent::new(
                id,
                EventType::SagaRetried,
                format!("Saga retry attempt {}", reopened.retry_count),
            ))
            .await?;

        self.queue.enqueue(WorkItem::Execute(id));
        Ok(reopened)
    }

    /// Rejects sagas whose steps compensation has already touched.
    pub(crate) async fn ensure_not_unwound(&self, id: SagaId) -> Result<()> {
        let steps = self.store.steps_for_saga(id).await?;
        if let Some(step) = steps.iter().find(|s| s.status.is_unwinding()) {
            return Err(SagaError::Conflict(format!(
                "Saga was partly compensated (step {} is {}) and cannot be retried",
                step.step_name, step.status
            )));
        }
        Ok(())
    }

    pub async fn get_saga(&self, id: SagaId) -> Result<SagaTransaction> {
        Ok(self.store.require_saga(id).await?)
    }

    pub async fn get_saga_details(&self, id: SagaId) -> Result<SagaDetails> {
        let saga = self.store.require_saga(id).await?;
        let steps = self.store.steps_for_saga(id).await?;
        let events = self.store.events_for_saga(id).await?;
        Ok(SagaDetails {
            saga,
            steps,
            events,
        })
    }

    pub async fn status(&self, id: SagaId) -> Result<SagaStatusView> {
        let saga = self.store.require_saga(id).await?;
        let steps = self.store.steps_for_saga(id).await?;
        Ok(SagaStatusView {
            saga_id: saga.id,
            status: saga.status,
            progress: Progress::from_steps(&steps),
            current_step: current_step(&steps).map(|s| s.step_name.clone()),
            error_message: saga.error_message,
        })
    }

    pub async fn list_sagas(&self, query: SagaQuery) -> Result<Vec<SagaTransaction>> {
        Ok(self.store.list_sagas(query).await?)
    }

    pub async fn count_sagas(&self, query: SagaQuery) -> Result<u64> {
        Ok(self.store.count_sagas(query).await?)
    }

    pub async fn statistics(&self) -> Result<SagaStatistics> {
        Ok(self.store.statistics().await?)
    }

    #[tracing::instrument(skip(self, definition), fields(name = %definition.name, version = %definition.version))]
    pub async fn create_definition(&self, definition: SagaDefinition) -> Result<SagaDefinition> {
        definition.validate().map_err(SagaError::Validation)?;
        Ok(self.store.save_definition(definition).await?)
    }

    pub async fn list_definitions(&self, query: DefinitionQuery) -> Result<Vec<SagaDefinition>> {
        Ok(self.store.list_definitions(query).await?)
    }

    pub async fn get_definition(&self, id: DefinitionId) -> Result<SagaDefinition> {
        self.store
            .get_definition(id)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("definition {id}")))
    }

    pub async fn query_events(&self, query: EventQuery) -> Result<Vec<SagaEvent>> {
        Ok(self.store.query_events(query).await?)
    }

    /// Marks every overdue pending or in-progress saga as timed out.
    pub async fn sweep_timeouts(&self) -> Result<Vec<SagaId>> {
        self.sweep_timeouts_at(Utc::now()).await
    }

    pub async fn sweep_timeouts_at(&self, now: DateTime<Utc>) -> Result<Vec<SagaId>> {
        let expired = self.store.expire_overdue(now).await?;
        let mut ids = Vec::with_capacity(expired.len());
        for saga in expired {
            self.store
                .append_event(
                    SagaEvent::new(saga.id, EventType::SagaTimeout, "Saga timed out")
                        .with_payload(json!({"timeout_at": saga.timeout_at})),
                )
                .await?;
            metrics::counter!("saga_timeouts_total").increment(1);
            tracing::warn!(saga_id = %saga.id, "saga timed out");
            ids.push(saga.id);
        }
        Ok(ids)
    }

    /// Resets failed steps whose retry delay has elapsed and queues their sagas.
    pub async fn sweep_retries(&self) -> Result<Vec<SagaId>> {
        self.sweep_retries_at(Utc::now()).await
    }

    pub async fn sweep_retries_at(&self, now: DateTime<Utc>) -> Result<Vec<SagaId>> {
        let mut ids = Vec::new();
        for step in self.store.retryable_steps(now).await? {
            let Some(claimed) = self.store.claim_step_for_retry(step.id).await? else {
                continue;
            };
            self.store
                .append_event(
                    SagaEvent::new(
                        claimed.saga_id,
                        EventType::RetryAttempted,
                        format!(
                            "Retry attempt {} for step {}",
                            claimed.retry_count, claimed.step_name
                        ),
                    )
                    .for_step(claimed.id),
                )
                .await?;
            metrics::counter!("saga_step_retries_total").increment(1);
            tracing::info!(saga_id = %claimed.saga_id, step = %claimed.step_name, "step queued for retry");

            if !ids.contains(&claimed.saga_id) {
                self.queue.enqueue(WorkItem::Resume(claimed.saga_id));
                ids.push(claimed.saga_id);
            }
        }
        Ok(ids)
    }
}
