//! Runs a single saga step against its target service.

use chrono::Utc;
use serde_json::{Value, json};

use saga_store::{EventType, SagaEvent, SagaStep, SagaStore, SagaTransaction, StepStatus};

use crate::client::{ServiceCallError, ServiceClient};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::flow::SagaFlow;

/// How a step ended.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed(SagaStep),
    Failed { step: SagaStep, reason: String },
}

impl StepOutcome {
    pub fn step(&self) -> &SagaStep {
        match self {
            StepOutcome::Completed(step) | StepOutcome::Failed { step, .. } => step,
        }
    }
}

/// Executes steps one at a time. Never retries inline.
pub struct StepExecutor<S, C> {
    store: S,
    dispatcher: Dispatcher<C>,
}

impl<S, C> StepExecutor<S, C>
where
    S: SagaStore,
    C: ServiceClient,
{
    pub fn new(store: S, dispatcher: Dispatcher<C>) -> Self {
        Self { store, dispatcher }
    }

    /// Runs `step` for `saga`, which must reflect the latest stored context.
    ///
    /// Only store failures are returned as errors; service failures come back
    /// as [`StepOutcome::Failed`].
    #[tracing::instrument(skip_all, fields(saga_id = %saga.id, step = %step.step_name))]
    pub async fn execute(
        &self,
        saga: &SagaTransaction,
        mut step: SagaStep,
        flow: &dyn SagaFlow,
    ) -> Result<StepOutcome> {
        step.status = StepStatus::InProgress;
        step.started_at = Some(Utc::now());
        step.error_message = None;
        self.store.update_step(&step).await?;
        self.store
            .append_event(
                SagaEvent::new(
                    saga.id,
                    EventType::StepStarted,
                    format!("Step {} started", step.step_name),
                )
                .for_step(step.id),
            )
            .await?;

        let call = match flow.build_request(&step, saga) {
            Ok(call) => call,
            Err(reason) => return self.fail(saga, step, reason, Value::Null).await,
        };

        let body = match self.dispatcher.send(saga, &call).await {
            Ok(response) => match response.into_result() {
                Ok(body) => body,
                Err(err) => return self.fail(saga, step, err.to_string(), Value::Null).await,
            },
            Err(err) => return self.fail(saga, step, err.to_string(), Value::Null).await,
        };

        if let Err(reason) = flow.accept(&step, &body) {
            let reason = ServiceCallError::Rejected(reason).to_string();
            return self.fail(saga, step, reason, body).await;
        }

        if let Value::Object(patch) = &body {
            self.store.merge_context(saga.id, patch.clone()).await?;
        }

        step.status = StepStatus::Completed;
        step.completed_at = Some(Utc::now());
        step.response_data = body;
        self.store.update_step(&step).await?;
        self.store
            .append_event(
                SagaEvent::new(
                    saga.id,
                    EventType::StepCompleted,
                    format!("Step {} completed", step.step_name),
                )
                .for_step(step.id)
                .with_payload(json!({
                    "request": call.body,
                    "response": step.response_data,
                })),
            )
            .await?;

        if let Some((event_type, message)) = flow.completed_event(&step) {
            self.store
                .append_event(SagaEvent::new(saga.id, event_type, message).for_step(step.id))
                .await?;
        }

        tracing::info!("saga step completed");
        Ok(StepOutcome::Completed(step))
    }

    async fn fail(
        &self,
        saga: &SagaTransaction,
        mut step: SagaStep,
        reason: String,
        body: Value,
    ) -> Result<StepOutcome> {
        step.status = StepStatus::Failed;
        step.failed_at = Some(Utc::now());
        step.error_message = Some(reason.clone());
        if !body.is_null() {
            step.response_data = body;
        }
        self.store.update_step(&step).await?;
        self.store
            .append_event(
                SagaEvent::new(
                    saga.id,
                    EventType::StepFailed,
                    format!("Step {} failed: {}", step.step_name, reason),
                )
                .for_step(step.id)
                .with_payload(json!({"error": reason, "retry_count": step.retry_count})),
            )
            .await?;

        metrics::counter!("saga_step_failures_total", "step" => step.step_name.clone())
            .increment(1);
        tracing::error!(error = %reason, "saga step failed");
        Ok(StepOutcome::Failed { step, reason })
    }
}
