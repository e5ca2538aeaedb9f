//! Reverse-order unwinding of completed steps.

use serde::Serialize;
use serde_json::json;

use saga_store::{EventType, SagaEvent, SagaStep, SagaStore, SagaTransaction, StepStatus};

use crate::client::ServiceClient;
use crate::dispatch::Dispatcher;
use crate::error::{Result, SagaError};
use crate::flow::SagaFlow;

/// Which steps were undone and which could not be.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompensationReport {
    pub compensated: Vec<String>,
    pub failed: Vec<String>,
}

impl CompensationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs compensating calls for completed steps, newest first.
///
/// A failed compensation marks its step `rollback_failed` and the engine moves
/// on to the next earlier step.
pub struct CompensationEngine<S, C> {
    store: S,
    dispatcher: Dispatcher<C>,
}

impl<S, C> CompensationEngine<S, C>
where
    S: SagaStore,
    C: ServiceClient,
{
    pub fn new(store: S, dispatcher: Dispatcher<C>) -> Self {
        Self { store, dispatcher }
    }

    /// Unwinds every completed step of `saga`. Steps that never completed are
    /// left untouched.
    #[tracing::instrument(skip(self, saga, flow), fields(saga_id = %saga.id))]
    pub async fn unwind(
        &self,
        saga: &SagaTransaction,
        flow: &dyn SagaFlow,
        reason: Option<&str>,
    ) -> Result<CompensationReport> {
        let mut completed: Vec<SagaStep> = self
            .store
            .steps_for_saga(saga.id)
            .await?
            .into_iter()
            .filter(|step| step.status == StepStatus::Completed)
            .collect();
        completed.sort_by(|a, b| b.step_order.cmp(&a.step_order));

        let mut report = CompensationReport::default();
        for step in completed {
            let name = step.step_name.clone();
            match self.compensate_step(saga, step, flow, reason).await {
                Ok(()) => report.compensated.push(name),
                Err(SagaError::Compensation { step, reason }) => {
                    tracing::warn!(step = %step, error = %reason, "compensation failed");
                    report.failed.push(step);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(report)
    }

    async fn compensate_step(
        &self,
        saga: &SagaTransaction,
        mut step: SagaStep,
        flow: &dyn SagaFlow,
        reason: Option<&str>,
    ) -> Result<()> {
        let Some(call) = flow.build_compensation(&step, saga, reason) else {
            step.status = StepStatus::Compensated;
            self.store.update_step(&step).await?;
            self.store
                .append_event(
                    SagaEvent::new(
                        saga.id,
                        EventType::StepCompensated,
                        format!("Step {} compensated (no action required)", step.step_name),
                    )
                    .for_step(step.id),
                )
                .await?;
            return Ok(());
        };

        step.status = StepStatus::Compensating;
        self.store.update_step(&step).await?;

        let outcome = match self.dispatcher.send(saga, &call).await {
            Ok(response) => response.into_result(),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(_) => {
                step.status = StepStatus::Compensated;
                self.store.update_step(&step).await?;
                self.store
                    .append_event(
                        SagaEvent::new(
                            saga.id,
                            EventType::StepCompensated,
                            format!("Step {} compensated", step.step_name),
                        )
                        .for_step(step.id)
                        .with_payload(json!({"request": call.body})),
                    )
                    .await?;
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                step.status = StepStatus::RollbackFailed;
                step.error_message = Some(message.clone());
                self.store.update_step(&step).await?;
                self.store
                    .append_event(
                        SagaEvent::new(
                            saga.id,
                            EventType::CompensationFailed,
                            format!("Compensation failed for step {}: {}", step.step_name, message),
                        )
                        .for_step(step.id)
                        .with_payload(json!({"error": message})),
                    )
                    .await?;
                Err(SagaError::Compensation {
                    step: step.step_name,
                    reason: message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::InMemoryServiceClient;
    use crate::flow::TemplateFlow;
    use crate::registry::ServiceRegistry;
    use saga_store::{InMemorySagaStore, JsonObject, SagaDefinition, SagaType, StepTemplate};

    async fn saga_with_completed_steps(
        store: &InMemorySagaStore,
        templates: Vec<StepTemplate>,
        completed: usize,
    ) -> SagaTransaction {
        let def = SagaDefinition::new("refund", SagaType::RefundFlow, templates.clone());
        let saga = SagaTransaction::from_definition(&def, 1, "corr", JsonObject::new());
        let steps: Vec<SagaStep> = templates
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut step = SagaStep::from_template(saga.id, i as u32 + 1, t, 3);
                if i < completed {
                    step.status = StepStatus::Completed;
                    step.response_data = json!({"ref": format!("R{}", i + 1)});
                }
                step
            })
            .collect();
        store
            .create_saga(
                saga.clone(),
                steps,
                SagaEvent::new(saga.id, EventType::SagaStarted, "started"),
            )
            .await
            .unwrap();
        saga
    }

    fn engine(
        store: &InMemorySagaStore,
        client: &InMemoryServiceClient,
    ) -> CompensationEngine<InMemorySagaStore, InMemoryServiceClient> {
        let registry = Arc::new(ServiceRegistry::new().with_service("wallet_service", "http://w"));
        CompensationEngine::new(store.clone(), Dispatcher::new(client.clone(), registry))
    }

    #[tokio::test]
    async fn test_unwinds_in_reverse_order() {
        let store = InMemorySagaStore::new();
        let client = InMemoryServiceClient::new();
        client.respond("http://w/undo-a", 200, json!({}));
        client.respond("http://w/undo-b", 200, json!({}));
        let saga = saga_with_completed_steps(
            &store,
            vec![
                StepTemplate::new("a", "wallet_service", "/a").with_compensation(
                    "wallet_service",
                    "/undo-a",
                    json!({"ref": "${response.ref}"}),
                ),
                StepTemplate::new("b", "wallet_service", "/b").with_compensation(
                    "wallet_service",
                    "/undo-b",
                    json!({"ref": "${response.ref}"}),
                ),
                StepTemplate::new("c", "wallet_service", "/c")
                    .with_compensation("wallet_service", "/undo-c", json!({})),
            ],
            2,
        )
        .await;

        let report = engine(&store, &client)
            .unwind(&saga, &TemplateFlow, None)
            .await
            .unwrap();

        assert_eq!(report.compensated, vec!["b", "a"]);
        assert!(report.is_complete());
        let urls: Vec<_> = client.calls().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, vec!["http://w/undo-b", "http://w/undo-a"]);
        assert_eq!(client.calls()[0].body, json!({"ref": "R2"}));

        let steps = store.steps_for_saga(saga.id).await.unwrap();
        assert_eq!(steps[2].status, StepStatus::Pending);
    }

    #[tokio::test]
    async fn test_failure_continues_with_earlier_steps() {
        let store = InMemorySagaStore::new();
        let client = InMemoryServiceClient::new();
        client.respond("http://w/undo-a", 200, json!({}));
        client.respond("http://w/undo-b", 500, json!({"error": "down"}));
        let saga = saga_with_completed_steps(
            &store,
            vec![
                StepTemplate::new("a", "wallet_service", "/a")
                    .with_compensation("wallet_service", "/undo-a", json!({})),
                StepTemplate::new("b", "wallet_service", "/b")
                    .with_compensation("wallet_service", "/undo-b", json!({})),
            ],
            2,
        )
        .await;

        let report = engine(&store, &client)
            .unwind(&saga, &TemplateFlow, None)
            .await
            .unwrap();

        assert_eq!(report.compensated, vec!["a"]);
        assert_eq!(report.failed, vec!["b"]);
        let steps = store.steps_for_saga(saga.id).await.unwrap();
        assert_eq!(steps[0].status, StepStatus::Compensated);
        assert_eq!(steps[1].status, StepStatus::RollbackFailed);
    }

    #[tokio::test]
    async fn test_step_without_target_is_noop() {
        let store = InMemorySagaStore::new();
        let client = InMemoryServiceClient::new();
        let saga = saga_with_completed_steps(
            &store,
            vec![StepTemplate::new("check", "wallet_service", "/check")],
            1,
        )
        .await;

        let report = engine(&store, &client)
            .unwind(&saga, &TemplateFlow, None)
            .await
            .unwrap();

        assert_eq!(report.compensated, vec!["check"]);
        assert_eq!(client.call_count(), 0);
        let events = store.events_for_saga(saga.id).await.unwrap();
        assert_eq!(events.last().unwrap().event_type, EventType::StepCompensated);
    }
}
