use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    DefinitionId, DefinitionQuery, EventQuery, JsonObject, Result, SagaDefinition, SagaEvent,
    SagaId, SagaQuery, SagaStatistics, SagaStatus, SagaStep, SagaTransaction, SagaTransition,
    SagaType, StepId, StepStatus, StoreError,
    store::SagaStore,
};

#[derive(Default)]
struct State {
    definitions: Vec<SagaDefinition>,
    sagas: HashMap<SagaId, SagaTransaction>,
    steps: HashMap<StepId, SagaStep>,
    events: Vec<SagaEvent>,
}

/// In-memory saga store for tests and single-process deployments.
///
/// All records live behind one lock, so every trait method observes and
/// produces a consistent snapshot, matching the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    state: Arc<RwLock<State>>,
}

impl InMemorySagaStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of audit events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Clears every record.
    pub async fn clear(&self) {
        *self.state.write().await = State::default();
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn save_definition(&self, definition: SagaDefinition) -> Result<SagaDefinition> {
        let mut state = self.state.write().await;

        if state
            .definitions
            .iter()
            .any(|d| d.name == definition.name && d.version == definition.version)
        {
            return Err(StoreError::DuplicateDefinition {
                name: definition.name,
                version: definition.version,
            });
        }

        if definition.is_active {
            let now = Utc::now();
            for existing in state
                .definitions
                .iter_mut()
                .filter(|d| d.saga_type == definition.saga_type && d.is_active)
            {
                existing.is_active = false;
                existing.updated_at = now;
            }
        }

        state.definitions.push(definition.clone());
        Ok(definition)
    }

    async fn get_definition(&self, id: DefinitionId) -> Result<Option<SagaDefinition>> {
        let state = self.state.read().await;
        Ok(state.definitions.iter().find(|d| d.id == id).cloned())
    }

    async fn active_definition(&self, saga_type: SagaType) -> Result<Option<SagaDefinition>> {
        let state = self.state.read().await;
        Ok(state
            .definitions
            .iter()
            .find(|d| d.saga_type == saga_type && d.is_active)
            .cloned())
    }

    async fn list_definitions(&self, query: DefinitionQuery) -> Result<Vec<SagaDefinition>> {
        let state = self.state.read().await;
        let mut definitions: Vec<_> = state
            .definitions
            .iter()
            .filter(|d| query.saga_type.is_none_or(|t| d.saga_type == t))
            .filter(|d| query.is_active.is_none_or(|a| d.is_active == a))
            .cloned()
            .collect();
        definitions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(definitions)
    }

    async fn create_saga(
        &self,
        saga: SagaTransaction,
        steps: Vec<SagaStep>,
        event: SagaEvent,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        if state
            .sagas
            .values()
            .any(|s| s.correlation_id == saga.correlation_id)
        {
            return Err(StoreError::DuplicateCorrelationId(saga.correlation_id));
        }

        state.sagas.insert(saga.id, saga);
        state.steps.extend(steps.into_iter().map(|s| (s.id, s)));
        state.events.push(event);
        Ok(())
    }

    async fn get_saga(&self, id: SagaId) -> Result<Option<SagaTransaction>> {
        Ok(self.state.read().await.sagas.get(&id).cloned())
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<SagaTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .sagas
            .values()
            .find(|s| s.correlation_id == correlation_id)
            .cloned())
    }

    async fn list_sagas(&self, query: SagaQuery) -> Result<Vec<SagaTransaction>> {
        let state = self.state.read().await;
        let mut sagas: Vec<_> = state
            .sagas
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        sagas.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(sagas.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_sagas(&self, query: SagaQuery) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.sagas.values().filter(|s| query.matches(s)).count() as u64)
    }

    async fn transition_saga(
        &self,
        id: SagaId,
        transition: SagaTransition,
    ) -> Result<Option<SagaTransaction>> {
        let mut state = self.state.write().await;
        let saga = state.sagas.get_mut(&id).ok_or(StoreError::SagaNotFound(id))?;

        if transition.apply(saga, Utc::now()) {
            Ok(Some(saga.clone()))
        } else {
            Ok(None)
        }
    }

    async fn merge_context(&self, id: SagaId, patch: JsonObject) -> Result<SagaTransaction> {
        let mut state = self.state.write().await;
        let saga = state.sagas.get_mut(&id).ok_or(StoreError::SagaNotFound(id))?;

        saga.context_data.extend(patch);
        saga.updated_at = Utc::now();
        Ok(saga.clone())
    }

    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<SagaTransaction>> {
        let mut state = self.state.write().await;
        let transition = SagaTransition::new(
            &[SagaStatus::Pending, SagaStatus::InProgress],
            SagaStatus::Timeout,
        )
        .with_error("Saga timed out");

        let mut expired = Vec::new();
        for saga in state.sagas.values_mut() {
            if saga.is_overdue(now) && transition.apply(saga, now) {
                expired.push(saga.clone());
            }
        }
        Ok(expired)
    }

    async fn statistics(&self) -> Result<SagaStatistics> {
        let state = self.state.read().await;
        let mut stats = SagaStatistics::default();
        for saga in state.sagas.values() {
            stats.record(saga.status, 1);
        }
        Ok(stats)
    }

    async fn steps_for_saga(&self, saga_id: SagaId) -> Result<Vec<SagaStep>> {
        let state = self.state.read().await;
        let mut steps: Vec<_> = state
            .steps
            .values()
            .filter(|s| s.saga_id == saga_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    async fn get_step(&self, id: StepId) -> Result<Option<SagaStep>> {
        Ok(self.state.read().await.steps.get(&id).cloned())
    }

    async fn update_step(&self, step: &SagaStep) -> Result<()> {
        let mut state = self.state.write().await;
        let slot = state
            .steps
            .get_mut(&step.id)
            .ok_or(StoreError::StepNotFound(step.id))?;
        *slot = step.clone();
        Ok(())
    }

    async fn claim_step_for_retry(&self, id: StepId) -> Result<Option<SagaStep>> {
        let mut state = self.state.write().await;
        let step = state.steps.get_mut(&id).ok_or(StoreError::StepNotFound(id))?;

        if step.status != StepStatus::Failed || step.retry_count >= step.max_retries {
            return Ok(None);
        }
        step.status = StepStatus::Pending;
        step.retry_count += 1;
        step.error_message = None;
        Ok(Some(step.clone()))
    }

    async fn retryable_steps(&self, now: DateTime<Utc>) -> Result<Vec<SagaStep>> {
        let state = self.state.read().await;
        let mut steps: Vec<_> = state
            .steps
            .values()
            .filter(|step| {
                state.sagas.get(&step.saga_id).is_some_and(|saga| {
                    saga.status == SagaStatus::InProgress
                        && step.is_retry_due(saga.retry_delay_seconds, now)
                })
            })
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.failed_at, s.step_order));
        Ok(steps)
    }

    async fn reset_steps(&self, saga_id: SagaId, from: &[StepStatus]) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut count = 0;
        for step in state
            .steps
            .values_mut()
            .filter(|s| s.saga_id == saga_id && from.contains(&s.status))
        {
            step.status = StepStatus::Pending;
            step.error_message = None;
            step.started_at = None;
            step.completed_at = None;
            step.failed_at = None;
            count += 1;
        }
        Ok(count)
    }

    async fn append_event(&self, event: SagaEvent) -> Result<()> {
        self.state.write().await.events.push(event);
        Ok(())
    }

    async fn events_for_saga(&self, saga_id: SagaId) -> Result<Vec<SagaEvent>> {
        self.query_events(EventQuery::for_saga(saga_id)).await
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<SagaEvent>> {
        let state = self.state.read().await;
        // Append order is the log order; timestamps can tie.
        let events: Vec<_> = state
            .events
            .iter()
            .filter(|e| query.saga_id.is_none_or(|id| e.saga_id == id))
            .filter(|e| query.event_type.is_none_or(|t| e.event_type == t))
            .cloned()
            .collect();

        let skip = query
            .limit
            .map_or(0, |limit| events.len().saturating_sub(limit));
        Ok(events.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventType, StepTemplate, store::SagaStoreExt};
    use chrono::Duration;
    use serde_json::json;

    fn definition(saga_type: SagaType, version: &str) -> SagaDefinition {
        SagaDefinition::new(
            "deposit",
            saga_type,
            vec![
                StepTemplate::new("reserve", "wallet_service", "/reserve"),
                StepTemplate::new("confirm", "wallet_service", "/confirm"),
            ],
        )
        .with_version(version)
    }

    async fn seed_saga(store: &InMemorySagaStore, correlation_id: &str) -> SagaTransaction {
        let def = definition(SagaType::DepositFlow, "1.0");
        let saga = SagaTransaction::from_definition(&def, 1, correlation_id, JsonObject::new());
        let steps = def
            .steps
            .iter()
            .enumerate()
            .map(|(i, t)| SagaStep::from_template(saga.id, i as u32 + 1, t, def.max_retries))
            .collect();
        let event = SagaEvent::new(saga.id, EventType::SagaStarted, "started");
        store.create_saga(saga.clone(), steps, event).await.unwrap();
        saga
    }

    #[tokio::test]
    async fn test_saving_active_definition_deactivates_previous() {
        let store = InMemorySagaStore::new();
        let v1 = store
            .save_definition(definition(SagaType::DepositFlow, "1.0"))
            .await
            .unwrap();
        let v2 = store
            .save_definition(definition(SagaType::DepositFlow, "2.0"))
            .await
            .unwrap();

        let active = store.active_definition(SagaType::DepositFlow).await.unwrap();
        assert_eq!(active.unwrap().id, v2.id);

        let old = store.get_definition(v1.id).await.unwrap().unwrap();
        assert!(!old.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_definition_version_rejected() {
        let store = InMemorySagaStore::new();
        store
            .save_definition(definition(SagaType::DepositFlow, "1.0"))
            .await
            .unwrap();

        let result = store
            .save_definition(definition(SagaType::DepositFlow, "1.0"))
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateDefinition { .. })));
    }

    #[tokio::test]
    async fn test_list_definitions_filters() {
        let store = InMemorySagaStore::new();
        store
            .save_definition(definition(SagaType::DepositFlow, "1.0"))
            .await
            .unwrap();
        store
            .save_definition(definition(SagaType::DepositFlow, "2.0"))
            .await
            .unwrap();

        let active = store
            .list_definitions(DefinitionQuery {
                saga_type: Some(SagaType::DepositFlow),
                is_active: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].version, "2.0");

        let all = store.list_definitions(DefinitionQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_create_saga_rejects_duplicate_correlation_id() {
        let store = InMemorySagaStore::new();
        seed_saga(&store, "corr-1").await;

        let def = definition(SagaType::DepositFlow, "1.0");
        let again = SagaTransaction::from_definition(&def, 1, "corr-1", JsonObject::new());
        let event = SagaEvent::new(again.id, EventType::SagaStarted, "started");
        let result = store.create_saga(again.clone(), vec![], event).await;

        assert!(matches!(result, Err(StoreError::DuplicateCorrelationId(_))));
        assert!(store.get_saga(again.id).await.unwrap().is_none());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_steps_are_ordered() {
        let store = InMemorySagaStore::new();
        let saga = seed_saga(&store, "corr").await;

        let steps = store.steps_for_saga(saga.id).await.unwrap();
        let names: Vec<_> = steps.iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(names, vec!["reserve", "confirm"]);

        let confirm = store.step_by_name(saga.id, "confirm").await.unwrap();
        assert_eq!(confirm.unwrap().step_order, 2);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = InMemorySagaStore::new();
        let saga = seed_saga(&store, "corr").await;

        let claim = SagaTransition::new(&[SagaStatus::Pending], SagaStatus::InProgress);
        assert!(store.transition_saga(saga.id, claim.clone()).await.unwrap().is_some());
        assert!(store.transition_saga(saga.id, claim).await.unwrap().is_none());

        let current = store.require_saga(saga.id).await.unwrap();
        assert_eq!(current.status, SagaStatus::InProgress);
        assert!(current.started_at.is_some());
    }

    #[tokio::test]
    async fn test_transition_unknown_saga() {
        let store = InMemorySagaStore::new();
        let result = store
            .transition_saga(
                SagaId::new(),
                SagaTransition::new(&[SagaStatus::Pending], SagaStatus::InProgress),
            )
            .await;
        assert!(matches!(result, Err(StoreError::SagaNotFound(_))));
    }

    #[tokio::test]
    async fn test_merge_context_overwrites_keys() {
        let store = InMemorySagaStore::new();
        let saga = seed_saga(&store, "corr").await;

        let first = json!({"a": 1, "b": 1}).as_object().cloned().unwrap();
        let second = json!({"b": 2}).as_object().cloned().unwrap();
        store.merge_context(saga.id, first).await.unwrap();
        let updated = store.merge_context(saga.id, second).await.unwrap();

        assert_eq!(updated.context_data["a"], 1);
        assert_eq!(updated.context_data["b"], 2);
    }

    #[tokio::test]
    async fn test_expire_overdue_only_touches_live_sagas() {
        let store = InMemorySagaStore::new();
        let live = seed_saga(&store, "live").await;
        let done = seed_saga(&store, "done").await;
        store
            .transition_saga(
                done.id,
                SagaTransition::new(&[SagaStatus::Pending], SagaStatus::Completed),
            )
            .await
            .unwrap();

        let later = Utc::now() + Duration::seconds(3600);
        let expired = store.expire_overdue(later).await.unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, live.id);
        assert_eq!(expired[0].status, SagaStatus::Timeout);
        assert!(store.expire_overdue(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_step_for_retry_respects_budget() {
        let store = InMemorySagaStore::new();
        let saga = seed_saga(&store, "corr").await;
        let mut step = store.steps_for_saga(saga.id).await.unwrap().remove(0);

        assert!(store.claim_step_for_retry(step.id).await.unwrap().is_none());

        step.status = StepStatus::Failed;
        step.max_retries = 1;
        store.update_step(&step).await.unwrap();

        let claimed = store.claim_step_for_retry(step.id).await.unwrap().unwrap();
        assert_eq!(claimed.status, StepStatus::Pending);
        assert_eq!(claimed.retry_count, 1);

        step.status = StepStatus::Failed;
        step.retry_count = 1;
        store.update_step(&step).await.unwrap();
        assert!(store.claim_step_for_retry(step.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retryable_steps_require_in_progress_parent_and_elapsed_delay() {
        let store = InMemorySagaStore::new();
        let saga = seed_saga(&store, "corr").await;
        let now = Utc::now();
        let mut step = store.steps_for_saga(saga.id).await.unwrap().remove(0);
        step.status = StepStatus::Failed;
        step.failed_at = Some(now);
        store.update_step(&step).await.unwrap();

        // Parent still pending.
        let later = now + Duration::seconds(10);
        assert!(store.retryable_steps(later).await.unwrap().is_empty());

        store
            .transition_saga(
                saga.id,
                SagaTransition::new(&[SagaStatus::Pending], SagaStatus::InProgress),
            )
            .await
            .unwrap();
        assert!(store.retryable_steps(now).await.unwrap().is_empty());
        assert_eq!(store.retryable_steps(later).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_steps() {
        let store = InMemorySagaStore::new();
        let saga = seed_saga(&store, "corr").await;
        let mut steps = store.steps_for_saga(saga.id).await.unwrap();
        steps[0].status = StepStatus::Completed;
        steps[1].status = StepStatus::Failed;
        steps[1].error_message = Some("boom".into());
        for step in &steps {
            store.update_step(step).await.unwrap();
        }

        let reset = store
            .reset_steps(saga.id, &[StepStatus::Failed, StepStatus::InProgress])
            .await
            .unwrap();
        assert_eq!(reset, 1);

        let steps = store.steps_for_saga(saga.id).await.unwrap();
        assert_eq!(steps[0].status, StepStatus::Completed);
        assert_eq!(steps[1].status, StepStatus::Pending);
        assert!(steps[1].error_message.is_none());
    }

    #[tokio::test]
    async fn test_event_queries() {
        let store = InMemorySagaStore::new();
        let saga = seed_saga(&store, "corr").await;
        let other = seed_saga(&store, "other").await;
        for i in 0..3 {
            store
                .append_event(SagaEvent::new(saga.id, EventType::StepCompleted, format!("step {i}")))
                .await
                .unwrap();
        }

        let events = store.events_for_saga(saga.id).await.unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].event_type, EventType::SagaStarted);

        let latest = store
            .query_events(EventQuery::for_saga(saga.id).latest(2))
            .await
            .unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1].message.as_deref(), Some("step 2"));

        let started = store
            .query_events(EventQuery::new().event_type(EventType::SagaStarted))
            .await
            .unwrap();
        assert_eq!(started.len(), 2);
        assert!(started.iter().any(|e| e.saga_id == other.id));
    }

    #[tokio::test]
    async fn test_list_count_and_statistics() {
        let store = InMemorySagaStore::new();
        let a = seed_saga(&store, "a").await;
        seed_saga(&store, "b").await;
        store
            .transition_saga(
                a.id,
                SagaTransition::new(&[SagaStatus::Pending], SagaStatus::Completed),
            )
            .await
            .unwrap();

        let pending = SagaQuery::new().status(SagaStatus::Pending);
        assert_eq!(store.count_sagas(pending.clone()).await.unwrap(), 1);
        assert_eq!(store.list_sagas(pending).await.unwrap().len(), 1);
        assert_eq!(store.list_sagas(SagaQuery::new().limit(1)).await.unwrap().len(), 1);

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total_sagas, 2);
        assert_eq!(stats.completed_sagas, 1);
        assert_eq!(stats.pending_sagas, 1);
        assert_eq!(stats.success_rate(), 50.0);
    }
}
