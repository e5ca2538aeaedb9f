use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DefinitionId, SagaId, StepId};

use crate::model::{
    JsonObject, SagaDefinition, SagaEvent, SagaStep, SagaTransaction, SagaType, StepStatus,
};
use crate::query::{DefinitionQuery, EventQuery, SagaQuery, SagaStatistics, SagaTransition};
use crate::Result;

/// Core trait for saga persistence.
///
/// Every method is atomic on its own. No operation spans more than one saga,
/// and apart from [`SagaStore::create_saga`] no operation writes more than one
/// kind of record. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Stores a new definition.
    ///
    /// Saving an active definition deactivates every other active definition
    /// of the same saga type. Fails with `DuplicateDefinition` if the
    /// `(name, version)` pair is taken.
    async fn save_definition(&self, definition: SagaDefinition) -> Result<SagaDefinition>;

    async fn get_definition(&self, id: DefinitionId) -> Result<Option<SagaDefinition>>;

    /// Returns the single active definition for a saga type, if any.
    async fn active_definition(&self, saga_type: SagaType) -> Result<Option<SagaDefinition>>;

    /// Lists definitions, newest first.
    async fn list_definitions(&self, query: DefinitionQuery) -> Result<Vec<SagaDefinition>>;

    /// Persists a new saga, its full step set and its first audit event in one
    /// atomic write.
    ///
    /// Fails with `DuplicateCorrelationId` if the correlation id is taken, in
    /// which case nothing is written.
    async fn create_saga(
        &self,
        saga: SagaTransaction,
        steps: Vec<SagaStep>,
        event: SagaEvent,
    ) -> Result<()>;

    async fn get_saga(&self, id: SagaId) -> Result<Option<SagaTransaction>>;

    async fn find_by_correlation_id(&self, correlation_id: &str)
    -> Result<Option<SagaTransaction>>;

    /// Lists sagas matching `query`, newest first.
    async fn list_sagas(&self, query: SagaQuery) -> Result<Vec<SagaTransaction>>;

    /// Counts sagas matching `query`, ignoring paging.
    async fn count_sagas(&self, query: SagaQuery) -> Result<u64>;

    /// Applies a compare-and-set status change.
    ///
    /// Returns the updated saga, or `None` if its status was not in
    /// `transition.from`. Fails with `SagaNotFound` for an unknown id.
    async fn transition_saga(
        &self,
        id: SagaId,
        transition: SagaTransition,
    ) -> Result<Option<SagaTransaction>>;

    /// Merges `patch` into the saga's context. Existing keys are overwritten.
    async fn merge_context(&self, id: SagaId, patch: JsonObject) -> Result<SagaTransaction>;

    /// Moves every pending or in-progress saga whose deadline is before `now`
    /// to `Timeout` and returns the sagas that were expired.
    async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<SagaTransaction>>;

    async fn statistics(&self) -> Result<SagaStatistics>;

    /// Returns a saga's steps in ascending order.
    async fn steps_for_saga(&self, saga_id: SagaId) -> Result<Vec<SagaStep>>;

    async fn get_step(&self, id: StepId) -> Result<Option<SagaStep>>;

    /// Overwrites a step row.
    async fn update_step(&self, step: &SagaStep) -> Result<()>;

    /// Atomically moves a failed step back to pending and counts the retry.
    ///
    /// Returns `None` if the step is not failed or has used up its retries.
    async fn claim_step_for_retry(&self, id: StepId) -> Result<Option<SagaStep>>;

    /// Returns failed steps with retries left whose parent saga is still in
    /// progress and whose retry delay has elapsed at `now`.
    async fn retryable_steps(&self, now: DateTime<Utc>) -> Result<Vec<SagaStep>>;

    /// Resets every step of `saga_id` whose status is in `from` to pending.
    /// Returns the number of steps reset.
    async fn reset_steps(&self, saga_id: SagaId, from: &[StepStatus]) -> Result<u64>;

    /// Appends an entry to the audit log.
    async fn append_event(&self, event: SagaEvent) -> Result<()>;

    /// Returns a saga's audit log, oldest first.
    async fn events_for_saga(&self, saga_id: SagaId) -> Result<Vec<SagaEvent>>;

    /// Queries the audit log, oldest first.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<SagaEvent>>;
}

/// Extension trait providing convenience methods for saga stores.
#[async_trait]
pub trait SagaStoreExt: SagaStore {
    /// Loads a saga, failing with `SagaNotFound` if it does not exist.
    async fn require_saga(&self, id: SagaId) -> Result<SagaTransaction> {
        self.get_saga(id)
            .await?
            .ok_or(crate::StoreError::SagaNotFound(id))
    }

    /// Loads a saga's step by name.
    async fn step_by_name(&self, saga_id: SagaId, name: &str) -> Result<Option<SagaStep>> {
        Ok(self
            .steps_for_saga(saga_id)
            .await?
            .into_iter()
            .find(|step| step.step_name == name))
    }
}

// Blanket implementation for all SagaStore implementations
impl<T: SagaStore + ?Sized> SagaStoreExt for T {}
