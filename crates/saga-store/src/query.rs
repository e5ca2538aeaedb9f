use chrono::{DateTime, Utc};
use common::SagaId;
use serde::Serialize;
use serde_json::Value;

use crate::model::{EventType, SagaStatus, SagaTransaction, SagaType};

/// Filter for listing saga transactions. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct SagaQuery {
    pub user_id: Option<i64>,
    pub saga_type: Option<SagaType>,
    pub status: Option<SagaStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SagaQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn saga_type(mut self, saga_type: SagaType) -> Self {
        self.saga_type = Some(saga_type);
        self
    }

    pub fn status(mut self, status: SagaStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `saga` satisfies the filters (paging is ignored).
    pub fn matches(&self, saga: &SagaTransaction) -> bool {
        self.user_id.is_none_or(|id| saga.user_id == id)
            && self.saga_type.is_none_or(|t| saga.saga_type == t)
            && self.status.is_none_or(|s| saga.status == s)
    }
}

/// Filter for the audit log. Results are oldest first.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub saga_id: Option<SagaId>,
    pub event_type: Option<EventType>,
    /// Return the most recent `limit` events instead of all of them.
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_saga(saga_id: SagaId) -> Self {
        Self {
            saga_id: Some(saga_id),
            ..Default::default()
        }
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn latest(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filter for listing saga definitions.
#[derive(Debug, Clone, Default)]
pub struct DefinitionQuery {
    pub saga_type: Option<SagaType>,
    pub is_active: Option<bool>,
}

/// A compare-and-set status change on a saga transaction.
///
/// The store applies the change only while the saga's current status is one of
/// `from`. Timestamps follow the target: entering `InProgress` stamps
/// `started_at` once, entering a terminal status stamps `completed_at`, and
/// returning to `Pending` clears it.
#[derive(Debug, Clone)]
pub struct SagaTransition {
    pub from: Vec<SagaStatus>,
    pub to: SagaStatus,
    pub error_message: Option<String>,
    pub clear_error: bool,
    pub result_data: Option<Value>,
    pub increment_retry: bool,
    pub timeout_at: Option<DateTime<Utc>>,
}

impl SagaTransition {
    pub fn new(from: &[SagaStatus], to: SagaStatus) -> Self {
        Self {
            from: from.to_vec(),
            to,
            error_message: None,
            clear_error: false,
            result_data: None,
            increment_retry: false,
            timeout_at: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn clearing_error(mut self) -> Self {
        self.clear_error = true;
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result_data = Some(result);
        self
    }

    pub fn counting_retry(mut self) -> Self {
        self.increment_retry = true;
        self
    }

    /// Moves the saga's deadline.
    pub fn with_deadline(mut self, timeout_at: DateTime<Utc>) -> Self {
        self.timeout_at = Some(timeout_at);
        self
    }

    /// Applies the transition to an in-memory record.
    ///
    /// Returns false and leaves `saga` untouched if its status is not in `from`.
    pub fn apply(&self, saga: &mut SagaTransaction, now: DateTime<Utc>) -> bool {
        if !self.from.contains(&saga.status) {
            return false;
        }
        saga.status = self.to;
        saga.updated_at = now;
        if self.to == SagaStatus::InProgress && saga.started_at.is_none() {
            saga.started_at = Some(now);
        }
        if self.to.is_terminal() {
            saga.completed_at = Some(now);
        }
        if self.to == SagaStatus::Pending {
            saga.completed_at = None;
        }
        if self.clear_error {
            saga.error_message = None;
        }
        if let Some(message) = &self.error_message {
            saga.error_message = Some(message.clone());
        }
        if let Some(result) = &self.result_data {
            saga.result_data = result.clone();
        }
        if self.increment_retry {
            saga.retry_count += 1;
        }
        if let Some(deadline) = self.timeout_at {
            saga.timeout_at = Some(deadline);
        }
        true
    }
}

/// Saga counts per status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SagaStatistics {
    pub total_sagas: u64,
    pub pending_sagas: u64,
    pub in_progress_sagas: u64,
    pub completed_sagas: u64,
    pub failed_sagas: u64,
    pub compensating_sagas: u64,
    pub compensated_sagas: u64,
    pub partially_compensated_sagas: u64,
    pub rolled_back_sagas: u64,
    pub timeout_sagas: u64,
}

impl SagaStatistics {
    /// Adds `count` sagas with `status` to the totals.
    pub fn record(&mut self, status: SagaStatus, count: u64) {
        self.total_sagas += count;
        let slot = match status {
            SagaStatus::Pending => &mut self.pending_sagas,
            SagaStatus::InProgress => &mut self.in_progress_sagas,
            SagaStatus::Completed => &mut self.completed_sagas,
            SagaStatus::Failed => &mut self.failed_sagas,
            SagaStatus::Compensating => &mut self.compensating_sagas,
            SagaStatus::Compensated => &mut self.compensated_sagas,
            SagaStatus::PartiallyCompensated => &mut self.partially_compensated_sagas,
            SagaStatus::RolledBack => &mut self.rolled_back_sagas,
            SagaStatus::Timeout => &mut self.timeout_sagas,
        };
        *slot += count;
    }

    /// Percentage of sagas that completed, rounded to two decimals.
    pub fn success_rate(&self) -> f64 {
        if self.total_sagas == 0 {
            return 0.0;
        }
        let rate = self.completed_sagas as f64 / self.total_sagas as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}
