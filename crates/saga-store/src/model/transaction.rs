//! The saga transaction record.

use chrono::{DateTime, Duration, Utc};
use common::SagaId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::definition::SagaDefinition;
use super::status::{SagaStatus, SagaType};

/// JSON object type used for saga input and context.
pub type JsonObject = Map<String, Value>;

/// Durable record of one saga instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaTransaction {
    pub id: SagaId,
    pub saga_type: SagaType,
    pub status: SagaStatus,
    pub user_id: i64,
    /// Globally unique; the idempotency key for starting a saga.
    pub correlation_id: String,
    /// Original request payload. Never modified after start.
    pub input_data: JsonObject,
    /// Accumulated step outputs, last write wins on key collision.
    pub context_data: JsonObject,
    pub result_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub timeout_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub retry_delay_seconds: u32,
    pub error_message: Option<String>,
}

impl SagaTransaction {
    /// Creates a pending transaction, taking timing and retry limits from `definition`.
    pub fn from_definition(
        definition: &SagaDefinition,
        user_id: i64,
        correlation_id: impl Into<String>,
        input_data: JsonObject,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::new(),
            saga_type: definition.saga_type,
            status: SagaStatus::Pending,
            user_id,
            correlation_id: correlation_id.into(),
            input_data,
            context_data: JsonObject::new(),
            result_data: Value::Object(JsonObject::new()),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            timeout_at: Some(now + Duration::seconds(i64::from(definition.timeout_seconds))),
            retry_count: 0,
            max_retries: definition.max_retries,
            retry_delay_seconds: definition.retry_delay_seconds,
            error_message: None,
        }
    }

    /// Returns true if `timeout_at` lies strictly before `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.timeout_at.is_some_and(|deadline| deadline < now)
    }

    /// Returns true if a saga-level retry is currently permitted.
    pub fn can_retry(&self) -> bool {
        self.status.is_retryable() && self.retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::definition::StepTemplate;
    use serde_json::json;

    fn definition() -> SagaDefinition {
        SagaDefinition::new(
            "deposit",
            SagaType::DepositFlow,
            vec![StepTemplate::new("credit", "wallet_service", "/credit")],
        )
        .with_timeout_seconds(60)
        .with_max_retries(2)
    }

    #[test]
    fn test_from_definition_starts_pending() {
        let input = json!({"amount": 10}).as_object().cloned().unwrap();
        let tx = SagaTransaction::from_definition(&definition(), 7, "corr-1", input);

        assert_eq!(tx.status, SagaStatus::Pending);
        assert_eq!(tx.saga_type, SagaType::DepositFlow);
        assert_eq!(tx.user_id, 7);
        assert_eq!(tx.max_retries, 2);
        assert!(tx.context_data.is_empty());
        assert_eq!(
            tx.timeout_at.unwrap() - tx.created_at,
            Duration::seconds(60)
        );
    }

    #[test]
    fn test_is_overdue() {
        let tx = SagaTransaction::from_definition(&definition(), 1, "c", JsonObject::new());
        assert!(!tx.is_overdue(tx.created_at));
        assert!(tx.is_overdue(tx.created_at + Duration::seconds(61)));
    }

    #[test]
    fn test_can_retry_respects_status_and_budget() {
        let mut tx = SagaTransaction::from_definition(&definition(), 1, "c", JsonObject::new());
        assert!(!tx.can_retry());

        tx.status = SagaStatus::Failed;
        assert!(tx.can_retry());

        tx.retry_count = 2;
        assert!(!tx.can_retry());
    }
}
