//! Entries of the append-only saga audit log.

use chrono::{DateTime, Utc};
use common::{EventId, SagaId, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::EventType;

/// One audit log entry. Never mutated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaEvent {
    pub id: EventId,
    pub saga_id: SagaId,
    pub step_id: Option<StepId>,
    pub event_type: EventType,
    pub payload: Value,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SagaEvent {
    /// Creates a saga-level event.
    pub fn new(saga_id: SagaId, event_type: EventType, message: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            saga_id,
            step_id: None,
            event_type,
            payload: Value::Object(Default::default()),
            message: Some(message.into()),
            created_at: Utc::now(),
        }
    }

    /// Attaches the step this event refers to.
    pub fn for_step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }

    /// Attaches a structured payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let saga_id = SagaId::new();
        let step_id = StepId::new();
        let event = SagaEvent::new(saga_id, EventType::StepFailed, "boom")
            .for_step(step_id)
            .with_payload(json!({"status": 500}));

        assert_eq!(event.saga_id, saga_id);
        assert_eq!(event.step_id, Some(step_id));
        assert_eq!(event.event_type, EventType::StepFailed);
        assert_eq!(event.message.as_deref(), Some("boom"));
        assert_eq!(event.payload["status"], 500);
    }
}
