//! Saga definitions: administrator-authored workflow templates.

use chrono::{DateTime, Utc};
use common::DefinitionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::{HttpMethod, SagaType, StepType};

fn default_timeout_seconds() -> u32 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u32 {
    5
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_active() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Template for the compensating call paired with a forward step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationTemplate {
    pub service: String,
    pub endpoint: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Payload template; may reference `${response.*}`, `${input.*}` and `${context.*}`.
    #[serde(default = "empty_object")]
    pub data: Value,
}

/// Static definition of a step before it is materialized into a saga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    pub service: String,
    pub endpoint: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default = "empty_object")]
    pub request_template: Value,
    #[serde(default)]
    pub compensation: Option<CompensationTemplate>,
    /// Overrides the definition-wide retry budget for this step.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl StepTemplate {
    /// Creates a POST step with an empty request template and no compensation.
    pub fn new(
        name: impl Into<String>,
        service: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            step_type: StepType::ServiceCall,
            service: service.into(),
            endpoint: endpoint.into(),
            method: HttpMethod::Post,
            request_template: empty_object(),
            compensation: None,
            max_retries: None,
        }
    }

    pub fn with_type(mut self, step_type: StepType) -> Self {
        self.step_type = step_type;
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_request(mut self, template: Value) -> Self {
        self.request_template = template;
        self
    }

    pub fn with_compensation(
        mut self,
        service: impl Into<String>,
        endpoint: impl Into<String>,
        data: Value,
    ) -> Self {
        self.compensation = Some(CompensationTemplate {
            service: service.into(),
            endpoint: endpoint.into(),
            method: HttpMethod::Post,
            data,
        });
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// A versioned workflow template for one saga type.
///
/// Only one definition per saga type is active at a time. Sagas snapshot the
/// active definition's steps when they start, so later edits never reach
/// sagas that are already running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaDefinition {
    #[serde(default)]
    pub id: DefinitionId,
    pub name: String,
    pub saga_type: SagaType,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepTemplate>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u32,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl SagaDefinition {
    /// Creates an active version "1.0" definition with default timing.
    pub fn new(name: impl Into<String>, saga_type: SagaType, steps: Vec<StepTemplate>) -> Self {
        let now = Utc::now();
        Self {
            id: DefinitionId::new(),
            name: name.into(),
            saga_type,
            description: None,
            steps,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
            version: default_version(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_timeout_seconds(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay_seconds(mut self, seconds: u32) -> Self {
        self.retry_delay_seconds = seconds;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Checks the structural rules a definition must satisfy before it is stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("definition name must not be empty".to_string());
        }
        if self.steps.is_empty() {
            return Err("definition must declare at least one step".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err("step name must not be empty".to_string());
            }
            if !seen.insert(step.name.as_str()) {
                return Err(format!("duplicate step name '{}'", step.name));
            }
            if step.service.trim().is_empty() || step.endpoint.trim().is_empty() {
                return Err(format!("step '{}' needs a service and endpoint", step.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_template_deserializes_with_defaults() {
        let step: StepTemplate = serde_json::from_value(json!({
            "name": "place_bet",
            "service": "betting_service",
            "endpoint": "/api/bets/"
        }))
        .unwrap();

        assert_eq!(step.step_type, StepType::ServiceCall);
        assert_eq!(step.method, HttpMethod::Post);
        assert_eq!(step.request_template, json!({}));
        assert!(step.compensation.is_none());
    }

    #[test]
    fn test_definition_deserializes_with_defaults() {
        let def: SagaDefinition = serde_json::from_value(json!({
            "name": "betting",
            "saga_type": "betting_flow",
            "steps": [{"name": "a", "service": "s", "endpoint": "/a"}]
        }))
        .unwrap();

        assert_eq!(def.timeout_seconds, 300);
        assert_eq!(def.max_retries, 3);
        assert_eq!(def.retry_delay_seconds, 5);
        assert_eq!(def.version, "1.0");
        assert!(def.is_active);
    }

    #[test]
    fn test_validate_rejects_empty_steps() {
        let def = SagaDefinition::new("empty", SagaType::DepositFlow, vec![]);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_step_names() {
        let def = SagaDefinition::new(
            "dup",
            SagaType::DepositFlow,
            vec![
                StepTemplate::new("a", "wallet_service", "/a"),
                StepTemplate::new("a", "wallet_service", "/b"),
            ],
        );
        assert_eq!(def.validate().unwrap_err(), "duplicate step name 'a'");
    }

    #[test]
    fn test_builder_sets_compensation() {
        let step = StepTemplate::new("debit", "wallet_service", "/debit").with_compensation(
            "wallet_service",
            "/credit",
            json!({"tx": "${response.tx_id}"}),
        );
        let comp = step.compensation.unwrap();
        assert_eq!(comp.endpoint, "/credit");
        assert_eq!(comp.method, HttpMethod::Post);
    }
}
