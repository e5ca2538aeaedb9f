//! Materialized saga steps.

use chrono::{DateTime, Utc};
use common::{SagaId, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::definition::StepTemplate;
use super::status::{HttpMethod, StepStatus, StepType};

/// One step of a running saga, snapshotted from its definition at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStep {
    pub id: StepId,
    pub saga_id: SagaId,
    pub step_name: String,
    pub step_type: StepType,
    /// 1-based, unique and strictly increasing within a saga.
    pub step_order: u32,
    pub status: StepStatus,
    pub service_name: String,
    pub service_endpoint: String,
    pub http_method: HttpMethod,
    /// The unrendered request template.
    pub request_data: Value,
    pub response_data: Value,
    pub compensation_service: Option<String>,
    pub compensation_endpoint: Option<String>,
    pub compensation_method: HttpMethod,
    pub compensation_data: Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl SagaStep {
    /// Materializes a template as step number `order` of `saga_id`.
    pub fn from_template(
        saga_id: SagaId,
        order: u32,
        template: &StepTemplate,
        default_max_retries: u32,
    ) -> Self {
        let compensation = template.compensation.as_ref();
        Self {
            id: StepId::new(),
            saga_id,
            step_name: template.name.clone(),
            step_type: template.step_type,
            step_order: order,
            status: StepStatus::Pending,
            service_name: template.service.clone(),
            service_endpoint: template.endpoint.clone(),
            http_method: template.method,
            request_data: template.request_template.clone(),
            response_data: Value::Object(Default::default()),
            compensation_service: compensation.map(|c| c.service.clone()),
            compensation_endpoint: compensation.map(|c| c.endpoint.clone()),
            compensation_method: compensation.map(|c| c.method).unwrap_or_default(),
            compensation_data: compensation
                .map(|c| c.data.clone())
                .unwrap_or_else(|| Value::Object(Default::default())),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failed_at: None,
            error_message: None,
            retry_count: 0,
            max_retries: template.max_retries.unwrap_or(default_max_retries),
        }
    }

    /// Returns true if this step declares a compensating call.
    pub fn has_compensation(&self) -> bool {
        matches!(
            (&self.compensation_service, &self.compensation_endpoint),
            (Some(service), Some(endpoint)) if !service.is_empty() && !endpoint.is_empty()
        )
    }

    /// Returns true if the retry sweep may pick this step up at `now`.
    pub fn is_retry_due(&self, retry_delay_seconds: u32, now: DateTime<Utc>) -> bool {
        self.status == StepStatus::Failed
            && self.retry_count < self.max_retries
            && self.failed_at.is_none_or(|failed_at| {
                failed_at + chrono::Duration::seconds(i64::from(retry_delay_seconds)) <= now
            })
    }
}
