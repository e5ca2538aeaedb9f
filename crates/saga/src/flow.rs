//! Per-saga-type step logic.
//!
//! A [`SagaFlow`] decides what a step sends, whether a 2xx answer is really a
//! success, and how the step is undone. [`TemplateFlow`] drives everything from
//! the definition's templates; specialised flows such as the cash-out flow
//! derive payloads in code.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use saga_store::{EventType, HttpMethod, SagaStep, SagaTransaction, SagaType};

use crate::cashout::CashoutFlow;
use crate::template::Bindings;

/// A call a flow wants made on its behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCall {
    pub service: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub body: Value,
}

/// Step logic for one saga type.
pub trait SagaFlow: Send + Sync {
    /// Builds the forward call for `step`. An error fails the step without a call.
    fn build_request(&self, step: &SagaStep, saga: &SagaTransaction)
    -> Result<OutboundCall, String>;

    /// Inspects a 2xx response body. An error fails the step.
    fn accept(&self, _step: &SagaStep, _body: &Value) -> Result<(), String> {
        Ok(())
    }

    /// Builds the compensating call, or `None` when there is nothing to undo.
    ///
    /// `reason` is set for administrative rollbacks.
    fn build_compensation(
        &self,
        step: &SagaStep,
        saga: &SagaTransaction,
        reason: Option<&str>,
    ) -> Option<OutboundCall>;

    /// Domain event recorded after the generic step-completed event.
    fn completed_event(&self, _step: &SagaStep) -> Option<(EventType, String)> {
        None
    }
}

/// Flow that renders the templates stored on each step.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFlow;

impl SagaFlow for TemplateFlow {
    fn build_request(
        &self,
        step: &SagaStep,
        saga: &SagaTransaction,
    ) -> Result<OutboundCall, String> {
        let bindings = Bindings::new(&saga.input_data, &saga.context_data);
        Ok(OutboundCall {
            service: step.service_name.clone(),
            endpoint: step.service_endpoint.clone(),
            method: step.http_method,
            body: bindings.render(&step.request_data),
        })
    }

    fn build_compensation(
        &self,
        step: &SagaStep,
        saga: &SagaTransaction,
        reason: Option<&str>,
    ) -> Option<OutboundCall> {
        let (service, endpoint) = step
            .compensation_service
            .as_ref()
            .zip(step.compensation_endpoint.as_ref())
            .filter(|_| step.has_compensation())?;

        let bindings = Bindings::new(&saga.input_data, &saga.context_data)
            .with_response(&step.response_data);
        let mut body = bindings.render(&step.compensation_data);
        if let (Some(reason), Value::Object(map)) = (reason, &mut body) {
            map.entry("reason")
                .or_insert_with(|| Value::String(reason.to_string()));
        }

        Some(OutboundCall {
            service: service.clone(),
            endpoint: endpoint.clone(),
            method: step.compensation_method,
            body,
        })
    }
}

/// Maps saga types to their flow, falling back to [`TemplateFlow`].
#[derive(Clone)]
pub struct FlowRegistry {
    flows: HashMap<SagaType, Arc<dyn SagaFlow>>,
    fallback: Arc<dyn SagaFlow>,
}

impl FlowRegistry {
    /// A registry with no specialised flows.
    pub fn templates_only() -> Self {
        Self {
            flows: HashMap::new(),
            fallback: Arc::new(TemplateFlow),
        }
    }

    pub fn register(&mut self, saga_type: SagaType, flow: Arc<dyn SagaFlow>) {
        self.flows.insert(saga_type, flow);
    }

    pub fn get(&self, saga_type: SagaType) -> Arc<dyn SagaFlow> {
        self.flows
            .get(&saga_type)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for FlowRegistry {
    /// Template flow for every type except `cashout_flow`.
    fn default() -> Self {
        let mut registry = Self::templates_only();
        registry.register(SagaType::CashoutFlow, Arc::new(CashoutFlow));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_store::{SagaDefinition, StepTemplate};
    use serde_json::json;

    fn saga_with_step(template: StepTemplate) -> (SagaTransaction, SagaStep) {
        let def = SagaDefinition::new("deposit", SagaType::DepositFlow, vec![template.clone()]);
        let input = json!({"amount": 25, "account": "A-1"}).as_object().cloned().unwrap();
        let mut saga = SagaTransaction::from_definition(&def, 3, "corr", input);
        saga.context_data = json!({"hold_id": "H-7"}).as_object().cloned().unwrap();
        let step = SagaStep::from_template(saga.id, 1, &template, 3);
        (saga, step)
    }

    #[test]
    fn test_template_flow_renders_request() {
        let (saga, step) = saga_with_step(
            StepTemplate::new("capture", "wallet_service", "/capture")
                .with_method(HttpMethod::Put)
                .with_request(json!({"amount": "${input.amount}", "hold": "${context.hold_id}"})),
        );

        let call = TemplateFlow.build_request(&step, &saga).unwrap();
        assert_eq!(call.service, "wallet_service");
        assert_eq!(call.endpoint, "/capture");
        assert_eq!(call.method, HttpMethod::Put);
        assert_eq!(call.body, json!({"amount": 25, "hold": "H-7"}));
    }

    #[test]
    fn test_template_flow_compensation_uses_response() {
        let (saga, mut step) = saga_with_step(
            StepTemplate::new("debit", "wallet_service", "/debit").with_compensation(
                "wallet_service",
                "/refund",
                json!({"transaction_id": "${response.tx}", "account": "${input.account}"}),
            ),
        );
        step.response_data = json!({"tx": "T-1"});

        let call = TemplateFlow
            .build_compensation(&step, &saga, Some("manual"))
            .unwrap();
        assert_eq!(call.endpoint, "/refund");
        assert_eq!(
            call.body,
            json!({"transaction_id": "T-1", "account": "A-1", "reason": "manual"})
        );
    }

    #[test]
    fn test_template_flow_without_compensation() {
        let (saga, step) = saga_with_step(StepTemplate::new("notify", "betting_service", "/n"));
        assert!(TemplateFlow.build_compensation(&step, &saga, None).is_none());
    }

    #[test]
    fn test_registry_falls_back_to_templates() {
        let registry = FlowRegistry::default();
        let (saga, step) = saga_with_step(
            StepTemplate::new("x", "wallet_service", "/x").with_request(json!({"a": "${input.amount}"})),
        );

        let call = registry
            .get(SagaType::DepositFlow)
            .build_request(&step, &saga)
            .unwrap();
        assert_eq!(call.body, json!({"a": 25}));
    }
}
