use std::sync::Arc;
use std::time::Instant;

use saga_store::SagaTransaction;

use crate::client::{ServiceCallError, ServiceClient, ServiceRequest, ServiceResponse};
use crate::flow::OutboundCall;
use crate::registry::ServiceRegistry;

/// Resolves an [`OutboundCall`] against the registry and sends it with the
/// saga's correlation headers.
#[derive(Clone)]
pub struct Dispatcher<C> {
    client: C,
    registry: Arc<ServiceRegistry>,
}

impl<C: ServiceClient> Dispatcher<C> {
    pub fn new(client: C, registry: Arc<ServiceRegistry>) -> Self {
        Self { client, registry }
    }

    pub async fn send(
        &self,
        saga: &SagaTransaction,
        call: &OutboundCall,
    ) -> Result<ServiceResponse, ServiceCallError> {
        let url = self.registry.resolve(&call.service, &call.endpoint)?;
        let request = ServiceRequest {
            method: call.method,
            url,
            body: call.body.clone(),
            correlation_id: saga.correlation_id.clone(),
            user_id: saga.user_id,
        };

        let started = Instant::now();
        let result = self.client.call(request).await;
        metrics::histogram!("saga_service_call_duration_seconds", "service" => call.service.clone())
            .record(started.elapsed().as_secs_f64());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryServiceClient;
    use saga_store::{HttpMethod, JsonObject, SagaDefinition, SagaType, StepTemplate};
    use serde_json::json;

    #[tokio::test]
    async fn test_send_carries_correlation_headers() {
        let client = InMemoryServiceClient::new();
        client.respond("http://wallet/api/debit/", 201, json!({"tx": 1}));
        let registry = Arc::new(ServiceRegistry::new().with_service("wallet_service", "http://wallet"));
        let dispatcher = Dispatcher::new(client.clone(), registry);

        let def = SagaDefinition::new(
            "deposit",
            SagaType::DepositFlow,
            vec![StepTemplate::new("a", "wallet_service", "/a")],
        );
        let saga = SagaTransaction::from_definition(&def, 9, "corr-9", JsonObject::new());
        let call = OutboundCall {
            service: "wallet_service".into(),
            endpoint: "/api/debit/".into(),
            method: HttpMethod::Post,
            body: json!({"amount": 1}),
        };

        let response = dispatcher.send(&saga, &call).await.unwrap();
        assert_eq!(response.status, 201);

        let sent = &client.calls()[0];
        assert_eq!(sent.correlation_id, "corr-9");
        assert_eq!(sent.user_id, 9);
        assert_eq!(sent.body, json!({"amount": 1}));
    }

    #[tokio::test]
    async fn test_unknown_service_makes_no_call() {
        let client = InMemoryServiceClient::new();
        let dispatcher = Dispatcher::new(client.clone(), Arc::new(ServiceRegistry::new()));
        let def = SagaDefinition::new(
            "deposit",
            SagaType::DepositFlow,
            vec![StepTemplate::new("a", "wallet_service", "/a")],
        );
        let saga = SagaTransaction::from_definition(&def, 1, "c", JsonObject::new());
        let call = OutboundCall {
            service: "ghost".into(),
            endpoint: "/x".into(),
            method: HttpMethod::Post,
            body: json!({}),
        };

        let err = dispatcher.send(&saga, &call).await.unwrap_err();
        assert!(matches!(err, ServiceCallError::UnknownService(_)));
        assert_eq!(client.call_count(), 0);
    }
}
