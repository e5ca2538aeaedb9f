//! HTTP route handlers.

pub mod cashout;
pub mod definitions;
pub mod events;
pub mod health;
pub mod metrics;
pub mod sagas;

use std::str::FromStr;
use std::sync::Arc;

use saga::SagaOrchestrator;
use saga_store::SagaId;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C> {
    pub orchestrator: Arc<SagaOrchestrator<S, C>>,
}

pub(crate) fn parse_saga_id(raw: &str) -> Result<SagaId, ApiError> {
    SagaId::parse(raw).map_err(|e| ApiError::BadRequest(format!("Invalid saga id '{raw}': {e}")))
}

/// Parses an optional textual enum filter such as `status=failed`.
pub(crate) fn parse_filter<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    raw.filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("Unknown {field} '{value}'")))
        })
        .transpose()
}
