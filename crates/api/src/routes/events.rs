//! Audit log endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use saga::ServiceClient;
use saga_store::{EventQuery, SagaEvent, SagaStore};
use serde::Deserialize;

use super::{AppState, parse_filter, parse_saga_id};
use crate::error::ApiError;

#[derive(Deserialize, Default)]
pub struct ListEventsParams {
    pub saga_id: Option<String>,
    pub event_type: Option<String>,
    pub limit: Option<usize>,
}

/// GET /events: saga events newest first, optionally filtered by saga and type.
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    params: Result<Query<ListEventsParams>, QueryRejection>,
) -> Result<Json<Vec<SagaEvent>>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Query(params) = params?;
    let query = EventQuery {
        saga_id: params
            .saga_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(parse_saga_id)
            .transpose()?,
        event_type: parse_filter("event_type", params.event_type.as_deref())?,
        limit: params.limit,
    };
    let mut events = state.orchestrator.query_events(query).await?;
    events.reverse();
    Ok(Json(events))
}
