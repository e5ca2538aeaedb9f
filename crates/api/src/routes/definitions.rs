//! Saga definition endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use saga::ServiceClient;
use saga_store::{DefinitionId, DefinitionQuery, SagaDefinition, SagaStore};
use serde::Deserialize;

use super::{AppState, parse_filter};
use crate::error::ApiError;

#[derive(Deserialize, Default)]
pub struct ListDefinitionsParams {
    pub saga_type: Option<String>,
    pub is_active: Option<bool>,
}

/// GET /definitions
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    params: Result<Query<ListDefinitionsParams>, QueryRejection>,
) -> Result<Json<Vec<SagaDefinition>>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Query(params) = params?;
    let query = DefinitionQuery {
        saga_type: parse_filter("saga_type", params.saga_type.as_deref())?,
        is_active: params.is_active,
    };
    Ok(Json(state.orchestrator.list_definitions(query).await?))
}

/// POST /definitions: register a new definition version.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    payload: Result<Json<SagaDefinition>, JsonRejection>,
) -> Result<(StatusCode, Json<SagaDefinition>), ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Json(definition) = payload?;
    let created = state.orchestrator.create_definition(definition).await?;
    tracing::info!(definition_id = %created.id, name = %created.name, "definition created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /definitions/{id}
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaDefinition>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let id = DefinitionId::parse(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid definition id '{id}': {e}")))?;
    Ok(Json(state.orchestrator.get_definition(id).await?))
}
