//! Generic saga endpoints: start, inspect, retry and statistics.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use saga::{SagaDetails, SagaStatusView, ServiceClient, StartSaga};
use saga_store::{SagaQuery, SagaStatistics, SagaStore, SagaTransaction, SagaType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AppState, parse_filter, parse_saga_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct StartSagaRequest {
    pub saga_type: String,
    pub user_id: i64,
    #[serde(default)]
    pub input_data: Value,
    pub correlation_id: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ListSagasParams {
    pub user_id: Option<i64>,
    pub saga_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
pub struct SagaListResponse {
    pub count: u64,
    pub sagas: Vec<SagaTransaction>,
}

#[derive(Serialize)]
pub struct StatisticsResponse {
    #[serde(flatten)]
    pub counts: SagaStatistics,
    pub success_rate: f64,
}

#[derive(Serialize)]
pub struct RetryResponse {
    pub detail: &'static str,
    pub saga: SagaTransaction,
}

// -- Handlers --

/// POST /sagas/start: create a saga and queue it for execution.
#[tracing::instrument(skip(state, payload))]
pub async fn start<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    payload: Result<Json<StartSagaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SagaDetails>), ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Json(req) = payload?;
    let saga_type = parse_filter::<SagaType>("saga_type", Some(&req.saga_type))?
        .ok_or_else(|| ApiError::BadRequest("saga_type is required".to_string()))?;

    let details = state
        .orchestrator
        .start(StartSaga {
            saga_type,
            user_id: req.user_id,
            input_data: req.input_data,
            correlation_id: req.correlation_id.filter(|id| !id.is_empty()),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

/// GET /sagas: list sagas, newest first.
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    params: Result<Query<ListSagasParams>, QueryRejection>,
) -> Result<Json<SagaListResponse>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Query(params) = params?;
    let filter = SagaQuery {
        user_id: params.user_id,
        saga_type: parse_filter("saga_type", params.saga_type.as_deref())?,
        status: parse_filter("status", params.status.as_deref())?,
        limit: None,
        offset: None,
    };

    let count = state.orchestrator.count_sagas(filter.clone()).await?;
    let sagas = state
        .orchestrator
        .list_sagas(SagaQuery {
            limit: params.limit,
            offset: params.offset,
            ..filter
        })
        .await?;

    Ok(Json(SagaListResponse { count, sagas }))
}

/// GET /sagas/{id}: saga with its steps and events.
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaDetails>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let id = parse_saga_id(&id)?;
    Ok(Json(state.orchestrator.get_saga_details(id).await?))
}

/// GET /sagas/{id}/status: progress summary.
pub async fn status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusView>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let id = parse_saga_id(&id)?;
    Ok(Json(state.orchestrator.status(id).await?))
}

/// POST /sagas/{id}/retry: rerun a failed or timed-out saga.
#[tracing::instrument(skip(state))]
pub async fn retry<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<RetryResponse>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let id = parse_saga_id(&id)?;
    let saga = state.orchestrator.retry_saga(id).await?;
    Ok(Json(RetryResponse {
        detail: "Saga retry initiated",
        saga,
    }))
}

/// GET /sagas/statistics: counts per status.
pub async fn statistics<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<StatisticsResponse>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let counts = state.orchestrator.statistics().await?;
    let success_rate = counts.success_rate();
    Ok(Json(StatisticsResponse {
        counts,
        success_rate,
    }))
}
