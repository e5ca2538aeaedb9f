//! Cash-out saga endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use saga::{CashoutPage, CashoutRollback, CashoutStatusView, ServiceClient, StartCashout};
use saga_store::{SagaId, SagaStatus, SagaStep, SagaStore};
use serde::{Deserialize, Serialize};

use super::{AppState, parse_filter, parse_saga_id};
use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 20;

// -- Request types --

#[derive(Deserialize)]
pub struct StartCashoutRequest {
    pub bet_slip_id: String,
    pub user_id: i64,
    pub bookmaker_type: Option<String>,
    pub bookmaker_id: Option<String>,
}

#[derive(Deserialize)]
pub struct RollbackRequest {
    pub saga_transaction_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ListCashoutsParams {
    pub user_id: Option<i64>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CashoutStarted {
    pub saga_transaction_id: SagaId,
    pub correlation_id: String,
    pub status: SagaStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct RollbackResponse {
    #[serde(flatten)]
    pub outcome: CashoutRollback,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct StepRetryResponse {
    pub saga_transaction_id: SagaId,
    pub step: SagaStep,
}

// -- Handlers --

/// POST /cashout/start
#[tracing::instrument(skip(state, payload))]
pub async fn start<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    payload: Result<Json<StartCashoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CashoutStarted>), ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Json(req) = payload?;
    let saga = state
        .orchestrator
        .start_cashout(StartCashout {
            bet_slip_id: req.bet_slip_id,
            user_id: req.user_id,
            bookmaker_type: req.bookmaker_type,
            bookmaker_id: req.bookmaker_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CashoutStarted {
            saga_transaction_id: saga.id,
            correlation_id: saga.correlation_id,
            status: saga.status,
            created_at: saga.created_at,
        }),
    ))
}

/// POST /cashout/rollback: undo a finished cash-out.
#[tracing::instrument(skip(state, payload))]
pub async fn rollback<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    payload: Result<Json<RollbackRequest>, JsonRejection>,
) -> Result<Json<RollbackResponse>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Json(req) = payload?;
    let id = parse_saga_id(&req.saga_transaction_id)?;
    let outcome = state
        .orchestrator
        .rollback_cashout(id, req.reason.as_deref().unwrap_or_default())
        .await?;

    Ok(Json(RollbackResponse {
        outcome,
        reason: req.reason,
        timestamp: Utc::now(),
    }))
}

/// GET /cashout/status/{id}
pub async fn status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<CashoutStatusView>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let id = parse_saga_id(&id)?;
    Ok(Json(state.orchestrator.cashout_status(id).await?))
}

/// GET /cashout/list: paginated cash-outs, newest first.
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    params: Result<Query<ListCashoutsParams>, QueryRejection>,
) -> Result<Json<CashoutPage>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let Query(params) = params?;
    let page = state
        .orchestrator
        .list_cashouts(
            params.user_id,
            parse_filter("status", params.status.as_deref())?,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

/// POST /cashout/{id}/retry/{step_name}
#[tracing::instrument(skip(state))]
pub async fn retry_step<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path((id, step_name)): Path<(String, String)>,
) -> Result<Json<StepRetryResponse>, ApiError>
where
    S: SagaStore + Clone + 'static,
    C: ServiceClient + Clone + 'static,
{
    let id = parse_saga_id(&id)?;
    let step = state.orchestrator.retry_cashout_step(id, &step_name).await?;
    Ok(Json(StepRetryResponse {
        saga_transaction_id: id,
        step,
    }))
}
