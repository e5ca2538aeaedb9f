//! Cash-out saga: six fixed steps with handler-built payloads and a manual
//! rollback entry point.
//!
//! | order | step | service | compensation |
//! |---|---|---|---|
//! | 1 | `cashout_validation` | betting | none |
//! | 2 | `live_odds_fetch` | risk management | none |
//! | 3 | `cashout_quote` | betting | none |
//! | 4 | `wallet_credit` | wallet | wallet rollback |
//! | 5 | `liability_update` | risk management | liability rollback |
//! | 6 | `cashout_completion` | betting | cancel |

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use saga_store::{
    EventQuery, EventType, JsonObject, SagaDefinition, SagaEvent, SagaId, SagaQuery,
    SagaStatus, SagaStep, SagaStore, SagaStoreExt, SagaTransaction, SagaTransition, SagaType,
    StepStatus, StepTemplate, StepType,
};

use crate::client::ServiceClient;
use crate::error::{Result, SagaError};
use crate::flow::{OutboundCall, SagaFlow, TemplateFlow};
use crate::orchestrator::{Progress, SagaOrchestrator, StartSaga};
use crate::queue::WorkItem;
use crate::registry::{BETTING_SERVICE, RISK_MANAGEMENT_SERVICE, WALLET_SERVICE};

pub const STEP_VALIDATION: &str = "cashout_validation";
pub const STEP_LIVE_ODDS: &str = "live_odds_fetch";
pub const STEP_QUOTE: &str = "cashout_quote";
pub const STEP_WALLET_CREDIT: &str = "wallet_credit";
pub const STEP_LIABILITY_UPDATE: &str = "liability_update";
pub const STEP_COMPLETION: &str = "cashout_completion";

pub const DEFAULT_BOOKMAKER_TYPE: &str = "SYSTEM";
pub const DEFAULT_BOOKMAKER_ID: &str = "system";

const DEFAULT_COMPENSATION_REASON: &str = "saga compensation";
const DEFAULT_ROLLBACK_REASON: &str = "manual rollback";
const RECENT_EVENT_LIMIT: usize = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// The built-in cash-out definition, seeded when none is active.
///
/// Payloads come from `CashoutFlow`, so the steps carry no request templates.
pub fn default_definition() -> SagaDefinition {
    SagaDefinition::new(
        "cashout_flow",
        SagaType::CashoutFlow,
        vec![
            StepTemplate::new(STEP_VALIDATION, BETTING_SERVICE, "/api/cashout/check-eligibility/")
                .with_type(StepType::CashoutValidation),
            StepTemplate::new(STEP_LIVE_ODDS, RISK_MANAGEMENT_SERVICE, "/api/cashout/live-odds/")
                .with_type(StepType::RiskManagementCall),
            StepTemplate::new(STEP_QUOTE, BETTING_SERVICE, "/api/cashout/request-quote/")
                .with_type(StepType::BettingServiceCall),
            StepTemplate::new(STEP_WALLET_CREDIT, WALLET_SERVICE, "/api/cashout/process/")
                .with_type(StepType::WalletOperation)
                .with_compensation(WALLET_SERVICE, "/api/cashout/rollback/", json!({})),
            StepTemplate::new(
                STEP_LIABILITY_UPDATE,
                RISK_MANAGEMENT_SERVICE,
                "/api/cashout/liability/update/",
            )
            .with_type(StepType::LiabilityUpdate)
            .with_compensation(
                RISK_MANAGEMENT_SERVICE,
                "/api/cashout/liability/rollback/",
                json!({}),
            ),
            StepTemplate::new(STEP_COMPLETION, BETTING_SERVICE, "/api/cashout/complete/")
                .with_type(StepType::BettingServiceCall)
                .with_compensation(BETTING_SERVICE, "/api/cashout/cancel/", json!({})),
        ],
    )
    .with_description("Cash Out flow for bet slips")
}

/// Input merged with context; context wins on collisions.
fn cashout_data(saga: &SagaTransaction) -> JsonObject {
    let mut data = saga.input_data.clone();
    data.extend(saga.context_data.clone());
    data
}

fn field(data: &JsonObject, key: &str) -> Value {
    data.get(key).cloned().unwrap_or(Value::Null)
}

fn reasons_text(body: &Value) -> String {
    match body.get("reasons") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Handler-based flow for `cashout_flow` sagas.
#[derive(Debug, Clone, Copy, Default)]
pub struct CashoutFlow;

impl SagaFlow for CashoutFlow {
    fn build_request(
        &self,
        step: &SagaStep,
        saga: &SagaTransaction,
    ) -> std::result::Result<OutboundCall, String> {
        let data = cashout_data(saga);
        let bet_slip_id = field(&data, "bet_slip_id");
        if bet_slip_id.is_null() {
            return Err("bet_slip_id missing from cash-out input".to_string());
        }

        let body = match step.step_name.as_str() {
            STEP_VALIDATION | STEP_LIVE_ODDS => json!({"bet_slip_id": bet_slip_id}),
            STEP_QUOTE => json!({
                "bet_slip_id": bet_slip_id,
                "bookmaker_type": data.get("bookmaker_type").cloned().unwrap_or_else(|| json!(DEFAULT_BOOKMAKER_TYPE)),
                "bookmaker_id": data.get("bookmaker_id").cloned().unwrap_or_else(|| json!(DEFAULT_BOOKMAKER_ID)),
            }),
            STEP_WALLET_CREDIT => json!({
                "bet_slip_id": bet_slip_id,
                "user_id": field(&data, "user_id"),
                "cashout_amount": field(&data, "cash_out_value"),
                "saga_transaction_id": saga.id.to_string(),
            }),
            STEP_LIABILITY_UPDATE => json!({
                "bet_slip_id": bet_slip_id,
                "cashout_amount": field(&data, "cash_out_value"),
                "action": "PROCESS_CASHOUT",
            }),
            STEP_COMPLETION => json!({
                "bet_slip_id": bet_slip_id,
                "cashout_history_id": field(&data, "cashout_history_id"),
                "saga_transaction_id": saga.id.to_string(),
            }),
            _ => return TemplateFlow.build_request(step, saga),
        };

        Ok(OutboundCall {
            service: step.service_name.clone(),
            endpoint: step.service_endpoint.clone(),
            method: step.http_method,
            body,
        })
    }

    fn accept(&self, step: &SagaStep, body: &Value) -> std::result::Result<(), String> {
        if step.step_name == STEP_VALIDATION
            && body.get("can_cash_out").and_then(Value::as_bool) != Some(true)
        {
            return Err(format!("Cash Out not eligible: {}", reasons_text(body)));
        }
        Ok(())
    }

    fn build_compensation(
        &self,
        step: &SagaStep,
        saga: &SagaTransaction,
        reason: Option<&str>,
    ) -> Option<OutboundCall> {
        if !step.has_compensation() {
            return None;
        }
        let reason = reason.unwrap_or(DEFAULT_COMPENSATION_REASON);
        let bet_slip_id = field(&saga.input_data, "bet_slip_id");

        let body = match step.step_name.as_str() {
            STEP_WALLET_CREDIT => json!({
                "bet_slip_id": bet_slip_id,
                "user_id": saga.user_id,
                "saga_transaction_id": saga.id.to_string(),
                "reason": reason,
            }),
            STEP_LIABILITY_UPDATE => json!({
                "bet_slip_id": bet_slip_id,
                "action": "ROLLBACK_CASHOUT",
                "reason": reason,
            }),
            STEP_COMPLETION => json!({
                "bet_slip_id": bet_slip_id,
                "reason": reason,
            }),
            _ => return TemplateFlow.build_compensation(step, saga, Some(reason)),
        };

        Some(OutboundCall {
            service: step.compensation_service.clone()?,
            endpoint: step.compensation_endpoint.clone()?,
            method: step.compensation_method,
            body,
        })
    }

    fn completed_event(&self, step: &SagaStep) -> Option<(EventType, String)> {
        let (event_type, message) = match step.step_name.as_str() {
            STEP_VALIDATION => (EventType::CashoutValidationPassed, "Cash Out validation passed"),
            STEP_LIVE_ODDS => (EventType::CashoutLiveOddsFetched, "Live odds fetched successfully"),
            STEP_QUOTE => (EventType::CashoutQuoteReceived, "Cash Out quote received"),
            STEP_WALLET_CREDIT => (EventType::CashoutFundsCredited, "Cash Out funds credited to wallet"),
            STEP_LIABILITY_UPDATE => (EventType::CashoutLiabilityUpdated, "Cash Out liability updated"),
            STEP_COMPLETION => (EventType::CashoutCompleted, "Cash Out completed successfully"),
            _ => return None,
        };
        Some((event_type, message.to_string()))
    }
}

/// Request to cash out a bet slip.
#[derive(Debug, Clone)]
pub struct StartCashout {
    pub bet_slip_id: String,
    pub user_id: i64,
    pub bookmaker_type: Option<String>,
    pub bookmaker_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashoutRollback {
    pub saga_id: SagaId,
    pub status: SagaStatus,
    pub compensated: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashoutSummary {
    pub saga_id: SagaId,
    pub correlation_id: String,
    pub user_id: i64,
    pub status: SagaStatus,
    pub bet_slip_id: Value,
    pub bookmaker_type: Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<SagaTransaction> for CashoutSummary {
    fn from(saga: SagaTransaction) -> Self {
        Self {
            bet_slip_id: field(&saga.input_data, "bet_slip_id"),
            bookmaker_type: field(&saga.input_data, "bookmaker_type"),
            saga_id: saga.id,
            correlation_id: saga.correlation_id,
            user_id: saga.user_id,
            status: saga.status,
            created_at: saga.created_at,
            completed_at: saga.completed_at,
            error_message: saga.error_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashoutPage {
    pub sagas: Vec<CashoutSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct CashoutStatusView {
    pub saga_id: SagaId,
    pub correlation_id: String,
    pub user_id: i64,
    pub status: SagaStatus,
    pub bet_slip_id: Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub progress: Progress,
    pub steps: Vec<SagaStep>,
    /// Newest first.
    pub recent_events: Vec<SagaEvent>,
}

impl<S, C> SagaOrchestrator<S, C>
where
    S: SagaStore + Clone,
    C: ServiceClient + Clone,
{
    /// Stores the built-in cash-out definition unless one is already active.
    /// Returns true if it was seeded.
    pub async fn ensure_cashout_definition(&self) -> Result<bool> {
        if self
            .store
            .active_definition(SagaType::CashoutFlow)
            .await?
            .is_some()
        {
            return Ok(false);
        }
        self.store.save_definition(default_definition()).await?;
        tracing::info!("seeded default cash-out definition");
        Ok(true)
    }

    #[tracing::instrument(skip(self, request), fields(bet_slip_id = %request.bet_slip_id, user_id = request.user_id))]
    pub async fn start_cashout(&self, request: StartCashout) -> Result<SagaTransaction> {
        if request.bet_slip_id.trim().is_empty() {
            return Err(SagaError::Validation("bet_slip_id is required".to_string()));
        }

        let input = json!({
            "bet_slip_id": request.bet_slip_id,
            "user_id": request.user_id,
            "bookmaker_type": request.bookmaker_type.as_deref().unwrap_or(DEFAULT_BOOKMAKER_TYPE),
            "bookmaker_id": request.bookmaker_id.as_deref().unwrap_or(DEFAULT_BOOKMAKER_ID),
            "saga_type": SagaType::CashoutFlow.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        let saga = self
            .create(StartSaga {
                saga_type: SagaType::CashoutFlow,
                user_id: request.user_id,
                input_data: input,
                correlation_id: None,
            })
            .await?;

        self.store
            .append_event(
                SagaEvent::new(
                    saga.id,
                    EventType::CashoutRequested,
                    format!("Cash Out requested for bet slip {}", request.bet_slip_id),
                )
                .with_payload(json!({"bet_slip_id": request.bet_slip_id})),
            )
            .await?;

        self.queue.enqueue(WorkItem::Execute(saga.id));
        Ok(saga)
    }

    async fn require_cashout(&self, id: SagaId) -> Result<SagaTransaction> {
        match self.store.get_saga(id).await? {
            Some(saga) if saga.saga_type == SagaType::CashoutFlow => Ok(saga),
            _ => Err(SagaError::NotFound(format!("cash-out saga {id}"))),
        }
    }

    /// Reverses a settled cash-out by compensating its completed steps.
    #[tracing::instrument(skip(self))]
    pub async fn rollback_cashout(&self, id: SagaId, reason: &str) -> Result<CashoutRollback> {
        self.require_cashout(id).await?;
        let reason = if reason.trim().is_empty() {
            DEFAULT_ROLLBACK_REASON
        } else {
            reason
        };

        let saga = self
            .store
            .transition_saga(
                id,
                SagaTransition::new(
                    &[SagaStatus::Completed, SagaStatus::Failed, SagaStatus::Timeout],
                    SagaStatus::Compensating,
                ),
            )
            .await?
            .ok_or_else(|| {
                SagaError::Conflict(
                    "Only completed, failed or timed out cash-outs can be rolled back".to_string(),
                )
            })?;

        self.store
            .append_event(SagaEvent::new(
                id,
                EventType::CashoutRollbackInitiated,
                format!("Cash Out rollback initiated: {reason}"),
            ))
            .await?;

        let flow = self.flows.get(SagaType::CashoutFlow);
        let report = self
            .compensation
            .unwind(&saga, flow.as_ref(), Some(reason))
            .await?;

        let transition = if report.is_complete() {
            SagaTransition::new(&[SagaStatus::Compensating], SagaStatus::RolledBack)
        } else {
            SagaTransition::new(&[SagaStatus::Compensating], SagaStatus::PartiallyCompensated)
                .with_error(format!(
                    "Compensation failed for steps: {}",
                    report.failed.join(", ")
                ))
        };
        let status = match self.store.transition_saga(id, transition).await? {
            Some(done) => done.status,
            None => self.store.require_saga(id).await?.status,
        };

        self.store
            .append_event(
                SagaEvent::new(id, EventType::CashoutRollbackCompleted, "Cash Out rollback completed")
                    .with_payload(serde_json::to_value(&report)?),
            )
            .await?;

        tracing::info!(%status, "cash-out rollback finished");
        Ok(CashoutRollback {
            saga_id: id,
            status,
            compensated: report.compensated,
            failed: report.failed,
        })
    }

    /// Resets one failed cash-out step and re-drives its saga.
    #[tracing::instrument(skip(self))]
    pub async fn retry_cashout_step(&self, id: SagaId, step_name: &str) -> Result<SagaStep> {
        let saga = self.require_cashout(id).await?;
        let step = self
            .store
            .step_by_name(id, step_name)
            .await?
            .ok_or_else(|| SagaError::NotFound(format!("step {step_name}")))?;

        if step.status != StepStatus::Failed {
            return Err(SagaError::Conflict(
                "Only failed steps can be retried".to_string(),
            ));
        }
        if step.retry_count >= step.max_retries {
            return Err(SagaError::Conflict(format!(
                "Step {step_name} has exhausted its retries"
            )));
        }
        if !matches!(
            saga.status,
            SagaStatus::InProgress | SagaStatus::Failed | SagaStatus::Timeout
        ) {
            return Err(SagaError::Conflict(format!(
                "Saga in status {} cannot retry steps",
                saga.status
            )));
        }
        self.ensure_not_unwound(id).await?;

        let claimed = self
            .store
            .claim_step_for_retry(step.id)
            .await?
            .ok_or_else(|| SagaError::Conflict("Step changed concurrently".to_string()))?;

        self.store
            .append_event(
                SagaEvent::new(
                    id,
                    EventType::RetryAttempted,
                    format!(
                        "Retry attempt {} for step {}",
                        claimed.retry_count, claimed.step_name
                    ),
                )
                .for_step(claimed.id),
            )
            .await?;

        if saga.status == SagaStatus::InProgress {
            self.queue.enqueue(WorkItem::Resume(id));
        } else {
            let mut transition =
                SagaTransition::new(&[SagaStatus::Failed, SagaStatus::Timeout], SagaStatus::Pending)
                    .clearing_error();
            if let Some(deadline) = saga.timeout_at {
                transition = transition.with_deadline(Utc::now() + (deadline - saga.created_at));
            }
            self.store
                .transition_saga(id, transition)
                .await?
                .ok_or_else(|| SagaError::Conflict("Saga status changed concurrently".to_string()))?;
            self.queue.enqueue(WorkItem::Execute(id));
        }

        Ok(claimed)
    }

    /// Lists cash-out sagas, newest first. `page` starts at 1.
    pub async fn list_cashouts(
        &self,
        user_id: Option<i64>,
        status: Option<SagaStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<CashoutPage> {
        if page == 0 {
            return Err(SagaError::Validation("page must be at least 1".to_string()));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(SagaError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let offset = usize::try_from(u64::from(page - 1) * u64::from(page_size))
            .map_err(|_| SagaError::Validation(format!("page {page} is out of range")))?;

        let mut query = SagaQuery::new().saga_type(SagaType::CashoutFlow);
        if let Some(user_id) = user_id {
            query = query.user_id(user_id);
        }
        if let Some(status) = status {
            query = query.status(status);
        }

        let total_count = self.store.count_sagas(query.clone()).await?;
        let sagas = self
            .store
            .list_sagas(
                query
                    .offset(offset)
                    .limit(page_size as usize),
            )
            .await?;

        Ok(CashoutPage {
            sagas: sagas.into_iter().map(CashoutSummary::from).collect(),
            pagination: Pagination {
                page,
                page_size,
                total_count,
                total_pages: total_count.div_ceil(u64::from(page_size)),
            },
        })
    }

    pub async fn cashout_status(&self, id: SagaId) -> Result<CashoutStatusView> {
        let saga = self.require_cashout(id).await?;
        let steps = self.store.steps_for_saga(id).await?;
        let mut recent_events = self
            .store
            .query_events(EventQuery::for_saga(id).latest(RECENT_EVENT_LIMIT))
            .await?;
        recent_events.reverse();

        Ok(CashoutStatusView {
            bet_slip_id: field(&saga.input_data, "bet_slip_id"),
            saga_id: saga.id,
            correlation_id: saga.correlation_id,
            user_id: saga.user_id,
            status: saga.status,
            created_at: saga.created_at,
            started_at: saga.started_at,
            completed_at: saga.completed_at,
            error_message: saga.error_message,
            progress: Progress::from_steps(&steps),
            steps,
            recent_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_store::HttpMethod;

    fn cashout_saga() -> (SagaTransaction, Vec<SagaStep>) {
        let def = default_definition();
        let input = json!({"bet_slip_id": "BS-1", "user_id": 5, "bookmaker_type": "SYSTEM"})
            .as_object()
            .cloned()
            .unwrap();
        let mut saga = SagaTransaction::from_definition(&def, 5, "corr", input);
        saga.context_data = json!({"cash_out_value": 42.5, "cashout_history_id": 77})
            .as_object()
            .cloned()
            .unwrap();
        let steps = def
            .steps
            .iter()
            .enumerate()
            .map(|(i, t)| SagaStep::from_template(saga.id, i as u32 + 1, t, 3))
            .collect();
        (saga, steps)
    }

    #[test]
    fn test_default_definition_shape() {
        let def = default_definition();
        assert!(def.validate().is_ok());
        let names: Vec<_> = def.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                STEP_VALIDATION,
                STEP_LIVE_ODDS,
                STEP_QUOTE,
                STEP_WALLET_CREDIT,
                STEP_LIABILITY_UPDATE,
                STEP_COMPLETION
            ]
        );
        let compensated: Vec<_> = def
            .steps
            .iter()
            .filter(|s| s.compensation.is_some())
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            compensated,
            vec![STEP_WALLET_CREDIT, STEP_LIABILITY_UPDATE, STEP_COMPLETION]
        );
        assert!(def.steps.iter().all(|s| s.method == HttpMethod::Post));
        assert!(def.steps.iter().all(|s| s.request_template == json!({})));
    }

    #[test]
    fn test_wallet_credit_payload_carries_saga_id() {
        let (saga, steps) = cashout_saga();
        assert_eq!(steps[3].request_data, json!({}));

        let credit = CashoutFlow.build_request(&steps[3], &saga).unwrap();
        assert_eq!(
            credit.body,
            json!({
                "bet_slip_id": "BS-1",
                "user_id": 5,
                "cashout_amount": 42.5,
                "saga_transaction_id": saga.id.to_string(),
            })
        );
    }

    #[test]
    fn test_handler_payloads() {
        let (saga, steps) = cashout_saga();

        let quote = CashoutFlow.build_request(&steps[2], &saga).unwrap();
        assert_eq!(
            quote.body,
            json!({"bet_slip_id": "BS-1", "bookmaker_type": "SYSTEM", "bookmaker_id": "system"})
        );

        let credit = CashoutFlow.build_request(&steps[3], &saga).unwrap();
        assert_eq!(credit.service, WALLET_SERVICE);
        assert_eq!(credit.body["cashout_amount"], 42.5);
        assert_eq!(credit.body["saga_transaction_id"], saga.id.to_string());

        let completion = CashoutFlow.build_request(&steps[5], &saga).unwrap();
        assert_eq!(completion.body["cashout_history_id"], 77);
    }

    #[test]
    fn test_validation_rejects_ineligible() {
        let (_, steps) = cashout_saga();
        let err = CashoutFlow
            .accept(
                &steps[0],
                &json!({"can_cash_out": false, "reasons": ["match finished"]}),
            )
            .unwrap_err();
        assert_eq!(err, "Cash Out not eligible: match finished");
        assert!(CashoutFlow.accept(&steps[0], &json!({"can_cash_out": true})).is_ok());
        assert!(CashoutFlow.accept(&steps[1], &json!({})).is_ok());
    }

    #[test]
    fn test_compensation_payloads() {
        let (saga, steps) = cashout_saga();

        assert!(CashoutFlow.build_compensation(&steps[0], &saga, None).is_none());

        let wallet = CashoutFlow
            .build_compensation(&steps[3], &saga, Some("customer request"))
            .unwrap();
        assert_eq!(wallet.endpoint, "/api/cashout/rollback/");
        assert_eq!(wallet.body["user_id"], 5);
        assert_eq!(wallet.body["reason"], "customer request");

        let risk = CashoutFlow.build_compensation(&steps[4], &saga, None).unwrap();
        assert_eq!(risk.body["action"], "ROLLBACK_CASHOUT");
        assert_eq!(risk.body["reason"], DEFAULT_COMPENSATION_REASON);

        let cancel = CashoutFlow.build_compensation(&steps[5], &saga, None).unwrap();
        assert_eq!(cancel.endpoint, "/api/cashout/cancel/");
    }

    #[test]
    fn test_completed_events() {
        let (_, steps) = cashout_saga();
        let events: Vec<_> = steps
            .iter()
            .filter_map(|s| CashoutFlow.completed_event(s).map(|(t, _)| t))
            .collect();
        assert_eq!(
            events,
            vec![
                EventType::CashoutValidationPassed,
                EventType::CashoutLiveOddsFetched,
                EventType::CashoutQuoteReceived,
                EventType::CashoutFundsCredited,
                EventType::CashoutLiabilityUpdated,
                EventType::CashoutCompleted,
            ]
        );
    }
}
