//! Saga orchestration for betting, wallet and risk services.
//!
//! A saga is a multi-step business transaction spread across services that
//! share no database. Steps run strictly in order; when one fails, the steps
//! that already completed are undone in reverse order through their paired
//! compensating calls.
//!
//! Execution happens on a [`WorkerPool`] fed by a [`WorkQueue`], while
//! [`Sweepers`] periodically time out stalled sagas and retry failed steps.

pub mod cashout;
pub mod client;
pub mod compensation;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod flow;
pub mod orchestrator;
pub mod queue;
pub mod registry;
pub mod sweeper;
pub mod template;

pub use cashout::{
    CashoutFlow, CashoutPage, CashoutRollback, CashoutStatusView, CashoutSummary, Pagination,
    StartCashout, default_definition,
};
pub use client::{
    HttpServiceClient, InMemoryServiceClient, ServiceCallError, ServiceClient, ServiceRequest,
    ServiceResponse,
};
pub use compensation::{CompensationEngine, CompensationReport};
pub use error::{Result, SagaError};
pub use executor::{StepExecutor, StepOutcome};
pub use flow::{FlowRegistry, OutboundCall, SagaFlow, TemplateFlow};
pub use orchestrator::{Progress, SagaDetails, SagaOrchestrator, SagaStatusView, StartSaga};
pub use queue::{WorkItem, WorkQueue, WorkReceiver, WorkerPool};
pub use registry::ServiceRegistry;
pub use sweeper::{SweeperConfig, Sweepers};
