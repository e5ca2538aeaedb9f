//! Saga error types.

use saga_store::StoreError;
use thiserror::Error;

use crate::client::ServiceCallError;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A saga, step or definition does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not allowed in the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An outbound service call failed.
    #[error("Service call failed: {0}")]
    ServiceCall(#[from] ServiceCallError),

    /// A compensating call failed.
    #[error("Compensation step '{step}' failed: {reason}")]
    Compensation { step: String, reason: String },

    /// Saga store error.
    #[error("Saga store error: {0}")]
    Store(StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for SagaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateCorrelationId(id) => {
                SagaError::Conflict(format!("correlation id '{id}' already exists"))
            }
            StoreError::DuplicateDefinition { name, version } => {
                SagaError::Conflict(format!("definition {name} v{version} already exists"))
            }
            StoreError::SagaNotFound(id) => SagaError::NotFound(format!("saga {id}")),
            StoreError::StepNotFound(id) => SagaError::NotFound(format!("step {id}")),
            StoreError::DefinitionNotFound(id) => SagaError::NotFound(format!("definition {id}")),
            other => SagaError::Store(other),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
