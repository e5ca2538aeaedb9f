use common::{DefinitionId, SagaId, StepId};
use thiserror::Error;

/// Errors that can occur when interacting with the saga store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A saga with this correlation id already exists.
    #[error("Duplicate correlation id: {0}")]
    DuplicateCorrelationId(String),

    /// A definition with this name and version already exists.
    #[error("Definition {name} v{version} already exists")]
    DuplicateDefinition { name: String, version: String },

    /// The saga was not found.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// The step was not found.
    #[error("Step not found: {0}")]
    StepNotFound(StepId),

    /// The definition was not found.
    #[error("Definition not found: {0}")]
    DefinitionNotFound(DefinitionId),

    /// A stored value could not be mapped back into the model.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for saga store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
