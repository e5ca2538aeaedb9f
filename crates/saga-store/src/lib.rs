pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{DefinitionId, EventId, SagaId, StepId};
pub use error::{Result, StoreError};
pub use memory::InMemorySagaStore;
pub use model::{
    CompensationTemplate, EventType, HttpMethod, JsonObject, SagaDefinition, SagaEvent,
    SagaStatus, SagaStep, SagaTransaction, SagaType, StepStatus, StepTemplate, StepType,
};
pub use postgres::PostgresSagaStore;
pub use query::{DefinitionQuery, EventQuery, SagaQuery, SagaStatistics, SagaTransition};
pub use store::{SagaStore, SagaStoreExt};
