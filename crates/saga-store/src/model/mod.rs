//! Saga data model: definitions, transactions, steps and audit events.

pub mod definition;
pub mod event;
pub mod status;
pub mod step;
pub mod transaction;

pub use definition::{CompensationTemplate, SagaDefinition, StepTemplate};
pub use event::SagaEvent;
pub use status::{EventType, HttpMethod, SagaStatus, SagaType, StepStatus, StepType};
pub use step::SagaStep;
pub use transaction::{JsonObject, SagaTransaction};
