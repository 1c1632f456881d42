use vigia_core::store::StoreError;

pub mod agent;
pub mod approval;
pub mod execution;
pub mod memory;

pub use agent::SqlAgentStore;
pub use approval::SqlApprovalStore;
pub use execution::SqlExecutionStore;
pub use memory::{InMemoryAgentStore, InMemoryApprovalStore, InMemoryExecutionStore};

pub(crate) fn backend_error(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> StoreError {
    StoreError::Decode(error.to_string())
}
