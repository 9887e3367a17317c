//! Service layer for the tool definition catalog.

mod store;

pub use store::{PortPolicy, ToolDefinitionStore, ToolDefinitionStoreError, ToolDefinitionStoreResult};
