//! Per-tool-kind strategies for talking to external tools.
//!
//! A [`ToolAdapter`] knows how to find a tool's executable, which arguments
//! to launch it with, and how to translate between [`MessageEnvelope`]s and
//! the tool's native stdio lines. Concrete adapters are selected by
//! [`AdapterKind`] through an [`AdapterFactory`].
//!
//! [`MessageEnvelope`]: crate::envelope::MessageEnvelope
//! [`AdapterKind`]: crate::tool_definition::domain::AdapterKind

mod assistant;
mod contract;
mod error;
mod factory;
mod generic;

pub use assistant::InteractiveAssistantAdapter;
pub use contract::{ErrorDisposition, ShutdownAction, ToolAdapter};
pub use error::AdapterError;
pub use factory::{AdapterConstructor, AdapterContext, AdapterFactory};
pub use generic::GenericAdapter;
