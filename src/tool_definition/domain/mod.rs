//! Domain model for tool definitions.

mod builtin;
mod definition;
mod error;
mod kind;
mod name;
mod port;

pub use builtin::{builtin_definitions, is_builtin_name};
pub use definition::{DefinedBy, ToolDefinition, parse_environment_assignment};
pub use error::ToolDefinitionDomainError;
pub use kind::{AdapterKind, HealthCheck, MessageFormat};
pub use name::{Capability, ToolName};
pub use port::PortSpec;
