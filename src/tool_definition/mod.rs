//! Tool definition catalog.
//!
//! A tool definition describes how to launch and talk to one kind of
//! external tool. Built-in definitions are compiled in; user definitions are
//! persisted as a delta on top and can never shadow a built-in.
//!
//! # Architecture
//!
//! - **Domain**: [`domain::ToolDefinition`] and its validated parts
//! - **Ports**: [`ports::DefinitionRepository`] and [`ports::InstanceClaims`]
//! - **Adapters**: in-memory and file-backed repositories
//! - **Services**: [`services::ToolDefinitionStore`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
