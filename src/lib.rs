//! Toolbridge: IPC layer for driving stdio-based external tools as services.
//!
//! This crate launches third-party command-line tools (coding assistants,
//! analysers, plain filters) as supervised child processes and exposes each
//! running tool as a TCP endpoint speaking newline-delimited JSON envelopes.
//!
//! # Architecture
//!
//! Toolbridge follows hexagonal architecture principles:
//!
//! - **Domain**: Pure values and invariants with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence and liveness queries
//! - **Adapters**: Concrete implementations of ports (files, memory)
//! - **Services**: Orchestration of domain values through ports
//!
//! # Modules
//!
//! - [`tool_definition`]: Catalog of built-in and user-defined tool types
//! - [`adapter`]: Per-tool-kind translation between envelopes and stdio
//! - [`process`]: Child process supervision
//! - [`bridge`]: TCP socket bridge between a client and a tool
//! - [`instance`]: Launch, terminate and query named running instances
//! - [`envelope`]: The message structure crossing the socket

pub mod adapter;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod envelope;
pub(crate) mod identifier;
pub mod instance;
pub mod logging;
pub mod persistence;
pub mod process;
pub mod tool_definition;
