//! Named running tool instances.
//!
//! An instance binds a tool definition, its adapter, a supervised process
//! and a socket bridge under one instance key. Descriptors of running
//! instances are persisted so that separate invocations can query and
//! terminate instances they did not launch; pid liveness is the final
//! authority on whether a descriptor is current.
//!
//! # Architecture
//!
//! - **Domain**: [`domain::InstanceKey`], [`domain::RunningInstance`] and
//!   metrics accounting
//! - **Ports**: [`ports::InstanceRepository`] for descriptor persistence
//! - **Adapters**: file and in-memory repositories, plus the
//!   [`adapters::DescriptorClaims`] liveness view used by the definition store
//! - **Services**: [`services::InstanceOrchestrator`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
