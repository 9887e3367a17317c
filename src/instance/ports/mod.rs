//! Port contracts for instance descriptors.

mod repository;

pub use repository::{InstanceRepository, InstanceRepositoryError, InstanceRepositoryResult};
