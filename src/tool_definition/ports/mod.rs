//! Port contracts for the tool definition catalog.

mod claims;
mod repository;

pub use claims::{InstanceClaims, InstanceClaimsError, InstanceClaimsResult};
pub use repository::{DefinitionRepository, DefinitionRepositoryError, DefinitionRepositoryResult};
