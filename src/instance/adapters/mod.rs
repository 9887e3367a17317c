//! Adapter implementations for the instance repository port.

pub mod claims;
pub mod file;
pub mod memory;

pub use claims::DescriptorClaims;
pub use file::FileInstanceRepository;
pub use memory::InMemoryInstanceRepository;
