//! Adapter implementations for the definition repository port.

pub mod file;
pub mod memory;

pub use file::FileDefinitionRepository;
pub use memory::InMemoryDefinitionRepository;
