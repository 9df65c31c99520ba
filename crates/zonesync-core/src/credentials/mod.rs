//! Credential store implementations
//!
//! - [`MemoryCredentialStore`]: in-process map
//! - [`EnvCredentialStore`]: environment variables

pub mod env;
pub mod memory;

pub use env::EnvCredentialStore;
pub use memory::MemoryCredentialStore;
