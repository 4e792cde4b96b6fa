//! Secret handling for the analyzer.
//!
//! - **credentials**: loading and resolving provider API keys
//! - **keyring**: OS keychain abstraction for persisted keys

pub mod credentials;
pub mod keyring;

// Re-export commonly used types
pub use credentials::{ApiKey, CredentialSources, Credentials, get_api_key};
