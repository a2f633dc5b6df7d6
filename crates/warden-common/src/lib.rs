//! # Warden Common
//!
//! Shared types, errors, and constants used by the Warden gateway.
//!
//! ## Modules
//! - `types` - Core data structures (DomainPolicy, ValidationRequest, outcomes)
//! - `error` - Validation error taxonomy
//! - `constants` - Protocol defaults, header names, and response messages

pub mod constants;
pub mod error;
pub mod types;

pub use error::WardenError;
pub use types::*;
