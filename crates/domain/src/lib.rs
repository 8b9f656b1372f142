//! # StoreSync Domain
//!
//! Business domain types and models for the StoreSync worker.
//!
//! This crate contains:
//! - Store, cursor, order, product and webhook event records
//! - Job envelopes, typed job payloads and failure audit records
//! - The domain error type with its structured retry classification
//! - Configuration structures and domain constants
//!
//! ## Architecture
//! - No dependencies on other StoreSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
