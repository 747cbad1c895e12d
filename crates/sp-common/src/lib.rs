//! Scheduler policy common types and errors.
//!
//! This crate provides foundational types shared by the policy compiler:
//! - The fatal error type and result alias
//! - Schema versioning for serialized policy snapshots

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
