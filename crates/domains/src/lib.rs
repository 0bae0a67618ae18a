//! nestboard/crates/domains/src/lib.rs
//!
//! The central domain logic and interface definitions for Nestboard.

pub mod error;
pub mod models;
pub mod ports;
pub mod query;
pub mod validation;
pub mod voting;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
pub use query::*;
pub use voting::*;
