//! `stockroom-core`: identifiers and the domain error model shared by every
//! inventory crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, EntryId, EventId, ExitId, ProductId, SupplierId};
