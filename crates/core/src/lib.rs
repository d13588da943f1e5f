//! `printshop-core`: shared primitives for the print-shop access layer.
//!
//! Pure types only: identifiers and the domain error model.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{SubjectId, TenantId};
