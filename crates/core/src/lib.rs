//! `genera-core`: shared building blocks (ids, error model).
//!
//! This crate has no IO and no async; everything above it depends on it.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{CommunityId, GenerationId, NetworkId, RoleAssignmentId, SchoolId, UserId};
