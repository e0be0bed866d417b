//! Shared types for the store backend
//!
//! Common types used across crates: domain models, the unified error
//! system, and money helpers.

pub mod error;
pub mod models;
pub mod money;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use serde::{Deserialize, Serialize};
