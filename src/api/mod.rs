//! REST API route definitions
//!
//! Health probes are public; everything under `/StaleSweep` is admin-only.

pub mod auth;
pub mod error;
pub mod health;
pub mod stale_sweep;

pub use auth::{AuthUser, RequireAdmin};
pub use error::{ApiError, ApiResult};
