//! Stale Sweep - retention sweeps for a media library
//!
//! Finds movies and episodes that are older than a configured age and that
//! no user has played, and deletes them (or, in dry run, logs what would be
//! deleted). The policy engine lives in [`sweep`]; the rest is the SQLite
//! host, the scheduler and the admin REST surface around it.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod jobs;
pub mod services;
pub mod sweep;

pub use app::{AppState, build_app};
