//! Long-running application services

pub mod sweep_task;

pub use sweep_task::{SweepConfigSource, SweepTask, TaskStatus};
