//! Parallel processing pipeline

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{run, PassReport, Pipeline, PipelineResult, ScanReport, Stage, UnitFailure};
pub use scheduler::{phase_progress, Admission, Permit, Scheduler};
