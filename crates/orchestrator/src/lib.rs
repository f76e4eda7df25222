//! Orchestrator - worker pool, result fan-in and scan statistics

mod orchestrator;
mod progress;

pub use orchestrator::{Orchestrator, ScanHandle, ScanState};
pub use progress::ProgressTracker;
