//! Pipeline orchestration: stages, metrics and the run loop.

mod metrics;
mod orchestrator;
mod stages;


pub use metrics::{Metrics, MetricsReporter, MetricsSnapshot};
pub use orchestrator::{Orchestrator, PipelineStats};
pub use stages::{StageReport, StageState, StageStatus, Workshop};
