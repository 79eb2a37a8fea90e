//! Origami Pipeline
//!
//! A small multi-stage production line: a paper cutter, a pool of folders and
//! a stocker, connected by two fixed-capacity tables.
//!
//! # Architecture
//!
//! The pipeline consists of:
//!
//! - **Work**: origami patterns and the pieces that flow through the line
//! - **Queue**: a bounded blocking FIFO handing pieces between threads
//! - **Pipeline**: stage loops, metrics and the orchestrator that runs them
//!
//! # Usage
//!
//! ```no_run
//! use origami_pipeline::{Config, run_pipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml".as_ref())?;
//!     run_pipeline(config)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pipeline;
pub mod queue;
pub mod work;

pub use config::{Config, MetricsConfig, ProductionConfig, TimingConfig};
pub use pipeline::{Metrics, Orchestrator, PipelineStats};
pub use queue::{BoundedQueue, PushError, QueueError};
pub use work::{Pattern, Piece, PATTERNS};

use anyhow::Result;

/// Run the full pipeline with the given configuration.
pub fn run_pipeline(config: Config) -> Result<PipelineStats> {
    config.validate()?;

    tracing::info!("Starting origami pipeline");

    let metrics = Metrics::new();
    let orchestrator = Orchestrator::new(config, metrics);
    let stats = orchestrator.run()?;
    orchestrator.report(&stats);

    tracing::info!("Pipeline complete: {}", stats);

    Ok(stats)
}
