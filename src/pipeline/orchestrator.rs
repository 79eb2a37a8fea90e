//! Wires the stages together and runs them to completion.
//!
//! The orchestrator builds both tables, starts one thread per stage, then
//! polls the retired counter until the target is reached (or every stage has
//! exited). It finishes by closing the tables, joining every thread and
//! discarding anything left behind.

use crate::config::Config;
use crate::pipeline::stages::{StageReport, StageState, StageStatus, Workshop};
use crate::pipeline::{Metrics, MetricsReporter};
use crate::queue::BoundedQueue;
use crate::work::Piece;
use anyhow::{Context, Result};
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A running stage thread.
struct StageThread {
    status: Arc<StageStatus>,
    handle: JoinHandle<StageReport>,
}

impl StageThread {
    /// The thread is gone but the stage never reached `Finished`: it panicked.
    fn exited_abnormally(&self) -> bool {
        self.handle.is_finished() && self.status.state() != StageState::Finished
    }
}

/// Runs the cutter → folders → stocker pipeline.
pub struct Orchestrator {
    config: Config,
    metrics: Arc<Metrics>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: Config, metrics: Arc<Metrics>) -> Self {
        Self { config, metrics }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run every stage to completion.
    pub fn run(&self) -> Result<PipelineStats> {
        let production = &self.config.production;
        let target = production.total_pieces;

        let paper_table = Arc::new(
            BoundedQueue::with_name("paper table", production.paper_table_capacity)
                .context("Failed to create paper table")?,
        );
        let finished_table = Arc::new(
            BoundedQueue::with_name("finished table", production.finished_table_capacity)
                .context("Failed to create finished table")?,
        );
        let workshop = Workshop::new(
            paper_table.clone(),
            finished_table.clone(),
            self.metrics.clone(),
            self.config.timing.clone(),
        );

        tracing::info!(
            "Starting pipeline: {} pieces, {} folders, paper table {}, finished table {}",
            target,
            production.folder_count,
            production.paper_table_capacity,
            production.finished_table_capacity
        );

        let mut stages = Vec::with_capacity(production.folder_count + 2);
        let spawned = self.spawn_stages(&workshop, &mut stages);

        if spawned.is_ok() {
            self.wait_for_completion(target, &stages);
        }

        // Release anyone still blocked, then join everything we started
        paper_table.close();
        finished_table.close();

        let mut reports = Vec::with_capacity(stages.len());
        let mut failures = Vec::new();
        for stage in stages {
            match stage.handle.join() {
                Ok(report) => {
                    tracing::info!("Stage finished: {}", report);
                    reports.push(report);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(stage = stage.status.name(), "Stage panicked: {}", message);
                    failures.push(format!("{}: {}", stage.status.name(), message));
                }
            }
        }
        spawned?;

        discard_leftovers(&self.metrics, &[paper_table.as_ref(), finished_table.as_ref()]);

        if !failures.is_empty() {
            // Pieces held by a stage when it panicked were dropped during unwind
            let lost = self.metrics.pieces_unaccounted();
            if lost > 0 {
                tracing::warn!("{} pieces lost with the panicked stages", lost);
                self.metrics.add_pieces_discarded(lost);
            }
            anyhow::bail!("Pipeline stages panicked: {}", failures.join("; "));
        }

        let snapshot = self.metrics.snapshot();
        let stats = PipelineStats {
            total_pieces: target,
            pieces_cut: snapshot.pieces_cut,
            pieces_folded: snapshot.pieces_folded,
            pieces_retired: snapshot.pieces_retired,
            pieces_discarded: snapshot.pieces_discarded,
            paper_table_peak: paper_table.peak_len(),
            finished_table_peak: finished_table.peak_len(),
            elapsed: snapshot.elapsed,
            stages: reports,
        };

        if stats.pieces_retired != target {
            anyhow::bail!(
                "Pipeline stopped with {} of {} pieces retired",
                stats.pieces_retired,
                target
            );
        }

        Ok(stats)
    }

    fn spawn_stages(&self, workshop: &Workshop, stages: &mut Vec<StageThread>) -> Result<()> {
        let production = &self.config.production;

        let total = production.total_pieces;
        stages.push(spawn_stage("cutter", workshop, move |shop, status| {
            shop.run_cutter(total, status)
        })?);

        for index in 0..production.folder_count {
            let share = production.folder_share(index);
            let name = format!("folder-{}", index + 1);
            stages.push(spawn_stage(&name, workshop, move |shop, status| {
                let mut rng = shop.folder_rng(index);
                shop.run_folder(share, &mut rng, status)
            })?);
        }

        let target = production.total_pieces;
        stages.push(spawn_stage("stocker", workshop, move |shop, status| {
            shop.run_stocker(target, status)
        })?);

        Ok(())
    }

    /// Poll the retired counter until it reaches `target`, a stage dies, or
    /// no stage is left running.
    fn wait_for_completion(&self, target: u64, stages: &[StageThread]) {
        let poll_interval = self.config.production.poll_interval();
        let mut reporter = self.reporter(target);

        loop {
            let retired = self.metrics.pieces_retired();
            if retired >= target {
                tracing::info!("All {} pieces retired", retired);
                break;
            }
            if let Some(dead) = stages.iter().find(|stage| stage.exited_abnormally()) {
                tracing::error!("Stage {} exited without finishing, shutting down", dead.status.name());
                break;
            }
            if stages.iter().all(|stage| stage.handle.is_finished()) {
                tracing::warn!(
                    "Every stage exited with {} of {} pieces retired",
                    retired,
                    target
                );
                break;
            }

            thread::sleep(poll_interval);
            if let Some(reporter) = reporter.as_mut() {
                reporter.tick();
            }
        }

        if let Some(reporter) = reporter {
            reporter.finish();
        }
    }

    fn reporter(&self, target: u64) -> Option<MetricsReporter> {
        if !self.config.metrics.enabled {
            return None;
        }
        Some(MetricsReporter::new(
            self.metrics.clone(),
            self.config.metrics.report_interval_secs,
            target,
        ))
    }

    /// Print the final summary and save metrics if configured.
    pub fn report(&self, stats: &PipelineStats) {
        if !self.config.metrics.enabled {
            return;
        }

        let reporter = MetricsReporter::new(
            self.metrics.clone(),
            self.config.metrics.report_interval_secs,
            stats.total_pieces,
        );
        reporter.print_summary();

        if let Some(ref path) = self.config.metrics.output_path {
            if let Err(e) = self.metrics.snapshot().save_to_file(path) {
                tracing::warn!("Failed to save metrics to {}: {}", path, e);
            }
        }
    }
}

fn spawn_stage<F>(name: &str, workshop: &Workshop, body: F) -> Result<StageThread>
where
    F: FnOnce(&Workshop, &StageStatus) -> StageReport + Send + 'static,
{
    let status = StageStatus::new(name);
    let shop = workshop.clone();
    let thread_status = status.clone();

    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(&shop, &thread_status))
        .with_context(|| format!("Failed to spawn {} thread", name))?;

    Ok(StageThread { status, handle })
}

/// Empty every table, counting whatever was left as discarded.
///
/// Returns the number of pieces thrown away.
pub(crate) fn discard_leftovers(metrics: &Metrics, tables: &[&BoundedQueue<Piece>]) -> u64 {
    let mut discarded = 0;
    for table in tables {
        let pieces = table.drain();
        if pieces.is_empty() {
            continue;
        }
        tracing::warn!(
            queue = table.name(),
            "Too bad: throwing away {} unretired pieces",
            pieces.len()
        );
        discarded += pieces.len() as u64;
    }
    metrics.add_pieces_discarded(discarded);
    discarded
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Statistics from a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Pieces the run was asked to produce
    pub total_pieces: u64,

    pub pieces_cut: u64,
    pub pieces_folded: u64,
    pub pieces_retired: u64,

    /// Pieces dropped at shutdown without being retired
    pub pieces_discarded: u64,

    /// Highest paper table length observed
    pub paper_table_peak: usize,

    /// Highest finished table length observed
    pub finished_table_peak: usize,

    pub elapsed: Duration,

    /// Per-stage reports, in spawn order
    pub stages: Vec<StageReport>,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Retired: {}/{}, Cut: {}, Folded: {}, Discarded: {}, Peaks: paper {} finished {}, Elapsed: {:.1}s",
            self.pieces_retired,
            self.total_pieces,
            self.pieces_cut,
            self.pieces_folded,
            self.pieces_discarded,
            self.paper_table_peak,
            self.finished_table_peak,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stats_default() {
        let stats = PipelineStats::default();
        assert_eq!(stats.total_pieces, 0);
        assert_eq!(stats.pieces_retired, 0);
        assert!(stats.stages.is_empty());
    }

    #[test]
    fn test_pipeline_stats_display() {
        let stats = PipelineStats {
            total_pieces: 16,
            pieces_cut: 16,
            pieces_folded: 16,
            pieces_retired: 16,
            pieces_discarded: 0,
            paper_table_peak: 2,
            finished_table_peak: 4,
            elapsed: Duration::from_secs(3),
            stages: Vec::new(),
        };

        let display = format!("{}", stats);
        assert!(display.contains("Retired: 16/16"));
        assert!(display.contains("paper 2 finished 4"));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
