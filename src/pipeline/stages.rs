//! Pipeline stages: cutter, folders and stocker.
//!
//! The stages are connected by two bounded tables:
//!
//! ```text
//! ┌────────┐   paper    ┌──────────┐  finished  ┌─────────┐
//! │ Cutter │──────────▶│ Folder×N │──────────▶│ Stocker │
//! └────────┘   table    └──────────┘   table    └─────────┘
//! ```
//!
//! Each stage runs on its own thread and talks to the others only through
//! the tables. A full or empty table blocks the caller; a closed table makes
//! the stage stop early.

use crate::config::TimingConfig;
use crate::pipeline::Metrics;
use crate::queue::BoundedQueue;
use crate::work::Piece;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a stage thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StageState {
    NotStarted = 0,
    Running = 1,
    Finished = 2,
}

impl StageState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => StageState::NotStarted,
            1 => StageState::Running,
            2 => StageState::Finished,
            other => unreachable!("invalid stage state {}", other),
        }
    }
}

/// Shared, lock-free view of one stage's state.
#[derive(Debug)]
pub struct StageStatus {
    name: String,
    state: AtomicU8,
}

impl StageStatus {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: AtomicU8::new(StageState::NotStarted as u8),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StageState {
        StageState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: StageState, to: StageState) {
        let swapped = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire);
        assert!(
            swapped.is_ok(),
            "{}: invalid transition {:?} -> {:?} (was {:?})",
            self.name,
            from,
            to,
            self.state()
        );
    }
}

/// What a stage did before it finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: String,

    /// Pieces this stage handed on (or retired, for the stocker)
    pub processed: u64,

    /// True when a closed table cut the run short
    pub stopped_early: bool,
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} pieces", self.stage, self.processed)?;
        if self.stopped_early {
            write!(f, " (stopped early)")?;
        }
        Ok(())
    }
}

/// Everything the stages share: both tables, metrics and timing.
#[derive(Clone)]
pub struct Workshop {
    pub paper_table: Arc<BoundedQueue<Piece>>,
    pub finished_table: Arc<BoundedQueue<Piece>>,
    pub metrics: Arc<Metrics>,
    pub timing: TimingConfig,
}

impl Workshop {
    pub fn new(
        paper_table: Arc<BoundedQueue<Piece>>,
        finished_table: Arc<BoundedQueue<Piece>>,
        metrics: Arc<Metrics>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            paper_table,
            finished_table,
            metrics,
            timing,
        }
    }

    /// RNG for folder `index`: derived from the configured seed when there
    /// is one, so folders don't all pick the same sequence.
    pub fn folder_rng(&self, index: usize) -> StdRng {
        match self.timing.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        }
    }

    /// Cut `total` sheets of paper and place them on the paper table.
    pub fn run_cutter(&self, total: u64, status: &StageStatus) -> StageReport {
        status.transition(StageState::NotStarted, StageState::Running);
        let stage = status.name();
        let mut report = StageReport {
            stage: stage.to_string(),
            processed: 0,
            stopped_early: false,
        };

        for id in 0..total {
            tracing::info!(stage, "Time to cut more paper");
            let piece = Piece::new(id);
            self.metrics.add_piece_cut();
            tracing::info!(stage, piece = id, "There you go, another sheet of paper");

            let pushed = self.paper_table.push_with(piece, || {
                self.metrics.add_cutter_wait();
                tracing::info!(stage, "Hey, get folding! The paper table is full");
            });
            if let Err(rejected) = pushed {
                tracing::warn!(stage, piece = %rejected.0, "Paper table closed, stopping");
                self.metrics.add_pieces_discarded(1);
                report.stopped_early = true;
                break;
            }
            report.processed += 1;
        }

        tracing::info!(stage, "I'm done. And I still have all my fingers!");
        status.transition(StageState::Running, StageState::Finished);
        report
    }

    /// Take `share` sheets off the paper table, fold them and place them on
    /// the finished table.
    pub fn run_folder<R: Rng + ?Sized>(
        &self,
        share: u64,
        rng: &mut R,
        status: &StageStatus,
    ) -> StageReport {
        status.transition(StageState::NotStarted, StageState::Running);
        let stage = status.name();
        let mut report = StageReport {
            stage: stage.to_string(),
            processed: 0,
            stopped_early: false,
        };

        for _ in 0..share {
            let popped = self.paper_table.pop_with(|| {
                self.metrics.add_folder_input_wait();
                tracing::info!(stage, "Hey paper cutter, don't fall asleep with scissors in your hand!");
            });
            let mut piece = match popped {
                Ok(piece) => piece,
                Err(e) => {
                    tracing::warn!(stage, "Paper table unavailable ({}), stopping", e);
                    report.stopped_early = true;
                    break;
                }
            };

            let pattern = piece.fold(rng);
            let start = Instant::now();
            simulate_work(self.timing.scaled(pattern.fold_time()));
            self.metrics.add_fold_time(start.elapsed());
            self.metrics.add_piece_folded();
            tracing::info!(stage, piece = piece.id(), "I just made a {}", piece.name());

            let pushed = self.finished_table.push_with(piece, || {
                self.metrics.add_folder_output_wait();
                tracing::info!(stage, "Hey, stocker, get to work!");
            });
            if let Err(rejected) = pushed {
                tracing::warn!(stage, piece = %rejected.0, "Finished table closed, stopping");
                self.metrics.add_pieces_discarded(1);
                report.stopped_early = true;
                break;
            }
            report.processed += 1;
        }

        tracing::info!(stage, "Whew! That was a lot of paper to fold!");
        status.transition(StageState::Running, StageState::Finished);
        report
    }

    /// Put finished pieces away until `target` pieces have been retired.
    ///
    /// The retired counter is checked before every pop, so once the target
    /// is reached the stocker never starts another pop.
    pub fn run_stocker(&self, target: u64, status: &StageStatus) -> StageReport {
        status.transition(StageState::NotStarted, StageState::Running);
        let stage = status.name();
        let mut report = StageReport {
            stage: stage.to_string(),
            processed: 0,
            stopped_early: false,
        };

        while self.metrics.pieces_retired() < target {
            let popped = self.finished_table.pop_with(|| {
                self.metrics.add_stocker_wait();
                tracing::info!(stage, "Those lazy folders!");
            });
            let piece = match popped {
                Ok(piece) => piece,
                Err(e) => {
                    tracing::warn!(stage, "Finished table unavailable ({}), stopping", e);
                    report.stopped_early = true;
                    break;
                }
            };
            debug_assert!(piece.is_folded(), "unfolded piece reached the stocker");

            tracing::info!(
                stage,
                piece = piece.id(),
                "That is a very nice {}. I will put it away.",
                piece.name()
            );
            let start = Instant::now();
            simulate_work(self.timing.stock_time());
            self.metrics.add_stock_time(start.elapsed());

            let retired = self.retire(piece);
            tracing::debug!(stage, retired, target, "Piece retired");
            report.processed += 1;
        }

        tracing::info!(stage, "Lifting all those boxes was tiring, time to go!");
        status.transition(StageState::Running, StageState::Finished);
        report
    }

    /// Release a piece and bump the global retired counter.
    fn retire(&self, piece: Piece) -> u64 {
        drop(piece);
        self.metrics.add_piece_retired()
    }
}

/// Stand-in for real work: block the current thread.
fn simulate_work(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
