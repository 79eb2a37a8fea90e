//! Pipeline counters and progress reporting.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Metrics for the pipeline.
///
/// `pieces_retired` doubles as the global completion counter: the
/// orchestrator polls it without touching any queue lock.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Pieces cut by the cutter
    pub pieces_cut: AtomicU64,

    /// Pieces folded by any folder
    pub pieces_folded: AtomicU64,

    /// Pieces put away by the stocker
    pub pieces_retired: AtomicU64,

    /// Pieces thrown away at shutdown without being retired
    pub pieces_discarded: AtomicU64,

    /// Times the cutter found the paper table full
    pub cutter_waits: AtomicU64,

    /// Times a folder found the paper table empty
    pub folder_input_waits: AtomicU64,

    /// Times a folder found the finished table full
    pub folder_output_waits: AtomicU64,

    /// Times the stocker found the finished table empty
    pub stocker_waits: AtomicU64,

    /// Start time
    start_time: Option<Instant>,

    /// Time spent folding (microseconds, summed across folders)
    pub fold_us: AtomicU64,

    /// Time spent stocking (microseconds)
    pub stock_us: AtomicU64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        })
    }

    pub fn add_piece_cut(&self) {
        self.pieces_cut.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_piece_folded(&self) {
        self.pieces_folded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retired piece and return the new retired total.
    pub fn add_piece_retired(&self) -> u64 {
        self.pieces_retired.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of pieces retired so far.
    pub fn pieces_retired(&self) -> u64 {
        self.pieces_retired.load(Ordering::Acquire)
    }

    /// Record pieces discarded during teardown.
    pub fn add_pieces_discarded(&self, count: u64) {
        self.pieces_discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Pieces cut but neither retired nor discarded.
    ///
    /// Zero once every stage has been joined, unless a stage dropped a piece
    /// while unwinding from a panic.
    pub fn pieces_unaccounted(&self) -> u64 {
        let cut = self.pieces_cut.load(Ordering::Relaxed);
        let settled = self.pieces_retired() + self.pieces_discarded.load(Ordering::Relaxed);
        cut.saturating_sub(settled)
    }

    pub fn add_cutter_wait(&self) {
        self.cutter_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_folder_input_wait(&self) {
        self.folder_input_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_folder_output_wait(&self) {
        self.folder_output_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_stocker_wait(&self) {
        self.stocker_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time spent folding (in microseconds).
    pub fn add_fold_time(&self, duration: Duration) {
        self.fold_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record time spent stocking (in microseconds).
    pub fn add_stock_time(&self, duration: Duration) {
        self.stock_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start_time.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Retired pieces per second.
    pub fn pieces_per_second(&self) -> f64 {
        let pieces = self.pieces_retired();
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            pieces as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pieces_cut: self.pieces_cut.load(Ordering::Relaxed),
            pieces_folded: self.pieces_folded.load(Ordering::Relaxed),
            pieces_retired: self.pieces_retired(),
            pieces_discarded: self.pieces_discarded.load(Ordering::Relaxed),
            cutter_waits: self.cutter_waits.load(Ordering::Relaxed),
            folder_input_waits: self.folder_input_waits.load(Ordering::Relaxed),
            folder_output_waits: self.folder_output_waits.load(Ordering::Relaxed),
            stocker_waits: self.stocker_waits.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            pieces_per_second: self.pieces_per_second(),
            fold_secs: self.fold_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            stock_secs: self.stock_us.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub pieces_cut: u64,
    pub pieces_folded: u64,
    pub pieces_retired: u64,
    pub pieces_discarded: u64,
    pub cutter_waits: u64,
    pub folder_input_waits: u64,
    pub folder_output_waits: u64,
    pub stocker_waits: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
    pub pieces_per_second: f64,
    /// Total time spent folding (seconds, summed across folders)
    pub fold_secs: f64,
    /// Total time spent stocking (seconds)
    pub stock_secs: f64,
}

impl MetricsSnapshot {
    /// Save metrics to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Metrics saved to {}", path);
        Ok(())
    }

    /// Total number of times any stage had to block.
    pub fn total_waits(&self) -> u64 {
        self.cutter_waits + self.folder_input_waits + self.folder_output_waits + self.stocker_waits
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pieces: {} cut, {} folded, {} retired, {} discarded | \
             Waits: cutter {} | folder in {} out {} | stocker {} | \
             Rate: {:.2} pieces/s | Elapsed: {:.1}s",
            self.pieces_cut,
            self.pieces_folded,
            self.pieces_retired,
            self.pieces_discarded,
            self.cutter_waits,
            self.folder_input_waits,
            self.folder_output_waits,
            self.stocker_waits,
            self.pieces_per_second,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// Periodic metrics reporter, driven by the orchestrator's poll loop.
pub struct MetricsReporter {
    metrics: Arc<Metrics>,
    interval: Duration,
    total_pieces: u64,
    last_report: Instant,
}

impl MetricsReporter {
    /// Create a new metrics reporter.
    pub fn new(metrics: Arc<Metrics>, interval_secs: u64, total_pieces: u64) -> Self {
        Self {
            metrics,
            interval: Duration::from_secs(interval_secs),
            total_pieces,
            last_report: Instant::now(),
        }
    }

    /// Percentage of the target already retired.
    pub fn progress(&self) -> f64 {
        if self.total_pieces > 0 {
            self.metrics.pieces_retired() as f64 / self.total_pieces as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Log a progress line if the reporting interval has elapsed.
    ///
    /// Returns true when a line was emitted.
    pub fn tick(&mut self) -> bool {
        if self.last_report.elapsed() < self.interval {
            return false;
        }
        self.last_report = Instant::now();
        tracing::info!("[{:.1}%] {}", self.progress(), self.metrics.snapshot());
        true
    }

    /// Log the final report.
    pub fn finish(&self) {
        tracing::info!("Final: {}", self.metrics.snapshot());
    }

    /// Print a final summary.
    pub fn print_summary(&self) {
        let snapshot = self.metrics.snapshot();

        println!("\n=== Pipeline Summary ===");
        println!("Total time: {:.1}s", snapshot.elapsed.as_secs_f64());
        println!("Pieces cut: {}", snapshot.pieces_cut);
        println!("Pieces folded: {}", snapshot.pieces_folded);
        println!("Pieces retired: {} / {}", snapshot.pieces_retired, self.total_pieces);
        if snapshot.pieces_discarded > 0 {
            println!("Pieces discarded: {}", snapshot.pieces_discarded);
        }
        println!("Retire rate: {:.2} pieces/s", snapshot.pieces_per_second);

        println!("\n--- Waits ---");
        println!("Cutter (paper table full):      {:>5}", snapshot.cutter_waits);
        println!("Folders (paper table empty):    {:>5}", snapshot.folder_input_waits);
        println!("Folders (finished table full):  {:>5}", snapshot.folder_output_waits);
        println!("Stocker (finished table empty): {:>5}", snapshot.stocker_waits);

        let total_work = snapshot.fold_secs + snapshot.stock_secs;
        if total_work > 0.0 {
            println!("\n--- Work Time Breakdown ---");
            println!("Folding:   {:>7.1}s ({:>5.1}%)", snapshot.fold_secs, snapshot.fold_secs / total_work * 100.0);
            println!("Stocking:  {:>7.1}s ({:>5.1}%)", snapshot.stock_secs, snapshot.stock_secs / total_work * 100.0);
        }
        println!("========================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.add_piece_cut();
        metrics.add_piece_cut();
        metrics.add_piece_folded();

        assert_eq!(metrics.pieces_cut.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.pieces_folded.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_retired_counter_returns_new_total() {
        let metrics = Metrics::new();
        assert_eq!(metrics.add_piece_retired(), 1);
        assert_eq!(metrics.add_piece_retired(), 2);
        assert_eq!(metrics.pieces_retired(), 2);
    }

    #[test]
    fn test_retired_counter_concurrent() {
        let metrics = Metrics::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.add_piece_retired();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.pieces_retired(), 4000);
    }

    #[test]
    fn test_all_counters() {
        let metrics = Metrics::new();

        metrics.add_piece_cut();
        metrics.add_piece_folded();
        metrics.add_piece_retired();
        metrics.add_pieces_discarded(3);
        metrics.add_cutter_wait();
        metrics.add_folder_input_wait();
        metrics.add_folder_output_wait();
        metrics.add_stocker_wait();

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.pieces_cut, 1);
        assert_eq!(snapshot.pieces_folded, 1);
        assert_eq!(snapshot.pieces_retired, 1);
        assert_eq!(snapshot.pieces_discarded, 3);
        assert_eq!(snapshot.cutter_waits, 1);
        assert_eq!(snapshot.folder_input_waits, 1);
        assert_eq!(snapshot.folder_output_waits, 1);
        assert_eq!(snapshot.stocker_waits, 1);
        assert_eq!(snapshot.total_waits(), 4);
    }

    #[test]
    fn test_pieces_unaccounted() {
        let metrics = Metrics::new();
        for _ in 0..5 {
            metrics.add_piece_cut();
        }
        metrics.add_piece_retired();
        metrics.add_pieces_discarded(2);
        assert_eq!(metrics.pieces_unaccounted(), 2);

        metrics.add_pieces_discarded(2);
        assert_eq!(metrics.pieces_unaccounted(), 0);
    }

    #[test]
    fn test_timing_metrics() {
        let metrics = Metrics::new();

        metrics.add_fold_time(Duration::from_millis(100));
        metrics.add_fold_time(Duration::from_millis(50));
        metrics.add_stock_time(Duration::from_millis(75));

        let snapshot = metrics.snapshot();

        assert!((snapshot.fold_secs - 0.15).abs() < 0.001);
        assert!((snapshot.stock_secs - 0.075).abs() < 0.001);
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = MetricsSnapshot {
            pieces_cut: 16,
            pieces_folded: 15,
            pieces_retired: 12,
            pieces_discarded: 0,
            cutter_waits: 7,
            folder_input_waits: 2,
            folder_output_waits: 4,
            stocker_waits: 1,
            elapsed: Duration::from_secs(10),
            pieces_per_second: 1.2,
            fold_secs: 5.0,
            stock_secs: 2.0,
        };

        let display = format!("{}", snapshot);

        assert!(display.contains("16 cut"));
        assert!(display.contains("12 retired"));
        assert!(display.contains("cutter 7"));
        assert!(display.contains("1.20 pieces/s"));
    }

    #[test]
    fn test_snapshot_serializes_elapsed_as_seconds() {
        let metrics = Metrics {
            start_time: None,
            ..Default::default()
        };
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["elapsed"], 0.0);
        assert_eq!(json["pieces_retired"], 0);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let metrics = Metrics::new();
        metrics.add_piece_retired();

        metrics.snapshot().save_to_file(path.to_str().unwrap()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"pieces_retired\": 1"));
    }

    #[test]
    fn test_zero_elapsed_no_panic() {
        let metrics = Metrics {
            start_time: None,
            ..Default::default()
        };

        metrics.add_piece_retired();

        assert_eq!(metrics.pieces_per_second(), 0.0);
    }

    #[test]
    fn test_reporter_progress_and_tick() {
        let metrics = Metrics::new();
        let mut reporter = MetricsReporter::new(metrics.clone(), 0, 16);

        for _ in 0..4 {
            metrics.add_piece_retired();
        }

        assert!((reporter.progress() - 25.0).abs() < f64::EPSILON);
        assert!(reporter.tick());
    }

    #[test]
    fn test_reporter_waits_for_interval() {
        let metrics = Metrics::new();
        let mut reporter = MetricsReporter::new(metrics, 3600, 16);
        assert!(!reporter.tick());
    }
}
