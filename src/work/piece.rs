//! A single origami piece moving through the pipeline.

use super::pattern::{Pattern, PATTERNS, RAW_PATTERN_INDEX};
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// An origami piece.
///
/// Starts out as flat paper and is folded exactly once, after which its
/// pattern never changes. Pieces are moved by value between stages, so only
/// the stage currently holding one can touch it.
#[derive(Debug, PartialEq, Eq)]
pub struct Piece {
    id: u64,
    pattern_index: usize,
}

impl Piece {
    /// Cut a fresh sheet of paper.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            pattern_index: RAW_PATTERN_INDEX,
        }
    }

    /// Sequence number assigned by the cutter.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    pub fn pattern(&self) -> &'static Pattern {
        &PATTERNS[self.pattern_index]
    }

    /// Name of the current pattern.
    pub fn name(&self) -> &'static str {
        self.pattern().name
    }

    /// How long folding the current pattern takes.
    pub fn fold_time(&self) -> Duration {
        self.pattern().fold_time()
    }

    /// Whether the piece has already been folded.
    pub fn is_folded(&self) -> bool {
        self.pattern_index != RAW_PATTERN_INDEX
    }

    /// Assign a finished pattern chosen uniformly at random.
    ///
    /// Returns the chosen pattern. The raw material entry is never picked.
    ///
    /// # Panics
    /// Panics if the piece was already folded.
    pub fn fold<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &'static Pattern {
        assert!(
            !self.is_folded(),
            "piece {} folded twice (already a {})",
            self.id,
            self.name()
        );
        self.pattern_index = rng.gen_range(RAW_PATTERN_INDEX + 1..PATTERNS.len());
        self.pattern()
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.id, self.name())
    }
}
