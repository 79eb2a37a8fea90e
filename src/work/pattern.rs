//! Static catalog of origami patterns.

use std::time::Duration;

/// A folding recipe: what a piece turns into and how long it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    /// Human-readable name
    pub name: &'static str,

    /// Time to fold one piece, in seconds
    pub fold_secs: u64,
}

impl Pattern {
    const fn new(name: &'static str, fold_secs: u64) -> Self {
        Self { name, fold_secs }
    }

    /// Fold time as a `Duration`.
    pub fn fold_time(&self) -> Duration {
        Duration::from_secs(self.fold_secs)
    }
}

/// Index of the raw material entry. Freshly cut pieces start here.
pub const RAW_PATTERN_INDEX: usize = 0;

/// All known patterns. Entry 0 is unfolded paper; every other entry is a
/// finished design a folder may choose.
pub const PATTERNS: [Pattern; 8] = [
    Pattern::new("flat paper", 5),
    Pattern::new("Japanese crane", 5),
    Pattern::new("Tyrannosaurus Rex", 8),
    Pattern::new("paper airplane", 5),
    Pattern::new("butterfly", 8),
    Pattern::new("dragon", 10),
    Pattern::new("parrot", 12),
    Pattern::new("rabbit", 15),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_pattern_is_flat_paper() {
        assert_eq!(PATTERNS[RAW_PATTERN_INDEX].name, "flat paper");
    }

    #[test]
    fn test_fold_times_positive() {
        for pattern in PATTERNS.iter() {
            assert!(pattern.fold_secs > 0, "{} has no fold time", pattern.name);
        }
    }

    #[test]
    fn test_fold_time_duration() {
        assert_eq!(PATTERNS[7].fold_time(), Duration::from_secs(15));
    }
}
