//! Work items flowing through the pipeline: origami patterns and pieces.

mod pattern;
mod piece;

pub use pattern::{Pattern, PATTERNS, RAW_PATTERN_INDEX};
pub use piece::Piece;
