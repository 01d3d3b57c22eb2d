//! Genome store: the mutation and query surface
//!
//! Owns the reference text, the offset-translation skip list, and the
//! k-mer index, and keeps the three consistent across every edit.

mod store;

pub use store::{GenomeStore, IndexStats};

use thiserror::Error;

/// Errors reported by genome-store operations.
///
/// Every variant is detected before any structural mutation begins, so a
/// failed call leaves the text, skip list, and index exactly as they were.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenomeError {
    /// Position lies outside the current logical sequence.
    #[error("position {position} is out of bounds for sequence of length {length}")]
    PositionOutOfBounds {
        /// Offending logical position.
        position: usize,
        /// Logical length at the time of the call.
        length: usize,
    },

    /// Range end runs past the current logical sequence.
    #[error("range [{start}, {end}) is out of bounds for sequence of length {length}")]
    RangeOutOfBounds {
        /// Inclusive logical start of the range.
        start: usize,
        /// Exclusive logical end of the range.
        end: usize,
        /// Logical length at the time of the call.
        length: usize,
    },

    /// The edit supplies or covers zero characters.
    #[error("edit must supply or cover at least one character")]
    EmptyEdit,

    /// Window length K must be at least one.
    #[error("k must be greater than zero")]
    InvalidK,

    /// An edit or search was issued before `construct_hash`.
    #[error("k-mer index has not been constructed; call construct_hash first")]
    NotIndexed,
}
