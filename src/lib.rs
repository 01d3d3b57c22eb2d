//! # Dynamically Editable Genome Store
//!
//! This library maintains a large mutable genomic sequence under point
//! substitutions, arbitrary-length insertions and deletions, and exact
//! substring search, without ever rewriting the whole sequence on an
//! edit.
//!
//! ## Core Design
//!
//! 1. **Offset-translation skip list**: breakpoints record where edits
//!    changed the sequence and the accumulated length delta, so
//!    logical-to-physical translation is a logarithmic descent.
//! 2. **K-mer hash index**: every K-length window maps to the sorted
//!    physical offsets of its occurrences; an edit repairs only the
//!    windows it touches.
//! 3. **Genome store**: owns the text buffers and both derived
//!    structures and keeps them consistent; an edit either applies
//!    fully or leaves everything untouched.
//!
//! ## Usage Example
//!
//! ```ignore
//! use mcclintock::GenomeStore;
//!
//! let mut store = GenomeStore::new(b"ACGTACGT".to_vec(), 4)?;
//! store.construct_hash();
//! assert_eq!(store.search(b"ACGT")?, vec![0, 4]);
//! store.insert_at(b"TT", 4)?;
//! assert_eq!(store.search(b"ACGT")?, vec![0, 6]);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

// Core modules - each implements a key component of the design
pub mod genome;   // Genome store orchestration and edit repair
pub mod index;    // K-mer hash index
pub mod script;   // Harness-side script parsing
pub mod skiplist; // Offset-translation skip list

// Re-exports for convenience
pub use genome::{GenomeError, GenomeStore, IndexStats};
pub use index::KmerIndex;
pub use script::{EditOp, ScriptOp};
pub use skiplist::{NodeId, OffsetSkipList, Piece};

/// Default k-mer window length, matching the reference workloads.
pub const DEFAULT_K: usize = 4;
