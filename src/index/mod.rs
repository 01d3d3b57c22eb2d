//! K-mer hash index
//!
//! Maps every K-length window of the logical sequence to the sorted list
//! of *physical* offsets where the window's first byte is stored. Storing
//! physical offsets keeps the table valid when edits shift logical
//! coordinates: the store recomputes logical positions through the skip
//! list at query time instead of rewriting position lists.
//!
//! The table only ever changes through local repair: after an edit the
//! store removes the occurrences of every stale window and adds the
//! occurrences of every new one, a bounded number of operations per edit.

use fxhash::FxHashMap;
use std::fmt;

/// Position table keyed by fixed-length substrings.
#[derive(Debug, Clone)]
pub struct KmerIndex {
    k: usize,
    map: FxHashMap<Box<[u8]>, Vec<usize>>,
}

impl KmerIndex {
    /// Empty index for windows of length `k`.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            map: FxHashMap::default(),
        }
    }

    /// Index every window of `text` in one pass. Positions are raw text
    /// offsets, which at construction time coincide with both logical and
    /// physical coordinates. Empty or shorter-than-K text yields an empty
    /// index.
    pub fn build(k: usize, text: &[u8]) -> Self {
        let mut index = Self::new(k);
        if k > 0 && text.len() >= k {
            for start in 0..=text.len() - k {
                index.add(&text[start..start + k], start);
            }
        }
        index
    }

    /// Window length this index was built for.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of distinct k-mers present.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no k-mer is recorded.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sorted physical offsets of `kmer`. A never-seen pattern yields an
    /// empty slice, not an error.
    pub fn positions(&self, kmer: &[u8]) -> &[usize] {
        self.map.get(kmer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record one occurrence of `kmer` at physical offset `phys`.
    pub fn add(&mut self, kmer: &[u8], phys: usize) {
        debug_assert_eq!(kmer.len(), self.k);
        let entry = self
            .map
            .entry(kmer.to_vec().into_boxed_slice())
            .or_default();
        match entry.binary_search(&phys) {
            // Each physical offset names one stored byte, so a window can
            // occur there at most once.
            Ok(_) => debug_assert!(false, "duplicate occurrence at {phys}"),
            Err(at) => entry.insert(at, phys),
        }
    }

    /// Remove one occurrence of `kmer` at physical offset `phys`. Returns
    /// whether the occurrence was present. Entries left empty are kept;
    /// callers only ever observe position lists.
    pub fn remove(&mut self, kmer: &[u8], phys: usize) -> bool {
        let Some(entry) = self.map.get_mut(kmer) else {
            return false;
        };
        match entry.binary_search(&phys) {
            Ok(at) => {
                entry.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Occupancy of the underlying table, the original load diagnostic.
    pub fn load_factor(&self) -> f32 {
        if self.map.capacity() == 0 {
            0.0
        } else {
            self.map.len() as f32 / self.map.capacity() as f32
        }
    }

    /// Iterate entries as `(kmer, positions)` in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &[usize])> {
        self.map
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_slice()))
    }

    /// Total stored occurrences across all entries.
    pub fn occurrence_count(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }
}

impl fmt::Display for KmerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows: Vec<(&[u8], &[usize])> = self.entries().collect();
        rows.sort_by_key(|(kmer, _)| *kmer);
        for (kmer, positions) in rows {
            writeln!(
                f,
                "{}\t{:?}",
                String::from_utf8_lossy(kmer),
                positions
            )?;
        }
        Ok(())
    }
}
