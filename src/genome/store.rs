//! Genome store orchestration
//!
//! The store owns three structures and is their sole mutator:
//!
//! - `base`: the original reference bytes, mutated in place only by
//!   substitutions that resolve to a base offset;
//! - `added`: an append-only buffer receiving the bytes of every
//!   insertion, exposed to the logical sequence through skip-list
//!   payload pieces;
//! - the offset-translation skip list and the k-mer index derived from
//!   them.
//!
//! Coordinate discipline is the central invariant. Callers speak
//! *logical* positions. The index stores *physical* offsets: a unified
//! space where offsets below `base.len()` address the reference and
//! offsets at or above it address the added buffer. Physical offsets are
//! stable for the lifetime of the store, so edits shift logical
//! coordinates without invalidating position lists; translation happens
//! here and nowhere else.

use std::collections::BTreeMap;

use crate::index::KmerIndex;
use crate::skiplist::{NodeId, OffsetSkipList, Piece};

use super::GenomeError;

/// Where a logical segment's bytes physically live.
enum Segment {
    Base(usize),
    Added(usize),
}

/// Delete reconciliation plans; decided before any mutation.
enum DeletePlan {
    /// Range lies inside one payload piece: shrink it.
    Splice(NodeId),
    /// Range starts exactly on a pieceless breakpoint: deepen its delta.
    Merge(NodeId),
    /// Range ends flush against the next breakpoint: fold into it.
    Fold(NodeId),
    /// Range sits strictly inside one segment: record a new breakpoint.
    Record,
}

/// Snapshot of index and translation-structure occupancy, for the
/// harness and tests.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct IndexStats {
    /// Current logical sequence length.
    pub length: usize,
    /// Recorded breakpoints (bottom skip-list level).
    pub breakpoints: usize,
    /// Linked skip-list levels.
    pub levels: usize,
    /// Distinct k-mers in the index.
    pub distinct_kmers: usize,
    /// Total stored occurrences.
    pub occurrences: usize,
    /// Hash-table occupancy.
    pub load_factor: f32,
}

/// Editable genomic sequence with k-mer indexed search.
///
/// Freshly constructed stores are *unindexed*: every edit and search
/// operation reports [`GenomeError::NotIndexed`] until
/// [`construct_hash`](GenomeStore::construct_hash) runs. Reads and
/// length queries work in either state.
#[derive(Debug)]
pub struct GenomeStore {
    base: Vec<u8>,
    added: Vec<u8>,
    edits: OffsetSkipList,
    /// Added-buffer offset of each live payload piece, keyed by the
    /// piece's first byte; the reverse-translation companion to the
    /// skip list's base-resume descent.
    added_origins: BTreeMap<usize, NodeId>,
    index: Option<KmerIndex>,
    k: usize,
}

impl GenomeStore {
    /// Store over `reference` with window length `k`.
    pub fn new(reference: impl Into<Vec<u8>>, k: usize) -> Result<Self, GenomeError> {
        Self::build(reference.into(), k, OffsetSkipList::new())
    }

    /// Store with a fixed skip-list promotion seed, for deterministic
    /// tests and benchmarks.
    pub fn with_seed(reference: impl Into<Vec<u8>>, k: usize, seed: u64) -> Result<Self, GenomeError> {
        Self::build(reference.into(), k, OffsetSkipList::with_seed(seed))
    }

    fn build(base: Vec<u8>, k: usize, edits: OffsetSkipList) -> Result<Self, GenomeError> {
        if k == 0 {
            return Err(GenomeError::InvalidK);
        }
        Ok(Self {
            base,
            added: Vec::new(),
            edits,
            added_origins: BTreeMap::new(),
            index: None,
            k,
        })
    }

    /// Window length of the k-mer index.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Current logical length: base length plus the skip list's net
    /// accumulated delta.
    pub fn len(&self) -> usize {
        (self.base.len() as isize + self.edits.total_delta()) as usize
    }

    /// True when the logical sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `construct_hash` has run.
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Number of recorded breakpoints.
    pub fn breakpoints(&self) -> usize {
        self.edits.len()
    }

    /// Build the k-mer index from the current logical text in one pass,
    /// transitioning the store to the indexed state. Rebuilding after
    /// edits is permitted and re-derives every entry.
    pub fn construct_hash(&mut self) {
        if self.edits.is_empty() {
            // Pristine store: logical and physical coincide, one pass.
            self.index = Some(KmerIndex::build(self.k, &self.base));
            return;
        }
        let mut index = KmerIndex::new(self.k);
        let len = self.len();
        if len >= self.k {
            let text = self.read_logical(0, len);
            for start in 0..=len - self.k {
                index.add(&text[start..start + self.k], self.locate(start));
            }
        }
        self.index = Some(index);
    }

    // --- coordinate translation -----------------------------------------

    /// Physical offset storing the byte at logical `position`.
    ///
    /// The translation primitive: payload bytes resolve into the added
    /// buffer through their breakpoint's piece; all other bytes resolve
    /// to `position - cumulative_delta(position)` in the base text.
    pub fn locate(&self, position: usize) -> usize {
        match self.edits.find_prev(position) {
            None => position,
            Some(id) => {
                let key = self.edits.key(id);
                if let Some(piece) = self.edits.piece(id) {
                    if position < key + piece.len {
                        return self.base.len() + piece.start + (position - key);
                    }
                }
                (position as isize - self.edits.offset(id)) as usize
            }
        }
    }

    /// Current logical position of a stored byte, the inverse of
    /// [`locate`](GenomeStore::locate). `None` for offsets no longer
    /// exposed by the logical sequence; index repair guarantees the
    /// store never asks for those.
    fn logical_of(&self, phys: usize) -> Option<usize> {
        if phys < self.base.len() {
            return match self.edits.find_prev_by_base(phys) {
                None => Some(phys),
                Some(id) => Some((phys as isize + self.edits.offset(id)) as usize),
            };
        }
        let added_offset = phys - self.base.len();
        let (&piece_start, &id) = self.added_origins.range(..=added_offset).next_back()?;
        let piece = self.edits.piece(id)?;
        debug_assert_eq!(piece.start, piece_start);
        if added_offset < piece.end() {
            Some(self.edits.key(id) + (added_offset - piece.start))
        } else {
            None
        }
    }

    // --- reads ----------------------------------------------------------

    /// Logical bytes `[start, start + len)`; bounds checked by callers.
    fn read_logical(&self, start: usize, len: usize) -> Vec<u8> {
        let total = self.len();
        let mut out = Vec::with_capacity(len);
        let mut pos = start;
        let end = start + len;
        while pos < end {
            let (bound, segment) = self.segment_at(pos, total);
            let take = bound.min(end) - pos;
            debug_assert!(take > 0, "segment resolution must make progress");
            match segment {
                Segment::Base(b) => out.extend_from_slice(&self.base[b..b + take]),
                Segment::Added(a) => out.extend_from_slice(&self.added[a..a + take]),
            }
            pos += take;
        }
        out
    }

    /// Segment containing logical `pos`: its exclusive logical end and
    /// the physical location of `pos` itself.
    fn segment_at(&self, pos: usize, total: usize) -> (usize, Segment) {
        match self.edits.find_prev(pos) {
            None => {
                let bound = self.edits.first().map_or(total, |id| self.edits.key(id));
                (bound, Segment::Base(pos))
            }
            Some(id) => {
                let key = self.edits.key(id);
                if let Some(piece) = self.edits.piece(id) {
                    if pos < key + piece.len {
                        return (key + piece.len, Segment::Added(piece.start + (pos - key)));
                    }
                }
                let bound = self
                    .edits
                    .next_of(id)
                    .map_or(total, |next| self.edits.key(next));
                (bound, Segment::Base((pos as isize - self.edits.offset(id)) as usize))
            }
        }
    }

    /// Read `length` logical bytes starting at `position`, crossing edit
    /// boundaries transparently. Also reports the resolved physical
    /// offset of `position` for caller diagnostics; an empty read
    /// reports the position itself.
    pub fn read_at(&self, position: usize, length: usize) -> Result<(Vec<u8>, usize), GenomeError> {
        let len = self.len();
        match position.checked_add(length) {
            Some(end) if end <= len => {}
            _ => {
                return Err(GenomeError::RangeOutOfBounds {
                    start: position,
                    end: position.saturating_add(length),
                    length: len,
                })
            }
        }
        if length == 0 {
            return Ok((Vec::new(), position));
        }
        Ok((self.read_logical(position, length), self.locate(position)))
    }

    // --- search ---------------------------------------------------------

    /// All logical start positions of `pattern`, ascending.
    ///
    /// Patterns of exactly K bytes are a direct index lookup plus
    /// translation. Longer patterns take the first window's candidates
    /// and verify the remainder against the logical text. Shorter
    /// patterns cannot use the index and fall back to a chunked scan of
    /// the logical text.
    pub fn search(&self, pattern: &[u8]) -> Result<Vec<usize>, GenomeError> {
        let index = self.index.as_ref().ok_or(GenomeError::NotIndexed)?;
        let m = pattern.len();
        let len = self.len();
        if m == 0 || m > len {
            return Ok(Vec::new());
        }
        if m < self.k {
            return Ok(self.scan(pattern));
        }
        let mut hits: Vec<usize> = index
            .positions(&pattern[..self.k])
            .iter()
            .filter_map(|&phys| self.logical_of(phys))
            .filter(|&pos| {
                m == self.k || (pos + m <= len && self.read_logical(pos, m) == pattern)
            })
            .collect();
        hits.sort_unstable();
        Ok(hits)
    }

    /// Exhaustive scan for sub-K patterns, reading the logical text in
    /// overlapping chunks so memory stays bounded.
    fn scan(&self, pattern: &[u8]) -> Vec<usize> {
        const CHUNK: usize = 64 * 1024;
        let m = pattern.len();
        let len = self.len();
        let mut hits = Vec::new();
        let mut start = 0;
        while start + m <= len {
            let take = CHUNK.max(m).min(len - start);
            let chunk = self.read_logical(start, take);
            for i in 0..=chunk.len() - m {
                if &chunk[i..i + m] == pattern {
                    hits.push(start + i);
                }
            }
            if start + take >= len {
                break;
            }
            // Re-read the last m-1 bytes so boundary matches are kept.
            start += take - (m - 1);
        }
        hits
    }

    // --- edits ----------------------------------------------------------

    /// Substitute `replacement.len()` bytes in place starting at logical
    /// `position`. No length change, no new breakpoint; the affected
    /// hash windows are repaired.
    pub fn snp_at(&mut self, position: usize, replacement: &[u8]) -> Result<(), GenomeError> {
        if self.index.is_none() {
            return Err(GenomeError::NotIndexed);
        }
        if replacement.is_empty() {
            return Err(GenomeError::EmptyEdit);
        }
        let len = self.len();
        match position.checked_add(replacement.len()) {
            Some(end) if end <= len => {}
            _ => {
                return Err(GenomeError::RangeOutOfBounds {
                    start: position,
                    end: position.saturating_add(replacement.len()),
                    length: len,
                })
            }
        }

        let removed = self.stale_windows(position, replacement.len(), len);
        for (i, &byte) in replacement.iter().enumerate() {
            let phys = self.locate(position + i);
            self.write_physical(phys, byte);
        }
        self.apply_repair(removed, position, replacement.len(), len);
        Ok(())
    }

    /// Insert `content` before logical `position` (`position == len()`
    /// appends). Content bytes are appended to the added buffer and
    /// exposed through a new breakpoint piece; an insertion landing
    /// inside an existing piece splits it so stored physical offsets
    /// never move.
    pub fn insert_at(&mut self, content: &[u8], position: usize) -> Result<(), GenomeError> {
        if self.index.is_none() {
            return Err(GenomeError::NotIndexed);
        }
        if content.is_empty() {
            return Err(GenomeError::EmptyEdit);
        }
        let len = self.len();
        if position > len {
            return Err(GenomeError::PositionOutOfBounds {
                position,
                length: len,
            });
        }

        let removed = self.stale_windows(position, 0, len);

        let grow = content.len() as isize;
        let piece = Piece {
            start: self.added.len(),
            len: content.len(),
        };
        self.added.extend_from_slice(content);

        match self.edits.find_prev(position) {
            None => {
                let id = self.edits.insert_with_piece(position, grow, piece);
                self.edits.shift_tail(id, false, grow, grow);
                self.added_origins.insert(piece.start, id);
            }
            Some(found) => {
                let key = self.edits.key(found);
                let plen = self.edits.piece(found).map_or(0, |p| p.len);
                if key == position {
                    // New content lands in front of this breakpoint:
                    // slide it (and everything after) out of the way
                    // first so keys stay strictly increasing.
                    self.edits.shift_tail(found, true, grow, grow);
                    let id = self.edits.insert_with_piece(position, grow, piece);
                    self.added_origins.insert(piece.start, id);
                } else if position < key + plen {
                    // Splitting a payload: the head keeps its node and
                    // its bytes, the tail moves to a fresh breakpoint.
                    let old = self.edits.piece(found).expect("payload split requires a piece");
                    let head_len = position - key;
                    self.edits.set_piece(
                        found,
                        Some(Piece {
                            start: old.start,
                            len: head_len,
                        }),
                    );
                    self.edits
                        .add_offset(found, -((old.len - head_len) as isize));
                    // Slide the suffix out of the way before linking the
                    // new breakpoints; the tail may land past an
                    // unshifted successor otherwise.
                    self.edits.shift_tail(found, false, grow, grow);
                    let id = self.edits.insert_with_piece(position, grow, piece);
                    let rest = Piece {
                        start: old.start + head_len,
                        len: old.len - head_len,
                    };
                    let tail = self
                        .edits
                        .insert_with_piece(position + content.len(), rest.len as isize, rest);
                    self.added_origins.insert(piece.start, id);
                    self.added_origins.insert(rest.start, tail);
                } else {
                    let id = self.edits.insert_with_piece(position, grow, piece);
                    self.edits.shift_tail(id, false, grow, grow);
                    self.added_origins.insert(piece.start, id);
                }
            }
        }

        self.apply_repair(removed, position, content.len(), len + content.len());
        Ok(())
    }

    /// Delete `length` logical bytes starting at `start`.
    ///
    /// `Ok(true)` means the edit applied fully. `Ok(false)` means the
    /// range could not be reconciled against existing breakpoints
    /// (it crosses a payload end, crosses a later breakpoint, or would
    /// collapse two breakpoints onto one key) and nothing was mutated.
    pub fn delete_at(&mut self, start: usize, length: usize) -> Result<bool, GenomeError> {
        if self.index.is_none() {
            return Err(GenomeError::NotIndexed);
        }
        if length == 0 {
            return Err(GenomeError::EmptyEdit);
        }
        let len = self.len();
        let end = match start.checked_add(length) {
            Some(end) if end <= len => end,
            _ => {
                return Err(GenomeError::RangeOutOfBounds {
                    start,
                    end: start.saturating_add(length),
                    length: len,
                })
            }
        };

        let Some(plan) = self.delete_plan(start, end, len) else {
            return Ok(false);
        };

        let removed = self.stale_windows(start, length, len);
        let shrink = length as isize;
        match plan {
            DeletePlan::Splice(node) => {
                let key = self.edits.key(node);
                let old = self.edits.piece(node).expect("splice plan requires a piece");
                let cut_from = start - key;
                let cut_to = end - key;
                if cut_to == old.len {
                    // Tail cut, possibly the whole payload.
                    if cut_from == 0 {
                        self.added_origins.remove(&old.start);
                        self.edits.set_piece(node, None);
                    } else {
                        self.edits.set_piece(
                            node,
                            Some(Piece {
                                start: old.start,
                                len: cut_from,
                            }),
                        );
                    }
                    self.edits.add_offset(node, -shrink);
                    self.edits.shift_tail(node, false, -shrink, -shrink);
                } else if cut_from == 0 {
                    // Head cut: the piece now starts deeper in the
                    // added buffer.
                    let rest = Piece {
                        start: old.start + cut_to,
                        len: old.len - cut_to,
                    };
                    self.added_origins.remove(&old.start);
                    self.edits.set_piece(node, Some(rest));
                    self.added_origins.insert(rest.start, node);
                    self.edits.add_offset(node, -shrink);
                    self.edits.shift_tail(node, false, -shrink, -shrink);
                } else {
                    // Middle cut: head keeps the node, tail moves to a
                    // fresh breakpoint at the cut position.
                    self.edits.set_piece(
                        node,
                        Some(Piece {
                            start: old.start,
                            len: cut_from,
                        }),
                    );
                    self.edits.add_offset(node, -((old.len - cut_from) as isize));
                    let rest = Piece {
                        start: old.start + cut_to,
                        len: old.len - cut_to,
                    };
                    let tail = self.edits.insert_with_piece(start, rest.len as isize, rest);
                    self.added_origins.insert(rest.start, tail);
                    self.edits.shift_tail(tail, false, -shrink, -shrink);
                }
            }
            DeletePlan::Merge(node) => {
                self.edits.add_offset(node, -shrink);
                self.edits.shift_tail(node, false, -shrink, -shrink);
            }
            DeletePlan::Fold(next) => {
                self.edits.shift_tail(next, true, -shrink, -shrink);
            }
            DeletePlan::Record => {
                let id = self.edits.insert(start, -shrink);
                self.edits.shift_tail(id, false, -shrink, -shrink);
            }
        }

        self.apply_repair(removed, start, 0, len - length);
        Ok(true)
    }

    /// Decide how a delete range maps onto the breakpoint structure, or
    /// `None` when it cannot be reconciled. Pure; runs before any
    /// mutation.
    fn delete_plan(&self, start: usize, end: usize, len: usize) -> Option<DeletePlan> {
        match self.edits.find_prev(start) {
            Some(id) => {
                let key = self.edits.key(id);
                let plen = self.edits.piece(id).map_or(0, |p| p.len);
                if plen > 0 && start < key + plen {
                    if end > key + plen {
                        return None; // crosses the payload's end
                    }
                    if start == key && end == key + plen {
                        if let Some(next) = self.edits.next_of(id) {
                            if self.edits.key(next) == key + plen {
                                // Removing the whole payload would land
                                // the next breakpoint on this key.
                                return None;
                            }
                        }
                    }
                    return Some(DeletePlan::Splice(id));
                }
                let next = self.edits.next_of(id);
                let bound = next.map_or(len, |nx| self.edits.key(nx));
                if end > bound {
                    return None; // crosses a later breakpoint
                }
                if end == bound {
                    if let Some(nx) = next {
                        if key == start {
                            return None; // pinned at both ends
                        }
                        return Some(DeletePlan::Fold(nx));
                    }
                }
                if key == start {
                    Some(DeletePlan::Merge(id))
                } else {
                    Some(DeletePlan::Record)
                }
            }
            None => {
                let first = self.edits.first();
                let bound = first.map_or(len, |f| self.edits.key(f));
                if end > bound {
                    return None;
                }
                if end == bound {
                    if let Some(f) = first {
                        return Some(DeletePlan::Fold(f));
                    }
                }
                Some(DeletePlan::Record)
            }
        }
    }

    // --- index repair ---------------------------------------------------

    /// Pre-edit windows whose content an edit at `position` of pre-edit
    /// width `width` invalidates: every window overlapping
    /// `[position, position + width)`, or spanning the edit point when
    /// the width is zero. Captured as `(bytes, physical offset)` pairs
    /// before the edit mutates anything.
    fn stale_windows(&self, position: usize, width: usize, len: usize) -> Vec<(Vec<u8>, usize)> {
        let k = self.k;
        let mut out = Vec::new();
        if len < k {
            return out;
        }
        let lo = position.saturating_sub(k - 1);
        let hi = (position + width).min(len + 1 - k);
        for s in lo..hi {
            out.push((self.read_logical(s, k), self.locate(s)));
        }
        out
    }

    /// Drop the captured stale windows and index every post-edit window
    /// overlapping the new content. Cannot fail; bounded by K plus the
    /// edit width, never by text length.
    fn apply_repair(
        &mut self,
        removed: Vec<(Vec<u8>, usize)>,
        position: usize,
        width: usize,
        new_len: usize,
    ) {
        let mut index = self.index.take().expect("edits require the indexed state");
        for (kmer, phys) in &removed {
            let present = index.remove(kmer, *phys);
            debug_assert!(present, "stale window was not indexed");
        }
        let k = self.k;
        if new_len >= k {
            let lo = position.saturating_sub(k - 1);
            let hi = (position + width).min(new_len + 1 - k);
            for s in lo..hi {
                let kmer = self.read_logical(s, k);
                let phys = self.locate(s);
                index.add(&kmer, phys);
            }
        }
        self.index = Some(index);
    }

    fn write_physical(&mut self, phys: usize, byte: u8) {
        if phys < self.base.len() {
            self.base[phys] = byte;
        } else {
            let at = phys - self.base.len();
            self.added[at] = byte;
        }
    }

    // --- diagnostics ----------------------------------------------------

    /// Hash-table occupancy, `None` while unindexed.
    pub fn load_factor(&self) -> Option<f32> {
        self.index.as_ref().map(KmerIndex::load_factor)
    }

    /// Occupancy snapshot for the harness.
    pub fn stats(&self) -> Result<IndexStats, GenomeError> {
        let index = self.index.as_ref().ok_or(GenomeError::NotIndexed)?;
        Ok(IndexStats {
            length: self.len(),
            breakpoints: self.edits.len(),
            levels: self.edits.level_count(),
            distinct_kmers: index.len(),
            occurrences: index.occurrence_count(),
            load_factor: index.load_factor(),
        })
    }

    /// Full consistency audit: every logical window must be indexed at
    /// its physical offset and nothing else may be stored. Linear in
    /// text length; diagnostic and test use only.
    pub fn check_hash(&self) -> bool {
        let Some(index) = self.index.as_ref() else {
            return false;
        };
        let len = self.len();
        let expected = if len >= self.k { len + 1 - self.k } else { 0 };
        if index.occurrence_count() != expected {
            return false;
        }
        if expected == 0 {
            return true;
        }
        let text = self.read_logical(0, len);
        for s in 0..expected {
            let kmer = &text[s..s + self.k];
            if !index.positions(kmer).contains(&self.locate(s)) {
                return false;
            }
        }
        true
    }

    /// The current logical sequence as a lossy string, for display.
    pub fn dump_sequence(&self) -> String {
        String::from_utf8_lossy(&self.read_logical(0, self.len())).into_owned()
    }

    /// Read-only view of the breakpoint structure, for display and
    /// structural assertions.
    pub fn skip_list(&self) -> &OffsetSkipList {
        &self.edits
    }

    /// Read-only view of the k-mer index once constructed.
    pub fn kmer_index(&self) -> Option<&KmerIndex> {
        self.index.as_ref()
    }
}
