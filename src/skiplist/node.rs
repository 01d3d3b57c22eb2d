//! Arena node representation
//!
//! Nodes live in a flat arena and refer to each other through `NodeId`
//! handles instead of pointers, so the four-way linkage (`next`/`prev`/
//! `up`/`down`) cannot dangle and tower invariants stay mechanically
//! checkable.

/// Handle to a node in the skip-list arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Window into the append-only insert buffer exposed by a breakpoint.
///
/// A breakpoint carrying a piece presents `len` literal bytes, stored at
/// `[start, start + len)` in the added buffer, at its logical position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct Piece {
    /// Offset of the first byte within the added buffer.
    pub start: usize,
    /// Number of bytes exposed.
    pub len: usize,
}

impl Piece {
    /// One past the last added-buffer offset covered by this piece.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// One linked node. Tower copies of a breakpoint duplicate `key`,
/// `offset`, and `piece`; only the bottom copy is authoritative and the
/// duplicates are kept in sync whenever the bottom copy changes.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub key: usize,
    pub offset: isize,
    pub piece: Option<Piece>,
    pub next: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub up: Option<NodeId>,
    pub down: Option<NodeId>,
}

impl Node {
    /// Number of payload bytes this breakpoint exposes.
    #[inline]
    pub fn piece_len(&self) -> usize {
        self.piece.map_or(0, |p| p.len)
    }

    /// Physical offset in the base text where the segment following this
    /// breakpoint resumes. Monotone non-decreasing along the bottom level,
    /// which is what makes reverse (physical to logical) lookups a plain
    /// skip-list descent.
    #[inline]
    pub fn base_resume(&self) -> usize {
        ((self.key + self.piece_len()) as isize - self.offset) as usize
    }
}
