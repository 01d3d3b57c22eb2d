//! Offset-translation skip list
//!
//! A multi-level ordered index over edit breakpoints. Each breakpoint
//! records the logical position where an edit took effect (`key`), the
//! accumulated signed length delta of all edits up to and including it
//! (`offset`), and optionally a [`Piece`] of literal inserted content.
//!
//! Two ordered views are maintained over the same nodes: the usual
//! key-ordered view answers "last breakpoint at or before logical P"
//! (`find_prev`) and "net length change before P" (`cumulative_delta`),
//! while the base-resume view (`find_prev_by_base`) answers the reverse
//! question "which breakpoint governs base offset B". Both are classic
//! top-down descents and run in expected logarithmic time under the
//! randomized level promotion.
//!
//! Breakpoint keys are kept in *current* logical coordinates: after a
//! structural edit, [`OffsetSkipList::shift_tail`] slides the keys and
//! offsets of every later breakpoint (and its tower copies) by the edit's
//! delta in one bottom-level pass.

mod node;

pub use node::{NodeId, Piece};

use node::Node;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Hard cap on tower height. With promotion probability 1/2 this covers
/// breakpoint counts far beyond anything a single run accumulates.
const MAX_HEIGHT: usize = 32;

/// Multi-level breakpoint index with cumulative offset bookkeeping.
#[derive(Debug)]
pub struct OffsetSkipList {
    arena: Vec<Node>,
    /// Sentinel head per level, bottom first. Sentinels carry no key and
    /// an offset of zero, which doubles as the identity translation for
    /// queries before the first breakpoint.
    heads: Vec<NodeId>,
    /// Last bottom-level node; its offset is the net delta of all edits.
    tail: Option<NodeId>,
    len: usize,
    rng: StdRng,
}

impl OffsetSkipList {
    /// Empty list with an entropy-seeded promotion source.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Empty list with a fixed promotion seed, for deterministic tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        let sentinel = Node {
            key: 0,
            offset: 0,
            piece: None,
            next: None,
            prev: None,
            up: None,
            down: None,
        };
        Self {
            arena: vec![sentinel],
            heads: vec![NodeId(0)],
            tail: None,
            len: 0,
            rng,
        }
    }

    /// Number of live breakpoints (bottom level).
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no breakpoint has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of linked levels, bottom level included.
    pub fn level_count(&self) -> usize {
        self.heads.len()
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node {
        &self.arena[id.index()]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.arena[id.index()]
    }

    /// Logical key of a breakpoint.
    pub fn key(&self, id: NodeId) -> usize {
        self.node(id).key
    }

    /// Accumulated offset through a breakpoint.
    pub fn offset(&self, id: NodeId) -> isize {
        self.node(id).offset
    }

    /// Payload piece of a breakpoint, if it carries inserted content.
    pub fn piece(&self, id: NodeId) -> Option<Piece> {
        self.node(id).piece
    }

    /// Successor of a bottom-level breakpoint.
    pub fn next_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    /// Predecessor of a bottom-level breakpoint, `None` for the first.
    pub fn prev_of(&self, id: NodeId) -> Option<NodeId> {
        let prev = self.node(id).prev?;
        if prev == self.heads[0] {
            None
        } else {
            Some(prev)
        }
    }

    /// First bottom-level breakpoint.
    pub fn first(&self) -> Option<NodeId> {
        self.node(self.heads[0]).next
    }

    /// Generic descent: last bottom-level node whose measure is at most
    /// `target`. The measure must be monotone non-decreasing along every
    /// level, which holds for both `key` and `base_resume`.
    fn find_prev_with<F>(&self, target: usize, measure: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> usize,
    {
        let mut cur = *self.heads.last().expect("at least one level");
        loop {
            while let Some(nid) = self.node(cur).next {
                if measure(self.node(nid)) <= target {
                    cur = nid;
                } else {
                    break;
                }
            }
            match self.node(cur).down {
                Some(down) => cur = down,
                None => break,
            }
        }
        if cur == self.heads[0] {
            None
        } else {
            Some(cur)
        }
    }

    /// Bottom-level node whose key equals `key` exactly.
    pub fn find(&self, key: usize) -> Option<NodeId> {
        let id = self.find_prev(key)?;
        if self.node(id).key == key {
            Some(id)
        } else {
            None
        }
    }

    /// Last bottom-level node with key at most `key`, `None` when `key`
    /// precedes every breakpoint.
    pub fn find_prev(&self, key: usize) -> Option<NodeId> {
        self.find_prev_with(key, |n| n.key)
    }

    /// Last bottom-level node whose following segment starts at or before
    /// `base` in the base text. The reverse-translation primitive.
    pub fn find_prev_by_base(&self, base: usize) -> Option<NodeId> {
        self.find_prev_with(base, |n| n.base_resume())
    }

    /// Accumulated offset of the last breakpoint at or before `key`.
    /// Zero before the first breakpoint; the final offset past the last
    /// one (all later text shifts by the final known delta).
    pub fn cumulative_delta(&self, key: usize) -> isize {
        self.find_prev(key).map_or(0, |id| self.node(id).offset)
    }

    /// Net length delta across every recorded edit.
    pub fn total_delta(&self) -> isize {
        self.tail.map_or(0, |id| self.node(id).offset)
    }

    /// Record a breakpoint with contribution `delta` and no payload.
    ///
    /// The node's accumulated offset is its predecessor's offset plus
    /// `delta`. The key must not collide with an existing breakpoint;
    /// callers shift the tail out of the way first when it would.
    pub fn insert(&mut self, key: usize, delta: isize) -> NodeId {
        self.insert_impl(key, delta, None)
    }

    /// Record a breakpoint carrying literal inserted content.
    pub fn insert_with_piece(&mut self, key: usize, delta: isize, piece: Piece) -> NodeId {
        self.insert_impl(key, delta, Some(piece))
    }

    fn insert_impl(&mut self, key: usize, delta: isize, piece: Option<Piece>) -> NodeId {
        // Collect the rightmost node with key <= target on every level.
        let mut preds = Vec::with_capacity(self.heads.len());
        let mut cur = *self.heads.last().expect("at least one level");
        loop {
            while let Some(nid) = self.node(cur).next {
                if self.node(nid).key <= key {
                    cur = nid;
                } else {
                    break;
                }
            }
            preds.push(cur);
            match self.node(cur).down {
                Some(down) => cur = down,
                None => break,
            }
        }
        preds.reverse();

        let prev = preds[0];
        debug_assert!(
            prev == self.heads[0] || self.node(prev).key < key,
            "duplicate breakpoint key {key}"
        );
        let offset = if prev == self.heads[0] {
            delta
        } else {
            self.node(prev).offset + delta
        };

        let prev_next = self.node(prev).next;
        let id = self.alloc(Node {
            key,
            offset,
            piece,
            next: prev_next,
            prev: Some(prev),
            up: None,
            down: None,
        });
        if let Some(nx) = prev_next {
            self.node_mut(nx).prev = Some(id);
        } else {
            self.tail = Some(id);
        }
        self.node_mut(prev).next = Some(id);
        self.len += 1;

        // Promote a tower of copies: one coin per level, at most one level
        // above the current top, hard-capped.
        let cap = self.heads.len();
        let mut level = 0;
        let mut lower = id;
        while level < cap && level + 1 < MAX_HEIGHT && self.rng.gen_bool(0.5) {
            level += 1;
            if level == self.heads.len() {
                let top = *self.heads.last().expect("at least one level");
                let sentinel = self.alloc(Node {
                    key: 0,
                    offset: 0,
                    piece: None,
                    next: None,
                    prev: None,
                    up: None,
                    down: Some(top),
                });
                self.node_mut(top).up = Some(sentinel);
                self.heads.push(sentinel);
                preds.push(sentinel);
            }
            let pred = preds[level];
            let pred_next = self.node(pred).next;
            let copy = self.alloc(Node {
                key,
                offset,
                piece,
                next: pred_next,
                prev: Some(pred),
                up: None,
                down: Some(lower),
            });
            if let Some(nx) = pred_next {
                self.node_mut(nx).prev = Some(copy);
            }
            self.node_mut(pred).next = Some(copy);
            self.node_mut(lower).up = Some(copy);
            lower = copy;
        }

        id
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.arena.len() as u32);
        self.arena.push(node);
        id
    }

    /// Replace the payload piece of a breakpoint, syncing its tower.
    pub fn set_piece(&mut self, id: NodeId, piece: Option<Piece>) {
        self.node_mut(id).piece = piece;
        self.sync_tower(id);
    }

    /// Adjust the accumulated offset of a single breakpoint, syncing its
    /// tower. Used when an edit changes how much content a breakpoint
    /// contributes without moving it.
    pub fn add_offset(&mut self, id: NodeId, delta: isize) {
        self.node_mut(id).offset += delta;
        self.sync_tower(id);
    }

    /// Shift keys and accumulated offsets of a bottom-level suffix,
    /// starting at `from` (inclusive or not), tower copies included.
    /// One pass per structural edit keeps every key current.
    pub fn shift_tail(&mut self, from: NodeId, inclusive: bool, key_shift: isize, offset_shift: isize) {
        let mut cur = if inclusive {
            Some(from)
        } else {
            self.node(from).next
        };
        while let Some(id) = cur {
            {
                let n = self.node_mut(id);
                n.key = (n.key as isize + key_shift) as usize;
                n.offset += offset_shift;
            }
            self.sync_tower(id);
            cur = self.node(id).next;
        }
    }

    fn sync_tower(&mut self, id: NodeId) {
        let (key, offset, piece) = {
            let n = self.node(id);
            (n.key, n.offset, n.piece)
        };
        let mut up = self.node(id).up;
        while let Some(uid) = up {
            let u = self.node_mut(uid);
            u.key = key;
            u.offset = offset;
            u.piece = piece;
            up = u.up;
        }
    }

    /// Iterate bottom-level breakpoints in key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cur: self.first(),
        }
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_invariants(&self) {
        for (level, &head) in self.heads.iter().enumerate() {
            let mut cur = self.node(head).next;
            let mut last_key: Option<usize> = None;
            while let Some(id) = cur {
                let n = self.node(id);
                if let Some(k) = last_key {
                    assert!(k < n.key, "keys must strictly increase on level {level}");
                }
                last_key = Some(n.key);
                if level > 0 {
                    let down = n.down.expect("upper node must link down");
                    assert_eq!(self.node(down).key, n.key, "tower keys must match");
                    assert_eq!(self.node(down).offset, n.offset, "tower offsets must match");
                }
                cur = n.next;
            }
        }
    }
}

/// Bottom-level iterator over breakpoints.
#[derive(Debug)]
pub struct Iter<'a> {
    list: &'a OffsetSkipList,
    cur: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cur?;
        self.cur = self.list.node(id).next;
        Some(id)
    }
}

impl fmt::Display for OffsetSkipList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, &head) in self.heads.iter().enumerate().rev() {
            write!(f, "L{level}:")?;
            let mut cur = self.node(head).next;
            while let Some(id) = cur {
                let n = self.node(id);
                match n.piece {
                    Some(p) => write!(f, " {}({:+})[{}B]", n.key, n.offset, p.len)?,
                    None => write!(f, " {}({:+})", n.key, n.offset)?,
                }
                cur = n.next;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
