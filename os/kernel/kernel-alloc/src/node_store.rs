//! # Tree Node Storage
//!
//! The allocator never calls a general-purpose allocator for its own
//! bookkeeping. Every tree node lives in a caller-provided slice of [`Node`]
//! slots: the kernel passes a static or loader-allocated buffer, tests pass a
//! boxed slice.
//!
//! ```text
//!  slot:   0      1      2      3      4      5      6      7
//!        ┌──────┬──────┬──────┬──────┬──────┬──────┬──────┬──────┐
//!        │ tree │ free │ tree │ tree │ free │      │      │      │
//!        └──────┴──┬───┴──────┴──────┴──▲───┴──────┴──────┴──────┘
//!                  └────── next ────────┘  ▲
//!  free_head = 5 (slot 4) ─────────────────┘ carved = 5
//! ```
//!
//! Slots are carved from the untouched tail of the buffer or recycled via a
//! free list that is threaded through the released slots themselves. The
//! store never shrinks.

use crate::extent::Extent;
use bitfield_struct::bitfield;
use core::num::NonZeroU32;
use core::ops::Not;

/// Handle of a node slot: the slot index plus one.
///
/// The offset lets `Option<NodeId>` stay four bytes wide and lets a raw `0`
/// mean "none" in packed links and handoff records.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Largest number of slots a store can address with a 31-bit link.
    pub const MAX_SLOTS: usize = (1 << 31) - 1;

    /// The handle of slot zero.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Decodes a raw handle; `0` is `None`.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Encodes an optional handle; `None` is `0`.
    #[inline]
    #[must_use]
    pub const fn into_raw(id: Option<Self>) -> u32 {
        match id {
            Some(id) => id.get(),
            None => 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Zero-based slot index.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        (self.0.get() - 1) as usize
    }

    #[inline]
    const fn from_slot(slot: u32) -> Self {
        match NonZeroU32::new(slot + 1) {
            Some(raw) => Self(raw),
            None => Self::FIRST,
        }
    }
}

/// Which child of a node.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    Left = 0,
    Right = 1,
}

impl Not for Direction {
    type Output = Self;

    #[inline]
    fn not(self) -> Self::Output {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// A packed child link.
///
/// Layout (LSB→MSB):
/// - bits 0..30: raw [`NodeId`] of the child (`0` = none)
/// - bit 31: flag; on the left link it marks the node red
#[bitfield(u32)]
pub(crate) struct NodeLink {
    #[bits(31)]
    pub index: u32,
    pub flag: bool,
}

/// One tree node. Exactly 32 bytes so a 4 KiB page holds 128 of them.
///
/// While a slot sits on the free list, its left link points to the next
/// free slot and the rest of the node is stale.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct Node {
    links: [NodeLink; 2],
    extent: Extent,
    most: u64,
}

const _: () = {
    assert!(size_of::<Node>() == 32);
    assert!(align_of::<Node>() == 8);
};

impl Node {
    /// The free range held by this node.
    #[inline]
    #[must_use]
    pub const fn extent(&self) -> Extent {
        self.extent
    }

    /// Length of the largest extent in the subtree rooted here.
    #[inline]
    #[must_use]
    pub const fn most_bytes_in_subtree(&self) -> u64 {
        self.most
    }

    #[inline]
    #[must_use]
    pub const fn is_red(&self) -> bool {
        self.links[0].flag()
    }

    #[inline]
    pub(crate) fn set_red(&mut self, red: bool) {
        self.links[0].set_flag(red);
    }

    #[inline]
    pub(crate) const fn child(&self, dir: Direction) -> Option<NodeId> {
        NodeId::from_raw(self.links[dir as usize].index())
    }

    #[inline]
    pub(crate) fn set_child(&mut self, dir: Direction, child: Option<NodeId>) {
        self.links[dir as usize].set_index(NodeId::into_raw(child));
    }

    #[inline]
    pub(crate) fn set_extent(&mut self, extent: Extent) {
        self.extent = extent;
    }

    #[inline]
    pub(crate) fn set_most(&mut self, most: u64) {
        self.most = most;
    }

    /// A detached black leaf holding `extent`.
    const fn detached(extent: Extent) -> Self {
        Self {
            links: [NodeLink::new(), NodeLink::new()],
            extent,
            most: extent.length,
        }
    }
}

/// Fixed-capacity arena of [`Node`] slots.
pub struct NodeStore<'a> {
    nodes: &'a mut [Node],
    carved: u32,
    free_head: Option<NodeId>,
}

impl<'a> NodeStore<'a> {
    /// Wraps an empty slot buffer.
    ///
    /// # Panics
    /// If the buffer holds more than [`NodeId::MAX_SLOTS`] slots.
    #[must_use]
    pub fn new(nodes: &'a mut [Node]) -> Self {
        Self::from_raw_parts(nodes, 0, None)
    }

    /// Re-adopts a buffer with `carved` slots in use and the given free list.
    ///
    /// The free list is trusted as-is.
    ///
    /// # Panics
    /// If the buffer holds more than [`NodeId::MAX_SLOTS`] slots or `carved`
    /// exceeds the buffer.
    #[must_use]
    pub fn from_raw_parts(nodes: &'a mut [Node], carved: u32, free_head: Option<NodeId>) -> Self {
        assert!(
            nodes.len() <= NodeId::MAX_SLOTS,
            "node buffer of {} slots exceeds the 31-bit handle space",
            nodes.len()
        );
        assert!(
            carved as usize <= nodes.len(),
            "{carved} carved slots in a buffer of {}",
            nodes.len()
        );
        Self {
            nodes,
            carved,
            free_head,
        }
    }

    /// Gives up the buffer together with the carved count and free-list head.
    #[must_use]
    pub fn into_raw_parts(self) -> (&'a mut [Node], u32, Option<NodeId>) {
        (self.nodes, self.carved, self.free_head)
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of slots handed out at least once.
    #[inline]
    #[must_use]
    pub const fn carved(&self) -> usize {
        self.carved as usize
    }

    /// Number of slots waiting on the free list. Walks the list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.free_head;
        while let Some(id) = cursor {
            count += 1;
            cursor = self.nodes[id.slot()].child(Direction::Left);
        }
        count
    }

    /// Number of slots currently handed out.
    #[must_use]
    pub fn live(&self) -> usize {
        self.carved() - self.free_count()
    }

    /// Hands out a detached node holding `extent`, or `None` if the buffer is full.
    pub fn acquire(&mut self, extent: Extent) -> Option<NodeId> {
        let id = if let Some(id) = self.free_head {
            self.free_head = self.nodes[id.slot()].child(Direction::Left);
            id
        } else if (self.carved as usize) < self.nodes.len() {
            let id = NodeId::from_slot(self.carved);
            self.carved += 1;
            id
        } else {
            return None;
        };

        self.nodes[id.slot()] = Node::detached(extent);
        Some(id)
    }

    /// Returns a slot to the free list. The slot is not cleared.
    pub fn release(&mut self, id: NodeId) {
        debug_assert!(id.slot() < self.carved(), "releasing uncarved slot {id:?}");
        let node = &mut self.nodes[id.slot()];
        node.links = [NodeLink::new(), NodeLink::new()];
        node.set_child(Direction::Left, self.free_head);
        self.free_head = Some(id);
    }

    /// Re-initialises a detached node to hold `extent`.
    pub fn reset(&mut self, id: NodeId, extent: Extent) {
        self.nodes[id.slot()] = Node::detached(extent);
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.slot()]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.slot()]
    }
}

impl core::fmt::Debug for NodeStore<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeStore")
            .field("capacity", &self.capacity())
            .field("carved", &self.carved)
            .field("free_head", &self.free_head)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_packing() {
        let mut node = Node::default();
        assert!(!node.is_red());
        node.set_child(Direction::Left, NodeId::from_raw(0x7fff_ffff));
        node.set_red(true);
        node.set_child(Direction::Right, NodeId::from_raw(3));
        assert!(node.is_red());
        assert_eq!(node.child(Direction::Left).map(NodeId::get), Some(0x7fff_ffff));
        assert_eq!(node.child(Direction::Right).map(NodeId::get), Some(3));
        node.set_child(Direction::Left, None);
        assert!(node.is_red());
        assert_eq!(node.child(Direction::Left), None);
    }

    #[test]
    fn handles_are_slot_plus_one() {
        assert_eq!(NodeId::FIRST.slot(), 0);
        assert_eq!(NodeId::FIRST.get(), 1);
        assert_eq!(NodeId::from_raw(0), None);
        assert_eq!(NodeId::into_raw(None), 0);
        assert_eq!(size_of::<Option<NodeId>>(), 4);
    }

    #[test]
    fn carve_until_full_then_recycle() {
        let mut buf = [Node::default(); 3];
        let mut store = NodeStore::new(&mut buf);

        let a = store.acquire(Extent::new(0, 10)).unwrap();
        let b = store.acquire(Extent::new(20, 10)).unwrap();
        let c = store.acquire(Extent::new(40, 10)).unwrap();
        assert_eq!(store.acquire(Extent::new(60, 10)), None);
        assert_eq!(store.carved(), 3);
        assert_eq!(store.live(), 3);

        store.release(b);
        store.release(a);
        assert_eq!(store.free_count(), 2);
        assert_eq!(store.live(), 1);

        // LIFO reuse
        assert_eq!(store.acquire(Extent::new(80, 5)), Some(a));
        assert_eq!(store.acquire(Extent::new(90, 5)), Some(b));
        assert_eq!(store.acquire(Extent::new(99, 1)), None);

        let node = store.get(b);
        assert_eq!(node.extent(), Extent::new(90, 5));
        assert_eq!(node.most_bytes_in_subtree(), 5);
        assert!(!node.is_red());
        assert_eq!(node.child(Direction::Left), None);
        assert_eq!(store.get(c).extent(), Extent::new(40, 10));
    }

    #[test]
    fn raw_parts_round_trip() {
        let mut buf = [Node::default(); 4];
        let mut store = NodeStore::new(&mut buf);
        let a = store.acquire(Extent::new(0, 1)).unwrap();
        store.acquire(Extent::new(2, 1)).unwrap();
        store.release(a);

        let (nodes, carved, free_head) = store.into_raw_parts();
        assert_eq!((carved, free_head), (2, Some(a)));

        let store = NodeStore::from_raw_parts(nodes, carved, free_head);
        assert_eq!(store.free_count(), 1);
        assert_eq!(store.live(), 1);
    }
}
