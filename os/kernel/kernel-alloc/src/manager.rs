//! # Region Allocator
//!
//! [`MemoryManager`] turns an [`ExtentTree`] into an allocator of aligned byte
//! ranges. The kernel runs two of them, one per [`MemoryKind`]; they never
//! share nodes.
//!
//! ```text
//!            removed extent
//!   ├───────────────────────────────────────────┤
//!   │ before │ ◀── bytes ──▶ │       after      │
//!   ├────────┼───────────────┼──────────────────┤
//!   start    aligned start   aligned start + bytes
//! ```
//!
//! An allocation removes an extent of at least `bytes + align - 1` bytes,
//! keeps the aligned middle and puts the remainders back. The removed node is
//! reused for the first remainder, so only a split on both sides needs a
//! fresh slot.

use crate::extent::{Extent, align_up};
use crate::node_store::{Node, NodeId, NodeStore};
use crate::tree::{ExtentTree, Extents, TreeStats, TreeViolation};
use kernel_info::memory::{VIRTUAL_ALLOCATION_END, VIRTUAL_ALLOCATION_START};
use log::{info, trace, warn};

pub use kernel_info::boot::MemoryManagerKind as MemoryKind;

/// Interrupt vector raised when physical memory runs out.
pub const NO_MORE_PHYSICAL_MEMORY_VECTOR: u8 = 34;

/// Interrupt vector raised when kernel virtual address space runs out.
pub const NO_MORE_VIRTUAL_MEMORY_VECTOR: u8 = 35;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("out of physical memory ({requested:#x} bytes requested)")]
    NoMorePhysicalMemory { requested: u64 },
    #[error("out of virtual memory ({requested:#x} bytes requested)")]
    NoMoreVirtualMemory { requested: u64 },
}

impl AllocError {
    #[must_use]
    pub const fn exhausted(kind: MemoryKind, requested: u64) -> Self {
        match kind {
            MemoryKind::Physical => Self::NoMorePhysicalMemory { requested },
            MemoryKind::Virtual => Self::NoMoreVirtualMemory { requested },
        }
    }

    /// The fault vector the interrupt layer raises for this error.
    #[must_use]
    pub const fn fault_vector(self) -> u8 {
        match self {
            Self::NoMorePhysicalMemory { .. } => NO_MORE_PHYSICAL_MEMORY_VECTOR,
            Self::NoMoreVirtualMemory { .. } => NO_MORE_VIRTUAL_MEMORY_VECTOR,
        }
    }

    #[must_use]
    pub const fn requested(self) -> u64 {
        match self {
            Self::NoMorePhysicalMemory { requested } | Self::NoMoreVirtualMemory { requested } => {
                requested
            }
        }
    }
}

/// Free memory as seen by [`MemoryManager::available_summary`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MemorySummary {
    pub total_free_bytes: u64,
    pub node_count: usize,
}

/// Allocator of aligned byte ranges out of a set of free extents.
pub struct MemoryManager<'a> {
    kind: MemoryKind,
    tree: ExtentTree<'a>,
}

impl<'a> MemoryManager<'a> {
    /// An empty manager keeping its nodes in `nodes`.
    #[must_use]
    pub fn new(kind: MemoryKind, nodes: &'a mut [Node]) -> Self {
        info!("{kind:?} memory manager: {} node slots", nodes.len());
        Self {
            kind,
            tree: ExtentTree::new(NodeStore::new(nodes)),
        }
    }

    /// A manager seeded with `extents`. Empty extents are skipped.
    ///
    /// # Panics
    /// See [`free`](Self::free).
    #[must_use]
    pub fn with_extents<I>(kind: MemoryKind, nodes: &'a mut [Node], extents: I) -> Self
    where
        I: IntoIterator<Item = Extent>,
    {
        let mut manager = Self::new(kind, nodes);
        manager.add_free_extents(extents);
        manager
    }

    /// The virtual memory manager, seeded with the kernel's dynamic window
    /// `[VIRTUAL_ALLOCATION_START, VIRTUAL_ALLOCATION_END)`.
    #[must_use]
    pub fn for_virtual_range(nodes: &'a mut [Node]) -> Self {
        let window = Extent::new(
            VIRTUAL_ALLOCATION_START,
            VIRTUAL_ALLOCATION_END - VIRTUAL_ALLOCATION_START,
        );
        Self::with_extents(MemoryKind::Virtual, nodes, [window])
    }

    pub(crate) const fn from_tree(kind: MemoryKind, tree: ExtentTree<'a>) -> Self {
        Self { kind, tree }
    }

    pub(crate) fn into_tree(self) -> (MemoryKind, ExtentTree<'a>) {
        (self.kind, self.tree)
    }

    /// Frees every non-empty extent of `extents`.
    ///
    /// # Panics
    /// See [`free`](Self::free).
    pub fn add_free_extents<I>(&mut self, extents: I)
    where
        I: IntoIterator<Item = Extent>,
    {
        for extent in extents.into_iter().filter(|e| !e.is_empty()) {
            self.free(extent.start, extent.length);
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Allocates `bytes` bytes aligned to `align` and returns the start address.
    ///
    /// # Errors
    /// [`AllocError`] for this manager's kind if no free extent is large
    /// enough. The manager is unchanged in that case.
    ///
    /// # Panics
    /// If `bytes` is zero, `align` is not a power of two, or the node buffer
    /// is exhausted.
    pub fn allocate(&mut self, bytes: u64, align: u64) -> Result<u64, AllocError> {
        assert!(bytes > 0, "zero-sized allocation");
        assert!(align.is_power_of_two(), "alignment {align:#x} is not a power of two");

        let Some(total) = bytes.checked_add(align - 1) else {
            return Err(self.exhausted(bytes));
        };
        let Some(id) = self.tree.delete_at_least(total) else {
            return Err(self.exhausted(bytes));
        };

        let extent = self.tree.extent(id);
        let start = align_up(extent.start, align);
        let before = Extent::new(extent.start, start - extent.start);
        let after = Extent::new(start + bytes, extent.end() - (start + bytes));

        let mut spare = Some(id);
        for remainder in [before, after] {
            if remainder.is_empty() {
                continue;
            }
            let node = match spare.take() {
                Some(id) => {
                    self.tree.nodes_mut().reset(id, remainder);
                    id
                }
                None => self.acquire(remainder),
            };
            self.insert(node);
        }
        if let Some(id) = spare {
            self.tree.nodes_mut().release(id);
        }

        trace!(
            "{:?}: allocated {bytes:#x} bytes at {start:#x} (align {align:#x})",
            self.kind
        );
        Ok(start)
    }

    /// Returns `[start, start + bytes)` to the manager.
    ///
    /// # Panics
    /// If `bytes` is zero, the range wraps the address space, it overlaps
    /// memory that is already free, or the node buffer is exhausted. A range
    /// ending exactly at 2^64 counts as wrapping, so the top byte is never free.
    pub fn free(&mut self, start: u64, bytes: u64) {
        assert!(bytes > 0, "zero-sized free at {start:#x}");
        assert!(
            start.checked_add(bytes).is_some(),
            "free of {bytes:#x} bytes at {start:#x} wraps the address space"
        );

        let extent = Extent::new(start, bytes);
        assert!(
            !self.tree.overlaps(&extent),
            "{:?}: freeing {extent:x?}, which overlaps free memory",
            self.kind
        );

        let id = self.acquire(extent);
        self.insert(id);
        trace!("{:?}: freed {bytes:#x} bytes at {start:#x}", self.kind);
    }

    /// Total free bytes and number of free extents.
    #[must_use]
    pub fn available_summary(&self) -> MemorySummary {
        self.tree
            .iter()
            .fold(MemorySummary::default(), |summary, extent| MemorySummary {
                total_free_bytes: summary.total_free_bytes + extent.length,
                node_count: summary.node_count + 1,
            })
    }

    /// Length of the largest free extent.
    #[inline]
    #[must_use]
    pub fn largest_free_extent(&self) -> u64 {
        self.tree.largest()
    }

    /// The free extents in address order.
    #[must_use]
    pub fn extents(&self) -> Extents<'_, 'a> {
        self.tree.iter()
    }

    /// Whether any byte of `extent` is currently free.
    #[must_use]
    pub fn overlaps_free(&self, extent: &Extent) -> bool {
        self.tree.overlaps(extent)
    }

    #[must_use]
    pub const fn tree(&self) -> &ExtentTree<'a> {
        &self.tree
    }

    /// Runs the tree self-check.
    ///
    /// # Errors
    /// The first invariant violation found.
    pub fn verify(&self) -> Result<TreeStats, TreeViolation> {
        self.tree.verify()
    }

    fn insert(&mut self, id: NodeId) {
        for freed in self.tree.insert(id) {
            self.tree.nodes_mut().release(freed);
        }
    }

    fn acquire(&mut self, extent: Extent) -> NodeId {
        let Some(id) = self.tree.nodes_mut().acquire(extent) else {
            panic!(
                "{:?} memory manager ran out of its {} tree nodes",
                self.kind,
                self.tree.nodes().capacity()
            );
        };
        id
    }

    fn exhausted(&self, requested: u64) -> AllocError {
        warn!(
            "{:?}: cannot allocate {requested:#x} bytes, largest free extent is {:#x}",
            self.kind,
            self.tree.largest()
        );
        AllocError::exhausted(self.kind, requested)
    }
}

impl core::fmt::Debug for MemoryManager<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("kind", &self.kind)
            .field("tree", &self.tree)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(slots: usize) -> Box<[Node]> {
        vec![Node::default(); slots].into_boxed_slice()
    }

    #[test]
    fn aligned_allocation_splits_both_sides() {
        let mut buf = buffer(8);
        let mut m = MemoryManager::with_extents(MemoryKind::Physical, &mut buf, [Extent::new(3, 4093)]);

        let a = m.allocate(100, 16).unwrap();
        assert_eq!(a, 16);
        assert_eq!(
            m.extents().collect::<Vec<_>>(),
            [Extent::new(3, 13), Extent::new(116, 4096 - 116)]
        );
        assert_eq!(m.available_summary().total_free_bytes, 4093 - 100);
        m.verify().unwrap();
    }

    #[test]
    fn aligned_allocation_from_page() {
        let mut buf = buffer(8);
        let mut m = MemoryManager::with_extents(MemoryKind::Physical, &mut buf, [Extent::new(0, 4096)]);

        let a = m.allocate(100, 16).unwrap();
        assert_eq!(a % 16, 0);
        let summary = m.available_summary();
        assert_eq!(summary.total_free_bytes, 4096 - 100);
        assert_eq!(summary.node_count, 1);
        assert_eq!(m.tree().nodes().live(), 1);
    }

    #[test]
    fn exact_fit_releases_the_node() {
        let mut buf = buffer(4);
        let mut m = MemoryManager::with_extents(MemoryKind::Virtual, &mut buf, [Extent::new(0x1000, 0x1000)]);
        assert_eq!(m.allocate(0x1000, 1), Ok(0x1000));
        assert_eq!(m.available_summary(), MemorySummary::default());
        assert_eq!(m.tree().nodes().live(), 0);
        assert_eq!(m.tree().nodes().free_count(), 1);

        m.free(0x1000, 0x1000);
        assert_eq!(m.largest_free_extent(), 0x1000);
    }

    #[test]
    fn page_alignment_needs_slack() {
        let mut buf = buffer(4);
        let mut m = MemoryManager::with_extents(MemoryKind::Physical, &mut buf, [Extent::new(0x1000, 0x1000)]);
        assert_eq!(
            m.allocate(0x1000, 0x1000),
            Err(AllocError::NoMorePhysicalMemory { requested: 0x1000 })
        );

        m.free(0x2000, 0xfff);
        assert_eq!(m.allocate(0x1000, 0x1000), Ok(0x1000));
        assert_eq!(m.extents().collect::<Vec<_>>(), [Extent::new(0x2000, 0xfff)]);
    }

    #[test]
    fn exhaustion_depends_on_kind() {
        let mut buf = buffer(4);
        let mut m = MemoryManager::new(MemoryKind::Physical, &mut buf);
        let err = m.allocate(1, 1).unwrap_err();
        assert_eq!(err, AllocError::NoMorePhysicalMemory { requested: 1 });
        assert_eq!(err.fault_vector(), 34);

        let mut buf = buffer(4);
        let mut m = MemoryManager::with_extents(MemoryKind::Virtual, &mut buf, [Extent::new(0, 64)]);
        let err = m.allocate(64, 2).unwrap_err();
        assert_eq!(err, AllocError::NoMoreVirtualMemory { requested: 64 });
        assert_eq!(err.fault_vector(), 35);
        assert_eq!(m.largest_free_extent(), 64);

        assert!(matches!(
            m.allocate(u64::MAX, 2),
            Err(AllocError::NoMoreVirtualMemory { .. })
        ));
    }

    #[test]
    fn free_coalesces_back() {
        let mut buf = buffer(8);
        let mut m = MemoryManager::with_extents(MemoryKind::Physical, &mut buf, [Extent::new(0, 0x10000)]);
        let a = m.allocate(0x1000, 0x1000).unwrap();
        let b = m.allocate(0x1000, 0x1000).unwrap();
        let c = m.allocate(0x1000, 0x1000).unwrap();
        m.free(b, 0x1000);
        m.free(a, 0x1000);
        m.free(c, 0x1000);
        assert_eq!(m.extents().collect::<Vec<_>>(), [Extent::new(0, 0x10000)]);
        assert_eq!(m.tree().nodes().live(), 1);
    }

    #[test]
    fn virtual_window() {
        let mut buf = buffer(4);
        let m = MemoryManager::for_virtual_range(&mut buf);
        assert_eq!(m.kind(), MemoryKind::Virtual);
        assert_eq!(
            m.largest_free_extent(),
            VIRTUAL_ALLOCATION_END - VIRTUAL_ALLOCATION_START
        );
    }

    #[test]
    #[should_panic(expected = "overlaps free memory")]
    fn double_free_is_fatal() {
        let mut buf = buffer(4);
        let mut m = MemoryManager::with_extents(MemoryKind::Physical, &mut buf, [Extent::new(0, 0x1000)]);
        m.free(0x800, 0x10);
    }

    #[test]
    #[should_panic(expected = "wraps the address space")]
    fn free_up_to_the_top_byte_is_fatal() {
        let mut buf = buffer(4);
        let mut m = MemoryManager::new(MemoryKind::Virtual, &mut buf);
        m.free(u64::MAX - 0xfff, 0x1000);
    }

    #[test]
    #[should_panic(expected = "zero-sized")]
    fn zero_sized_allocation_is_fatal() {
        let mut buf = buffer(4);
        let mut m = MemoryManager::new(MemoryKind::Physical, &mut buf);
        let _ = m.allocate(0, 8);
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn odd_alignment_is_fatal() {
        let mut buf = buffer(4);
        let mut m = MemoryManager::new(MemoryKind::Physical, &mut buf);
        let _ = m.allocate(8, 24);
    }

    #[test]
    #[should_panic(expected = "ran out of its 1 tree nodes")]
    fn node_exhaustion_is_fatal() {
        let mut buf = buffer(1);
        let mut m = MemoryManager::with_extents(MemoryKind::Physical, &mut buf, [Extent::new(0, 0x1000)]);
        let _ = m.allocate(0x10, 0x100);
        let _ = m.allocate(0x10, 0x100);
    }
}
