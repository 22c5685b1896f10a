//! # Loader → Kernel Handoff
//!
//! The loader builds both memory managers while boot services are still up,
//! then packs them into the parameter block as plain
//! [`MemoryManagerInfo`] records. The kernel re-adopts them without walking
//! the trees: node buffers move over verbatim, only their base address is
//! rebased from the loader's identity mapping to the kernel's direct map.
//!
//! ```text
//!   loader                                    kernel
//!   ──────                                    ──────
//!   MemoryManager<'static>                    MemoryManager<'static>
//!        │ into_handoff()                          ▲ from_handoff()
//!        ▼                                         │
//!   MemoryManagerInfo ── relocated(HHDM_BASE) ──▶ MemoryManagerInfo
//!        (identity VA)                              (direct-map VA)
//! ```

use crate::extent::Extent;
use crate::manager::{MemoryKind, MemoryManager};
use crate::node_store::{Node, NodeId, NodeStore};
use crate::tree::ExtentTree;
use kernel_info::boot::{ExtentInfo, KernelMemoryInfo, MemoryManagerInfo};
use log::info;

impl MemoryManager<'static> {
    /// Packs the manager into its handoff record.
    ///
    /// The node buffer stays where it is; the record only points at it.
    #[must_use]
    pub fn into_handoff(self) -> MemoryManagerInfo {
        let (kind, tree) = self.into_tree();
        let (store, root) = tree.into_raw_parts();
        let (nodes, carved, free_head) = store.into_raw_parts();

        // The store never accepts more than 31-bit worth of slots.
        #[allow(clippy::cast_possible_truncation)]
        let capacity = nodes.len() as u32;

        let info = MemoryManagerInfo {
            nodes_ptr: nodes.as_mut_ptr().expose_provenance() as u64,
            nodes_capacity: capacity,
            nodes_carved: carved,
            free_head: NodeId::into_raw(free_head),
            root: NodeId::into_raw(root),
            kind,
            reserved: 0,
        };
        info!(
            "{kind:?} memory manager handed off: {carved}/{capacity} slots at {:#x}",
            info.nodes_ptr
        );
        info
    }

    /// Re-adopts a manager from its handoff record.
    ///
    /// Nothing is re-validated; run [`verify`](MemoryManager::verify) if the
    /// record is in doubt.
    ///
    /// # Safety
    /// * `info` was produced by [`into_handoff`](Self::into_handoff), possibly
    ///   [relocated](MemoryManagerInfo::relocated), and the buffer is unchanged since.
    /// * `info.nodes_ptr` points to `info.nodes_capacity` properly aligned
    ///   [`Node`] slots that stay readable and writable for the rest of the
    ///   program.
    /// * Nothing else accesses the buffer while the manager exists.
    #[must_use]
    pub unsafe fn from_handoff(info: &MemoryManagerInfo) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let ptr = core::ptr::with_exposed_provenance_mut::<Node>(info.nodes_ptr as usize);

        let nodes: &'static mut [Node] = if info.nodes_capacity == 0 {
            &mut []
        } else {
            debug_assert!(ptr.is_aligned(), "misaligned node buffer at {ptr:p}");
            // SAFETY: the caller guarantees an exclusive, live buffer of this size.
            unsafe { core::slice::from_raw_parts_mut(ptr, info.nodes_capacity as usize) }
        };

        let store = NodeStore::from_raw_parts(nodes, info.nodes_carved, NodeId::from_raw(info.free_head));
        let tree = ExtentTree::from_raw_parts(store, NodeId::from_raw(info.root));
        info!(
            "{:?} memory manager adopted: {} extents, {}/{} slots at {:#x}",
            info.kind,
            tree.len(),
            info.nodes_carved,
            info.nodes_capacity,
            info.nodes_ptr
        );
        Self::from_tree(info.kind, tree)
    }
}

/// The kernel's two memory managers.
#[derive(Debug)]
pub struct KernelMemory {
    pub physical: MemoryManager<'static>,
    pub virtual_memory: MemoryManager<'static>,
}

impl KernelMemory {
    /// Packs both managers for the parameter block.
    ///
    /// `leftover_free` is loader memory the kernel may free once it runs;
    /// `parameters` is the physical range of the parameter block itself.
    #[must_use]
    pub fn into_handoff(self, leftover_free: Extent, parameters: Extent) -> KernelMemoryInfo {
        debug_assert_eq!(self.physical.kind(), MemoryKind::Physical);
        debug_assert_eq!(self.virtual_memory.kind(), MemoryKind::Virtual);
        KernelMemoryInfo {
            physical: self.physical.into_handoff(),
            virtual_memory: self.virtual_memory.into_handoff(),
            leftover_free: leftover_free.into(),
            parameters: parameters.into(),
        }
    }

    /// Adopts both managers, rebasing their node buffers by `offset`, and
    /// frees the loader's leftover memory into the physical manager.
    ///
    /// # Safety
    /// Both records satisfy [`MemoryManager::from_handoff`] once relocated by
    /// `offset`, and the leftover range is no longer in use.
    #[must_use]
    pub unsafe fn adopt(info: &KernelMemoryInfo, offset: u64) -> Self {
        // SAFETY: forwarded from the caller.
        let mut memory = unsafe {
            Self {
                physical: MemoryManager::from_handoff(&info.physical.relocated(offset)),
                virtual_memory: MemoryManager::from_handoff(&info.virtual_memory.relocated(offset)),
            }
        };

        let leftover = Extent::from(info.leftover_free);
        if !leftover.is_empty() {
            info!(
                "reclaiming {:#x} bytes of loader memory at {:#x}",
                leftover.length, leftover.start
            );
            memory.physical.free(leftover.start, leftover.length);
        }
        memory
    }

    /// Frees the physical range of the parameter block. Call once nothing
    /// reads the block anymore.
    pub fn release_parameters(&mut self, parameters: ExtentInfo) {
        let parameters = Extent::from(parameters);
        if parameters.is_empty() {
            return;
        }
        info!(
            "releasing parameter block: {:#x} bytes at {:#x}",
            parameters.length, parameters.start
        );
        self.physical.free(parameters.start, parameters.length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaked(slots: usize) -> &'static mut [Node] {
        Box::leak(vec![Node::default(); slots].into_boxed_slice())
    }

    #[test]
    fn record_round_trip() {
        let mut m = MemoryManager::with_extents(
            MemoryKind::Physical,
            leaked(16),
            [Extent::new(0x1000, 0x10_0000), Extent::new(0x20_0000, 0x8000)],
        );
        let a = m.allocate(0x3000, 0x1000).unwrap();
        m.allocate(0x10, 0x10).unwrap();
        m.free(a, 0x3000);
        let before: Vec<_> = m.extents().collect();
        let carved = m.tree().nodes().carved();

        let info = m.into_handoff();
        assert_eq!(info.kind, MemoryKind::Physical);
        assert_eq!(info.nodes_capacity, 16);
        assert_eq!(info.nodes_carved as usize, carved);

        let adopted = unsafe { MemoryManager::from_handoff(&info) };
        assert_eq!(adopted.extents().collect::<Vec<_>>(), before);
        assert_eq!(adopted.tree().len(), before.len());
        adopted.verify().unwrap();
    }

    #[test]
    fn empty_manager_round_trip() {
        let m = MemoryManager::new(MemoryKind::Virtual, leaked(0));
        let info = m.into_handoff();
        assert_eq!((info.root, info.free_head, info.nodes_capacity), (0, 0, 0));

        let adopted = unsafe { MemoryManager::from_handoff(&info) };
        assert_eq!(adopted.kind(), MemoryKind::Virtual);
        assert_eq!(adopted.available_summary().node_count, 0);
    }

    #[test]
    fn adopt_reclaims_leftovers() {
        let memory = KernelMemory {
            physical: MemoryManager::with_extents(MemoryKind::Physical, leaked(8), [Extent::new(0x10_0000, 0x10_0000)]),
            virtual_memory: MemoryManager::for_virtual_range(leaked(8)),
        };
        let info = memory.into_handoff(Extent::new(0x4000, 0x2000), Extent::new(0x8000, 0x1000));

        let mut memory = unsafe { KernelMemory::adopt(&info, 0) };
        assert_eq!(
            memory.physical.available_summary().total_free_bytes,
            0x10_0000 + 0x2000
        );

        memory.release_parameters(info.parameters);
        assert_eq!(
            memory.physical.extents().collect::<Vec<_>>(),
            [Extent::new(0x4000, 0x2000), Extent::new(0x8000, 0x1000), Extent::new(0x10_0000, 0x10_0000)]
        );
        memory.virtual_memory.verify().unwrap();
    }
}
