//! # Kernel Boot Information
//!
//! Plain-data records the UEFI loader fills in before it jumps to the kernel.
//! Everything in here crosses the loader→kernel boundary, so all types are
//! `#[repr(C)]`, use fixed-size integers and carry no Rust-only payloads.

/// Information the kernel needs right after `ExitBootServices`.
///
/// The loader places this block at
/// [`KERNEL_PARAMETERS_BASE`](crate::memory::KERNEL_PARAMETERS_BASE).
#[repr(C)]
#[derive(Clone, Debug)]
pub struct KernelBootInfo {
    /// Memory map information.
    pub mmap: MemoryMapInfo,

    /// The memory managers built by the loader.
    pub memory: KernelMemoryInfo,
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct MemoryMapInfo {
    /// Pointer to the raw UEFI memory map buffer (array of `EFI_MEMORY_DESCRIPTOR` bytes).
    /// Pass 0 if you’re not handing the map to the kernel yet.
    pub mmap_ptr: u64,

    /// Length of the memory map buffer in **bytes**.
    pub mmap_len: u64,

    /// Size of a single memory descriptor in bytes (`EFI_MEMORY_DESCRIPTOR_VERSION` dependent).
    pub mmap_desc_size: u64,

    /// Descriptor version (from UEFI). Kernel can check it matches expectations.
    pub mmap_desc_version: u32,
}

/// A byte range `[start, start + length)` as it crosses the ABI boundary.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtentInfo {
    /// First byte of the range.
    pub start: u64,
    /// Number of bytes in the range.
    pub length: u64,
}

impl ExtentInfo {
    /// The empty range.
    pub const EMPTY: Self = Self {
        start: 0,
        length: 0,
    };

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Which address space a memory manager governs.
///
/// The kind decides which fault the kernel raises once the manager runs dry.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemoryManagerKind {
    /// Physical memory (page frames).
    Physical = 0,
    /// Kernel virtual address space.
    Virtual = 1,
}

/// One memory manager, packed for the trip from the loader to the kernel.
///
/// The node buffer is handed over as-is: the kernel re-adopts the tree
/// without walking or validating it. Handles are the 1-based slot numbers
/// used by the allocator; `0` encodes "none".
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryManagerInfo {
    /// Address of the first node slot, as seen by whoever reads this record.
    pub nodes_ptr: u64,

    /// Number of node slots in the buffer.
    pub nodes_capacity: u32,

    /// Number of slots that have been handed out at least once.
    pub nodes_carved: u32,

    /// Handle of the first slot on the free list, or `0`.
    pub free_head: u32,

    /// Handle of the tree root, or `0` for an empty tree.
    pub root: u32,

    /// The address space the manager governs.
    pub kind: MemoryManagerKind,

    /// Explicit padding; keep zero.
    pub reserved: u32,
}

impl MemoryManagerInfo {
    /// Rebases the node buffer address by `offset` bytes.
    ///
    /// The loader hands over identity-mapped addresses; the kernel reads the
    /// buffer through the higher-half direct map, i.e. `relocated(HHDM_BASE)`.
    #[must_use]
    pub const fn relocated(self, offset: u64) -> Self {
        Self {
            nodes_ptr: self.nodes_ptr.wrapping_add(offset),
            ..self
        }
    }
}

/// Memory handed from the loader to the kernel.
#[repr(C)]
#[derive(Clone, Debug)]
pub struct KernelMemoryInfo {
    /// The physical memory manager.
    pub physical: MemoryManagerInfo,

    /// The kernel virtual address space manager.
    pub virtual_memory: MemoryManagerInfo,

    /// Loader scratch memory the kernel frees into the physical manager as
    /// soon as it has adopted the managers.
    pub leftover_free: ExtentInfo,

    /// Physical range occupied by this parameter block. Freeable once kernel
    /// initialisation no longer reads it.
    pub parameters: ExtentInfo,
}
