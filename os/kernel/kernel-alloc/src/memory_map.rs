//! # UEFI Memory Map Ingestion
//!
//! The loader hands the kernel a raw copy of the firmware memory map: a
//! buffer of `EFI_MEMORY_DESCRIPTOR` records with a firmware-chosen stride.
//! Parsing is left to the `uefi` crate's [`MemoryMapRef`]; this module adds
//! the allocator's view on top of it (which types are usable, page zero,
//! reserved ranges) and seeds a [`MemoryManager`] with the result.
//!
//! The buffer must be 8-byte aligned and the stride a multiple of 8, as the
//! firmware produces them. Descriptors are read in place, not copied.

use crate::extent::Extent;
use crate::manager::{AllocError, MemoryKind, MemoryManager};
use crate::node_store::Node;
use kernel_info::boot::MemoryMapInfo;
use kernel_info::memory::UEFI_PAGE_SIZE;
use log::{debug, info, warn};
use uefi::mem::memory_map::{
    MemoryDescriptor, MemoryMap as _, MemoryMapIter, MemoryMapKey, MemoryMapMeta, MemoryMapRef,
    MemoryType,
};

/// Bytes of an `EFI_MEMORY_DESCRIPTOR` as this crate understands it.
pub const DESCRIPTOR_SIZE: usize = size_of::<MemoryDescriptor>();

/// Whether the kernel may hand memory of this type out once boot services are gone.
#[must_use]
pub const fn is_usable(ty: MemoryType) -> bool {
    matches!(
        ty,
        MemoryType::LOADER_CODE
            | MemoryType::LOADER_DATA
            | MemoryType::BOOT_SERVICES_CODE
            | MemoryType::BOOT_SERVICES_DATA
            | MemoryType::CONVENTIONAL
            | MemoryType::PERSISTENT_MEMORY
    )
}

/// Allocator queries on a firmware [`MemoryDescriptor`].
pub trait DescriptorExtent {
    /// The physical range described, or `None` if it does not fit the address space.
    fn extent(&self) -> Option<Extent>;

    /// The part of this descriptor the kernel may hand out: usable type, with
    /// page zero cut away.
    fn usable_extent(&self) -> Option<Extent>;
}

impl DescriptorExtent for MemoryDescriptor {
    fn extent(&self) -> Option<Extent> {
        let length = self.page_count.checked_mul(UEFI_PAGE_SIZE)?;
        let extent = Extent::new(self.phys_start, length);
        extent.checked_end().map(|_| extent)
    }

    fn usable_extent(&self) -> Option<Extent> {
        if !is_usable(self.ty) {
            return None;
        }
        let extent = self.extent()?;
        let (_, above_page_zero) = extent.carve(&Extent::new(0, UEFI_PAGE_SIZE));
        (!above_page_zero.is_empty()).then_some(above_page_zero)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryMapError {
    #[error("descriptor stride of {0} bytes is smaller than a descriptor")]
    StrideTooSmall(usize),
    #[error("descriptor stride of {0} bytes is not a multiple of 8")]
    MisalignedStride(usize),
    #[error("memory map of {len} bytes is not a multiple of the {stride}-byte stride")]
    RaggedLength { len: usize, stride: usize },
    #[error("memory map buffer is not 8-byte aligned")]
    Misaligned,
    #[error("memory map metadata does not fit the address space")]
    InvalidMetadata,
}

impl From<uefi::mem::memory_map::MemoryMapError> for MemoryMapError {
    fn from(error: uefi::mem::memory_map::MemoryMapError) -> Self {
        match error {
            uefi::mem::memory_map::MemoryMapError::Misaligned => Self::Misaligned,
            uefi::mem::memory_map::MemoryMapError::InvalidSize => Self::InvalidMetadata,
        }
    }
}

/// Backing for empty maps; `&[]` alone would not be 8-byte aligned.
#[repr(align(8))]
struct AlignedEmpty([u8; 0]);

static ALIGNED_EMPTY: AlignedEmpty = AlignedEmpty([]);

/// A borrowed raw UEFI memory map.
#[derive(Debug)]
pub struct MemoryMap<'m> {
    map: MemoryMapRef<'m>,
}

impl<'m> MemoryMap<'m> {
    /// Wraps `bytes`, a sequence of current-version descriptors `stride` bytes apart.
    ///
    /// # Errors
    /// If the stride cannot hold a descriptor or is not a multiple of 8,
    /// `bytes` is not a whole number of strides, or `bytes` is misaligned.
    pub fn new(bytes: &'m [u8], stride: usize) -> Result<Self, MemoryMapError> {
        Self::with_version(bytes, stride, MemoryDescriptor::VERSION)
    }

    fn with_version(bytes: &'m [u8], stride: usize, desc_version: u32) -> Result<Self, MemoryMapError> {
        if stride < DESCRIPTOR_SIZE {
            return Err(MemoryMapError::StrideTooSmall(stride));
        }
        if !stride.is_multiple_of(align_of::<MemoryDescriptor>()) {
            return Err(MemoryMapError::MisalignedStride(stride));
        }
        if !bytes.len().is_multiple_of(stride) {
            return Err(MemoryMapError::RaggedLength {
                len: bytes.len(),
                stride,
            });
        }

        let bytes = if bytes.is_empty() { &ALIGNED_EMPTY.0[..] } else { bytes };
        let meta = MemoryMapMeta {
            map_size: bytes.len(),
            desc_size: stride,
            map_key: MemoryMapKey::default(),
            desc_version,
        };
        Ok(Self {
            map: MemoryMapRef::new(bytes, meta)?,
        })
    }

    /// Views the memory map described by the boot parameter block.
    ///
    /// # Errors
    /// See [`new`](Self::new).
    ///
    /// # Safety
    /// `info.mmap_ptr` must point to `info.mmap_len` readable bytes that stay
    /// valid and unmodified for `'m`.
    pub unsafe fn from_info(info: &MemoryMapInfo) -> Result<Self, MemoryMapError> {
        let (Ok(len), Ok(stride)) = (
            usize::try_from(info.mmap_len),
            usize::try_from(info.mmap_desc_size),
        ) else {
            return Err(MemoryMapError::InvalidMetadata);
        };
        if len == 0 {
            return Self::with_version(&[], stride, info.mmap_desc_version);
        }

        // SAFETY: the caller guarantees the buffer is valid for `'m`.
        let bytes = unsafe { core::slice::from_raw_parts(info.mmap_ptr as *const u8, len) };
        Self::with_version(bytes, stride, info.mmap_desc_version)
    }

    /// Number of descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.map.meta().desc_size
    }

    #[must_use]
    pub fn descriptors(&self) -> MemoryMapIter<'_> {
        self.map.entries()
    }

    /// Node slots to reserve for a manager seeded from this map.
    ///
    /// Each descriptor becomes at most one extent; the extra half covers the
    /// splits the manager performs afterwards.
    #[must_use]
    pub fn node_capacity_hint(&self) -> usize {
        self.len() * 3 / 2
    }

    /// Usable bytes in the map, before any reservations.
    #[must_use]
    pub fn usable_bytes(&self) -> u64 {
        self.descriptors()
            .filter_map(DescriptorExtent::usable_extent)
            .map(|e| e.length)
            .sum()
    }
}

impl<'a> MemoryManager<'a> {
    /// Seeds a manager from the usable parts of a UEFI memory map.
    ///
    /// `reserved` lists ranges that must stay allocated even though the map
    /// calls them usable: the loaded kernel image, the boot parameter block,
    /// the node buffers themselves.
    ///
    /// # Errors
    /// Exhaustion for `kind` if nothing usable is left.
    ///
    /// # Panics
    /// If the node buffer runs out while seeding.
    pub fn from_memory_map(
        kind: MemoryKind,
        nodes: &'a mut [Node],
        map: &MemoryMap<'_>,
        reserved: &[Extent],
    ) -> Result<Self, AllocError> {
        let mut manager = Self::new(kind, nodes);
        for descriptor in map.descriptors() {
            let Some(extent) = descriptor.usable_extent() else {
                debug!(
                    "skipping {:?} at {:#x} ({} pages)",
                    descriptor.ty, descriptor.phys_start, descriptor.page_count
                );
                continue;
            };
            debug!(
                "usable {:?} at {:#x} ({} pages)",
                descriptor.ty, extent.start, descriptor.page_count
            );
            manager.add_unreserved(extent, reserved);
        }

        let summary = manager.available_summary();
        if summary.total_free_bytes == 0 {
            warn!("{kind:?}: memory map holds no usable memory");
            return Err(AllocError::exhausted(kind, 0));
        }

        info!(
            "{kind:?}: {:#x} bytes free in {} extents from {} descriptors",
            summary.total_free_bytes,
            summary.node_count,
            map.len()
        );
        Ok(manager)
    }

    /// Frees `extent` minus everything in `reserved`.
    fn add_unreserved(&mut self, extent: Extent, reserved: &[Extent]) {
        if extent.is_empty() {
            return;
        }

        if let Some(hole) = reserved.iter().find(|r| r.overlaps(&extent)) {
            let (below, above) = extent.carve(hole);
            self.add_unreserved(below, reserved);
            self.add_unreserved(above, reserved);
            return;
        }

        if self.overlaps_free(&extent) {
            warn!(
                "{:?}: descriptor range {extent:x?} overlaps an earlier one, skipped",
                self.kind()
            );
            return;
        }
        self.free(extent.start, extent.length);
    }
}
