//! # Free Extents
//!
//! An [`Extent`] is a half-open byte range `[start, start + length)`. The
//! allocator never looks at the memory an extent describes; it only does
//! arithmetic on the bounds, so the same type serves physical memory and
//! virtual address space alike.

use kernel_info::boot::ExtentInfo;

/// A half-open byte range `[start, start + length)`.
///
/// The end of every extent must be representable as a `u64`; the allocator
/// rejects frees that would violate this before they reach the tree.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent {
    /// First byte of the range.
    pub start: u64,
    /// Number of bytes in the range.
    pub length: u64,
}

impl Extent {
    /// The empty extent at address zero.
    pub const EMPTY: Self = Self::new(0, 0);

    #[inline]
    #[must_use]
    pub const fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Builds the extent `[start, end)`, or `None` if `end < start`.
    #[inline]
    #[must_use]
    pub const fn from_bounds(start: u64, end: u64) -> Option<Self> {
        match end.checked_sub(start) {
            Some(length) => Some(Self::new(start, length)),
            None => None,
        }
    }

    /// One past the last byte of the range.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Like [`end`](Self::end), but `None` if the range wraps the address space.
    #[inline]
    #[must_use]
    pub const fn checked_end(&self) -> Option<u64> {
        self.start.checked_add(self.length)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, address: u64) -> bool {
        address >= self.start && address - self.start < self.length
    }

    /// Whether the two ranges share at least one byte. Empty ranges overlap nothing.
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end() && other.start < self.end()
    }

    /// Whether one range ends exactly where the other begins.
    #[inline]
    #[must_use]
    pub const fn is_adjacent_to(&self, other: &Self) -> bool {
        self.end() == other.start || other.end() == self.start
    }

    /// Removes `hole` from this range and returns what is left below and above it.
    ///
    /// Either part may be empty. A `hole` that does not overlap `self` leaves
    /// the whole range in the part on the side it lies on.
    #[must_use]
    pub const fn carve(&self, hole: &Self) -> (Self, Self) {
        if !self.overlaps(hole) {
            return if hole.start >= self.end() {
                (*self, Self::new(self.end(), 0))
            } else {
                (Self::new(self.start, 0), *self)
            };
        }

        let below_end = if hole.start > self.start {
            hole.start
        } else {
            self.start
        };
        let above_start = if hole.end() < self.end() {
            hole.end()
        } else {
            self.end()
        };

        (
            Self::new(self.start, below_end - self.start),
            Self::new(above_start, self.end() - above_start),
        )
    }
}

impl From<ExtentInfo> for Extent {
    fn from(value: ExtentInfo) -> Self {
        Self::new(value.start, value.length)
    }
}

impl From<Extent> for ExtentInfo {
    fn from(value: Extent) -> Self {
        Self {
            start: value.start,
            length: value.length,
        }
    }
}

/// Align `value` upwards to `align` (must be a power of two).
///
/// The caller guarantees `value + align - 1` does not overflow.
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}
