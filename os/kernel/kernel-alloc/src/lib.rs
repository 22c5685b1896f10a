//! # Kernel Memory Managers
//!
//! This crate provides the allocator core shared by the kernel's physical
//! memory manager and its virtual address space manager. Both hand out
//! aligned byte ranges from a set of free extents and take them back, and
//! both run before (and underneath) any heap exists, so the crate never
//! allocates for its own bookkeeping.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Region Allocator (MemoryManager)       │
//! │    • allocate(bytes, align) / free(start, bytes)    │
//! │    • exhaustion reported per manager kind           │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Augmented Extent Tree                  │
//! │    • red-black tree keyed by start address          │
//! │    • coalescing insert, best-fit removal            │
//! │    • largest extent per subtree                     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Node Store                          │
//! │    • caller-provided slot buffer                    │
//! │    • free list threaded through released slots      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Extents ([`extent`])
//! Half-open byte ranges and the alignment helpers used to cut them.
//!
//! ### Node Store ([`node_store`])
//! 32-byte tree nodes in a fixed slice, addressed by non-zero 32-bit
//! handles. Children and color are packed into two link words.
//!
//! ### Extent Tree ([`tree`])
//! The address-ordered red-black tree of free extents. Every node knows the
//! largest extent below it, so a request for `n` bytes is answered in
//! `O(log n)` without scanning. Insertions merge with touching neighbours;
//! [`ExtentTree::verify`](tree::ExtentTree::verify) checks every invariant.
//!
//! ### Region Allocator ([`manager`])
//! [`MemoryManager`](manager::MemoryManager) splits aligned allocations out
//! of the tree and returns freed ranges to it. Running dry yields an
//! [`AllocError`](manager::AllocError) naming the fault vector the kernel
//! raises.
//!
//! ### Memory Map ([`memory_map`])
//! Views the raw UEFI memory map through the `uefi` crate and seeds a manager
//! with the usable, unreserved parts.
//!
//! ### Handoff ([`handoff`])
//! Packs managers into the loader→kernel parameter block and re-adopts them
//! on the kernel side.
//!
//! ## Usage Patterns
//!
//! ```rust
//! use kernel_alloc::extent::Extent;
//! use kernel_alloc::manager::{MemoryKind, MemoryManager};
//! use kernel_alloc::node_store::Node;
//!
//! let mut nodes = [Node::default(); 16];
//! let mut physical = MemoryManager::with_extents(
//!     MemoryKind::Physical,
//!     &mut nodes,
//!     [Extent::new(0x10_0000, 0x40_0000)],
//! );
//!
//! let frame = physical.allocate(0x1000, 0x1000).unwrap();
//! assert_eq!(frame % 0x1000, 0);
//! physical.free(frame, 0x1000);
//! assert_eq!(physical.available_summary().total_free_bytes, 0x40_0000);
//! ```
//!
//! ## Concurrency
//!
//! Managers are plain values without interior locking. The kernel runs them
//! on a single core; sharing one between cores means wrapping it in a lock.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod extent;
pub mod handoff;
pub mod manager;
pub mod memory_map;
pub mod node_store;
pub mod tree;
