//! # Kernel Configuration and Boot Interface
//!
//! This crate defines the memory layout constants and the boot interface
//! contracts shared by the UEFI loader and the kernel. Both sides compile
//! against the same definitions, so the parameter block the loader writes is
//! exactly the one the kernel reads.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! Defines the bootloader-to-kernel handoff interface:
//! * **Kernel Entry Point**: Function signature and calling convention
//! * **Memory Map**: Location and stride of the raw UEFI memory map copy
//! * **Memory Managers**: The physical and virtual free-extent managers the
//!   loader built, packed as plain data so the kernel can adopt them as-is
//!
//! ### Memory Layout ([`memory`])
//! Establishes the kernel's virtual memory architecture:
//! * **Address Space Layout**: User/kernel space boundaries and reserved regions
//! * **Dynamic Window**: The range handed out by the virtual memory manager
//! * **Parameter Block**: The fixed address of [`KernelBootInfo`](boot::KernelBootInfo)
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Virtual Address Space Layout (64-bit):
//!
//! 0x0000_0000_0000_0000    ┌─────────────────────────────────┐
//!                          │         User Space              │
//! USERSPACE_END            ├─────────────────────────────────┤ 0xffff_0000_0000_0000
//!                          │        Guard Region             │
//! HHDM_BASE                ├─────────────────────────────────┤ 0xffff_8880_0000_0000
//!                          │   Higher Half Direct Mapping    │
//! VIRTUAL_ALLOCATION_START ├─────────────────────────────────┤ 0xffff_c000_0000_0000
//!                          │  Virtual memory manager window  │
//! VIRTUAL_ALLOCATION_END   ├─────────────────────────────────┤ 0xffff_e000_0000_0000
//!                          │        Guard Region             │
//! KERNEL_PARAMETERS_BASE   ├─────────────────────────────────┤ 0xffff_ffff_7fe0_0000
//!                          │     Kernel parameter block      │
//! KERNEL_BASE              ├─────────────────────────────────┤ 0xffff_ffff_8000_0000
//!                          │       Kernel Text & Data        │
//! 0xFFFF_FFFF_FFFF_FFFF    └─────────────────────────────────┘
//! ```
//!
//! ## Boot Protocol
//!
//! The loader jumps to the kernel entry point with a single pointer to a
//! [`KernelBootInfo`](boot::KernelBootInfo), using the Windows x64 calling
//! convention of the UEFI application it is built as. The kernel never returns.
//!
//! ## ABI Compatibility
//!
//! * **`#[repr(C)]`**: Predictable memory layout on both sides of the jump
//! * **Fixed-Size Types**: Explicit integer sizes, handles as plain `u32`
//! * **No Payload Enums**: Only fieldless `#[repr(u32)]` enums cross the boundary
//!
//! The crate is `#![deny(unsafe_code)]`; turning the raw records back into live
//! structures is the job of the consumers.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
