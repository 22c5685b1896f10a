//! # Memory Layout

/// End of userspace VA range after which Kernel space begins.
pub const USERSPACE_END: u64 = 0xffff_0000_0000_0000;

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Start of the kernel virtual window handed out by the virtual memory manager.
pub const VIRTUAL_ALLOCATION_START: u64 = 0xffff_c000_0000_0000;

/// End (exclusive) of the kernel virtual window handed out by the virtual memory manager.
pub const VIRTUAL_ALLOCATION_END: u64 = 0xffff_e000_0000_0000;

/// Fixed virtual address of the [`KernelBootInfo`](crate::boot::KernelBootInfo)
/// parameter block. The loader maps the block here before jumping to the kernel.
pub const KERNEL_PARAMETERS_BASE: u64 = 0xffff_ffff_7fe0_0000;

/// Where the kernel executes (VMA), matches your linker script.
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Where you place the bytes in *physical* memory (LMA) before paging.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Page granularity of the UEFI memory map (`EFI_PAGE_SIZE`).
pub const UEFI_PAGE_SIZE: u64 = 4096;

const _: () = {
    assert!(HHDM_BASE >= USERSPACE_END);
    assert!(VIRTUAL_ALLOCATION_START > HHDM_BASE);
    assert!(VIRTUAL_ALLOCATION_END > VIRTUAL_ALLOCATION_START);
    assert!(KERNEL_PARAMETERS_BASE >= VIRTUAL_ALLOCATION_END);
    assert!(KERNEL_BASE > KERNEL_PARAMETERS_BASE);
    assert!(KERNEL_PARAMETERS_BASE.is_multiple_of(UEFI_PAGE_SIZE));
    assert!(VIRTUAL_ALLOCATION_START.is_multiple_of(UEFI_PAGE_SIZE));
    assert!(UEFI_PAGE_SIZE.is_power_of_two());
};
