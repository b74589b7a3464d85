//! # Handoff Contract
//!
//! The fixed ABI boundary between bootstrap and kernel, and the values the
//! multiboot2 bootloader delivers on entry.

/// Magic value a multiboot2-compliant bootloader leaves in `eax` on entry.
pub const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36D7_6289;

/// Kernel entry function pointer.
///
/// # ABI
/// `sysv64`: exactly one pointer-sized argument (the bootloader info
/// structure) in the first integer-argument register. The kernel never
/// returns; if it does anyway, the caller halts.
pub type KernelEntryFn = unsafe extern "sysv64" fn(*mut u8);

/// Name of the kernel entry symbol the bootstrap links against.
pub const KERNEL_ENTRY_SYMBOL: &str = "rust_init";
