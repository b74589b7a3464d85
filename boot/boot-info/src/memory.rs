//! # Memory Layout
//!
//! The fixed physical/virtual addresses of the boot sequence. These are
//! bit-exact linker requirements, not tunables: the ISO/ESP packaging and the
//! kernel linker script consume the same values.

/// Physical address the bootstrap blob is linked at.
///
/// Must stay below the 1 MiB mark so the code remains reachable with 16-bit
/// addressing: application processors woken later via SIPI start in real mode
/// and re-run this same bootstrap.
pub const BOOTSTRAP_BASE: u64 = 0x7C00;

/// Everything in the bootstrap image (code, GDT, page tables, stack) must fit
/// under this mark for the real-mode reachability described at
/// [`BOOTSTRAP_BASE`].
pub const BOOTSTRAP_CEILING: u64 = 0x1_0000; // 64 KiB

/// Where the kernel bytes are placed in *physical* memory (LMA).
///
/// # Kernel Build
/// Sourced by `build.rs` scripts to configure the linker.
pub const KERNEL_PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Where the kernel executes (VMA): the higher-half base.
///
/// The first physical gigabyte is aliased here by the boot page tables, so
/// `virt = phys + (KERNEL_VIRTUAL_BASE - KERNEL_PHYS_LOAD)` for everything the
/// bootstrap maps.
///
/// # Limitation
/// The boot page tables reuse one mid-level table for both the identity map
/// and this alias. That only works while the base is within 1 GiB of a
/// 512 GiB boundary; the `const` block below enforces it for the configured
/// value, the page-table builder itself does not re-check it.
pub const KERNEL_VIRTUAL_BASE: u64 = 0xFFFF_E000_0010_0000;

/// Top-level page-table index of [`KERNEL_VIRTUAL_BASE`] (bits 47:39).
#[allow(clippy::cast_possible_truncation)]
pub const KERNEL_P4_INDEX: usize = ((KERNEL_VIRTUAL_BASE >> 39) & 0x1ff) as usize;

/// Span covered by the boot page tables: one gigabyte of 2 MiB pages.
pub const BOOT_MAPPED_BYTES: u64 = 512 * 0x20_0000;

const _: () = {
    assert!(BOOTSTRAP_BASE < BOOTSTRAP_CEILING);
    assert!(KERNEL_PHYS_LOAD & 0xfff == 0, "kernel LMA must be 4 KiB aligned");
    assert!(
        KERNEL_VIRTUAL_BASE & ((1u64 << 39) - 1) < (1u64 << 30),
        "higher-half base must lie within 1 GiB of a 512 GiB boundary"
    );
    assert!(KERNEL_P4_INDEX == 448);
    assert!(KERNEL_PHYS_LOAD < BOOT_MAPPED_BYTES);
};
