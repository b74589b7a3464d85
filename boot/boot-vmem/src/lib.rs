//! # Boot Page Tables
//!
//! Builds the minimal 4-level paging structure the long-mode switch needs:
//! one top-level table, one mid-level table and one leaf table of 2 MiB
//! pages, identity-mapping the first gigabyte of physical memory and aliasing
//! the same gigabyte at the higher-half kernel base.
//!
//! The leaf table is fully `const`-constructible; the two linking entries
//! depend on the link-time addresses of the tables and are written by
//! [`link_boot_tables`] once those addresses exist.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_table;

pub use page_table::{PageTable, PageTableEntry, identity_2m_table, link_boot_tables};

/// Number of entries in each table level.
pub const ENTRY_COUNT: usize = 512;

/// Size of a leaf-level huge page.
pub const PAGE_SIZE_2M: u64 = 0x20_0000;

/// Size of a regular page (and of every table).
pub const PAGE_SIZE_4K: u64 = 0x1000;

/// Round `value` down to a multiple of `align` (a power of two).
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    value & !(align - 1)
}

/// Round `value` up to a multiple of `align` (a power of two).
#[must_use]
pub const fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_down(0x1fff, PAGE_SIZE_4K), 0x1000);
        assert_eq!(align_up(0x1001, PAGE_SIZE_4K), 0x2000);
        assert_eq!(align_up(0x2000, PAGE_SIZE_4K), 0x2000);
        assert_eq!(align_down(0x3f_ffff, PAGE_SIZE_2M), 0x20_0000);
    }
}
