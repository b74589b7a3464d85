use crate::{ENTRY_COUNT, PAGE_SIZE_2M};
use bitfield_struct::bitfield;
use boot_info::{PhysAddr, VirtAddr};
use core::ops::{Index, IndexMut};

/// A 64-bit entry of any paging level.
///
/// The same layout serves directory levels (where `page_size` is clear and
/// the frame points at the next table) and the 2 MiB leaf level (where
/// `page_size` is set and the frame is the mapped frame itself).
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageTableEntry {
    /// Bit 0 — P: entry is present.
    pub present: bool,

    /// Bit 1 — R/W: writable.
    pub writable: bool,

    /// Bit 2 — U/S: accessible from ring 3.
    pub user_accessible: bool,

    /// Bit 3 — PWT: write-through caching.
    pub write_through: bool,

    /// Bit 4 — PCD: cache disabled.
    pub cache_disabled: bool,

    /// Bit 5 — A: set by the CPU on access.
    pub accessed: bool,

    /// Bit 6 — D: set by the CPU on write (leaf entries only).
    pub dirty: bool,

    /// Bit 7 — PS: this entry maps a huge page instead of a further table.
    pub page_size: bool,

    /// Bit 8 — G: translation survives CR3 reloads.
    pub global: bool,

    /// Bits 9–11 — free for software use.
    #[bits(3)]
    pub available_lo: u8,

    /// Bits 12–51 — frame address, shifted right by 12.
    #[bits(40)]
    frame_4k: u64,

    /// Bits 52–62 — free for software use.
    #[bits(11)]
    pub available_hi: u16,

    /// Bit 63 — NX: no-execute (requires EFER.NXE).
    pub no_execute: bool,
}

impl PageTableEntry {
    /// Entry pointing at the next-level table.
    ///
    /// `table` must be 4 KiB-aligned; low bits would otherwise bleed into the
    /// flag field.
    #[must_use]
    pub const fn table(table: PhysAddr) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_frame_4k(table.as_u64() >> 12)
    }

    /// Leaf entry mapping a 2 MiB frame.
    ///
    /// `frame` must be 2 MiB-aligned.
    #[must_use]
    pub const fn huge_2m(frame: PhysAddr) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_page_size(true)
            .with_frame_4k(frame.as_u64() >> 12)
    }

    /// Physical address this entry points at (table or frame).
    #[must_use]
    pub const fn frame(self) -> PhysAddr {
        PhysAddr::new(self.frame_4k() << 12)
    }
}

/// One 4 KiB page table: 512 entries, any level.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRY_COUNT],
}

impl PageTable {
    /// A table with every entry non-present.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entries: [PageTableEntry::new(); ENTRY_COUNT],
        }
    }

    /// Physical address of this table, valid while physical memory is
    /// identity-mapped (which is the regime the boot tables exist in).
    #[must_use]
    pub fn phys_addr(&self) -> PhysAddr {
        PhysAddr::from_ptr(core::ptr::from_ref(self))
    }
}

impl Index<usize> for PageTable {
    type Output = PageTableEntry;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl IndexMut<usize> for PageTable {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.entries[index]
    }
}

/// Build the leaf table: 512 huge pages identity-covering the first gigabyte.
///
/// Entry `n` maps virtual `n * 2 MiB` to the identical physical frame,
/// present, writable and with the page-size bit set. Entirely computable at
/// compile time, so the table ships as initialized data.
#[must_use]
pub const fn identity_2m_table() -> PageTable {
    let mut table = PageTable::empty();
    let mut n = 0;
    while n < ENTRY_COUNT {
        table.entries[n] = PageTableEntry::huge_2m(PhysAddr::new(n as u64 * PAGE_SIZE_2M));
        n += 1;
    }
    table
}

const _: () = {
    // The const-built leaf table must actually be the identity map.
    let table = identity_2m_table();
    assert!(table.entries[0].into_bits() == 0x83);
    assert!(table.entries[511].frame().as_u64() == 511 * PAGE_SIZE_2M);
};

/// Wire the three tables together.
///
/// Writes exactly three entries:
/// * `p3[0]` points at the leaf table,
/// * `p4[0]` points at the mid-level table (identity view),
/// * `p4[kernel_base.p4_index()]` points at the *same* mid-level table,
///   giving the higher-half alias of the same gigabyte.
///
/// Both top-level entries are bit-identical; the alias is the whole point.
pub fn link_boot_tables(
    p4: &mut PageTable,
    p3: &mut PageTable,
    p2_phys: PhysAddr,
    p3_phys: PhysAddr,
    kernel_base: VirtAddr,
) {
    debug_assert!(p2_phys.is_aligned(4096));
    debug_assert!(p3_phys.is_aligned(4096));
    // The shared-P3 trick only covers the first gigabyte of the alias.
    debug_assert!(kernel_base.p3_index() == 0);

    p3[0] = PageTableEntry::table(p2_phys);
    let to_p3 = PageTableEntry::table(p3_phys);
    p4[0] = to_p3;
    p4[kernel_base.p4_index()] = to_p3;
}

#[cfg(test)]
mod tests {
    use super::*;
    use boot_info::memory::{KERNEL_PHYS_LOAD, KERNEL_VIRTUAL_BASE};

    #[test]
    fn entry_roundtrip_is_lossless() {
        let entry = PageTableEntry::huge_2m(PhysAddr::new(0x4000_0000))
            .with_global(true)
            .with_no_execute(true);
        let decoded = PageTableEntry::from_bits(entry.into_bits());
        assert_eq!(decoded, entry);
        assert_eq!(decoded.frame().as_u64(), 0x4000_0000);
        assert!(decoded.page_size());
        assert!(decoded.no_execute());
    }

    #[test]
    fn table_entry_flags() {
        let entry = PageTableEntry::table(PhysAddr::new(0x3000));
        assert!(entry.present());
        assert!(entry.writable());
        assert!(!entry.page_size());
        assert_eq!(entry.into_bits(), 0x3000 | 0b11);
    }

    #[test]
    fn identity_table_covers_first_gigabyte() {
        let table = identity_2m_table();
        for n in 0..ENTRY_COUNT {
            let entry = table[n];
            assert!(entry.present(), "entry {n} present");
            assert!(entry.writable(), "entry {n} writable");
            assert!(entry.page_size(), "entry {n} huge");
            assert_eq!(entry.frame().as_u64(), n as u64 * PAGE_SIZE_2M);
        }
    }

    #[test]
    fn linked_top_level_entries_are_identical() {
        let mut p4 = PageTable::empty();
        let mut p3 = PageTable::empty();
        link_boot_tables(
            &mut p4,
            &mut p3,
            PhysAddr::new(0xA000),
            PhysAddr::new(0xB000),
            VirtAddr::new(KERNEL_VIRTUAL_BASE),
        );

        assert_eq!(p4[0], p4[448]);
        assert_eq!(p4[0].frame().as_u64(), 0xB000);
        assert_eq!(p3[0].frame().as_u64(), 0xA000);
        // Nothing else may be touched.
        for n in 1..ENTRY_COUNT {
            if n != 448 {
                assert!(!p4[n].present(), "stray P4 entry {n}");
            }
            assert!(!p3[n].present(), "stray P3 entry {n}");
        }
    }

    /// Walk the finished structure by hand: the higher-half kernel address
    /// must resolve to the physical load address.
    #[test]
    fn higher_half_alias_resolves_to_load_address() {
        let p2 = identity_2m_table();
        let mut p4 = PageTable::empty();
        let mut p3 = PageTable::empty();
        link_boot_tables(
            &mut p4,
            &mut p3,
            PhysAddr::new(0xA000),
            PhysAddr::new(0xB000),
            VirtAddr::new(KERNEL_VIRTUAL_BASE),
        );

        let va = VirtAddr::new(KERNEL_VIRTUAL_BASE);
        assert!(p4[va.p4_index()].present());
        assert!(p3[va.p3_index()].present());
        let leaf = p2[va.p2_index()];
        assert!(leaf.page_size());
        let phys = leaf.frame().as_u64() + (va.as_u64() & (PAGE_SIZE_2M - 1));
        assert_eq!(phys, KERNEL_PHYS_LOAD);
    }
}
