use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use boot_info::PhysAddr;

/// CR3 — paging-root register (PCID disabled).
///
/// Holds the physical base address of the top-level page table and the
/// cache-control flags for walks of that table. Assumes 4 KiB alignment and
/// CR4.PCIDE = 0.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Cr3 {
    /// Bits 0–2 — Reserved (must be 0).
    #[bits(3)]
    pub reserved0: u8,

    /// Bit 3 — PWT: write-through caching for top-level table walks.
    pub pwt: bool,

    /// Bit 4 — PCD: cache disable for top-level table walks.
    pub pcd: bool,

    /// Bits 5–11 — Reserved (must be 0 when written).
    #[bits(7)]
    pub reserved1: u8,

    /// Bits 12–51 — physical base of the top-level table, shifted right by 12.
    #[bits(40)]
    table_base_4k: u64,

    /// Bits 52–63 — Reserved.
    #[bits(12)]
    pub reserved2: u16,
}

impl Cr3 {
    /// Create a `Cr3` value from the top-level table's physical base address.
    ///
    /// `table_phys` must be 4 KiB-aligned.
    #[must_use]
    pub fn from_table_phys(table_phys: PhysAddr, pwt: bool, pcd: bool) -> Self {
        debug_assert!(
            table_phys.is_aligned(4096),
            "paging root must be 4K-aligned"
        );
        Self::new()
            .with_pwt(pwt)
            .with_pcd(pcd)
            .with_table_base_4k(table_phys.as_u64() >> 12)
    }

    /// Full physical address of the top-level table.
    #[must_use]
    pub const fn table_phys(self) -> PhysAddr {
        PhysAddr::new(self.table_base_4k() << 12)
    }
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_table_base() {
        let cr3 = Cr3::from_table_phys(PhysAddr::new(0x9000), false, false);
        assert_eq!(cr3.into_bits(), 0x9000);
        assert_eq!(cr3.table_phys().as_u64(), 0x9000);
    }

    #[test]
    fn flags_do_not_clobber_base() {
        let cr3 = Cr3::from_table_phys(PhysAddr::new(0x7000), true, true);
        assert_eq!(cr3.table_phys().as_u64(), 0x7000);
        assert!(cr3.pwt());
        assert!(cr3.pcd());
    }
}
