use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// Architectural model of CR0 in 64-bit mode.
///
/// Only the architecturally defined control bits are exposed; reserved bits
/// (including the entire upper half) are forced to 0.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Cr0 {
    /// Bit 0 — Protection Enable (PE).
    ///
    /// - 0: Real mode.
    /// - 1: Protected mode (prerequisite for paging / long mode).
    pub pe_protection_enable: bool,

    /// Bit 1 — Monitor Coprocessor (MP).
    pub mp_monitor_coprocessor: bool,

    /// Bit 2 — Emulation (EM). 1 means no x87 present.
    pub em_emulation: bool,

    /// Bit 3 — Task Switched (TS).
    pub ts_task_switched: bool,

    /// Bit 4 — Extension Type (ET). Effectively reserved-as-1 on modern CPUs.
    pub et_extension_type: bool,

    /// Bit 5 — Numeric Error (NE).
    pub ne_numeric_error: bool,

    /// Bits 6–15 — Reserved (must be 0).
    #[bits(10, default = 0)]
    _reserved_6_15: u16,

    /// Bit 16 — Write Protect (WP).
    pub wp_write_protect: bool,

    /// Bit 17 — Reserved (must be 0).
    #[bits(default = 0)]
    _reserved_17: bool,

    /// Bit 18 — Alignment Mask (AM).
    pub am_alignment_mask: bool,

    /// Bits 19–28 — Reserved (must be 0).
    #[bits(10, default = 0)]
    _reserved_19_28: u16,

    /// Bit 29 — Not-Write-Through (NW).
    pub nw_not_write_through: bool,

    /// Bit 30 — Cache Disable (CD).
    pub cd_cache_disable: bool,

    /// Bit 31 — Paging (PG).
    ///
    /// Setting this with CR4.PAE and EFER.LME already set activates long mode
    /// on the next instruction fetch. Order matters; see the transition
    /// sequencer.
    pub pg_paging: bool,

    /// Bits 32–63 — Reserved (must be 0).
    #[bits(32, default = 0)]
    _reserved_32_63: u32,
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let mut cr0: u64;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_bit_position() {
        assert_eq!(Cr0::new().with_pg_paging(true).into_bits(), 1 << 31);
    }

    #[test]
    fn protection_bit_position() {
        assert_eq!(Cr0::new().with_pe_protection_enable(true).into_bits(), 1);
    }
}
