use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// CR4 — Control Register 4.
///
/// Only the bits the boot sequence cares about are named individually; the
/// long tail of virtualization/protection toggles stays reserved here.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Cr4 {
    /// Bit 0 — VME: Virtual-8086 Mode Extensions.
    pub vme: bool,

    /// Bit 1 — PVI: Protected-Mode Virtual Interrupts.
    pub pvi: bool,

    /// Bit 2 — TSD: Time Stamp Disable.
    pub tsd: bool,

    /// Bit 3 — DE: Debugging Extensions.
    pub de: bool,

    /// Bit 4 — PSE: Page Size Extensions (32-bit paging only).
    pub pse: bool,

    /// Bit 5 — PAE: Physical Address Extension.
    ///
    /// Mandatory for long mode; must be set before paging is enabled.
    pub pae: bool,

    /// Bit 6 — MCE: Machine-Check Enable.
    pub mce: bool,

    /// Bit 7 — PGE: Page Global Enable.
    pub pge: bool,

    /// Bit 8 — PCE: Performance-Monitoring Counter Enable.
    pub pce: bool,

    /// Bit 9 — OSFXSR: OS supports FXSAVE/FXRSTOR.
    pub osfxsr: bool,

    /// Bit 10 — OSXMMEXCPT: OS supports unmasked SIMD FP exceptions.
    pub osxmmexcpt: bool,

    /// Bit 11 — UMIP: User-Mode Instruction Prevention.
    pub umip: bool,

    /// Bit 12 — LA57: 5-level paging. Left clear; the boot tables are 4-level.
    pub la57: bool,

    /// Bits 13–63 — virtualization/protection toggles and reserved bits,
    /// untouched during boot.
    #[bits(51, access = RO)]
    pub reserved: u64,
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr4 {
    unsafe fn load_unsafe() -> Self {
        let mut cr4: u64;
        unsafe {
            core::arch::asm!("mov {}, cr4", out(reg) cr4, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr4)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr4 {
    unsafe fn store_unsafe(self) {
        let cr4 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr4, {}", in(reg) cr4, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pae_bit_position() {
        assert_eq!(Cr4::new().with_pae(true).into_bits(), 1 << 5);
    }
}
