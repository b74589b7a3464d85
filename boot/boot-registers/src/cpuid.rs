//! CPUID primitive and typed views of the extended leaves the boot sequence
//! consults.

use bitfield_struct::bitfield;

/// Leaf reporting the highest supported extended leaf in `eax`.
pub const MAX_EXTENDED_LEAF: u32 = 0x8000_0000;

/// Extended processor info leaf; feature flags in `edx`.
pub const EXTENDED_FEATURES_LEAF: u32 = 0x8000_0001;

#[derive(Debug, Copy, Clone)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Execute CPUID with the given leaf and subleaf.
///
/// # Safety
/// The CPUID instruction must be available (verified via the RFLAGS ID-bit
/// probe first); `rbx` is preserved manually because LLVM reserves it.
#[inline(always)]
#[allow(clippy::inline_always)]
#[cfg(feature = "asm")]
#[must_use]
pub unsafe fn cpuid(leaf: u32, subleaf: u32) -> CpuidResult {
    let (mut eax, ebx, mut ecx, edx): (u32, u32, u32, u32);
    eax = leaf;
    ecx = subleaf;
    unsafe {
        core::arch::asm!(
            "push rbx",
            "cpuid",
            "mov {ebx_out:e}, ebx",
            "pop rbx",
            ebx_out = lateout(reg) ebx,
            inlateout("eax") eax,
            inlateout("ecx") ecx,
            lateout("edx") edx,
            options(nomem, preserves_flags),
        );
    }
    CpuidResult { eax, ebx, ecx, edx }
}

/// `edx` of CPUID leaf `0x8000_0001`.
///
/// Only the bits relevant to bring-up are named.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct ExtendedFeaturesEdx {
    /// Bits 0–10 — mirrors of the base feature flags.
    #[bits(11)]
    pub base_mirror_lo: u16,

    /// Bit 11 — SYSCALL/SYSRET available in 64-bit mode.
    pub syscall: bool,

    /// Bits 12–19 — mirrors / reserved.
    #[bits(8)]
    pub reserved0: u8,

    /// Bit 20 — NX: no-execute page protection.
    pub nx: bool,

    /// Bits 21–25 — reserved / MMX extensions.
    #[bits(5)]
    pub reserved1: u8,

    /// Bit 26 — 1 GiB pages.
    pub pages_1g: bool,

    /// Bit 27 — RDTSCP.
    pub rdtscp: bool,

    /// Bit 28 — reserved.
    pub reserved2: bool,

    /// Bit 29 — LM: long mode available. The bit the capability check
    /// tests before the mode switch is attempted.
    pub long_mode: bool,

    /// Bits 30–31 — 3DNow!.
    #[bits(2)]
    pub reserved3: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_mode_is_bit_29() {
        assert_eq!(
            ExtendedFeaturesEdx::new().with_long_mode(true).into_bits(),
            1 << 29
        );
    }

    #[test]
    fn decode_typical_edx() {
        // NX + LM + SYSCALL, as reported by any 64-bit-capable part.
        let edx = ExtendedFeaturesEdx::from_bits((1 << 29) | (1 << 20) | (1 << 11));
        assert!(edx.long_mode());
        assert!(edx.nx());
        assert!(edx.syscall());
        assert!(!edx.pages_1g());
    }
}
