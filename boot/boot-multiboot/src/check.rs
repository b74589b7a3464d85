//! Environment verification: is this machine capable of long mode, and did
//! a multiboot2-compliant loader bring us here?

use boot_registers::cpuid::{EXTENDED_FEATURES_LEAF, ExtendedFeaturesEdx};

/// A failed pre-flight check.
///
/// The numeric code is what lands on the VGA error display; the order of the
/// variants is the order the checks run in, and the first failure wins.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum BootCheck {
    #[error("not started by a multiboot2-compliant bootloader")]
    BadBootloaderMagic,

    #[error("CPUID instruction not available")]
    NoCpuid,

    #[error("processor has no long mode")]
    NoLongMode,
}

impl BootCheck {
    /// Single-digit code shown on the error display.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::BadBootloaderMagic => 0,
            Self::NoCpuid => 1,
            Self::NoLongMode => 2,
        }
    }
}

/// What the verifier needs to know about the processor. Hardware answers via
/// CPUID; tests answer from fixtures.
pub trait CpuProbe {
    /// Whether the CPUID instruction exists at all.
    fn cpuid_available(&self) -> bool;

    /// `eax` of CPUID leaf `0x8000_0000`: the highest extended leaf.
    fn max_extended_leaf(&self) -> u32;

    /// `edx` of CPUID leaf `0x8000_0001`. Only called when that leaf exists.
    fn extended_features_edx(&self) -> ExtendedFeaturesEdx;
}

/// Run the three checks in order, short-circuiting on the first failure.
///
/// A processor too old to report leaf `0x8000_0001` cannot have long mode,
/// so that case folds into [`BootCheck::NoLongMode`].
///
/// # Errors
/// The first failed check.
pub fn verify_environment(probe: &impl CpuProbe, magic: u32) -> Result<(), BootCheck> {
    if magic != boot_info::boot::MULTIBOOT2_BOOTLOADER_MAGIC {
        return Err(BootCheck::BadBootloaderMagic);
    }
    if !probe.cpuid_available() {
        return Err(BootCheck::NoCpuid);
    }
    if probe.max_extended_leaf() < EXTENDED_FEATURES_LEAF {
        return Err(BootCheck::NoLongMode);
    }
    if !probe.extended_features_edx().long_mode() {
        return Err(BootCheck::NoLongMode);
    }
    Ok(())
}

/// Probe backed by the real instructions.
///
/// The bootstrap processor answers these questions in the 32-bit assembly
/// stub before any Rust can run; this impl is for 64-bit callers, such as
/// re-verifying an application processor after it is woken through the same
/// low-memory bootstrap.
#[cfg(target_arch = "x86_64")]
pub struct HardwareProbe;

#[cfg(target_arch = "x86_64")]
impl CpuProbe for HardwareProbe {
    fn cpuid_available(&self) -> bool {
        // The documented detection: CPUID exists iff RFLAGS.ID can be
        // toggled. Restore the original flags afterwards.
        let original = boot_registers::rflags::read();
        let flipped = original.with_id_cpuid(!original.id_cpuid());
        unsafe { boot_registers::rflags::write(flipped) };
        let observed = boot_registers::rflags::read();
        unsafe { boot_registers::rflags::write(original) };
        observed.id_cpuid() == flipped.id_cpuid()
    }

    fn max_extended_leaf(&self) -> u32 {
        unsafe { boot_registers::cpuid::cpuid(boot_registers::cpuid::MAX_EXTENDED_LEAF, 0) }.eax
    }

    fn extended_features_edx(&self) -> ExtendedFeaturesEdx {
        ExtendedFeaturesEdx::from_bits(
            unsafe { boot_registers::cpuid::cpuid(EXTENDED_FEATURES_LEAF, 0) }.edx,
        )
    }
}
