use bitfield_struct::bitfield;

/// Architectural RFLAGS model.
///
/// Bits fixed by the architecture are modeled with defaults so they cannot be
/// flipped by accident; the one bit the bootstrap actually probes is
/// [`id_cpuid`](Self::id_cpuid).
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Rflags {
    /// Carry Flag
    pub cf_carry: bool, // 0

    /// Always 1.
    #[bits(default = true)]
    _always1: bool, // 1

    /// Parity Flag
    pub pf_parity: bool, // 2

    /// Reserved (always 0)
    #[bits(default = false)]
    _rsvd3: bool, // 3

    /// Adjust Flag
    pub af_adjust: bool, // 4

    /// Reserved (always 0)
    #[bits(default = false)]
    _rsvd5: bool, // 5

    /// Zero Flag
    pub zf_zero: bool, // 6

    /// Sign Flag
    pub sf_sign: bool, // 7

    /// Trap Flag
    pub tf_trap: bool, // 8

    /// Interrupt Enable Flag
    pub if_interrupt_enable: bool, // 9

    /// Direction Flag
    pub df_direction: bool, // 10

    /// Overflow Flag
    pub of_overflow: bool, // 11

    /// I/O Privilege Level
    #[bits(2)]
    pub iopl: u8, // 12–13

    /// Nested Task
    pub nt_nested: bool, // 14

    /// Reserved
    #[bits(default = false)]
    _rsvd15: bool, // 15

    /// Resume Flag
    pub rf_resume: bool, // 16

    /// Virtual-8086 mode — must be 0 outside of it.
    #[bits(default = false)]
    _vm: bool, // 17

    /// Alignment Check
    pub ac_alignment_check: bool, // 18

    /// Virtual Interrupt Flag
    pub vif_virtual_interrupt: bool, // 19

    /// Virtual Interrupt Pending
    pub vip_virtual_interrupt_pending: bool, // 20

    /// ID Flag.
    ///
    /// Software that can toggle this bit has the CPUID instruction; software
    /// that observes it stuck has a pre-CPUID processor. This is the
    /// documented detection method and the one the feature verifier uses.
    pub id_cpuid: bool, // 21

    /// Reserved 22–63 (all zero)
    #[bits(42, default = 0)]
    _reserved_rest: u64,
}

/// Read RFLAGS.
#[cfg(feature = "asm")]
#[must_use]
pub fn read() -> Rflags {
    let bits: u64;
    unsafe {
        core::arch::asm!("pushfq", "pop {}", out(reg) bits, options(nomem, preserves_flags));
    }
    Rflags::from_bits(bits)
}

/// Write RFLAGS.
///
/// # Safety
/// Replaces the full flags register, including IF/IOPL. Callers must restore
/// a value derived from a recent [`read`].
#[cfg(feature = "asm")]
pub unsafe fn write(flags: Rflags) {
    unsafe {
        core::arch::asm!("push {}", "popfq", in(reg) flags.into_bits(), options(nomem));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_bit_position() {
        assert_eq!(
            Rflags::new().with_id_cpuid(true).into_bits() & (1 << 21),
            1 << 21
        );
    }
}
