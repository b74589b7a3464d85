use bitfield_struct::bitfield;

/// One 8-byte code/data segment descriptor.
///
/// Base and limit fields are modeled for completeness but stay zero in the
/// boot table; long mode treats CS/DS/ES/SS as flat regardless.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct SegmentDescriptor {
    /// Bits 0–15 — limit 15:0.
    pub limit_low: u16,

    /// Bits 16–39 — base 23:0.
    #[bits(24)]
    pub base_low: u32,

    /// Bit 40 — A: set by the CPU on first use.
    pub accessed: bool,

    /// Bit 41 — R/W: code readable / data writable.
    pub read_write: bool,

    /// Bit 42 — C/E: code conforming / data expand-down.
    pub conforming_expand: bool,

    /// Bit 43 — code segment when set, data when clear.
    pub executable: bool,

    /// Bit 44 — S: code/data descriptor rather than a system descriptor.
    pub code_or_data: bool,

    /// Bits 45–46 — DPL.
    #[bits(2)]
    pub privilege_level: u8,

    /// Bit 47 — P: present.
    pub present: bool,

    /// Bits 48–51 — limit 19:16.
    #[bits(4)]
    pub limit_high: u8,

    /// Bit 52 — AVL: free for software use.
    pub available: bool,

    /// Bit 53 — L: 64-bit code segment.
    pub long_mode: bool,

    /// Bit 54 — D/B: default operand size; must be clear when L is set.
    pub default_size: bool,

    /// Bit 55 — G: limit counts 4 KiB units.
    pub granularity: bool,

    /// Bits 56–63 — base 31:24.
    pub base_high: u8,
}

impl SegmentDescriptor {
    /// The mandatory all-zero first slot.
    #[must_use]
    pub const fn null() -> Self {
        Self::new()
    }

    /// Ring-0 64-bit code segment: present, executable, readable, L set.
    #[must_use]
    pub const fn kernel_code() -> Self {
        Self::new()
            .with_read_write(true)
            .with_executable(true)
            .with_code_or_data(true)
            .with_present(true)
            .with_long_mode(true)
    }

    /// Ring-0 flat data segment: present, writable.
    #[must_use]
    pub const fn kernel_data() -> Self {
        Self::new()
            .with_read_write(true)
            .with_code_or_data(true)
            .with_present(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_descriptor_bits() {
        let code = SegmentDescriptor::kernel_code();
        assert_eq!(code.into_bits(), 0x0020_9A00_0000_0000);
        assert!(code.long_mode());
        assert!(!code.default_size());
    }

    #[test]
    fn data_descriptor_bits() {
        let data = SegmentDescriptor::kernel_data();
        assert_eq!(data.into_bits(), 0x0000_9200_0000_0000);
        assert!(!data.executable());
        assert!(data.read_write());
    }

    #[test]
    fn null_is_zero() {
        assert_eq!(SegmentDescriptor::null().into_bits(), 0);
    }
}
