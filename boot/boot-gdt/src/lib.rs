//! # Boot GDT
//!
//! The three-entry descriptor table installed during the mode switch: a null
//! descriptor, a 64-bit code segment and a flat data segment. Long mode
//! ignores base and limit for these, so the descriptors carry flags only.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod descriptors;

pub use descriptors::SegmentDescriptor;

/// Selector of the 64-bit code segment (second GDT slot, RPL 0).
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

/// Selector of the flat data segment (third GDT slot, RPL 0).
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;

/// The boot descriptor table itself.
#[repr(C, align(8))]
pub struct Gdt {
    null: SegmentDescriptor,
    code: SegmentDescriptor,
    data: SegmentDescriptor,
}

impl Gdt {
    /// The table the mode switch installs: null, 64-bit code, flat data.
    #[must_use]
    pub const fn boot() -> Self {
        Self {
            null: SegmentDescriptor::null(),
            code: SegmentDescriptor::kernel_code(),
            data: SegmentDescriptor::kernel_data(),
        }
    }

    /// Pointer structure in the format `lgdt` consumes.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pointer(&self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (core::mem::size_of::<Self>() - 1) as u16,
            base: core::ptr::from_ref(self) as u64,
        }
    }
}

/// The 10-byte operand of `lgdt`: 16-bit limit followed by 64-bit base.
#[repr(C, packed)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub base: u64,
}

/// Install the table.
///
/// # Safety
/// `pointer` must describe a valid descriptor table that outlives its use;
/// segment registers still hold selectors into the *old* table afterwards
/// until [`reload_data_segments`] and [`reload_code_segment`] run.
#[cfg(feature = "asm")]
pub unsafe fn load(pointer: &DescriptorTablePointer) {
    unsafe {
        core::arch::asm!(
            "lgdt [{}]",
            in(reg) pointer,
            options(readonly, nostack, preserves_flags)
        );
    }
}

/// Point DS/ES/SS/FS/GS at the descriptor `data` indexes.
///
/// # Safety
/// `data` must index a valid data descriptor in the currently installed
/// table.
#[cfg(feature = "asm")]
pub unsafe fn reload_data_segments(data: u16) {
    unsafe {
        core::arch::asm!(
            "mov ds, {data:x}",
            "mov es, {data:x}",
            "mov ss, {data:x}",
            "mov fs, {data:x}",
            "mov gs, {data:x}",
            data = in(reg) data,
            options(nomem, preserves_flags)
        );
    }
}

/// Reload CS through a far return: the transfer that makes a freshly
/// installed code descriptor take effect.
///
/// # Safety
/// `code` must index a valid 64-bit code descriptor in the currently
/// installed table.
#[cfg(feature = "asm")]
pub unsafe fn reload_code_segment(code: u16) {
    unsafe {
        core::arch::asm!(
            "push {code}",
            "lea {tmp}, [rip + 2f]",
            "push {tmp}",
            "retfq",
            "2:",
            code = in(reg) u64::from(code),
            tmp = lateout(reg) _,
            options(preserves_flags)
        );
    }
}

const _: () = {
    assert!(SegmentDescriptor::kernel_code().into_bits() == 0x0020_9A00_0000_0000);
    assert!(SegmentDescriptor::kernel_data().into_bits() == 0x0000_9200_0000_0000);
    assert!(core::mem::size_of::<Gdt>() == 24);
    assert!(core::mem::size_of::<DescriptorTablePointer>() == 10);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_covers_exactly_three_entries() {
        let gdt = Gdt::boot();
        let ptr = gdt.pointer();
        assert_eq!({ ptr.limit }, 23);
        assert_eq!({ ptr.base }, core::ptr::from_ref(&gdt) as u64);
    }

    #[test]
    fn selectors_index_their_slots() {
        assert_eq!(KERNEL_CODE_SELECTOR as usize / 8, 1);
        assert_eq!(KERNEL_DATA_SELECTOR as usize / 8, 2);
    }
}
