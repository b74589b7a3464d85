//! Placement checks for the walked kernel segments.
//!
//! The PT_LOAD quadruples are only useful if they land inside the gigabyte
//! the boot page tables map and keep the fixed physical-to-virtual offset the
//! kernel was linked with. Checking here turns a mislinked kernel into a
//! console diagnostic instead of a fault at handoff.

use boot_elf::LoadSegment;
use boot_info::memory::{BOOT_MAPPED_BYTES, KERNEL_PHYS_LOAD, KERNEL_VIRTUAL_BASE};
use boot_info::{PhysAddr, VirtAddr};

/// Fixed offset between where the kernel executes and where it loads.
const HIGHER_HALF_DELTA: u64 = KERNEL_VIRTUAL_BASE - KERNEL_PHYS_LOAD;

/// A loadable segment that cannot work with the boot mapping.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("segment loads at {0}, below the kernel load base")]
    BelowLoadBase(PhysAddr),

    #[error("segment extends past the boot-mapped gigabyte")]
    OutsideBootMapping,

    #[error("segment at {vaddr} breaks the higher-half offset to {paddr}")]
    SkewedMapping { vaddr: VirtAddr, paddr: PhysAddr },
}

/// Check one loadable segment against the linked kernel layout: at or above
/// the physical load base, fully inside the boot-mapped gigabyte, and offset
/// into the higher half by exactly the configured delta.
///
/// # Errors
/// The first violated placement rule.
pub fn check_segment(segment: &LoadSegment) -> Result<(), LayoutError> {
    let paddr = segment.paddr.as_u64();
    if paddr < KERNEL_PHYS_LOAD {
        return Err(LayoutError::BelowLoadBase(segment.paddr));
    }
    match paddr.checked_add(segment.memsz) {
        Some(end) if end <= BOOT_MAPPED_BYTES => {}
        _ => return Err(LayoutError::OutsideBootMapping),
    }
    if segment.vaddr.as_u64().wrapping_sub(paddr) != HIGHER_HALF_DELTA {
        return Err(LayoutError::SkewedMapping {
            vaddr: segment.vaddr,
            paddr: segment.paddr,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boot_elf::PFlags;

    fn segment(vaddr: u64, paddr: u64, memsz: u64) -> LoadSegment {
        LoadSegment {
            vaddr: VirtAddr::new(vaddr),
            paddr: PhysAddr::new(paddr),
            filesz: memsz,
            memsz,
            offset: 0x1000,
            flags: PFlags::new().with_read(true),
            align: 0x1000,
        }
    }

    #[test]
    fn accepts_the_linked_layout() {
        assert_eq!(
            check_segment(&segment(KERNEL_VIRTUAL_BASE, KERNEL_PHYS_LOAD, 0x8000)),
            Ok(())
        );
    }

    #[test]
    fn rejects_load_below_the_kernel_base() {
        assert_eq!(
            check_segment(&segment(KERNEL_VIRTUAL_BASE, 0x7C00, 0x1000)),
            Err(LayoutError::BelowLoadBase(PhysAddr::new(0x7C00)))
        );
    }

    #[test]
    fn rejects_segment_past_the_mapped_gigabyte() {
        assert_eq!(
            check_segment(&segment(KERNEL_VIRTUAL_BASE, KERNEL_PHYS_LOAD, BOOT_MAPPED_BYTES)),
            Err(LayoutError::OutsideBootMapping)
        );
    }

    #[test]
    fn rejects_memsz_overflow() {
        assert_eq!(
            check_segment(&segment(KERNEL_VIRTUAL_BASE, KERNEL_PHYS_LOAD, u64::MAX)),
            Err(LayoutError::OutsideBootMapping)
        );
    }

    #[test]
    fn rejects_a_skewed_virtual_mapping() {
        let err = check_segment(&segment(
            KERNEL_VIRTUAL_BASE + 0x1000,
            KERNEL_PHYS_LOAD,
            0x1000,
        ))
        .unwrap_err();
        assert!(matches!(err, LayoutError::SkewedMapping { .. }));
    }
}
