//! Last-resort error display.
//!
//! When a pre-flight check fails there is no logger, no stack guarantee and
//! possibly no CPUID; the only universally available output is the VGA text
//! buffer at `0xB8000`. The failure is rendered as `ER` plus the single
//! digit of the failed check, white on red, and the CPU is parked.

use crate::check::BootCheck;

/// Physical address of the VGA text buffer.
pub const VGA_TEXT_BUFFER: u64 = 0xB8000;

/// Attribute byte: white on red.
const ATTR_ERROR: u16 = 0x4F;

/// Render a check failure as three VGA cells: `E`, `R`, digit.
///
/// A cell is `attribute << 8 | ascii`; little-endian memory order therefore
/// puts the character byte first, which is what the raw-dword variant in the
/// assembly stub encodes too.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn encode_error(check: BootCheck) -> [u16; 3] {
    [
        (ATTR_ERROR << 8) | (b'E' as u16),
        (ATTR_ERROR << 8) | (b'R' as u16),
        (ATTR_ERROR << 8) | ((b'0' + check.code()) as u16),
    ]
}

/// Display the failure and park the CPU.
#[cfg(target_os = "none")]
pub fn fatal(check: BootCheck) -> ! {
    let cells = encode_error(check);
    let buffer = VGA_TEXT_BUFFER as *mut u16;
    for (i, cell) in cells.into_iter().enumerate() {
        // SAFETY: the VGA text buffer is identity-mapped and always present
        // on the legacy path this code runs on.
        unsafe { buffer.add(i).write_volatile(cell) };
    }
    loop {
        // SAFETY: hlt with interrupts off parks the CPU for good.
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}
