//! # QEMU Debug Output
//!
//! Boot code has no console of its own until the UEFI text output or the
//! kernel's own logging comes up. Under QEMU, port `0x402` (`-debugcon`)
//! gives a zero-setup byte sink that works from the very first instruction,
//! so both paths route their diagnostics through it.
//!
//! Two entry points:
//! * [`qemu_trace!`] — direct formatted output, no logger required;
//! * [`QemuLogger`] — a `log::Log` backend over the same port.
//!
//! With the `enabled` feature off, everything compiles to no-ops and the
//! port is never touched; real hardware builds use that configuration.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// QEMU's debug console port (`-debugcon`).
    const QEMU_DEBUG_PORT: u16 = 0x402;

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn dbg_putc(c: u8) {
        unsafe { outb(QEMU_DEBUG_PORT, c) }
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    unsafe fn outb(port: u16, val: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") port,
                in("al") val,
                options(nomem, preserves_flags)
            );
        }
    }

    /// Unbuffered `fmt::Write` over the debug port.
    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }

        #[inline]
        fn write_char(&mut self, c: char) -> fmt::Result {
            let mut buf = [0u8; 4];
            self.write_str(c.encode_utf8(&mut buf))
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort; there is nothing useful to do with a write error here.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(_: fmt::Arguments) {}
}

/// Formatted output straight to the QEMU debug port.
///
/// Builds a `fmt::Arguments` at the call site; nothing is allocated.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
