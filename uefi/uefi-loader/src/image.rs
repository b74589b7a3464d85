//! Access to the kernel ELF embedded in this application.
//!
//! The build wraps the kernel into an object file with
//! `objcopy -I binary -O pe-x86-64 kernel.elf ...`, which exports the
//! standard `_binary_<name>_start`/`_end` marker symbols linked in here.

unsafe extern "C" {
    static _binary_kernel_elf_start: u8;
    static _binary_kernel_elf_end: u8;
}

/// The embedded kernel image as a byte slice.
#[must_use]
pub fn kernel_image() -> &'static [u8] {
    let start = &raw const _binary_kernel_elf_start;
    let end = &raw const _binary_kernel_elf_end;
    let len = end.addr() - start.addr();
    // SAFETY: the linker guarantees the marker symbols delimit the embedded
    // blob, which is immutable and lives for the whole program.
    unsafe { core::slice::from_raw_parts(start, len) }
}
