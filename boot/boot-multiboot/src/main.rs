//! # Multiboot Bootstrap Entry
//!
//! The binary a multiboot2 loader (GRUB, QEMU `-kernel`) starts in 32-bit
//! protected mode. No 64-bit Rust can run yet, so the path from `_start` to
//! the far transfer is assembly; it inlines the checks and the register
//! sequence that the `boot_multiboot` library states (and tests) in typed
//! form. The page tables, the descriptor table and the handoff are Rust.
//!
//! Entered with `eax` holding the loader magic and `ebx` the physical
//! address of the boot information structure.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![allow(unsafe_code)]

use boot_gdt::Gdt;
use boot_vmem::{PageTable, identity_2m_table};

/// Bootstrap stack; lives in the boot region alongside the code.
const BOOT_STACK_SIZE: usize = 16 * 1024;

/// Top-level table. The assembly writes its two entries (identity and
/// higher-half alias) because the mid-level table's address is only known at
/// link time.
#[unsafe(link_section = ".boot.tables")]
#[used]
static mut BOOT_P4_TABLE: PageTable = PageTable::empty();

/// Mid-level table, shared by both top-level entries. The assembly writes
/// entry 0 to point at the leaf table.
#[unsafe(link_section = ".boot.tables")]
#[used]
static mut BOOT_P3_TABLE: PageTable = PageTable::empty();

/// Leaf table: 512 × 2 MiB identity map of the first gigabyte, fully built
/// at compile time.
#[unsafe(link_section = ".boot.tables")]
#[used]
static mut BOOT_P2_TABLE: PageTable = identity_2m_table();

/// The descriptor table installed before the far transfer. Writable because
/// the CPU records the accessed bit on first load.
#[unsafe(link_section = ".boot.data")]
#[used]
static mut BOOT_GDT: Gdt = Gdt::boot();

// The multiboot2 header. Must sit in the first 32 KiB of the image,
// 8-byte aligned: magic, architecture 0 (i386 protected mode), length,
// checksum, then the terminating end tag.
#[cfg(target_os = "none")]
core::arch::global_asm!(
    r#"
    .section .multiboot_header, "a"
    .align 8
    mb2_header_start:
        .long 0xe85250d6
        .long 0
        .long mb2_header_end - mb2_header_start
        .long 0x100000000 - (0xe85250d6 + 0 + (mb2_header_end - mb2_header_start))
        .word 0
        .word 0
        .long 8
    mb2_header_end:
    "#
);

#[cfg(target_os = "none")]
core::arch::global_asm!(
    r#"
    .section .boot.bss, "aw", @nobits
    .align 16
    mb2_stack_bottom:
        .skip {stack_size}
    mb2_stack_top:

    .section .boot.data, "aw"
    .align 8
    mb2_gdt_pointer:
        .word 23
        .quad {gdt}

    .section .boot.text, "ax"
    .code32
    .global _start
    _start:
        cli
        mov esp, offset mb2_stack_top
        // The boot information pointer rides in esi until the handoff.
        mov esi, ebx

        // Check 0: were we started by a multiboot2-compliant loader?
        cmp eax, {magic}
        jne mb2_no_multiboot

        // Check 1: does CPUID exist? It does iff RFLAGS.ID is toggleable.
        pushfd
        pop eax
        mov ecx, eax
        xor eax, 1 << 21
        push eax
        popfd
        pushfd
        pop eax
        push ecx
        popfd
        cmp eax, ecx
        je mb2_no_cpuid

        // Check 2: long mode. A CPU without leaf 0x80000001 cannot have it.
        mov eax, 0x80000000
        cpuid
        cmp eax, 0x80000001
        jb mb2_no_long_mode
        mov eax, 0x80000001
        cpuid
        test edx, 1 << 29
        jz mb2_no_long_mode

        // Link the page tables: p4[0] and the higher-half alias {hh_offset}
        // bytes into p4 -> p3, p3[0] -> p2.
        // Entries are present + writable (0b11); high dwords stay zero.
        mov eax, offset {p3}
        or eax, 0b11
        mov dword ptr [{p4}], eax
        mov dword ptr [{p4} + 4], 0
        mov dword ptr [{p4} + {hh_offset}], eax
        mov dword ptr [{p4} + {hh_offset} + 4], 0
        mov eax, offset {p2}
        or eax, 0b11
        mov dword ptr [{p3}], eax
        mov dword ptr [{p3} + 4], 0

        // The switch, in the architecturally required order:
        // CR3, CR4.PAE, EFER.LME, CR0.PG, lgdt, segments, far transfer.
        mov eax, offset {p4}
        mov cr3, eax

        mov eax, cr4
        or eax, 1 << 5
        mov cr4, eax

        mov ecx, 0xC0000080
        rdmsr
        or eax, 1 << 8
        wrmsr

        mov eax, cr0
        or eax, 1 << 31
        mov cr0, eax

        lgdt [mb2_gdt_pointer]

        push 0x08
        mov eax, offset mb2_long_mode_start
        push eax
        retf

    mb2_no_multiboot:
        mov al, '0'
        jmp mb2_error
    mb2_no_cpuid:
        mov al, '1'
        jmp mb2_error
    mb2_no_long_mode:
        mov al, '2'
        jmp mb2_error

    // Print `ER` plus the check digit, white on red, and park. Matches the
    // typed encoding in boot_multiboot::vga.
    mb2_error:
        mov dword ptr [0xb8000], 0x4f524f45
        mov byte ptr [0xb8004], al
        mov byte ptr [0xb8005], 0x4f
    mb2_halt32:
        hlt
        jmp mb2_halt32

    .code64
    mb2_long_mode_start:
        mov ax, 0x10
        mov ss, ax
        mov ds, ax
        mov es, ax
        mov fs, ax
        mov gs, ax

        // First sysv64 argument register; the mov zero-extends, the pointer
        // is physical and below 4 GiB.
        mov edi, esi
        call {handoff}
    mb2_halt64:
        cli
        hlt
        jmp mb2_halt64
    "#,
    stack_size = const BOOT_STACK_SIZE,
    magic = const boot_info::boot::MULTIBOOT2_BOOTLOADER_MAGIC,
    hh_offset = const boot_info::memory::KERNEL_P4_INDEX * 8,
    p4 = sym BOOT_P4_TABLE,
    p3 = sym BOOT_P3_TABLE,
    p2 = sym BOOT_P2_TABLE,
    gdt = sym BOOT_GDT,
    handoff = sym multiboot_handoff,
);

#[cfg(target_os = "none")]
unsafe extern "sysv64" {
    /// The kernel's Rust entry point, linked in alongside the bootstrap.
    fn rust_init(boot_info: *mut u8);
}

/// Final Rust step of the bootstrap: hand the boot information to the
/// kernel. The kernel does not return; if it does anyway, park the CPU
/// rather than fall off into whatever bytes follow.
#[cfg(target_os = "none")]
extern "sysv64" fn multiboot_handoff(boot_info: *mut u8) -> ! {
    #[cfg(feature = "qemu")]
    boot_qemu::qemu_trace!("bootstrap: long mode active, entering kernel\n");

    unsafe { rust_init(boot_info) };

    loop {
        // SAFETY: parking the CPU is the only remaining option.
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(test)]
mod tests {
    /// Every brace placeholder in this file's assembly templates must name a
    /// declared operand. A stray one (in a comment as much as in an
    /// instruction) only fails the bare-metal build, which the host test run
    /// never attempts, so check the source text directly.
    ///
    /// The assert message keeps its argument out of line so this function
    /// does not trip its own scan.
    #[test]
    #[allow(clippy::uninlined_format_args)]
    fn asm_placeholders_name_declared_operands() {
        const DECLARED: [&str; 8] = [
            "stack_size",
            "magic",
            "hh_offset",
            "p4",
            "p3",
            "p2",
            "gdt",
            "handoff",
        ];

        let mut rest = include_str!("main.rs");
        while let Some(open) = rest.find('{') {
            rest = &rest[open + 1..];
            if let Some(name) = placeholder_ident(rest) {
                assert!(
                    DECLARED.contains(&name),
                    "undeclared assembly placeholder: {}",
                    name
                );
            }
        }
    }

    /// The identifier directly enclosed in braces at the start of `rest`,
    /// if any.
    fn placeholder_ident(rest: &str) -> Option<&str> {
        let end = rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        if end > 0 && rest[end..].starts_with('}') {
            Some(&rest[..end])
        } else {
            None
        }
    }
}
