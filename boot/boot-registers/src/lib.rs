//! # Typed x86-64 Control Registers
//!
//! Bitfield models of the registers the boot sequence touches (CR0, CR3, CR4,
//! EFER, RFLAGS) plus the CPUID primitive. The bit layouts are plain data and
//! test on any host; the privileged load/store implementations are behind the
//! `asm` feature and require Ring 0.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cpuid;
pub mod cr0;
pub mod cr3;
pub mod cr4;
pub mod efer;
pub mod rflags;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
