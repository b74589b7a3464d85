//! # Multiboot Bootstrap Logic
//!
//! The decision-making half of the legacy boot path. The assembly stub in
//! the binary target runs before any 64-bit Rust can execute, so it inlines
//! these steps instruction by instruction; this crate states the same steps
//! as ordinary Rust behind narrow traits, which is what the tests (and any
//! later 64-bit re-verification, e.g. on an application processor) exercise:
//!
//! * [`check`] — the environment verifier: bootloader magic, CPUID
//!   availability, long-mode capability.
//! * [`transition`] — the privileged-register sequence that switches the
//!   CPU into long mode, with the strict ordering captured in one place.
//! * [`vga`] — the last-resort error sink for machines that fail the checks.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod check;
pub mod transition;
pub mod vga;
