//! # Shared Boot Vocabulary
//!
//! Address newtypes, the fixed memory-layout constants, and the handoff ABI
//! shared between the multiboot bootstrap, the UEFI loader, and the build
//! scripts that configure the linker.
//!
//! This crate is deliberately dependency-free: everything else in the
//! workspace is allowed to depend on it.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod addresses;
pub mod boot;
pub mod memory;

pub use addresses::{PhysAddr, VirtAddr};
