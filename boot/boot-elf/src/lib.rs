//! # ELF64 Image Inspection
//!
//! Validates the embedded kernel image and walks its program headers. Works
//! on a plain byte slice so the whole pipeline runs in host tests; the UEFI
//! loader feeds it the objcopy-embedded kernel bytes.
//!
//! Validation performs six identity checks in a fixed order (magic, class,
//! byte order, machine, version, type), each with its own diagnostic, and
//! stops at the first failure.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod parser;

pub use parser::{ElfError, ElfImage, LoadSegment, PFlags, ProgramHeader, ProgramHeaders};
