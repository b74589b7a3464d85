//! # UEFI Loader
//!
//! The firmware-path counterpart of the multiboot bootstrap. The kernel ELF
//! is embedded into this application at link time (objcopy); on boot the
//! loader validates it, reports its loadable segments, then leaves the
//! firmware environment: memory map capture, `ExitBootServices`,
//! `SetVirtualAddressMap`, shutdown.
//!
//! Copying the segments to their physical addresses and entering the kernel
//! through the shared transition is the designated next step of this path;
//! until then the loader is a validating dry run that exercises the full
//! firmware exit sequence.
//!
//! Every firmware call has its status checked; a failure after
//! `ExitBootServices` cannot be reported to the console anymore, but it
//! still reaches the QEMU debug port and aborts into a halt rather than
//! carrying on with a half-configured firmware interface.

#![cfg_attr(target_os = "uefi", no_std)]
#![cfg_attr(target_os = "uefi", no_main)]
#![allow(unsafe_code)]

#[cfg(target_os = "uefi")]
mod firmware;
#[cfg(target_os = "uefi")]
mod image;
#[cfg(any(target_os = "uefi", test))]
mod layout;
#[cfg(target_os = "uefi")]
mod logger;

#[cfg(target_os = "uefi")]
mod loader {
    use crate::firmware;
    use crate::image;
    use crate::logger::UefiLogger;
    use boot_elf::{ElfImage, ProgramHeader};
    use log::{LevelFilter, error, info};
    use uefi::prelude::*;

    #[entry]
    fn efi_main() -> Status {
        if uefi::helpers::init().is_err() {
            return Status::UNSUPPORTED;
        }
        if UefiLogger::init(LevelFilter::Debug).is_err() {
            return Status::UNSUPPORTED;
        }

        let kernel = image::kernel_image();
        info!(
            "UEFI loader: kernel image embedded at {:p}, {} bytes",
            kernel.as_ptr(),
            kernel.len()
        );

        let image = match ElfImage::parse(kernel) {
            Ok(image) => image,
            Err(e) => {
                error!("kernel image rejected: {e}");
                return Status::LOAD_ERROR;
            }
        };
        // Mirror the per-check progress of the validation order.
        info!("... valid ELF magic number");
        info!("... valid ELF class");
        info!("... valid ELF byte order");
        info!("... valid ELF target machine");
        info!("... valid ELF version");
        info!("... valid ELF file type");
        info!("found valid kernel ELF");

        info!(
            "walking {} program headers",
            image.program_header_count()
        );
        for header in image.program_headers() {
            match header {
                ProgramHeader::Load(seg) => {
                    info!(
                        "PT_LOAD: paddr={}, vaddr={}, filesz={:#x}, memsz={:#x}, offset={:#x}",
                        seg.paddr, seg.vaddr, seg.filesz, seg.memsz, seg.offset
                    );
                    if let Err(e) = crate::layout::check_segment(&seg) {
                        error!("kernel segment unusable: {e}");
                        return Status::LOAD_ERROR;
                    }
                }
                ProgramHeader::Other(p_type) => {
                    info!("skipping program header of type {p_type:#x}");
                }
            }
        }
        info!("kernel entry point: {}", image.entry());

        // TODO: copy the PT_LOAD segments to their physical addresses and
        // enter the kernel through the long-mode transition instead of
        // shutting down below.

        let state = match firmware::exit_boot_services() {
            Ok(state) => state,
            Err(status) => {
                error!("failed to capture the memory map: {status:?}");
                return status;
            }
        };

        // Console output is gone from here on; only the debug port remains.
        // Boot services are over, so a failure cannot be returned to the
        // firmware either; it is carried out through the reset status.
        if let Err(status) = firmware::install_virtual_map(&state) {
            error!("SetVirtualAddressMap failed: {status:?}");
            firmware::shutdown(status);
        }

        firmware::shutdown(Status::SUCCESS)
    }
}

#[cfg(not(target_os = "uefi"))]
fn main() {}
