//! The firmware exit sequence: memory map capture, `ExitBootServices`,
//! `SetVirtualAddressMap`, reset.

extern crate alloc;

use crate::logger::UefiLogger;
use alloc::vec;
use alloc::vec::Vec;
use log::info;
use uefi::boot::MemoryType;
use uefi::mem::memory_map::MemoryMap;
use uefi::runtime::ResetType;
use uefi::{Status, boot};

/// The frozen state of the machine at the moment boot services ended.
///
/// Laid out for consumption by the kernel; the pointer refers to a buffer
/// that was deliberately leaked while the firmware allocator still existed.
///
/// There is no map-key field: the key only authorizes `ExitBootServices`
/// and is consumed inside the keyed exit in [`exit_boot_services`], so it is
/// meaningless to any consumer of this record.
#[repr(C)]
#[derive(Debug)]
pub struct BootState {
    pub memory_map_ptr: *mut u8,
    pub memory_map_size: usize,
    pub descriptor_size: usize,
    pub descriptor_version: u32,
}

/// Capture the memory map and leave boot services.
///
/// The map key handling lives inside the keyed exit: `exit_boot_services`
/// retrieves the current map and passes its key in one step, retrying if the
/// firmware mutated the map in between.
///
/// # Errors
/// Any failure to size or copy the map. After this function returns `Ok`,
/// boot services (and the firmware allocator) are gone.
pub fn exit_boot_services() -> Result<BootState, Status> {
    info!("exiting boot services ...");

    // Pre-allocate the copy target while the firmware allocator is alive.
    let mut map_copy = allocate_map_buffer()?;
    let map_copy_ptr = map_copy.as_mut_ptr();

    // SAFETY: nothing in this loader touches boot services past this point.
    let owned_map = unsafe { boot::exit_boot_services(None) };
    UefiLogger::exit_boot_services();

    let src = owned_map.buffer().as_ptr();
    let map_size = owned_map.buffer().len();
    if map_size > map_copy.len() {
        return Err(Status::BUFFER_TOO_SMALL);
    }
    // SAFETY: both buffers are at least map_size bytes and do not overlap.
    unsafe { core::ptr::copy_nonoverlapping(src, map_copy_ptr, map_size) };

    let state = BootState {
        memory_map_ptr: map_copy_ptr,
        memory_map_size: map_size,
        descriptor_size: owned_map.meta().desc_size,
        descriptor_version: owned_map.meta().desc_version,
    };

    // The copy must outlive this function; there is no allocator left to
    // return it to anyway.
    core::mem::forget(map_copy);

    info!("boot services exited, flying by instruments now");
    Ok(state)
}

/// Buffer for the post-exit memory map copy. The descriptor count keeps
/// changing while boot services run, so overallocate by a fixed headroom.
fn allocate_map_buffer() -> Result<Vec<u8>, Status> {
    const EXTRA_DESCRIPTORS: usize = 32;

    let probe = boot::memory_map(MemoryType::LOADER_DATA).map_err(|_| Status::UNSUPPORTED)?;
    let needed = probe.meta().map_size + EXTRA_DESCRIPTORS * probe.meta().desc_size;
    drop(probe);

    Ok(vec![0u8; needed])
}

/// Hand the captured map back to the firmware as its virtual address map.
///
/// The map is passed with identity addresses, the same way it was captured;
/// runtime services stay reachable at their physical locations.
///
/// The safe API stops at `ExitBootServices`, so this goes through the raw
/// runtime-services table.
///
/// # Errors
/// The status returned by the firmware, instead of pretending the call
/// cannot fail.
pub fn install_virtual_map(state: &BootState) -> Result<(), Status> {
    let system_table = uefi::table::system_table_raw().ok_or(Status::UNSUPPORTED)?;

    // SAFETY: the system table pointer is valid for the life of the
    // application and runtime services survive ExitBootServices. This is
    // the single permitted call: once, from the boot processor, after exit.
    let status = unsafe {
        let runtime_services = (*system_table.as_ptr()).runtime_services;
        ((*runtime_services).set_virtual_address_map)(
            state.memory_map_size,
            state.descriptor_size,
            state.descriptor_version,
            state.memory_map_ptr.cast(),
        )
    };

    if status.is_success() {
        Ok(())
    } else {
        Err(status)
    }
}

/// Ask the firmware to power the machine off, carrying `status` out as the
/// reset status. Parks the CPU if the reset call itself does not take.
pub fn shutdown(status: Status) -> ! {
    info!("requesting shutdown ({status:?})");
    uefi::runtime::reset(ResetType::SHUTDOWN, status, None)
}
