//! The privileged-register sequence that takes the CPU from protected mode
//! into long mode.
//!
//! The ordering is architectural, not stylistic: the paging root must be in
//! place before PAE translation starts, PAE before long mode is armed, and
//! EFER.LME before CR0.PG flips the machine into compatibility mode. The
//! descriptor table and the far transfer then make the new mode visible to
//! the instruction stream. [`enter_long_mode`] is the only place that order
//! is written down.

use boot_info::PhysAddr;

/// The privileged operations the switch consists of, one method per step.
///
/// Hardware implements them with register stores; tests implement them with
/// a recorder and assert on the ordering.
pub trait PrivilegedOps {
    /// Point CR3 at the top-level page table.
    fn set_paging_root(&mut self, root: PhysAddr);

    /// Set CR4.PAE.
    fn enable_pae(&mut self);

    /// Set EFER.LME.
    fn arm_long_mode(&mut self);

    /// Set CR0.PG, activating long mode.
    fn enable_paging(&mut self);

    /// `lgdt` the boot descriptor table.
    fn load_descriptor_table(&mut self);

    /// Point the data segment registers at the flat data descriptor.
    fn reload_data_segments(&mut self);

    /// Far transfer through the 64-bit code selector.
    fn far_transfer(&mut self);
}

/// Execute the switch. Steps run in the architecturally required order,
/// each exactly once.
pub fn enter_long_mode<O: PrivilegedOps>(ops: &mut O, paging_root: PhysAddr) {
    ops.set_paging_root(paging_root);
    ops.enable_pae();
    ops.arm_long_mode();
    ops.enable_paging();
    ops.load_descriptor_table();
    ops.reload_data_segments();
    ops.far_transfer();
}

/// The real thing, backed by the register crates.
///
/// The bootstrap processor runs this sequence inlined in the 32-bit assembly
/// stub; this impl is the sequencer for application-processor bring-up,
/// driven from 64-bit supervisor code once the wake-up path is wired.
///
/// Construction is unsafe because merely *running* the sequence reconfigures
/// the CPU; the caller must be in ring 0, with interrupts off, with the page
/// tables and descriptor table already in memory.
#[cfg(target_arch = "x86_64")]
pub struct HardwareOps {
    gdt: &'static boot_gdt::Gdt,
}

#[cfg(target_arch = "x86_64")]
impl HardwareOps {
    /// # Safety
    /// See the type-level contract.
    #[must_use]
    pub const unsafe fn new(gdt: &'static boot_gdt::Gdt) -> Self {
        Self { gdt }
    }
}

#[cfg(target_arch = "x86_64")]
impl PrivilegedOps for HardwareOps {
    fn set_paging_root(&mut self, root: PhysAddr) {
        use boot_registers::StoreRegisterUnsafe;
        unsafe { boot_registers::cr3::Cr3::from_table_phys(root, false, false).store_unsafe() };
    }

    fn enable_pae(&mut self) {
        use boot_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
        unsafe {
            boot_registers::cr4::Cr4::load_unsafe()
                .with_pae(true)
                .store_unsafe();
        }
    }

    fn arm_long_mode(&mut self) {
        use boot_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
        unsafe {
            boot_registers::efer::Efer::load_unsafe()
                .with_lme(true)
                .store_unsafe();
        }
    }

    fn enable_paging(&mut self) {
        use boot_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
        unsafe {
            boot_registers::cr0::Cr0::load_unsafe()
                .with_pg_paging(true)
                .store_unsafe();
        }
    }

    fn load_descriptor_table(&mut self) {
        let pointer = self.gdt.pointer();
        unsafe { boot_gdt::load(&pointer) };
    }

    fn reload_data_segments(&mut self) {
        unsafe { boot_gdt::reload_data_segments(boot_gdt::KERNEL_DATA_SELECTOR) };
    }

    fn far_transfer(&mut self) {
        unsafe { boot_gdt::reload_code_segment(boot_gdt::KERNEL_CODE_SELECTOR) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, Eq, PartialEq)]
    enum Step {
        PagingRoot(u64),
        Pae,
        LongMode,
        Paging,
        Gdt,
        DataSegments,
        FarTransfer,
    }

    #[derive(Default)]
    struct Recorder {
        steps: Vec<Step>,
    }

    impl PrivilegedOps for Recorder {
        fn set_paging_root(&mut self, root: PhysAddr) {
            self.steps.push(Step::PagingRoot(root.as_u64()));
        }

        fn enable_pae(&mut self) {
            self.steps.push(Step::Pae);
        }

        fn arm_long_mode(&mut self) {
            self.steps.push(Step::LongMode);
        }

        fn enable_paging(&mut self) {
            self.steps.push(Step::Paging);
        }

        fn load_descriptor_table(&mut self) {
            self.steps.push(Step::Gdt);
        }

        fn reload_data_segments(&mut self) {
            self.steps.push(Step::DataSegments);
        }

        fn far_transfer(&mut self) {
            self.steps.push(Step::FarTransfer);
        }
    }

    /// The whole point of the sequencer: every step, exactly once, in the
    /// architecturally required order.
    #[test]
    fn steps_run_once_in_order() {
        let mut recorder = Recorder::default();
        enter_long_mode(&mut recorder, PhysAddr::new(0x7000));
        assert_eq!(
            recorder.steps,
            [
                Step::PagingRoot(0x7000),
                Step::Pae,
                Step::LongMode,
                Step::Paging,
                Step::Gdt,
                Step::DataSegments,
                Step::FarTransfer,
            ]
        );
    }

    #[test]
    fn paging_root_is_passed_through_untouched() {
        let mut recorder = Recorder::default();
        enter_long_mode(&mut recorder, PhysAddr::new(0x0000_1000));
        assert_eq!(recorder.steps[0], Step::PagingRoot(0x1000));
    }
}
