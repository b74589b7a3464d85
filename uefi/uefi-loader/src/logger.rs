use boot_qemu::qemu_trace;
use core::sync::atomic::{AtomicBool, Ordering};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logs to the QEMU debug port always, and mirrors to the UEFI text console
/// while boot services are still available.
pub struct UefiLogger;

static LOGGER: UefiLogger = UefiLogger;
static BOOT_SERVICES_AVAILABLE: AtomicBool = AtomicBool::new(true);

impl UefiLogger {
    /// Install the logger. Call once, before any output.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(max_level);
        Ok(())
    }

    /// Stop mirroring to the console; the text output protocol died with
    /// boot services.
    pub fn exit_boot_services() {
        BOOT_SERVICES_AVAILABLE.store(false, Ordering::Release);
    }
}

impl Log for UefiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        qemu_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );

        if BOOT_SERVICES_AVAILABLE.load(Ordering::Acquire) {
            uefi::println!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
