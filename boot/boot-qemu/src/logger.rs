use crate::qemu_trace;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log::Log` backend writing `[LEVEL] target: message` lines to the QEMU
/// debug port. Level filtering happens through `log::set_max_level`.
pub struct QemuLogger;

static LOGGER: QemuLogger = QemuLogger;

impl QemuLogger {
    /// Install the logger. Call once, early.
    ///
    /// # Errors
    /// Fails if another logger was installed first.
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for QemuLogger {
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
    }

    fn flush(&self) {}
}
