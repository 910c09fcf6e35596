//! Stderr logger for the benchmark driver.
//!
//! Implements `log::Log` with a plain `[LEVEL] message` format. Stdout is
//! left to the report line.

use log::{LevelFilter, Metadata, Record};

/// Global logger instance
static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the logger and set the maximum level.
///
/// Only the first call installs the logger; later calls just change the level.
pub fn init(max_level: LevelFilter) {
    if log::set_logger(&LOGGER).is_err() {
        log::debug!("logger already installed");
    }
    log::set_max_level(max_level);
}
