//! Stderr backend for the `log` facade.
//!
//! Lines look like `[dialoguec] message`; warnings and errors carry their level.

use log::{Level, LevelFilter, Log, Metadata, Record};

const TAG: &str = "dialoguec";

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_line(record.level(), &record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

fn format_line(level: Level, message: &str) -> String {
    match level {
        Level::Error => format!("[{TAG}] error: {message}"),
        Level::Warn => format!("[{TAG}] warning: {message}"),
        Level::Info | Level::Debug | Level::Trace => format!("[{TAG}] {message}"),
    }
}

/// Install the logger. `verbose` enables debug output. Safe to call twice.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
