//! The `Logger` collaborator named in §6: "accepts formatted messages at
//! levels {info, dbg, warn, err}; never returns failure."
//!
//! Implemented as a [`log::Log`] so the rest of the kernel just uses
//! `log::{info,debug,warn,error}!` like any other `no_std` crate wired
//! to the `log` facade. Every record goes to serial unconditionally
//! (so a headless boot still has output) and to the VGA console when it
//! has been initialised.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level_tag = match record.level() {
            Level::Error => "err",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug | Level::Trace => "dbg",
        };
        crate::serial_println!("[{}] {}", level_tag, record.args());
        crate::println!("[{}] {}", level_tag, record.args());
    }

    fn flush(&self) {}
}

/// Installs the global logger. Called once during the `bootstrap`
/// initcall stage, before any other subsystem logs a message.
pub fn init() {
    // `set_logger` only fails if called twice; the initcall pipeline
    // guarantees `bootstrap` runs exactly once.
    log::set_logger(&LOGGER).ok();
    log::set_max_level(LevelFilter::Debug);
}
