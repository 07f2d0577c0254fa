//! `log` backend for an add-in. Excel has no console, so when a debugger is attached the lines
//! go to the debugger's output window, otherwise to stderr.

use std::io::Write;
use std::sync::OnceLock;

use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable overriding the level: off, error, warn, info, debug or trace
pub const LOG_LEVEL_VAR: &str = "XLKIT_LOG";

pub struct HostLogger {
    level: LevelFilter,
}

impl HostLogger {
    pub fn new(level: LevelFilter) -> HostLogger {
        HostLogger { level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

/// `file(line) [target]: message`
pub fn format_record(record: &Record) -> String {
    let file = record.file().unwrap_or("?");
    let file = file.rsplit(['/', '\\']).next().unwrap_or(file);
    format!("{}({}) [{}]: {}", file, record.line().unwrap_or(0), record.target(), record.args())
}

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            write_line(&format_record(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(windows)]
fn write_line(line: &str) {
    use windows::Win32::System::Diagnostics::Debug::{IsDebuggerPresent, OutputDebugStringA};
    use windows::core::PCSTR;

    if unsafe { IsDebuggerPresent() }.as_bool() {
        let mut bytes = line.bytes().filter(|b| *b != 0).collect::<Vec<u8>>();
        bytes.extend_from_slice(b"\n\0");
        unsafe { OutputDebugStringA(PCSTR(bytes.as_ptr())) };
    } else {
        eprintln!("{}", line);
    }
}

#[cfg(not(windows))]
fn write_line(line: &str) {
    eprintln!("{}", line);
}

fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// Parse a level override, ignoring anything unrecognised
pub fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse::<LevelFilter>().ok())
        .unwrap_or_else(default_level)
}

static LOGGER: OnceLock<HostLogger> = OnceLock::new();

/// Install the logger. Safe to call more than once, and a no-op if the process already has a
/// logger.
pub fn init() {
    let logger = LOGGER.get_or_init(|| {
        HostLogger::new(level_from(std::env::var(LOG_LEVEL_VAR).ok().as_deref()))
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.level);
    }
}
