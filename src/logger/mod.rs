//! Process-wide logging
//!
//! Info and access lines go to the access target, warnings and errors to the
//! error target. Both default to the standard streams until [`init`] points
//! them at files.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

const LEVEL_ERROR: u8 = 0;
const LEVEL_WARN: u8 = 1;
const LEVEL_INFO: u8 = 2;

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_INFO);

fn parse_level(level: &str) -> u8 {
    match level.to_ascii_lowercase().as_str() {
        "error" => LEVEL_ERROR,
        "warn" | "warning" => LEVEL_WARN,
        _ => LEVEL_INFO,
    }
}

fn enabled(level: u8) -> bool {
    level <= MAX_LEVEL.load(Ordering::Relaxed)
}

/// Apply the `[logging]` section; call once before serving
pub fn init(config: &Config) -> std::io::Result<()> {
    MAX_LEVEL.store(parse_level(&config.logging.level), Ordering::Relaxed);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Reopen log files (after external rotation)
pub fn reopen() -> std::io::Result<()> {
    writer::get().map_or(Ok(()), writer::LogWriter::reopen)
}

fn write_info(message: &str) {
    if !enabled(LEVEL_INFO) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info(&format!("image_drop listening on http://{addr}"));
    write_info(&format!(
        "  upload dir: {}",
        config.storage.upload_dir.display()
    ));
    write_info(&format!("  log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("  workers: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("  access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("  error log: {path}"));
    }
    write_info("  - POST /upload");
    write_info("  - GET  /list_images");
    write_info("  - GET  /get_image/{filename}");
    write_info("  - GET  /get_all_images");
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Connection error: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    if enabled(LEVEL_WARN) {
        write_error(&format!("[WARN] {message}"));
    }
}

pub fn log_access(entry: &AccessLogEntry, format: &str) {
    if !enabled(LEVEL_INFO) {
        return;
    }
    let line = entry.format(format);
    match writer::get() {
        Some(w) => w.write_access(&line),
        None => println!("{line}"),
    }
}

pub fn log_shutdown(active_connections: usize) {
    write_info(&format!(
        "[Shutdown] Listener closed, {active_connections} connection(s) still active"
    ));
}
