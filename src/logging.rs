//! Tracing subscriber setup.
//!
//! The terminal belongs to the UI, so log lines go to a file under the data
//! directory. If the file cannot be opened they are discarded.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::utils::ensure_parent_directory;

/// Installs the global subscriber writing to `log_path`.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Returns false if
/// the log file could not be opened and logging was routed to a sink.
pub fn init(log_path: Option<&Path>) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_path.and_then(open_log_file) {
        Some(file) => {
            let file = Arc::new(file);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(file)
                .try_init();
            true
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
            false
        }
    }
}

fn open_log_file(path: &Path) -> Option<File> {
    ensure_parent_directory(path).ok()?;
    OpenOptions::new().create(true).append(true).open(path).ok()
}
