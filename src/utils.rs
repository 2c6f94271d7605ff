//! Shared utility functions for paths and timestamps.
//!
//! These functions are reused across the command interpreter, the views and
//! the export pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Directory name used under the platform data directory.
pub const APP_DIR: &str = "tagging-rugby";

/// Gets the application data directory.
///
/// Returns `{data_dir}/tagging-rugby` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_data_directory() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join(APP_DIR))
}

/// Gets the default database path, `{data_dir}/tagging-rugby/tagging.db`.
pub fn get_database_path() -> Result<PathBuf> {
    Ok(get_data_directory()?.join("tagging.db"))
}

/// Gets the log file path, `{data_dir}/tagging-rugby/tagging-rugby.log`.
pub fn get_log_path() -> Result<PathBuf> {
    Ok(get_data_directory()?.join("tagging-rugby.log"))
}

/// Ensures the parent directory of a file exists.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Container format of a video, taken from its lower-cased extension.
pub fn video_format(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Parses `MM:SS`, `H:MM:SS` or bare seconds into seconds.
///
/// Fractional seconds are accepted in the last component. Returns `None`
/// for negative values, out-of-range minutes/seconds or malformed input.
///
/// # Examples
///
/// ```
/// use tagging_rugby::utils::parse_timestamp;
///
/// assert_eq!(parse_timestamp("1:12"), Some(72.0));
/// assert_eq!(parse_timestamp("1:00:30"), Some(3630.0));
/// assert_eq!(parse_timestamp("72.5"), Some(72.5));
/// assert_eq!(parse_timestamp("1:75"), None);
/// ```
pub fn parse_timestamp(input: &str) -> Option<f64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let parts: Vec<&str> = input.split(':').collect();
    let number = |s: &str| -> Option<f64> {
        let value: f64 = s.parse().ok()?;
        (value.is_finite() && value >= 0.0).then_some(value)
    };
    match parts.as_slice() {
        [secs] => number(secs),
        [mins, secs] => {
            let mins = number(mins)?;
            let secs = number(secs)?;
            (mins.fract() == 0.0 && secs < 60.0).then_some(mins * 60.0 + secs)
        }
        [hours, mins, secs] => {
            let hours = number(hours)?;
            let mins = number(mins)?;
            let secs = number(secs)?;
            (hours.fract() == 0.0 && mins.fract() == 0.0 && mins < 60.0 && secs < 60.0)
                .then_some(hours * 3600.0 + mins * 60.0 + secs)
        }
        _ => None,
    }
}

fn split_hms(seconds: f64) -> (u64, u64, u64) {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    (total / 3600, (total % 3600) / 60, total % 60)
}

/// Formats seconds for display: `MM:SS` below one hour, `H:MM:SS` above.
pub fn format_timestamp(seconds: f64) -> String {
    let (h, m, s) = split_hms(seconds);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Formats seconds for use in a file name: `H-MM-SS`.
pub fn format_file_timestamp(seconds: f64) -> String {
    let (h, m, s) = split_hms(seconds);
    format!("{h}-{m:02}-{s:02}")
}
