//! Log-file helpers: directory creation, size-based rotation and level
//! conversion. The subscriber itself is installed by the binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Size at which the log file is rotated (10 MiB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated generations kept next to the live file.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// Ensure the parent directory of a log file exists.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Rotate `log_path` once it has reached `max_size` bytes.
///
/// ```text
///   ptrap.log   -> ptrap.log.1
///   ptrap.log.1 -> ptrap.log.2
///   ...
///   ptrap.log.<max_files> is deleted
/// ```
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    if !log_path.exists() || fs::metadata(log_path)?.len() < max_size {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }
    fs::rename(log_path, rotated_path(log_path, 1))
}

/// Map a level name (any case) to an `EnvFilter` directive; unknown
/// names fall back to `"info"`.
pub fn log_level_to_filter(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Prepare `log_path` for appending: create its directory and rotate
/// it if it has grown too large.
pub fn prepare_log_file(log_path: &Path) -> io::Result<fs::File> {
    ensure_log_dir(log_path)?;
    rotate_log_files(log_path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES)?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rotated_path_format_is_correct() {
        let base = Path::new("/var/log/ptrap.log");
        assert_eq!(rotated_path(base, 1), PathBuf::from("/var/log/ptrap.log.1"));
        assert_eq!(rotated_path(base, 4), PathBuf::from("/var/log/ptrap.log.4"));
    }

    #[test]
    fn rotate_is_a_no_op_for_missing_or_small_files() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("ptrap.log");
        rotate_log_files(&log, 10, 3).unwrap();
        fs::write(&log, "short").unwrap();
        rotate_log_files(&log, 10, 3).unwrap();
        assert!(log.exists());
        assert!(!dir.path().join("ptrap.log.1").exists());
    }

    #[test]
    fn rotate_cascades_and_drops_oldest() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("ptrap.log");
        fs::write(dir.path().join("ptrap.log.1"), "old1").unwrap();
        fs::write(dir.path().join("ptrap.log.2"), "old2").unwrap();
        fs::write(&log, "x".repeat(64)).unwrap();

        rotate_log_files(&log, 32, 2).unwrap();

        assert!(!log.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("ptrap.log.1")).unwrap(),
            "x".repeat(64)
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("ptrap.log.2")).unwrap(),
            "old1"
        );
    }

    #[test]
    fn prepare_creates_directories_and_appends() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("nested").join("ptrap.log");
        {
            use std::io::Write;
            let mut file = prepare_log_file(&log).unwrap();
            writeln!(file, "first").unwrap();
        }
        {
            use std::io::Write;
            let mut file = prepare_log_file(&log).unwrap();
            writeln!(file, "second").unwrap();
        }
        assert_eq!(fs::read_to_string(&log).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn level_names_map_to_filters() {
        assert_eq!(log_level_to_filter("TRACE"), "trace");
        assert_eq!(log_level_to_filter("Warn"), "warn");
        assert_eq!(log_level_to_filter("verbose"), "info");
        assert_eq!(log_level_to_filter(""), "info");
    }
}
