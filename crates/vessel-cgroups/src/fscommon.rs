//! Helpers for reading and writing cgroup control files.
//!
//! The error discipline: a missing file usually means an optional
//! controller is absent and maps to "no value", while a value that is
//! present but malformed always surfaces as a hard error. A corrupt
//! number indicates an API mismatch, not a tolerable condition.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use vessel_common::error::{Result, VesselError};

/// Writes a single control file; every byte or nothing.
///
/// # Errors
///
/// Any write failure is fatal: a resource limit that silently fails to
/// apply is a security-relevant lie.
pub fn write_file(dir: &Path, file: &str, data: &str) -> Result<()> {
    let path = dir.join(file);
    std::fs::write(&path, data).map_err(|e| VesselError::Io { path, source: e })?;
    tracing::debug!(file, data, "wrote cgroup control file");
    Ok(())
}

/// Reads a control file, mapping a missing file to `None`.
///
/// # Errors
///
/// Returns an error for any failure other than the file not existing.
pub fn read_file(dir: &Path, file: &str) -> Result<Option<String>> {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(VesselError::Io { path, source: e }),
    }
}

/// Parses one ASCII decimal scalar, treating the kernel's literal `max`
/// as "unlimited".
///
/// # Errors
///
/// Returns a parse error for anything else that is not a decimal number.
pub fn parse_u64(path: &Path, value: &str) -> Result<u64> {
    let trimmed = value.trim();
    if trimmed == "max" {
        return Ok(u64::MAX);
    }
    trimmed.parse::<u64>().map_err(|_| VesselError::Parse {
        path: path.to_path_buf(),
        value: trimmed.to_string(),
    })
}

/// Reads a scalar control file; `None` when the file is absent.
///
/// # Errors
///
/// A present but malformed value is a hard error.
pub fn read_u64(dir: &Path, file: &str) -> Result<Option<u64>> {
    match read_file(dir, file)? {
        Some(s) => parse_u64(&dir.join(file), &s).map(Some),
        None => Ok(None),
    }
}

/// Reads a flat keyed file (`cpu.stat` style: one `key value` per line).
///
/// A missing file yields an empty map.
///
/// # Errors
///
/// A malformed value on any line is a hard error.
pub fn read_flat_keyed(dir: &Path, file: &str) -> Result<HashMap<String, u64>> {
    let mut out = HashMap::new();
    let Some(content) = read_file(dir, file)? else {
        return Ok(out);
    };
    let path = dir.join(file);
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let _ = out.insert(key.to_string(), parse_u64(&path, value)?);
    }
    Ok(out)
}

/// Reads a nested keyed file (`io.stat` style: a row key followed by
/// `key=value` pairs). A missing file yields an empty map.
///
/// # Errors
///
/// Returns an error only for I/O failures; value parsing is the caller's
/// concern because the pair vocabulary is controller specific.
pub fn read_nested_keyed(dir: &Path, file: &str) -> Result<HashMap<String, Vec<String>>> {
    let mut out = HashMap::new();
    let Some(content) = read_file(dir, file)? else {
        return Ok(out);
    };
    for line in content.lines() {
        let mut fields = line.split_whitespace().map(ToString::to_string);
        let Some(key) = fields.next() else { continue };
        let rest: Vec<String> = fields.collect();
        if rest.is_empty() {
            continue;
        }
        let _ = out.insert(key, rest);
    }
    Ok(out)
}

/// Converts a kernel huge-page directory name (`hugepages-2048kB`) into
/// the page-size vocabulary used in control file names (`2MB`).
#[must_use]
pub fn page_size_from_dir_name(name: &str) -> Option<String> {
    let kb: u64 = name
        .strip_prefix("hugepages-")?
        .strip_suffix("kB")?
        .parse()
        .ok()?;
    let (value, unit) = if kb >= 1024 * 1024 {
        (kb / (1024 * 1024), "GB")
    } else if kb >= 1024 {
        (kb / 1024, "MB")
    } else {
        (kb, "KB")
    };
    Some(format!("{value}{unit}"))
}

/// Returns the huge page sizes supported by the running kernel.
#[must_use]
pub fn hugepage_sizes() -> Vec<String> {
    hugepage_sizes_at(Path::new(vessel_common::constants::HUGEPAGES_DIR))
}

/// Returns the huge page sizes advertised under a given sysfs directory.
#[must_use]
pub fn hugepage_sizes_at(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut sizes: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|e| page_size_from_dir_name(&e.file_name().to_string_lossy()))
        .collect();
    sizes.sort();
    sizes
}

/// Removes a cgroup directory tree, tolerating an already absent path.
///
/// # Errors
///
/// Returns an error if removal of an existing path fails.
pub fn remove_path(path: &PathBuf) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| VesselError::Io {
            path: path.clone(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_u64(dir.path(), "memory.max").unwrap(), None);
        assert!(read_flat_keyed(dir.path(), "cpu.stat").unwrap().is_empty());
    }

    #[test]
    fn malformed_scalar_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "memory.current", "not-a-number").unwrap();
        assert!(matches!(
            read_u64(dir.path(), "memory.current"),
            Err(VesselError::Parse { .. })
        ));
    }

    #[test]
    fn max_reads_as_unlimited() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "memory.max", "max\n").unwrap();
        assert_eq!(
            read_u64(dir.path(), "memory.max").unwrap(),
            Some(u64::MAX)
        );
    }

    #[test]
    fn flat_keyed_parses_lines() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "cpu.stat", "usage_usec 100\nnr_periods 4\n").unwrap();
        let map = read_flat_keyed(dir.path(), "cpu.stat").unwrap();
        assert_eq!(map.get("usage_usec"), Some(&100));
        assert_eq!(map.get("nr_periods"), Some(&4));
    }

    #[test]
    fn nested_keyed_groups_pairs_by_row() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "io.stat", "7:0 rbytes=1024 wbytes=2048\n").unwrap();
        let map = read_nested_keyed(dir.path(), "io.stat").unwrap();
        assert_eq!(
            map.get("7:0"),
            Some(&vec!["rbytes=1024".to_string(), "wbytes=2048".to_string()])
        );
    }

    #[test]
    fn page_size_conversion_covers_all_units() {
        assert_eq!(page_size_from_dir_name("hugepages-64kB").as_deref(), Some("64KB"));
        assert_eq!(page_size_from_dir_name("hugepages-2048kB").as_deref(), Some("2MB"));
        assert_eq!(page_size_from_dir_name("hugepages-1048576kB").as_deref(), Some("1GB"));
        assert_eq!(page_size_from_dir_name("not-hugepages"), None);
    }
}
