use crate::error::{RecorderError, Result};
use log::info;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Column names, first header line of the data file
pub const FIELD_NAMES: [&str; 6] = ["Time", "XGPS", "YGPS", "ZGPS", "Theta", "Phi"];

/// Units, second header line of the data file
pub const FIELD_UNITS: [&str; 6] = ["Seconds", "m", "m", "m", "deg", "deg"];

/// Fail fast when the storage medium is not mounted
pub fn check_medium(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(RecorderError::StorageUnavailable(dir.to_path_buf()))
    }
}

/// Write the two header lines if the data file does not exist yet.
///
/// Returns `true` when a header was written; an existing file is left untouched
/// so repeated runs keep appending to the same log.
pub fn write_header_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            check_medium(parent)?;
        }
    }

    let header = format!("{}\n{}\n", FIELD_NAMES.join("\t"), FIELD_UNITS.join("\t"));
    fs::write(path, header)
        .map_err(|e| RecorderError::Storage(format!("{}: {}", path.display(), e)))?;
    info!("[DISK] Header written to {}", path.display());
    Ok(true)
}

/// Append records as newline-terminated lines.
///
/// The file is opened and closed on every call so the medium may be unmounted
/// between writes without leaving a stale handle behind.
pub fn append_records(path: &Path, records: &[String]) -> io::Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut payload = records.join("\n");
    payload.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(payload.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_check_medium() {
        let dir = tempdir().unwrap();
        assert!(check_medium(dir.path()).is_ok());

        let missing = dir.path().join("not_mounted");
        match check_medium(&missing) {
            Err(RecorderError::StorageUnavailable(p)) => assert_eq!(p, missing),
            other => panic!("expected StorageUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight_data.txt");

        assert!(write_header_if_missing(&path).unwrap());
        assert!(!write_header_if_missing(&path).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Time\tXGPS\tYGPS\tZGPS\tTheta\tPhi\nSeconds\tm\tm\tm\tdeg\tdeg\n"
        );
    }

    #[test]
    fn test_header_fails_without_medium() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("flight_data.txt");
        assert!(write_header_if_missing(&path).is_err());
    }

    #[test]
    fn test_append_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flight_data.txt");
        write_header_if_missing(&path).unwrap();

        append_records(&path, &["1\t0\t0\t1\t0\t0".to_string()]).unwrap();
        append_records(&path, &[]).unwrap();
        append_records(
            &path,
            &["2\t0\t0\t2\t0\t0".to_string(), "3\t0\t0\t3\t0\t0".to_string()],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], "1\t0\t0\t1\t0\t0");
        assert_eq!(lines[4], "3\t0\t0\t3\t0\t0");
    }

    #[test]
    fn test_append_fails_when_medium_gone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone").join("flight_data.txt");
        assert!(append_records(&path, &["x".to_string()]).is_err());
    }
}
