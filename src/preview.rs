use crate::error::{RecorderError, Result};
use crate::video::FrameSink;
use image::RgbImage;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Headless preview: keeps a PNG of the latest composited frame on disk,
/// rewritten at most once per `every`.
pub struct SnapshotPreview {
    path: PathBuf,
    every: Duration,
    last_saved: Option<Instant>,
}

impl SnapshotPreview {
    pub fn new(path: PathBuf, every: Duration) -> Self {
        SnapshotPreview {
            path,
            every,
            last_saved: None,
        }
    }
}

impl FrameSink for SnapshotPreview {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if let Some(last) = self.last_saved {
            if last.elapsed() < self.every {
                return Ok(());
            }
        }
        self.last_saved = Some(Instant::now());
        frame
            .save(&self.path)
            .map_err(|e| RecorderError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_is_rate_limited() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let mut preview = SnapshotPreview::new(path.clone(), Duration::from_secs(3600));

        preview.write_frame(&RgbImage::new(8, 8)).unwrap();
        let first = fs::metadata(&path).unwrap().len();
        assert!(first > 0);

        fs::remove_file(&path).unwrap();
        preview.write_frame(&RgbImage::new(8, 8)).unwrap();
        assert!(!path.exists());
    }
}
