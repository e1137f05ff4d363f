use crate::error::{RecorderError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Everything a recording session needs to know, in validated form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub serial_port: String,
    pub baud: u32,
    /// Mount point of the removable storage medium
    pub storage_dir: PathBuf,
    pub data_file: String,
    pub video_file: String,
    pub camera_device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub min_run_secs: f64,
    pub write_interval_ms: u64,
    pub takeoff_timeout_secs: f64,
    pub diagnostics_secs: f64,
    pub serial_idle_ms: u64,
    pub serial_timeout_ms: u64,
    /// Seconds to wait for the final flush at shutdown
    pub flush_join_secs: f64,
    pub preview: Option<PathBuf>,
    pub preview_every_secs: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            serial_port: "/dev/ttyACM0".to_string(),
            baud: 115_200,
            storage_dir: PathBuf::from("/media/aerochico/AERO"),
            data_file: "flight_data.txt".to_string(),
            video_file: "flight_overlay_video.mp4".to_string(),
            camera_device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 30,
            min_run_secs: 45.0,
            write_interval_ms: 100,
            takeoff_timeout_secs: 120.0,
            diagnostics_secs: 5.0,
            serial_idle_ms: 1,
            serial_timeout_ms: 100,
            flush_join_secs: 2.0,
            preview: None,
            preview_every_secs: 1.0,
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RecorderError::InvalidConfig(format!(
                "frame size {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(RecorderError::InvalidConfig("fps must be > 0".to_string()));
        }
        if self.write_interval_ms == 0 {
            return Err(RecorderError::InvalidConfig(
                "write interval must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("min run time", self.min_run_secs),
            ("takeoff timeout", self.takeoff_timeout_secs),
            ("diagnostics interval", self.diagnostics_secs),
            ("flush join timeout", self.flush_join_secs),
            ("preview interval", self.preview_every_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(RecorderError::InvalidConfig(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        self.storage_dir.join(&self.data_file)
    }

    pub fn video_path(&self) -> PathBuf {
        self.storage_dir.join(&self.video_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.storage_dir.join("run_summary.json")
    }

    pub fn min_run_time(&self) -> Duration {
        Duration::from_secs_f64(self.min_run_secs)
    }

    pub fn write_interval(&self) -> Duration {
        Duration::from_millis(self.write_interval_ms)
    }

    pub fn takeoff_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.takeoff_timeout_secs)
    }

    pub fn diagnostics_interval(&self) -> Duration {
        Duration::from_secs_f64(self.diagnostics_secs)
    }

    pub fn serial_idle(&self) -> Duration {
        Duration::from_millis(self.serial_idle_ms)
    }

    pub fn serial_timeout(&self) -> Duration {
        Duration::from_millis(self.serial_timeout_ms)
    }

    pub fn flush_join_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.flush_join_secs)
    }

    pub fn preview_every(&self) -> Duration {
        Duration::from_secs_f64(self.preview_every_secs)
    }
}
