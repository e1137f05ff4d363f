use crate::config::RecorderConfig;
use crate::gate::GateOutcome;
use crate::recording::RecordingReport;
use crate::stats::StatsSnapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// End-of-run report, printed and saved next to the data file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub finished_at: String,
    pub gate: GateOutcome,
    pub recording: Option<RecordingReport>,
    pub elapsed_secs: f64,
    pub samples_written: u64,
    pub samples_unsaved: usize,
    pub frames: u64,
    pub data_rate_hz: f64,
    pub clock_offset_secs: f64,
    pub stats: StatsSnapshot,
    pub data_path: PathBuf,
    pub video_path: PathBuf,
    pub config: RecorderConfig,
}

impl RunSummary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &RecorderConfig,
        gate: GateOutcome,
        recording: Option<RecordingReport>,
        samples_written: u64,
        samples_unsaved: usize,
        clock_offset_secs: f64,
        stats: StatsSnapshot,
    ) -> Self {
        let elapsed_secs = recording.map(|r| r.elapsed_secs).unwrap_or(0.0);
        let frames = recording.map(|r| r.frames).unwrap_or(0);
        RunSummary {
            finished_at: Utc::now().to_rfc3339(),
            gate,
            recording,
            elapsed_secs,
            samples_written,
            samples_unsaved,
            frames,
            data_rate_hz: data_rate(samples_written, elapsed_secs),
            clock_offset_secs,
            stats,
            data_path: config.data_path(),
            video_path: config.video_path(),
            config: config.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Console report
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("[{}] Collection finished:\n", ts_now()));
        out.push_str(&format!("  - Total time: {:.1}s\n", self.elapsed_secs));
        out.push_str(&format!("  - DATA samples saved: {}\n", self.samples_written));
        if self.samples_unsaved > 0 {
            out.push_str(&format!("  - DATA samples NOT saved: {}\n", self.samples_unsaved));
        }
        out.push_str(&format!("  - Video frames: {}\n", self.frames));
        if self.elapsed_secs > 0.0 {
            out.push_str(&format!("  - Mean data rate: {:.1} Hz\n", self.data_rate_hz));
        }
        out.push_str(&format!("  - Data: {}\n", self.data_path.display()));
        out.push_str(&format!("  - Video: {}\n", self.video_path.display()));
        out
    }
}

/// Durable samples per second of recording
pub fn data_rate(samples: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        samples as f64 / elapsed_secs
    } else {
        0.0
    }
}

pub fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
