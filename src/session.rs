use crate::buffer::SampleBuffer;
use crate::capture::FrameSource;
use crate::config::RecorderConfig;
use crate::error::Result;
use crate::gate::{wait_for_takeoff, GateInputs, GateState, TakeoffGate};
use crate::hud::HudStore;
use crate::ingest::{run_ingestion, IngestTargets};
use crate::persistence::PersistenceStage;
use crate::recording::{RecordingLoop, StopPolicy};
use crate::stats::RunStatistics;
use crate::storage::{check_medium, write_header_if_missing};
use crate::summary::RunSummary;
use crate::transport::LineSource;
use crate::video::FrameSink;
use anyhow::Context;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::task::{self, JoinHandle};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Opens the video file once takeoff is confirmed
pub type VideoFactory = Box<dyn FnOnce(&RecorderConfig) -> Result<Box<dyn FrameSink>> + Send>;

/// Hardware handed to a session. Each device is owned by exactly one stage at a time
/// and dropped when the session ends.
pub struct Devices {
    pub lines: Box<dyn LineSource>,
    pub frames: Box<dyn FrameSource>,
    pub open_video: VideoFactory,
    pub preview: Option<Box<dyn FrameSink>>,
}

/// A run whose storage medium has been checked and whose data file carries a header
pub struct Session {
    config: RecorderConfig,
}

impl Session {
    /// Setup that must succeed before any stage starts
    pub fn prepare(config: RecorderConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;
        check_medium(&config.storage_dir).context("storage check failed")?;
        write_header_if_missing(&config.data_path()).context("cannot prepare data file")?;

        info!(
            "Configuration: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| format!("{:?}", config))
        );
        Ok(Session { config })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Gate, record, shut down.
    ///
    /// Cancelling `abort` ends whichever phase is active; the shutdown sequence
    /// (final flush, ingestion join, encoder finish) runs on every exit path.
    pub async fn run(
        self,
        devices: Devices,
        abort: CancellationToken,
    ) -> anyhow::Result<RunSummary> {
        let config = self.config;
        let Devices {
            mut lines,
            mut frames,
            open_video,
            mut preview,
        } = devices;

        let buffer = Arc::new(SampleBuffer::new());
        let hud = Arc::new(HudStore::new());
        let stats = Arc::new(RunStatistics::new());
        let stop = abort.child_token();

        let ingestion = {
            let targets = IngestTargets {
                buffer: buffer.clone(),
                hud: hud.clone(),
                stats: stats.clone(),
            };
            let stop = stop.clone();
            let idle = config.serial_idle();
            task::spawn_blocking(move || run_ingestion(&mut *lines, targets, stop, idle))
        };

        let gate = {
            let buffer = buffer.clone();
            let hud = hud.clone();
            let stats = stats.clone();
            let abort = abort.clone();
            let stop = stop.clone();
            let takeoff_timeout = config.takeoff_timeout();
            task::spawn_blocking(move || {
                let mut gate = TakeoffGate::new(takeoff_timeout);
                let inputs = GateInputs {
                    buffer: &buffer,
                    hud: &hud,
                    stats: &stats,
                    abort: &abort,
                    stop: &stop,
                };
                let outcome =
                    wait_for_takeoff(&mut gate, &mut *frames, preview.as_deref_mut(), &inputs);
                (outcome, frames, preview)
            })
        };

        let (gate_outcome, mut frames, mut preview) = match gate.await {
            Ok(joined) => joined,
            Err(e) => {
                stop.cancel();
                join_ingestion(ingestion).await;
                return Err(e).context("takeoff gate task failed");
            }
        };

        if gate_outcome.state != GateState::Satisfied {
            info!("Recording cancelled (no takeoff)");
            stop.cancel();
            join_ingestion(ingestion).await;
            let summary = RunSummary::new(
                &config,
                gate_outcome,
                None,
                buffer.total_written(),
                0,
                hud.time_offset(),
                stats.snapshot(),
            );
            save_summary(&config, &summary);
            return Ok(summary);
        }

        let mut video = match open_video(&config) {
            Ok(video) => video,
            Err(e) => {
                stop.cancel();
                join_ingestion(ingestion).await;
                return Err(e).with_context(|| {
                    format!("cannot create video file {}", config.video_path().display())
                });
            }
        };
        info!("[REC] Data: {}", config.data_path().display());

        let persistence = tokio::spawn(
            PersistenceStage::new(
                buffer.clone(),
                stats.clone(),
                config.data_path(),
                config.write_interval(),
            )
            .run(stop.clone()),
        );

        let recording = {
            let buffer = buffer.clone();
            let hud = hud.clone();
            let stats = stats.clone();
            let abort = abort.clone();
            let policy = StopPolicy::new(config.min_run_time());
            let diagnostics_every = config.diagnostics_interval();
            task::spawn_blocking(move || {
                let recorder = RecordingLoop {
                    policy,
                    diagnostics_every,
                    buffer: &buffer,
                    hud: &hud,
                    stats: &stats,
                    abort: &abort,
                };
                let report = recorder.run(&mut *frames, &mut *video, preview.as_deref_mut());
                (report, video)
            })
        }
        .await;

        info!("Shutting down");
        stop.cancel();

        match timeout(config.flush_join_timeout(), persistence).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("[DISK] Persistence task failed: {}", e),
            Err(_) => warn!(
                "[DISK] Final flush still running after {:.1}s, not waiting",
                config.flush_join_secs
            ),
        }
        join_ingestion(ingestion).await;

        let (report, mut video) = recording.context("recording task failed")?;
        if let Err(e) = video.finish() {
            error!("[REC] Video not finalised: {}", e);
        }

        let summary = RunSummary::new(
            &config,
            gate_outcome,
            Some(report),
            buffer.total_written(),
            buffer.size(),
            hud.time_offset(),
            stats.snapshot(),
        );
        if summary.samples_unsaved > 0 {
            error!(
                "[DISK] {} samples could not be written to {}",
                summary.samples_unsaved,
                config.data_path().display()
            );
        }
        save_summary(&config, &summary);
        Ok(summary)
    }
}

async fn join_ingestion(ingestion: JoinHandle<()>) {
    if let Err(e) = ingestion.await {
        warn!("[SERIAL] Ingestion task failed: {}", e);
    }
}

fn save_summary(config: &RecorderConfig, summary: &RunSummary) {
    let path = config.summary_path();
    if let Err(e) = summary.save(&path) {
        warn!("Failed to save run summary to {}: {}", path.display(), e);
    }
}
