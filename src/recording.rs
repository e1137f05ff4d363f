use crate::buffer::SampleBuffer;
use crate::capture::FrameSource;
use crate::hud::HudStore;
use crate::overlay::draw_overlay;
use crate::stats::RunStatistics;
use crate::video::FrameSink;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const FRAME_ERROR_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// STOP from the flight controller, honoured once the minimum time passed
    StopSignal,
    /// Minimum run time reached without a STOP
    MinimumTime,
    /// Operator abort
    Aborted,
}

/// Combined stop condition for the recording loop.
///
/// Recording never ends before `min_run_time`; once it is reached the loop
/// stops whether or not a STOP arrived. A STOP seen earlier is held until then.
#[derive(Debug, Clone, Copy)]
pub struct StopPolicy {
    min_run_time: Duration,
}

impl StopPolicy {
    pub fn new(min_run_time: Duration) -> Self {
        StopPolicy { min_run_time }
    }

    pub fn min_run_time(&self) -> Duration {
        self.min_run_time
    }

    pub fn evaluate(&self, elapsed: Duration, stop_received: bool) -> Option<StopReason> {
        if elapsed < self.min_run_time {
            return None;
        }
        if stop_received {
            Some(StopReason::StopSignal)
        } else {
            Some(StopReason::MinimumTime)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordingReport {
    pub frames: u64,
    pub elapsed_secs: f64,
    pub reason: StopReason,
    pub encode_errors: u64,
}

/// Steady-state capture/composite/encode loop
pub struct RecordingLoop<'a> {
    pub policy: StopPolicy,
    pub diagnostics_every: Duration,
    pub buffer: &'a SampleBuffer,
    pub hud: &'a HudStore,
    pub stats: &'a RunStatistics,
    pub abort: &'a CancellationToken,
}

impl RecordingLoop<'_> {
    /// Record until the stop policy fires or the operator aborts.
    ///
    /// The stop condition is checked before every frame grab, and the grab itself
    /// paces the loop at the camera's frame rate.
    pub fn run(
        &self,
        frames: &mut dyn FrameSource,
        video: &mut dyn FrameSink,
        mut preview: Option<&mut (dyn FrameSink + '_)>,
    ) -> RecordingReport {
        info!(
            "[REC] Recording started (minimum {:.0}s)",
            self.policy.min_run_time().as_secs_f64()
        );

        let start = Instant::now();
        let mut last_diagnostics = start;
        let mut frame_count = 0u64;
        let mut encode_errors = 0u64;
        let mut stop_announced = false;

        let reason = loop {
            let elapsed = start.elapsed();

            if self.abort.is_cancelled() {
                info!("[REC] Aborted by operator at {:.1}s", elapsed.as_secs_f64());
                break StopReason::Aborted;
            }

            let stop_received = self.stats.stop_received();
            if let Some(reason) = self.policy.evaluate(elapsed, stop_received) {
                match reason {
                    StopReason::StopSignal => {
                        info!("[REC] STOP honoured after {:.1}s", elapsed.as_secs_f64())
                    }
                    _ => info!(
                        "[REC] Minimum time ({:.0}s) reached, stopping",
                        self.policy.min_run_time().as_secs_f64()
                    ),
                }
                break reason;
            }
            if stop_received && !stop_announced {
                info!(
                    "[REC] STOP received at {:.1}s, holding until minimum time",
                    elapsed.as_secs_f64()
                );
                stop_announced = true;
            }

            match frames.next_frame() {
                Ok(mut frame) => {
                    let hud = self.hud.get();
                    draw_overlay(&mut frame, hud.as_ref(), None);
                    match video.write_frame(&frame) {
                        Ok(()) => frame_count += 1,
                        Err(e) => {
                            encode_errors += 1;
                            warn!("[REC] Frame not encoded: {}", e);
                        }
                    }
                    if let Some(sink) = preview.as_deref_mut() {
                        if let Err(e) = sink.write_frame(&frame) {
                            warn!("[REC] Preview failed: {}", e);
                        }
                    }
                }
                Err(e) => {
                    warn!("[REC] Frame error: {}", e);
                    std::thread::sleep(FRAME_ERROR_BACKOFF);
                }
            }

            if last_diagnostics.elapsed() >= self.diagnostics_every {
                info!(
                    "{}",
                    diagnostics_line(
                        start.elapsed(),
                        self.stats,
                        frame_count,
                        self.buffer.size(),
                        self.hud.time_offset()
                    )
                );
                last_diagnostics = Instant::now();
            }
        };

        RecordingReport {
            frames: frame_count,
            elapsed_secs: start.elapsed().as_secs_f64(),
            reason,
            encode_errors,
        }
    }
}

/// Periodic one-line status
pub fn diagnostics_line(
    elapsed: Duration,
    stats: &RunStatistics,
    frames: u64,
    buffered: usize,
    offset: f64,
) -> String {
    format!(
        "[REC] [{:.1}s] DATA: {} | HUD: {} | Video: {} frames | Buffer: {} | Offset: {:.3}s",
        elapsed.as_secs_f64(),
        stats.samples_received(),
        stats.hud_received(),
        frames,
        buffered,
        offset
    )
}
