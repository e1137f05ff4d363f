use crate::buffer::SampleBuffer;
use crate::capture::FrameSource;
use crate::hud::{HudSnapshot, HudStore};
use crate::overlay::draw_overlay;
use crate::protocol::record_altitude;
use crate::stats::RunStatistics;
use crate::video::FrameSink;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Pause after a failed frame grab, the only sleep in the wait loop
const FRAME_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// Still on the ground
    Waiting,
    /// Vertical position went above zero; recording may start
    Satisfied,
    /// No takeoff before the ceiling elapsed
    TimedOut,
    /// Operator abort or shutdown while waiting
    Cancelled,
}

/// Pre-recording wait for liftoff
#[derive(Debug, Clone)]
pub struct TakeoffGate {
    timeout: Duration,
    state: GateState,
}

impl TakeoffGate {
    pub fn new(timeout: Duration) -> Self {
        TakeoffGate {
            timeout,
            state: GateState::Waiting,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Advance the state machine. Only `Waiting` transitions; every other state
    /// is terminal. Cancellation wins over a simultaneous takeoff.
    pub fn evaluate(
        &mut self,
        latest_altitude: Option<f64>,
        elapsed: Duration,
        cancelled: bool,
    ) -> GateState {
        if self.state != GateState::Waiting {
            return self.state;
        }

        self.state = if cancelled {
            GateState::Cancelled
        } else if latest_altitude.map_or(false, |z| z > 0.0) {
            GateState::Satisfied
        } else if elapsed > self.timeout {
            GateState::TimedOut
        } else {
            GateState::Waiting
        };
        self.state
    }
}

/// Shared state the gate observes
pub struct GateInputs<'a> {
    pub buffer: &'a SampleBuffer,
    pub hud: &'a HudStore,
    pub stats: &'a RunStatistics,
    pub abort: &'a CancellationToken,
    pub stop: &'a CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub state: GateState,
    pub altitude: Option<f64>,
    pub waited_secs: f64,
}

/// Status line shown while waiting
pub fn waiting_text(latest_altitude: Option<f64>, hud: Option<&HudSnapshot>) -> String {
    if let Some(z) = latest_altitude {
        return format!("AWAITING TAKEOFF (Z = {:.2} M)", z);
    }
    if let Some(alt) = hud.and_then(|h| h.altitude.trim().parse::<f64>().ok()) {
        return format!("AWAITING TAKEOFF (ALT HUD = {:.2} M)", alt);
    }
    "AWAITING TAKEOFF...".to_string()
}

/// Block until the gate leaves `Waiting`.
///
/// Every iteration grabs one frame; the capture call is the loop's only pacing.
/// With a preview sink, each frame is composited with the waiting overlay.
pub fn wait_for_takeoff(
    gate: &mut TakeoffGate,
    frames: &mut dyn FrameSource,
    mut preview: Option<&mut (dyn FrameSink + '_)>,
    inputs: &GateInputs<'_>,
) -> GateOutcome {
    info!("[GATE] Waiting for takeoff (Z > 0)...");
    let start = Instant::now();

    loop {
        match frames.next_frame() {
            Ok(mut frame) => {
                if let Some(sink) = preview.as_deref_mut() {
                    let hud = inputs.hud.get();
                    let z = inputs.buffer.peek_last().as_deref().and_then(record_altitude);
                    let text = waiting_text(z, hud.as_ref());
                    draw_overlay(&mut frame, hud.as_ref(), Some(&text));
                    if let Err(e) = sink.write_frame(&frame) {
                        warn!("[GATE] Preview failed: {}", e);
                    }
                }
            }
            Err(e) => {
                warn!("[GATE] Frame error while waiting: {}", e);
                std::thread::sleep(FRAME_ERROR_BACKOFF);
            }
        }

        let altitude = if inputs.stats.samples_received() > 0 {
            inputs.buffer.peek_last().as_deref().and_then(record_altitude)
        } else {
            None
        };
        let cancelled = inputs.abort.is_cancelled() || inputs.stop.is_cancelled();
        let elapsed = start.elapsed();

        let state = gate.evaluate(altitude, elapsed, cancelled);
        let outcome = GateOutcome {
            state,
            altitude,
            waited_secs: elapsed.as_secs_f64(),
        };
        match state {
            GateState::Waiting => continue,
            GateState::Satisfied => {
                info!(
                    "[GATE] Takeoff detected: Z = {:.2} m > 0 after {:.1}s",
                    altitude.unwrap_or_default(),
                    outcome.waited_secs
                );
            }
            GateState::TimedOut => {
                warn!(
                    "[GATE] Timeout: Z did not rise above 0 within {:.0}s",
                    gate.timeout.as_secs_f64()
                );
            }
            GateState::Cancelled => warn!("[GATE] Wait cancelled"),
        }
        return outcome;
    }
}
