use crossbeam::channel::Sender;
use log::info;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Stand-in flight controller for dry runs: sits on the ground, then climbs,
/// emitting the same line grammar as the real link.
#[derive(Debug, Clone)]
pub struct SimulatedFlight {
    /// DATA records per second
    pub data_hz: u32,
    /// One HUD record every this many DATA records
    pub hud_every: u64,
    /// Seconds spent at Z = 0 before liftoff
    pub ground_secs: f64,
    /// Vertical speed after liftoff, m/s
    pub climb_rate: f64,
    /// Send `STOP` once this much flight time has passed
    pub stop_after: Option<Duration>,
}

impl Default for SimulatedFlight {
    fn default() -> Self {
        SimulatedFlight {
            data_hz: 50,
            hud_every: 5,
            ground_secs: 2.0,
            climb_rate: 3.0,
            stop_after: Some(Duration::from_secs(20)),
        }
    }
}

impl SimulatedFlight {
    fn tick_secs(&self, tick: u64) -> f64 {
        tick as f64 / self.data_hz.max(1) as f64
    }

    fn stop_tick(&self) -> Option<u64> {
        self.stop_after
            .map(|d| (d.as_secs_f64() * self.data_hz.max(1) as f64).round() as u64)
    }

    /// Lines emitted at `tick`
    pub fn lines_at(&self, tick: u64) -> Vec<String> {
        let t = self.tick_secs(tick);
        let airborne = t >= self.ground_secs;
        let z = if airborne {
            (t - self.ground_secs) * self.climb_rate
        } else {
            0.0
        };
        let speed = if airborne { 14.0 + (t * 0.3).sin() } else { 0.0 };
        let x = if airborne { (t - self.ground_secs) * 14.0 } else { 0.0 };
        let y = (t * 0.2).sin() * 2.0;
        let theta = if airborne { 8.0 + (t * 0.7).sin() } else { 0.0 };
        let phi = (t * 0.5).sin() * 5.0;

        let mut lines = vec![format!(
            "DATA,{:.3},{:.2},{:.2},{:.2},{:.2},{:.2}",
            t, x, y, z, theta, phi
        )];

        if tick % self.hud_every.max(1) == 0 {
            let secs = t as u64;
            let g_z = 1.0 + if airborne { (t * 1.3).sin() * 0.15 } else { 0.0 };
            lines.push(format!(
                "HUD|{:02}:{:02}:{:02}|{:.1}|{:.1}|{:.2}|{}",
                secs / 3600,
                (secs / 60) % 60,
                secs % 60,
                z,
                speed,
                g_z,
                if airborne { "CLIMB" } else { "GROUND" }
            ));
        }

        // Link noise now and then
        if tick % 250 == 249 {
            lines.push(format!("DATA,{:.3},{:.2}", t, x));
        }

        if self.stop_tick() == Some(tick) {
            lines.push("STOP".to_string());
        }

        lines
    }

    /// Emit lines in real time on a background thread until `stop` is cancelled
    /// or the receiving side goes away.
    pub fn spawn(self, tx: Sender<String>, stop: CancellationToken) -> JoinHandle<()> {
        thread::spawn(move || {
            info!("[SIM] Simulated flight controller running at {} Hz", self.data_hz);
            let period = Duration::from_secs_f64(1.0 / self.data_hz.max(1) as f64);
            let mut next_due = Instant::now();
            let mut tick = 0u64;

            while !stop.is_cancelled() {
                for line in self.lines_at(tick) {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
                tick += 1;

                next_due += period;
                let now = Instant::now();
                if next_due > now {
                    thread::sleep(next_due - now);
                }
            }
            info!("[SIM] Simulated flight controller stopped after {} ticks", tick);
        })
    }
}
