use crate::buffer::SampleBuffer;
use crate::hud::HudStore;
use crate::protocol::{parse_line, LineEvent};
use crate::stats::RunStatistics;
use crate::transport::LineSource;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pause after a transport error before reading again
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Shared sinks the ingestion stage feeds
#[derive(Clone)]
pub struct IngestTargets {
    pub buffer: Arc<SampleBuffer>,
    pub hud: Arc<HudStore>,
    pub stats: Arc<RunStatistics>,
}

/// Route one decoded event into the shared state
pub fn dispatch(event: LineEvent, targets: &IngestTargets) {
    match event {
        LineEvent::Data(sample) => {
            if targets.stats.samples_received() == 0 {
                info!(
                    "[SERIAL] First DATA sample (t = {}, Z = {:.2} m)",
                    sample.device_time(),
                    sample.z()
                );
            }
            targets.buffer.add(sample.to_record());
            targets.stats.record_sample();
        }
        LineEvent::Hud(snapshot) => {
            let was_synchronized = targets.hud.is_synchronized();
            targets.hud.update(snapshot);
            targets.stats.record_hud();
            if !was_synchronized && targets.hud.is_synchronized() {
                info!(
                    "[SERIAL] HUD clock synchronized (offset {:.3}s)",
                    targets.hud.time_offset()
                );
            }
        }
        LineEvent::Stop => {
            if !targets.stats.stop_received() {
                info!("[SERIAL] STOP received from flight controller");
            }
            targets.stats.mark_stop_received();
        }
        LineEvent::Unrecognized => targets.stats.record_discarded(),
    }
}

/// Serial read loop. Runs until `stop` is cancelled; a `STOP` record only raises
/// the flag in [`RunStatistics`], it does not end this loop.
///
/// `idle` is the pause taken when the source had nothing to deliver. Transport
/// errors are logged and retried, never fatal.
pub fn run_ingestion<S: LineSource + ?Sized>(
    source: &mut S,
    targets: IngestTargets,
    stop: CancellationToken,
    idle: Duration,
) {
    info!("[SERIAL] Ingestion started");

    while !stop.is_cancelled() {
        match source.read_line() {
            Ok(Some(line)) => dispatch(parse_line(&line), &targets),
            Ok(None) => {
                if !idle.is_zero() {
                    std::thread::sleep(idle);
                }
            }
            Err(e) => {
                warn!("[SERIAL] Read error: {}", e);
                targets.stats.record_transport_error();
                std::thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    debug!(
        "[SERIAL] {} samples, {} HUD updates at shutdown",
        targets.stats.samples_received(),
        targets.stats.hud_received()
    );
    info!("[SERIAL] Ingestion stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::thread;

    fn targets() -> IngestTargets {
        IngestTargets {
            buffer: Arc::new(SampleBuffer::new()),
            hud: Arc::new(HudStore::new()),
            stats: Arc::new(RunStatistics::new()),
        }
    }

    /// Scripted source; cancels `stop` once the script is exhausted
    struct ScriptedSource {
        script: VecDeque<io::Result<Option<String>>>,
        stop: CancellationToken,
    }

    impl LineSource for ScriptedSource {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            match self.script.pop_front() {
                Some(item) => item,
                None => {
                    self.stop.cancel();
                    Ok(None)
                }
            }
        }
    }

    fn line(s: &str) -> io::Result<Option<String>> {
        Ok(Some(s.to_string()))
    }

    #[test]
    fn test_routes_events() {
        let targets = targets();
        let stop = CancellationToken::new();
        let mut source = ScriptedSource {
            script: VecDeque::from(vec![
                line("DATA,0.02,1,2,0,4,5"),
                Ok(None),
                line("HUD|00:00:10|12|3|1.0|ARMED"),
                line("DATA,0.04,1,2,bad,4,5"),
                Err(io::Error::new(io::ErrorKind::Other, "usb hiccup")),
                line("garbage"),
                line("DATA,0.06,1,2,0.5,4,5"),
                line("STOP"),
            ]),
            stop: stop.clone(),
        };

        run_ingestion(&mut source, targets.clone(), stop, Duration::ZERO);

        let stats = targets.stats.snapshot();
        assert_eq!(stats.samples_received, 2);
        assert_eq!(stats.hud_received, 1);
        assert_eq!(stats.lines_discarded, 2);
        assert_eq!(stats.transport_errors, 1);
        assert!(stats.stop_received);

        assert_eq!(
            targets.buffer.flush(),
            vec!["0.02\t1\t2\t0\t4\t5", "0.06\t1\t2\t0.5\t4\t5"]
        );
        assert_eq!(targets.hud.get().unwrap().status, "ARMED");
    }

    #[test]
    fn test_stop_record_does_not_end_loop() {
        let targets = targets();
        let stop = CancellationToken::new();
        let mut source = ScriptedSource {
            script: VecDeque::from(vec![line("STOP"), line("DATA,1,1,1,1,1,1")]),
            stop: stop.clone(),
        };

        run_ingestion(&mut source, targets.clone(), stop, Duration::ZERO);

        assert!(targets.stats.stop_received());
        assert_eq!(targets.buffer.size(), 1);
    }

    /// Never delivers anything
    struct SilentSource;

    impl LineSource for SilentSource {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn test_exits_on_external_stop() {
        let targets = targets();
        let stop = CancellationToken::new();
        let worker_stop = stop.clone();

        let handle = thread::spawn(move || {
            let mut source = SilentSource;
            run_ingestion(&mut source, targets, worker_stop, Duration::from_millis(1));
        });

        thread::sleep(Duration::from_millis(20));
        stop.cancel();
        handle.join().unwrap();
    }
}
