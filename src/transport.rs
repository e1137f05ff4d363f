use crate::error::{RecorderError, Result};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use log::info;
use serialport::SerialPort;
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

/// Line-oriented byte stream from the flight controller
pub trait LineSource: Send {
    /// Next complete line without its terminator, or `Ok(None)` when nothing
    /// complete arrived within the source's poll window.
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Frames any buffered reader into lines.
///
/// Bytes of an unfinished line survive read timeouts and are completed by a later
/// call. Invalid UTF-8 is replaced rather than rejected.
pub struct ReaderLineSource<R> {
    reader: R,
    pending: Vec<u8>,
}

impl<R: BufRead + Send> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        ReaderLineSource {
            reader,
            pending: Vec::with_capacity(128),
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.pending.clear();
        line
    }
}

impl<R: BufRead + Send> LineSource for ReaderLineSource<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(_) if self.pending.last() == Some(&b'\n') => Ok(Some(self.take_line())),
            // EOF or a partial line: keep what we have
            Ok(_) => Ok(None),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

pub type SerialLineSource = ReaderLineSource<BufReader<Box<dyn SerialPort>>>;

/// Open the flight controller's serial port at a fixed baud rate.
///
/// `read_timeout` bounds every read so the ingestion loop can observe shutdown.
pub fn open_serial(path: &str, baud: u32, read_timeout: Duration) -> Result<SerialLineSource> {
    let port = serialport::new(path, baud)
        .timeout(read_timeout)
        .open()
        .map_err(|e| RecorderError::Transport(format!("{}: {}", path, e)))?;
    info!("[SERIAL] Connected to {} @ {} baud", path, baud);
    Ok(ReaderLineSource::new(BufReader::new(port)))
}

/// Lines delivered over an in-process channel (simulator, tests)
pub struct ChannelLineSource {
    rx: Receiver<String>,
    poll: Duration,
}

impl ChannelLineSource {
    pub fn new(rx: Receiver<String>, poll: Duration) -> Self {
        ChannelLineSource { rx, poll }
    }
}

impl LineSource for ChannelLineSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.rx.recv_timeout(self.poll) {
            Ok(line) => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                // Sender is gone; behave like an idle link
                std::thread::sleep(self.poll);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::io::{Cursor, Read};

    #[test]
    fn test_reader_source_splits_lines() {
        let data = b"DATA,1,2,3,4,5,6\r\nSTOP\nHUD|a|b|c|d|e\n".to_vec();
        let mut source = ReaderLineSource::new(Cursor::new(data));

        assert_eq!(source.read_line().unwrap().as_deref(), Some("DATA,1,2,3,4,5,6"));
        assert_eq!(source.read_line().unwrap().as_deref(), Some("STOP"));
        assert_eq!(source.read_line().unwrap().as_deref(), Some("HUD|a|b|c|d|e"));
        assert_eq!(source.read_line().unwrap(), None);
    }

    /// Yields its chunks one per read, timing out in between
    struct ChunkedReader {
        chunks: Vec<Vec<u8>>,
        next: usize,
        timed_out: bool,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.timed_out {
                self.timed_out = true;
                return Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"));
            }
            self.timed_out = false;
            match self.chunks.get(self.next) {
                Some(chunk) => {
                    self.next += 1;
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let reader = ChunkedReader {
            chunks: vec![b"DATA,1,2".to_vec(), b",3,4,5,6\nST".to_vec(), b"OP\n".to_vec()],
            next: 0,
            timed_out: false,
        };
        let mut source = ReaderLineSource::new(BufReader::new(reader));

        let mut lines = Vec::new();
        for _ in 0..20 {
            if let Some(line) = source.read_line().unwrap() {
                lines.push(line);
            }
        }
        assert_eq!(lines, vec!["DATA,1,2,3,4,5,6", "STOP"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut source = ReaderLineSource::new(Cursor::new(b"ST\xffOP\n".to_vec()));
        let line = source.read_line().unwrap().unwrap();
        assert!(line.starts_with("ST"));
        assert!(line.ends_with("OP"));
    }

    #[test]
    fn test_channel_source() {
        let (tx, rx) = unbounded();
        let mut source = ChannelLineSource::new(rx, Duration::from_millis(5));

        tx.send("STOP\n".to_string()).unwrap();
        assert_eq!(source.read_line().unwrap().as_deref(), Some("STOP"));
        assert_eq!(source.read_line().unwrap(), None);

        drop(tx);
        assert_eq!(source.read_line().unwrap(), None);
    }
}
