use crate::error::{RecorderError, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use log::{info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Blocking frame producer. Each call waits for the device's next frame, which
/// makes the device frame rate the pacing clock of whoever loops over it.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<RgbImage>;
}

/// `/dev/videoN` or a bare index selects a numbered device, anything else is
/// passed to the backend as a device name.
pub fn camera_index(device: &str) -> CameraIndex {
    let digits = device.trim_start_matches("/dev/video");
    match digits.parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(device.to_string()),
    }
}

/// V4L2 camera driven by `nokhwa` on a dedicated capture thread.
///
/// The camera handle is created, used and dropped on that thread only; frames
/// reach the consumer through a short channel.
pub struct NokhwaCapture {
    frames: Receiver<Result<RgbImage>>,
    running: Arc<AtomicBool>,
}

impl NokhwaCapture {
    pub fn open(device: &str, width: u32, height: u32, fps: u32) -> Result<Self> {
        let index = camera_index(device);
        let (ready_tx, ready_rx) = bounded::<Result<String>>(1);
        let (frame_tx, frame_rx) = bounded(2);
        let running = Arc::new(AtomicBool::new(true));

        {
            let running = running.clone();
            thread::Builder::new()
                .name("camera".to_string())
                .spawn(move || capture_thread(index, width, height, fps, ready_tx, frame_tx, running))
                .map_err(|e| RecorderError::Capture(format!("failed to start capture thread: {}", e)))?;
        }

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                info!("[CAM] Capturing {} ({})", device, format);
                Ok(Self {
                    frames: frame_rx,
                    running,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RecorderError::Capture(
                "capture thread exited during setup".to_string(),
            )),
        }
    }
}

fn open_camera(index: CameraIndex, width: u32, height: u32, fps: u32) -> Result<Camera> {
    let wanted = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));
    let mut camera = Camera::new(index, requested)
        .map_err(|e| RecorderError::Capture(format!("failed to create camera: {}", e)))?;
    camera
        .open_stream()
        .map_err(|e| RecorderError::Capture(format!("failed to open stream: {}", e)))?;
    Ok(camera)
}

fn grab_frame(camera: &mut Camera, width: u32, height: u32) -> Result<RgbImage> {
    let buffer = camera
        .frame()
        .map_err(|e| RecorderError::Capture(format!("frame read failed: {}", e)))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| RecorderError::Capture(format!("frame decode failed: {}", e)))?;
    let (w, h) = (decoded.width(), decoded.height());
    let frame = RgbImage::from_raw(w, h, decoded.into_raw())
        .ok_or_else(|| RecorderError::Capture("short frame".to_string()))?;
    if (w, h) == (width, height) {
        Ok(frame)
    } else {
        Ok(imageops::resize(&frame, width, height, FilterType::Triangle))
    }
}

fn capture_thread(
    index: CameraIndex,
    width: u32,
    height: u32,
    fps: u32,
    ready: Sender<Result<String>>,
    frames: Sender<Result<RgbImage>>,
    running: Arc<AtomicBool>,
) {
    let mut camera = match open_camera(index, width, height, fps) {
        Ok(camera) => {
            let format = format!("{} / {}", camera.info().human_name(), camera.camera_format());
            if ready.send(Ok(format)).is_err() {
                return;
            }
            camera
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while running.load(Ordering::Acquire) {
        let frame = grab_frame(&mut camera, width, height);
        if frames.send(frame).is_err() {
            break;
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!("[CAM] Failed to stop stream: {}", e);
    }
    info!("[CAM] Capture stopped");
}

impl FrameSource for NokhwaCapture {
    fn next_frame(&mut self) -> Result<RgbImage> {
        self.frames
            .recv()
            .map_err(|_| RecorderError::Capture("capture thread stopped".to_string()))?
    }
}

impl Drop for NokhwaCapture {
    fn drop(&mut self) {
        // The thread also exits on its next send once the receiver is gone
        self.running.store(false, Ordering::Release);
    }
}

/// Generated frames delivered at a fixed rate (dry runs without a camera)
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_interval: Duration,
    next_due: Instant,
    frame_index: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        SyntheticCamera {
            width,
            height,
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            next_due: Instant::now(),
            frame_index: 0,
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self) -> Result<RgbImage> {
        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
        // No catch-up burst after a stall
        self.next_due = self.next_due.max(now) + self.frame_interval;

        // Sky over ground, horizon drifting slowly with the frame count
        let drift = (self.frame_index % 120) as i64 - 60;
        let horizon = (self.height as i64 / 2 + drift / 4).max(0) as u32;
        let frame = RgbImage::from_fn(self.width, self.height, |_, y| {
            if y < horizon {
                Rgb([70, 110, 170])
            } else {
                Rgb([60, 80, 45])
            }
        });
        self.frame_index += 1;
        Ok(frame)
    }
}
