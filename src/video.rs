use crate::error::{RecorderError, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Consumer of composited frames (video encoder, preview)
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close. Called once at shutdown; the default has nothing to close.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Encoder element and matching parser ahead of `mp4mux`, in order of preference
const ENCODERS: [(&str, &str); 2] = [("avenc_mpeg4", "mpeg4videoparse"), ("x264enc", "h264parse")];

/// Presentation time of frame `index` at a fixed rate
pub fn frame_pts(index: u64, fps: u32) -> gst::ClockTime {
    gst::ClockTime::from_nseconds(index * 1_000_000_000 / fps.max(1) as u64)
}

fn make_element(name: &str) -> Result<gst::Element> {
    gst::ElementFactory::make(name)
        .build()
        .map_err(|e| RecorderError::Encoder(format!("failed to create {}: {}", name, e)))
}

/// MP4 writer built on a GStreamer pipeline:
/// appsrc (RGB) -> videoconvert -> encoder -> parser -> mp4mux -> filesink.
///
/// Resolution and frame rate are fixed at open time; frames of another size are
/// scaled to fit.
pub struct GstEncoder {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    width: u32,
    height: u32,
    fps: u32,
    path: PathBuf,
    frames: u64,
    finished: bool,
}

impl GstEncoder {
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        gst::init().map_err(|e| RecorderError::Encoder(format!("GStreamer init failed: {}", e)))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gst::Fraction::new(fps as i32, 1))
            .build();
        let appsrc = gst_app::AppSrc::builder()
            .name("frames")
            .caps(&caps)
            .format(gst::Format::Time)
            .is_live(false)
            .build();

        let convert = make_element("videoconvert")?;
        let (codec, encoder, parser) = ENCODERS
            .iter()
            .find_map(|&(encoder, parser)| {
                let enc = gst::ElementFactory::make(encoder).build().ok()?;
                let parse = gst::ElementFactory::make(parser).build().ok()?;
                Some((encoder, enc, parse))
            })
            .ok_or_else(|| {
                RecorderError::Encoder("no MPEG-4 or H.264 encoder plugin available".to_string())
            })?;
        let muxer = make_element("mp4mux")?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().to_string())
            .build()
            .map_err(|e| RecorderError::Encoder(format!("failed to create filesink: {}", e)))?;

        let pipeline = gst::Pipeline::new();
        let elements = [
            appsrc.upcast_ref::<gst::Element>(),
            &convert,
            &encoder,
            &parser,
            &muxer,
            &filesink,
        ];
        pipeline
            .add_many(elements)
            .map_err(|e| RecorderError::Encoder(format!("failed to add elements: {}", e)))?;
        gst::Element::link_many(elements)
            .map_err(|e| RecorderError::Encoder(format!("failed to link elements: {}", e)))?;

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(RecorderError::Encoder(format!("pipeline did not start: {}", e)));
        }

        info!(
            "[REC] Video: {} ({}x{} @ {} fps, {})",
            path.display(),
            width,
            height,
            fps,
            codec
        );
        Ok(Self {
            pipeline,
            appsrc,
            width,
            height,
            fps,
            path: path.to_path_buf(),
            frames: 0,
            finished: false,
        })
    }
}

impl FrameSink for GstEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(RecorderError::Encoder("encoder already closed".to_string()));
        }

        let data = if frame.dimensions() == (self.width, self.height) {
            frame.as_raw().clone()
        } else {
            imageops::resize(frame, self.width, self.height, FilterType::Triangle).into_raw()
        };

        let mut buffer = gst::Buffer::from_mut_slice(data);
        if let Some(meta) = buffer.get_mut() {
            meta.set_pts(frame_pts(self.frames, self.fps));
            meta.set_duration(frame_pts(1, self.fps));
        }
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| RecorderError::Encoder(format!("frame push failed: {:?}", e)))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // EOS makes mp4mux write the moov atom
        if let Err(e) = self.appsrc.end_of_stream() {
            warn!("[REC] Failed to send EOS: {:?}", e);
        }

        let mut failure = None;
        if let Some(bus) = self.pipeline.bus() {
            for msg in bus.iter_timed(gst::ClockTime::from_seconds(5)) {
                match msg.view() {
                    gst::MessageView::Eos(..) => break,
                    gst::MessageView::Error(err) => {
                        failure = Some(format!("{} ({:?})", err.error(), err.debug()));
                        break;
                    }
                    _ => {}
                }
            }
        }
        let _ = self.pipeline.set_state(gst::State::Null);

        if let Some(failure) = failure {
            return Err(RecorderError::Encoder(format!(
                "{} while closing {}",
                failure,
                self.path.display()
            )));
        }
        info!("[REC] Video closed: {} frames", self.frames);
        Ok(())
    }
}

impl Drop for GstEncoder {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finish() {
                warn!("[REC] {}", e);
            }
        }
    }
}
