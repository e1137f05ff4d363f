use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::unbounded;
use flight_recorder_rs::capture::{FrameSource, NokhwaCapture, SyntheticCamera};
use flight_recorder_rs::preview::SnapshotPreview;
use flight_recorder_rs::session::VideoFactory;
use flight_recorder_rs::simulator::SimulatedFlight;
use flight_recorder_rs::summary::ts_now;
use flight_recorder_rs::transport::{open_serial, ChannelLineSource, LineSource};
use flight_recorder_rs::video::{FrameSink, GstEncoder};
use flight_recorder_rs::{Devices, RecorderConfig, Session};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "flight_recorder")]
#[command(about = "Onboard flight data and HUD video recorder", long_about = None)]
struct Args {
    /// Serial port of the flight controller
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    #[arg(long, default_value = "115200")]
    baud: u32,

    /// Mount point of the storage medium
    #[arg(long, default_value = "/media/aerochico/AERO")]
    storage_dir: PathBuf,

    #[arg(long, default_value = "flight_data.txt")]
    data_file: String,

    #[arg(long, default_value = "flight_overlay_video.mp4")]
    video_file: String,

    /// V4L2 camera device
    #[arg(long, default_value = "/dev/video0")]
    camera: String,

    #[arg(long, default_value = "640")]
    width: u32,

    #[arg(long, default_value = "480")]
    height: u32,

    #[arg(long, default_value = "30")]
    fps: u32,

    /// Minimum recording time in seconds; STOP is ignored until it has passed
    #[arg(long, default_value = "45")]
    min_time: f64,

    /// Data file write interval in milliseconds
    #[arg(long, default_value = "100")]
    write_interval_ms: u64,

    /// Seconds to wait for takeoff (Z > 0) before giving up
    #[arg(long, default_value = "120")]
    takeoff_timeout: f64,

    /// Seconds between diagnostics lines
    #[arg(long, default_value = "5")]
    diagnostics: f64,

    /// Pause in milliseconds when the serial link has nothing to read
    #[arg(long, default_value = "1")]
    serial_idle_ms: u64,

    #[arg(long, default_value = "100")]
    serial_timeout_ms: u64,

    /// Use a simulated flight controller and a synthetic camera
    #[arg(long)]
    simulate: bool,

    /// Simulated flight time before STOP is sent
    #[arg(long, default_value = "20")]
    sim_stop_after: f64,

    /// Keep a PNG snapshot of the composited frame at this path
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Seconds between preview snapshots
    #[arg(long, default_value = "1")]
    preview_every: f64,
}

impl Args {
    fn to_config(&self) -> RecorderConfig {
        RecorderConfig {
            serial_port: self.port.clone(),
            baud: self.baud,
            storage_dir: self.storage_dir.clone(),
            data_file: self.data_file.clone(),
            video_file: self.video_file.clone(),
            camera_device: self.camera.clone(),
            width: self.width,
            height: self.height,
            fps: self.fps,
            min_run_secs: self.min_time,
            write_interval_ms: self.write_interval_ms,
            takeoff_timeout_secs: self.takeoff_timeout,
            diagnostics_secs: self.diagnostics,
            serial_idle_ms: self.serial_idle_ms,
            serial_timeout_ms: self.serial_timeout_ms,
            preview: self.preview.clone(),
            preview_every_secs: self.preview_every,
            ..RecorderConfig::default()
        }
    }
}

fn open_devices(args: &Args, config: &RecorderConfig, abort: &CancellationToken) -> Result<Devices> {
    let (lines, frames): (Box<dyn LineSource>, Box<dyn FrameSource>) = if args.simulate {
        info!("Dry run: simulated flight controller and synthetic camera");
        let (tx, rx) = unbounded();
        let sim = SimulatedFlight {
            stop_after: Some(Duration::try_from_secs_f64(args.sim_stop_after.max(0.0))
                .context("invalid --sim-stop-after")?),
            ..SimulatedFlight::default()
        };
        // The thread exits on its own once the session drops the receiver
        sim.spawn(tx, abort.child_token());
        (
            Box::new(ChannelLineSource::new(rx, config.serial_timeout())),
            Box::new(SyntheticCamera::new(config.width, config.height, config.fps)),
        )
    } else {
        let serial = open_serial(&config.serial_port, config.baud, config.serial_timeout())
            .with_context(|| format!("cannot open serial port {}", config.serial_port))?;
        let camera = NokhwaCapture::open(
            &config.camera_device,
            config.width,
            config.height,
            config.fps,
        )
        .with_context(|| format!("cannot open camera {}", config.camera_device))?;
        (Box::new(serial), Box::new(camera))
    };

    let open_video: VideoFactory = Box::new(|config: &RecorderConfig| {
        let encoder =
            GstEncoder::create(&config.video_path(), config.width, config.height, config.fps)?;
        Ok(Box::new(encoder) as Box<dyn FrameSink>)
    });

    let preview = config.preview.as_ref().map(|path| {
        info!("Preview snapshots: {}", path.display());
        Box::new(SnapshotPreview::new(path.clone(), config.preview_every())) as Box<dyn FrameSink>
    });

    Ok(Devices {
        lines,
        frames,
        open_video,
        preview,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("[{}] Flight Recorder Starting", ts_now());
    println!("  Serial: {} @ {} baud", args.port, args.baud);
    println!("  Storage: {}", args.storage_dir.display());
    println!("  Video: {}x{} @ {} fps", args.width, args.height, args.fps);
    println!("  Minimum time: {}s", args.min_time);

    let session = Session::prepare(args.to_config())?;

    let abort = CancellationToken::new();
    {
        let abort = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted by operator");
                abort.cancel();
            }
        });
    }

    let devices = open_devices(&args, session.config(), &abort)?;
    let summary = session.run(devices, abort).await?;

    if summary.recording.is_some() {
        print!("{}", summary.render());
    } else {
        println!("[{}] Recording cancelled (no takeoff)", ts_now());
    }
    Ok(())
}
