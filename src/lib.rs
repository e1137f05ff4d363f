//! Onboard flight recorder: ingests telemetry from the flight controller's serial
//! link, waits for takeoff, then records camera video with a HUD overlay while
//! the telemetry samples are persisted to removable storage.

pub mod buffer;
pub mod capture;
pub mod config;
pub mod error;
pub mod gate;
pub mod hud;
pub mod ingest;
pub mod overlay;
pub mod persistence;
pub mod preview;
pub mod protocol;
pub mod recording;
pub mod session;
pub mod simulator;
pub mod stats;
pub mod storage;
pub mod summary;
pub mod transport;
pub mod video;

pub use config::RecorderConfig;
pub use error::{RecorderError, Result};
pub use session::{Devices, Session};
pub use summary::RunSummary;
