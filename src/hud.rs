use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Latest overlay values as sent by the flight controller.
///
/// Fields stay textual: they are only ever drawn, never computed with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HudSnapshot {
    pub time: String,
    pub altitude: String,
    pub velocity: String,
    pub g_z: String,
    pub status: String,
}

#[derive(Default)]
struct HudState {
    snapshot: Option<HudSnapshot>,
    device_time: Option<f64>,
    local_time: Option<f64>,
}

/// Thread-safe latest-value cache for the HUD plus device/host clock tracking
pub struct HudStore {
    state: Mutex<HudState>,
}

impl HudStore {
    pub fn new() -> Self {
        HudStore {
            state: Mutex::new(HudState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HudState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the snapshot, stamping clock sync with the current wall clock
    pub fn update(&self, snapshot: HudSnapshot) {
        self.update_at(snapshot, wall_clock_secs());
    }

    /// Replace the snapshot wholesale. If its time field is `HH:MM:SS`, the pair
    /// (device time, `local_time`) becomes the new clock sync point; otherwise the
    /// previous sync point is kept.
    pub fn update_at(&self, snapshot: HudSnapshot, local_time: f64) {
        let device_time = parse_device_time(&snapshot.time);
        let mut state = self.lock();
        state.snapshot = Some(snapshot);
        if let Some(device_time) = device_time {
            state.device_time = Some(device_time);
            state.local_time = Some(local_time);
        }
    }

    /// Independent copy of the current snapshot, `None` before the first HUD record
    pub fn get(&self) -> Option<HudSnapshot> {
        self.lock().snapshot.clone()
    }

    /// Local time minus device time in seconds, 0 until the first sync
    pub fn time_offset(&self) -> f64 {
        let state = self.lock();
        match (state.local_time, state.device_time) {
            (Some(local), Some(device)) => local - device,
            _ => 0.0,
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.lock().device_time.is_some()
    }
}

impl Default for HudStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds represented by a `HH:MM:SS` string (seconds may be fractional)
pub fn parse_device_time(time: &str) -> Option<f64> {
    let parts: Vec<&str> = time.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let h: f64 = parts[0].parse().ok()?;
    let m: f64 = parts[1].parse().ok()?;
    let s: f64 = parts[2].parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Host wall clock as fractional seconds since the Unix epoch
pub fn wall_clock_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn snapshot(time: &str) -> HudSnapshot {
        HudSnapshot {
            time: time.to_string(),
            altitude: "120".to_string(),
            velocity: "30".to_string(),
            g_z: "1.2".to_string(),
            status: "OK".to_string(),
        }
    }

    #[test]
    fn test_empty_store() {
        let store = HudStore::new();
        assert!(store.get().is_none());
        assert_eq!(store.time_offset(), 0.0);
        assert!(!store.is_synchronized());
    }

    #[test]
    fn test_offset_from_device_time() {
        let store = HudStore::new();
        let captured_at = 1_700_000_000.25;
        store.update_at(snapshot("00:01:30"), captured_at);

        assert_abs_diff_eq!(store.time_offset(), captured_at - 90.0, epsilon = 1e-6);
        assert!(store.is_synchronized());
    }

    #[test]
    fn test_offset_with_wall_clock() {
        let store = HudStore::new();
        let before = wall_clock_secs();
        store.update(snapshot("00:01:30"));
        let after = wall_clock_secs();

        let offset = store.time_offset();
        assert!(offset >= before - 90.0 - 1e-3);
        assert!(offset <= after - 90.0 + 1e-3);
    }

    #[test]
    fn test_malformed_time_keeps_offset_but_replaces_snapshot() {
        let store = HudStore::new();
        store.update_at(snapshot("01:00:00"), 10_000.0);
        assert_abs_diff_eq!(store.time_offset(), 6_400.0, epsilon = 1e-9);

        let mut garbled = snapshot("1:00");
        garbled.status = "CLIMB".to_string();
        store.update_at(garbled, 20_000.0);

        assert_abs_diff_eq!(store.time_offset(), 6_400.0, epsilon = 1e-9);
        let current = store.get().unwrap();
        assert_eq!(current.time, "1:00");
        assert_eq!(current.status, "CLIMB");
    }

    #[test]
    fn test_get_returns_copy() {
        let store = HudStore::new();
        store.update_at(snapshot("00:00:01"), 1.0);

        let mut copy = store.get().unwrap();
        copy.altitude = "999".to_string();
        assert_eq!(store.get().unwrap().altitude, "120");
    }

    #[test]
    fn test_parse_device_time() {
        assert_eq!(parse_device_time("00:01:02"), Some(62.0));
        assert_eq!(parse_device_time("10:00:00.5"), Some(36_000.5));
        assert_eq!(parse_device_time("01:02"), None);
        assert_eq!(parse_device_time("aa:bb:cc"), None);
        assert_eq!(parse_device_time(""), None);
    }
}
