//! Decoder for the flight controller's line protocol.
//!
//! Three record kinds share the link:
//!
//! ```text
//! DATA,<t>,<x>,<y>,<z>,<theta>,<phi>
//! HUD|<time>|<alt>|<vel>|<gz>|<status>
//! STOP
//! ```
//!
//! Anything else, and any record that fails validation, decodes to
//! [`LineEvent::Unrecognized`]. Decoding never fails past this boundary.

use crate::hud::HudSnapshot;

const DATA_PREFIX: &str = "DATA";
const HUD_PREFIX: &str = "HUD";
const STOP_LITERAL: &str = "STOP";

/// Field delimiter used in the data file
pub const RECORD_SEPARATOR: char = '\t';

/// Index of the vertical position (Z) inside a formatted record
const Z_FIELD: usize = 3;

/// One decoded `DATA` record.
///
/// The textual fields are kept exactly as received so the data file carries the
/// device's own formatting (device time is never reparsed on its way to disk).
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSample {
    fields: [String; 6],
    values: [f64; 6],
}

impl FlightSample {
    /// Build from six raw tokens; `None` unless every token parses as a number
    pub fn from_fields(tokens: &[&str]) -> Option<Self> {
        if tokens.len() != 6 {
            return None;
        }
        let mut fields: [String; 6] = Default::default();
        let mut values = [0.0f64; 6];
        for (i, token) in tokens.iter().enumerate() {
            let token = token.trim();
            values[i] = token.parse::<f64>().ok()?;
            fields[i] = token.to_string();
        }
        Some(FlightSample { fields, values })
    }

    /// Device-relative timestamp, as sent
    pub fn device_time(&self) -> &str {
        &self.fields[0]
    }

    pub fn z(&self) -> f64 {
        self.values[3]
    }

    /// Tab-separated line ready to be appended to the data file
    pub fn to_record(&self) -> String {
        self.fields.join("\t")
    }
}

/// Vertical position of a formatted record, if it has one that parses
pub fn record_altitude(record: &str) -> Option<f64> {
    record
        .split(RECORD_SEPARATOR)
        .nth(Z_FIELD)
        .and_then(|z| z.trim().parse::<f64>().ok())
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Data(FlightSample),
    Hud(HudSnapshot),
    Stop,
    Unrecognized,
}

/// Decode a single line from the link
pub fn parse_line(raw: &str) -> LineEvent {
    let line = raw.trim();

    if line.starts_with(DATA_PREFIX) {
        return parse_data(line);
    }
    if line.starts_with(HUD_PREFIX) {
        return parse_hud(line);
    }
    if line == STOP_LITERAL {
        return LineEvent::Stop;
    }

    LineEvent::Unrecognized
}

fn parse_data(line: &str) -> LineEvent {
    let payload = match line
        .strip_prefix(DATA_PREFIX)
        .and_then(|rest| rest.strip_prefix(','))
    {
        Some(payload) => payload,
        None => return LineEvent::Unrecognized,
    };

    let tokens: Vec<&str> = payload.split(',').collect();
    match FlightSample::from_fields(&tokens) {
        Some(sample) => LineEvent::Data(sample),
        None => LineEvent::Unrecognized,
    }
}

fn parse_hud(line: &str) -> LineEvent {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 6 || parts[0] != HUD_PREFIX {
        return LineEvent::Unrecognized;
    }

    LineEvent::Hud(HudSnapshot {
        time: parts[1].to_string(),
        altitude: parts[2].to_string(),
        velocity: parts[3].to_string(),
        g_z: parts[4].to_string(),
        status: parts[5].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_record() {
        match parse_line("DATA,1.0,2.0,3.0,4.0,5.0,6.0") {
            LineEvent::Data(sample) => {
                assert_eq!(sample.device_time(), "1.0");
                assert_eq!(sample.z(), 4.0);
                assert_eq!(sample.values, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
                assert_eq!(sample.to_record(), "1.0\t2.0\t3.0\t4.0\t5.0\t6.0");
            }
            other => panic!("expected DATA, got {:?}", other),
        }
    }

    #[test]
    fn test_data_record_with_bad_field_is_dropped() {
        assert_eq!(
            parse_line("DATA,1.0,2.0,bad,4.0,5.0,6.0"),
            LineEvent::Unrecognized
        );
    }

    #[test]
    fn test_data_record_wrong_field_count() {
        assert_eq!(parse_line("DATA,1.0,2.0,3.0,4.0,5.0"), LineEvent::Unrecognized);
        assert_eq!(
            parse_line("DATA,1.0,2.0,3.0,4.0,5.0,6.0,7.0"),
            LineEvent::Unrecognized
        );
        assert_eq!(parse_line("DATA"), LineEvent::Unrecognized);
    }

    #[test]
    fn test_data_record_keeps_device_formatting() {
        match parse_line("DATA,000012.340,-1,2e1,0.50,10,-3.25\r\n") {
            LineEvent::Data(sample) => {
                assert_eq!(sample.to_record(), "000012.340\t-1\t2e1\t0.50\t10\t-3.25");
                assert_eq!(sample.values[2], 20.0);
            }
            other => panic!("expected DATA, got {:?}", other),
        }
    }

    #[test]
    fn test_hud_record() {
        match parse_line("HUD|00:01:02|120|30|1.2|OK") {
            LineEvent::Hud(hud) => {
                assert_eq!(hud.time, "00:01:02");
                assert_eq!(hud.altitude, "120");
                assert_eq!(hud.velocity, "30");
                assert_eq!(hud.g_z, "1.2");
                assert_eq!(hud.status, "OK");
            }
            other => panic!("expected HUD, got {:?}", other),
        }
    }

    #[test]
    fn test_short_hud_record_is_dropped() {
        assert_eq!(parse_line("HUD|00:01:02|120|30|1.2"), LineEvent::Unrecognized);
    }

    #[test]
    fn test_hud_record_with_extra_fields() {
        match parse_line("HUD|00:01:02|120|30|1.2|CLIMB|extra") {
            LineEvent::Hud(hud) => assert_eq!(hud.status, "CLIMB"),
            other => panic!("expected HUD, got {:?}", other),
        }
    }

    #[test]
    fn test_stop_record() {
        assert_eq!(parse_line("STOP"), LineEvent::Stop);
        assert_eq!(parse_line("STOP "), LineEvent::Stop);
        assert_eq!(parse_line("STOP\r\n"), LineEvent::Stop);
        assert_eq!(parse_line("STOPPED"), LineEvent::Unrecognized);
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!(parse_line(""), LineEvent::Unrecognized);
        assert_eq!(parse_line("hello"), LineEvent::Unrecognized);
        assert_eq!(parse_line("GPS,1,2,3"), LineEvent::Unrecognized);
    }

    #[test]
    fn test_record_altitude() {
        assert_eq!(record_altitude("1.0\t2.0\t3.0\t4.5\t5.0\t6.0"), Some(4.5));
        assert_eq!(record_altitude("1.0\t2.0\t3.0"), None);
        assert_eq!(record_altitude("1.0\t2.0\t3.0\tnan?\t5.0\t6.0"), None);
    }
}
