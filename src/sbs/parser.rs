//! Parsing for BaseStation SBS-1 CSV lines.
//!
//! SBS format: MSG,<type>,<session_id>,<aircraft_id>,<hex_ident>,<flight_id>,
//!             <date_gen>,<time_gen>,<date_log>,<time_log>,<callsign>,<altitude>,
//!             <ground_speed>,<track>,<latitude>,<longitude>,<vertical_rate>,<squawk>,
//!             <alert>,<emergency>,<spi>,<is_on_ground>
//!
//! Every field after `message_type` and `hex_ident` may be empty. A non-empty
//! field is authoritative; callers merge these into an aggregate snapshot
//! rather than treating a single line as the full aircraft state.

use anyhow::{Context, Result, bail};

/// The declared field order of an SBS-1 line, used both for parsing and for
/// writing the CSV archive header in the same order.
pub const FIELD_NAMES: [&str; 22] = [
    "message_type",
    "transmission_type",
    "session_id",
    "aircraft_id",
    "hex_ident",
    "flight_id",
    "generated_date",
    "generated_time",
    "logged_date",
    "logged_time",
    "callsign",
    "altitude",
    "ground_speed",
    "track",
    "latitude",
    "longitude",
    "vertical_rate",
    "squawk",
    "alert",
    "emergency",
    "spi",
    "is_on_ground",
];

/// A single parsed SBS-1 line. Every field but `hex_ident` is optional because
/// each transmission type only carries a subset of the columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SbsMessage {
    pub transmission_type: Option<String>,
    pub session_id: Option<String>,
    pub aircraft_id: Option<String>,
    pub hex_ident: String,
    pub flight_id: Option<String>,
    pub generated_date: Option<String>,
    pub generated_time: Option<String>,
    pub logged_date: Option<String>,
    pub logged_time: Option<String>,
    pub callsign: Option<String>,
    pub altitude: Option<String>,
    pub ground_speed: Option<String>,
    pub track: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub vertical_rate: Option<String>,
    pub squawk: Option<String>,
    pub alert: Option<String>,
    pub emergency: Option<String>,
    pub spi: Option<String>,
    pub is_on_ground: Option<String>,
}

impl SbsMessage {
    /// Iterate over (field name, raw value) pairs in declared order, for CSV
    /// archiving and for generic field-wise merge into the aggregator.
    /// `hex_ident` is excluded: it's the aggregator's map key, not a merged
    /// field.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 20] {
        [
            ("transmission_type", self.transmission_type.as_deref()),
            ("session_id", self.session_id.as_deref()),
            ("aircraft_id", self.aircraft_id.as_deref()),
            ("flight_id", self.flight_id.as_deref()),
            ("generated_date", self.generated_date.as_deref()),
            ("generated_time", self.generated_time.as_deref()),
            ("logged_date", self.logged_date.as_deref()),
            ("logged_time", self.logged_time.as_deref()),
            ("callsign", self.callsign.as_deref()),
            ("altitude", self.altitude.as_deref()),
            ("ground_speed", self.ground_speed.as_deref()),
            ("track", self.track.as_deref()),
            ("latitude", self.latitude.as_deref()),
            ("longitude", self.longitude.as_deref()),
            ("vertical_rate", self.vertical_rate.as_deref()),
            ("squawk", self.squawk.as_deref()),
            ("alert", self.alert.as_deref()),
            ("emergency", self.emergency.as_deref()),
            ("spi", self.spi.as_deref()),
            ("is_on_ground", self.is_on_ground.as_deref()),
        ]
    }

    /// Parsed numeric latitude, if the field is present and well-formed.
    pub fn latitude_f64(&self) -> Option<f64> {
        self.latitude.as_deref().and_then(|s| s.parse().ok())
    }

    /// Parsed numeric longitude, if the field is present and well-formed.
    pub fn longitude_f64(&self) -> Option<f64> {
        self.longitude.as_deref().and_then(|s| s.parse().ok())
    }

    /// Render this message back out as a 22-field CSV row in declared order.
    pub fn to_row(&self) -> [String; 22] {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        [
            "MSG".to_string(),
            opt(&self.transmission_type),
            opt(&self.session_id),
            opt(&self.aircraft_id),
            self.hex_ident.clone(),
            opt(&self.flight_id),
            opt(&self.generated_date),
            opt(&self.generated_time),
            opt(&self.logged_date),
            opt(&self.logged_time),
            opt(&self.callsign),
            opt(&self.altitude),
            opt(&self.ground_speed),
            opt(&self.track),
            opt(&self.latitude),
            opt(&self.longitude),
            opt(&self.vertical_rate),
            opt(&self.squawk),
            opt(&self.alert),
            opt(&self.emergency),
            opt(&self.spi),
            opt(&self.is_on_ground),
        ]
    }
}

fn field(s: Option<&str>) -> Option<String> {
    s.filter(|v| !v.is_empty()).map(|v| v.to_string())
}

/// Parse one SBS-1 CSV line. The caller is expected to have already trimmed
/// the line and rejected anything not starting with `MSG`; this function
/// re-validates both conditions anyway since it may be fed lines directly in
/// tests.
pub fn parse_sbs_line(line: &str) -> Result<SbsMessage> {
    let fields: Vec<&str> = line.split(',').collect();

    if fields.len() < 22 {
        bail!(
            "SBS message must have 22 fields, got {}: '{}'",
            fields.len(),
            line
        );
    }

    if fields[0] != "MSG" {
        bail!("SBS message must start with MSG, got '{}'", fields[0]);
    }

    let hex_ident = fields[4].trim().to_uppercase();
    if hex_ident.is_empty() {
        bail!("hex_ident (field 5) is required");
    }

    Ok(SbsMessage {
        transmission_type: field(Some(fields[1])),
        session_id: field(Some(fields[2])),
        aircraft_id: field(Some(fields[3])),
        hex_ident,
        flight_id: field(Some(fields[5])),
        generated_date: field(Some(fields[6])),
        generated_time: field(Some(fields[7])),
        logged_date: field(Some(fields[8])),
        logged_time: field(Some(fields[9])),
        callsign: field(Some(fields[10])).map(|s| s.trim().to_string()),
        altitude: field(Some(fields[11])),
        ground_speed: field(Some(fields[12])),
        track: field(Some(fields[13])),
        latitude: field(Some(fields[14])),
        longitude: field(Some(fields[15])),
        vertical_rate: field(Some(fields[16])),
        squawk: field(Some(fields[17])),
        alert: field(Some(fields[18])),
        emergency: field(Some(fields[19])),
        spi: field(Some(fields[20])),
        is_on_ground: field(Some(fields[21])),
    })
    .with_context(|| format!("parsing SBS line: {line}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_position_message() {
        let line = "MSG,3,1,1,A12F52,1,2026/07/30,12:00:00.000,2026/07/30,12:00:00.000,,,,,\
37.78368,-122.15441,,,,,,0";
        let msg = parse_sbs_line(line).unwrap();
        assert_eq!(msg.hex_ident, "A12F52");
        assert_eq!(msg.latitude_f64(), Some(37.78368));
        assert_eq!(msg.longitude_f64(), Some(-122.15441));
        assert!(msg.callsign.is_none());
    }

    #[test]
    fn parses_identification_message() {
        let line = "MSG,1,1,1,A12F52,1,2026/07/30,12:00:00.000,2026/07/30,12:00:00.000,SWA123,,\
,,,,,,,,0";
        let msg = parse_sbs_line(line).unwrap();
        assert_eq!(msg.callsign, Some("SWA123".to_string()));
        assert!(msg.latitude.is_none());
    }

    #[test]
    fn rejects_non_msg_prefix() {
        let line = "STA,3,1,1,A12F52,1,,,,,,,,,,,,,,,,0";
        assert!(parse_sbs_line(line).is_err());
    }

    #[test]
    fn rejects_short_lines() {
        let line = "MSG,3,1,1,A12F52";
        assert!(parse_sbs_line(line).is_err());
    }

    #[test]
    fn rejects_empty_hex_ident() {
        let line = "MSG,3,1,1,,1,,,,,,,,,,,,,,,,0";
        assert!(parse_sbs_line(line).is_err());
    }

    #[test]
    fn uppercases_hex_ident() {
        let line = "MSG,3,1,1,a12f52,1,,,,,,,,,,,,,,,,0";
        let msg = parse_sbs_line(line).unwrap();
        assert_eq!(msg.hex_ident, "A12F52");
    }
}
