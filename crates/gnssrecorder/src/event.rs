//! Event types delivered by the location, GNSS and sensor callback sources.
//!
//! These are already-decoded values handed to the recorder by the host. They
//! carry optional hardware fields as `Option`s; the storage layer is responsible
//! for flattening them into value/flag column pairs.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// A GNSS constellation.
///
/// Serialized as its snake_case name. Deserializes from that name or from
/// the platform's numeric constellation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constellation {
    /// Constellation not reported.
    Unknown,
    /// US Global Positioning System.
    Gps,
    /// Satellite-based augmentation (WAAS, EGNOS, ...).
    Sbas,
    /// Russian GLONASS.
    Glonass,
    /// Japanese Quasi-Zenith Satellite System.
    Qzss,
    /// Chinese `BeiDou`.
    Beidou,
    /// European Galileo.
    Galileo,
    /// Indian regional system (`NavIC`).
    Irnss,
}

impl Constellation {
    /// Map the platform's numeric constellation code to a constellation.
    ///
    /// Unrecognized codes map to [`Constellation::Unknown`].
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Gps,
            2 => Self::Sbas,
            3 => Self::Glonass,
            4 => Self::Qzss,
            5 => Self::Beidou,
            6 => Self::Galileo,
            7 => Self::Irnss,
            _ => Self::Unknown,
        }
    }

    /// Parse a snake_case name or a column label, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let constellation = match name.to_ascii_lowercase().as_str() {
            "unknown" => Self::Unknown,
            "gps" => Self::Gps,
            "sbas" => Self::Sbas,
            "glonass" => Self::Glonass,
            "qzss" => Self::Qzss,
            "beidou" => Self::Beidou,
            "galileo" => Self::Galileo,
            "irnss" => Self::Irnss,
            _ => return None,
        };
        Some(constellation)
    }

    /// The label written to the `constellation` column.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Gps => "GPS",
            Self::Sbas => "SBAS",
            Self::Glonass => "Glonass",
            Self::Qzss => "QZSS",
            Self::Beidou => "Beidou",
            Self::Galileo => "Galileo",
            Self::Irnss => "IRNSS",
        }
    }
}

impl fmt::Display for Constellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const CONSTELLATION_NAMES: &[&str] = &[
    "unknown", "gps", "sbas", "glonass", "qzss", "beidou", "galileo", "irnss",
];

struct ConstellationVisitor;

impl Visitor<'_> for ConstellationVisitor {
    type Value = Constellation;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a constellation name or numeric constellation code")
    }

    fn visit_i64<E: de::Error>(self, code: i64) -> Result<Constellation, E> {
        Ok(i32::try_from(code).map_or(Constellation::Unknown, Constellation::from_code))
    }

    fn visit_u64<E: de::Error>(self, code: u64) -> Result<Constellation, E> {
        Ok(i32::try_from(code).map_or(Constellation::Unknown, Constellation::from_code))
    }

    fn visit_str<E: de::Error>(self, name: &str) -> Result<Constellation, E> {
        Constellation::from_name(name).ok_or_else(|| E::unknown_variant(name, CONSTELLATION_NAMES))
    }
}

impl<'de> Deserialize<'de> for Constellation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ConstellationVisitor)
    }
}

/// Identifies one satellite: constellation plus space vehicle id.
///
/// Status snapshots and pending measurement rows are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SatelliteKey {
    /// Constellation of the satellite.
    pub constellation: Constellation,
    /// Space vehicle id within the constellation.
    pub svid: i32,
}

impl SatelliteKey {
    /// Create a new key.
    #[must_use]
    pub fn new(constellation: Constellation, svid: i32) -> Self {
        Self {
            constellation,
            svid,
        }
    }
}

impl fmt::Display for SatelliteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.constellation, self.svid)
    }
}

/// One reported location fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
    /// Altitude in meters above the WGS84 ellipsoid.
    #[serde(default)]
    pub altitude: f64,
    /// Name of the provider that produced the fix.
    #[serde(default)]
    pub provider: String,
    /// Fix time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub time_ms: i64,
    /// Number of satellites used in the fix.
    #[serde(default)]
    pub satellites_in_fix: i32,
    /// Horizontal (radial) accuracy in meters.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// Vertical accuracy in meters.
    #[serde(default)]
    pub vertical_accuracy_m: Option<f64>,
    /// Ground speed in meters per second.
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// Speed accuracy in meters per second.
    #[serde(default)]
    pub speed_accuracy_mps: Option<f64>,
    /// Bearing in degrees.
    #[serde(default)]
    pub bearing_deg: Option<f64>,
    /// Bearing accuracy in degrees.
    #[serde(default)]
    pub bearing_accuracy_deg: Option<f64>,
    /// Monotonic timestamp of the fix, in nanoseconds since boot.
    #[serde(default)]
    pub elapsed_realtime_nanos: Option<i64>,
}

impl LocationFix {
    /// Create a fix at the given position with no optional fields set.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            provider: "gps".to_string(),
            time_ms: 0,
            satellites_in_fix: 0,
            accuracy_m: None,
            vertical_accuracy_m: None,
            speed_mps: None,
            speed_accuracy_mps: None,
            bearing_deg: None,
            bearing_accuracy_deg: None,
            elapsed_realtime_nanos: None,
        }
    }
}

/// Receiver clock state accompanying a measurement batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GnssClock {
    /// Receiver hardware clock value in nanoseconds.
    pub time_nanos: i64,
    /// Uncertainty of `time_nanos`.
    pub time_uncertainty_nanos: Option<f64>,
    /// Sub-nanosecond clock bias.
    pub bias_nanos: Option<f64>,
    /// Difference between the hardware clock and GPS time.
    pub full_bias_nanos: Option<i64>,
    /// Uncertainty of the clock bias.
    pub bias_uncertainty_nanos: Option<f64>,
    /// Clock drift in nanoseconds per second.
    pub drift_nanos_per_second: Option<f64>,
    /// Uncertainty of the clock drift.
    pub drift_uncertainty_nanos_per_second: Option<f64>,
    /// Leap second associated with the clock time.
    pub leap_second: Option<i32>,
    /// Count of hardware clock discontinuities.
    pub hardware_clock_discontinuity_count: i32,
}

/// A raw measurement for one satellite at one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssMeasurement {
    /// Space vehicle id.
    pub svid: i32,
    /// Constellation of the satellite.
    pub constellation: Constellation,
    /// Carrier-to-noise density in dB-Hz.
    #[serde(default)]
    pub cn0_dbhz: f64,
    /// Automatic gain control level in dB.
    #[serde(default)]
    pub agc_db: Option<f64>,
    /// Receiver tracking state flags.
    #[serde(default)]
    pub state: u32,
    /// Received satellite time in nanoseconds.
    #[serde(default)]
    pub received_sv_time_nanos: i64,
    /// 1-sigma uncertainty of the received satellite time.
    #[serde(default)]
    pub received_sv_time_uncertainty_nanos: i64,
    /// Offset between the measurement time and the clock time.
    #[serde(default)]
    pub time_offset_nanos: f64,
    /// Multipath indicator.
    #[serde(default)]
    pub multipath_indicator: i32,
    /// Carrier frequency of the tracked signal in Hz.
    #[serde(default)]
    pub carrier_frequency_hz: Option<f64>,
    /// Accumulated delta range in meters.
    #[serde(default)]
    pub accumulated_delta_range_m: f64,
    /// 1-sigma uncertainty of the accumulated delta range.
    #[serde(default)]
    pub accumulated_delta_range_uncertainty_m: f64,
    /// Accumulated delta range state flags.
    #[serde(default)]
    pub accumulated_delta_range_state: u32,
    /// Pseudorange rate in meters per second.
    #[serde(default)]
    pub pseudorange_rate_mps: f64,
    /// 1-sigma uncertainty of the pseudorange rate.
    #[serde(default)]
    pub pseudorange_rate_uncertainty_mps: f64,
}

impl GnssMeasurement {
    /// Create a measurement for the given satellite with every other field zeroed.
    #[must_use]
    pub fn new(constellation: Constellation, svid: i32) -> Self {
        Self {
            svid,
            constellation,
            cn0_dbhz: 0.0,
            agc_db: None,
            state: 0,
            received_sv_time_nanos: 0,
            received_sv_time_uncertainty_nanos: 0,
            time_offset_nanos: 0.0,
            multipath_indicator: 0,
            carrier_frequency_hz: None,
            accumulated_delta_range_m: 0.0,
            accumulated_delta_range_uncertainty_m: 0.0,
            accumulated_delta_range_state: 0,
            pseudorange_rate_mps: 0.0,
            pseudorange_rate_uncertainty_mps: 0.0,
        }
    }

    /// Key identifying the satellite this measurement belongs to.
    #[must_use]
    pub fn key(&self) -> SatelliteKey {
        SatelliteKey::new(self.constellation, self.svid)
    }
}

/// One epoch of raw measurements plus the receiver clock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementBatch {
    /// Receiver clock at this epoch.
    #[serde(default)]
    pub clock: GnssClock,
    /// Per-satellite measurements.
    #[serde(default)]
    pub measurements: Vec<GnssMeasurement>,
}

/// Status of one tracked satellite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteStatus {
    /// Space vehicle id.
    pub svid: i32,
    /// Constellation of the satellite.
    pub constellation: Constellation,
    /// Carrier-to-noise density in dB-Hz.
    #[serde(default)]
    pub cn0_dbhz: f64,
    /// Whether almanac data is available.
    #[serde(default)]
    pub has_almanac: bool,
    /// Whether ephemeris data is available.
    #[serde(default)]
    pub has_ephemeris: bool,
    /// Whether the satellite was used in the most recent fix.
    #[serde(default)]
    pub used_in_fix: bool,
    /// Elevation in degrees.
    #[serde(default)]
    pub elevation_deg: f64,
    /// Azimuth in degrees.
    #[serde(default)]
    pub azimuth_deg: f64,
    /// Carrier frequency in Hz, when reported.
    #[serde(default)]
    pub carrier_frequency_hz: Option<f64>,
}

impl SatelliteStatus {
    /// Key identifying the satellite this status belongs to.
    #[must_use]
    pub fn key(&self) -> SatelliteKey {
        SatelliteKey::new(self.constellation, self.svid)
    }
}

/// Kind of motion or environment sensor that produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Calibrated accelerometer.
    Accelerometer,
    /// Raw accelerometer.
    AccelerometerUncalibrated,
    /// Acceleration with gravity removed.
    LinearAcceleration,
    /// Calibrated magnetometer.
    MagneticField,
    /// Raw magnetometer.
    MagneticFieldUncalibrated,
    /// Calibrated gyroscope.
    Gyroscope,
    /// Raw gyroscope.
    GyroscopeUncalibrated,
    /// Gravity vector.
    Gravity,
    /// Rotation vector (x, y, z, cos, heading accuracy).
    RotationVector,
    /// Barometric pressure.
    Pressure,
    /// Relative humidity.
    RelativeHumidity,
    /// Ambient temperature.
    AmbientTemperature,
    /// Ambient light.
    Light,
    /// Proximity.
    Proximity,
    /// Stationary detector trigger.
    StationaryDetect,
    /// Motion detector trigger.
    MotionDetect,
    /// Any sensor the recorder does not store.
    Other(i32),
}

/// One motion-sensor sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Sensor that produced the sample.
    pub kind: SensorKind,
    /// Sample timestamp in nanoseconds.
    #[serde(default)]
    pub timestamp_nanos: i64,
    /// Raw sensor values.
    #[serde(default)]
    pub values: Vec<f32>,
}

/// An event routed to the recorder's writer thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GnssEvent {
    /// A location fix.
    Location(LocationFix),
    /// One epoch of raw measurements.
    Measurements(MeasurementBatch),
    /// A snapshot of all currently visible satellites.
    SatelliteStatus {
        /// Status for each visible satellite.
        satellites: Vec<SatelliteStatus>,
    },
    /// A motion-sensor sample.
    Sensor(SensorSample),
}

impl GnssEvent {
    /// Short name of the event kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Location(_) => "location",
            Self::Measurements(_) => "measurements",
            Self::SatelliteStatus { .. } => "satellite_status",
            Self::Sensor(_) => "sensor",
        }
    }
}

const SYNC_STATE_NAMES: &[(u32, &str)] = &[
    (1 << 0, "CODE_LOCK"),
    (1 << 1, "BIT_SYNC"),
    (1 << 2, "SUBFRAME_SYNC"),
    (1 << 3, "TOW_DECODED"),
    (1 << 4, "MSEC_AMBIGUOUS"),
    (1 << 5, "SYMBOL_SYNC"),
    (1 << 6, "GLO_STRING_SYNC"),
    (1 << 7, "GLO_TOD_DECODED"),
    (1 << 8, "BDS_D2_BIT_SYNC"),
    (1 << 9, "BDS_D2_SUBFRAME_SYNC"),
    (1 << 10, "GAL_E1BC_CODE_LOCK"),
    (1 << 11, "GAL_E1C_2ND_CODE_LOCK"),
    (1 << 12, "GAL_E1B_PAGE_SYNC"),
    (1 << 13, "SBAS_SYNC"),
    (1 << 14, "TOW_KNOWN"),
    (1 << 15, "GLO_TOD_KNOWN"),
    (1 << 16, "2ND_CODE_LOCK"),
];

const ADR_STATE_NAMES: &[(u32, &str)] = &[
    (1 << 0, "VALID"),
    (1 << 1, "RESET"),
    (1 << 2, "CYCLE_SLIP"),
    (1 << 3, "HALF_CYCLE_RESOLVED"),
    (1 << 4, "HALF_CYCLE_REPORTED"),
];

fn describe_flags(flags: u32, names: &[(u32, &str)]) -> String {
    if flags == 0 {
        return "UNKNOWN".to_string();
    }
    let mut parts: Vec<&str> = names
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    let known = names.iter().fold(0, |acc, (bit, _)| acc | bit);
    if flags & !known != 0 {
        parts.push("OTHER");
    }
    parts.join("|")
}

/// Render receiver tracking state flags as `NAME|NAME`.
#[must_use]
pub fn sync_state_text(state: u32) -> String {
    describe_flags(state, SYNC_STATE_NAMES)
}

/// Render accumulated delta range state flags as `NAME|NAME`.
#[must_use]
pub fn adr_state_text(state: u32) -> String {
    describe_flags(state, ADR_STATE_NAMES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constellation_from_code() {
        assert_eq!(Constellation::from_code(1), Constellation::Gps);
        assert_eq!(Constellation::from_code(3), Constellation::Glonass);
        assert_eq!(Constellation::from_code(6), Constellation::Galileo);
        assert_eq!(Constellation::from_code(42), Constellation::Unknown);
        assert_eq!(Constellation::from_code(-1), Constellation::Unknown);
    }

    #[test]
    fn test_constellation_from_json_name_or_code() {
        let from_name: Constellation = serde_json::from_str(r#""galileo""#).unwrap();
        let from_label: Constellation = serde_json::from_str(r#""GPS""#).unwrap();
        let from_code: Constellation = serde_json::from_str("5").unwrap();
        let out_of_range: Constellation = serde_json::from_str("4294967296").unwrap();
        assert_eq!(from_name, Constellation::Galileo);
        assert_eq!(from_label, Constellation::Gps);
        assert_eq!(from_code, Constellation::Beidou);
        assert_eq!(out_of_range, Constellation::Unknown);
        assert!(serde_json::from_str::<Constellation>(r#""navstar""#).is_err());
        assert_eq!(
            serde_json::to_string(&Constellation::Beidou).unwrap(),
            r#""beidou""#
        );
    }

    #[test]
    fn test_measurement_with_numeric_constellation() {
        let line = r#"{"type":"measurements","measurements":[{"svid":3,"constellation":3}]}"#;
        let event: GnssEvent = serde_json::from_str(line).unwrap();
        let GnssEvent::Measurements(batch) = event else {
            panic!("expected measurements");
        };
        assert_eq!(batch.measurements[0].key().to_string(), "Glonass/3");
    }

    #[test]
    fn test_constellation_label() {
        assert_eq!(Constellation::Gps.to_string(), "GPS");
        assert_eq!(Constellation::Beidou.label(), "Beidou");
    }

    #[test]
    fn test_satellite_key_display_and_equality() {
        let a = SatelliteKey::new(Constellation::Gps, 12);
        let b = GnssMeasurement::new(Constellation::Gps, 12).key();
        let c = SatelliteKey::new(Constellation::Galileo, 12);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "GPS/12");
    }

    #[test]
    fn test_sync_state_text() {
        assert_eq!(sync_state_text(0), "UNKNOWN");
        assert_eq!(sync_state_text(1 | 2), "CODE_LOCK|BIT_SYNC");
        assert_eq!(sync_state_text(1 << 14), "TOW_KNOWN");
        assert_eq!(sync_state_text(1 << 30), "OTHER");
    }

    #[test]
    fn test_adr_state_text() {
        assert_eq!(adr_state_text(1), "VALID");
        assert_eq!(adr_state_text(1 | 4), "VALID|CYCLE_SLIP");
    }

    #[test]
    fn test_event_json_shape() {
        let event = GnssEvent::Location(LocationFix::new(38.9, -77.0, 10.0));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"location""#));
        assert_eq!(event.kind(), "location");
    }

    #[test]
    fn test_event_from_minimal_json() {
        let line = r#"{"type":"measurements","measurements":[{"svid":12,"constellation":"gps"}]}"#;
        let event: GnssEvent = serde_json::from_str(line).unwrap();
        match event {
            GnssEvent::Measurements(batch) => {
                assert_eq!(batch.measurements.len(), 1);
                assert_eq!(batch.measurements[0].key().to_string(), "GPS/12");
                assert!(batch.measurements[0].agc_db.is_none());
                assert_eq!(batch.clock, GnssClock::default());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_sensor_kind_other_from_json() {
        let line = r#"{"type":"sensor","kind":{"other":99},"values":[1.0]}"#;
        let event: GnssEvent = serde_json::from_str(line).unwrap();
        assert!(matches!(
            event,
            GnssEvent::Sensor(SensorSample {
                kind: SensorKind::Other(99),
                ..
            })
        ));
    }

    #[test]
    fn test_status_event_from_json() {
        let line = r#"{"type":"satellite_status","satellites":[{"svid":5,"constellation":"glonass","used_in_fix":true}]}"#;
        let event: GnssEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.kind(), "satellite_status");
    }
}
