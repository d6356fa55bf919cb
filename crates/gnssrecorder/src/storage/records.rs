//! Row values for the recorder tables.
//!
//! Each record is built from an event and already follows the column
//! policy of the store: optional values become a `has_*` flag plus a value
//! that is zero when absent, so no column is ever NULL.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::event::{
    adr_state_text, sync_state_text, Constellation, GnssClock, GnssMeasurement, LocationFix,
    SatelliteStatus, SensorKind, SensorSample,
};

/// An optional measurement flattened into a presence flag and a value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flagged<T> {
    /// Whether the source reported the value.
    pub has: bool,
    /// The value, or zero when `has` is false.
    pub value: T,
}

impl Flagged<f64> {
    /// Flatten an optional float. Non-finite values count as absent.
    #[must_use]
    pub fn from_f64(value: Option<f64>) -> Self {
        match value.filter(|v| v.is_finite()) {
            Some(value) => Self { has: true, value },
            None => Self::default(),
        }
    }
}

impl<T: Default> Flagged<T> {
    /// Flatten an optional integer.
    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Self { has: true, value },
            None => Self::default(),
        }
    }
}

/// Replace non-finite floats with zero.
fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn dump<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A row of `gps_observation_points`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationPoint {
    /// Wall-clock time the row was written (RFC 3339).
    pub sys_time: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Location provider name.
    pub provider: String,
    /// Fix time in milliseconds since the Unix epoch.
    pub gps_time_ms: i64,
    /// Satellites used in the fix.
    pub fix_sat_count: i32,
    /// Horizontal accuracy.
    pub radial_accuracy: Flagged<f64>,
    /// Vertical accuracy.
    pub vertical_accuracy: Flagged<f64>,
    /// Ground speed.
    pub speed: Flagged<f64>,
    /// Speed accuracy.
    pub speed_accuracy: Flagged<f64>,
    /// Bearing.
    pub bearing: Flagged<f64>,
    /// Bearing accuracy.
    pub bearing_accuracy: Flagged<f64>,
    /// Monotonic fix timestamp in nanoseconds, zero when unknown.
    pub elapsed_realtime_nanos: f64,
    /// JSON rendering of the source fix.
    pub data_dump: String,
}

impl ObservationPoint {
    /// Build a row from a location fix written at `now`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_fix(fix: &LocationFix, now: DateTime<Utc>) -> Self {
        Self {
            sys_time: timestamp(now),
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: finite(fix.altitude),
            provider: fix.provider.clone(),
            gps_time_ms: fix.time_ms,
            fix_sat_count: fix.satellites_in_fix,
            radial_accuracy: Flagged::from_f64(fix.accuracy_m),
            vertical_accuracy: Flagged::from_f64(fix.vertical_accuracy_m),
            speed: Flagged::from_f64(fix.speed_mps),
            speed_accuracy: Flagged::from_f64(fix.speed_accuracy_mps),
            bearing: Flagged::from_f64(fix.bearing_deg),
            bearing_accuracy: Flagged::from_f64(fix.bearing_accuracy_deg),
            elapsed_realtime_nanos: fix.elapsed_realtime_nanos.map_or(0.0, |n| n as f64),
            data_dump: dump(fix),
        }
    }
}

/// A row of `sat_data`.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteMeasurementRecord {
    /// Wall-clock time the row was written (RFC 3339).
    pub local_time: String,
    /// Space vehicle id.
    pub svid: i32,
    /// Constellation of the satellite.
    pub constellation: Constellation,
    /// Carrier-to-noise density.
    pub cn0: f64,
    /// Automatic gain control level.
    pub agc: Flagged<f64>,
    /// Whether the latest status snapshot marked the satellite as used in the fix.
    pub in_fix: bool,
    /// Raw tracking state flags.
    pub sync_state_flags: u32,
    /// Tracking state flags rendered as names.
    pub sync_state_txt: String,
    /// Received satellite time.
    pub sat_time_nanos: f64,
    /// Uncertainty of the received satellite time.
    pub sat_time_1sigma_nanos: f64,
    /// Receiver time offset.
    pub rcvr_time_offset_nanos: f64,
    /// Multipath indicator.
    pub multipath: i32,
    /// Carrier frequency.
    pub carrier_freq_hz: Flagged<f64>,
    /// Accumulated delta range.
    pub accum_delta_range: f64,
    /// Uncertainty of the accumulated delta range.
    pub accum_delta_range_1sigma: f64,
    /// Raw accumulated delta range state flags.
    pub accum_delta_range_state_flags: u32,
    /// Accumulated delta range state rendered as names.
    pub accum_delta_range_state_txt: String,
    /// Pseudorange rate.
    pub pseudorange_rate_mps: f64,
    /// Uncertainty of the pseudorange rate.
    pub pseudorange_rate_1sigma: f64,
    /// Whether ephemeris data is available.
    pub has_ephemeris: bool,
    /// Whether almanac data is available.
    pub has_almanac: bool,
    /// Azimuth from the latest status snapshot, zero if none.
    pub azimuth_deg: f64,
    /// Elevation from the latest status snapshot, zero if none.
    pub elevation_deg: f64,
    /// JSON rendering of the source measurement.
    pub data_dump: String,
}

impl SatelliteMeasurementRecord {
    /// Build a row from a measurement, enriched with the satellite's latest status.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn enriched(
        measurement: &GnssMeasurement,
        status: Option<&SatelliteStatus>,
        now: DateTime<Utc>,
    ) -> Self {
        let carrier = measurement
            .carrier_frequency_hz
            .filter(|hz| hz.is_finite())
            .or_else(|| status.and_then(|s| s.carrier_frequency_hz));

        Self {
            local_time: timestamp(now),
            svid: measurement.svid,
            constellation: measurement.constellation,
            cn0: finite(measurement.cn0_dbhz),
            agc: Flagged::from_f64(measurement.agc_db),
            in_fix: status.is_some_and(|s| s.used_in_fix),
            sync_state_flags: measurement.state,
            sync_state_txt: sync_state_text(measurement.state),
            sat_time_nanos: measurement.received_sv_time_nanos as f64,
            sat_time_1sigma_nanos: measurement.received_sv_time_uncertainty_nanos as f64,
            rcvr_time_offset_nanos: finite(measurement.time_offset_nanos),
            multipath: measurement.multipath_indicator,
            carrier_freq_hz: Flagged::from_f64(carrier),
            accum_delta_range: finite(measurement.accumulated_delta_range_m),
            accum_delta_range_1sigma: finite(measurement.accumulated_delta_range_uncertainty_m),
            accum_delta_range_state_flags: measurement.accumulated_delta_range_state,
            accum_delta_range_state_txt: adr_state_text(measurement.accumulated_delta_range_state),
            pseudorange_rate_mps: finite(measurement.pseudorange_rate_mps),
            pseudorange_rate_1sigma: finite(measurement.pseudorange_rate_uncertainty_mps),
            has_ephemeris: status.is_some_and(|s| s.has_ephemeris),
            has_almanac: status.is_some_and(|s| s.has_almanac),
            azimuth_deg: status.map_or(0.0, |s| finite(s.azimuth_deg)),
            elevation_deg: status.map_or(0.0, |s| finite(s.elevation_deg)),
            data_dump: dump(measurement),
        }
    }
}

/// A row of `rcvr_clock`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockRecord {
    /// Receiver hardware clock value.
    pub time_nanos: f64,
    /// Clock uncertainty.
    pub time_uncertainty_nanos: Flagged<f64>,
    /// Sub-nanosecond bias.
    pub bias_nanos: Flagged<f64>,
    /// Bias uncertainty.
    pub bias_uncertainty_nanos: Flagged<f64>,
    /// Full bias against GPS time.
    pub full_bias_nanos: Flagged<i64>,
    /// Clock drift.
    pub drift_nanos_per_sec: Flagged<f64>,
    /// Drift uncertainty.
    pub drift_uncertainty_nps: Flagged<f64>,
    /// Hardware clock discontinuity count.
    pub hw_clock_discontinuity_count: i32,
    /// Leap second.
    pub leap_second: Flagged<i32>,
    /// JSON rendering of the source clock.
    pub data_dump: String,
}

impl ClockRecord {
    /// Build a row from a receiver clock.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_clock(clock: &GnssClock) -> Self {
        Self {
            time_nanos: clock.time_nanos as f64,
            time_uncertainty_nanos: Flagged::from_f64(clock.time_uncertainty_nanos),
            bias_nanos: Flagged::from_f64(clock.bias_nanos),
            bias_uncertainty_nanos: Flagged::from_f64(clock.bias_uncertainty_nanos),
            full_bias_nanos: Flagged::from_option(clock.full_bias_nanos),
            drift_nanos_per_sec: Flagged::from_f64(clock.drift_nanos_per_second),
            drift_uncertainty_nps: Flagged::from_f64(clock.drift_uncertainty_nanos_per_second),
            hw_clock_discontinuity_count: clock.hardware_clock_discontinuity_count,
            leap_second: Flagged::from_option(clock.leap_second),
            data_dump: dump(clock),
        }
    }
}

/// A row of `motion`. Columns not fed by the sample's sensor stay zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionRecord {
    /// Sample timestamp in nanoseconds.
    pub time: i64,
    /// Accelerometer x/y/z.
    pub accel: [f64; 3],
    /// Linear acceleration x/y/z.
    pub linear_accel: [f64; 3],
    /// Magnetometer x/y/z.
    pub mag: [f64; 3],
    /// Gyroscope x/y/z.
    pub gyro: [f64; 3],
    /// Gravity x/y/z.
    pub gravity: [f64; 3],
    /// Rotation vector x/y/z/cos/heading accuracy.
    pub rot_vec: [f64; 5],
    /// Barometric pressure.
    pub baro: f64,
    /// Relative humidity.
    pub humidity: f64,
    /// Ambient temperature.
    pub temp: f64,
    /// Ambient light.
    pub lux: f64,
    /// Proximity.
    pub prox: f64,
    /// Stationary detector fired.
    pub stationary: bool,
    /// Motion detector fired.
    pub motion: bool,
    /// JSON rendering of the source sample.
    pub data_dump: String,
}

impl MotionRecord {
    /// Build a row from a sensor sample.
    ///
    /// Returns `None` for sensors the table has no columns for and for
    /// samples without values. Missing trailing values are stored as zero.
    #[must_use]
    pub fn from_sample(sample: &SensorSample) -> Option<Self> {
        if sample.values.is_empty() {
            return None;
        }

        let values = &sample.values;
        let mut record = Self {
            time: sample.timestamp_nanos,
            data_dump: dump(sample),
            ..Self::default()
        };

        match sample.kind {
            SensorKind::Accelerometer | SensorKind::AccelerometerUncalibrated => {
                fill(&mut record.accel, values);
            }
            SensorKind::LinearAcceleration => fill(&mut record.linear_accel, values),
            SensorKind::MagneticField | SensorKind::MagneticFieldUncalibrated => {
                fill(&mut record.mag, values);
            }
            SensorKind::Gyroscope | SensorKind::GyroscopeUncalibrated => {
                fill(&mut record.gyro, values);
            }
            SensorKind::Gravity => fill(&mut record.gravity, values),
            SensorKind::RotationVector => fill(&mut record.rot_vec, values),
            SensorKind::Pressure => record.baro = first(values),
            SensorKind::RelativeHumidity => record.humidity = first(values),
            SensorKind::AmbientTemperature => record.temp = first(values),
            SensorKind::Light => record.lux = first(values),
            SensorKind::Proximity => record.prox = first(values),
            SensorKind::StationaryDetect => record.stationary = true,
            SensorKind::MotionDetect => record.motion = true,
            SensorKind::Other(_) => return None,
        }

        Some(record)
    }
}

fn fill<const N: usize>(target: &mut [f64; N], values: &[f32]) {
    for (slot, value) in target.iter_mut().zip(values) {
        *slot = finite(f64::from(*value));
    }
}

fn first(values: &[f32]) -> f64 {
    values.first().map_or(0.0, |v| finite(f64::from(*v)))
}
