//! Storage layer for gnssrecorder.
//!
//! This module owns the on-disk GeoPackage of a recording session: its
//! fixed schema, row insertion with geometry encoding, the relation rows
//! that tie satellites to clocks and fixes, and finalization on close.

pub mod geometry;
pub mod records;
pub mod schema;
pub mod setup;

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use self::geometry::{encode_point_z, BoundingBox};
use self::records::{ClockRecord, MotionRecord, ObservationPoint, SatelliteMeasurementRecord};
use self::schema::{
    CLOCK_TABLE, GPKG_APPLICATION_ID, GPKG_USER_VERSION, MOTION_TABLE, OBSERVATION_POINTS_TABLE,
    POINT_SAT_MAP_TABLE, SAT_CLOCK_MAP_TABLE, SAT_DATA_TABLE,
};

/// Primary key of a row in one of the recorder tables.
pub type RowId = i64;

/// Row-level operations the writer thread performs on a recording.
///
/// [`Storage`] is the GeoPackage implementation; tests substitute
/// instrumented stores.
pub trait RecordStore: Send {
    /// Path of the file backing this store.
    fn path(&self) -> &Path;

    /// Insert one location fix and widen the feature extent if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] if the row cannot be written.
    fn insert_observation_point(&mut self, point: &ObservationPoint) -> Result<RowId>;

    /// Insert one satellite measurement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] if the row cannot be written.
    fn insert_satellite_measurement(&mut self, record: &SatelliteMeasurementRecord)
        -> Result<RowId>;

    /// Insert one receiver clock reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] if the row cannot be written.
    fn insert_clock_record(&mut self, record: &ClockRecord) -> Result<RowId>;

    /// Insert one motion-sensor sample.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] if the row cannot be written.
    fn insert_motion_sample(&mut self, record: &MotionRecord) -> Result<RowId>;

    /// Relate a satellite row to the clock row of its batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] if the mapping row cannot be written.
    fn link_measurement_to_clock(&mut self, measurement_id: RowId, clock_id: RowId) -> Result<()>;

    /// Relate satellite rows to the observation point that closed their batch.
    ///
    /// An empty slice writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteFailed`] if a mapping row cannot be written.
    fn link_measurements_to_observation_point(
        &mut self,
        measurement_ids: &[RowId],
        point_id: RowId,
    ) -> Result<()>;

    /// Group the following writes into one event.
    ///
    /// Writes made until [`commit_event`](Self::commit_event) or
    /// [`rollback_event`](Self::rollback_event) land together or not at all.
    /// Stores without transactions keep the default, which does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventTransaction`] if the event cannot be opened.
    fn begin_event(&mut self) -> Result<()> {
        Ok(())
    }

    /// Keep every write made since [`begin_event`](Self::begin_event).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventTransaction`] if the writes cannot be kept.
    fn commit_event(&mut self) -> Result<()> {
        Ok(())
    }

    /// Discard every write made since [`begin_event`](Self::begin_event).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventTransaction`] if the writes cannot be discarded.
    fn rollback_event(&mut self) -> Result<()> {
        Ok(())
    }

    /// Finalize the file and release it. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CloseFailed`] if the final checkpoint fails.
    fn close(&mut self) -> Result<()>;
}

/// Savepoint wrapping the writes of one event.
const EVENT_SAVEPOINT: &str = "gnss_event";

/// Creates the store for a new session.
pub trait StoreOpener: Send + Sync + fmt::Debug {
    /// Create a fresh store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreateFailed`] or [`Error::SchemaInitFailed`].
    fn open(&self, path: &Path) -> Result<Box<dyn RecordStore>>;
}

/// Opens [`Storage`] GeoPackages.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPackageOpener;

impl StoreOpener for GeoPackageOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RecordStore>> {
        Ok(Box::new(Storage::open(path)?))
    }
}

/// A GeoPackage file being recorded into.
///
/// Writes go through a single connection in WAL mode. [`Storage::close`]
/// checkpoints the log and switches back to a rollback journal so the
/// finished file stands alone.
pub struct Storage {
    /// Path to the GeoPackage file.
    path: PathBuf,
    /// Database connection; `None` once closed.
    conn: Option<Connection>,
    /// Extent of the observation points written so far.
    bbox: BoundingBox,
    /// Extent when the open event began, restored on rollback.
    event_bbox: Option<BoundingBox>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .field("open", &self.conn.is_some())
            .field("bbox", &self.bbox)
            .field("in_event", &self.event_bbox.is_some())
            .finish()
    }
}

impl Storage {
    /// Create a new GeoPackage at the given path.
    ///
    /// Creates the parent directories if they don't exist. A non-empty file
    /// already at `path` is refused and left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CreateFailed`] if the directory or file cannot be
    /// created or the file already holds data, or
    /// [`Error::SchemaInitFailed`] if the tables cannot be set up. In the
    /// latter case the file is left on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if std::fs::metadata(&path).is_ok_and(|meta| meta.len() > 0) {
            return Err(Error::create_failed(
                &path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "file already exists and is not empty",
                ),
            ));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| Error::create_failed(parent, source))?;
            }
        }

        debug!("Creating GeoPackage at {}", path.display());
        let mut conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|source| Error::create_failed(&path, source))?;

        conn.execute_batch(&format!(
            "PRAGMA application_id = {GPKG_APPLICATION_ID};
             PRAGMA user_version = {GPKG_USER_VERSION};
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;"
        ))
        .map_err(|source| Error::create_failed(&path, source))?;

        setup::initialize_schema(&mut conn).map_err(|source| Error::SchemaInitFailed {
            path: path.clone(),
            source,
        })?;

        info!("GeoPackage created at {}", path.display());
        Ok(Self {
            path,
            conn: Some(conn),
            bbox: BoundingBox::EMPTY,
            event_bbox: None,
        })
    }

    /// Get the path to the GeoPackage file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store still holds its connection.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Extent of the observation points written so far.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Count the rows of every recorder table.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or a query fails.
    pub fn row_counts(&self) -> Result<TableCounts> {
        TableCounts::query(self.connection()?)
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::internal(format!("{} is closed", self.path.display())))
    }

    fn connection_mut(&mut self) -> Result<&mut Connection> {
        let path = &self.path;
        self.conn
            .as_mut()
            .ok_or_else(|| Error::internal(format!("{} is closed", path.display())))
    }

    fn update_extent(&self, bbox: &BoundingBox) -> Result<()> {
        self.connection()?
            .execute(
                "UPDATE gpkg_contents
                 SET min_x = ?1, min_y = ?2, max_x = ?3, max_y = ?4,
                     last_change = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE table_name = ?5",
                params![
                    bbox.min_x,
                    bbox.min_y,
                    bbox.max_x,
                    bbox.max_y,
                    OBSERVATION_POINTS_TABLE
                ],
            )
            .map_err(|source| Error::write_failed("gpkg_contents", source))?;
        Ok(())
    }
}

impl RecordStore for Storage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn insert_observation_point(&mut self, point: &ObservationPoint) -> Result<RowId> {
        let geom = encode_point_z(point.longitude, point.latitude, point.altitude);
        let conn = self.connection()?;
        conn.execute(
            r"
            INSERT INTO gps_observation_points (
                geom, SysTime, Lat, Lon, Alt, Provider, GPSTime, FixSatCount,
                HasRadialAccuracy, RadialAccuracy, HasVerticalAccuracy, VerticalAccuracy,
                HasSpeed, Speed, HasSpeedAccuracy, SpeedAccuracy,
                HasBearing, Bearing, HasBearingAccuracy, BearingAccuracy,
                ElapsedRealtimeNanos, data_dump
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22)
            ",
            params![
                geom,
                point.sys_time,
                point.latitude,
                point.longitude,
                point.altitude,
                point.provider,
                point.gps_time_ms,
                point.fix_sat_count,
                point.radial_accuracy.has,
                point.radial_accuracy.value,
                point.vertical_accuracy.has,
                point.vertical_accuracy.value,
                point.speed.has,
                point.speed.value,
                point.speed_accuracy.has,
                point.speed_accuracy.value,
                point.bearing.has,
                point.bearing.value,
                point.bearing_accuracy.has,
                point.bearing_accuracy.value,
                point.elapsed_realtime_nanos,
                point.data_dump,
            ],
        )
        .map_err(|source| Error::write_failed(OBSERVATION_POINTS_TABLE, source))?;
        let id = conn.last_insert_rowid();

        let mut bbox = self.bbox;
        if bbox.extend(point.longitude, point.latitude) {
            self.update_extent(&bbox)?;
            self.bbox = bbox;
            debug!("Extent widened to {:?}", self.bbox);
        }

        debug!("Inserted observation point {}", id);
        Ok(id)
    }

    fn insert_satellite_measurement(
        &mut self,
        record: &SatelliteMeasurementRecord,
    ) -> Result<RowId> {
        let conn = self.connection()?;
        conn.execute(
            r"
            INSERT INTO sat_data (
                local_time, svid, constellation, cn0, agc, has_agc, in_fix,
                sync_state_flags, sync_state_txt, sat_time_nanos, sat_time_1sigma_nanos,
                rcvr_time_offset_nanos, multipath, has_carrier_freq, carrier_freq_hz,
                accum_delta_range, accum_delta_range_1sigma, accum_delta_range_state_flags,
                accum_delta_range_state_txt, pseudorange_rate_mps, pseudorange_rate_1sigma,
                has_ephemeris, has_almanac, azimuth_deg, elevation_deg, data_dump
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)
            ",
            params![
                record.local_time,
                record.svid,
                record.constellation.label(),
                record.cn0,
                record.agc.value,
                record.agc.has,
                record.in_fix,
                record.sync_state_flags,
                record.sync_state_txt,
                record.sat_time_nanos,
                record.sat_time_1sigma_nanos,
                record.rcvr_time_offset_nanos,
                record.multipath,
                record.carrier_freq_hz.has,
                record.carrier_freq_hz.value,
                record.accum_delta_range,
                record.accum_delta_range_1sigma,
                record.accum_delta_range_state_flags,
                record.accum_delta_range_state_txt,
                record.pseudorange_rate_mps,
                record.pseudorange_rate_1sigma,
                record.has_ephemeris,
                record.has_almanac,
                record.azimuth_deg,
                record.elevation_deg,
                record.data_dump,
            ],
        )
        .map_err(|source| Error::write_failed(SAT_DATA_TABLE, source))?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_clock_record(&mut self, record: &ClockRecord) -> Result<RowId> {
        let conn = self.connection()?;
        conn.execute(
            r"
            INSERT INTO rcvr_clock (
                time_nanos, time_uncertainty_nanos, has_time_uncertainty_nanos,
                bias_nanos, has_bias_nanos, bias_uncertainty_nanos, has_bias_uncertainty_nanos,
                full_bias_nanos, has_full_bias_nanos, drift_nanos_per_sec, has_drift_nanos_per_sec,
                drift_uncertainty_nps, has_drift_uncertainty_nps, hw_clock_discontinuity_count,
                leap_second, has_leap_second, data_dump
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ",
            params![
                record.time_nanos,
                record.time_uncertainty_nanos.value,
                record.time_uncertainty_nanos.has,
                record.bias_nanos.value,
                record.bias_nanos.has,
                record.bias_uncertainty_nanos.value,
                record.bias_uncertainty_nanos.has,
                record.full_bias_nanos.value,
                record.full_bias_nanos.has,
                record.drift_nanos_per_sec.value,
                record.drift_nanos_per_sec.has,
                record.drift_uncertainty_nps.value,
                record.drift_uncertainty_nps.has,
                record.hw_clock_discontinuity_count,
                record.leap_second.value,
                record.leap_second.has,
                record.data_dump,
            ],
        )
        .map_err(|source| Error::write_failed(CLOCK_TABLE, source))?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_motion_sample(&mut self, record: &MotionRecord) -> Result<RowId> {
        let conn = self.connection()?;
        let [accel_x, accel_y, accel_z] = record.accel;
        let [lin_x, lin_y, lin_z] = record.linear_accel;
        let [mag_x, mag_y, mag_z] = record.mag;
        let [gyro_x, gyro_y, gyro_z] = record.gyro;
        let [grav_x, grav_y, grav_z] = record.gravity;
        let [rot_x, rot_y, rot_z, rot_cos, rot_acc] = record.rot_vec;
        conn.execute(
            r"
            INSERT INTO motion (
                time, accel_x, accel_y, accel_z, linear_accel_x, linear_accel_y, linear_accel_z,
                mag_x, mag_y, mag_z, gyro_x, gyro_y, gyro_z, gravity_x, gravity_y, gravity_z,
                rot_vec_x, rot_vec_y, rot_vec_z, rot_vec_cos, rot_vec_hdg_acc,
                baro, humidity, temp, lux, prox, stationary, motion, data_dump
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)
            ",
            params![
                record.time,
                accel_x,
                accel_y,
                accel_z,
                lin_x,
                lin_y,
                lin_z,
                mag_x,
                mag_y,
                mag_z,
                gyro_x,
                gyro_y,
                gyro_z,
                grav_x,
                grav_y,
                grav_z,
                rot_x,
                rot_y,
                rot_z,
                rot_cos,
                rot_acc,
                record.baro,
                record.humidity,
                record.temp,
                record.lux,
                record.prox,
                record.stationary,
                record.motion,
                record.data_dump,
            ],
        )
        .map_err(|source| Error::write_failed(MOTION_TABLE, source))?;
        Ok(conn.last_insert_rowid())
    }

    fn link_measurement_to_clock(&mut self, measurement_id: RowId, clock_id: RowId) -> Result<()> {
        self.connection()?
            .execute(
                "INSERT INTO sat_data_rcvr_clock (base_id, related_id) VALUES (?1, ?2)",
                params![measurement_id, clock_id],
            )
            .map_err(|source| Error::write_failed(SAT_CLOCK_MAP_TABLE, source))?;
        Ok(())
    }

    fn link_measurements_to_observation_point(
        &mut self,
        measurement_ids: &[RowId],
        point_id: RowId,
    ) -> Result<()> {
        if measurement_ids.is_empty() {
            return Ok(());
        }

        let write = |conn: &mut Connection| -> rusqlite::Result<()> {
            let sp = conn.savepoint()?;
            {
                let mut stmt = sp.prepare_cached(
                    "INSERT INTO gps_observation_points_sat_data (base_id, related_id)
                     VALUES (?1, ?2)",
                )?;
                for id in measurement_ids {
                    stmt.execute(params![point_id, id])?;
                }
            }
            sp.commit()
        };
        write(self.connection_mut()?)
            .map_err(|source| Error::write_failed(POINT_SAT_MAP_TABLE, source))?;

        debug!(
            "Linked {} measurements to observation point {}",
            measurement_ids.len(),
            point_id
        );
        Ok(())
    }

    fn begin_event(&mut self) -> Result<()> {
        self.connection()?
            .execute_batch(&format!("SAVEPOINT {EVENT_SAVEPOINT}"))
            .map_err(|source| Error::EventTransaction {
                action: "begin",
                source,
            })?;
        self.event_bbox = Some(self.bbox);
        Ok(())
    }

    fn commit_event(&mut self) -> Result<()> {
        self.connection()?
            .execute_batch(&format!("RELEASE {EVENT_SAVEPOINT}"))
            .map_err(|source| Error::EventTransaction {
                action: "commit",
                source,
            })?;
        self.event_bbox = None;
        Ok(())
    }

    fn rollback_event(&mut self) -> Result<()> {
        if let Some(bbox) = self.event_bbox.take() {
            self.bbox = bbox;
        }
        self.connection()?
            .execute_batch(&format!(
                "ROLLBACK TO {EVENT_SAVEPOINT}; RELEASE {EVENT_SAVEPOINT}"
            ))
            .map_err(|source| Error::EventTransaction {
                action: "roll back",
                source,
            })
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        let close_failed = |source: rusqlite::Error| Error::CloseFailed {
            path: self.path.clone(),
            source,
        };
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE); PRAGMA journal_mode = DELETE;")
            .map_err(&close_failed)?;
        conn.close().map_err(|(_, source)| close_failed(source))?;

        info!("Closed GeoPackage at {}", self.path.display());
        Ok(())
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if self.conn.is_some() {
            if let Err(e) = RecordStore::close(self) {
                warn!("Failed to finalize {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Row counts of the recorder tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    /// Rows in `gps_observation_points`.
    pub observation_points: i64,
    /// Rows in `sat_data`.
    pub satellite_measurements: i64,
    /// Rows in `rcvr_clock`.
    pub clock_records: i64,
    /// Rows in `motion`.
    pub motion_samples: i64,
    /// Rows in `sat_data_rcvr_clock`.
    pub measurement_clock_links: i64,
    /// Rows in `gps_observation_points_sat_data`.
    pub point_measurement_links: i64,
}

impl TableCounts {
    fn query(conn: &Connection) -> Result<Self> {
        let count = |table: &str| -> Result<i64> {
            let n = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
            Ok(n)
        };

        Ok(Self {
            observation_points: count(OBSERVATION_POINTS_TABLE)?,
            satellite_measurements: count(SAT_DATA_TABLE)?,
            clock_records: count(CLOCK_TABLE)?,
            motion_samples: count(MOTION_TABLE)?,
            measurement_clock_links: count(SAT_CLOCK_MAP_TABLE)?,
            point_measurement_links: count(POINT_SAT_MAP_TABLE)?,
        })
    }
}

/// Summary of a finished recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    /// Path of the inspected file.
    pub path: PathBuf,
    /// Rows per table.
    pub counts: TableCounts,
    /// Extent of the observation points, `None` if there are none.
    pub bounding_box: Option<BoundingBox>,
}

/// Open a finished recording read-only and summarize it.
///
/// # Errors
///
/// Returns [`Error::NotAGeoPackage`] if the file lacks the GeoPackage
/// application id, or a query error if it cannot be read.
pub fn inspect(path: impl AsRef<Path>) -> Result<StoreSummary> {
    let path = path.as_ref().to_path_buf();
    let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let application_id: i32 = conn.query_row("PRAGMA application_id", [], |row| row.get(0))?;
    if application_id != GPKG_APPLICATION_ID {
        return Err(Error::NotAGeoPackage { path });
    }

    let counts = TableCounts::query(&conn)?;
    let bbox: BoundingBox = conn.query_row(
        "SELECT min_x, max_x, min_y, max_y FROM gpkg_contents WHERE table_name = ?1",
        [OBSERVATION_POINTS_TABLE],
        |row| {
            Ok(BoundingBox {
                min_x: row.get(0)?,
                max_x: row.get(1)?,
                min_y: row.get(2)?,
                max_y: row.get(3)?,
            })
        },
    )?;

    Ok(StoreSummary {
        path,
        counts,
        bounding_box: (!bbox.is_empty()).then_some(bbox),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Constellation, GnssClock, GnssMeasurement, LocationFix};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("test.gpkg")).expect("failed to create store");
        (dir, storage)
    }

    fn point(lat: f64, lon: f64) -> ObservationPoint {
        ObservationPoint::from_fix(&LocationFix::new(lat, lon, 5.0), Utc::now())
    }

    fn measurement(svid: i32) -> SatelliteMeasurementRecord {
        SatelliteMeasurementRecord::enriched(
            &GnssMeasurement::new(Constellation::Gps, svid),
            None,
            Utc::now(),
        )
    }

    fn contents_extent(storage: &Storage) -> (f64, f64, f64, f64) {
        storage
            .connection()
            .unwrap()
            .query_row(
                "SELECT min_x, max_x, min_y, max_y FROM gpkg_contents
                 WHERE table_name = 'gps_observation_points'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap()
    }

    #[test]
    fn test_open_sets_geopackage_pragmas() {
        let (_dir, storage) = create_test_storage();
        let conn = storage.connection().unwrap();
        let app_id: i32 = conn
            .query_row("PRAGMA application_id", [], |row| row.get(0))
            .unwrap();
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(app_id, 1_196_444_487);
        assert_eq!(version, 10200);
        assert!(storage.bounding_box().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("nested.gpkg");
        let storage = Storage::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(storage.path(), path.as_path());
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = Storage::open(blocker.join("x.gpkg")).unwrap_err();
        assert!(matches!(err, Error::CreateFailed { .. }));
    }

    #[test]
    fn test_open_refuses_existing_recording() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dup.gpkg");
        let mut first = Storage::open(&path).unwrap();
        first.insert_observation_point(&point(1.0, 1.0)).unwrap();
        first.close().unwrap();

        let err = Storage::open(&path).unwrap_err();
        assert!(matches!(err, Error::CreateFailed { .. }));
        assert_eq!(inspect(&path).unwrap().counts.observation_points, 1);
    }

    #[test]
    fn test_open_leaves_foreign_sqlite_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER)")
            .unwrap();

        let err = Storage::open(&path).unwrap_err();
        assert!(matches!(err, Error::CreateFailed { .. }));

        let conn = Connection::open(&path).unwrap();
        let app_id: i32 = conn
            .query_row("PRAGMA application_id", [], |row| row.get(0))
            .unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(app_id, 0);
        assert_eq!(mode, "delete");
    }

    #[test]
    fn test_open_accepts_empty_placeholder_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.gpkg");
        std::fs::write(&path, b"").unwrap();
        assert!(Storage::open(&path).is_ok());
    }

    #[test]
    fn test_rolled_back_event_leaves_no_rows() {
        let (_dir, mut storage) = create_test_storage();
        storage
            .connection()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_links BEFORE INSERT ON gps_observation_points_sat_data
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let a = storage.insert_satellite_measurement(&measurement(1)).unwrap();

        storage.begin_event().unwrap();
        let p = storage.insert_observation_point(&point(10.0, 20.0)).unwrap();
        let err = storage
            .link_measurements_to_observation_point(&[a], p)
            .unwrap_err();
        assert!(err.is_write_failure());
        storage.rollback_event().unwrap();

        let counts = storage.row_counts().unwrap();
        assert_eq!(counts.observation_points, 0);
        assert_eq!(counts.satellite_measurements, 1);
        assert!(storage.bounding_box().is_empty());
        assert_eq!(contents_extent(&storage), (180.0, -180.0, 90.0, -90.0));
    }

    #[test]
    fn test_committed_event_keeps_rows_and_extent() {
        let (_dir, mut storage) = create_test_storage();
        storage.begin_event().unwrap();
        storage.insert_observation_point(&point(10.0, 20.0)).unwrap();
        storage.commit_event().unwrap();

        storage.begin_event().unwrap();
        storage.insert_observation_point(&point(11.0, 21.0)).unwrap();
        storage.rollback_event().unwrap();

        assert_eq!(storage.row_counts().unwrap().observation_points, 1);
        assert_eq!(contents_extent(&storage), (20.0, 20.0, 10.0, 10.0));
        assert!(!storage.bounding_box().contains(21.0, 11.0));
    }

    #[test]
    fn test_failed_extent_update_keeps_tracked_box() {
        let (_dir, mut storage) = create_test_storage();
        storage
            .connection()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER freeze_extent BEFORE UPDATE ON gpkg_contents
                 BEGIN SELECT RAISE(ABORT, 'frozen'); END;",
            )
            .unwrap();
        let err = storage
            .insert_observation_point(&point(10.0, 20.0))
            .unwrap_err();
        assert!(err.is_write_failure());
        assert!(storage.bounding_box().is_empty());
    }

    #[test]
    fn test_insert_observation_point_writes_geometry() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.insert_observation_point(&point(38.9, -77.0)).unwrap();
        let blob: Vec<u8> = storage
            .connection()
            .unwrap()
            .query_row(
                "SELECT geom FROM gps_observation_points WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(geometry::decode_point_z(&blob), Some((-77.0, 38.9, 5.0)));
    }

    #[test]
    fn test_bounding_box_persisted_on_widening() {
        let (_dir, mut storage) = create_test_storage();
        storage.insert_observation_point(&point(10.0, 20.0)).unwrap();
        assert_eq!(contents_extent(&storage), (20.0, 20.0, 10.0, 10.0));

        storage.insert_observation_point(&point(12.0, 18.0)).unwrap();
        assert_eq!(contents_extent(&storage), (18.0, 20.0, 10.0, 12.0));

        storage.insert_observation_point(&point(11.0, 19.0)).unwrap();
        assert_eq!(contents_extent(&storage), (18.0, 20.0, 10.0, 12.0));
        assert!(storage.bounding_box().contains(19.0, 11.0));
    }

    #[test]
    fn test_links_and_counts() {
        let (_dir, mut storage) = create_test_storage();
        let clock = storage
            .insert_clock_record(&ClockRecord::from_clock(&GnssClock::default()))
            .unwrap();
        let a = storage.insert_satellite_measurement(&measurement(1)).unwrap();
        let b = storage.insert_satellite_measurement(&measurement(2)).unwrap();
        storage.link_measurement_to_clock(a, clock).unwrap();
        storage.link_measurement_to_clock(b, clock).unwrap();
        let p = storage.insert_observation_point(&point(1.0, 1.0)).unwrap();
        storage.link_measurements_to_observation_point(&[a, b], p).unwrap();
        storage.link_measurements_to_observation_point(&[], p).unwrap();

        let counts = storage.row_counts().unwrap();
        assert_eq!(counts.observation_points, 1);
        assert_eq!(counts.satellite_measurements, 2);
        assert_eq!(counts.clock_records, 1);
        assert_eq!(counts.measurement_clock_links, 2);
        assert_eq!(counts.point_measurement_links, 2);
        assert_eq!(counts.motion_samples, 0);
    }

    #[test]
    fn test_optional_columns_never_null() {
        let (_dir, mut storage) = create_test_storage();
        storage.insert_observation_point(&point(1.0, 1.0)).unwrap();
        storage.insert_satellite_measurement(&measurement(7)).unwrap();
        let conn = storage.connection().unwrap();
        let nulls: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM gps_observation_points
                 WHERE Speed IS NULL OR Bearing IS NULL OR VerticalAccuracy IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 0);
        let (has_agc, agc): (i64, f64) = conn
            .query_row("SELECT has_agc, agc FROM sat_data", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((has_agc, agc), (0, 0.0));
    }

    #[test]
    fn test_close_is_idempotent_and_removes_wal() {
        let (dir, mut storage) = create_test_storage();
        storage.insert_observation_point(&point(1.0, 2.0)).unwrap();
        storage.close().unwrap();
        storage.close().unwrap();
        assert!(!storage.is_open());
        assert!(!dir.path().join("test.gpkg-wal").exists());
        assert!(storage.insert_observation_point(&point(1.0, 2.0)).is_err());
    }

    #[test]
    fn test_inspect_finished_file() {
        let (dir, mut storage) = create_test_storage();
        storage.insert_observation_point(&point(38.9, -77.0)).unwrap();
        storage.close().unwrap();

        let summary = inspect(dir.path().join("test.gpkg")).unwrap();
        assert_eq!(summary.counts.observation_points, 1);
        let bbox = summary.bounding_box.unwrap();
        assert_eq!((bbox.min_x, bbox.max_y), (-77.0, 38.9));
    }

    #[test]
    fn test_inspect_empty_recording_has_no_extent() {
        let (dir, mut storage) = create_test_storage();
        storage.close().unwrap();
        let summary = inspect(dir.path().join("test.gpkg")).unwrap();
        assert!(summary.bounding_box.is_none());
        assert_eq!(summary.counts, TableCounts::default());
    }

    #[test]
    fn test_inspect_rejects_plain_sqlite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER)")
            .unwrap();
        let err = inspect(&path).unwrap_err();
        assert!(matches!(err, Error::NotAGeoPackage { .. }));
    }
}
