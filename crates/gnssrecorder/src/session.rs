//! Recording session lifecycle and the producer-facing [`Recorder`].
//!
//! A session owns one GeoPackage file and one writer thread. Producers on
//! any thread hand events to [`Recorder::submit`]; the writer applies them
//! in order. Stopping a session drains the queue, finalizes the file and
//! removes SQLite side files.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{GnssEvent, LocationFix, MeasurementBatch, SatelliteStatus, SensorSample};
use crate::stats::{RecorderStats, StatsSnapshot};
use crate::storage::{GeoPackageOpener, StoreOpener};
use crate::writer::{self, EventSender, Writer, WriterSummary};

/// Suffixes SQLite may leave next to a database file.
const SIDE_FILE_SUFFIXES: &[&str] = &["-journal", "-wal", "-shm"];

/// Timestamp layout used in session file names.
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug)]
enum SessionState {
    Closed,
    Open(OpenSession),
}

#[derive(Debug)]
struct OpenSession {
    path: PathBuf,
    started_at: DateTime<Utc>,
    sender: EventSender,
    handle: JoinHandle<Result<WriterSummary>>,
}

/// Records GNSS and sensor events into one GeoPackage per session.
///
/// `Recorder` is `Sync`: share it behind an `Arc` and call the `on_*`
/// methods from every callback thread.
///
/// # Examples
///
/// ```no_run
/// use gnssrecorder::{Config, LocationFix, Recorder};
///
/// let recorder = Recorder::new(Config::default());
/// let path = recorder.start_session("/tmp/recordings")?;
/// recorder.on_location_changed(LocationFix::new(38.9, -77.0, 10.0))?;
/// assert_eq!(recorder.stop_session()?, Some(path));
/// # Ok::<(), gnssrecorder::Error>(())
/// ```
#[derive(Debug)]
pub struct Recorder {
    config: Config,
    opener: Arc<dyn StoreOpener>,
    state: RwLock<SessionState>,
    stats: Arc<RecorderStats>,
}

impl Recorder {
    /// Create a recorder that writes GeoPackage files.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_opener(config, Arc::new(GeoPackageOpener))
    }

    /// Create a recorder whose sessions are stored by `opener`.
    #[must_use]
    pub fn with_opener(config: Config, opener: Arc<dyn StoreOpener>) -> Self {
        Self {
            config,
            opener,
            state: RwLock::new(SessionState::Closed),
            stats: Arc::new(RecorderStats::new()),
        }
    }

    /// The configuration this recorder was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a session in the configured output directory.
    ///
    /// # Errors
    ///
    /// See [`Recorder::start_session`].
    pub fn start(&self) -> Result<PathBuf> {
        self.start_session(self.config.output_dir())
    }

    /// Start a new session with a timestamped file under `base_dir`.
    ///
    /// An already open session is stopped first. Returns the path of the
    /// new file. On error no session is open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the file naming settings are
    /// invalid, [`Error::CreateFailed`] or [`Error::SchemaInitFailed`] if
    /// the file cannot be set up, or [`Error::Io`] if the writer thread
    /// cannot be spawned.
    pub fn start_session(&self, base_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let base_dir = base_dir.as_ref();
        self.config.validate()?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if let SessionState::Open(previous) = std::mem::replace(&mut *state, SessionState::Closed)
        {
            info!(
                "Closing session {} before starting a new one",
                previous.path.display()
            );
            if let Err(e) = self.finish(previous) {
                warn!("Previous session did not close cleanly: {}", e);
            }
        }

        std::fs::create_dir_all(base_dir)
            .map_err(|source| Error::create_failed(base_dir, source))?;

        let started_at = Utc::now();
        let path = unique_session_path(
            base_dir,
            &self.config.recording.file_prefix,
            &self.config.recording.extension,
            started_at,
        );

        let store = self.opener.open(&path)?;
        let (sender, receiver) = writer::channel(self.config.writer.queue_capacity);
        let writer = Writer::new(
            store,
            self.config.correlation.policy,
            Arc::clone(&self.stats),
        );
        let handle = writer::spawn(writer, receiver)?;

        info!(
            "Recording to {} ({} correlation)",
            path.display(),
            self.config.correlation.policy
        );
        *state = SessionState::Open(OpenSession {
            path: path.clone(),
            started_at,
            sender,
            handle,
        });
        Ok(path)
    }

    /// Stop the open session and return its file path.
    ///
    /// Blocks until the writer has drained the queue and closed the file.
    /// Returns `Ok(None)` if no session is open.
    ///
    /// # Errors
    ///
    /// Returns the error the writer hit while closing the file, or
    /// [`Error::WriterPanicked`]. The session counts as stopped either way.
    pub fn stop_session(&self) -> Result<Option<PathBuf>> {
        let session = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, SessionState::Closed) {
                SessionState::Closed => return Ok(None),
                SessionState::Open(session) => session,
            }
        };
        self.finish(session).map(Some)
    }

    fn finish(&self, session: OpenSession) -> Result<PathBuf> {
        let OpenSession {
            path,
            started_at,
            sender,
            handle,
        } = session;

        drop(sender);
        let summary = handle
            .join()
            .map_err(|_| Error::WriterPanicked { path: path.clone() })??;

        if self.config.recording.remove_journal_files {
            remove_side_files(&path);
        }

        let elapsed = Utc::now().signed_duration_since(started_at);
        info!(
            "Stopped recording {} after {}s ({} events, {} failed, {} unlinked measurements)",
            path.display(),
            elapsed.num_seconds(),
            summary.events,
            summary.failures,
            summary.unlinked_measurements
        );
        Ok(path)
    }

    /// Whether a session is open.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            SessionState::Open(_)
        )
    }

    /// Path of the open session's file.
    #[must_use]
    pub fn current_path(&self) -> Option<PathBuf> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            SessionState::Open(session) => Some(session.path.clone()),
            SessionState::Closed => None,
        }
    }

    /// Counters accumulated over the recorder's lifetime.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Queue an event for the writer without blocking.
    ///
    /// Without an open session the event is counted and dropped and
    /// `Ok(())` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overloaded`] if the bounded queue is full.
    pub fn submit(&self, event: GnssEvent) -> Result<()> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let SessionState::Open(session) = &*state else {
            trace!("Not recording, dropping {} event", event.kind());
            self.stats.record_not_recording();
            return Ok(());
        };

        match session.sender.send(event) {
            Ok(()) => {
                self.stats.record_submitted();
                Ok(())
            }
            Err(e) => {
                if e.is_overloaded() {
                    self.stats.record_overloaded();
                } else {
                    self.stats.record_not_recording();
                }
                Err(e)
            }
        }
    }

    /// Record a location fix.
    ///
    /// # Errors
    ///
    /// See [`Recorder::submit`].
    pub fn on_location_changed(&self, fix: LocationFix) -> Result<()> {
        self.submit(GnssEvent::Location(fix))
    }

    /// Record one epoch of raw GNSS measurements.
    ///
    /// # Errors
    ///
    /// See [`Recorder::submit`].
    pub fn on_gnss_measurements_received(&self, batch: MeasurementBatch) -> Result<()> {
        self.submit(GnssEvent::Measurements(batch))
    }

    /// Record a satellite status snapshot.
    ///
    /// # Errors
    ///
    /// See [`Recorder::submit`].
    pub fn on_satellite_status_changed(&self, satellites: Vec<SatelliteStatus>) -> Result<()> {
        self.submit(GnssEvent::SatelliteStatus { satellites })
    }

    /// Record a motion-sensor sample.
    ///
    /// # Errors
    ///
    /// See [`Recorder::submit`].
    pub fn on_sensor_updated(&self, sample: SensorSample) -> Result<()> {
        self.submit(GnssEvent::Sensor(sample))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        match self.stop_session() {
            Ok(Some(path)) => debug!("Recorder dropped, closed {}", path.display()),
            Ok(None) => {}
            Err(e) => warn!("Recorder dropped, session did not close cleanly: {}", e),
        }
    }
}

/// Build `<prefix>-<UTC timestamp>.<ext>` under `dir`, adding `-1`, `-2`, ...
/// until the name is unused.
fn unique_session_path(dir: &Path, prefix: &str, extension: &str, at: DateTime<Utc>) -> PathBuf {
    let stem = format!("{prefix}-{}", at.format(FILE_TIMESTAMP_FORMAT));
    let mut path = dir.join(format!("{stem}.{extension}"));
    let mut n = 1u32;
    while path.exists() {
        path = dir.join(format!("{stem}-{n}.{extension}"));
        n += 1;
    }
    path
}

/// Delete SQLite side files of `path`, ignoring failures.
fn remove_side_files(path: &Path) {
    for suffix in SIDE_FILE_SUFFIXES {
        let mut name = OsString::from(path.as_os_str());
        name.push(suffix);
        let side = PathBuf::from(name);
        if side.exists() {
            match std::fs::remove_file(&side) {
                Ok(()) => debug!("Removed {}", side.display()),
                Err(e) => debug!("Could not remove {}: {}", side.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_session_path_format() {
        let dir = TempDir::new().unwrap();
        let path = unique_session_path(dir.path(), "GNSS-RECORDER", "gpkg", at());
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "GNSS-RECORDER-20240309-070501.gpkg"
        );
    }

    #[test]
    fn test_session_path_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let first = unique_session_path(dir.path(), "S", "gpkg", at());
        std::fs::write(&first, b"").unwrap();
        let second = unique_session_path(dir.path(), "S", "gpkg", at());
        std::fs::write(&second, b"").unwrap();
        let third = unique_session_path(dir.path(), "S", "gpkg", at());
        assert!(second.ends_with("S-20240309-070501-1.gpkg"));
        assert!(third.ends_with("S-20240309-070501-2.gpkg"));
    }

    #[test]
    fn test_remove_side_files() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("x.gpkg");
        std::fs::write(&db, b"db").unwrap();
        for suffix in SIDE_FILE_SUFFIXES {
            std::fs::write(dir.path().join(format!("x.gpkg{suffix}")), b"").unwrap();
        }
        remove_side_files(&db);
        assert!(db.exists());
        for suffix in SIDE_FILE_SUFFIXES {
            assert!(!dir.path().join(format!("x.gpkg{suffix}")).exists());
        }
    }

    #[test]
    fn test_submit_without_session_is_counted() {
        let recorder = Recorder::new(Config::default());
        assert!(!recorder.is_recording());
        recorder
            .on_location_changed(LocationFix::new(1.0, 2.0, 3.0))
            .unwrap();
        assert_eq!(recorder.stats().dropped_not_recording, 1);
        assert_eq!(recorder.stats().submitted, 0);
    }

    #[test]
    fn test_start_and_stop() {
        crate::logging::init_test_logging();
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::new(Config::default());

        let path = recorder.start_session(dir.path()).unwrap();
        assert!(recorder.is_recording());
        assert_eq!(recorder.current_path(), Some(path.clone()));

        assert_eq!(recorder.stop_session().unwrap(), Some(path.clone()));
        assert!(!recorder.is_recording());
        assert!(recorder.current_path().is_none());
        assert!(path.exists());
        assert_eq!(recorder.stop_session().unwrap(), None);
    }

    #[test]
    fn test_start_uses_configured_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.recording.output_dir = Some(dir.path().join("out"));
        config.recording.file_prefix = "CFG".to_string();
        let recorder = Recorder::new(config);

        let path = recorder.start().unwrap();
        assert!(path.starts_with(dir.path().join("out")));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("CFG-"));
    }

    #[test]
    fn test_start_failure_leaves_recorder_closed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let recorder = Recorder::new(Config::default());

        let err = recorder.start_session(&blocker).unwrap_err();
        assert!(matches!(err, Error::CreateFailed { .. }));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_start_rejects_prefix_escaping_directory() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base");
        let mut config = Config::default();
        config.recording.file_prefix = "../x".to_string();
        let recorder = Recorder::new(config);

        let err = recorder.start_session(&base).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
        assert!(!recorder.is_recording());
        assert!(!base.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_closes_open_session() {
        let dir = TempDir::new().unwrap();
        let path = {
            let recorder = Recorder::new(Config::default());
            recorder.start_session(dir.path()).unwrap()
        };
        let mut wal = OsString::from(path.as_os_str());
        wal.push("-wal");
        assert!(!PathBuf::from(wal).exists());
        assert!(crate::storage::inspect(&path).is_ok());
    }
}
