//! The single writer thread of a recording session.
//!
//! Producers push [`GnssEvent`]s into a channel; one dedicated thread owns
//! the store and the correlation buffer and applies events in arrival
//! order. When every sender is dropped the thread drains what is left,
//! closes the store and returns a [`WriterSummary`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::correlation::{CorrelationBuffer, CorrelationPolicy};
use crate::error::{Error, Result};
use crate::event::{GnssEvent, LocationFix, MeasurementBatch, SensorSample};
use crate::stats::RecorderStats;
use crate::storage::records::{
    ClockRecord, MotionRecord, ObservationPoint, SatelliteMeasurementRecord,
};
use crate::storage::RecordStore;

/// Producer half of the writer queue.
#[derive(Debug, Clone)]
pub enum EventSender {
    /// Never rejects events.
    Unbounded(mpsc::UnboundedSender<GnssEvent>),
    /// Rejects events once `capacity` are queued.
    Bounded {
        /// Channel sender.
        tx: mpsc::Sender<GnssEvent>,
        /// Queue capacity.
        capacity: usize,
    },
}

impl EventSender {
    /// Enqueue an event without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overloaded`] when a bounded queue is full, or an
    /// internal error when the writer thread has already exited.
    pub fn send(&self, event: GnssEvent) -> Result<()> {
        match self {
            Self::Unbounded(tx) => tx
                .send(event)
                .map_err(|_| Error::internal("writer thread has exited")),
            Self::Bounded { tx, capacity } => tx.try_send(event).map_err(|e| match e {
                TrySendError::Full(_) => Error::Overloaded {
                    capacity: *capacity,
                },
                TrySendError::Closed(_) => Error::internal("writer thread has exited"),
            }),
        }
    }
}

/// Consumer half of the writer queue.
#[derive(Debug)]
pub enum EventReceiver {
    /// Receives from an unbounded queue.
    Unbounded(mpsc::UnboundedReceiver<GnssEvent>),
    /// Receives from a bounded queue.
    Bounded(mpsc::Receiver<GnssEvent>),
}

impl EventReceiver {
    /// Wait for the next event; `None` once every sender is gone and the
    /// queue is empty.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<GnssEvent> {
        match self {
            Self::Unbounded(rx) => rx.blocking_recv(),
            Self::Bounded(rx) => rx.blocking_recv(),
        }
    }
}

/// Create a writer queue. A `capacity` of zero means unbounded.
#[must_use]
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender::Unbounded(tx), EventReceiver::Unbounded(rx))
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (
            EventSender::Bounded { tx, capacity },
            EventReceiver::Bounded(rx),
        )
    }
}

/// What a writer did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    /// Events taken off the queue.
    pub events: u64,
    /// Events that failed to persist.
    pub failures: u64,
    /// Satellite rows still waiting for a fix when the session ended.
    pub unlinked_measurements: usize,
}

/// Applies events to a store. Owned by exactly one thread.
pub struct Writer {
    store: Box<dyn RecordStore>,
    buffer: CorrelationBuffer,
    stats: Arc<RecorderStats>,
    summary: WriterSummary,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("path", &self.store.path())
            .field("buffer", &self.buffer)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl Writer {
    /// Create a writer over `store`.
    #[must_use]
    pub fn new(
        store: Box<dyn RecordStore>,
        policy: CorrelationPolicy,
        stats: Arc<RecorderStats>,
    ) -> Self {
        Self {
            store,
            buffer: CorrelationBuffer::new(policy),
            stats,
            summary: WriterSummary::default(),
        }
    }

    /// Apply one event to the store.
    ///
    /// # Errors
    ///
    /// Returns the first storage error hit while applying the event.
    pub fn handle(&mut self, event: GnssEvent) -> Result<()> {
        trace!("Writing {} event", event.kind());
        match event {
            GnssEvent::SatelliteStatus { satellites } => {
                for status in satellites {
                    self.buffer.record_status(status);
                }
                Ok(())
            }
            GnssEvent::Measurements(batch) => self.write_measurements(&batch),
            GnssEvent::Location(fix) => self.write_location(&fix),
            GnssEvent::Sensor(sample) => self.write_motion(&sample),
        }
    }

    fn write_measurements(&mut self, batch: &MeasurementBatch) -> Result<()> {
        let buffer = &self.buffer;
        let now = Utc::now();
        let (clock_id, rows) = atomically(&mut *self.store, |store| {
            let clock_id = store.insert_clock_record(&ClockRecord::from_clock(&batch.clock))?;
            let mut rows = Vec::with_capacity(batch.measurements.len());
            for measurement in &batch.measurements {
                let key = measurement.key();
                let record =
                    SatelliteMeasurementRecord::enriched(measurement, buffer.status_for(&key), now);
                let row_id = store.insert_satellite_measurement(&record)?;
                store.link_measurement_to_clock(row_id, clock_id)?;
                rows.push((key, row_id));
            }
            Ok((clock_id, rows))
        })?;

        debug!("Wrote clock {} with {} measurements", clock_id, rows.len());
        for (key, row_id) in rows {
            self.buffer.push_measurement(key, row_id);
        }
        Ok(())
    }

    fn write_location(&mut self, fix: &LocationFix) -> Result<()> {
        let point = ObservationPoint::from_fix(fix, Utc::now());
        let ids = self.buffer.pending_ids();
        let point_id = atomically(&mut *self.store, |store| {
            let point_id = store.insert_observation_point(&point)?;
            store.link_measurements_to_observation_point(&ids, point_id)?;
            Ok(point_id)
        })?;

        // Pending rows are only released once the links are committed.
        self.buffer.drain_for_fix();
        debug!("Fix {} closed {} measurements", point_id, ids.len());
        Ok(())
    }

    fn write_motion(&mut self, sample: &SensorSample) -> Result<()> {
        match MotionRecord::from_sample(sample) {
            Some(record) => {
                self.store.insert_motion_sample(&record)?;
            }
            None => trace!("Ignoring {:?} sample", sample.kind),
        }
        Ok(())
    }

    /// Process events until the queue is closed and empty, then close the store.
    ///
    /// Failed events are logged and counted; they never stop the loop.
    ///
    /// # Errors
    ///
    /// Returns an error only if closing the store fails.
    pub fn run(mut self, mut rx: EventReceiver) -> Result<WriterSummary> {
        debug!(
            "Writer started on {} ({} correlation)",
            self.store.path().display(),
            self.buffer.policy()
        );
        while let Some(event) = rx.blocking_recv() {
            self.summary.events += 1;
            let kind = event.kind();
            match self.handle(event) {
                Ok(()) => self.stats.record_written(),
                Err(e) => {
                    warn!("Failed to write {} event: {}", kind, e);
                    self.summary.failures += 1;
                    self.stats.record_write_failure();
                }
            }
        }

        self.summary.unlinked_measurements = self.buffer.pending_len();
        if self.summary.unlinked_measurements > 0 {
            debug!(
                "{} measurements never saw a fix",
                self.summary.unlinked_measurements
            );
        }

        self.store.close()?;
        info!(
            "Writer finished: {} events, {} failures",
            self.summary.events, self.summary.failures
        );
        Ok(self.summary)
    }
}

/// Run `apply` as one event: commit if it succeeds, roll back otherwise.
fn atomically<T>(
    store: &mut dyn RecordStore,
    apply: impl FnOnce(&mut dyn RecordStore) -> Result<T>,
) -> Result<T> {
    store.begin_event()?;
    let outcome = apply(&mut *store).and_then(|value| store.commit_event().map(|()| value));
    if outcome.is_err() {
        if let Err(e) = store.rollback_event() {
            warn!("Failed to roll back event: {}", e);
        }
    }
    outcome
}

/// Start `writer` on its own named thread.
///
/// # Errors
///
/// Returns [`Error::Io`] if the thread cannot be spawned.
pub fn spawn(writer: Writer, rx: EventReceiver) -> Result<JoinHandle<Result<WriterSummary>>> {
    let handle = thread::Builder::new()
        .name("gnssrecorder-writer".to_string())
        .spawn(move || writer.run(rx))?;
    Ok(handle)
}
