//! Correlation of satellite measurement rows with location fixes.
//!
//! Satellite rows written since the last fix are held here as pending and
//! handed out exactly once when the next fix arrives. The buffer also keeps
//! the latest status snapshot per satellite for row enrichment.
//!
//! The buffer is owned by the writer thread and mutated through `&mut self`,
//! so there is never more than one party touching it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::event::{SatelliteKey, SatelliteStatus};
use crate::storage::RowId;

/// Which pending measurement rows a fix is linked to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationPolicy {
    /// Only the newest row per satellite; older ones stay unlinked.
    #[default]
    LatestPerSatellite,
    /// Every row written since the previous fix.
    AllPending,
}

impl std::fmt::Display for CorrelationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LatestPerSatellite => write!(f, "latest_per_satellite"),
            Self::AllPending => write!(f, "all_pending"),
        }
    }
}

/// Pending satellite rows and the latest status snapshot per satellite.
#[derive(Debug, Default)]
pub struct CorrelationBuffer {
    policy: CorrelationPolicy,
    statuses: HashMap<SatelliteKey, SatelliteStatus>,
    pending: HashMap<SatelliteKey, Vec<RowId>>,
}

impl CorrelationBuffer {
    /// Create an empty buffer using `policy`.
    #[must_use]
    pub fn new(policy: CorrelationPolicy) -> Self {
        Self {
            policy,
            statuses: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// The policy this buffer applies.
    #[must_use]
    pub fn policy(&self) -> CorrelationPolicy {
        self.policy
    }

    /// Replace the stored snapshot for the status's satellite.
    pub fn record_status(&mut self, status: SatelliteStatus) {
        self.statuses.insert(status.key(), status);
    }

    /// Latest snapshot for `key`, if one has been recorded.
    #[must_use]
    pub fn status_for(&self, key: &SatelliteKey) -> Option<&SatelliteStatus> {
        self.statuses.get(key)
    }

    /// Mark `row_id` as awaiting the next fix.
    pub fn push_measurement(&mut self, key: SatelliteKey, row_id: RowId) {
        let rows = self.pending.entry(key).or_default();
        match self.policy {
            CorrelationPolicy::LatestPerSatellite => {
                if let Some(previous) = rows.pop() {
                    trace!("Row {} for {} superseded by {}", previous, key, row_id);
                }
                rows.push(row_id);
            }
            CorrelationPolicy::AllPending => rows.push(row_id),
        }
    }

    /// Number of rows awaiting a fix.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Every pending row id, sorted ascending, without releasing them.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.pending.values().flatten().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Take every pending row id, sorted ascending, leaving the set empty.
    pub fn drain_for_fix(&mut self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.pending.drain().flat_map(|(_, rows)| rows).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Constellation;

    fn key(svid: i32) -> SatelliteKey {
        SatelliteKey::new(Constellation::Gps, svid)
    }

    fn status(svid: i32, used_in_fix: bool) -> SatelliteStatus {
        SatelliteStatus {
            svid,
            constellation: Constellation::Gps,
            cn0_dbhz: 30.0,
            has_almanac: false,
            has_ephemeris: false,
            used_in_fix,
            elevation_deg: 0.0,
            azimuth_deg: 0.0,
            carrier_frequency_hz: None,
        }
    }

    #[test]
    fn test_record_status_replaces_previous() {
        let mut buffer = CorrelationBuffer::default();
        buffer.record_status(status(12, false));
        buffer.record_status(status(12, true));
        assert!(buffer.status_for(&key(12)).unwrap().used_in_fix);
        assert!(buffer.status_for(&key(13)).is_none());
    }

    #[test]
    fn test_status_keys_include_constellation() {
        let mut buffer = CorrelationBuffer::default();
        buffer.record_status(status(12, true));
        let galileo = SatelliteKey::new(Constellation::Galileo, 12);
        assert!(buffer.status_for(&galileo).is_none());
    }

    #[test]
    fn test_latest_per_satellite_overwrites() {
        let mut buffer = CorrelationBuffer::new(CorrelationPolicy::LatestPerSatellite);
        buffer.push_measurement(key(1), 10);
        buffer.push_measurement(key(2), 11);
        buffer.push_measurement(key(1), 12);
        assert_eq!(buffer.pending_len(), 2);
        assert_eq!(buffer.drain_for_fix(), vec![11, 12]);
    }

    #[test]
    fn test_all_pending_keeps_every_row() {
        let mut buffer = CorrelationBuffer::new(CorrelationPolicy::AllPending);
        buffer.push_measurement(key(1), 10);
        buffer.push_measurement(key(2), 11);
        buffer.push_measurement(key(1), 12);
        assert_eq!(buffer.drain_for_fix(), vec![10, 11, 12]);
    }

    #[test]
    fn test_pending_ids_do_not_release_rows() {
        let mut buffer = CorrelationBuffer::new(CorrelationPolicy::AllPending);
        buffer.push_measurement(key(2), 7);
        buffer.push_measurement(key(1), 3);
        assert_eq!(buffer.pending_ids(), vec![3, 7]);
        assert_eq!(buffer.pending_len(), 2);
        assert_eq!(buffer.drain_for_fix(), vec![3, 7]);
    }

    #[test]
    fn test_drain_clears_pending() {
        let mut buffer = CorrelationBuffer::default();
        buffer.push_measurement(key(5), 1);
        assert_eq!(buffer.drain_for_fix(), vec![1]);
        assert!(buffer.drain_for_fix().is_empty());
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_drain_keeps_statuses() {
        let mut buffer = CorrelationBuffer::default();
        buffer.record_status(status(3, true));
        buffer.push_measurement(key(3), 1);
        buffer.drain_for_fix();
        assert!(buffer.status_for(&key(3)).is_some());
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(CorrelationPolicy::default().to_string(), "latest_per_satellite");
        assert_eq!(CorrelationPolicy::AllPending.to_string(), "all_pending");
    }
}
