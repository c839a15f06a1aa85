use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::Stream;

/// Classification of a monitored stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Online,
    Down,
    Silence,
    Error,
    /// Initial state for streams that have never been checked.
    Unknown,
}

impl StreamStatus {
    /// Parse a status string stored in the registry. Anything unrecognized
    /// reads as `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value {
            "online" => StreamStatus::Online,
            "down" => StreamStatus::Down,
            "silence" => StreamStatus::Silence,
            "error" => StreamStatus::Error,
            _ => StreamStatus::Unknown,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, StreamStatus::Online)
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamStatus::Online => write!(f, "online"),
            StreamStatus::Down => write!(f, "down"),
            StreamStatus::Silence => write!(f, "silence"),
            StreamStatus::Error => write!(f, "error"),
            StreamStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Map a peak-volume reading to a status.
///
/// A reading exactly at the threshold counts as online. There is no
/// hysteresis band: a stream hovering around the threshold may flap
/// between states on consecutive rounds.
pub fn classify(volume_db: f64, threshold_db: f64) -> StreamStatus {
    if volume_db < threshold_db { StreamStatus::Down } else { StreamStatus::Online }
}

/// Outcome of one monitoring attempt for one stream.
///
/// Created once per attempt and immutable afterwards; ownership passes to
/// whichever sink persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Fresh UUID generated per attempt
    pub id: Uuid,

    pub stream_id: Uuid,

    pub account_id: Uuid,

    pub status: StreamStatus,

    /// Peak volume in dB as reported by the analysis tool. `0.0` when the
    /// capture or probe failed; may be absent on rows written by older
    /// deployments.
    pub volume_db: Option<f64>,

    /// True once classification finished, regardless of status.
    pub completed: bool,

    pub timestamp: DateTime<Utc>,
}

impl CheckResult {
    /// Build a result from a measured volume, applying the threshold rule.
    pub fn classified(stream: &Stream, volume_db: f64, threshold_db: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream_id: stream.id,
            account_id: stream.account_id,
            status: classify(volume_db, threshold_db),
            volume_db: Some(volume_db),
            completed: true,
            timestamp: Utc::now(),
        }
    }

    /// Build a result for a failed capture or probe.
    ///
    /// Failures always classify as down with zero volume; the persisted
    /// status does not distinguish unreachable from silent, only the log
    /// trail does.
    pub fn failed(stream: &Stream) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream_id: stream.id,
            account_id: stream.account_id,
            status: StreamStatus::Down,
            volume_db: Some(0.0),
            completed: true,
            timestamp: Utc::now(),
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume_db.unwrap_or(0.0)
    }
}
