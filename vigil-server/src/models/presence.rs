use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Settled occupancy classification of the monitored room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Empty,
    OwnerPresent,
    UnknownPerson,
    MultiplePeople,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceRole {
    Owner,
    Known,
    Unknown,
}

/// One face reported by the recognizer for a single frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecognizedFace {
    pub role: FaceRole,
    pub name: String,
    pub confidence: f32,
}

impl RecognizedFace {
    pub fn new(role: FaceRole, name: impl Into<String>, confidence: f32) -> Self {
        Self {
            role,
            name: name.into(),
            confidence,
        }
    }
}

/// Snapshot of room occupancy. Mutated only by the presence monitor,
/// handed out to consumers as a plain copy.
#[derive(Clone, Debug, Serialize)]
pub struct RoomState {
    pub presence: PresenceState,
    pub owner_detected: bool,
    pub owner_name: Option<String>,
    pub num_faces: usize,
    pub last_detection_time: Option<OffsetDateTime>,
    pub empty_since: Option<OffsetDateTime>,
    pub intruder_active: bool,
}

impl Default for RoomState {
    fn default() -> Self {
        Self {
            presence: PresenceState::Empty,
            owner_detected: false,
            owner_name: None,
            num_faces: 0,
            last_detection_time: None,
            empty_since: None,
            intruder_active: false,
        }
    }
}

/// Append-only log entry for a confirmed unknown person.
/// `duration_seconds` is back-filled when the recording stops.
#[derive(Clone, Debug, Serialize)]
pub struct IntruderRecord {
    pub timestamp: OffsetDateTime,
    pub photo_path: PathBuf,
    pub video_path: Option<PathBuf>,
    pub duration_seconds: f64,
    pub activity_summary: Option<String>,
}
