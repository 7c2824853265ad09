use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::state::lifecycle::RaceStatus;

/// Representation of a race stored in persistence and shared across layers.
///
/// The race is the aggregate root; participant rows reference it by code and
/// cannot semantically outlive it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaceEntity {
    /// Short human-typed room code, case-normalized and unique.
    pub code: String,
    /// Lifecycle status, monotonic across `waiting -> active -> finished`.
    pub status: RaceStatus,
    /// Index into the configured sentence corpus.
    pub sentence_index: usize,
    /// Identity of the user who created the room.
    pub created_by: String,
    /// When the room was created.
    pub created_at: SystemTime,
    /// Stamped exactly once at the `waiting -> active` transition.
    pub started_at: Option<SystemTime>,
    /// Stamped when the last participant finished.
    pub finished_at: Option<SystemTime>,
    /// Countdown between activation and the typing start instant.
    pub countdown_secs: u32,
}

/// One user's membership and live metrics within a race.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantEntity {
    /// Code of the owning race.
    pub race_code: String,
    /// Stable identity supplied by the upstream auth layer.
    pub user_id: String,
    /// Display name captured at join time.
    pub user_name: String,
    /// Avatar URL captured at join time.
    pub user_image: Option<String>,
    /// Cumulative typed-character count.
    pub progress: u32,
    /// Accuracy percentage, normalized and clamped to [0, 100].
    pub accuracy: f64,
    /// Words per minute computed from correct characters only.
    pub wpm: f64,
    /// Words per minute computed from all typed characters.
    pub raw_wpm: f64,
    /// True once the participant typed the full sentence.
    pub finished: bool,
    /// When the participant finished.
    pub finished_at: Option<SystemTime>,
    /// Sequence number of the last applied progress update.
    pub last_seq: u64,
    /// When the participant joined; orders the roster and breaks leaderboard ties.
    pub joined_at: SystemTime,
}

impl ParticipantEntity {
    /// Fresh row for a user who just joined, with zeroed metrics.
    pub fn joined(
        race_code: String,
        user_id: String,
        user_name: String,
        user_image: Option<String>,
        joined_at: SystemTime,
    ) -> Self {
        Self {
            race_code,
            user_id,
            user_name,
            user_image,
            progress: 0,
            accuracy: 0.0,
            wpm: 0.0,
            raw_wpm: 0.0,
            finished: false,
            finished_at: None,
            last_seq: 0,
            joined_at,
        }
    }
}

/// Metric fields applied by a progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressPatch {
    /// Client-side sequence number; `None` falls back to last-write-wins.
    pub seq: Option<u64>,
    pub progress: u32,
    pub accuracy: f64,
    pub wpm: f64,
    pub raw_wpm: f64,
}

/// Result of applying a progress update to a participant row.
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    /// The row after the operation, applied or not.
    pub row: ParticipantEntity,
    /// False when the update was ignored (stale sequence or already finished).
    pub applied: bool,
}

/// Final metric fields recorded when a participant finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishPatch {
    pub accuracy: f64,
    pub wpm: f64,
    pub raw_wpm: f64,
    pub finished_at: SystemTime,
}

/// Result of marking a participant finished.
#[derive(Debug, Clone)]
pub struct FinishOutcome {
    /// The participant row after the operation.
    pub row: ParticipantEntity,
    /// Participants of the race still unfinished after this call.
    pub remaining_unfinished: u64,
}
