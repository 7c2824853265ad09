//! Request and response bodies for the race endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{ParticipantEntity, RaceEntity},
    dto::format_system_time,
    state::lifecycle::RaceStatus,
};

/// Upper bound on client-reported words-per-minute; anything above is not a
/// plausible human result and gets rejected as invalid input.
pub const MAX_PLAUSIBLE_WPM: f64 = 350.0;

/// Full race view returned by every room operation and by the polling read.
#[derive(Debug, Serialize, ToSchema)]
pub struct RaceView {
    /// Room code identifying the race.
    pub code: String,
    /// Current lifecycle status.
    pub status: RaceStatus,
    /// Index of the target sentence in the corpus.
    pub sentence_index: usize,
    /// The target sentence text; `None` when the corpus no longer has the index.
    pub sentence: Option<String>,
    /// Identity of the room creator.
    pub created_by: String,
    /// RFC 3339 creation instant.
    pub created_at: String,
    /// RFC 3339 start instant, set once at activation. Clients derive their
    /// local countdown from this value and `countdown_secs` on every poll.
    pub started_at: Option<String>,
    /// RFC 3339 finish instant, set when the last participant finished.
    pub finished_at: Option<String>,
    /// Countdown length in seconds between activation and typing start.
    pub countdown_secs: u32,
    /// All participants in join order, with display fields for rendering.
    pub participants: Vec<ParticipantView>,
}

impl RaceView {
    /// Assemble the response from the aggregate root, its participant rows,
    /// and the resolved sentence text.
    pub fn assemble(
        race: RaceEntity,
        participants: Vec<ParticipantEntity>,
        sentence: Option<String>,
    ) -> Self {
        Self {
            code: race.code,
            status: race.status,
            sentence_index: race.sentence_index,
            sentence,
            created_by: race.created_by,
            created_at: format_system_time(race.created_at),
            started_at: race.started_at.map(format_system_time),
            finished_at: race.finished_at.map(format_system_time),
            countdown_secs: race.countdown_secs,
            participants: participants.into_iter().map(ParticipantView::from).collect(),
        }
    }
}

/// Public projection of a participant exposed to REST/SSE clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantView {
    pub user_id: String,
    pub user_name: String,
    pub user_image: Option<String>,
    pub progress: u32,
    pub accuracy: f64,
    pub wpm: f64,
    pub raw_wpm: f64,
    pub finished: bool,
    pub finished_at: Option<String>,
}

impl From<ParticipantEntity> for ParticipantView {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            user_name: value.user_name,
            user_image: value.user_image,
            progress: value.progress,
            accuracy: value.accuracy,
            wpm: value.wpm,
            raw_wpm: value.raw_wpm,
            finished: value.finished,
            finished_at: value.finished_at.map(format_system_time),
        }
    }
}

/// Keystroke-driven progress update pushed by a racing client.
///
/// Metrics are computed client-side from elapsed time and the comparison
/// against the target sentence; the server normalizes accuracy and bounds
/// wpm but does not recompute them.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ProgressRequest {
    /// Strictly increasing per-participant sequence number; updates arriving
    /// with a stale sequence are ignored. Omit to fall back to
    /// last-write-wins.
    #[serde(default)]
    pub seq: Option<u64>,
    /// Cumulative typed-character count.
    pub progress: u32,
    /// Accuracy, accepted as either a 0-1 fraction scaled by 100 or a 0-100
    /// percentage; values above 100 are divided by 100 before clamping.
    pub accuracy: f64,
    #[validate(range(min = 0.0, max = "MAX_PLAUSIBLE_WPM"))]
    pub wpm: f64,
    /// Defaults to `wpm` when omitted.
    #[serde(default)]
    #[validate(range(min = 0.0, max = "MAX_PLAUSIBLE_WPM"))]
    pub raw_wpm: Option<f64>,
}

/// Final metrics submitted when a client's input equals the target sentence.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct FinishRequest {
    #[validate(range(min = 0.0, max = "MAX_PLAUSIBLE_WPM"))]
    pub wpm: f64,
    /// Normalized the same way as progress accuracy.
    pub accuracy: f64,
    /// Defaults to `wpm` when omitted.
    #[serde(default)]
    #[validate(range(min = 0.0, max = "MAX_PLAUSIBLE_WPM"))]
    pub raw_wpm: Option<f64>,
}

/// One leaderboard row, sorted by wpm descending with join-order ties.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub user_name: String,
    pub user_image: Option<String>,
    pub wpm: f64,
    pub accuracy: f64,
    pub raw_wpm: f64,
    pub finished: bool,
}

impl From<ParticipantEntity> for LeaderboardEntry {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            user_name: value.user_name,
            user_image: value.user_image,
            wpm: value.wpm,
            accuracy: value.accuracy,
            raw_wpm: value.raw_wpm,
            finished: value.finished,
        }
    }
}

/// Response to a finish call: the caller's final row plus the race-scoped
/// leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct FinishResponse {
    pub participant: ParticipantView,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress_request(wpm: f64) -> ProgressRequest {
        ProgressRequest {
            seq: Some(1),
            progress: 10,
            accuracy: 95.0,
            wpm,
            raw_wpm: None,
        }
    }

    #[test]
    fn plausible_wpm_passes_validation() {
        assert!(progress_request(120.0).validate().is_ok());
        assert!(progress_request(0.0).validate().is_ok());
        assert!(progress_request(MAX_PLAUSIBLE_WPM).validate().is_ok());
    }

    #[test]
    fn implausible_wpm_fails_validation() {
        assert!(progress_request(500.0).validate().is_err());
        assert!(progress_request(-1.0).validate().is_err());
        assert!(progress_request(MAX_PLAUSIBLE_WPM + 0.1).validate().is_err());
    }

    #[test]
    fn raw_wpm_is_bounded_when_present() {
        let request = ProgressRequest {
            raw_wpm: Some(400.0),
            ..progress_request(100.0)
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn finish_request_bounds_wpm() {
        let request = FinishRequest {
            wpm: 900.0,
            accuracy: 99.0,
            raw_wpm: None,
        };
        assert!(request.validate().is_err());
    }
}
