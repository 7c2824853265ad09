//! Participant progress tracking, finish detection, and the race-scoped
//! leaderboard.
//!
//! Metrics arrive client-computed and are stored, not recomputed; the server
//! normalizes accuracy, bounds wpm at the DTO layer, and sequences updates so
//! out-of-order requests cannot regress a row.

use std::{cmp::Ordering, time::SystemTime};

use tracing::warn;

use crate::{
    dao::models::{FinishPatch, ParticipantEntity, ProgressPatch},
    dto::{
        identity::Identity,
        race::{FinishRequest, FinishResponse, LeaderboardEntry, ParticipantView, ProgressRequest},
    },
    error::ServiceError,
    services::{room_events, room_service},
    state::{SharedState, lifecycle::RaceStatus},
};

/// Normalize a client-submitted accuracy value.
///
/// Clients may submit accuracy as a 0-1 fraction scaled by 100 or as a 0-100
/// percentage; a value above 100 is divided by 100 before clamping. The
/// divide-then-clamp order means `150` stores as `1.5`, not `100`.
pub fn normalize_accuracy(raw: f64) -> f64 {
    let value = if raw > 100.0 { raw / 100.0 } else { raw };
    value.clamp(0.0, 100.0)
}

/// Apply one keystroke-driven progress update for the calling participant.
pub async fn update_progress(
    state: &SharedState,
    raw_code: &str,
    identity: &Identity,
    request: ProgressRequest,
) -> Result<ParticipantView, ServiceError> {
    let store = state.require_race_store().await?;
    let code = room_service::normalize_code(raw_code)?;

    store
        .find_race(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race `{code}` not found")))?;

    let patch = ProgressPatch {
        seq: request.seq,
        progress: request.progress,
        accuracy: normalize_accuracy(request.accuracy),
        wpm: request.wpm,
        raw_wpm: request.raw_wpm.unwrap_or(request.wpm),
    };

    let outcome = store
        .apply_progress(code.clone(), identity.user_id.clone(), patch)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "user `{}` has not joined race `{code}`",
                identity.user_id
            ))
        })?;

    if outcome.applied {
        room_events::broadcast_progress(state, &code, &outcome.row);
    }

    Ok(outcome.row.into())
}

/// Record a participant's finish and complete the race once everyone is done.
///
/// Returns the caller's final row together with the leaderboard of all
/// participants sorted by wpm descending, ties staying in join order.
pub async fn finish_participant(
    state: &SharedState,
    raw_code: &str,
    identity: &Identity,
    request: FinishRequest,
) -> Result<FinishResponse, ServiceError> {
    let store = state.require_race_store().await?;
    let code = room_service::normalize_code(raw_code)?;

    store
        .find_race(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("race `{code}` not found")))?;

    let now = SystemTime::now();
    let patch = FinishPatch {
        accuracy: normalize_accuracy(request.accuracy),
        wpm: request.wpm,
        raw_wpm: request.raw_wpm.unwrap_or(request.wpm),
        finished_at: now,
    };

    let outcome = store
        .finish_participant(code.clone(), identity.user_id.clone(), patch)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "user `{}` has not joined race `{code}`",
                identity.user_id
            ))
        })?;

    room_events::broadcast_participant_finished(state, &code, &outcome.row);

    let leaderboard = sorted_leaderboard(store.list_participants(code.clone()).await?);

    if outcome.remaining_unfinished == 0 {
        match store.complete_race(code.clone(), now).await? {
            Some(race) if race.status == RaceStatus::Finished => {
                room_events::broadcast_race_finished(state, &race, &leaderboard);
                // Final event sent; drop the room's broadcast hub.
                state.rooms().close(&code);
            }
            Some(race) => {
                // All participants finished but the race never became active;
                // leave the status untouched rather than skip a state.
                warn!(code = %code, status = ?race.status, "race completed without being active");
            }
            None => {
                warn!(code = %code, "race disappeared while completing");
            }
        }
    }

    Ok(FinishResponse {
        participant: outcome.row.into(),
        leaderboard,
    })
}

/// Sort rows by wpm descending; the incoming join order breaks ties because
/// the sort is stable.
fn sorted_leaderboard(rows: Vec<ParticipantEntity>) -> Vec<LeaderboardEntry> {
    let mut rows = rows;
    rows.sort_by(|a, b| b.wpm.partial_cmp(&a.wpm).unwrap_or(Ordering::Equal));
    rows.into_iter().map(LeaderboardEntry::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_in_percentage_range_is_kept() {
        assert_eq!(normalize_accuracy(97.5), 97.5);
        assert_eq!(normalize_accuracy(0.0), 0.0);
        assert_eq!(normalize_accuracy(100.0), 100.0);
    }

    #[test]
    fn accuracy_above_hundred_is_rescaled_before_clamping() {
        // Divide-then-clamp, so 150 ends up as 1.5 rather than saturating.
        assert_eq!(normalize_accuracy(150.0), 1.5);
        assert_eq!(normalize_accuracy(10_050.0), 100.0);
    }

    #[test]
    fn negative_accuracy_clamps_to_zero() {
        assert_eq!(normalize_accuracy(-5.0), 0.0);
    }

    fn row(user: &str, wpm: f64) -> ParticipantEntity {
        ParticipantEntity {
            wpm,
            ..ParticipantEntity::joined(
                "AB12CD".into(),
                user.into(),
                user.into(),
                None,
                SystemTime::now(),
            )
        }
    }

    #[test]
    fn leaderboard_sorts_by_wpm_descending() {
        let sorted = sorted_leaderboard(vec![row("slow", 40.0), row("fast", 90.0), row("mid", 60.0)]);
        let order: Vec<&str> = sorted.iter().map(|entry| entry.user_id.as_str()).collect();
        assert_eq!(order, vec!["fast", "mid", "slow"]);
    }

    #[test]
    fn leaderboard_ties_keep_join_order() {
        let sorted = sorted_leaderboard(vec![row("first", 80.0), row("second", 80.0)]);
        let order: Vec<&str> = sorted.iter().map(|entry| entry.user_id.as_str()).collect();
        assert_eq!(order, vec!["first", "second"]);
    }
}
