//! Race lifecycle state machine: `waiting -> active -> finished`, monotonic.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a race.
///
/// Transitions never skip a state and never reverse; an abandoned room simply
/// stays in whatever status it was last observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    /// Room is open; participants may join.
    Waiting,
    /// The creator started the race; the countdown is running or typing is underway.
    Active,
    /// Every participant finished; terminal.
    Finished,
}

/// Events that drive the race lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceEvent {
    /// The creator starts the race.
    Start,
    /// The last unfinished participant finished.
    Complete,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The status the race was in when the invalid event was received.
    pub from: RaceStatus,
    /// The event that cannot be applied from this status.
    pub event: RaceEvent,
}

impl RaceStatus {
    /// Compute the status that follows `event`, rejecting anything that would
    /// skip or reverse a state.
    pub fn transition(self, event: RaceEvent) -> Result<RaceStatus, InvalidTransition> {
        match (self, event) {
            (RaceStatus::Waiting, RaceEvent::Start) => Ok(RaceStatus::Active),
            (RaceStatus::Active, RaceEvent::Complete) => Ok(RaceStatus::Finished),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    /// True once the race reached its terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, RaceStatus::Finished)
    }
}
