use super::engine::TimerState;
use crate::types::timer::{Durations, Phase, Preset, TimerPrefs};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Bumped on any incompatible schema change; a snapshot carrying another
/// version is ignored rather than misread.
pub(crate) const SNAPSHOT_VERSION: u32 = 2;

/// The persisted mirror of [`TimerState`]. Field names are camelCase and
/// the deadline is epoch milliseconds: this blob started life in browser
/// local storage and clients still read it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimerSnapshot {
    pub(crate) version: u32,
    pub(crate) preset: Preset,
    pub(crate) custom: Durations,
    pub(crate) phase: Phase,
    pub(crate) cycle: u32,
    pub(crate) running: bool,
    pub(crate) deadline_ms: Option<i64>,
    pub(crate) remaining_seconds: u64,
    pub(crate) auto_start_next: bool,
    pub(crate) sound: bool,
    pub(crate) notifications: bool,
}

impl TimerSnapshot {
    pub(crate) fn capture(state: &TimerState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            preset: state.preset,
            custom: state.custom,
            phase: state.phase,
            cycle: state.cycle,
            running: state.running,
            deadline_ms: state.deadline.map(epoch_ms),
            remaining_seconds: state.remaining_seconds,
            auto_start_next: state.prefs.auto_start_next,
            sound: state.prefs.sound,
            notifications: state.prefs.notifications,
        }
    }

    pub(crate) fn encode(state: &TimerState) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Self::capture(state))
    }

    /// Returns `None` for anything that cannot be trusted: unparseable
    /// JSON, a foreign version tag, or a deadline outside the calendar.
    pub(crate) fn decode(raw: &str) -> Option<TimerState> {
        let snapshot: TimerSnapshot = serde_json::from_str(raw).ok()?;
        if snapshot.version != SNAPSHOT_VERSION {
            return None;
        }

        let prefs = TimerPrefs {
            auto_start_next: snapshot.auto_start_next,
            sound: snapshot.sound,
            notifications: snapshot.notifications,
        };
        let mut state = TimerState::new(snapshot.preset, snapshot.custom, prefs);
        state.phase = snapshot.phase;
        state.cycle = snapshot.cycle;
        state.remaining_seconds = snapshot.remaining_seconds;
        match (snapshot.running, snapshot.deadline_ms) {
            (true, Some(ms)) => {
                let deadline =
                    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()?;
                state.running = true;
                state.deadline = Some(deadline);
            }
            // Running without a deadline is a corrupt write; land paused.
            _ => {
                state.running = false;
                state.deadline = None;
            }
        }
        Some(state)
    }
}

fn epoch_ms(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
