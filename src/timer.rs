use crate::store::{Store, StoreError};
use crate::types::timer::{FocusSession, Phase};

use time::OffsetDateTime;

mod engine;
mod snapshot;

pub use engine::{PhaseCompletion, TimerState};

/// Restores a user's timer from its persisted snapshot. Anything untrusted
/// (missing, unreadable, or version-mismatched) falls back to defaults;
/// catch-up replay is the caller's job so it can observe the completions.
pub(crate) fn load_state(store: &Store, user: &str) -> TimerState {
    match store.load_timer_snapshot(user) {
        Ok(Some(raw)) => snapshot::TimerSnapshot::decode(&raw).unwrap_or_default(),
        Ok(None) => TimerState::default(),
        Err(err) => {
            eprintln!("timer restore warning: {err} (user {user})");
            TimerState::default()
        }
    }
}

pub(crate) fn save_state(store: &Store, user: &str, state: &TimerState) -> Result<(), StoreError> {
    let encoded = snapshot::TimerSnapshot::encode(state).map_err(StoreError::Snapshot)?;
    store.save_timer_snapshot(user, &encoded)
}

/// Boundary side effects. Completed focus segments land in the session log;
/// each boundary schedules an immediately-due push row when the user wants
/// notifications. Neither failure may disturb the countdown, so both are
/// logged and swallowed.
pub(crate) fn process_completions(
    store: &Store,
    user: &str,
    state: &TimerState,
    completions: &[PhaseCompletion],
    now: OffsetDateTime,
) {
    for completion in completions {
        if completion.finished == Phase::Focus {
            let session = FocusSession {
                user: user.to_string(),
                ended_at: now,
                seconds: state.phase_seconds(Phase::Focus),
            };
            if let Err(err) = store.append_focus_session(session) {
                eprintln!("timer session log warning: {err} (user {user})");
            }
        }
        if state.prefs.notifications {
            let (title, body) = boundary_message(completion);
            if let Err(err) = store.schedule_notification(user, now, title, body) {
                eprintln!("timer cue warning: {err} (user {user})");
            }
        }
    }
}

fn boundary_message(completion: &PhaseCompletion) -> (&'static str, &'static str) {
    match completion.next {
        Phase::ShortBreak => ("Focus complete", "Take a short break."),
        Phase::LongBreak => ("Focus complete", "You earned a long break."),
        Phase::Focus => ("Break over", "Back to focus."),
    }
}
