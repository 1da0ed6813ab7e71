use crate::app::auth::{self, CurrentUser};
use crate::app::{ErrorResponse, error_response};
use crate::state;
use crate::timer as timer_service;
use crate::timer::{PhaseCompletion, TimerState};
use crate::types::timer::{Durations, Phase, Preset};

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimerView {
    pub(crate) preset: Preset,
    pub(crate) custom: Durations,
    pub(crate) phase: Phase,
    pub(crate) cycle: u32,
    pub(crate) running: bool,
    pub(crate) remaining_seconds: u64,
    pub(crate) deadline_ms: Option<i64>,
    pub(crate) auto_start_next: bool,
    pub(crate) sound: bool,
    pub(crate) notifications: bool,
}

impl TimerView {
    fn from_state(state: &TimerState) -> Self {
        Self {
            preset: state.preset,
            custom: state.custom,
            phase: state.phase,
            cycle: state.cycle,
            running: state.running,
            remaining_seconds: state.remaining_seconds,
            deadline_ms: state
                .deadline
                .map(|deadline| (deadline.unix_timestamp_nanos() / 1_000_000) as i64),
            auto_start_next: state.prefs.auto_start_next,
            sound: state.prefs.sound,
            notifications: state.prefs.notifications,
        }
    }
}

/// Every timer request catches the engine up to the wall clock first, then
/// applies its operation, processes boundary side effects, and persists the
/// snapshot. The on-request catch-up is the server-side stand-in for the
/// browser's 1-second tick.
fn with_timer<F>(
    state: &state::AppState,
    user: &str,
    op: F,
) -> Result<Json<TimerView>, (StatusCode, Json<ErrorResponse>)>
where
    F: FnOnce(&mut TimerState, OffsetDateTime) -> Vec<PhaseCompletion>,
{
    let now = OffsetDateTime::now_utc();
    let mut timers = state.timers.lock().expect("timers lock");
    let timer = timers
        .entry(user.to_string())
        .or_insert_with(|| timer_service::load_state(&state.store, user));

    let mut completions = timer.catch_up(now);
    completions.extend(op(timer, now));
    timer_service::process_completions(&state.store, user, timer, &completions, now);
    timer_service::save_state(&state.store, user, timer).map_err(|err| {
        eprintln!("timer persist error: {err} (user {user})");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist timer state.",
        )
    })?;

    Ok(Json(TimerView::from_state(timer)))
}

pub(crate) async fn timer_view(
    State(state): State<state::AppState>,
    current: Option<Extension<CurrentUser>>,
) -> Result<Json<TimerView>, (StatusCode, Json<ErrorResponse>)> {
    let user = auth::current_user(current);
    with_timer(&state, &user, |_timer, _now| Vec::new())
}

pub(crate) async fn timer_start(
    State(state): State<state::AppState>,
    current: Option<Extension<CurrentUser>>,
) -> Result<Json<TimerView>, (StatusCode, Json<ErrorResponse>)> {
    let user = auth::current_user(current);
    with_timer(&state, &user, |timer, now| {
        timer.start(now);
        Vec::new()
    })
}

pub(crate) async fn timer_pause(
    State(state): State<state::AppState>,
    current: Option<Extension<CurrentUser>>,
) -> Result<Json<TimerView>, (StatusCode, Json<ErrorResponse>)> {
    let user = auth::current_user(current);
    with_timer(&state, &user, |timer, now| {
        timer.pause(now);
        Vec::new()
    })
}

pub(crate) async fn timer_reset(
    State(state): State<state::AppState>,
    current: Option<Extension<CurrentUser>>,
) -> Result<Json<TimerView>, (StatusCode, Json<ErrorResponse>)> {
    let user = auth::current_user(current);
    with_timer(&state, &user, |timer, _now| {
        timer.reset();
        Vec::new()
    })
}

pub(crate) async fn timer_skip(
    State(state): State<state::AppState>,
    current: Option<Extension<CurrentUser>>,
) -> Result<Json<TimerView>, (StatusCode, Json<ErrorResponse>)> {
    let user = auth::current_user(current);
    with_timer(&state, &user, |timer, now| vec![timer.skip(now)])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TimerConfigRequest {
    #[serde(default)]
    pub(crate) preset: Option<Preset>,
    #[serde(default)]
    pub(crate) custom: Option<Durations>,
    #[serde(default)]
    pub(crate) auto_start_next: Option<bool>,
    #[serde(default)]
    pub(crate) sound: Option<bool>,
    #[serde(default)]
    pub(crate) notifications: Option<bool>,
}

/// Preference flags apply in place; a preset or duration change rebuilds
/// the countdown from the initial state for that preset.
pub(crate) async fn timer_config(
    State(state): State<state::AppState>,
    current: Option<Extension<CurrentUser>>,
    Json(request): Json<TimerConfigRequest>,
) -> Result<Json<TimerView>, (StatusCode, Json<ErrorResponse>)> {
    let user = auth::current_user(current);
    with_timer(&state, &user, |timer, _now| {
        if let Some(value) = request.auto_start_next {
            timer.prefs.auto_start_next = value;
        }
        if let Some(value) = request.sound {
            timer.prefs.sound = value;
        }
        if let Some(value) = request.notifications {
            timer.prefs.notifications = value;
        }
        if request.preset.is_some() || request.custom.is_some() {
            let preset = request.preset.unwrap_or(timer.preset);
            let custom = request.custom.unwrap_or(timer.custom);
            *timer = TimerState::new(preset, custom, timer.prefs);
        }
        Vec::new()
    })
}
