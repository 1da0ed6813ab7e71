use crate::app::auth::{self, CurrentUser};
use crate::app::{ErrorResponse, error_response};
use crate::state;
use crate::types::push::Notification;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReminderRequest {
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) fire_at: OffsetDateTime,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) body: String,
}

/// Schedules a reminder for the current user. The dispatcher picks it up on
/// the first pass at or after `fireAt`.
pub(crate) async fn reminder_create(
    State(state): State<state::AppState>,
    current: Option<Extension<CurrentUser>>,
    Json(request): Json<ReminderRequest>,
) -> Result<Json<Notification>, (StatusCode, Json<ErrorResponse>)> {
    if request.title.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "title must not be empty.",
        ));
    }

    let user = auth::current_user(current);
    let notification = state
        .store
        .schedule_notification(&user, request.fire_at, request.title.trim(), &request.body)
        .map_err(|err| {
            eprintln!("reminder create error: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store reminder.",
            )
        })?;

    Ok(Json(notification))
}
