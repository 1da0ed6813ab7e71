use crate::adapters::{TokioTimeProvider, WebPushSender};
use crate::app::{ErrorResponse, error_response};
use crate::ports::PushSender;
use crate::push as push_service;
use crate::state;
use crate::store;
use crate::types::push::{PushPayload, Subscription};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, (StatusCode, Json<ErrorResponse>)> {
    let vapid = match push_service::load_vapid_config(&state.config) {
        push_service::VapidStatus::Ready(vapid) => vapid,
        push_service::VapidStatus::Incomplete | push_service::VapidStatus::Missing => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Push notifications are not configured.",
            ));
        }
    };

    Ok(Json(PublicKeyResponse {
        public_key: vapid.public_key,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeRequest {
    #[serde(rename = "userId")]
    pub(crate) user_id: String,
    pub(crate) subscription: SubscriptionPayload,
    #[serde(default)]
    pub(crate) tz: Option<String>,
    #[serde(default)]
    pub(crate) platform: Option<String>,
    #[serde(default)]
    pub(crate) ua: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionPayload {
    pub(crate) endpoint: String,
    pub(crate) keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionKeys {
    pub(crate) p256dh: String,
    pub(crate) auth: String,
}

#[derive(Serialize)]
pub(crate) struct SubscribeResponse {
    pub(crate) ok: bool,
}

pub(crate) async fn push_subscribe(
    State(state): State<state::AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.user_id.trim().is_empty()
        || request.subscription.endpoint.trim().is_empty()
        || request.subscription.keys.p256dh.trim().is_empty()
        || request.subscription.keys.auth.trim().is_empty()
    {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "userId and subscription with endpoint and keys are required.",
        ));
    }

    let subscription = Subscription {
        user: request.user_id,
        endpoint: request.subscription.endpoint,
        p256dh: request.subscription.keys.p256dh,
        auth: request.subscription.keys.auth,
        tz: request.tz,
        platform: request.platform,
        ua: request.ua,
    };

    state.store.upsert_subscription(subscription).map_err(|err| {
        eprintln!("push subscribe error: {err}");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store subscription.",
        )
    })?;

    Ok(Json(SubscribeResponse { ok: true }))
}

#[derive(Serialize)]
pub(crate) struct DispatchResponse {
    pub(crate) sent: usize,
}

/// One on-demand dispatch pass, for the external scheduler that curls this
/// endpoint. The background loop runs the identical pass.
pub(crate) async fn push_dispatch(
    State(state): State<state::AppState>,
) -> Result<Json<DispatchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let vapid = match push_service::load_vapid_config(&state.config) {
        push_service::VapidStatus::Ready(vapid) => vapid,
        push_service::VapidStatus::Incomplete | push_service::VapidStatus::Missing => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Push notifications are not configured.",
            ));
        }
    };

    let sender = WebPushSender::new(vapid).map_err(|err| {
        eprintln!("push dispatch error: failed to init web-push ({err})");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to initialize push sender.",
        )
    })?;

    let summary = push_service::dispatch::run_dispatch(
        &TokioTimeProvider,
        &sender,
        &state.store,
        &state.config.dispatch,
    )
    .await
    .map_err(|err| error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    Ok(Json(DispatchResponse { sent: summary.sent }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestPushRequest {
    pub(crate) endpoint: String,
    pub(crate) p256dh: String,
    pub(crate) auth: String,
    pub(crate) title: Option<String>,
    pub(crate) body: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct TestPushResponse {
    pub(crate) status: &'static str,
}

/// Operator smoke test: push straight to a raw subscription without going
/// through the store.
pub(crate) async fn push_test(
    State(state): State<state::AppState>,
    Json(request): Json<TestPushRequest>,
) -> Result<Json<TestPushResponse>, (StatusCode, Json<ErrorResponse>)> {
    let vapid = match push_service::load_vapid_config(&state.config) {
        push_service::VapidStatus::Ready(vapid) => vapid,
        push_service::VapidStatus::Incomplete | push_service::VapidStatus::Missing => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Push notifications are not configured.",
            ));
        }
    };

    if request.endpoint.trim().is_empty()
        || request.p256dh.trim().is_empty()
        || request.auth.trim().is_empty()
    {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "endpoint, p256dh, and auth are required.",
        ));
    }

    let sender = WebPushSender::new(vapid).map_err(|err| {
        eprintln!("push test error: failed to init web-push ({err})");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to initialize push sender.",
        )
    })?;

    let subscription = Subscription {
        user: String::new(),
        endpoint: request.endpoint,
        p256dh: request.p256dh,
        auth: request.auth,
        tz: None,
        platform: None,
        ua: None,
    };
    let payload = PushPayload {
        title: request
            .title
            .unwrap_or_else(|| "Test notification".to_string()),
        body: request
            .body
            .unwrap_or_else(|| format!("Hello from {}.", state.config.app_name)),
    };

    if let Err(err) = sender.send(&subscription, &payload).await {
        eprintln!("push test error: {err}");
        return Err(error_response(
            StatusCode::BAD_GATEWAY,
            "Failed to send test notification.",
        ));
    }

    Ok(Json(TestPushResponse { status: "sent" }))
}

pub(crate) async fn push_registry_debug(
    State(state): State<state::AppState>,
) -> Json<store::Registry> {
    Json(state.store.registry_snapshot())
}

#[derive(Serialize)]
pub(crate) struct DispatcherDebugResponse {
    pub(crate) configured: bool,
    pub(crate) running: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) server_time: time::OffsetDateTime,
}

pub(crate) async fn push_dispatcher_debug(
    State(state): State<state::AppState>,
) -> Json<DispatcherDebugResponse> {
    let guard = state.dispatch_loop.lock().expect("dispatch loop lock");
    Json(DispatcherDebugResponse {
        configured: guard.is_some(),
        running: guard.as_ref().is_some_and(|handle| !handle.is_finished()),
        server_time: time::OffsetDateTime::now_utc(),
    })
}
