use crate::adapters;
use crate::auth as auth_service;
use crate::config;
use crate::push as push_service;
use crate::state;
use crate::store;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

mod auth;
mod chat;
mod push;
mod reminders;
mod timer;

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn app(config: config::AppConfig) -> Router {
    let auth = auth_service::AuthState::from_config(&config)
        .unwrap_or_else(|err| panic!("invalid auth configuration: {err}"));
    let store = store::Store::open(&config.store)
        .unwrap_or_else(|err| panic!("failed to open store at {}: {err}", config.store.display()));
    let store = Arc::new(store);
    let chat = config.eva.clone().map(adapters::HttpChatProvider::new);
    let dispatch_loop = push_service::maybe_start_dispatch_loop(&config, Arc::clone(&store));
    let state = state::AppState {
        config,
        auth,
        store,
        timers: Arc::new(Mutex::new(HashMap::new())),
        chat,
        dispatch_loop: Arc::new(Mutex::new(dispatch_loop)),
    };
    Router::new()
        .route("/health", get(health))
        .route("/api/push/subscribe", post(push::push_subscribe))
        .route("/api/push/public-key", get(push::push_public_key))
        .route(
            "/api/push/dispatch",
            get(push::push_dispatch).post(push::push_dispatch),
        )
        .route("/api/push/test", post(push::push_test))
        .route("/api/debug/push/registry", get(push::push_registry_debug))
        .route(
            "/api/debug/push/dispatcher",
            get(push::push_dispatcher_debug),
        )
        .route("/api/reminders", post(reminders::reminder_create))
        .route("/api/timer", get(timer::timer_view))
        .route("/api/timer/start", post(timer::timer_start))
        .route("/api/timer/pause", post(timer::timer_pause))
        .route("/api/timer/reset", post(timer::timer_reset))
        .route("/api/timer/skip", post(timer::timer_skip))
        .route("/api/timer/config", post(timer::timer_config))
        .route("/api/eva", post(chat::assistant_chat))
        .route("/api/alfred", post(chat::assistant_chat))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
