use crate::app::ErrorResponse;
use crate::state;

use axum::extract::{Request, State};
use axum::{Extension, Json};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// User id for deployments running without an auth key, mirroring the
/// single-operator default of the rest of the stack.
pub(crate) const DEFAULT_USER: &str = "local";

/// The verified token subject, attached for downstream handlers.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser(pub(crate) String);

pub(crate) async fn auth_middleware(
    State(state): State<state::AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(auth) = state.auth.clone() else {
        return next.run(request).await;
    };
    if open_route(request.uri().path()) {
        return next.run(request).await;
    }

    let verified = bearer_token(&request).and_then(|token| auth.verify_token(token).ok());
    match verified {
        Some(subject) => {
            request.extensions_mut().insert(CurrentUser(subject));
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "unauthorized".to_string(),
            }),
        )
            .into_response(),
    }
}

/// The dispatch endpoint stays open: it is invoked by a trusted scheduler,
/// not by a signed-in client.
fn open_route(path: &str) -> bool {
    matches!(path, "/health" | "/api/push/dispatch")
}

fn bearer_token(request: &Request) -> Option<&str> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    header.strip_prefix("Bearer ")
}

/// Resolves the user a handler operates on: the verified token subject, or
/// the fixed local id when the gate is not configured.
pub(crate) fn current_user(current: Option<Extension<CurrentUser>>) -> String {
    match current {
        Some(Extension(CurrentUser(user))) => user,
        None => DEFAULT_USER.to_string(),
    }
}
