use crate::app::{ErrorResponse, error_response};
use crate::ports::ChatProvider;
use crate::state;
use crate::types::chat::{ChatMessage, Persona};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    pub(crate) mode: Option<String>,
    pub(crate) messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
pub(crate) struct ChatResponse {
    pub(crate) text: String,
}

/// Pass-through to the configured completion provider. The persona comes
/// from `mode`; the reply is returned verbatim as `text`.
pub(crate) async fn assistant_chat(
    State(state): State<state::AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    if request.messages.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "messages must not be empty.",
        ));
    }

    let Some(provider) = state.chat.clone() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "The assistant is not configured.",
        ));
    };

    let persona = Persona::from_mode(request.mode.as_deref());
    match provider.complete(persona, &request.messages).await {
        Ok(text) => Ok(Json(ChatResponse { text })),
        Err(err) => {
            eprintln!("assistant proxy error: {err}");
            Err(error_response(
                StatusCode::BAD_GATEWAY,
                "The assistant is unavailable.",
            ))
        }
    }
}
