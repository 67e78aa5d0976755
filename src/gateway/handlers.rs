use super::AppState;
use crate::context::Context;
use crate::error::ConfigError;
use crate::storage::ChatMessage;
use async_stream::stream;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use uuid::Uuid;

/// Streamed chat replies go out in pieces of roughly this many characters.
const STREAM_CHUNK_CHARS: usize = 48;

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn bad_request(detail: &str) -> Response {
    error_json(StatusCode::BAD_REQUEST, &format!("invalid request body: {detail}"))
}

pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "chilib" }))
}

/// POST /protocol: one model call over the posted context snapshot.
///
/// Credentials are checked before any network traffic: a request that cannot
/// succeed upstream should fail fast with the full list of missing names.
/// Upstream and extraction failures collapse to a generic 500; the envelope
/// details stay in the server log.
pub async fn generate_protocol(State(state): State<AppState>, body: String) -> Response {
    let request_id = Uuid::new_v4();

    let ctx: Context = match serde_json::from_str(&body) {
        Ok(ctx) => ctx,
        Err(e) => return bad_request(&e.to_string()),
    };

    if let Err(e) = state.config.require_upstream() {
        tracing::error!(%request_id, "refusing protocol request: {e}");
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }

    match state.provider.generate_protocol(&ctx).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => {
            tracing::error!(%request_id, "protocol generation failed: {e}");
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate protocol",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub stream: bool,
}

/// POST /chat: free-form turn over the day's history. `?stream=true` switches
/// the response to chunked plain text.
pub async fn chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
    body: String,
) -> Response {
    let request_id = Uuid::new_v4();

    let payload: ChatPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => return bad_request(&e.to_string()),
    };

    if state.config.api_key.as_deref().is_none_or(str::is_empty) {
        let e = ConfigError::MissingEnv(vec!["OPENAI_API_KEY".to_string()]);
        tracing::error!(%request_id, "refusing chat request: {e}");
        return error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
    }

    match state
        .provider
        .chat(&payload.messages, &payload.context)
        .await
    {
        Ok(reply) if query.stream => stream_reply(reply),
        Ok(reply) => Json(json!({ "reply": reply })).into_response(),
        Err(e) => {
            tracing::error!(%request_id, "chat failed: {e}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Chat failed")
        }
    }
}

/// Break a reply into character-bounded chunks for the streaming path.
fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut count = 0;
    for c in text.chars() {
        buf.push(c);
        count += 1;
        if count >= chunk_chars {
            chunks.push(std::mem::take(&mut buf));
            count = 0;
        }
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

fn stream_reply(reply: String) -> Response {
    let body = Body::from_stream(stream! {
        for chunk in chunk_text(&reply, STREAM_CHUNK_CHARS) {
            yield Ok::<String, Infallible>(chunk);
        }
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
