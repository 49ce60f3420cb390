//! The relay exchange — one peer message per POST body.
//!
//! The transport status is always 200; protocol failures travel inside the
//! response message. A peer detects failure by inspecting the message type,
//! never the HTTP status.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;

use super::ApiState;

pub async fn handle_relay(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    let response = state.handler.handle(&body).await;
    ([(header::CONTENT_TYPE, "application/octet-stream")], response)
}
