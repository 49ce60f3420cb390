//! /api/status — gateway state as JSON.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub session_count: usize,
    pub sessions: Vec<SessionInfo>,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub is_server_socket: bool,
    pub state: String,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let sessions: Vec<SessionInfo> = state
        .sessions
        .snapshot()
        .into_iter()
        .map(|connection| SessionInfo {
            session_id: connection.id().to_string(),
            is_server_socket: connection.is_server_socket(),
            state: format!("{:?}", connection.state()),
        })
        .collect();

    Json(StatusResponse {
        session_count: sessions.len(),
        sessions,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
