//! Gateway status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    session_count: usize,
    sessions: Vec<SessionInfo>,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct SessionInfo {
    session_id: String,
    is_server_socket: bool,
    state: String,
}

pub async fn run(port: u16) -> Result<()> {
    let status: StatusResponse = get_json(&format!("{}/api/status", base_url(port))).await?;

    println!("Gateway Status");
    println!("  uptime    {}s", status.uptime_secs);
    println!("  sessions  {}", status.session_count);
    for session in &status.sessions {
        println!(
            "    {}  state={}  server_socket={}",
            session.session_id, session.state, session.is_server_socket
        );
    }
    Ok(())
}
