//! Shared HTTP request helpers for CLI commands.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use causeway_core::wire::{PeerMessage, ServerMessage, ServerMessageType};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// One peer-protocol exchange: POST the encoded message, decode the reply.
pub async fn exchange(port: u16, message: &PeerMessage) -> Result<ServerMessage> {
    let url = base_url(port);
    let body = reqwest::Client::new()
        .post(&url)
        .header("content-type", "application/octet-stream")
        .body(message.encode().to_vec())
        .send()
        .await
        .with_context(|| format!("failed to connect to causewayd at {} — is it running?", url))?
        .bytes()
        .await
        .context("failed to read response body")?;
    ServerMessage::decode(&body).context("failed to decode server message")
}

/// Exchange, then fail with the gateway's description if the reply is an
/// error or of an unexpected type.
pub async fn expect(
    port: u16,
    message: &PeerMessage,
    wanted: ServerMessageType,
) -> Result<ServerMessage> {
    let reply = exchange(port, message).await?;
    if reply.message_type == ServerMessageType::Error {
        bail!("gateway error: {}", String::from_utf8_lossy(&reply.data));
    }
    if reply.message_type != wanted {
        bail!("unexpected response type: {:?}", reply.message_type);
    }
    Ok(reply)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to causewayd at {} — is it running?", url))?
        .json::<T>()
        .await
        .context("failed to parse response")
}
