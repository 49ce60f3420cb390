//! Session commands — connect, send, recv, close.

use anyhow::Result;

use causeway_core::wire::{PeerMessage, ServerMessageType};

use super::http::{exchange, expect};

pub async fn connect(port: u16, device_id: &str) -> Result<()> {
    let reply = expect(
        port,
        &PeerMessage::connect(device_id),
        ServerMessageType::PeerConnected,
    )
    .await?;

    println!("Session established");
    println!("  session id     {}", reply.session_id);
    println!("  server socket  {}", reply.is_server_socket);
    Ok(())
}

pub async fn send(port: u16, session_id: &str, text: &str) -> Result<()> {
    expect(
        port,
        &PeerMessage::peer_to_relay(session_id, text.as_bytes().to_vec()),
        ServerMessageType::DataAccepted,
    )
    .await?;

    println!("Data accepted ({} bytes)", text.len());
    Ok(())
}

pub async fn recv(port: u16, session_id: &str) -> Result<()> {
    let reply = expect(
        port,
        &PeerMessage::wait_for_data(session_id),
        ServerMessageType::RelayToPeer,
    )
    .await?;

    if reply.data.is_empty() {
        println!("No data (poll timed out)");
    } else {
        match std::str::from_utf8(&reply.data) {
            Ok(text) => println!("{text}"),
            Err(_) => println!("{}", hex::encode(&reply.data)),
        }
    }
    Ok(())
}

pub async fn close(port: u16, session_id: &str) -> Result<()> {
    let reply = exchange(port, &PeerMessage::peer_closing(session_id)).await?;
    match reply.message_type {
        ServerMessageType::ServerClosing => println!("Session closed"),
        ServerMessageType::Error => {
            println!("Gateway error: {}", String::from_utf8_lossy(&reply.data))
        }
        other => println!("Unexpected response type: {other:?}"),
    }
    Ok(())
}
