//! End-to-end exchanges: the full connect → send → poll → close flow.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use causeway_core::wire::{PeerMessage, ServerMessageType};

use crate::{error_text, Harness};

/// The canonical session lifetime, one HTTP exchange at a time.
#[tokio::test]
async fn full_session_lifecycle() {
    let harness = Harness::new();

    // connect
    let reply = harness.exchange(&PeerMessage::connect("device-A")).await;
    assert_eq!(reply.message_type, ServerMessageType::PeerConnected);
    assert!(!reply.is_server_socket);
    let session_id = reply.session_id.clone();
    let mut far_end = {
        let mut far_ends = harness.far_ends.lock().await;
        far_ends.recv().await.unwrap()
    };

    // peer → relay
    let reply = harness
        .exchange(&PeerMessage::peer_to_relay(
            &session_id,
            Bytes::from_static(b"hello"),
        ))
        .await;
    assert_eq!(reply.message_type, ServerMessageType::DataAccepted);
    let mut received = vec![0u8; 5];
    far_end.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"hello");

    // relay → peer, arriving while the poll is in flight
    let writer = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        far_end.write_all(b"world").await.unwrap();
        far_end
    });
    let reply = harness
        .exchange(&PeerMessage::wait_for_data(&session_id))
        .await;
    assert_eq!(reply.message_type, ServerMessageType::RelayToPeer);
    assert_eq!(&reply.data[..], b"world");
    let _far_end = writer.await.unwrap();

    // close
    let reply = harness
        .exchange(&PeerMessage::peer_closing(&session_id))
        .await;
    assert_eq!(reply.message_type, ServerMessageType::ServerClosing);
    assert!(harness.sessions.is_empty());

    // the id is dead from here on
    let reply = harness
        .exchange(&PeerMessage::peer_to_relay(
            &session_id,
            Bytes::from_static(b"late"),
        ))
        .await;
    assert!(error_text(&reply).contains("session not found"));
}

/// A fresh session is visible to the very next exchange.
#[tokio::test]
async fn new_session_is_immediately_usable() {
    let harness = Harness::new();
    let (session_id, mut far_end) = harness.connect("device-B").await;

    let reply = harness
        .exchange(&PeerMessage::peer_to_relay(
            &session_id,
            Bytes::from_static(b"first"),
        ))
        .await;
    assert_eq!(reply.message_type, ServerMessageType::DataAccepted);

    let mut received = vec![0u8; 5];
    far_end.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"first");
}

/// Bytes cross the bridge exactly once, in order.
#[tokio::test]
async fn outbound_bytes_preserve_order() {
    let harness = Harness::new();
    let (session_id, mut far_end) = harness.connect("device-C").await;

    for part in ["one-", "two-", "three"] {
        let reply = harness
            .exchange(&PeerMessage::peer_to_relay(
                &session_id,
                part.as_bytes().to_vec(),
            ))
            .await;
        assert_eq!(reply.message_type, ServerMessageType::DataAccepted);
    }

    let mut received = vec![0u8; 13];
    far_end.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"one-two-three");
}

/// Chunks that arrive between polls come back coalesced, in arrival order.
#[tokio::test]
async fn inbound_chunks_coalesce_in_order() {
    let harness = Harness::new();
    let (session_id, mut far_end) = harness.connect("device-D").await;

    far_end.write_all(b"alpha").await.unwrap();
    far_end.flush().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    far_end.write_all(b"beta").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let reply = harness
        .exchange(&PeerMessage::wait_for_data(&session_id))
        .await;
    assert_eq!(reply.message_type, ServerMessageType::RelayToPeer);
    assert_eq!(&reply.data[..], b"alphabeta");
}

/// Two sessions do not share state.
#[tokio::test]
async fn sessions_are_independent() {
    let harness = Harness::new();
    let (session_a, mut far_a) = harness.connect("device-E").await;
    let (session_b, mut far_b) = harness.connect("device-F").await;
    assert_ne!(session_a, session_b);
    assert_eq!(harness.sessions.len(), 2);

    harness
        .exchange(&PeerMessage::peer_to_relay(&session_a, Bytes::from_static(b"for-a")))
        .await;
    harness
        .exchange(&PeerMessage::peer_to_relay(&session_b, Bytes::from_static(b"for-b")))
        .await;

    let mut received = vec![0u8; 5];
    far_a.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"for-a");
    far_b.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"for-b");

    // Closing one leaves the other alive.
    harness
        .exchange(&PeerMessage::peer_closing(&session_a))
        .await;
    assert_eq!(harness.sessions.len(), 1);
    assert!(harness.sessions.lookup(&session_b).is_ok());
}
