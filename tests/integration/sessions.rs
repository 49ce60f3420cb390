//! Wait, wakeup, and closure semantics for individual sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use causeway_core::wire::{PeerMessage, ServerMessageType};

use crate::{error_text, wait_until_empty, Harness};

/// An empty poll returns within the configured maximum, empty — not an error.
#[tokio::test]
async fn poll_with_no_data_times_out_empty() {
    let harness = Harness::with_max_wait(Duration::from_millis(200));
    let (session_id, _far_end) = harness.connect("device-A").await;

    let started = Instant::now();
    let reply = harness
        .exchange(&PeerMessage::wait_for_data(&session_id))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(reply.message_type, ServerMessageType::RelayToPeer);
    assert!(reply.data.is_empty());
    assert!(elapsed >= Duration::from_millis(200));
    assert!(
        elapsed < Duration::from_secs(2),
        "poll must not overshoot its maximum: {elapsed:?}"
    );
}

/// Data arriving mid-poll wakes the waiter promptly; it does not sit out the
/// full maximum wait.
#[tokio::test]
async fn poll_wakes_promptly_on_arrival() {
    let harness = Harness::with_max_wait(Duration::from_secs(10));
    let (session_id, mut far_end) = harness.connect("device-B").await;

    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        far_end.write_all(b"ping").await.unwrap();
        far_end
    });

    let started = Instant::now();
    let reply = harness
        .exchange(&PeerMessage::wait_for_data(&session_id))
        .await;

    assert_eq!(&reply.data[..], b"ping");
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "waiter must wake on arrival, not on timeout"
    );
    writer.await.unwrap();
}

/// Closing a session releases a blocked poll immediately with an empty
/// result — not an error, and not the full timeout.
#[tokio::test]
async fn close_releases_a_blocked_poll() {
    let harness = Harness::with_max_wait(Duration::from_secs(10));
    let (session_id, _far_end) = harness.connect("device-C").await;

    let poller = {
        let harness = Arc::clone(&harness);
        let session_id = session_id.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let reply = harness
                .exchange(&PeerMessage::wait_for_data(&session_id))
                .await;
            (reply, started.elapsed())
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reply = harness
        .exchange(&PeerMessage::peer_closing(&session_id))
        .await;
    assert_eq!(reply.message_type, ServerMessageType::ServerClosing);

    let (reply, elapsed) = tokio::time::timeout(Duration::from_secs(2), poller)
        .await
        .expect("blocked poll must be released by close")
        .unwrap();
    assert_eq!(reply.message_type, ServerMessageType::RelayToPeer);
    assert!(reply.data.is_empty());
    assert!(elapsed < Duration::from_secs(2));
}

/// The remote end hanging up tears the session down and empties the table.
#[tokio::test]
async fn remote_hangup_removes_the_session() {
    let harness = Harness::new();
    let (session_id, far_end) = harness.connect("device-D").await;

    drop(far_end);

    assert!(
        wait_until_empty(&harness.sessions, Duration::from_secs(2)).await,
        "session should be reaped after remote hangup"
    );
    let reply = harness
        .exchange(&PeerMessage::peer_to_relay(
            &session_id,
            Bytes::from_static(b"x"),
        ))
        .await;
    assert!(error_text(&reply).contains("session not found"));
}

/// Closing twice: the second exchange sees an unknown session.
#[tokio::test]
async fn double_close_reports_session_not_found() {
    let harness = Harness::new();
    let (session_id, _far_end) = harness.connect("device-E").await;

    let reply = harness
        .exchange(&PeerMessage::peer_closing(&session_id))
        .await;
    assert_eq!(reply.message_type, ServerMessageType::ServerClosing);

    let reply = harness
        .exchange(&PeerMessage::peer_closing(&session_id))
        .await;
    assert!(error_text(&reply).contains("session not found"));
}
