//! The bidirectional forwarding engine for one attached session.
//!
//! Two pumps run as independent tasks for the session's attached lifetime:
//! client-to-upstream and upstream-to-client. Binary frames pass through
//! untouched and in order; text frames go through the envelope policy in
//! [`protocol`]. The first pump to stop (read end, read error, send
//! failure, or external cancellation) cancels the shared token, which
//! unparks the other pump wherever it is blocked. Each pump closes the sink
//! it owns, so each connection is closed exactly once, and the joined driver
//! reports the session to the lifecycle manager exactly once.

use crate::{
    session::SessionManager,
    state::AppState,
    ws::{
        protocol,
        transport::{self, Frame, FrameSink, FrameStream},
    },
};
use axum::{
    extract::{
        Path, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Axum handler upgrading the caller's connection and attaching it to an
/// already-started session.
pub async fn ws_attach_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_attached_socket(socket, state, session_id))
}

async fn handle_attached_socket(socket: WebSocket, state: Arc<AppState>, session_id: String) {
    let (stream, sink) = transport::split_client(socket);
    let span = tracing::info_span!("relay_session", %session_id);
    run_relay(
        state.sessions.clone(),
        session_id,
        Box::new(stream),
        Box::new(sink),
    )
    .instrument(span)
    .await;
}

/// Runs the relay for one session until either side terminates, then tears
/// the session down.
pub async fn run_relay(
    manager: Arc<SessionManager>,
    session_id: String,
    client_stream: Box<dyn FrameStream>,
    mut client_sink: Box<dyn FrameSink>,
) {
    let (upstream, cancel) = match manager.attach(&session_id) {
        Ok(attached) => attached,
        Err(err) => {
            warn!(%session_id, error = %err, "relay attach refused");
            client_sink.close().await;
            return;
        }
    };
    info!(%session_id, "relay attached");

    let to_upstream = tokio::spawn(pump(
        client_stream,
        upstream.sink,
        cancel.clone(),
        protocol::forward_client_text,
        "client_to_upstream",
    ));
    let to_client = tokio::spawn(pump(
        upstream.stream,
        client_sink,
        cancel.clone(),
        protocol::forward_upstream_text,
        "upstream_to_client",
    ));

    let _ = tokio::join!(to_upstream, to_client);

    // Idempotent: a no-op if an explicit end or the expiry sweep already
    // removed the session.
    manager.end_session(&session_id).await;
    info!(%session_id, "relay finished");
}

/// One directional forwarding loop.
///
/// Blocks only on reading `src` and writing `dst`; cross-loop coordination
/// happens solely through the cancellation token. On exit the pump cancels
/// the token and closes the sink it owns.
async fn pump(
    mut src: Box<dyn FrameStream>,
    mut dst: Box<dyn FrameSink>,
    cancel: CancellationToken,
    forward_text: fn(&str) -> Option<String>,
    direction: &'static str,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(direction, "pump cancelled");
                break;
            }
            frame = src.next_frame() => match frame {
                Some(Ok(Frame::Binary(data))) => {
                    if let Err(err) = dst.send_frame(Frame::Binary(data)).await {
                        debug!(direction, error = %err, "forward failed");
                        break;
                    }
                }
                Some(Ok(Frame::Text(text))) => {
                    let Some(forwarded) = forward_text(&text) else {
                        // Unrecognized or unparseable envelope: dropped by
                        // policy, the relay keeps running.
                        debug!(direction, "dropped unrecognized text frame");
                        continue;
                    };
                    if let Err(err) = dst.send_frame(Frame::Text(forwarded)).await {
                        debug!(direction, error = %err, "forward failed");
                        break;
                    }
                }
                Some(Err(err)) => {
                    debug!(direction, error = %err, "read failed");
                    break;
                }
                None => {
                    debug!(direction, "peer closed");
                    break;
                }
            }
        }
    }
    // First pump out signals the peer loop; cancelling twice is harmless.
    cancel.cancel();
    dst.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceError;
    use crate::session::manager::testing::{PipeConnector, config};
    use crate::session::record::SessionStatus;
    use crate::ws::transport::testing::{self, UpstreamPeer};
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const BOUND: Duration = Duration::from_secs(1);

    struct Harness {
        manager: Arc<SessionManager>,
        session_id: String,
        /// Sends frames as the client.
        client_tx: mpsc::UnboundedSender<Frame>,
        /// Receives frames the relay forwarded to the client.
        client_rx: mpsc::UnboundedReceiver<Frame>,
        upstream: UpstreamPeer,
    }

    async fn attach_session() -> Harness {
        let connector = Arc::new(PipeConnector::new());
        let manager = Arc::new(SessionManager::new(connector.clone()));
        let started = manager.start_session(config(), "user-7").await.unwrap();
        let upstream = connector.last_peer();

        let (client_tx, client_stream) = testing::inbound();
        let (client_sink, client_rx, _closes) = testing::outbound();
        tokio::spawn(run_relay(
            manager.clone(),
            started.session_id.clone(),
            Box::new(client_stream),
            Box::new(client_sink),
        ));

        Harness {
            manager,
            session_id: started.session_id,
            client_tx,
            client_rx,
            upstream,
        }
    }

    async fn assert_session_gone(manager: &SessionManager, id: &str) {
        let deadline = tokio::time::Instant::now() + BOUND;
        loop {
            if matches!(manager.store().get(id), Err(VoiceError::SessionNotFound(_))) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "session still registered after teardown bound"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn binary_frames_forward_in_order_both_ways() {
        let mut h = attach_session().await;

        for i in 0u8..10 {
            h.client_tx
                .send(Frame::Binary(Bytes::from(vec![i, i, i])))
                .unwrap();
        }
        for i in 0u8..10 {
            let frame = timeout(BOUND, h.upstream.from_relay.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(frame, Frame::Binary(Bytes::from(vec![i, i, i])));
        }

        for i in 0u8..10 {
            h.upstream
                .to_relay
                .send(Frame::Binary(Bytes::from(vec![0xAA, i])))
                .unwrap();
        }
        for i in 0u8..10 {
            let frame = timeout(BOUND, h.client_rx.recv()).await.unwrap().unwrap();
            assert_eq!(frame, Frame::Binary(Bytes::from(vec![0xAA, i])));
        }
    }

    #[tokio::test]
    async fn control_messages_forward_with_payload() {
        let mut h = attach_session().await;

        h.client_tx
            .send(Frame::Text(
                r#"{"type":"text_message","content":"hello"}"#.into(),
            ))
            .unwrap();
        let Frame::Text(text) = timeout(BOUND, h.upstream.from_relay.recv())
            .await
            .unwrap()
            .unwrap()
        else {
            panic!("expected text frame")
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "text_message");
        assert_eq!(parsed["content"], "hello");

        h.upstream
            .to_relay
            .send(Frame::Text(
                r#"{"type":"ai_text","text":"hi there"}"#.into(),
            ))
            .unwrap();
        let Frame::Text(text) = timeout(BOUND, h.client_rx.recv()).await.unwrap().unwrap()
        else {
            panic!("expected text frame")
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "ai_text");
        assert_eq!(parsed["text"], "hi there");
    }

    #[tokio::test]
    async fn unknown_frames_are_dropped_and_relay_survives() {
        let mut h = attach_session().await;

        h.client_tx
            .send(Frame::Text(r#"{"type":"change_voice","voice":"f"}"#.into()))
            .unwrap();
        h.client_tx.send(Frame::Text("garbage".into())).unwrap();
        h.client_tx
            .send(Frame::Binary(Bytes::from_static(b"marker")))
            .unwrap();

        // Only the binary marker comes through; the relay is still alive.
        let frame = timeout(BOUND, h.upstream.from_relay.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, Frame::Binary(Bytes::from_static(b"marker")));
        assert!(h.manager.store().get(&h.session_id).is_ok());
    }

    #[tokio::test]
    async fn client_close_tears_down_upstream_and_session() {
        let mut h = attach_session().await;

        drop(h.client_tx);

        // Upstream connection closed within the bound...
        assert!(
            timeout(BOUND, h.upstream.from_relay.recv())
                .await
                .unwrap()
                .is_none()
        );
        // ...and so is the client write half, exactly once.
        assert_eq!(h.upstream.closes.load(Ordering::SeqCst), 1);
        assert_session_gone(&h.manager, &h.session_id).await;
    }

    #[tokio::test]
    async fn upstream_close_tears_down_client_and_session() {
        let mut h = attach_session().await;

        drop(h.upstream.to_relay);

        assert!(timeout(BOUND, h.client_rx.recv()).await.unwrap().is_none());
        assert_session_gone(&h.manager, &h.session_id).await;
    }

    #[tokio::test]
    async fn explicit_end_stops_both_loops() {
        let mut h = attach_session().await;

        h.manager.end_session(&h.session_id).await;

        assert!(
            timeout(BOUND, h.upstream.from_relay.recv())
                .await
                .unwrap()
                .is_none()
        );
        assert!(timeout(BOUND, h.client_rx.recv()).await.unwrap().is_none());
        assert_session_gone(&h.manager, &h.session_id).await;
    }

    #[tokio::test]
    async fn second_attach_is_refused_and_closes_the_socket() {
        let h = attach_session().await;

        let (_tx, stream) = testing::inbound();
        let (sink, mut rx, closes) = testing::outbound();
        run_relay(
            h.manager.clone(),
            h.session_id.clone(),
            Box::new(stream),
            Box::new(sink),
        )
        .await;

        assert!(rx.recv().await.is_none());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        // The original relay is unaffected.
        assert!(h.manager.store().get(&h.session_id).is_ok());
    }

    /// End-to-end walk through the documented start/relay/teardown scenario.
    #[tokio::test]
    async fn start_relay_and_disconnect_scenario() {
        let connector = Arc::new(PipeConnector::new());
        let manager = Arc::new(SessionManager::new(connector.clone()));
        let started = manager
            .start_session(
                crate::session::SessionConfig {
                    language: "en".into(),
                    model: "vaani-voice-1".into(),
                },
                "owner-42",
            )
            .await
            .unwrap();

        assert!(started.session_id.len() >= 18);
        let record = manager.store().get(&started.session_id).unwrap();
        assert_eq!(record.status(), SessionStatus::Active);
        assert_eq!(record.owner_id, "owner-42");

        let mut upstream = connector.last_peer();
        let (client_tx, client_stream) = testing::inbound();
        let (client_sink, _client_rx, _closes) = testing::outbound();
        tokio::spawn(run_relay(
            manager.clone(),
            started.session_id.clone(),
            Box::new(client_stream),
            Box::new(client_sink),
        ));

        client_tx
            .send(Frame::Text(
                r#"{"type":"text_message","content":"hello"}"#.into(),
            ))
            .unwrap();
        let Frame::Text(text) = timeout(BOUND, upstream.from_relay.recv())
            .await
            .unwrap()
            .unwrap()
        else {
            panic!("expected forwarded control message")
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["content"], "hello");

        // Client disconnects: upstream must close and the session must be
        // gone within one second.
        drop(client_tx);
        assert!(
            timeout(BOUND, upstream.from_relay.recv())
                .await
                .unwrap()
                .is_none()
        );
        assert_session_gone(&manager, &started.session_id).await;
    }
}
