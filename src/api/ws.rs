// =============================================================================
// WebSocket Handler — Push-based snapshot updates
// =============================================================================
//
// Clients connect to `/ws` (or `/api/v1/ws`) and receive:
//   1. The latest snapshot immediately (the placeholder before cycle 1).
//   2. One message per published refresh cycle afterwards.
//
// The handler also:
//   - Responds to Ping frames with Pong frames.
//   - Ignores client text and binary frames.
//   - Skips a lagging connection straight to the newest snapshot.
//   - Drops only its own connection when a send fails.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::EngineError;
use crate::publisher::recv_latest;
use crate::snapshot::wire::TechnicalData;

// =============================================================================
// WebSocket upgrade handler
// =============================================================================

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

// =============================================================================
// Connection handler
// =============================================================================

/// Manages a single WebSocket connection lifecycle.
///
/// Runs two concurrent branches via `tokio::select!`:
///   1. **Push**: forward every published snapshot.
///   2. **Recv**: process incoming client frames (Ping, Close, anything else
///      is ignored).
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let id = Uuid::new_v4();
    let clients = state.client_connected();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the first send so nothing published in between is lost.
    let (latest, mut rx) = state.publisher.subscribe();
    info!(
        client = %id,
        clients,
        receivers = state.publisher.subscriber_count(),
        "WebSocket client connected"
    );
    let initial = match latest {
        Some(snapshot) => TechnicalData::from(snapshot.as_ref()),
        None => state.placeholder(),
    };

    if let Err(e) = send_data(&mut sender, &state, id, &initial).await {
        warn!(error = %e, "failed to send initial snapshot");
        cleanup(&state, id);
        return;
    }

    loop {
        tokio::select! {
            // ── Push: every published snapshot ──────────────────────────
            next = recv_latest(&mut rx) => {
                let Some(snapshot) = next else {
                    info!(client = %id, "publisher closed, ending feed");
                    break;
                };
                let data = TechnicalData::from(snapshot.as_ref());
                if let Err(e) = send_data(&mut sender, &state, id, &data).await {
                    debug!(error = %e, "disconnecting subscriber");
                    break;
                }
            }

            // ── Recv: process incoming frames ───────────────────────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        debug!(client = %id, "WebSocket Ping received — sending Pong");
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(client = %id, error = %e, "Failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(client = %id, "WebSocket Close frame received");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(client = %id, len = text.len(), "client text frame ignored");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(client = %id, error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    None => {
                        info!(client = %id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    cleanup(&state, id);
}

// =============================================================================
// Helpers
// =============================================================================

/// Serialize and send one document. A failure is reported as a
/// [`EngineError::PublishFault`] for this subscriber only.
async fn send_data<S>(
    sender: &mut S,
    state: &AppState,
    subscriber: Uuid,
    data: &TechnicalData,
) -> Result<(), EngineError>
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
    let fault = |reason: String| EngineError::PublishFault { subscriber, reason };

    let json = serde_json::to_string(data).map_err(|e| fault(e.to_string()))?;
    sender
        .send(Message::Text(json))
        .await
        .map_err(|e| fault(e.to_string()))?;

    let seq = state.record_ws_send();
    debug!(client = %subscriber, seq, timestamp = data.timestamp, "snapshot pushed");
    Ok(())
}

/// Bookkeeping when a connection closes.
fn cleanup(state: &AppState, id: Uuid) {
    let clients = state.client_disconnected();
    info!(client = %id, clients, "WebSocket connection closed");
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::api::rest::router;
    use crate::app_state::testing::state_with;
    use crate::market_data::source::testing::{rising_candles, shared, ScriptedSource};
    use crate::snapshot::wire::TechnicalData;

    async fn next_data<S>(stream: &mut S) -> TechnicalData
    where
        S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("websocket error");
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn pushes_latest_then_each_new_cycle() {
        let source = ScriptedSource::new(99.5, rising_candles(150, 50.0), 100);
        let state = state_with(shared(source));
        let app = router(state.clone(), "public");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (mut stream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();

        // Before any cycle: the placeholder.
        let first = next_data(&mut stream).await;
        assert_eq!(first.current_price, "0");
        assert_eq!(first.htf_trends.h4_trend, "Neutral");

        // Wait until the handler has subscribed before publishing.
        for _ in 0..50 {
            if state.publisher.subscriber_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        state.pipeline.run_cycle().await;
        let pushed = next_data(&mut stream).await;
        assert_eq!(pushed.current_price, "99.5000");
        assert_eq!(pushed.candle_patterns.len(), 5);
    }

    #[tokio::test]
    async fn late_client_gets_current_snapshot_first() {
        let source = ScriptedSource::new(42.0, rising_candles(30, 40.0), 100);
        let state = state_with(shared(source));
        state.pipeline.run_cycle().await;

        let app = router(state.clone(), "public");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (mut stream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws"))
            .await
            .unwrap();
        let first = next_data(&mut stream).await;
        assert_eq!(first.current_price, "42.0000");
    }

    #[tokio::test]
    async fn dropped_client_does_not_starve_the_others() {
        use std::sync::atomic::Ordering;

        let source = ScriptedSource::new(61.25, rising_candles(60, 50.0), 100);
        let state = state_with(shared(source));
        let app = router(state.clone(), "public");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("ws://{addr}/ws");
        let (mut survivor, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        let (mut doomed, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        next_data(&mut survivor).await;
        next_data(&mut doomed).await;
        assert_eq!(state.ws_clients.load(Ordering::SeqCst), 2);

        // Vanish without a close handshake.
        drop(doomed);
        for _ in 0..100 {
            if state.ws_clients.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(state.ws_clients.load(Ordering::SeqCst), 1);

        state.pipeline.run_cycle().await;
        let pushed = next_data(&mut survivor).await;
        assert_eq!(pushed.current_price, "61.2500");
        assert_eq!(state.publisher.published_count(), 1);
    }
}
