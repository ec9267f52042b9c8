//! Manages the WebSocket connection lifecycle for one agent job.

use super::{gemini::GeminiAgentSession, protocol::ServerMessage, room};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::StreamExt;
use kaira_core::runtime::entrypoint;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Runs one job for a freshly upgraded connection.
///
/// Each connection is its own room: the agent session is started, joins the
/// room, greets the user and then proxies the conversation until either side
/// hangs up.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let job_id = Uuid::new_v4();
    let job_span = tracing::info_span!("agent_job", %job_id);

    async move {
        info!("New WebSocket connection. Dispatching agent job...");
        let (socket_tx, socket_rx) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<ServerMessage>(64);
        let writer = room::spawn_writer(socket_tx, outbound_rx);

        let room = room::Room::new(job_id, outbound_tx.clone());
        let mut session = GeminiAgentSession::new(state.gemini_url.clone(), outbound_tx.clone());

        match entrypoint(
            &room,
            &mut session,
            state.assistant(),
            state.room_input_options(),
        )
        .await
        {
            Ok(()) => {
                if let Err(e) = session.run(socket_rx).await {
                    error!(error = ?e, "Agent session terminated with error.");
                }
            }
            Err(e) => {
                error!(error = ?e, "Agent job failed to start.");
                let _ = room
                    .send(ServerMessage::Error {
                        message: e.to_string(),
                    })
                    .await;
                session.shutdown().await;
            }
        }

        // Dropping every sender lets the writer flush and close the socket.
        drop(room);
        drop(outbound_tx);
        if let Err(e) = writer.await {
            error!("Room writer task failed: {}", e);
        }
        info!("Agent job finished.");
    }
    .instrument(job_span)
    .await
}

#[cfg(test)]
mod tests {
    use crate::{router::create_router, state::tests::test_state};
    use futures_util::StreamExt;
    use serde_json::{Value, json};
    use std::{sync::Arc, time::Duration};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    #[tokio::test]
    async fn test_start_failure_reports_error_and_closes_room() {
        // Nothing listens on port 1, so the Gemini connection is refused.
        let state = Arc::new(test_state("ws://127.0.0.1:1", true));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        let (frames, closed) = tokio::time::timeout(Duration::from_secs(5), async {
            let mut frames = Vec::new();
            while let Some(frame) = ws.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        frames.push(serde_json::from_str::<Value>(&text).unwrap())
                    }
                    Ok(WsMessage::Close(_)) => return (frames, true),
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
            (frames, false)
        })
        .await
        .expect("room stayed open after a failed start");

        assert_eq!(
            frames,
            vec![json!({"type": "error", "message": "Failed to start agent session"})]
        );
        assert!(closed, "room ended without a close frame");
    }
}
