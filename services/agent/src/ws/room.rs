//! The room a job is bound to: one browser WebSocket connection.

use super::protocol::ServerMessage;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, stream::SplitSink};
use kaira_core::runtime::JobContext;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info};
use uuid::Uuid;

/// Job context backed by a browser WebSocket.
///
/// All outbound frames go through a channel drained by a single writer task,
/// so the session and the job context can both talk to the room.
pub struct Room {
    job_id: Uuid,
    outbound: mpsc::Sender<ServerMessage>,
    connected: AtomicBool,
}

impl Room {
    pub fn new(job_id: Uuid, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            job_id,
            outbound,
            connected: AtomicBool::new(false),
        }
    }

    /// Queues a message for the browser.
    pub async fn send(&self, msg: ServerMessage) -> Result<()> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| anyhow!("Room {} is closed", self.job_id))
    }
}

#[async_trait]
impl JobContext for Room {
    async fn connect(&self) -> Result<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            bail!("Room {} is already connected", self.job_id);
        }
        info!(job_id = %self.job_id, "Agent joined room.");
        self.send(ServerMessage::AgentConnected {
            job_id: self.job_id,
        })
        .await
    }
}

/// Spawns the task that forwards queued messages to the browser.
pub fn spawn_writer(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            if let Err(e) = send_msg(&mut socket_tx, msg).await {
                error!("Failed to send message to client: {}", e);
                break;
            }
        }
        let _ = socket_tx.close().await;
    })
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
