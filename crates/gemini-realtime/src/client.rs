//! WebSocket client for a Gemini Live session.

use crate::types::{
    BidiGenerateContentClientContent, BidiGenerateContentRealtimeInput,
    BidiGenerateContentSetup, BidiGenerateContentToolResponse, Blob, ClientMessage, Content,
    FunctionResponse, ServerMessage,
};
use anyhow::{Context, Result, anyhow, bail};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, warn};

/// Public Gemini Live endpoint; the API key is appended as `key=`.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Sample rate Gemini expects for realtime audio input.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Sample rate of the audio Gemini produces.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

const SETUP_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds the endpoint URL for an API key.
pub fn endpoint(api_key: &str) -> String {
    format!("{GEMINI_LIVE_URL}?key={api_key}")
}

/// Connects to `url`, sends `setup` and waits for `setupComplete`.
///
/// Returns the two halves of the session once the server is ready for
/// bidirectional streaming.
pub async fn connect(
    url: &str,
    setup: BidiGenerateContentSetup,
) -> Result<(GeminiSender, GeminiReceiver)> {
    let (ws_stream, _) = connect_async(url)
        .await
        .context("Failed to connect to Gemini Live")?;
    info!(model = %setup.model, "Connected to Gemini Realtime WebSocket.");
    let (sink, stream) = ws_stream.split();
    let mut sender = GeminiSender { sink };
    let mut receiver = GeminiReceiver { stream };

    sender.send(&ClientMessage::Setup(setup)).await?;
    tokio::time::timeout(SETUP_TIMEOUT, receiver.wait_for_setup())
        .await
        .map_err(|_| anyhow!("Timed out waiting for Gemini setup to complete"))??;
    info!("Gemini session setup is complete. Ready for bidirectional streaming.");

    Ok((sender, receiver))
}

/// The sending half of a Gemini Live session.
pub struct GeminiSender {
    sink: SplitSink<WsStream, WsMessage>,
}

impl GeminiSender {
    /// Serializes and sends a client message.
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let payload = serde_json::to_string(msg)?;
        self.sink.send(WsMessage::Text(payload.into())).await?;
        Ok(())
    }

    /// Sends one chunk of base64 PCM16 audio at `INPUT_SAMPLE_RATE`.
    pub async fn send_audio(&mut self, base64_pcm16: String) -> Result<()> {
        self.send(&ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            audio: Some(Blob {
                mime_type: format!("audio/pcm;rate={INPUT_SAMPLE_RATE}"),
                data: base64_pcm16,
            }),
            ..Default::default()
        }))
        .await
    }

    /// Sends one base64 JPEG video frame.
    pub async fn send_video_frame(&mut self, base64_jpeg: String) -> Result<()> {
        self.send(&ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
            video: Some(Blob {
                mime_type: "image/jpeg".to_string(),
                data: base64_jpeg,
            }),
            ..Default::default()
        }))
        .await
    }

    /// Sends a complete user turn made of one or more text parts.
    pub async fn send_user_turn(&mut self, parts: Vec<String>) -> Result<()> {
        self.send(&ClientMessage::ClientContent(BidiGenerateContentClientContent {
            turns: vec![Content::from_texts(Some("user"), parts)],
            turn_complete: true,
        }))
        .await
    }

    /// Returns tool results to the model.
    pub async fn send_tool_response(&mut self, responses: Vec<FunctionResponse>) -> Result<()> {
        self.send(&ClientMessage::ToolResponse(BidiGenerateContentToolResponse {
            function_responses: responses,
        }))
        .await
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}

/// The receiving half of a Gemini Live session.
pub struct GeminiReceiver {
    stream: SplitStream<WsStream>,
}

impl GeminiReceiver {
    /// Waits for the next server message.
    ///
    /// Returns `None` once the server closes the connection.
    pub async fn next(&mut self) -> Option<Result<ServerMessage>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };
            // Gemini delivers JSON in both text and binary frames.
            let parsed = match frame {
                WsMessage::Text(text) => serde_json::from_str::<ServerMessage>(&text),
                WsMessage::Binary(data) => serde_json::from_slice::<ServerMessage>(&data),
                WsMessage::Close(close_frame) => {
                    info!(?close_frame, "Gemini WebSocket connection closed by server.");
                    return None;
                }
                _ => continue,
            };
            match parsed {
                Ok(msg) => return Some(Ok(msg)),
                Err(e) => warn!(error = %e, "Ignoring unparseable Gemini message"),
            }
        }
    }

    async fn wait_for_setup(&mut self) -> Result<()> {
        while let Some(msg) = self.next().await {
            let msg = msg?;
            if msg.setup_complete.is_some() {
                return Ok(());
            }
            debug!(?msg, "Received unexpected message during Gemini setup");
        }
        bail!("Gemini closed the connection during setup")
    }
}
