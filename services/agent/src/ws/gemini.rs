//! A realtime agent session backed by Google Gemini Live.
//!
//! The session serves the assistant's tools over an in-process MCP pipe,
//! advertises them to Gemini as function declarations, and then proxies the
//! room's audio, video and chat to the model while executing tool calls.

use super::protocol::{ClientMessage, ServerMessage};
use crate::audio_utils::{FRONTEND_AUDIO_SAMPLE_RATE, StreamResampler, pcm_sample_rate};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use gemini_realtime::{
    GeminiReceiver, GeminiSender,
    types::{
        AudioTranscriptionConfig, BidiGenerateContentSetup, Content, FunctionCall,
        FunctionDeclaration, FunctionResponse, GenerationConfig, LiveServerContent,
        ResponseModality, ServerMessage as GeminiMessage, SpeechConfig, Tool,
    },
};
use kaira_core::{
    agent::{Assistant, RealtimeModelConfig},
    persona::{self, Honorific, Persona},
    runtime::{AgentSession, RoomInputOptions},
};
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, CallToolResult, RawContent},
    service::{Peer, RoleClient, RunningService},
};
use serde_json::{Value, json};
use std::{collections::HashMap, fmt::Display};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Schema keywords Gemini rejects in function declarations.
const UNSUPPORTED_SCHEMA_KEYS: [&str; 5] = [
    "$schema",
    "title",
    "additionalProperties",
    "definitions",
    "$defs",
];

/// An `AgentSession` that talks to Gemini Live.
pub struct GeminiAgentSession {
    url: String,
    room: mpsc::Sender<ServerMessage>,
    persona: Persona,
    active: Option<ActiveSession>,
}

struct ActiveSession {
    tx: GeminiSender,
    rx: GeminiReceiver,
    mcp_client: RunningService<RoleClient, ()>,
    tool_server: JoinHandle<()>,
    options: RoomInputOptions,
}

impl GeminiAgentSession {
    /// Creates an idle session that will connect to `url` and report to `room`.
    pub fn new(url: String, room: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            url,
            room,
            persona: Persona::default(),
            active: None,
        }
    }

    fn active(&mut self) -> Result<&mut ActiveSession> {
        self.active
            .as_mut()
            .ok_or_else(|| anyhow!("Agent session has not been started"))
    }

    /// Drives the session until the room or Gemini disconnects.
    pub async fn run<S, E>(mut self, mut client_rx: S) -> Result<()>
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let ActiveSession {
            mut tx,
            mut rx,
            mcp_client,
            tool_server,
            options,
        } = self
            .active
            .take()
            .ok_or_else(|| anyhow!("Agent session has not been started"))?;

        let mut loop_state = SessionLoop {
            room: self.room.clone(),
            persona: self.persona.clone(),
            options,
            peer: mcp_client.peer().clone(),
            resampler: StreamResampler::for_gemini_input()?,
            pending_tools: HashMap::new(),
            speaking: false,
            boss_greeted: false,
            user_transcript: String::new(),
        };
        let (tool_done_tx, mut tool_done_rx) = mpsc::channel::<FunctionResponse>(16);

        let result: Result<()> = async {
            loop {
                tokio::select! {
                    // Frames from the room (browser).
                    frame = client_rx.next() => match frame {
                        Some(Ok(msg)) => {
                            if !loop_state.handle_client_frame(msg, &mut tx).await? {
                                info!("Client sent close frame. Shutting down session.");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error receiving from client WebSocket: {}", e);
                            break;
                        }
                        None => {
                            info!("Client disconnected.");
                            break;
                        }
                    },
                    // Messages from Gemini.
                    msg = rx.next() => match msg {
                        Some(Ok(msg)) => loop_state.handle_gemini_message(msg, &tool_done_tx).await?,
                        Some(Err(e)) => {
                            error!("Error reading from Gemini WebSocket: {}", e);
                            loop_state.notify(ServerMessage::Error {
                                message: "Voice connection lost.".to_string(),
                            }).await;
                            break;
                        }
                        None => {
                            loop_state.notify(ServerMessage::Error {
                                message: "Voice session ended.".to_string(),
                            }).await;
                            break;
                        }
                    },
                    // Finished tool calls.
                    Some(response) = tool_done_rx.recv() => {
                        loop_state.pending_tools.remove(&response.id);
                        debug!(id = %response.id, name = %response.name, "Returning tool result to Gemini");
                        tx.send_tool_response(vec![response]).await?;
                    },
                }
            }
            Ok(())
        }
        .await;

        // Clean up background tasks on exit.
        for (_, handle) in loop_state.pending_tools.drain() {
            handle.abort();
        }
        teardown(tx, mcp_client, tool_server).await;
        info!("Agent session terminated.");
        result
    }

    /// Releases a session that will never run: closes the Gemini socket and
    /// stops the tool server. Also drops the session's handle on the room.
    pub async fn shutdown(mut self) {
        if let Some(active) = self.active.take() {
            teardown(active.tx, active.mcp_client, active.tool_server).await;
            info!("Agent session shut down before running.");
        }
    }
}

async fn teardown(
    mut tx: GeminiSender,
    mcp_client: RunningService<RoleClient, ()>,
    tool_server: JoinHandle<()>,
) {
    let _ = tx.close().await;
    let _ = mcp_client.cancel().await;
    tool_server.abort();
}

#[async_trait]
impl AgentSession for GeminiAgentSession {
    async fn start(&mut self, agent: Assistant, options: RoomInputOptions) -> Result<()> {
        if self.active.is_some() {
            return Err(anyhow!("Agent session already started"));
        }
        let Assistant {
            instructions,
            llm,
            tools,
        } = agent;

        // Serve the assistant's tools in-process and connect an MCP client to them.
        let (server_transport, client_transport) = tokio::io::duplex(4096);
        let tool_server = tokio::spawn(async move {
            if let Ok(service) = tools.serve(server_transport).await {
                let _ = service.waiting().await;
            }
        });
        let connected = async {
            let mcp_client = ().serve(client_transport).await?;
            let declarations = function_declarations(mcp_client.list_all_tools().await?);
            info!(
                model = %llm.model,
                voice = %llm.voice,
                tools = declarations.len(),
                "Starting Gemini session"
            );

            let setup = build_setup(&instructions, &llm, declarations);
            let (tx, rx) = gemini_realtime::connect(&self.url, setup).await?;
            Ok::<_, anyhow::Error>((tx, rx, mcp_client))
        }
        .await;
        let (tx, rx, mcp_client) = match connected {
            Ok(parts) => parts,
            Err(e) => {
                tool_server.abort();
                return Err(e);
            }
        };

        self.active = Some(ActiveSession {
            tx,
            rx,
            mcp_client,
            tool_server,
            options,
        });
        Ok(())
    }

    async fn generate_reply(&mut self, instructions: &str) -> Result<()> {
        let session = self.active()?;
        session
            .tx
            .send_user_turn(vec![instructions.to_string()])
            .await
            .context("Failed to send reply instructions to Gemini")
    }
}

/// Per-run state of the proxy loop.
struct SessionLoop {
    room: mpsc::Sender<ServerMessage>,
    persona: Persona,
    options: RoomInputOptions,
    peer: Peer<RoleClient>,
    resampler: StreamResampler,
    pending_tools: HashMap<String, JoinHandle<()>>,
    speaking: bool,
    boss_greeted: bool,
    /// The user's speech so far in the current turn.
    user_transcript: String,
}

impl SessionLoop {
    async fn notify(&self, msg: ServerMessage) {
        if self.room.send(msg).await.is_err() {
            warn!("Room writer has shut down; dropping message.");
        }
    }

    /// Handles one browser frame. Returns `false` when the client closed.
    async fn handle_client_frame(&mut self, msg: Message, tx: &mut GeminiSender) -> Result<bool> {
        match msg {
            Message::Binary(data) => {
                if let Some(audio) = self.resampler.process(&data)? {
                    tx.send_audio(audio).await?;
                }
            }
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::UserMessage { text }) => {
                    if !self.options.chat_enabled {
                        warn!("Chat input is disabled; ignoring user message.");
                        return Ok(true);
                    }
                    let parts = self.user_turn(text).await;
                    tx.send_user_turn(parts).await?;
                }
                Ok(ClientMessage::VideoFrame { data }) => {
                    if self.options.video_enabled {
                        tx.send_video_frame(data).await?;
                    } else {
                        debug!("Video input is disabled; dropping frame.");
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring malformed client message."),
            },
            Message::Close(_) => return Ok(false),
            Message::Ping(_) | Message::Pong(_) => {}
        }
        Ok(true)
    }

    /// Builds the parts of a chat turn, adding the boss greeting directive
    /// the first time the boss introduces themselves.
    async fn user_turn(&mut self, text: String) -> Vec<String> {
        let mut parts = Vec::with_capacity(2);
        if let Some(name) = persona::detect_user_name(&text) {
            let honorific = self.persona.honorific_for(Some(&name));
            info!(%name, %honorific, "Speaker identified");
            self.notify(ServerMessage::SpeakerIdentified {
                name,
                honorific,
            })
            .await;
            if honorific == Honorific::Boss && !self.boss_greeted {
                self.boss_greeted = true;
                parts.push(text);
                parts.push(persona::greeting_directive(honorific));
                return parts;
            }
        }
        parts.push(text);
        parts
    }

    async fn handle_gemini_message(
        &mut self,
        msg: GeminiMessage,
        tool_done: &mpsc::Sender<FunctionResponse>,
    ) -> Result<()> {
        if let Some(content) = msg.server_content {
            self.handle_server_content(content).await;
        }
        if let Some(tool_call) = msg.tool_call {
            for call in tool_call.function_calls {
                self.spawn_tool_call(call, tool_done.clone()).await;
            }
        }
        if let Some(cancellation) = msg.tool_call_cancellation {
            for id in cancellation.ids {
                if let Some(handle) = self.pending_tools.remove(&id) {
                    info!(%id, "Tool call cancelled by Gemini");
                    handle.abort();
                }
            }
        }
        if let Some(go_away) = msg.go_away {
            warn!(time_left = ?go_away.time_left, "Gemini will close the session soon.");
        }
        Ok(())
    }

    async fn handle_server_content(&mut self, content: LiveServerContent) {
        if let Some(transcription) = content.input_transcription {
            if !transcription.text.is_empty() {
                self.user_transcript.push_str(&transcription.text);
                self.notify(ServerMessage::TranscriptionUpdate {
                    text: self.user_transcript.clone(),
                    is_final: false,
                })
                .await;
            }
        }
        // The user's turn is over once the model starts answering it.
        if content.model_turn.is_some()
            || content.generation_complete == Some(true)
            || content.turn_complete == Some(true)
        {
            self.finish_user_transcript().await;
        }
        if let Some(transcription) = content.output_transcription {
            if !transcription.text.is_empty() {
                self.notify(ServerMessage::AgentTranscript {
                    text: transcription.text,
                })
                .await;
            }
        }
        if let Some(model_turn) = content.model_turn {
            for part in model_turn.parts {
                if let Some(blob) = part.inline_data {
                    let Some(rate) = pcm_sample_rate(blob.mime_type.as_deref()) else {
                        debug!(mime_type = ?blob.mime_type, "Skipping non-audio inline data");
                        continue;
                    };
                    if rate != FRONTEND_AUDIO_SAMPLE_RATE {
                        warn!(rate, "Gemini audio rate differs from the browser playback rate");
                    }
                    if !self.speaking {
                        self.speaking = true;
                        self.notify(ServerMessage::AiSpeakingStart).await;
                    }
                    self.notify(ServerMessage::AudioChunk { data: blob.data })
                        .await;
                } else if let Some(text) = part.text {
                    debug!(%text, "Model text part");
                }
            }
        }
        if content.interrupted == Some(true) {
            self.speaking = false;
            self.notify(ServerMessage::Interrupted).await;
        }
        if content.turn_complete == Some(true) && self.speaking {
            self.speaking = false;
            self.notify(ServerMessage::AiSpeakingEnd).await;
        }
    }

    async fn finish_user_transcript(&mut self) {
        if self.user_transcript.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.user_transcript);
        self.notify(ServerMessage::TranscriptionUpdate {
            text,
            is_final: true,
        })
        .await;
    }

    async fn spawn_tool_call(&mut self, call: FunctionCall, done: mpsc::Sender<FunctionResponse>) {
        info!(id = %call.id, name = %call.name, "Gemini requested tool call");
        self.notify(ServerMessage::ToolInvoked {
            name: call.name.clone(),
        })
        .await;
        let id = call.id.clone();
        let peer = self.peer.clone();
        let handle = tokio::spawn(async move {
            let response = execute_tool_call(&peer, call).await;
            let _ = done.send(response).await;
        });
        if let Some(previous) = self.pending_tools.insert(id, handle) {
            previous.abort();
        }
    }
}

/// Runs one tool call against the MCP tool server.
///
/// Failures are reported back to the model as an `error` payload rather than
/// ending the session.
async fn execute_tool_call(peer: &Peer<RoleClient>, call: FunctionCall) -> FunctionResponse {
    let arguments = call.args.as_object().cloned();
    let response = match peer
        .call_tool(CallToolRequestParam {
            name: call.name.clone().into(),
            arguments,
        })
        .await
    {
        Ok(result) => tool_response_payload(result),
        Err(e) => {
            error!(name = %call.name, error = %e, "Tool call failed");
            json!({ "error": format!("Error: tool '{}' failed: {}", call.name, e) })
        }
    };
    FunctionResponse {
        id: call.id,
        name: call.name,
        response,
    }
}

/// Converts an MCP tool result into the payload Gemini expects.
fn tool_response_payload(result: CallToolResult) -> Value {
    let text = result
        .content
        .unwrap_or_default()
        .into_iter()
        .filter_map(|content| match content.raw {
            RawContent::Text(text_content) => Some(text_content.text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if result.is_error.unwrap_or(false) {
        json!({ "error": text })
    } else {
        json!({ "result": text })
    }
}

/// Converts MCP tool listings into Gemini function declarations.
pub(crate) fn function_declarations(tools: Vec<rmcp::model::Tool>) -> Vec<FunctionDeclaration> {
    tools
        .into_iter()
        .map(|t| {
            let mut parameters = Value::Object((*t.input_schema).clone());
            clean_schema(&mut parameters);
            let has_properties = parameters
                .get("properties")
                .and_then(Value::as_object)
                .is_some_and(|p| !p.is_empty());
            FunctionDeclaration {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                parameters: has_properties.then_some(parameters),
            }
        })
        .collect()
}

/// Strips JSON Schema keywords the Gemini API does not accept.
fn clean_schema(schema: &mut Value) {
    let Some(object) = schema.as_object_mut() else {
        return;
    };
    for key in UNSUPPORTED_SCHEMA_KEYS {
        object.remove(key);
    }
    for (key, value) in object.iter_mut() {
        match key.as_str() {
            "properties" => {
                if let Some(properties) = value.as_object_mut() {
                    properties.values_mut().for_each(clean_schema);
                }
            }
            "items" => clean_schema(value),
            "anyOf" | "oneOf" | "allOf" => {
                if let Some(variants) = value.as_array_mut() {
                    variants.iter_mut().for_each(clean_schema);
                }
            }
            _ => {}
        }
    }
}

/// Builds the Gemini setup message for an assistant.
pub(crate) fn build_setup(
    instructions: &str,
    llm: &RealtimeModelConfig,
    declarations: Vec<FunctionDeclaration>,
) -> BidiGenerateContentSetup {
    let model = if llm.model.starts_with("models/") {
        llm.model.clone()
    } else {
        format!("models/{}", llm.model)
    };
    let tools = if declarations.is_empty() {
        vec![]
    } else {
        vec![Tool {
            function_declarations: declarations,
        }]
    };
    BidiGenerateContentSetup {
        model,
        generation_config: GenerationConfig {
            response_modalities: vec![ResponseModality::Audio],
            speech_config: Some(SpeechConfig::prebuilt(llm.voice.clone())),
        },
        system_instruction: Some(Content::from_texts(None, [instructions.to_string()])),
        tools,
        input_audio_transcription: Some(AudioTranscriptionConfig {}),
        output_audio_transcription: Some(AudioTranscriptionConfig {}),
    }
}
