//! Defines the WebSocket message protocol between the browser client and the agent.
//!
//! Binary frames from the client carry microphone audio (PCM16, mono, 24kHz)
//! and are not part of this JSON protocol.

use kaira_core::persona::Honorific;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the agent.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A typed chat message from the user.
    UserMessage { text: String },
    /// One camera or screen-share frame, base64 encoded JPEG.
    VideoFrame { data: String },
}

/// Messages sent from the agent to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The agent has joined the room.
    AgentConnected { job_id: Uuid },
    /// An update on the user's speech-to-text transcription.
    TranscriptionUpdate { text: String, is_final: bool },
    /// Text of what the assistant is saying.
    AgentTranscript { text: String },
    /// A chunk of audio data (base64 encoded PCM16, 24kHz) for the AI's voice.
    AudioChunk { data: String },
    /// Signals that the AI has started speaking.
    AiSpeakingStart,
    /// Signals that the AI has finished speaking.
    AiSpeakingEnd,
    /// The user barged in and the current reply was cut off.
    Interrupted,
    /// The assistant is running a tool.
    ToolInvoked { name: String },
    /// The user introduced themselves over chat.
    SpeakerIdentified { name: String, honorific: Honorific },
    /// Reports a fatal error to the client.
    Error { message: String },
}
