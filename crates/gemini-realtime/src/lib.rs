//! Minimal client for the Gemini Live (`BidiGenerateContent`) realtime API.

pub mod client;
pub mod types;

pub use client::{GeminiReceiver, GeminiSender, connect, endpoint};
