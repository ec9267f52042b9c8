//! Kaira Agent Worker
//!
//! The worker accepts browser connections, dispatches one agent job per
//! connection and runs the Kaira assistant on Gemini Live. The
//! `kaira-agent` binary is a thin wrapper around this library.

pub mod audio_utils;
pub mod config;
pub mod router;
pub mod state;
pub mod ws;
