//! Kaira Core
//!
//! The assistant itself: persona text, the weather and web search tools, the
//! MCP tool service that exposes them, and the per-job entry routine a
//! realtime runtime calls to bootstrap a session.

pub mod agent;
pub mod persona;
pub mod runtime;
pub mod tools;
