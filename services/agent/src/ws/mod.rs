//! WebSocket Agent Jobs
//!
//! Every browser connection to `/ws` is dispatched as one agent job:
//!
//! - `protocol`: the JSON message format between the browser and the agent.
//! - `room`: the job context bound to the browser connection.
//! - `gemini`: the realtime session backed by Gemini Live.
//! - `session`: the connection lifecycle, from upgrade to teardown.

mod gemini;
pub mod protocol;
pub mod room;
pub mod session;

pub use gemini::GeminiAgentSession;
pub use session::ws_handler;
