//! Session bootstrap.
//!
//! The runtime owns the room and the realtime session; this module only
//! defines the seams it must provide and the entry routine it runs once per
//! job.

use crate::agent::Assistant;
use crate::persona::SESSION_INSTRUCTION;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

#[cfg(test)]
use mockall::automock;

/// What a session accepts from the room it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomInputOptions {
    /// Forward camera frames to the model.
    pub video_enabled: bool,
    /// Forward typed chat messages to the model.
    pub chat_enabled: bool,
}

impl Default for RoomInputOptions {
    fn default() -> Self {
        Self {
            video_enabled: true,
            chat_enabled: true,
        }
    }
}

/// The job context handed to the entry point by the runtime.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobContext: Send + Sync {
    /// Joins the room. Called exactly once per job.
    async fn connect(&self) -> Result<()>;
}

/// A realtime conversation bound to a room.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentSession: Send {
    /// Starts the session with the given assistant.
    async fn start(&mut self, agent: Assistant, options: RoomInputOptions) -> Result<()>;

    /// Asks the model to produce a reply following `instructions`.
    async fn generate_reply(&mut self, instructions: &str) -> Result<()>;
}

/// Entry routine run once per job.
///
/// Starts the session, joins the room, then issues the scripted opening
/// reply. Errors are returned to the runtime unchanged apart from context.
pub async fn entrypoint<C, S>(
    ctx: &C,
    session: &mut S,
    agent: Assistant,
    options: RoomInputOptions,
) -> Result<()>
where
    C: JobContext + ?Sized,
    S: AgentSession + ?Sized,
{
    session
        .start(agent, options)
        .await
        .context("Failed to start agent session")?;
    ctx.connect().await.context("Failed to connect to room")?;
    info!("Connected to room. Sending opening reply.");
    session
        .generate_reply(&SESSION_INSTRUCTION)
        .await
        .context("Failed to request opening reply")?;
    Ok(())
}
