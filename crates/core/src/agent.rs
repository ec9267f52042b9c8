//! Kaira Assistant
//!
//! This module defines the assistant configuration handed to a realtime
//! session (persona, model selection, tools) and the tool service that
//! exposes the weather and search tools over the Model Context Protocol.
//! The session talks to the tool service through an in-process MCP client,
//! so the realtime model sees exactly the tools advertised here.

use crate::persona::AGENT_INSTRUCTION;
use crate::tools::{
    search::{self, SearchProvider},
    weather::{self, WeatherProvider},
};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Default Gemini Live model with native audio output.
pub const DEFAULT_REALTIME_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
/// Default prebuilt voice.
pub const DEFAULT_VOICE: &str = "Aoede";

/// Model selection for the realtime session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeModelConfig {
    pub model: String,
    pub voice: String,
}

impl Default for RealtimeModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

/// One assistant configuration: persona text, model and tools.
pub struct Assistant {
    /// Persona instructions given to the model at session setup.
    pub instructions: String,
    /// Which realtime model and voice to use.
    pub llm: RealtimeModelConfig,
    /// The tools the model may call.
    pub tools: KairaTools,
}

impl Assistant {
    /// Creates the Kaira assistant with the default persona.
    pub fn new(llm: RealtimeModelConfig, tools: KairaTools) -> Self {
        Self {
            instructions: AGENT_INSTRUCTION.clone(),
            llm,
            tools,
        }
    }
}

// --- Data Structures for Tools ---

/// Arguments for the `get_weather` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct GetWeatherArgs {
    /// The city or place to look up.
    #[schemars(description = "The city or place to get the current weather for, e.g. 'Paris'")]
    pub location: String,
}

/// Arguments for the `search_web` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct SearchWebArgs {
    /// Free-text query.
    #[schemars(description = "What to search the web for")]
    pub query: String,
}

// --- Service and Handler Implementation ---

/// MCP tool server exposing the assistant's tools.
pub struct KairaTools {
    weather: Arc<dyn WeatherProvider>,
    search: Arc<dyn SearchProvider>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for KairaTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl KairaTools {
    pub fn new(weather: Arc<dyn WeatherProvider>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            weather,
            search,
            tool_router: Self::tool_router(),
        }
    }

    /// Looks up current weather conditions for a location.
    #[tool(description = "Get the current weather for a given location.")]
    pub async fn get_weather(&self, args: Parameters<GetWeatherArgs>) -> Result<String, String> {
        info!(location = %args.0.location, "Executing tool 'get_weather'");
        weather::get_weather(self.weather.as_ref(), &args.0.location).await
    }

    /// Searches the web and returns a short digest.
    #[tool(description = "Search the web and return a short digest of the top results.")]
    pub async fn search_web(&self, args: Parameters<SearchWebArgs>) -> Result<String, String> {
        info!(query = %args.0.query, "Executing tool 'search_web'");
        search::search_web(self.search.as_ref(), &args.0.query).await
    }
}
