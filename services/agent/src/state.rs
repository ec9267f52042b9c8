//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the configuration
//! and the tool providers shared by every agent job.

use crate::config::Config;
use kaira_core::{
    agent::{Assistant, KairaTools, RealtimeModelConfig},
    runtime::RoomInputOptions,
    tools::{search::SearchProvider, weather::WeatherProvider},
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Gemini Live endpoint, including the API key.
    pub gemini_url: String,
    pub weather: Arc<dyn WeatherProvider>,
    pub search: Arc<dyn SearchProvider>,
}

impl AppState {
    /// Builds a fresh assistant for one job.
    pub fn assistant(&self) -> Assistant {
        let llm = RealtimeModelConfig {
            model: self.config.realtime_model.clone(),
            voice: self.config.realtime_voice.clone(),
        };
        Assistant::new(
            llm,
            KairaTools::new(self.weather.clone(), self.search.clone()),
        )
    }

    pub fn room_input_options(&self) -> RoomInputOptions {
        RoomInputOptions {
            video_enabled: self.config.video_enabled,
            ..RoomInputOptions::default()
        }
    }
}
