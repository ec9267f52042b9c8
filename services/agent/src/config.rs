use kaira_core::agent::{DEFAULT_REALTIME_MODEL, DEFAULT_VOICE};
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub gemini_api_key: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub weather_api_url: Url,
    pub search_api_url: Url,
    pub tool_timeout: Duration,
    pub video_enabled: bool,
    pub log_level: Level,
}

fn parse_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let value = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&value).map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string()))
}

fn parse_bool(var: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                var.to_string(),
                format!("'{}' is not a boolean", value),
            )),
        },
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;

        let realtime_model =
            std::env::var("REALTIME_MODEL").unwrap_or_else(|_| DEFAULT_REALTIME_MODEL.to_string());
        let realtime_voice =
            std::env::var("REALTIME_VOICE").unwrap_or_else(|_| DEFAULT_VOICE.to_string());

        let weather_api_url = parse_url("WEATHER_API_URL", "https://wttr.in")?;
        let search_api_url = parse_url("SEARCH_API_URL", "https://api.duckduckgo.com/")?;

        let timeout_str = std::env::var("TOOL_TIMEOUT_SECS").unwrap_or_else(|_| "10".to_string());
        let tool_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TOOL_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        let video_enabled = parse_bool("VIDEO_ENABLED", true)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            gemini_api_key,
            realtime_model,
            realtime_voice,
            weather_api_url,
            search_api_url,
            tool_timeout,
            video_enabled,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("REALTIME_MODEL");
            env::remove_var("REALTIME_VOICE");
            env::remove_var("WEATHER_API_URL");
            env::remove_var("SEARCH_API_URL");
            env::remove_var("TOOL_TIMEOUT_SECS");
            env::remove_var("VIDEO_ENABLED");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.gemini_api_key, "test-gemini-key");
        assert_eq!(config.realtime_model, DEFAULT_REALTIME_MODEL);
        assert_eq!(config.realtime_voice, "Aoede");
        assert_eq!(config.weather_api_url.as_str(), "https://wttr.in/");
        assert_eq!(config.search_api_url.as_str(), "https://api.duckduckgo.com/");
        assert_eq!(config.tool_timeout, Duration::from_secs(10));
        assert!(config.video_enabled);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("GEMINI_API_KEY", "custom-key");
            env::set_var("REALTIME_MODEL", "gemini-live-2.5-flash-preview");
            env::set_var("REALTIME_VOICE", "Puck");
            env::set_var("WEATHER_API_URL", "http://localhost:9000");
            env::set_var("SEARCH_API_URL", "http://localhost:9001/search");
            env::set_var("TOOL_TIMEOUT_SECS", "3");
            env::set_var("VIDEO_ENABLED", "false");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.gemini_api_key, "custom-key");
        assert_eq!(config.realtime_model, "gemini-live-2.5-flash-preview");
        assert_eq!(config.realtime_voice, "Puck");
        assert_eq!(config.weather_api_url.as_str(), "http://localhost:9000/");
        assert_eq!(
            config.search_api_url.as_str(),
            "http://localhost:9001/search"
        );
        assert_eq!(config.tool_timeout, Duration::from_secs(3));
        assert!(!config.video_enabled);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("GEMINI_API_KEY")),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_blank_gemini_key() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "  ");
        }

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_values() {
        for (var, value) in [
            ("WEATHER_API_URL", "not a url"),
            ("TOOL_TIMEOUT_SECS", "0"),
            ("VIDEO_ENABLED", "maybe"),
            ("RUST_LOG", "not-a-level"),
        ] {
            clear_env_vars();
            unsafe {
                env::set_var("GEMINI_API_KEY", "test-gemini-key");
                env::set_var(var, value);
            }

            match Config::from_env().unwrap_err() {
                ConfigError::InvalidValue(got, _) => assert_eq!(got, var),
                other => panic!("Expected InvalidValue for {var}, got {other:?}"),
            }
        }
    }
}
