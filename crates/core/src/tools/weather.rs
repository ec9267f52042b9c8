//! Weather lookup tool.

use super::{ToolError, error_text, require_input};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{info, warn};

/// Current conditions for a location, as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub location: String,
    pub temperature_c: f64,
    pub condition: String,
    pub feels_like_c: Option<f64>,
    pub humidity: Option<u8>,
    pub wind_kmph: Option<f64>,
}

impl WeatherReport {
    /// A one-line summary suitable for the assistant to read aloud.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{}: {}, {}°C",
            self.location,
            self.condition.to_lowercase(),
            format_number(self.temperature_c)
        );
        if let Some(feels_like) = self.feels_like_c {
            if feels_like != self.temperature_c {
                text.push_str(&format!(" (feels like {}°C)", format_number(feels_like)));
            }
        }
        if let Some(humidity) = self.humidity {
            text.push_str(&format!(", humidity {humidity}%"));
        }
        if let Some(wind) = self.wind_kmph {
            text.push_str(&format!(", wind {} km/h", format_number(wind)));
        }
        text
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// A source of current weather conditions.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, location: &str) -> Result<WeatherReport, ToolError>;
}

/// Looks up the weather for `location` and renders it as text.
///
/// Never fails: provider errors come back as a marked error string.
pub async fn get_weather(provider: &dyn WeatherProvider, location: &str) -> Result<String, String> {
    let lookup = async {
        let location = require_input(location, "location")?;
        provider.current(location).await
    };
    match lookup.await {
        Ok(report) => {
            info!(location = %report.location, "Weather retrieved");
            Ok(report.summary())
        }
        Err(e) => {
            warn!(%location, error = %e, "Weather lookup failed");
            Err(error_text(&format!("retrieve the weather for '{}'", location.trim()), &e))
        }
    }
}

/// `WeatherProvider` backed by the wttr.in JSON API.
pub struct WttrProvider {
    client: Client,
    base_url: Url,
}

impl WttrProvider {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn location_url(&self, location: &str) -> Result<Url, ToolError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ToolError::Decode(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(location);
        url.query_pairs_mut().append_pair("format", "j1");
        Ok(url)
    }
}

#[async_trait]
impl WeatherProvider for WttrProvider {
    async fn current(&self, location: &str) -> Result<WeatherReport, ToolError> {
        let url = self.location_url(location)?;
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(ToolError::NotFound(location.to_string())),
            status if !status.is_success() => return Err(ToolError::Status(status)),
            _ => {}
        }
        let body = response.text().await?;
        parse_wttr(location, &body)
    }
}

#[derive(Deserialize)]
struct WttrResponse {
    #[serde(default)]
    current_condition: Vec<WttrCondition>,
    #[serde(default)]
    nearest_area: Vec<WttrArea>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WttrCondition {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: Option<String>,
    humidity: Option<String>,
    windspeed_kmph: Option<String>,
    #[serde(default)]
    weather_desc: Vec<WttrValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WttrArea {
    #[serde(default)]
    area_name: Vec<WttrValue>,
    #[serde(default)]
    country: Vec<WttrValue>,
}

#[derive(Deserialize)]
struct WttrValue {
    value: String,
}

/// Parses a wttr.in `format=j1` payload.
pub(crate) fn parse_wttr(requested: &str, body: &str) -> Result<WeatherReport, ToolError> {
    let parsed: WttrResponse =
        serde_json::from_str(body).map_err(|e| ToolError::Decode(e.to_string()))?;
    let current = parsed
        .current_condition
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::NotFound(requested.to_string()))?;

    let temperature_c = current
        .temp_c
        .trim()
        .parse::<f64>()
        .map_err(|_| ToolError::Decode(format!("temperature '{}'", current.temp_c)))?;
    let condition = current
        .weather_desc
        .into_iter()
        .map(|d| d.value.trim().to_string())
        .find(|d| !d.is_empty())
        .ok_or_else(|| ToolError::Decode("missing weather description".to_string()))?;

    let location = parsed
        .nearest_area
        .into_iter()
        .next()
        .and_then(|area| {
            let name = area.area_name.into_iter().next()?.value;
            Some(match area.country.into_iter().next() {
                Some(country) if !country.value.is_empty() => format!("{name}, {}", country.value),
                _ => name,
            })
        })
        .unwrap_or_else(|| requested.to_string());

    Ok(WeatherReport {
        location,
        temperature_c,
        condition,
        feels_like_c: current.feels_like_c.and_then(|v| v.trim().parse().ok()),
        humidity: current.humidity.and_then(|v| v.trim().parse().ok()),
        wind_kmph: current.windspeed_kmph.and_then(|v| v.trim().parse().ok()),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tools::tests::serve_once;

    /// A provider that answers every lookup with a fixed report or failure.
    pub(crate) struct StubWeather {
        pub temperature_c: f64,
        pub condition: &'static str,
        pub fail: bool,
    }

    #[async_trait]
    impl WeatherProvider for StubWeather {
        async fn current(&self, location: &str) -> Result<WeatherReport, ToolError> {
            if self.fail {
                return Err(ToolError::Status(StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(WeatherReport {
                location: location.to_string(),
                temperature_c: self.temperature_c,
                condition: self.condition.to_string(),
                feels_like_c: None,
                humidity: None,
                wind_kmph: None,
            })
        }
    }

    const PARIS_J1: &str = r#"{
        "current_condition": [{
            "FeelsLikeC": "17",
            "humidity": "72",
            "temp_C": "18",
            "weatherDesc": [{"value": "Partly cloudy"}],
            "windspeedKmph": "11"
        }],
        "nearest_area": [{
            "areaName": [{"value": "Paris"}],
            "country": [{"value": "France"}]
        }]
    }"#;

    #[tokio::test]
    async fn test_get_weather_stubbed_provider() {
        let provider = StubWeather {
            temperature_c: 18.0,
            condition: "cloudy",
            fail: false,
        };
        let text = get_weather(&provider, "Paris").await.unwrap();
        assert!(text.contains("18"));
        assert!(text.contains("cloudy"));
        assert_eq!(text, "Paris: cloudy, 18°C");
    }

    #[tokio::test]
    async fn test_get_weather_provider_failure_is_marked() {
        let provider = StubWeather {
            temperature_c: 0.0,
            condition: "",
            fail: true,
        };
        let err = get_weather(&provider, "Paris").await.unwrap_err();
        assert!(err.starts_with(crate::tools::ERROR_PREFIX));
        assert!(err.contains("Paris"));
        assert!(err.contains("503"));
    }

    #[tokio::test]
    async fn test_get_weather_empty_location() {
        let provider = StubWeather {
            temperature_c: 18.0,
            condition: "cloudy",
            fail: false,
        };
        let err = get_weather(&provider, "   ").await.unwrap_err();
        assert!(err.starts_with(crate::tools::ERROR_PREFIX));
        assert!(err.contains("location must not be empty"));
    }

    #[test]
    fn test_parse_wttr() {
        let report = parse_wttr("paris", PARIS_J1).unwrap();
        assert_eq!(report.location, "Paris, France");
        assert_eq!(report.temperature_c, 18.0);
        assert_eq!(report.condition, "Partly cloudy");
        assert_eq!(report.feels_like_c, Some(17.0));
        assert_eq!(report.humidity, Some(72));
        assert_eq!(report.wind_kmph, Some(11.0));
        assert_eq!(
            report.summary(),
            "Paris, France: partly cloudy, 18°C (feels like 17°C), humidity 72%, wind 11 km/h"
        );
    }

    #[test]
    fn test_parse_wttr_without_conditions() {
        let err = parse_wttr("Atlantis", r#"{"current_condition": []}"#).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(loc) if loc == "Atlantis"));
    }

    #[test]
    fn test_parse_wttr_garbage() {
        let err = parse_wttr("Paris", "Unknown location; please try ~48.85,2.35").unwrap_err();
        assert!(matches!(err, ToolError::Decode(_)));
    }

    #[test]
    fn test_location_url_is_encoded() {
        let provider = WttrProvider::new(Client::new(), Url::parse("https://wttr.in").unwrap());
        let url = provider.location_url("New York").unwrap();
        assert_eq!(url.as_str(), "https://wttr.in/New%20York?format=j1");
    }

    #[tokio::test]
    async fn test_wttr_provider_fetches_j1() {
        let (base, server) = serve_once(200, PARIS_J1).await;
        let provider = WttrProvider::new(Client::new(), base);

        let report = provider.current("Paris").await.unwrap();
        assert_eq!(report.location, "Paris, France");
        assert_eq!(report.temperature_c, 18.0);
        assert_eq!(server.await.unwrap(), "/Paris?format=j1");
    }

    #[tokio::test]
    async fn test_wttr_provider_unknown_location() {
        let (base, _server) = serve_once(404, "{}").await;
        let provider = WttrProvider::new(Client::new(), base);

        let err = provider.current("Atlantis").await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(loc) if loc == "Atlantis"));
    }

    #[tokio::test]
    async fn test_wttr_provider_server_error() {
        let (base, _server) = serve_once(500, "{}").await;
        let provider = WttrProvider::new(Client::new(), base);

        let err = provider.current("Paris").await.unwrap_err();
        assert!(matches!(err, ToolError::Status(StatusCode::INTERNAL_SERVER_ERROR)));
    }

    #[test]
    fn test_summary_fractional_values() {
        let report = WeatherReport {
            location: "Oslo".into(),
            temperature_c: -2.5,
            condition: "Light Snow".into(),
            feels_like_c: Some(-2.5),
            humidity: None,
            wind_kmph: None,
        };
        assert_eq!(report.summary(), "Oslo: light snow, -2.5°C");
    }
}
