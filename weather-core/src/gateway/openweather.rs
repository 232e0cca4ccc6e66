use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    ServiceError,
    model::{WeatherResult, condition_code},
};

use super::WeatherGateway;

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherGateway {
    api_key: String,
    endpoint: String,
    http: Client,
}

impl OpenWeatherGateway {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(Self {
            api_key,
            endpoint: format!("{}{CURRENT_WEATHER_PATH}", base_url.trim_end_matches('/')),
            http,
        })
    }

    async fn fetch_current(&self, query: &[(&str, String)]) -> Result<WeatherResult, ServiceError> {
        let res = self
            .http
            .get(&self.endpoint)
            .query(query)
            .query(&[("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| {
                ServiceError::NetworkFailure(format!("request to OpenWeather failed: {e}"))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            ServiceError::NetworkFailure(format!("failed to read OpenWeather response body: {e}"))
        })?;

        if !status.is_success() {
            return Err(ServiceError::NetworkFailure(format!(
                "OpenWeather request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        parse_current(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u16,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    weather: Vec<OwWeather>,
}

fn parse_current(body: &str) -> Result<WeatherResult, ServiceError> {
    let parsed: OwCurrentResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::ParseFailure(format!("invalid OpenWeather JSON: {e}")))?;

    let condition = parsed.weather.first().ok_or_else(|| {
        ServiceError::ParseFailure("OpenWeather response contained no weather entry".into())
    })?;

    Ok(WeatherResult {
        temperature_celsius: parsed.main.temp,
        city_name: parsed.name,
        condition_code: condition_code(condition.id).to_string(),
    })
}

#[async_trait]
impl WeatherGateway for OpenWeatherGateway {
    async fn fetch_by_city(&self, name: &str) -> Result<WeatherResult, ServiceError> {
        self.fetch_current(&[("q", name.to_string())]).await
    }

    async fn fetch_by_coordinate(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherResult, ServiceError> {
        self.fetch_current(&[("lat", latitude.to_string()), ("lon", longitude.to_string())])
            .await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
