//! wttr.in client for current conditions.

use std::time::Duration;

use nowcast_core::{ReqwestErrorExt, WeatherConfig};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::instrument;

use crate::error::WeatherFetchError;
use crate::ip::USER_AGENT;
use crate::types::{WeatherQuery, WeatherSnapshot};

#[derive(Debug, Deserialize)]
struct WttrResponse {
    current_condition: Option<Vec<WttrCondition>>,
    nearest_area: Option<Vec<WttrArea>>,
}

#[derive(Debug, Deserialize)]
struct WttrCondition {
    #[serde(rename = "temp_C", deserialize_with = "number_or_string")]
    temp_c: f64,
    #[serde(deserialize_with = "number_or_string")]
    humidity: f64,
    #[serde(rename = "windspeedKmph", deserialize_with = "number_or_string")]
    windspeed_kmph: f64,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<WttrValue>,
}

#[derive(Debug, Deserialize)]
struct WttrArea {
    #[serde(rename = "areaName", default)]
    area_name: Vec<WttrValue>,
}

#[derive(Debug, Deserialize)]
struct WttrValue {
    value: String,
}

/// wttr.in sends numbers as strings ("12"); accept either.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {:?}", s))),
    }
}

impl WttrResponse {
    fn into_snapshot(self) -> Option<WeatherSnapshot> {
        let current = self.current_condition?.into_iter().next()?;
        let area_name = self
            .nearest_area
            .and_then(|areas| areas.into_iter().next())
            .and_then(|area| area.area_name.into_iter().next())
            .map(|v| v.value)
            .filter(|v| !v.trim().is_empty());

        Some(WeatherSnapshot {
            temp_c: current.temp_c,
            humidity: current.humidity,
            wind_kmph: current.windspeed_kmph,
            description: current
                .weather_desc
                .into_iter()
                .next()
                .map(|v| v.value)
                .unwrap_or_default(),
            area_name,
        })
    }
}

/// Fetches current conditions by coordinates or by place name.
///
/// `Ok(None)` means the service answered without `current_condition`; there
/// is nothing to show but nothing went wrong either.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherFetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    /// Dispatch on the query shape.
    pub async fn fetch(
        &self,
        query: &WeatherQuery,
    ) -> Result<Option<WeatherSnapshot>, WeatherFetchError> {
        match query {
            WeatherQuery::Coordinates { lat, lon } => self.fetch_by_coordinates(*lat, *lon).await,
            WeatherQuery::Place(name) => self.fetch_by_place(name).await,
        }
    }

    /// `GET {base}{lat},{lon}?format=j1`
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Option<WeatherSnapshot>, WeatherFetchError> {
        let url = format!("{}{},{}?format=j1", self.base_url, lat, lon);
        self.get(&url).await
    }

    /// `GET {base}{percent-encoded name}?format=j1`. A blank name is rejected
    /// without a request.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch_by_place(
        &self,
        name: &str,
    ) -> Result<Option<WeatherSnapshot>, WeatherFetchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WeatherFetchError::EmptyPlace);
        }

        let url = format!(
            "{}{}?format=j1",
            self.base_url,
            urlencoding::encode(name)
        );
        self.get(&url).await
    }

    async fn get(&self, url: &str) -> Result<Option<WeatherSnapshot>, WeatherFetchError> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        if let Err(e) = response.error_for_status_ref() {
            return Err(WeatherFetchError::Network(e.into_network_error()));
        }

        let bytes = response.bytes().await?;
        let body: WttrResponse = serde_json::from_slice(&bytes)
            .map_err(|e| WeatherFetchError::Malformed(e.to_string()))?;

        let snapshot = body.into_snapshot();
        if snapshot.is_none() {
            tracing::warn!("Weather response has no current_condition");
        }
        Ok(snapshot)
    }
}
