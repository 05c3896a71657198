//! IP-based geolocation: the last resolution tier.

use std::time::Duration;

use async_trait::async_trait;
use nowcast_core::{ReqwestErrorExt, WeatherConfig};
use reqwest::Client;
use serde::Deserialize;

use crate::error::ResolutionError;
use crate::types::Location;

pub(crate) const USER_AGENT: &str = concat!("nowcast/", env!("CARGO_PKG_VERSION"));

/// Looks the caller's location up from their public IP.
#[async_trait]
pub trait IpLocator: Send + Sync {
    async fn locate(&self) -> Result<Location, ResolutionError>;
}

/// ipapi.co-compatible JSON body. `country` may be a code or a name depending
/// on the service, so both keys are kept as sent.
#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    country_name: Option<String>,
    #[serde(default)]
    error: bool,
    reason: Option<String>,
}

impl IpLookupResponse {
    fn into_location(self) -> Location {
        Location {
            lat: None,
            lon: None,
            city: non_empty(self.city),
            region: non_empty(self.region),
            country: non_empty(self.country),
            country_name: non_empty(self.country_name),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Single unauthenticated GET against an IP geolocation endpoint.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    client: Client,
    url: String,
}

impl IpGeolocator {
    pub fn new(config: &WeatherConfig) -> Result<Self, ResolutionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: config.ip_geolocation_url.clone(),
        })
    }
}

#[async_trait]
impl IpLocator for IpGeolocator {
    #[tracing::instrument(skip(self), level = "info")]
    async fn locate(&self) -> Result<Location, ResolutionError> {
        tracing::debug!("GET {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        if let Err(e) = response.error_for_status_ref() {
            return Err(ResolutionError::Network(e.into_network_error()));
        }

        let bytes = response.bytes().await?;
        let body: IpLookupResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ResolutionError::Malformed(e.to_string()))?;

        if body.error {
            let reason = body.reason.unwrap_or_else(|| "unknown reason".to_string());
            return Err(ResolutionError::Service(reason));
        }

        let location = body.into_location();
        if location.city().is_none() {
            tracing::warn!(
                "IP geolocation returned no city (label would be {:?})",
                location.place_label()
            );
            return Err(ResolutionError::NoPlaceName);
        }

        tracing::info!(
            "IP geolocation: {}",
            location.place_label().unwrap_or_default()
        );
        Ok(location)
    }
}
