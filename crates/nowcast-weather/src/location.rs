//! Device geolocation: one prompt, one answer.

use std::time::Duration;

use async_trait::async_trait;
use nowcast_core::{GeolocationProvider, LocationConfig};

use crate::error::GeolocationError;
use crate::types::Position;

/// A single-shot source of device coordinates.
///
/// Callers treat every error the same way, so implementations need not be
/// careful about which variant they return.
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    async fn current_position(&self) -> Result<Position, GeolocationError>;
}

/// The platform location service (GeoClue on Linux, the WinRT geolocator on
/// Windows), bounded by a timeout.
#[derive(Debug, Clone)]
pub struct SystemGeolocation {
    timeout: Duration,
}

impl SystemGeolocation {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Whether this build has a platform backend at all
    pub fn is_supported() -> bool {
        cfg!(any(target_os = "linux", windows))
    }
}

#[async_trait]
impl GeolocationSource for SystemGeolocation {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        if !Self::is_supported() {
            return Err(GeolocationError::Unsupported);
        }

        platform_position(self.timeout).await
    }
}

/// Await `fut`, mapping an elapsed deadline to `GeolocationError::Timeout`.
#[cfg(any(target_os = "linux", windows))]
pub(crate) async fn before<T>(
    deadline: tokio::time::Instant,
    fut: impl std::future::Future<Output = Result<T, GeolocationError>>,
) -> Result<T, GeolocationError> {
    tokio::time::timeout_at(deadline, fut)
        .await
        .unwrap_or(Err(GeolocationError::Timeout))
}

#[cfg(target_os = "linux")]
async fn platform_position(timeout: Duration) -> Result<Position, GeolocationError> {
    crate::geoclue::current_position(tokio::time::Instant::now() + timeout).await
}

#[cfg(windows)]
async fn platform_position(timeout: Duration) -> Result<Position, GeolocationError> {
    let deadline = tokio::time::Instant::now() + timeout;
    before(deadline, async {
        tokio::task::spawn_blocking(windows_position)
            .await
            .map_err(|e| GeolocationError::Unavailable(e.to_string()))?
    })
    .await
}

#[cfg(windows)]
fn windows_position() -> Result<Position, GeolocationError> {
    use windows::Devices::Geolocation::{GeolocationAccessStatus, Geolocator};

    let unavailable = |e: windows::core::Error| GeolocationError::Unavailable(e.to_string());

    let access = Geolocator::RequestAccessAsync()
        .and_then(|op| op.get())
        .map_err(unavailable)?;
    if access != GeolocationAccessStatus::Allowed {
        return Err(GeolocationError::PermissionDenied);
    }

    let geolocator = Geolocator::new().map_err(unavailable)?;
    let coordinate = geolocator
        .GetGeopositionAsync()
        .and_then(|op| op.get())
        .and_then(|pos| pos.Coordinate())
        .map_err(unavailable)?;
    let point = coordinate
        .Point()
        .and_then(|p| p.Position())
        .map_err(unavailable)?;

    Ok(Position {
        latitude: point.Latitude,
        longitude: point.Longitude,
        accuracy_meters: coordinate.Accuracy().ok(),
    })
}

#[cfg(not(any(target_os = "linux", windows)))]
async fn platform_position(_timeout: Duration) -> Result<Position, GeolocationError> {
    Err(GeolocationError::Unsupported)
}

/// Coordinates taken from configuration; always "granted".
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition {
    position: Position,
}

impl FixedPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            position: Position {
                latitude,
                longitude,
                accuracy_meters: None,
            },
        }
    }
}

#[async_trait]
impl GeolocationSource for FixedPosition {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Ok(self.position)
    }
}

/// Device geolocation switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

#[async_trait]
impl GeolocationSource for NoGeolocation {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Build the source selected by `[location] provider`.
pub fn from_config(config: &LocationConfig) -> Box<dyn GeolocationSource> {
    match config.provider {
        GeolocationProvider::System => {
            Box::new(SystemGeolocation::new(Duration::from_secs(config.timeout_secs)))
        }
        GeolocationProvider::Fixed => match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => Box::new(FixedPosition::new(lat, lon)),
            _ => {
                tracing::warn!("Fixed location provider has no coordinates; skipping device location");
                Box::new(NoGeolocation)
            }
        },
        GeolocationProvider::Disabled => Box::new(NoGeolocation),
    }
}
