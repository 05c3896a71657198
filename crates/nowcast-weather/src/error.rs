//! Error types for location resolution and weather fetching.
//!
//! `GeolocationError` never leaves this crate: the resolver falls through to
//! IP lookup. `StorageError` only surfaces when the store cannot be opened;
//! once running, the cache fails open. `ResolutionError` and
//! `WeatherFetchError` are surfaced through `WidgetError`.

use nowcast_core::{
    AppError, DatabaseError, LocationError, NetworkError, ReqwestErrorExt, RusqliteErrorExt,
    WeatherError,
};
use thiserror::Error;

/// Device geolocation failures. All of them fall through to IP lookup.
#[derive(Debug, Error)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location services not supported on this platform")]
    Unsupported,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// IP geolocation failed, so no location could be resolved.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("IP geolocation request failed: {0}")]
    Network(#[from] NetworkError),

    #[error("IP geolocation response malformed: {0}")]
    Malformed(String),

    #[error("IP geolocation service refused: {0}")]
    Service(String),

    #[error("Resolved location has no city to query weather for")]
    NoPlaceName,
}

impl From<reqwest::Error> for ResolutionError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.into_network_error())
    }
}

/// Weather lookup failed.
#[derive(Debug, Error)]
pub enum WeatherFetchError {
    #[error("Weather request failed: {0}")]
    Network(#[from] NetworkError),

    #[error("Weather response malformed: {0}")]
    Malformed(String),

    #[error("Place name is empty")]
    EmptyPlace,
}

impl From<reqwest::Error> for WeatherFetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.into_network_error())
    }
}

/// Key-value persistence failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.into_database_error())
    }
}

/// Anything that stops the widget from producing a display model.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Weather(#[from] WeatherFetchError),
}

impl From<ResolutionError> for AppError {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::Network(n) => AppError::Network(n),
            ResolutionError::Malformed(s) | ResolutionError::Service(s) => {
                AppError::Location(LocationError::LookupFailed(s))
            }
            ResolutionError::NoPlaceName => AppError::Location(LocationError::NoPlaceName(
                "IP geolocation returned no city".into(),
            )),
        }
    }
}

impl From<WeatherFetchError> for AppError {
    fn from(e: WeatherFetchError) -> Self {
        match e {
            WeatherFetchError::Network(NetworkError::ServerError { status, .. })
                if status >= 500 =>
            {
                AppError::Weather(WeatherError::ServiceUnavailable)
            }
            WeatherFetchError::Network(n) => AppError::Network(n),
            WeatherFetchError::Malformed(s) => AppError::Weather(WeatherError::ApiError(s)),
            WeatherFetchError::EmptyPlace => {
                AppError::Weather(WeatherError::InvalidQuery("empty place name".into()))
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Database(d) => AppError::Database(d),
            StorageError::Io(io) => AppError::Io(io),
        }
    }
}

impl From<WidgetError> for AppError {
    fn from(e: WidgetError) -> Self {
        match e {
            WidgetError::Resolution(r) => r.into(),
            WidgetError::Weather(w) => w.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_place_name_maps_to_location_error() {
        let app: AppError = WidgetError::from(ResolutionError::NoPlaceName).into();
        assert!(matches!(
            app,
            AppError::Location(LocationError::NoPlaceName(_))
        ));
        assert!(app.user_message().contains("no city"));
    }

    #[test]
    fn test_network_errors_keep_their_kind() {
        let app: AppError = WeatherFetchError::Network(NetworkError::Timeout).into();
        assert!(matches!(app, AppError::Network(NetworkError::Timeout)));
    }

    #[test]
    fn test_weather_server_outage_is_service_unavailable() {
        let app: AppError = WeatherFetchError::Network(NetworkError::ServerError {
            status: 502,
            message: "bad gateway".into(),
        })
        .into();
        assert!(matches!(
            app,
            AppError::Weather(WeatherError::ServiceUnavailable)
        ));

        let app: AppError = WeatherFetchError::Network(NetworkError::ServerError {
            status: 404,
            message: "not found".into(),
        })
        .into();
        assert!(matches!(app, AppError::Network(NetworkError::ServerError { .. })));
    }

    #[test]
    fn test_storage_errors_map_to_database_and_io() {
        let app: AppError = StorageError::from(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(14),
            Some("unable to open database file".into()),
        ))
        .into();
        assert!(matches!(
            app,
            AppError::Database(DatabaseError::ConnectionFailed(_))
        ));
        assert!(app.user_message().contains("local data"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let app: AppError = StorageError::Io(io).into();
        assert!(matches!(app, AppError::Io(_)));
    }

    #[test]
    fn test_empty_place_maps_to_invalid_query() {
        let app: AppError = WeatherFetchError::EmptyPlace.into();
        assert!(matches!(app, AppError::Weather(WeatherError::InvalidQuery(_))));
    }
}
