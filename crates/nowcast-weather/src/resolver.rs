//! Location resolution: cache, then device geolocation, then IP lookup.

use crate::cache::LocationCache;
use crate::error::ResolutionError;
use crate::ip::IpLocator;
use crate::location::GeolocationSource;
use crate::types::Location;

/// Which tier produced a location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    Cache,
    Device,
    Ip,
}

/// A resolved location and the tier that answered
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub location: Location,
    pub tier: ResolutionTier,
}

/// Produces a location using the first tier that succeeds.
///
/// A cache hit is returned as is, with no write-back and no refreshed
/// timestamp. Device geolocation is tried once; any failure (denied,
/// unsupported, timed out) falls through to IP lookup. Locations from the
/// device or IP tiers are written to the cache before being returned.
pub struct LocationResolver {
    cache: LocationCache,
    geolocation: Box<dyn GeolocationSource>,
    ip: Box<dyn IpLocator>,
}

impl LocationResolver {
    pub fn new(
        cache: LocationCache,
        geolocation: Box<dyn GeolocationSource>,
        ip: Box<dyn IpLocator>,
    ) -> Self {
        Self {
            cache,
            geolocation,
            ip,
        }
    }

    /// Resolve a location; only an IP lookup failure is an error.
    pub async fn resolve(&self) -> Result<Location, ResolutionError> {
        self.resolve_with_tier().await.map(|r| r.location)
    }

    #[tracing::instrument(skip(self), level = "info")]
    pub async fn resolve_with_tier(&self) -> Result<ResolvedLocation, ResolutionError> {
        if let Some(cached) = self.cache.read() {
            tracing::info!("Using cached location");
            return Ok(ResolvedLocation {
                location: cached.location,
                tier: ResolutionTier::Cache,
            });
        }

        match self.geolocation.current_position().await {
            Ok(position) => {
                tracing::info!(
                    "Device location: {}, {}",
                    position.latitude,
                    position.longitude
                );
                let location = Location::from(position);
                self.cache.write(&location);
                return Ok(ResolvedLocation {
                    location,
                    tier: ResolutionTier::Device,
                });
            }
            Err(e) => {
                tracing::info!("Device location unavailable ({}), falling back to IP", e);
            }
        }

        let location = self.ip.locate().await?;
        self.cache.write(&location);
        Ok(ResolvedLocation {
            location,
            tier: ResolutionTier::Ip,
        })
    }
}

impl std::fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::error::{GeolocationError, ResolutionError};
    use crate::ip::IpLocator;
    use crate::location::GeolocationSource;
    use crate::types::{Location, Position};

    /// Geolocation fake that answers with a fixed result and counts prompts.
    pub struct FakeGeolocation {
        pub answer: Option<Position>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeGeolocation {
        pub fn granting(latitude: f64, longitude: f64) -> Self {
            Self {
                answer: Some(Position {
                    latitude,
                    longitude,
                    accuracy_meters: None,
                }),
                calls: Arc::default(),
            }
        }

        pub fn denying() -> Self {
            Self {
                answer: None,
                calls: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl GeolocationSource for FakeGeolocation {
        async fn current_position(&self) -> Result<Position, GeolocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.ok_or(GeolocationError::PermissionDenied)
        }
    }

    /// IP locator fake with a canned answer and a call counter.
    pub struct FakeIp {
        pub answer: Option<Location>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeIp {
        pub fn returning(location: Location) -> Self {
            Self {
                answer: Some(location),
                calls: Arc::default(),
            }
        }

        pub fn failing() -> Self {
            Self {
                answer: None,
                calls: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl IpLocator for FakeIp {
        async fn locate(&self) -> Result<Location, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .clone()
                .ok_or_else(|| ResolutionError::Service("fake outage".into()))
        }
    }
}
