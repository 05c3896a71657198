//! Single-slot location cache with a time-to-live.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::storage::KeyValueStore;
use crate::types::{CachedLocation, Location};

/// Storage key of the one cached location.
pub const LOCATION_CACHE_KEY: &str = "user_location_cache_v2";

/// Default time a resolved location stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// The last resolved location, valid while younger than the TTL.
///
/// Expired entries are ignored rather than deleted; the next resolution
/// overwrites them.
#[derive(Clone)]
pub struct LocationCache {
    store: Arc<dyn KeyValueStore>,
    ttl_ms: i64,
}

impl LocationCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// The cached location, if still valid now.
    pub fn read(&self) -> Option<CachedLocation> {
        self.read_at(Utc::now())
    }

    /// The cached location, if `now - ts < ttl`.
    ///
    /// Missing, unreadable or unusable entries read as absent.
    pub fn read_at(&self, now: DateTime<Utc>) -> Option<CachedLocation> {
        let raw = match self.store.get(LOCATION_CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Location cache read failed: {}", e);
                return None;
            }
        };

        let cached: CachedLocation = match serde_json::from_str(&raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Ignoring malformed location cache entry: {}", e);
                return None;
            }
        };

        let age_ms = now.timestamp_millis().saturating_sub(cached.ts);
        if age_ms < 0 {
            tracing::debug!("Cached location stamped {} ms in the future", age_ms.unsigned_abs());
            return None;
        }
        if age_ms >= self.ttl_ms {
            tracing::debug!("Cached location expired ({} ms old)", age_ms);
            return None;
        }

        if !cached.location.is_usable() {
            tracing::warn!("Ignoring cached location with no coordinates or place");
            return None;
        }

        Some(cached)
    }

    /// Store `location` stamped with the current time.
    pub fn write(&self, location: &Location) {
        self.write_at(location, Utc::now());
    }

    /// Store `location` stamped with `now`, replacing any previous entry.
    ///
    /// Failures are logged; the cache is an optimization only.
    pub fn write_at(&self, location: &Location, now: DateTime<Utc>) {
        let cached = CachedLocation {
            location: location.clone(),
            ts: now.timestamp_millis(),
        };

        let json = match serde_json::to_string(&cached) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize location for cache: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(LOCATION_CACHE_KEY, &json) {
            tracing::warn!("Location cache write failed: {}", e);
        }
    }
}

impl std::fmt::Debug for LocationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationCache")
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}
