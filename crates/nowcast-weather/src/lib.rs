//! Weather for the current location.
//!
//! Resolves where the user is (cached location, then device geolocation,
//! then IP lookup), fetches current conditions from wttr.in and turns them
//! into display-ready strings.

pub mod cache;
pub mod client;
pub mod error;
#[cfg(target_os = "linux")]
mod geoclue;
pub mod ip;
pub mod location;
pub mod presenter;
pub mod resolver;
pub mod storage;
pub mod types;
pub mod widget;

pub use cache::{LocationCache, LOCATION_CACHE_KEY};
pub use client::WeatherClient;
pub use error::{GeolocationError, ResolutionError, StorageError, WeatherFetchError, WidgetError};
pub use ip::{IpGeolocator, IpLocator};
pub use location::{FixedPosition, GeolocationSource, NoGeolocation, SystemGeolocation};
pub use presenter::{present, DisplayModel, WeatherIcon};
pub use resolver::{LocationResolver, ResolutionTier, ResolvedLocation};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use types::*;
pub use widget::{RenderState, WeatherWidget};
