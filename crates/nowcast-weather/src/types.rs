use serde::{Deserialize, Serialize};

/// Where the user is, as precisely as we could tell.
///
/// Device geolocation fills only `lat`/`lon`; IP lookup fills only the place
/// fields. A usable location has both coordinates or at least one place field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
}

impl Location {
    /// Location from device coordinates, with no place name
    pub fn from_coordinates(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            ..Self::default()
        }
    }

    /// Both coordinates, if present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    /// Non-blank city name
    pub fn city(&self) -> Option<&str> {
        non_blank(self.city.as_deref())
    }

    /// First non-empty of city, region, country name, country
    pub fn place_label(&self) -> Option<&str> {
        non_blank(self.city.as_deref())
            .or_else(|| non_blank(self.region.as_deref()))
            .or_else(|| non_blank(self.country_name.as_deref()))
            .or_else(|| non_blank(self.country.as_deref()))
    }

    /// Whether some weather lookup can be made from this location
    pub fn is_usable(&self) -> bool {
        self.coordinates().is_some() || self.place_label().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A location as persisted in the cache slot: `{...Location, "ts": millis}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLocation {
    #[serde(flatten)]
    pub location: Location,
    /// Epoch milliseconds at which the location was resolved
    pub ts: i64,
}

/// Coordinates reported by a device geolocation source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

impl From<Position> for Location {
    fn from(position: Position) -> Self {
        Location::from_coordinates(position.latitude, position.longitude)
    }
}

/// Which of the two wttr.in request shapes to use
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    Coordinates { lat: f64, lon: f64 },
    Place(String),
}

impl WeatherQuery {
    /// Coordinates win when both are present; otherwise the city is queried.
    ///
    /// Returns `None` for a location with neither coordinates nor a city.
    /// Region and country only ever feed the display label.
    pub fn for_location(location: &Location) -> Option<Self> {
        if let Some((lat, lon)) = location.coordinates() {
            return Some(Self::Coordinates { lat, lon });
        }
        location.city().map(|city| Self::Place(city.to_string()))
    }
}

/// Current conditions, parsed from `current_condition[0]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Celsius
    pub temp_c: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// km/h
    pub wind_kmph: f64,
    pub description: String,
    /// wttr.in's `nearest_area[0].areaName[0].value`, if sent
    pub area_name: Option<String>,
}
