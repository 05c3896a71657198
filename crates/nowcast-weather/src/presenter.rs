//! Turns a weather snapshot into display strings.

use serde::{Deserialize, Serialize};

use crate::types::{Location, WeatherSnapshot};

/// Weather icon assets shipped with the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeatherIcon {
    #[default]
    Clear,
    Clouds,
    Mist,
    Rain,
    Snow,
    Drizzle,
}

/// wttr.in description -> icon. Exact matches only; anything else is `Clear`.
const ICON_TABLE: &[(&str, WeatherIcon)] = &[
    ("Sunny", WeatherIcon::Clear),
    ("Clear", WeatherIcon::Clear),
    ("Partly cloudy", WeatherIcon::Clouds),
    ("Cloudy", WeatherIcon::Clouds),
    ("Overcast", WeatherIcon::Clouds),
    ("Mist", WeatherIcon::Mist),
    ("Patchy rain possible", WeatherIcon::Rain),
    ("Light rain", WeatherIcon::Rain),
    ("Moderate rain", WeatherIcon::Rain),
    ("Heavy rain", WeatherIcon::Rain),
    ("Snow", WeatherIcon::Snow),
    ("Drizzle", WeatherIcon::Drizzle),
];

impl WeatherIcon {
    pub fn for_description(description: &str) -> Self {
        let description = description.trim();
        ICON_TABLE
            .iter()
            .find(|(text, _)| *text == description)
            .map(|(_, icon)| *icon)
            .unwrap_or_default()
    }

    /// Image file name, e.g. `rain.png`
    pub fn asset_name(&self) -> &'static str {
        match self {
            Self::Clear => "clear.png",
            Self::Clouds => "clouds.png",
            Self::Mist => "mist.png",
            Self::Rain => "rain.png",
            Self::Snow => "snow.png",
            Self::Drizzle => "drizzle.png",
        }
    }

    /// Path relative to the page root, e.g. `images/rain.png`
    pub fn asset_path(&self) -> String {
        format!("images/{}", self.asset_name())
    }
}

/// Everything the page shows, already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayModel {
    /// `"21°C"`
    pub temperature: String,
    pub place_label: String,
    /// `"64%"`
    pub humidity: String,
    /// `"13 km/h"`
    pub wind: String,
    pub description: String,
    pub icon: WeatherIcon,
}

/// Build the display model. Pure: same input, same output.
///
/// The place label is the first non-empty of city, region, country name and
/// country; a location with none of those (device coordinates) falls back to
/// the area wttr.in reports, or stays empty.
pub fn present(snapshot: &WeatherSnapshot, location: &Location) -> DisplayModel {
    let place_label = location
        .place_label()
        .or(snapshot.area_name.as_deref())
        .unwrap_or_default()
        .to_string();

    DisplayModel {
        temperature: format!("{}°C", whole(snapshot.temp_c)),
        place_label,
        humidity: format!("{}%", whole(snapshot.humidity)),
        wind: format!("{} km/h", whole(snapshot.wind_kmph)),
        description: snapshot.description.clone(),
        icon: WeatherIcon::for_description(&snapshot.description),
    }
}

fn whole(value: f64) -> i64 {
    // `as` saturates and maps NaN to 0.
    value.round() as i64
}
