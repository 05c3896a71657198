//! The page-ready sequence: resolve, fetch, present.

use std::sync::Arc;
use std::time::Duration;

use nowcast_core::{AppError, Config};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::cache::LocationCache;
use crate::client::WeatherClient;
use crate::error::{ResolutionError, WidgetError};
use crate::ip::IpGeolocator;
use crate::location;
use crate::presenter::{present, DisplayModel};
use crate::resolver::LocationResolver;
use crate::storage::SqliteStore;
use crate::types::WeatherQuery;

/// What the rendering layer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Ready(DisplayModel),
    /// The service answered without current conditions; fields stay unset.
    NoConditions,
    /// Error banner text.
    Failed { message: String },
}

/// Wires the resolver, the weather client and the presenter together.
///
/// Runs are serialized: a second trigger waits for the first to finish
/// instead of racing it on the cache slot.
pub struct WeatherWidget {
    resolver: LocationResolver,
    client: WeatherClient,
    run_lock: Mutex<()>,
}

impl WeatherWidget {
    pub fn new(resolver: LocationResolver, client: WeatherClient) -> Self {
        Self {
            resolver,
            client,
            run_lock: Mutex::new(()),
        }
    }

    /// Build the production widget: SQLite cache in the config directory,
    /// the configured device location source, and the configured services.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = SqliteStore::open(config.cache_db_path())?;
        let cache = LocationCache::new(
            Arc::new(store),
            Duration::from_secs(config.weather.location_ttl_minutes.saturating_mul(60)),
        );

        let geolocation = location::from_config(&config.location);
        let ip = IpGeolocator::new(&config.weather)?;
        let client = WeatherClient::new(&config.weather)?;

        Ok(Self::new(
            LocationResolver::new(cache, geolocation, Box::new(ip)),
            client,
        ))
    }

    /// One full cycle. `Ok(None)` when there are no current conditions.
    #[instrument(skip(self), level = "info")]
    pub async fn run(&self) -> Result<Option<DisplayModel>, WidgetError> {
        let _guard = self.run_lock.lock().await;

        let resolved = self.resolver.resolve_with_tier().await?;
        tracing::info!("Location resolved via {:?}", resolved.tier);

        let query =
            WeatherQuery::for_location(&resolved.location).ok_or(ResolutionError::NoPlaceName)?;

        let Some(snapshot) = self.client.fetch(&query).await? else {
            tracing::info!("No current conditions to show");
            return Ok(None);
        };

        Ok(Some(present(&snapshot, &resolved.location)))
    }

    /// Like `run`, but every outcome becomes something to render.
    pub async fn render(&self) -> RenderState {
        match self.run().await {
            Ok(Some(model)) => RenderState::Ready(model),
            Ok(None) => RenderState::NoConditions,
            Err(e) => {
                tracing::error!("Weather update failed: {}", e);
                let app_error = AppError::from(e);
                RenderState::Failed {
                    message: app_error.user_message().to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for WeatherWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherWidget")
            .field("resolver", &self.resolver)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Utc;
    use nowcast_core::WeatherConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::cache::{DEFAULT_TTL, LOCATION_CACHE_KEY};
    use crate::presenter::WeatherIcon;
    use crate::resolver::test_support::{FakeGeolocation, FakeIp};
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::types::Location;

    fn wttr_body(description: &str) -> serde_json::Value {
        serde_json::json!({
            "current_condition": [{
                "temp_C": "18",
                "humidity": "72",
                "windspeedKmph": "11",
                "weatherDesc": [{"value": description}]
            }]
        })
    }

    fn weather_client(server: &MockServer) -> WeatherClient {
        let config = WeatherConfig {
            base_url: format!("{}/", server.uri()),
            ..WeatherConfig::default()
        };
        WeatherClient::new(&config).unwrap()
    }

    fn widget(
        store: &Arc<MemoryStore>,
        geo: FakeGeolocation,
        ip: FakeIp,
        server: &MockServer,
    ) -> WeatherWidget {
        let cache = LocationCache::new(store.clone(), DEFAULT_TTL);
        WeatherWidget::new(
            LocationResolver::new(cache, Box::new(geo), Box::new(ip)),
            weather_client(server),
        )
    }

    fn lisbon() -> Location {
        Location {
            city: Some("Lisbon".into()),
            country: Some("Portugal".into()),
            ..Location::default()
        }
    }

    #[tokio::test]
    async fn test_cached_coordinates_skip_geolocation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/10,20"))
            .and(query_param("format", "j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wttr_body("Sunny")))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        store
            .set(
                LOCATION_CACHE_KEY,
                &format!(r#"{{"lat":10,"lon":20,"ts":{}}}"#, Utc::now().timestamp_millis()),
            )
            .unwrap();
        let geo = FakeGeolocation::granting(0.0, 0.0);
        let geo_calls = geo.calls.clone();
        let ip = FakeIp::returning(lisbon());
        let ip_calls = ip.calls.clone();

        let model = widget(&store, geo, ip, &server).run().await.unwrap().unwrap();

        assert_eq!(model.icon, WeatherIcon::Clear);
        assert_eq!(geo_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ip_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_granted_geolocation_fetches_by_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/-23.5,-46.6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wttr_body("Partly cloudy")))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let before = Utc::now().timestamp_millis();
        let model = widget(
            &store,
            FakeGeolocation::granting(-23.5, -46.6),
            FakeIp::failing(),
            &server,
        )
        .run()
        .await
        .unwrap()
        .unwrap();

        assert_eq!(model.temperature, "18°C");
        assert_eq!(model.humidity, "72%");
        assert_eq!(model.wind, "11 km/h");
        assert_eq!(model.icon, WeatherIcon::Clouds);

        let raw = store.get(LOCATION_CACHE_KEY).unwrap().unwrap();
        let cached: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached["lat"], -23.5);
        assert_eq!(cached["lon"], -46.6);
        assert!(cached["ts"].as_i64().unwrap() >= before);
    }

    #[tokio::test]
    async fn test_denied_geolocation_fetches_by_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Lisbon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wttr_body("Heavy rain")))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let model = widget(
            &store,
            FakeGeolocation::denying(),
            FakeIp::returning(lisbon()),
            &server,
        )
        .run()
        .await
        .unwrap()
        .unwrap();

        assert_eq!(model.place_label, "Lisbon");
        assert_eq!(model.icon, WeatherIcon::Rain);

        let raw = store.get(LOCATION_CACHE_KEY).unwrap().unwrap();
        let cached: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached["city"], "Lisbon");
        assert_eq!(cached["country"], "Portugal");
        assert!(cached.get("lat").is_none());
    }

    #[tokio::test]
    async fn test_missing_conditions_render_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let w = widget(
            &store,
            FakeGeolocation::granting(1.0, 2.0),
            FakeIp::failing(),
            &server,
        );

        assert_eq!(w.run().await.unwrap(), None);
        assert_eq!(w.render().await, RenderState::NoConditions);
    }

    #[tokio::test]
    async fn test_ip_failure_renders_error_banner() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wttr_body("Sunny")))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let w = widget(&store, FakeGeolocation::denying(), FakeIp::failing(), &server);

        match w.render().await {
            RenderState::Failed { message } => assert!(message.contains("location")),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_weather_failure_renders_error_banner() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let geo = FakeGeolocation::granting(1.0, 2.0);
        let geo_calls = geo.calls.clone();
        let w = widget(&store, geo, FakeIp::failing(), &server);

        assert!(matches!(w.run().await, Err(WidgetError::Weather(_))));
        // The device fix was cached even though the weather request failed.
        assert_eq!(
            w.render().await,
            RenderState::Failed {
                message: "Weather service unavailable. Please try again later.".into()
            }
        );
        assert_eq!(geo_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_location_without_city_is_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wttr_body("Sunny")))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        store
            .set(
                LOCATION_CACHE_KEY,
                &format!(
                    r#"{{"region":"Lisboa","ts":{}}}"#,
                    Utc::now().timestamp_millis()
                ),
            )
            .unwrap();
        let w = widget(&store, FakeGeolocation::denying(), FakeIp::failing(), &server);

        assert!(matches!(
            w.run().await,
            Err(WidgetError::Resolution(ResolutionError::NoPlaceName))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_serialized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/5,6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wttr_body("Snow")))
            .expect(2)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let geo = FakeGeolocation::granting(5.0, 6.0);
        let geo_calls = geo.calls.clone();
        let w = widget(&store, geo, FakeIp::failing(), &server);

        let (a, b) = tokio::join!(w.run(), w.run());
        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        // The second run sees the first run's cache entry.
        assert_eq!(geo_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_from_config_builds() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            config_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let widget = WeatherWidget::from_config(&config).unwrap();
        assert!(format!("{:?}", widget).contains("WeatherWidget"));
        assert!(config.cache_db_path().exists());
    }

    #[test]
    fn test_from_config_reports_unopenable_store() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let config = Config {
            config_dir: blocker,
            ..Config::default()
        };

        let err = WeatherWidget::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
