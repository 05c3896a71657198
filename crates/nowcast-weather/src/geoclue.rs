//! GeoClue2 over the system D-Bus.
//! See: https://www.freedesktop.org/software/geoclue/docs/

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use zbus::zvariant::OwnedObjectPath;
use zbus::{proxy, Connection};

use crate::error::GeolocationError;
use crate::location::before;
use crate::types::Position;

const DESKTOP_ID: &str = "nowcast";
/// GCLUE_ACCURACY_LEVEL_CITY
const ACCURACY_LEVEL_CITY: u32 = 4;
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[proxy(
    interface = "org.freedesktop.GeoClue2.Manager",
    default_service = "org.freedesktop.GeoClue2",
    default_path = "/org/freedesktop/GeoClue2/Manager",
    gen_blocking = false
)]
trait GeoClueManager {
    fn get_client(&self) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.GeoClue2.Client",
    default_service = "org.freedesktop.GeoClue2",
    gen_blocking = false
)]
trait GeoClueClient {
    fn start(&self) -> zbus::Result<()>;

    fn stop(&self) -> zbus::Result<()>;

    #[zbus(property(emits_changed_signal = "false"))]
    fn location(&self) -> zbus::Result<OwnedObjectPath>;

    #[zbus(property)]
    fn set_desktop_id(&self, id: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_requested_accuracy_level(&self, level: u32) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.GeoClue2.Location",
    default_service = "org.freedesktop.GeoClue2",
    gen_blocking = false
)]
trait GeoClueLocation {
    #[zbus(property)]
    fn latitude(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn longitude(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn accuracy(&self) -> zbus::Result<f64>;
}

/// Ask GeoClue for a city-level fix before `deadline`.
pub(crate) async fn current_position(deadline: Instant) -> Result<Position, GeolocationError> {
    let (conn, client) = before(deadline, start_client()).await?;
    stopping_after(deadline, read_location(&conn, &client), client.stop()).await
}

async fn start_client() -> Result<(Connection, GeoClueClientProxy<'static>), GeolocationError> {
    let conn = Connection::system()
        .await
        .map_err(|e| GeolocationError::Unavailable(format!("system bus: {}", e)))?;

    let manager = GeoClueManagerProxy::new(&conn).await.map_err(map_err)?;
    let client_path = manager.get_client().await.map_err(map_err)?;

    let client = GeoClueClientProxy::builder(&conn)
        .path(client_path.into_inner())
        .map_err(map_err)?
        .build()
        .await
        .map_err(map_err)?;

    client.set_desktop_id(DESKTOP_ID).await.map_err(map_err)?;
    client
        .set_requested_accuracy_level(ACCURACY_LEVEL_CITY)
        .await
        .map_err(map_err)?;
    client.start().await.map_err(map_err)?;

    Ok((conn, client))
}

/// Run `work` until `deadline`, then `stop` whether it finished or not.
async fn stopping_after<T>(
    deadline: Instant,
    work: impl Future<Output = Result<T, GeolocationError>>,
    stop: impl Future<Output = zbus::Result<()>>,
) -> Result<T, GeolocationError> {
    let result = before(deadline, work).await;

    if let Err(e) = stop.await {
        tracing::debug!("GeoClue client stop failed: {}", e);
    }

    result
}

async fn read_location(
    conn: &Connection,
    client: &GeoClueClientProxy<'_>,
) -> Result<Position, GeolocationError> {
    // The Location property stays "/" until the first fix.
    let location_path = loop {
        let path = client.location().await.map_err(map_err)?;
        if path.as_str() != "/" {
            break path;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    let location = GeoClueLocationProxy::builder(conn)
        .path(location_path.into_inner())
        .map_err(map_err)?
        .build()
        .await
        .map_err(map_err)?;

    let position = Position {
        latitude: location.latitude().await.map_err(map_err)?,
        longitude: location.longitude().await.map_err(map_err)?,
        accuracy_meters: location.accuracy().await.ok(),
    };

    tracing::info!(
        "GeoClue position: {}, {}",
        position.latitude,
        position.longitude
    );
    Ok(position)
}

fn map_err(e: zbus::Error) -> GeolocationError {
    match &e {
        zbus::Error::MethodError(name, _, _) => {
            let name = name.as_str();
            if name.ends_with("AccessDenied") {
                GeolocationError::PermissionDenied
            } else if name.ends_with("ServiceUnknown") || name.ends_with("UnknownObject") {
                GeolocationError::Unsupported
            } else {
                GeolocationError::Unavailable(e.to_string())
            }
        }
        _ => GeolocationError::Unavailable(e.to_string()),
    }
}
