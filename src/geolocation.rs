use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use log::{info, debug, warn};

use crate::error::{AppError, GeolocationFailure};
use crate::geo::Coordinate;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

/// Where the device's current position comes from.
#[derive(Debug, Clone)]
pub enum DeviceLocator {
    /// Ask an ip-api compatible service, giving up after `timeout`.
    IpLookup {
        client: Client,
        url: String,
        timeout: Duration,
    },
    Fixed(Coordinate),
    Disabled,
}

impl DeviceLocator {
    pub fn ip_lookup(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        DeviceLocator::IpLookup {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub async fn locate(&self) -> Result<Coordinate, AppError> {
        match self {
            DeviceLocator::Fixed(coordinate) => Ok(*coordinate),
            DeviceLocator::Disabled => {
                warn!("Device location requested but it is disabled");
                Err(AppError::Geolocation(GeolocationFailure::Denied))
            }
            DeviceLocator::IpLookup { client, url, timeout } => {
                match tokio::time::timeout(*timeout, lookup(client, url)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("Location lookup timed out after {:?}", timeout);
                        Err(AppError::Geolocation(GeolocationFailure::Timeout))
                    }
                }
            }
        }
    }
}

async fn lookup(client: &Client, url: &str) -> Result<Coordinate, AppError> {
    debug!("Requesting device location from {}", url);
    let unavailable = AppError::Geolocation(GeolocationFailure::Unavailable);

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Location service unreachable: {}", e);
            return Err(unavailable);
        }
    };
    if !response.status().is_success() {
        warn!("Location service returned {}", response.status());
        return Err(unavailable);
    }
    let body = match response.json::<IpLookupResponse>().await {
        Ok(body) => body,
        Err(e) => {
            warn!("Unreadable location response: {}", e);
            return Err(unavailable);
        }
    };

    if body.status.as_deref() == Some("fail") {
        warn!(
            "Location service could not place this device: {}",
            body.message.as_deref().unwrap_or("no reason given")
        );
        return Err(unavailable);
    }

    match (body.lat, body.lon) {
        (Some(lat), Some(lon)) => {
            info!(
                "Device located at {:.4},{:.4} ({})",
                lat,
                lon,
                body.city.as_deref().unwrap_or("unknown city")
            );
            Ok(Coordinate::new(lat, lon))
        }
        _ => {
            warn!("Location response carried no coordinates");
            Err(unavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_position_is_returned_as_is() {
        let here = Coordinate::new(53.35, -6.26);
        assert_eq!(DeviceLocator::Fixed(here).locate().await.unwrap(), here);
    }

    #[tokio::test]
    async fn disabled_locator_reports_denied() {
        let err = DeviceLocator::Disabled.locate().await.unwrap_err();
        assert!(matches!(err, AppError::Geolocation(GeolocationFailure::Denied)));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        // port 9 (discard) on loopback is not expected to serve HTTP
        let locator = DeviceLocator::ip_lookup(Client::new(), "http://127.0.0.1:9/json", DEFAULT_TIMEOUT);
        let err = locator.locate().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Geolocation(GeolocationFailure::Unavailable) | AppError::Geolocation(GeolocationFailure::Timeout)
        ));
    }
}
