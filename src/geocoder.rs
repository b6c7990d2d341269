use reqwest::Client;
use serde::Deserialize;
use log::{info, debug, error};

use crate::error::AppError;
use crate::geo::Coordinate;

/// One hit from the Nominatim `/search` endpoint. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Resolves free-form addresses through a Nominatim-compatible service.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Client,
    base_url: String,
    language: String,
}

impl Geocoder {
    pub fn new(client: Client, base_url: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            language: language.into(),
        }
    }

    /// Looks up the single best match for `address`.
    pub async fn geocode(&self, address: &str) -> Result<Coordinate, AppError> {
        info!("Geocoding address: {}", address);
        let url = format!("{}/search", self.base_url);
        let params = [
            ("q", address),
            ("format", "json"),
            ("limit", "1"),
            ("accept-language", self.language.as_str()),
        ];
        debug!("Sending geocoding request to {} with params: {:?}", url, params);

        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            error!("Geocoding service returned {}", response.status());
            return Err(AppError::Network(format!("geocoding service returned {}", response.status())));
        }

        let hits = response.json::<Vec<SearchHit>>().await?;
        let hit = match hits.into_iter().next() {
            Some(hit) => hit,
            None => {
                info!("No geocoding match for {}", address);
                return Err(AppError::NotFound(address.to_string()));
            }
        };

        let coordinate = parse_hit(&hit)?;
        info!(
            "Resolved {} to {:.5},{:.5} ({})",
            address,
            coordinate.latitude,
            coordinate.longitude,
            hit.display_name.as_deref().unwrap_or("unnamed")
        );
        Ok(coordinate)
    }
}

fn parse_hit(hit: &SearchHit) -> Result<Coordinate, AppError> {
    let latitude = hit.lat.trim().parse::<f64>();
    let longitude = hit.lon.trim().parse::<f64>();
    match (latitude, longitude) {
        (Ok(latitude), Ok(longitude)) => Ok(Coordinate::new(latitude, longitude)),
        _ => {
            error!("Malformed coordinates in geocoding response: {:?}", hit);
            Err(AppError::Network(format!(
                "malformed coordinates in geocoding response: {},{}",
                hit.lat, hit.lon
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_coordinates() {
        let hits: Vec<SearchHit> = serde_json::from_str(
            r#"[{"lat": "48.8588897", "lon": "2.3200410", "display_name": "Paris, France"}]"#,
        )
        .unwrap();
        let c = parse_hit(&hits[0]).unwrap();
        assert!((c.latitude - 48.8588897).abs() < 1e-9);
        assert!((c.longitude - 2.3200410).abs() < 1e-9);
    }

    #[test]
    fn malformed_coordinates_are_a_network_error() {
        let hit = SearchHit {
            lat: "north".into(),
            lon: "2.0".into(),
            display_name: None,
        };
        assert!(matches!(parse_hit(&hit), Err(AppError::Network(_))));
    }
}
