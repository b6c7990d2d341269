use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use log::{info, debug, warn, error};

use crate::error::AppError;
use crate::geo::Coordinate;

pub const DEFAULT_SEARCH_RADIUS_METERS: u32 = 8000;

/// A takeaway candidate, annotated with its distance from the search origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub tags: HashMap<String, String>,
}

impl Place {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Queries an Overpass endpoint for fast-food and restaurant nodes around a point.
#[derive(Debug, Clone)]
pub struct PlacesFetcher {
    client: Client,
    base_url: String,
    radius_meters: u32,
}

impl PlacesFetcher {
    pub fn new(client: Client, base_url: impl Into<String>, radius_meters: u32) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            radius_meters,
        }
    }

    pub fn radius_meters(&self) -> u32 {
        self.radius_meters
    }

    pub async fn fetch(&self, origin: &Coordinate) -> Result<Vec<Place>, AppError> {
        info!(
            "Fetching takeaways within {} m of {:.5},{:.5}",
            self.radius_meters, origin.latitude, origin.longitude
        );
        let query = build_query(origin, self.radius_meters);
        debug!("Overpass query: {}", query);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("data", query.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Overpass returned {}: {}", status, body);
            return Err(AppError::Network(format!("places service returned {}", status)));
        }

        let payload = response.json::<OverpassResponse>().await?;
        let raw_count = payload.elements.len();
        let places = collect_places(payload.elements, origin);
        if places.len() < raw_count {
            warn!("Discarded {} of {} records", raw_count - places.len(), raw_count);
        }
        info!("Found {} eligible takeaways", places.len());
        Ok(places)
    }
}

pub fn build_query(origin: &Coordinate, radius_meters: u32) -> String {
    let around = format!("around:{},{},{}", radius_meters, origin.latitude, origin.longitude);
    format!(
        "[out:json][timeout:25];(node[\"amenity\"=\"fast_food\"]({around});node[\"amenity\"=\"restaurant\"]({around}););out body;",
        around = around
    )
}

fn collect_places(elements: Vec<OverpassElement>, origin: &Coordinate) -> Vec<Place> {
    elements
        .into_iter()
        .filter_map(|element| into_place(element, origin))
        .collect()
}

fn into_place(element: OverpassElement, origin: &Coordinate) -> Option<Place> {
    let (latitude, longitude) = (element.lat?, element.lon?);
    let name = element.tags.get("name")?.trim().to_string();
    if name.is_empty() {
        return None;
    }
    if element.tags.get("takeaway").map(|v| v.trim()) == Some("no") {
        return None;
    }

    let distance_meters = origin.distance_to(&Coordinate::new(latitude, longitude));
    Some(Place {
        name,
        latitude,
        longitude,
        distance_meters,
        tags: element.tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements(json: &str) -> Vec<OverpassElement> {
        serde_json::from_str::<OverpassResponse>(json).unwrap().elements
    }

    #[test]
    fn query_selects_both_amenities_within_radius() {
        let q = build_query(&Coordinate::new(51.5, -0.12), 8000);
        assert!(q.starts_with("[out:json]"));
        assert!(q.contains("node[\"amenity\"=\"fast_food\"](around:8000,51.5,-0.12)"));
        assert!(q.contains("node[\"amenity\"=\"restaurant\"](around:8000,51.5,-0.12)"));
    }

    #[test]
    fn filters_unnamed_and_no_takeaway_records() {
        let origin = Coordinate::new(0.0, 0.0);
        let raw = elements(
            r#"{"elements": [
                {"type": "node", "id": 1, "lat": 0.0, "lon": 0.01, "tags": {"name": "Luigi's", "cuisine": "pizza"}},
                {"type": "node", "id": 2, "lat": 0.0, "lon": 0.02, "tags": {"amenity": "fast_food"}},
                {"type": "node", "id": 3, "lat": 0.0, "lon": 0.03, "tags": {"name": "   "}},
                {"type": "node", "id": 4, "lat": 0.0, "lon": 0.04, "tags": {"name": "Sit Down Only", "takeaway": "no"}},
                {"type": "node", "id": 5, "lat": 0.0, "lon": 0.05, "tags": {"name": "Wok Express", "takeaway": "yes"}},
                {"type": "node", "id": 6, "lat": 0.0, "lon": 0.06, "tags": {"name": "Only", "takeaway": "only"}}
            ]}"#,
        );
        let places = collect_places(raw, &origin);
        let names: Vec<&str> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Luigi's", "Wok Express", "Only"]);
    }

    #[test]
    fn distance_is_computed_from_origin() {
        let origin = Coordinate::new(0.0, 0.0);
        let raw = elements(r#"{"elements": [{"lat": 0.0, "lon": 1.0, "tags": {"name": "Far"}}]}"#);
        let places = collect_places(raw, &origin);
        assert!((places[0].distance_meters - 111_195.0).abs() < 100.0);
        assert_eq!(places[0].tag("name"), Some("Far"));
    }

    #[test]
    fn empty_response_yields_no_places() {
        let raw = elements(r#"{"version": 0.6, "elements": []}"#);
        assert!(collect_places(raw, &Coordinate::new(1.0, 1.0)).is_empty());
    }
}
