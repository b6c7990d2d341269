use url::Url;
use log::{debug, error};

use crate::error::AppError;
use crate::geo::Coordinate;

pub const MAX_ADDRESS_LEN: usize = 200;

const DIRECTIONS_BASE: &str = "https://www.google.com/maps/dir/";
const WEB_SEARCH_BASE: &str = "https://www.google.com/search";

pub fn validate_service_url(url: &str) -> Result<String, String> {
    debug!("Validating service URL: {}", url);

    if url.len() > 2000 {
        error!("URL exceeds maximum length");
        return Err("URL exceeds maximum length".to_string());
    }

    let parsed_url = Url::parse(url).map_err(|e| {
        error!("Invalid URL format: {}", e);
        "Invalid URL format".to_string()
    })?;

    if !matches!(parsed_url.scheme(), "http" | "https") {
        error!("Unsupported URL scheme: {}", parsed_url.scheme());
        return Err(format!("Unsupported URL scheme: {}", parsed_url.scheme()));
    }

    if parsed_url.host_str().is_none() {
        error!("URL has no host");
        return Err("URL has no host".to_string());
    }

    Ok(url.trim_end_matches('/').to_string())
}

/// Trims the typed address and rejects empty or oversized input.
pub fn sanitize_address(address: &str) -> Result<String, AppError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("Please enter an address".to_string()));
    }
    if trimmed.chars().count() > MAX_ADDRESS_LEN {
        return Err(AppError::InvalidInput(format!(
            "Address is longer than {} characters",
            MAX_ADDRESS_LEN
        )));
    }
    Ok(trimmed.to_string())
}

pub fn mask_secret(value: &str) -> String {
    if value.chars().count() > 5 {
        let visible: String = value.chars().take(5).collect();
        format!("{}{}", visible, "*".repeat(value.chars().count() - 5))
    } else {
        value.to_string()
    }
}

fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{}?{}", base, query)
}

pub fn directions_link(destination: &Coordinate) -> String {
    let destination = format!("{},{}", destination.latitude, destination.longitude);
    with_query(DIRECTIONS_BASE, &[("api", "1"), ("destination", destination.as_str())])
}

pub fn web_search_link(name: &str) -> String {
    let query = format!("{} order online", name);
    with_query(WEB_SEARCH_BASE, &[("q", query.as_str())])
}
