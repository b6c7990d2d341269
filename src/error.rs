use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// Why the device location could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationFailure {
    Denied,
    Unavailable,
    Timeout,
}

impl fmt::Display for GeolocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GeolocationFailure::Denied => "location access denied",
            GeolocationFailure::Unavailable => "location unavailable",
            GeolocationFailure::Timeout => "location request timed out",
        };
        f.write_str(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No match found for \"{0}\"")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Could not get your location: {0}")]
    Geolocation(GeolocationFailure),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Cannot spin: {0}")]
    SpinUnavailable(String),
    #[error("Request superseded by a newer one")]
    Superseded,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Network(_) => "network",
            AppError::Geolocation(_) => "geolocation",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::SpinUnavailable(_) => "spin_unavailable",
            AppError::Superseded => "superseded",
            AppError::Internal(_) => "internal",
        }
    }

    /// Short text shown in the status line when a flow ends with this error.
    pub fn status_message(&self) -> String {
        match self {
            AppError::NotFound(address) => {
                format!("Couldn't find \"{}\". Try a more specific address.", address)
            }
            AppError::Network(_) => "Couldn't reach the map service. Please try again.".to_string(),
            AppError::Geolocation(reason) => {
                format!("Couldn't get your location ({}). Try entering an address.", reason)
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::Geolocation(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::SpinUnavailable(_) | AppError::Superseded => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.status_message(),
            kind: self.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Network("down".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::Geolocation(GeolocationFailure::Timeout).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::Superseded.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn status_message_mentions_the_address() {
        let msg = AppError::NotFound("Nowhere Lane".into()).status_message();
        assert!(msg.contains("Nowhere Lane"));
    }
}
