use log::LevelFilter;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::utils;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read from the environment (optionally seeded from `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub nominatim_url: String,
    pub overpass_url: String,
    /// `None` when device location is switched off.
    pub ip_geolocation_url: Option<String>,
    pub geocoder_language: String,
    pub search_radius_meters: u32,
    pub max_wheel_items: usize,
    pub spin_duration: Duration,
    pub geolocation_timeout: Duration,
    pub wheel_size_px: f64,
    pub rate_limit_replenish_ms: u64,
    pub rate_limit_burst: u32,
    pub log_dir: PathBuf,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9999".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            ip_geolocation_url: Some("http://ip-api.com/json".to_string()),
            geocoder_language: "en".to_string(),
            search_radius_meters: 8000,
            max_wheel_items: 100,
            spin_duration: Duration::from_millis(6000),
            geolocation_timeout: Duration::from_secs(10),
            wheel_size_px: 500.0,
            rate_limit_replenish_ms: 50,
            rate_limit_burst: 40,
            log_dir: PathBuf::from("logs"),
            log_level: LevelFilter::Debug,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(addr) = lookup("TAKEAWAY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(url) = lookup("NOMINATIM_URL") {
            config.nominatim_url = service_url("NOMINATIM_URL", url)?;
        }
        if let Some(url) = lookup("OVERPASS_URL") {
            config.overpass_url = service_url("OVERPASS_URL", url)?;
        }
        if let Some(url) = lookup("IP_GEOLOCATION_URL") {
            config.ip_geolocation_url = if url.eq_ignore_ascii_case("off") {
                None
            } else {
                Some(service_url("IP_GEOLOCATION_URL", url)?)
            };
        }
        if let Some(lang) = lookup("GEOCODER_LANGUAGE") {
            config.geocoder_language = lang;
        }
        if let Some(v) = lookup("SEARCH_RADIUS_METERS") {
            config.search_radius_meters = positive("SEARCH_RADIUS_METERS", v)?;
        }
        if let Some(v) = lookup("MAX_WHEEL_ITEMS") {
            config.max_wheel_items = positive("MAX_WHEEL_ITEMS", v)?;
        }
        if let Some(v) = lookup("SPIN_DURATION_MS") {
            config.spin_duration = Duration::from_millis(positive("SPIN_DURATION_MS", v)?);
        }
        if let Some(v) = lookup("GEOLOCATION_TIMEOUT_SECS") {
            config.geolocation_timeout = Duration::from_secs(positive("GEOLOCATION_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = lookup("WHEEL_SIZE_PX") {
            config.wheel_size_px = positive::<u32>("WHEEL_SIZE_PX", v)? as f64;
        }
        if let Some(v) = lookup("RATE_LIMIT_REPLENISH_MS") {
            config.rate_limit_replenish_ms = positive("RATE_LIMIT_REPLENISH_MS", v)?;
        }
        if let Some(v) = lookup("RATE_LIMIT_BURST") {
            config.rate_limit_burst = positive("RATE_LIMIT_BURST", v)?;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = LevelFilter::from_str(&level).map_err(|e| ConfigError::Invalid {
                key: "LOG_LEVEL",
                value: level.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(config)
    }

    pub fn user_agent() -> String {
        format!("takeaway-wheel/{}", env!("CARGO_PKG_VERSION"))
    }
}

fn service_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    utils::validate_service_url(&value).map_err(|reason| ConfigError::Invalid { key, value, reason })
}

fn positive<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.search_radius_meters, 8000);
        assert_eq!(config.max_wheel_items, 100);
        assert_eq!(config.spin_duration, Duration::from_millis(6000));
        assert_eq!(config.geolocation_timeout, Duration::from_secs(10));
        assert_eq!(config.geocoder_language, "en");
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("SEARCH_RADIUS_METERS", "1500"),
            ("IP_GEOLOCATION_URL", "off"),
            ("LOG_LEVEL", "warn"),
            ("NOMINATIM_URL", "http://127.0.0.1:8080"),
        ])
        .unwrap();
        assert_eq!(config.search_radius_meters, 1500);
        assert!(config.ip_geolocation_url.is_none());
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.nominatim_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(config_from(&[("MAX_WHEEL_ITEMS", "0")]).is_err());
        assert!(config_from(&[("SPIN_DURATION_MS", "soon")]).is_err());
        assert!(config_from(&[("OVERPASS_URL", "ftp://example.com")]).is_err());
    }
}
