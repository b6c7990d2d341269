use actix_web::{web, App, HttpServer, middleware::Logger};
use dotenv::dotenv;
use reqwest::Client;
use std::env;
use std::io;
use log::info;
use actix_governor::Governor;

use takeaway_wheel::{api, config::Config, logging, utils, FlowController};

const CONFIG_KEYS: &[&str] = &[
    "TAKEAWAY_BIND_ADDR",
    "NOMINATIM_URL",
    "OVERPASS_URL",
    "IP_GEOLOCATION_URL",
    "GEOCODER_LANGUAGE",
    "SEARCH_RADIUS_METERS",
    "MAX_WHEEL_ITEMS",
    "SPIN_DURATION_MS",
    "GEOLOCATION_TIMEOUT_SECS",
    "WHEEL_SIZE_PX",
    "RATE_LIMIT_REPLENISH_MS",
    "RATE_LIMIT_BURST",
    "LOG_DIR",
    "LOG_LEVEL",
];

fn log_environment_variables() {
    let mut env_vars = std::collections::BTreeMap::new();
    for (key, value) in env::vars() {
        let upper = key.to_uppercase();
        if upper.contains("KEY") || upper.contains("TOKEN") || upper.contains("SECRET") {
            env_vars.insert(key, utils::mask_secret(&value));
        } else if CONFIG_KEYS.contains(&key.as_str()) {
            env_vars.insert(key, value);
        }
    }
    info!(
        "Environment overrides: {}",
        serde_json::to_string_pretty(&env_vars).unwrap_or_default()
    );
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    if let Err(e) = logging::setup_logging(&config) {
        eprintln!("Failed to set up file logging, using stderr only: {}", e);
        logging::setup_fallback_logging(&config);
    }

    log_environment_variables();
    info!("Effective configuration: {:?}", config);

    let client = Client::builder()
        .user_agent(Config::user_agent())
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let controller = web::Data::new(FlowController::from_config(client, &config));

    let governor_config = api::rate_limit(&config)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid rate limit settings"))?;

    info!("Starting takeaway wheel on http://{}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Governor::new(&governor_config))
            .app_data(controller.clone())
            .configure(api::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
