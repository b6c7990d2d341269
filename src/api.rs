use actix_governor::governor::middleware::NoOpMiddleware;
use actix_governor::{GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor};
use actix_web::{http::Method, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use log::{info, error, debug, warn};

use crate::categorizer::CardKey;
use crate::config::Config;
use crate::controller::{FlowController, SearchOutcome, SessionView};
use crate::error::AppError;
use crate::wheel::clock::{FrameClock, IntervalClock};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
struct SearchRequest {
    #[serde(alias = "Address", alias = "query")]
    address: String,
}

#[derive(Debug, Serialize)]
struct BadRequestResponse {
    error: String,
    expected_format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    outcome: SearchOutcome,
    state: SessionView,
}

#[derive(Debug, Serialize)]
struct SpinStarted {
    spin_id: u64,
    state: SessionView,
}

pub type RateLimit = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-peer quota for the controls that start work. Reads (`/api/state`,
/// `/api/wheel.svg`) stay unthrottled so the page can poll a spin.
pub fn rate_limit(config: &Config) -> Option<RateLimit> {
    GovernorConfigBuilder::default()
        .per_millisecond(config.rate_limit_replenish_ms)
        .burst_size(config.rate_limit_burst)
        .methods(vec![Method::POST])
        .finish()
}

fn request_id() -> String {
    chrono::Utc::now().format("%Y%m%d%H%M%S%f").to_string()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/api")
                .route("/state", web::get().to(state))
                .route("/locate", web::post().to(locate))
                .route("/search", web::post().to(search))
                .route("/categories/{key}/toggle", web::post().to(toggle_category))
                .route("/spin", web::post().to(spin))
                .route("/wheel.svg", web::get().to(wheel_svg)),
        );
}

async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "message": "Takeaway wheel is running"
    }))
}

async fn state(controller: web::Data<FlowController>) -> impl Responder {
    HttpResponse::Ok().json(controller.view())
}

async fn locate(controller: web::Data<FlowController>) -> Result<HttpResponse, AppError> {
    let request_id = request_id();
    info!("Request {}: Locate request received", request_id);

    match controller.locate().await {
        Ok(outcome) => {
            info!("Request {}: Location search finished: {:?}", request_id, outcome);
            Ok(HttpResponse::Ok().json(SearchResponse {
                outcome,
                state: controller.view(),
            }))
        }
        Err(e) => {
            error!("Request {}: Location search failed: {}", request_id, e);
            Err(e)
        }
    }
}

async fn search(
    body: web::Bytes,
    controller: web::Data<FlowController>,
) -> Result<HttpResponse, AppError> {
    let request_id = request_id();
    info!("Request {}: Address search received", request_id);
    debug!("Request {}: Raw request body: {}", request_id, String::from_utf8_lossy(&body));

    let req = match serde_json::from_slice::<SearchRequest>(&body) {
        Ok(req) => req,
        Err(e) => {
            let error_msg = format!("Invalid request format: {}", e);
            error!("Request {}: {}", request_id, error_msg);
            return Ok(HttpResponse::BadRequest().json(BadRequestResponse {
                error: error_msg,
                expected_format: serde_json::json!({ "address": "221B Baker Street, London" }),
            }));
        }
    };

    match controller.search_address(&req.address).await {
        Ok(outcome) => {
            info!("Request {}: Address search finished: {:?}", request_id, outcome);
            Ok(HttpResponse::Ok().json(SearchResponse {
                outcome,
                state: controller.view(),
            }))
        }
        Err(AppError::Superseded) => {
            warn!("Request {}: Superseded by a newer search", request_id);
            Err(AppError::Superseded)
        }
        Err(e) => {
            error!("Request {}: Address search failed: {}", request_id, e);
            Err(e)
        }
    }
}

async fn toggle_category(
    path: web::Path<String>,
    controller: web::Data<FlowController>,
) -> Result<HttpResponse, AppError> {
    let key = path
        .into_inner()
        .parse::<CardKey>()
        .map_err(AppError::InvalidInput)?;
    let cards = controller.toggle_category(key);
    Ok(HttpResponse::Ok().json(cards))
}

async fn spin(controller: web::Data<FlowController>) -> Result<HttpResponse, AppError> {
    let request_id = request_id();
    let mut clock = IntervalClock::default();
    let ticket = {
        let mut rng = rand::thread_rng();
        controller.begin_spin(&mut rng, clock.now())?
    };
    let spin_id = ticket.id();
    info!("Request {}: Spin {} started", request_id, spin_id);

    let driver = controller.clone().into_inner();
    actix_web::rt::spawn(async move {
        match driver.run_spin(ticket, &mut clock).await {
            Ok(result) => debug!("Spin {} finished on {}", spin_id, result.name),
            Err(AppError::Superseded) => warn!("Spin {} was superseded", spin_id),
            Err(e) => error!("Spin {} failed: {}", spin_id, e),
        }
    });

    Ok(HttpResponse::Accepted().json(SpinStarted {
        spin_id,
        state: controller.view(),
    }))
}

async fn wheel_svg(controller: web::Data<FlowController>) -> impl Responder {
    HttpResponse::Ok()
        .content_type("image/svg+xml")
        .insert_header(("Cache-Control", "no-store"))
        .body(controller.wheel_svg())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::Geocoder;
    use crate::geolocation::DeviceLocator;
    use crate::places::PlacesFetcher;
    use crate::wheel::WheelSettings;
    use actix_governor::Governor;
    use actix_web::{http::StatusCode, test, App};
    use std::net::SocketAddr;
    use reqwest::Client;

    fn controller() -> web::Data<FlowController> {
        let client = Client::new();
        web::Data::new(FlowController::new(
            Geocoder::new(client.clone(), "http://127.0.0.1:9", "en"),
            PlacesFetcher::new(client, "http://127.0.0.1:9/api/interpreter", 8000),
            DeviceLocator::Disabled,
            WheelSettings::default(),
        ))
    }

    #[actix_web::test]
    async fn health_and_index_respond() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn state_starts_without_results() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;
        let view: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/state").to_request()).await;
        assert_eq!(view["show_results"], false);
        assert_eq!(view["spin_control"]["enabled"], false);
        assert_eq!(view["phase"], "idle");
    }

    #[actix_web::test]
    async fn malformed_search_body_is_rejected_with_hint() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/search")
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["expected_format"]["address"], "221B Baker Street, London");
    }

    #[actix_web::test]
    async fn unknown_category_is_a_bad_request() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;
        let req = test::TestRequest::post().uri("/api/categories/tapas/toggle").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn spinning_an_empty_wheel_conflicts() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;
        let req = test::TestRequest::post().uri("/api/spin").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn disabled_location_is_service_unavailable() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;
        let req = test::TestRequest::post().uri("/api/locate").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "geolocation");
    }

    #[actix_web::test]
    async fn wheel_is_served_as_svg() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/wheel.svg").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/svg+xml");
        let body = test::read_body(resp).await;
        assert!(body.starts_with(b"<svg"));
    }

    #[actix_web::test]
    async fn spin_polling_is_not_throttled_by_the_default_quota() {
        let limit = rate_limit(&Config::default()).unwrap();
        let app = test::init_service(
            App::new()
                .wrap(Governor::new(&limit))
                .app_data(controller())
                .configure(configure),
        )
        .await;
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        // A 6 s spin polled every 100 ms, twice over for slack.
        for i in 0..120 {
            let uri = if i % 2 == 0 { "/api/state" } else { "/api/wheel.svg" };
            let req = test::TestRequest::get().uri(uri).peer_addr(peer).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "poll {} to {}", i, uri);
        }
    }

    #[actix_web::test]
    async fn repeated_controls_are_rate_limited() {
        let limit = rate_limit(&Config::default()).unwrap();
        let app = test::init_service(
            App::new()
                .wrap(Governor::new(&limit))
                .app_data(controller())
                .configure(configure),
        )
        .await;
        let peer: SocketAddr = "127.0.0.1:40001".parse().unwrap();

        let mut throttled = 0;
        for _ in 0..100 {
            let req = test::TestRequest::post().uri("/api/spin").peer_addr(peer).to_request();
            let resp = test::call_service(&app, req).await;
            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                throttled += 1;
            }
        }
        assert!(throttled > 0);
    }

    #[actix_web::test]
    async fn page_builds_place_names_as_text() {
        let app = test::init_service(App::new().app_data(controller()).configure(configure)).await;
        let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/").to_request()).await;
        let page = String::from_utf8_lossy(&body);
        assert!(!page.contains("innerHTML"));
        assert!(page.contains("name.textContent = r.name"));
        assert!(!page.contains("requestAnimationFrame"));
    }
}
