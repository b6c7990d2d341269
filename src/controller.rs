use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use log::{info, debug, warn, error};

use crate::categorizer::{self, CardKey, CategoryCard, CuisineKey, Selection};
use crate::config::Config;
use crate::error::AppError;
use crate::geo::Coordinate;
use crate::geocoder::Geocoder;
use crate::geolocation::DeviceLocator;
use crate::places::{Place, PlacesFetcher};
use crate::utils;
use crate::wheel::clock::FrameClock;
use crate::wheel::{self, SpinTicket, WheelEngine, WheelPhase, WheelSettings};

pub const NO_PLACES_STATUS: &str = "No takeaways found nearby. Try expanding your search radius.";
pub const SPIN_CANCELLED_STATUS: &str = "Spin cancelled: categories changed. Spin again!";
const READY_STATUS: &str = "Search by address or use your location to find takeaways.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    Loaded { count: usize },
    NoPlaces,
}

/// The winner as shown in the result panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpinResult {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub cuisine: CuisineKey,
    pub directions_url: String,
    pub search_url: String,
}

impl SpinResult {
    fn for_place(place: &Place) -> Self {
        Self {
            name: place.name.clone(),
            latitude: place.latitude,
            longitude: place.longitude,
            distance_meters: place.distance_meters,
            cuisine: categorizer::categorize(place),
            directions_url: utils::directions_link(&place.coordinate()),
            search_url: utils::web_search_link(&place.name),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpinControl {
    pub enabled: bool,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WheelEntry {
    pub name: String,
    pub distance_meters: f64,
    pub cuisine: CuisineKey,
}

/// Everything the page needs to render itself.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub status: String,
    pub origin: Option<Coordinate>,
    pub total_places: usize,
    pub show_results: bool,
    pub categories: Vec<CategoryCard>,
    pub wheel: Vec<WheelEntry>,
    pub phase: WheelPhase,
    pub rotation_degrees: f64,
    pub spin_control: SpinControl,
    pub result: Option<SpinResult>,
}

struct Session {
    status: String,
    origin: Option<Coordinate>,
    places: Vec<Place>,
    selection: Selection,
    wheel: WheelEngine,
    result: Option<SpinResult>,
    search_generation: u64,
    spinning: Option<u64>,
}

/// Owns the single session: the place list, the category selection and the wheel.
pub struct FlowController {
    geocoder: Geocoder,
    fetcher: PlacesFetcher,
    locator: DeviceLocator,
    wheel_settings: WheelSettings,
    session: Mutex<Session>,
    inflight_search: Mutex<Option<AbortHandle>>,
}

impl FlowController {
    pub fn new(
        geocoder: Geocoder,
        fetcher: PlacesFetcher,
        locator: DeviceLocator,
        wheel_settings: WheelSettings,
    ) -> Self {
        Self {
            geocoder,
            fetcher,
            locator,
            wheel_settings,
            session: Mutex::new(Session {
                status: READY_STATUS.to_string(),
                origin: None,
                places: Vec::new(),
                selection: Selection::default(),
                wheel: WheelEngine::new(Vec::new(), wheel_settings),
                result: None,
                search_generation: 0,
                spinning: None,
            }),
            inflight_search: Mutex::new(None),
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        let geocoder = Geocoder::new(client.clone(), &config.nominatim_url, &config.geocoder_language);
        let fetcher = PlacesFetcher::new(client.clone(), &config.overpass_url, config.search_radius_meters);
        let locator = match &config.ip_geolocation_url {
            Some(url) => DeviceLocator::ip_lookup(client, url, config.geolocation_timeout),
            None => DeviceLocator::Disabled,
        };
        let settings = WheelSettings {
            max_items: config.max_wheel_items,
            spin_duration: config.spin_duration,
            size_px: config.wheel_size_px,
        };
        Self::new(geocoder, fetcher, locator, settings)
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> String {
        self.session().status.clone()
    }

    /// Geolocation flow: locate the device, then load places around it.
    pub async fn locate(&self) -> Result<SearchOutcome, AppError> {
        let generation = self.begin_search("Getting your location...".to_string());
        let locator = self.locator.clone();
        let fetcher = self.fetcher.clone();
        let result = self
            .run_search(async move {
                let origin = locator.locate().await?;
                let places = fetcher.fetch(&origin).await?;
                Ok((origin, places))
            })
            .await;
        self.finish_search(generation, result)
    }

    /// Manual address flow: geocode the address, then load places around it.
    pub async fn search_address(&self, address: &str) -> Result<SearchOutcome, AppError> {
        let address = match utils::sanitize_address(address) {
            Ok(address) => address,
            Err(e) => {
                self.session().status = e.status_message();
                return Err(e);
            }
        };

        let generation = self.begin_search(format!("Searching near {}...", address));
        let geocoder = self.geocoder.clone();
        let fetcher = self.fetcher.clone();
        let result = self
            .run_search(async move {
                let origin = geocoder.geocode(&address).await?;
                let places = fetcher.fetch(&origin).await?;
                Ok((origin, places))
            })
            .await;
        self.finish_search(generation, result)
    }

    fn begin_search(&self, status: String) -> u64 {
        let mut session = self.session();
        session.search_generation += 1;
        session.status = status;
        session.search_generation
    }

    /// Runs one search as its own task, aborting whichever search ran before it.
    async fn run_search<F>(&self, work: F) -> Result<(Coordinate, Vec<Place>), AppError>
    where
        F: Future<Output = Result<(Coordinate, Vec<Place>), AppError>> + Send + 'static,
    {
        let task = tokio::spawn(work);
        let previous = self
            .inflight_search
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task.abort_handle());
        if let Some(previous) = previous {
            debug!("Aborting previous in-flight search");
            previous.abort();
        }

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AppError::Superseded),
            Err(e) => Err(AppError::Internal(e.to_string())),
        }
    }

    fn finish_search(
        &self,
        generation: u64,
        result: Result<(Coordinate, Vec<Place>), AppError>,
    ) -> Result<SearchOutcome, AppError> {
        let mut session = self.session();
        if session.search_generation != generation {
            warn!("Dropping results of search #{}; a newer search is running", generation);
            return Err(AppError::Superseded);
        }

        match result {
            Ok((origin, places)) => {
                session.origin = Some(origin);
                session.selection.clear();
                session.result = None;
                session.spinning = None;
                session.wheel = WheelEngine::new(places.clone(), self.wheel_settings);
                session.places = places;

                if session.places.is_empty() {
                    info!("Search #{} found no takeaways", generation);
                    session.status = NO_PLACES_STATUS.to_string();
                    return Ok(SearchOutcome::NoPlaces);
                }

                let count = session.places.len();
                info!("Search #{} loaded {} takeaways", generation, count);
                session.status = format!("Found {} takeaways nearby! Pick a category or spin the wheel.", count);
                Ok(SearchOutcome::Loaded { count })
            }
            Err(AppError::Superseded) => Err(AppError::Superseded),
            Err(e) => {
                error!("Search #{} failed: {}", generation, e);
                session.status = e.status_message();
                Err(e)
            }
        }
    }

    /// Toggles a category card and rebuilds the wheel from the filtered places.
    pub fn toggle_category(&self, key: CardKey) -> Vec<CategoryCard> {
        let mut session = self.session();
        session.selection.toggle(key);

        let filtered: Vec<Place> = categorizer::filter_places(&session.places, &session.selection)
            .into_iter()
            .cloned()
            .collect();
        debug!("Category {} toggled; {} places match", key.as_str(), filtered.len());
        if session.spinning.take().is_some() {
            warn!("Category changed mid-spin; the running spin is dropped");
            session.status = SPIN_CANCELLED_STATUS.to_string();
        }
        session.wheel = WheelEngine::new(filtered, self.wheel_settings);
        categorizer::category_cards(&session.places, &session.selection)
    }

    /// Starts a spin if the wheel has places and is not already spinning.
    pub fn begin_spin<R: Rng + ?Sized>(&self, rng: &mut R, now: Duration) -> Result<SpinTicket, AppError> {
        let mut session = self.session();
        if session.spinning.is_some() {
            return Err(AppError::SpinUnavailable("the wheel is already spinning".to_string()));
        }
        let ticket = match session.wheel.start_spin(rng, now) {
            Ok(ticket) => ticket,
            Err(e) => {
                session.status = e.status_message();
                return Err(e);
            }
        };
        session.spinning = Some(ticket.id());
        session.result = None;
        session.status = "Spinning...".to_string();
        Ok(ticket)
    }

    /// Drives a started spin to completion on `clock` and publishes the winner.
    pub async fn run_spin<C: FrameClock>(&self, ticket: SpinTicket, clock: &mut C) -> Result<SpinResult, AppError> {
        let spin_id = ticket.id();
        let frames = wheel::animate(clock, |now| self.session().wheel.advance(spin_id, now)).await;
        debug!("Spin {} animated in {} frames", spin_id, frames);

        let outcome = ticket.outcome().await;
        let mut session = self.session();
        if session.spinning == Some(spin_id) {
            session.spinning = None;
        }
        let outcome = outcome?;

        let result = SpinResult::for_place(&outcome.place);
        info!("Winner: {} ({:.0} m away)", result.name, result.distance_meters);
        session.status = format!("🎉 {} it is!", result.name);
        session.result = Some(result.clone());
        Ok(result)
    }

    pub fn view(&self) -> SessionView {
        let session = self.session();
        let items = session.wheel.items();
        let spinning = session.spinning.is_some();
        let spin_control = if spinning {
            SpinControl { enabled: false, label: "Spinning..." }
        } else if items.len() < 2 {
            SpinControl { enabled: false, label: "Need 2+ places" }
        } else {
            SpinControl { enabled: true, label: "SPIN!" }
        };

        SessionView {
            status: session.status.clone(),
            origin: session.origin,
            total_places: session.places.len(),
            show_results: !session.places.is_empty(),
            categories: if session.places.is_empty() {
                Vec::new()
            } else {
                categorizer::category_cards(&session.places, &session.selection)
            },
            wheel: items
                .iter()
                .map(|place| WheelEntry {
                    name: place.name.clone(),
                    distance_meters: place.distance_meters,
                    cuisine: categorizer::categorize(place),
                })
                .collect(),
            phase: session.wheel.phase(),
            rotation_degrees: session.wheel.rotation(),
            spin_control,
            result: session.result.clone(),
        }
    }

    /// The current wheel frame as an SVG document.
    pub fn wheel_svg(&self) -> String {
        self.session().wheel.frame().to_svg()
    }
}
