//! Finds nearby takeaways, groups them by cuisine and picks one with a spinning wheel.

pub mod api;
pub mod categorizer;
pub mod config;
pub mod controller;
pub mod error;
pub mod geo;
pub mod geocoder;
pub mod geolocation;
pub mod logging;
pub mod places;
pub mod utils;
pub mod wheel;

pub use controller::FlowController;
pub use error::AppError;
