//! Core library for the `cityweather` app.
//!
//! This crate defines:
//! - Configuration & the per-client settings injected at startup
//! - Geocoding, device-location and forecast clients
//! - The URL-driven fetch state machine and the screen that drives it
//! - Display models for the forecast
//!
//! It is used by `cityweather-cli`, but any other front-end can drive a
//! [`Screen`] the same way.

pub mod config;
pub mod error;
pub mod fetch;
pub mod forecast;
pub mod geocoding;
pub mod location;
pub mod model;
pub mod screen;
pub mod view;

pub use config::{ClientConfig, Config};
pub use error::LookupError;
pub use fetch::{Fetch, FetchState, Fetcher};
pub use forecast::ForecastClient;
pub use geocoding::GeocodingClient;
pub use location::{DeviceLocation, FixedDevice, LocationProvider, Permission};
pub use model::{Coordinates, ForecastPayload, Place};
pub use screen::{Layout, Screen, SearchOutcome};
pub use view::WeatherView;
