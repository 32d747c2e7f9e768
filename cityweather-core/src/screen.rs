//! The root screen: owns the selected place, derives the forecast URL from it
//! and exposes the search actions that replace it.

use std::{fmt, sync::Arc};

use crate::{
    config::ClientConfig,
    error::LookupError,
    fetch::{FetchState, Fetcher},
    forecast::ForecastClient,
    geocoding::GeocodingClient,
    location::{DeviceLocation, LocationProvider},
    model::{ForecastPayload, Place},
    view::WeatherView,
};

pub const FRONT_PAGE_HINT: &str = "Search and select a city to see the forecast.";

/// Result of a search action. `Selected` is the only way a place reaches
/// the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Blank query; nothing happened.
    Ignored,
    Selected(Place),
    Failed(LookupError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Centered search box, nothing selected yet.
    FrontPage,
    Results,
}

pub struct Screen {
    geocoder: GeocodingClient,
    locator: LocationProvider,
    forecast: Arc<ForecastClient>,
    fetcher: Fetcher<ForecastPayload>,
    place: Option<Place>,
    query: String,
}

impl Screen {
    pub fn new(config: ClientConfig, device: Box<dyn DeviceLocation>) -> Self {
        let geocoder = GeocodingClient::new(config.clone());
        let forecast = Arc::new(ForecastClient::new(config));

        Self {
            locator: LocationProvider::new(device, geocoder.clone()),
            geocoder,
            fetcher: Fetcher::new(forecast.clone()),
            forecast,
            place: None,
            query: String::new(),
        }
    }

    pub fn place(&self) -> Option<&Place> {
        self.place.as_ref()
    }

    /// Current contents of the search field.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub async fn submit_query(&mut self, query: &str) -> SearchOutcome {
        self.query = query.to_string();
        if query.trim().is_empty() {
            return SearchOutcome::Ignored;
        }

        match self.geocoder.resolve_by_name(query).await {
            Ok(place) => self.select(place),
            Err(err) => SearchOutcome::Failed(err),
        }
    }

    /// The `&mut` borrow already keeps a screen to one lookup at a time.
    pub async fn use_my_location(&mut self) -> SearchOutcome {
        match self.locator.current_place().await {
            Ok(place) => {
                self.query = place.short_label();
                self.select(place)
            }
            Err(err) => SearchOutcome::Failed(err),
        }
    }

    /// Replace the selected place and point the fetcher at its forecast.
    pub fn select(&mut self, place: Place) -> SearchOutcome {
        let url = match self.forecast.forecast_url(place.lat, place.lon) {
            Ok(url) => url,
            Err(err) => return SearchOutcome::Failed(LookupError::Network(format!("{err:#}"))),
        };

        tracing::info!(place = %place, "place selected");
        self.fetcher.set_url(Some(url));
        self.place = Some(place.clone());
        SearchOutcome::Selected(place)
    }

    pub fn state(&self) -> FetchState<ForecastPayload> {
        self.fetcher.state()
    }

    /// Wait for the in-flight forecast, if any.
    pub async fn settled(&self) -> FetchState<ForecastPayload> {
        self.fetcher.settled().await
    }

    pub fn layout(&self) -> Layout {
        let state = self.fetcher.state();
        if self.place.is_none() && !state.is_loading() && state.error().is_none() {
            Layout::FrontPage
        } else {
            Layout::Results
        }
    }

    /// The forecast view, once a payload has arrived.
    pub fn view(&self) -> Option<Result<WeatherView, LookupError>> {
        self.fetcher.state().data().map(WeatherView::from_payload)
    }

    /// Status lines shown between the search bar and the results.
    pub fn status_lines(&self) -> Vec<String> {
        let state = self.fetcher.state();
        let mut lines = Vec::new();

        match &self.place {
            Some(place) => {
                lines.push(format!("Selected: {place}"));
                if state.is_loading() {
                    lines.push("Loading...".to_string());
                }
                if let Some(err) = state.error() {
                    lines.push(format!("Error: {err}"));
                }
            }
            None if !state.is_loading() => lines.push(FRONT_PAGE_HINT.to_string()),
            None => {}
        }

        lines
    }

    /// Whole-screen text rendering.
    pub fn render(&self, now: impl fmt::Display) -> String {
        let mut out = String::new();
        for line in self.status_lines() {
            out.push_str(&line);
            out.push('\n');
        }

        match self.view() {
            Some(Ok(view)) => {
                out.push('\n');
                out.push_str(&view.render(now));
            }
            Some(Err(err)) => {
                out.push_str(&format!("Error: {}\n", err.user_message()));
            }
            None => {}
        }

        out
    }
}
