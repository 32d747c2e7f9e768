use thiserror::Error;

/// Recoverable failures surfaced by the lookup flow.
///
/// Every variant maps to a short message the front-end shows as-is; none of
/// them should terminate the app.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("search query is empty")]
    EmptyQuery,

    #[error("no place matched the query")]
    NotFound,

    #[error("location permission denied")]
    PermissionDenied,

    #[error("a location lookup is already in progress")]
    Busy,

    #[error("could not read device position: {0}")]
    Position(String),

    #[error("request failed: {0}")]
    Network(String),

    #[error("forecast response contained no entries")]
    EmptyForecast,
}

impl LookupError {
    /// Short string suitable for an alert line.
    pub fn user_message(&self) -> &'static str {
        match self {
            LookupError::EmptyQuery => "Enter a city name",
            LookupError::NotFound => "City not found",
            LookupError::PermissionDenied => "Location permission is required",
            LookupError::Busy => "Already locating, please wait",
            LookupError::Position(_) => "Couldn't determine your city",
            LookupError::Network(_) => "Error fetching city",
            LookupError::EmptyForecast => "No forecast data available",
        }
    }

    /// Alert title, mirroring the heading each failure gets on screen.
    pub fn title(&self) -> &'static str {
        match self {
            LookupError::NotFound => "Not found",
            LookupError::PermissionDenied => "Permission denied",
            _ => "Error",
        }
    }
}
