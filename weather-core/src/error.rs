use thiserror::Error;

/// Terminal failure of a single lookup. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Weather service unreachable: {0}")]
    NetworkFailure(String),

    #[error("Weather response could not be decoded: {0}")]
    ParseFailure(String),

    #[error("Current location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Enter a city name to search")]
    EmptyQuery,
}

impl ServiceError {
    /// Short text for the screen's error line.
    pub fn user_message(&self) -> &'static str {
        match self {
            ServiceError::NetworkFailure(_) => "Could not reach the weather service.",
            ServiceError::ParseFailure(_) => "Received an unreadable weather report.",
            ServiceError::LocationUnavailable(_) => "Your location is not available.",
            ServiceError::EmptyQuery => "Enter a city name to search.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service unavailable")]
    ServiceUnavailable,

    #[error("Location lookup failed: {0}")]
    Lookup(String),
}

impl From<LocationError> for ServiceError {
    fn from(err: LocationError) -> Self {
        ServiceError::LocationUnavailable(err.to_string())
    }
}
