use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.latitude, self.longitude)
    }
}

/// One weather query, created per user intent and never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupRequest {
    ByCity(String),
    ByCoordinate(Coordinate),
}

impl fmt::Display for LookupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupRequest::ByCity(name) => write!(f, "city {name:?}"),
            LookupRequest::ByCoordinate(coord) => write!(f, "coordinate {coord}"),
        }
    }
}

/// Parsed outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub temperature_celsius: f64,
    pub city_name: String,
    /// Icon name, see [`condition_code`].
    pub condition_code: String,
}

impl WeatherResult {
    /// Rounded temperature with a degree sign, e.g. `12°`.
    pub fn temperature_string(&self) -> String {
        let rounded = self.temperature_celsius.round();
        // -0.4 rounds to -0.0, which would print as "-0°".
        let rounded = if rounded == 0.0 { 0.0 } else { rounded };
        format!("{rounded:.0}°")
    }
}

/// Map an OpenWeather condition id to an icon name.
///
/// See <https://openweathermap.org/weather-conditions>.
pub fn condition_code(id: u16) -> &'static str {
    match id {
        200..=232 => "cloud.bolt",
        300..=321 => "cloud.drizzle",
        500..=531 => "cloud.rain",
        600..=622 => "cloud.snow",
        701..=781 => "cloud.fog",
        800 => "sun.max",
        801..=804 => "cloud",
        _ => "cloud",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(temp: f64) -> WeatherResult {
        WeatherResult {
            temperature_celsius: temp,
            city_name: "Berlin".into(),
            condition_code: "cloud".into(),
        }
    }

    #[test]
    fn temperature_string_rounds_to_whole_degrees() {
        assert_eq!(result(12.0).temperature_string(), "12°");
        assert_eq!(result(12.6).temperature_string(), "13°");
        assert_eq!(result(-3.5).temperature_string(), "-4°");
    }

    #[test]
    fn temperature_string_never_shows_negative_zero() {
        assert_eq!(result(-0.4).temperature_string(), "0°");
    }

    #[test]
    fn condition_code_groups() {
        assert_eq!(condition_code(211), "cloud.bolt");
        assert_eq!(condition_code(301), "cloud.drizzle");
        assert_eq!(condition_code(502), "cloud.rain");
        assert_eq!(condition_code(601), "cloud.snow");
        assert_eq!(condition_code(741), "cloud.fog");
        assert_eq!(condition_code(800), "sun.max");
        assert_eq!(condition_code(803), "cloud");
    }

    #[test]
    fn unknown_condition_falls_back_to_cloud() {
        assert_eq!(condition_code(0), "cloud");
        assert_eq!(condition_code(999), "cloud");
    }

    #[test]
    fn lookup_request_display() {
        assert_eq!(LookupRequest::ByCity("Berlin".into()).to_string(), "city \"Berlin\"");
        assert_eq!(
            LookupRequest::ByCoordinate(Coordinate::new(52.52, 13.4)).to_string(),
            "coordinate (52.52, 13.40)"
        );
    }
}
