//! Core library for the `weather` screen.
//!
//! This crate defines:
//! - The screen controller that turns search/locate intents into lookups
//! - The UI loop every display update is posted to
//! - Abstractions over the weather gateway and location providers
//! - Configuration & credentials handling
//!
//! It is used by `weather-cli`, but the controller can be driven by any
//! front end that implements [`DisplaySurface`].

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod location;
pub mod model;
pub mod ui;

pub use config::{Config, LocationConfig};
pub use controller::{EmptySearchPolicy, LookupHandle, LookupHandler, ScreenController};
pub use error::{LocationError, ServiceError};
pub use gateway::{WeatherGateway, gateway_from_config};
pub use location::{LocationProvider, location_from_config};
pub use model::{Coordinate, LookupRequest, WeatherResult};
pub use ui::{DisplaySurface, LookupPhase, ScreenState, UiHandle, UiLoop, WeatherView};
