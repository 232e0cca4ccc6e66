use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Text};
use weather_core::{
    Config, Coordinate, LocationProvider, LookupPhase, ScreenController, UiHandle, UiLoop,
    gateway_from_config, location::FixedLocationProvider, location_from_config,
};

use crate::terminal::TerminalDisplay;

/// Input that asks for the current location in the interactive screen.
const LOCATE_COMMAND: &str = "@";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather by city or location")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and an optional fixed location.
    Configure,

    /// Show current weather for a city.
    Search {
        /// City name, e.g. "Berlin".
        city: String,
    },

    /// Show current weather for the current location.
    Locate {
        /// Latitude override; requires --lon.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude override; requires --lat.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Interactive screen: search repeatedly, `@` for the current location.
    Screen,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Command::Configure => {
                configure().await?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Search { city } => {
                let screen = Screen::open(&Config::load()?, None)?;
                screen.controller.submit_city_search(&city).finished().await;
                screen.close().await
            }
            Command::Locate { lat, lon } => {
                let fixed = lat.zip(lon).map(|(lat, lon)| {
                    Arc::new(FixedLocationProvider::new(Coordinate::new(lat, lon)))
                        as Arc<dyn LocationProvider>
                });
                let screen = Screen::open(&Config::load()?, fixed)?;
                screen.controller.request_current_location().finished().await;
                screen.close().await
            }
            Command::Screen => interactive(Screen::open(&Config::load()?, None)?).await,
        }
    }
}

/// Controller wired to a terminal UI loop running on its own task.
struct Screen {
    controller: ScreenController,
    ui: UiHandle,
    ui_task: tokio::task::JoinHandle<TerminalDisplay<std::io::Stdout>>,
}

impl Screen {
    fn open(config: &Config, location: Option<Arc<dyn LocationProvider>>) -> anyhow::Result<Self> {
        let gateway = gateway_from_config(config)?;
        let location = match location {
            Some(provider) => provider,
            None => location_from_config(config)?,
        };

        let (ui_loop, ui) = UiLoop::new(TerminalDisplay::stdout());
        let ui_task = tokio::spawn(ui_loop.run());
        let controller = ScreenController::new(gateway, location, ui.clone(), config.empty_search);

        Ok(Self { controller, ui, ui_task })
    }

    /// Shut the UI loop down and report whether the last lookup failed.
    async fn close(self) -> anyhow::Result<ExitCode> {
        drop(self.controller);
        drop(self.ui);

        let display = self.ui_task.await.context("UI loop panicked")?;
        Ok(match display.last_phase() {
            LookupPhase::Failed => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        })
    }
}

async fn interactive(screen: Screen) -> anyhow::Result<ExitCode> {
    loop {
        let input = tokio::task::spawn_blocking(|| {
            Text::new("Search:")
                .with_help_message("city name, `@` for current location, Esc to quit")
                .prompt()
        })
        .await?;

        let text = match input {
            Ok(text) => text,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };

        let lookup = if text.trim() == LOCATE_COMMAND {
            screen.controller.request_current_location()
        } else {
            screen.controller.submit_city_search(&text)
        };
        lookup.finished().await;
        screen.ui.flushed().await;
    }

    screen.close().await?;
    Ok(ExitCode::SUCCESS)
}

async fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let (api_key, location) = tokio::task::spawn_blocking(|| -> anyhow::Result<_> {
        let api_key = Password::new("OpenWeather API key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()?;

        let location = Text::new("Fixed location (lat,lon):")
            .with_help_message("leave empty to locate by IP address")
            .prompt()?;

        Ok((api_key, location))
    })
    .await??;

    config.set_api_key(api_key.trim().to_string());
    config.set_fixed_location(parse_coordinate(&location)?);
    config.fixed_location()?;
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Parse `"52.52, 13.40"`; empty input means no fixed location.
fn parse_coordinate(input: &str) -> anyhow::Result<Option<Coordinate>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let (lat, lon) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("Expected `latitude,longitude`, got '{input}'"))?;

    let lat: f64 = lat.trim().parse().with_context(|| format!("Invalid latitude '{lat}'"))?;
    let lon: f64 = lon.trim().parse().with_context(|| format!("Invalid longitude '{lon}'"))?;

    Ok(Some(Coordinate::new(lat, lon)))
}
