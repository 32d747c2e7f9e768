use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use cityweather_core::{Config, Coordinates, FetchState, ForecastPayload, Screen, SearchOutcome};

use crate::device::PromptingDevice;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "City weather lookup")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and an optional home position.
    Configure,

    /// Show current conditions and the next 24 hours for a city.
    Show {
        /// City name, e.g. "Paris" or "Springfield, IL, US".
        city: String,
    },

    /// Show the weather for where you are.
    Here {
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Grant location permission without asking.
        #[arg(long, short)]
        yes: bool,
    },

    /// Search repeatedly; `@` uses your location, an empty line quits.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city } => {
                let mut screen = build_screen(None, false)?;
                let outcome = screen.submit_query(&city).await;
                present(&screen, outcome).await
            }
            Command::Here { lat, lon, yes } => {
                let position = lat.zip(lon).map(|(lat, lon)| Coordinates { lat, lon });
                let mut screen = build_screen(position, yes)?;
                let outcome = screen.use_my_location().await;
                present(&screen, outcome).await
            }
            Command::Interactive => interactive().await,
        }
    }
}

/// Composition root: config → client settings → screen.
fn build_screen(position: Option<Coordinates>, pre_granted: bool) -> Result<Screen> {
    let config = Config::load()?;
    let position = position.or(config.home);
    let client = config.client_config()?;

    Ok(Screen::new(client, Box::new(PromptingDevice::new(position, pre_granted))))
}

/// Print the screen, then report whether the lookup ended with a forecast.
async fn present(screen: &Screen, outcome: SearchOutcome) -> Result<()> {
    let state = match &outcome {
        SearchOutcome::Selected(_) => screen.settled().await,
        _ => screen.state(),
    };

    print!("{}", screen.render(chrono::Local::now().format("%Y-%m-%d %H:%M")));
    lookup_result(&outcome, &state)
}

fn lookup_result(outcome: &SearchOutcome, state: &FetchState<ForecastPayload>) -> Result<()> {
    match outcome {
        SearchOutcome::Ignored => Err(anyhow!("Nothing to look up: the search was empty")),
        SearchOutcome::Failed(err) => {
            tracing::debug!("search failed: {err}");
            Err(anyhow!("{}: {}", err.title(), err.user_message()))
        }
        SearchOutcome::Selected(place) => match state.error() {
            Some(msg) => Err(anyhow!("Forecast for {} failed: {msg}", place.label())),
            None => Ok(()),
        },
    }
}

async fn interactive() -> Result<()> {
    let mut screen = build_screen(None, false)?;
    print!("{}", screen.render(""));

    loop {
        let query = tokio::task::spawn_blocking(|| {
            inquire::Text::new("Search city:").with_help_message("@ = my location, empty = quit").prompt()
        })
        .await
        .context("Prompt task failed")?;

        let query = match query {
            Ok(q) => q,
            Err(
                inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted,
            ) => break,
            Err(err) => return Err(err).context("Failed to read search input"),
        };

        let outcome = match query.trim() {
            "" => break,
            "@" => screen.use_my_location().await,
            q => screen.submit_query(q).await,
        };

        // A failed lookup only re-prompts here.
        if let Err(err) = present(&screen, outcome).await {
            println!("{err}");
        }
    }

    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    let save_home = inquire::Confirm::new("Save a home position for `cityweather here`?")
        .with_default(config.home.is_some())
        .prompt()
        .context("Failed to read answer")?;

    if save_home {
        let lat = inquire::CustomType::<f64>::new("Latitude:")
            .with_error_message("Enter a decimal number, e.g. 48.85")
            .prompt()
            .context("Failed to read latitude")?;
        let lon = inquire::CustomType::<f64>::new("Longitude:")
            .with_error_message("Enter a decimal number, e.g. 2.35")
            .prompt()
            .context("Failed to read longitude")?;
        config.set_home(lat, lon);
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}
