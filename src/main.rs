//! nalssi: short-range temperature forecasts from the command line.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use nalssi_core::Config;
use nalssi_weather::clock::ForecastSlot;
use nalssi_weather::{
    Coordinate, FavoritesCache, FileStore, ForecastClient, Geocoder, LocationSource,
    RefreshScheduler, WeatherService, WeatherSummary,
};

#[derive(Parser)]
#[command(name = "nalssi", about = "Short-range temperature forecasts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the forecast for a coordinate (or the configured location)
    Forecast {
        #[arg(long, allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
        /// Label shown instead of the looked-up region name
        #[arg(long)]
        label: Option<String>,
    },
    /// Look up coordinates for an address
    Search { query: String },
    /// Manage saved locations
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Refresh all favorites every time the forecast slot changes
    Watch,
}

#[derive(Subcommand)]
enum FavoritesAction {
    List,
    Add {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Place name; looked up when omitted
        #[arg(long)]
        name: Option<String>,
        /// Display title; defaults to the place name
        #[arg(long)]
        title: Option<String>,
    },
    Remove { id: String },
    Rename { id: String, title: String },
}

/// Everything the commands need, built once from config.
struct App {
    service: WeatherService<FileStore>,
    geocoder: Geocoder,
    location: LocationSource,
}

impl App {
    fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.forecast.timeout_secs);

        let client = ForecastClient::new(config.forecast.service_key.clone(), timeout)
            .context("Failed to build forecast client")?
            .with_base_url(&config.forecast.base_url)
            .with_page_size(config.forecast.page_size);

        let geocoder = Geocoder::new(config.geocoder.api_key.clone(), timeout)
            .context("Failed to build geocoder")?
            .with_base_url(&config.geocoder.base_url);

        let store = FileStore::new(config.favorites.data_dir.clone());
        tracing::debug!("Favorites stored in {}", store.dir().display());

        Ok(Self {
            service: WeatherService::new(client, FavoritesCache::new(store)),
            geocoder,
            location: LocationSource::from_config(
                config.location.latitude,
                config.location.longitude,
            ),
        })
    }

    async fn forecast(
        &self,
        coordinate: Option<Coordinate>,
        label: Option<String>,
    ) -> Result<()> {
        let coordinate = match coordinate {
            Some(coordinate) => coordinate,
            None => self.location.current_position().await.map_err(|e| {
                anyhow::anyhow!("{} (code {}); pass --lat and --lon", e, e.code())
            })?,
        };

        let label = match label {
            Some(label) => label,
            None => self.geocoder.resolve_region_name(&coordinate).await,
        };

        match self.service.summary_for(&coordinate, &label).await {
            Ok(summary) => {
                print_summary(&summary);
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Forecast failed: {:?}", e);
                anyhow::bail!(e.user_message())
            }
        }
    }

    async fn search(&self, query: &str) -> Result<()> {
        match self.geocoder.resolve_address(query).await {
            Ok(matches) => {
                for found in matches {
                    println!(
                        "{:>10.5} {:>11.5}  {}",
                        found.coordinate.latitude, found.coordinate.longitude, found.matched_name
                    );
                }
                Ok(())
            }
            Err(e) if e.is_no_data() => {
                println!("No places match {:?}", query);
                Ok(())
            }
            Err(e) => anyhow::bail!(e.user_message()),
        }
    }

    async fn favorites(&self, action: FavoritesAction) -> Result<()> {
        let favorites = self.service.favorites();

        match action {
            FavoritesAction::List => {
                let entries = favorites.all();
                if entries.is_empty() {
                    println!("No favorites saved");
                }
                for entry in entries {
                    println!(
                        "{}  {} ({})  {:.4},{:.4}",
                        entry.id,
                        entry.display_title,
                        entry.original_location_name,
                        entry.coordinate.latitude,
                        entry.coordinate.longitude
                    );
                }
            }
            FavoritesAction::Add {
                lat,
                lon,
                name,
                title,
            } => {
                let coordinate = Coordinate::new(lat, lon);
                if !coordinate.is_valid() {
                    anyhow::bail!("Coordinate {},{} is out of range", lat, lon);
                }

                let name = match name {
                    Some(name) => name,
                    None => self.geocoder.resolve_region_name(&coordinate).await,
                };
                let title = title.unwrap_or_else(|| name.clone());

                let outcome = favorites.add(&name, &title, coordinate);
                println!("Saved {} as {}", outcome.added.display_title, outcome.added.id);
                if let Some(evicted) = outcome.evicted {
                    println!("Removed oldest favorite {}", evicted.display_title);
                }
            }
            FavoritesAction::Remove { id } => {
                if !favorites.remove(&id) {
                    anyhow::bail!("No favorite with id {}", id);
                }
                println!("Removed {}", id);
            }
            FavoritesAction::Rename { id, title } => {
                if !favorites.update_title(&id, &title) {
                    anyhow::bail!("No favorite with id {}", id);
                }
                println!("Renamed {} to {}", id, title);
            }
        }
        Ok(())
    }

    async fn watch(&self) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut scheduler = RefreshScheduler::new();
        scheduler.start(move |slot| {
            let _ = tx.send(slot);
        });

        tracing::info!("Watching {} favorites", self.service.favorites().count());
        let result = run_watch(rx, tokio::signal::ctrl_c(), move |slot| {
            self.refresh_all(slot)
        })
        .await;

        scheduler.stop();
        tracing::info!("Watch stopped");
        result
    }

    async fn refresh_all(&self, slot: Option<ForecastSlot>) {
        if let Some(slot) = slot {
            println!("-- slot {} --", slot);
        }
        for (entry, result) in self.service.refresh_favorites().await {
            match result {
                Ok(summary) => print_summary(&summary),
                Err(e) => eprintln!("{}: {}", entry.display_title, e.user_message()),
            }
        }
    }
}

/// Refresh once, then again for every slot received, until `shutdown` resolves.
///
/// `shutdown` is polled while a refresh is running, so an interrupt mid-refresh
/// ends the loop without waiting for the refresh to finish.
async fn run_watch<S, R, Fut>(
    mut slots: mpsc::UnboundedReceiver<ForecastSlot>,
    shutdown: S,
    mut refresh: R,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
    R: FnMut(Option<ForecastSlot>) -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut next = None;

    loop {
        tokio::select! {
            result = &mut shutdown => return result.context("Failed to listen for Ctrl-C"),
            _ = refresh(next) => {}
        }

        tokio::select! {
            result = &mut shutdown => return result.context("Failed to listen for Ctrl-C"),
            slot = slots.recv() => match slot {
                Some(slot) => next = Some(slot),
                None => return (&mut shutdown).await.context("Failed to listen for Ctrl-C"),
            },
        }
    }
}

fn format_temp(temp: f64) -> String {
    if temp.is_nan() {
        "--".to_string()
    } else {
        format!("{:.1}°", temp)
    }
}

fn print_summary(summary: &WeatherSummary) {
    println!(
        "{}: {} (max {}, min {})",
        summary.location,
        format_temp(summary.current_temp),
        format_temp(summary.max_temp),
        format_temp(summary.min_temp)
    );
    let hourly: Vec<String> = summary
        .hourly_temps
        .iter()
        .map(|h| format!("{} {}", h.time, format_temp(h.temp)))
        .collect();
    println!("  {}", hourly.join("  "));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    nalssi_core::init()?;

    let (config, _validation) = Config::load_validated()?;
    let app = App::from_config(&config)?;

    match cli.command {
        Commands::Forecast { lat, lon, label } => {
            let coordinate = lat.zip(lon).map(|(lat, lon)| Coordinate::new(lat, lon));
            app.forecast(coordinate, label).await
        }
        Commands::Search { query } => app.search(&query).await,
        Commands::Favorites { action } => app.favorites(action).await,
        Commands::Watch => app.watch().await,
    }
}
