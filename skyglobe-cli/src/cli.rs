use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{CustomType, Select, Text};
use skyglobe_core::{
    Config, Coordinates, Coordinator, CoordinatorState, Generation, HeadlessGlobe, Status,
    map::{self, IDLE_ROTATION_PERIOD, MapEventStream, MapSurface},
};
use tokio::sync::watch;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skyglobe", version, about = "Weather for any place on the globe")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the backend URL, map token and request timeout.
    Configure,

    /// Show weather for a place name.
    Show {
        /// City or place name.
        city: String,

        /// Choose among all matching places instead of taking the best one.
        #[arg(long)]
        pick: bool,

        /// Print the full state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show weather for a point on the globe.
    At {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long)]
        json: bool,
    },

    /// Keep a globe open: type a place name, or `lat,lon` to click the globe.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, pick, json } => {
                let session = Session::open()?;
                session.coordinator.search_by_name(&city).await?;

                if pick {
                    session.pick_among().await?;
                }

                finish(&session.coordinator.current_snapshot(), json)
            }
            Command::At { lat, lon, json } => {
                let coords = Coordinates::new(lat, lon)?;
                let session = Session::open()?;
                session.coordinator.search_by_coordinates(coords).await;

                finish(&session.coordinator.current_snapshot(), json)
            }
            Command::Interactive => {
                let mut session = Session::open()?;
                session.interactive().await
            }
        }
    }
}

struct Session {
    coordinator: Coordinator,
    globe: Arc<HeadlessGlobe>,
    events: Option<MapEventStream>,
}

impl Session {
    fn open() -> anyhow::Result<Self> {
        let config = Config::load()?;
        for diagnostic in config.diagnostics() {
            tracing::warn!("{diagnostic}");
        }

        let (sink, events) = map::event_channel();
        let globe = Arc::new(HeadlessGlobe::new(sink));
        let coordinator = Coordinator::from_config(&config, globe.clone())?;

        Ok(Self {
            coordinator,
            globe,
            events: Some(events),
        })
    }

    /// Offer the matches of the search that just ran and fetch weather for
    /// the chosen one, within the same generation.
    async fn pick_among(&self) -> anyhow::Result<()> {
        let state = self.coordinator.current_snapshot();
        let Some(labels) = choice_labels(&state) else {
            return Ok(());
        };

        let chosen = tokio::task::spawn_blocking(move || {
            Select::new("Which one?", labels).raw_prompt().map(|choice| choice.index)
        })
        .await??;

        let candidate = state.candidates.get(chosen).context("No such place")?;
        self.coordinator.select_candidate(candidate).await;
        Ok(())
    }

    async fn interactive(&mut self) -> anyhow::Result<()> {
        let events = self.events.take().context("Map events already consumed")?;
        let listener = self.coordinator.listen(events);
        let rotation = self.globe.spawn_idle_rotation(IDLE_ROTATION_PERIOD);
        let mut updates = self.coordinator.subscribe();

        println!("Type a place name, `lat,lon` to click the globe, or press Esc to quit.");

        loop {
            let input = tokio::task::spawn_blocking(|| Text::new("Where to?").prompt()).await?;
            let Ok(input) = input else {
                break;
            };

            let before = self.coordinator.generation();

            match parse_click(&input) {
                Some((lat, lon)) => {
                    if let Err(err) = self.globe.click(lat, lon) {
                        eprintln!("{err}");
                        continue;
                    }
                }
                None => {
                    if let Err(err) = self.coordinator.search_by_name(&input).await {
                        eprintln!("{err}");
                        continue;
                    }
                }
            }

            let state = settled_after(&mut updates, before).await?;
            render::print_state(&state);
            let camera = self.globe.camera();
            println!("Globe: centered on {} at zoom {}", camera.center, camera.zoom);
        }

        self.globe.dispose();
        rotation.abort();
        listener.abort();
        Ok(())
    }
}

/// Wait until a generation newer than `before` has settled.
async fn settled_after(
    updates: &mut watch::Receiver<CoordinatorState>,
    before: Generation,
) -> anyhow::Result<CoordinatorState> {
    let state = updates
        .wait_for(|s| s.generation > before && s.status.is_settled())
        .await
        .context("Coordinator stopped")?;
    Ok(state.clone())
}

/// Labels for the places worth choosing between; `None` unless the last
/// search matched more than one.
fn choice_labels(state: &CoordinatorState) -> Option<Vec<String>> {
    if state.candidates.len() < 2 {
        return None;
    }
    Some(state.candidates.iter().map(render::candidate_label).collect())
}

fn parse_click(input: &str) -> Option<(f64, f64)> {
    let (lat, lon) = input.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

fn finish(state: &CoordinatorState, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        render::print_state(state);
    }

    if state.status == Status::Error {
        match &state.last_error {
            Some(err) => bail!("{err}"),
            None => bail!("Lookup failed"),
        }
    }
    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load_file()?;

    cfg.api_base_url = Text::new("Backend base URL:")
        .with_default(&cfg.api_base_url)
        .prompt()?;

    let token = Text::new("Map access token (leave empty to skip):")
        .with_default(cfg.map_access_token.as_deref().unwrap_or_default())
        .prompt()?;
    cfg.map_access_token = Some(token).filter(|t| !t.trim().is_empty());

    cfg.request_timeout_secs = CustomType::<u64>::new("Request timeout (seconds):")
        .with_default(cfg.request_timeout_secs)
        .prompt()?;

    cfg.validate()?;
    cfg.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    for diagnostic in cfg.diagnostics() {
        println!("warning: {diagnostic}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clicks() {
        assert_eq!(parse_click("48.85, 2.35"), Some((48.85, 2.35)));
        assert_eq!(parse_click("-33.9,151.2"), Some((-33.9, 151.2)));
        assert_eq!(parse_click("Paris"), None);
        assert_eq!(parse_click("Paris, TX"), None);
    }

    #[test]
    fn cli_parses_show_with_pick() {
        let cli = Cli::try_parse_from(["skyglobe", "show", "Paris", "--pick"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Show { city, pick: true, json: false } if city == "Paris"
        ));
    }

    #[test]
    fn choices_come_from_the_last_search() {
        let place = |name: &str, country: &str, lat: f64, lon: f64| skyglobe_core::PlaceCandidate {
            name: name.into(),
            country: country.into(),
            state: None,
            coordinates: Coordinates::new(lat, lon).unwrap(),
            local_names: None,
        };

        let mut state = CoordinatorState::default();
        assert_eq!(choice_labels(&state), None);

        state.candidates = vec![place("Paris", "FR", 48.85, 2.35)];
        assert_eq!(choice_labels(&state), None);

        state.candidates.push(place("Paris", "US", 33.66, -95.56));
        let labels = choice_labels(&state).unwrap();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].contains("FR"));
        assert!(labels[1].contains("US"));
    }

    #[test]
    fn cli_parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["skyglobe", "at", "--lat", "-12.04", "--lon", "-77.03"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::At { lat, lon, json: false } if lat == -12.04 && lon == -77.03
        ));
    }
}
