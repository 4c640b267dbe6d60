//! Plain-text rendering of the coordinator state.

use chrono::{DateTime, Utc};
use skyglobe_core::{CoordinatorState, PlaceCandidate, Status, WeatherSnapshot};

const HOURS_SHOWN: usize = 6;

pub fn print_state(state: &CoordinatorState) {
    print!("{}", state_text(state));
}

pub fn state_text(state: &CoordinatorState) -> String {
    let mut out = String::new();

    match (state.status, &state.last_error) {
        (Status::Error, Some(err)) => out.push_str(&format!("error: {err}\n")),
        (Status::PartialError, Some(err)) => out.push_str(&format!("warning: {err}\n")),
        _ => {}
    }

    match &state.weather {
        Some(weather) => out.push_str(&snapshot_text(weather)),
        None => out.push_str("No weather to show yet.\n"),
    }

    out
}

fn snapshot_text(weather: &WeatherSnapshot) -> String {
    let current = &weather.current;
    let mut out = format!(
        "{} ({})\n  {} {}°C, feels like {}°C, {}\n  humidity {}%, pressure {} hPa, wind {} km/h {}",
        weather.location.display_name(),
        weather.location.coordinates,
        icon(&current.icon),
        current.temperature.round(),
        current.feels_like.round(),
        current.description,
        current.humidity,
        current.pressure,
        (current.wind_speed * 3.6).round(),
        compass(current.wind_deg),
    );
    if let Some(metres) = current.visibility {
        out.push_str(&format!(", visibility {}", visibility(metres)));
    }
    out.push('\n');

    if current.sunrise.is_some() || current.sunset.is_some() {
        out.push_str(&format!(
            "  sunrise {}, sunset {}\n",
            clock(current.sunrise.and_then(|ts| DateTime::from_timestamp(ts, 0))),
            clock(current.sunset.and_then(|ts| DateTime::from_timestamp(ts, 0))),
        ));
    }

    if !weather.hourly.is_empty() {
        out.push_str("  Next hours:");
        for hour in weather.hourly.iter().take(HOURS_SHOWN) {
            out.push_str(&format!(
                " {} {}{}°",
                clock(hour.time()),
                icon(&hour.icon),
                hour.temperature.round()
            ));
        }
        out.push('\n');
    }

    for day in &weather.daily {
        out.push_str(&format!(
            "  {}: {} {}° / {}°, {}\n",
            day.date().map(|d| d.format("%a %d %b").to_string()).unwrap_or_default(),
            icon(&day.icon),
            day.temp_min.round(),
            day.temp_max.round(),
            day.description,
        ));
    }

    for alert in &weather.alerts {
        out.push_str(&format!("  ALERT {} ({})\n", alert.event, alert.sender_name));
    }

    out
}

pub fn candidate_label(candidate: &PlaceCandidate) -> String {
    match &candidate.state {
        Some(state) => format!(
            "{}, {}, {} ({})",
            candidate.name, state, candidate.country, candidate.coordinates
        ),
        None => format!("{}, {} ({})", candidate.name, candidate.country, candidate.coordinates),
    }
}

fn clock(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

/// Emoji for a backend icon code such as `"10n"`.
fn icon(code: &str) -> &'static str {
    match code {
        "01d" => "☀️",
        "01n" => "🌙",
        "02d" => "⛅",
        "02n" | "03d" | "03n" | "04d" | "04n" => "☁️",
        "09d" | "09n" | "10n" => "🌧️",
        "10d" => "🌦️",
        "11d" | "11n" => "⛈️",
        "13d" | "13n" => "❄️",
        "50d" | "50n" => "🌫️",
        _ => "🌡️",
    }
}

fn visibility(metres: u32) -> String {
    format!("{} km", (f64::from(metres) / 1000.0).round())
}

fn compass(degrees: u16) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = ((f64::from(degrees) / 45.0).round() as usize) % POINTS.len();
    POINTS[index]
}
