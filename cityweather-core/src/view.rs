//! Display model for a forecast: the current-conditions card plus the
//! "next 24 hours" strip.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::{error::LookupError, model::ForecastPayload};

/// Entries shown in the hourly strip. Assumes the provider's 3-hour cadence.
pub const HOURLY_WINDOW: usize = 8;

const DT_TXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub temp: f64,
    pub wind: f64,
    pub humidity: u8,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyEntry {
    pub time: String,
    pub temp: f64,
    pub condition: String,
    pub wind: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherView {
    pub city: String,
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyEntry>,
}

impl WeatherView {
    pub fn from_payload(payload: &ForecastPayload) -> Result<Self, LookupError> {
        let now = payload.list.first().ok_or(LookupError::EmptyForecast)?;

        let current = CurrentConditions {
            temp: now.main.temp,
            wind: now.wind.speed,
            humidity: now.main.humidity,
            description: now
                .condition()
                .map(|c| c.description.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
        };

        let hourly = payload
            .list
            .iter()
            .take(HOURLY_WINDOW)
            .map(|entry| HourlyEntry {
                time: entry.dt_txt.clone(),
                temp: entry.main.temp,
                condition: entry
                    .condition()
                    .map(|c| c.main.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                wind: entry.wind.speed,
            })
            .collect();

        Ok(Self {
            city: format!("{}, {}", payload.city.name, payload.city.country),
            current,
            hourly,
        })
    }

    /// Text rendering of the card and strip. `now` is printed under the city
    /// name, as a local timestamp.
    pub fn render(&self, now: impl fmt::Display) -> String {
        let mut lines = vec![
            "Weather Forecast".to_string(),
            format!("  {}", self.city),
            format!("  {now}"),
            format!("  {}°C", round_temp(self.current.temp)),
            format!("  {}", capitalize(&self.current.description)),
            format!(
                "  Wind: {} m/s • Humidity: {}%",
                self.current.wind, self.current.humidity
            ),
        ];

        if !self.hourly.is_empty() {
            lines.push(String::new());
            lines.push("Next 24 Hours".to_string());
            lines.extend(self.hourly.iter().map(|hour| {
                format!(
                    "  {:>5}  {:>4}°  {:<12} {} m/s",
                    format_hour(&hour.time),
                    round_temp(hour.temp),
                    hour.condition,
                    hour.wind,
                )
            }));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Round half away from zero, as the card shows whole degrees.
pub fn round_temp(temp: f64) -> i64 {
    temp.round() as i64
}

/// `"2024-05-01 15:00:00"` → `"3 PM"`. Unparseable input is shown verbatim.
pub fn format_hour(dt_txt: &str) -> String {
    match NaiveDateTime::parse_from_str(dt_txt, DT_TXT_FORMAT) {
        Ok(dt) => dt.format("%-I %p").to_string(),
        Err(_) => dt_txt.to_string(),
    }
}

fn capitalize(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
