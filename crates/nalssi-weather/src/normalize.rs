//! Turns the provider's time series into a [`WeatherSummary`].

use chrono::{NaiveDateTime, Timelike};

use crate::clock::provider_now;
use crate::error::WeatherError;
use crate::types::{ForecastCategory, ForecastItem, ForecastStamp, HourlyTemperature, WeatherSummary};

/// Number of hourly entries in every summary.
pub const HOURLY_ENTRIES: usize = 8;

/// Normalise `items` against the provider clock.
pub fn normalize(items: &[ForecastItem], location: &str) -> Result<WeatherSummary, WeatherError> {
    normalize_at(items, location, provider_now())
}

/// Normalise `items` as seen at `now` (provider wall time).
pub fn normalize_at(
    items: &[ForecastItem],
    location: &str,
    now: NaiveDateTime,
) -> Result<WeatherSummary, WeatherError> {
    if items.is_empty() {
        return Err(WeatherError::NoData(
            "forecast response contained no items".to_string(),
        ));
    }

    let today = now.format("%Y%m%d").to_string();
    let half_hour = if now.minute() >= 30 { 30 } else { 0 };
    let now_stamp = ForecastStamp::new(&today, &format!("{:02}{:02}", now.hour(), half_hour))?;

    // Sort on the full date+time key so the series continues past midnight.
    let mut hourly_items: Vec<&ForecastItem> = items
        .iter()
        .filter(|item| item.category == ForecastCategory::Temperature)
        .collect();
    hourly_items.sort_by(|a, b| a.valid.cmp(&b.valid));

    let start = hourly_items
        .iter()
        .position(|item| item.valid >= now_stamp)
        .unwrap_or(0);

    let current_temp = hourly_items
        .get(start)
        .map(|item| item.numeric_value())
        .unwrap_or(0.0);

    let daily = |category: ForecastCategory| {
        items
            .iter()
            .find(|item| item.category == category && item.valid.date() == today)
            .map(ForecastItem::numeric_value)
    };
    let max_temp = daily(ForecastCategory::DailyMax).unwrap_or(current_temp);
    let min_temp = daily(ForecastCategory::DailyMin).unwrap_or(current_temp);

    let upcoming = &hourly_items[start..];
    let mut hourly_temps: Vec<HourlyTemperature> = upcoming
        .iter()
        .take(HOURLY_ENTRIES)
        .map(|item| HourlyTemperature {
            time: format!("{}:{}", &item.valid.time()[..2], &item.valid.time()[2..]),
            temp: item.numeric_value(),
        })
        .collect();

    let last = hourly_temps
        .len()
        .checked_sub(1)
        .and_then(|index| upcoming.get(index));
    let (mut next_hour, fill_temp) = match last {
        Some(last) => (last.valid.hour() + 1, last.numeric_value()),
        None => (now.hour(), current_temp),
    };

    if hourly_temps.len() < HOURLY_ENTRIES {
        tracing::debug!(
            "Padding {} missing hourly entries for {}",
            HOURLY_ENTRIES - hourly_temps.len(),
            location
        );
    }
    while hourly_temps.len() < HOURLY_ENTRIES {
        hourly_temps.push(HourlyTemperature {
            time: format!("{:02}:00", next_hour % 24),
            temp: fill_temp,
        });
        next_hour += 1;
    }

    Ok(WeatherSummary {
        location: location.to_string(),
        current_temp,
        max_temp,
        min_temp,
        hourly_temps,
    })
}
