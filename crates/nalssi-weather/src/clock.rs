//! Issuance schedule arithmetic.
//!
//! All functions take the provider's local wall time explicitly; only
//! [`provider_now`] reads the system clock.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Timelike, Utc};

use crate::error::WeatherError;
use crate::types::ForecastStamp;

/// Daily base hours at which the provider republishes its forecast.
pub const BASE_HOURS: [u32; 8] = [2, 5, 8, 11, 14, 17, 20, 23];

/// A base hour becomes queryable this many minutes after its nominal time.
pub const AVAILABILITY_DELAY_MINUTES: u32 = 10;

/// The provider publishes on Korea Standard Time (UTC+09:00, no DST).
const PROVIDER_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Current wall time in the provider's time zone.
pub fn provider_now() -> NaiveDateTime {
    to_provider_time(Utc::now())
}

/// Wall time in the provider's time zone at the instant `utc`.
pub fn to_provider_time(utc: DateTime<Utc>) -> NaiveDateTime {
    match FixedOffset::east_opt(PROVIDER_UTC_OFFSET_SECS) {
        Some(offset) => utc.with_timezone(&offset).naive_local(),
        None => utc.naive_utc(),
    }
}

/// Source clock for code that needs "now" repeatedly.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// [`Clock`] backed by [`provider_now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderClock;

impl Clock for ProviderClock {
    fn now(&self) -> NaiveDateTime {
        provider_now()
    }
}

/// Issuance window to query: `date` is `YYYYMMDD`, `time` is `HHmm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceBase {
    pub date: String,
    pub time: String,
}

impl IssuanceBase {
    pub fn stamp(&self) -> Result<ForecastStamp, WeatherError> {
        ForecastStamp::new(&self.date, &self.time)
    }
}

/// Latest base hour whose data is already available at `now`.
///
/// Before 02:10 nothing from today is out yet, so the previous day's 23:00
/// issuance is used, with the previous day's date.
pub fn current_issuance_base(now: NaiveDateTime) -> IssuanceBase {
    let minutes = now.hour() * 60 + now.minute();

    let today = BASE_HOURS
        .iter()
        .rev()
        .copied()
        .find(|hour| minutes >= hour * 60 + AVAILABILITY_DELAY_MINUTES);

    let (date, hour) = match today {
        Some(hour) => (now.date(), hour),
        None => ((now - Duration::days(1)).date(), 23),
    };

    IssuanceBase {
        date: date.format("%Y%m%d").to_string(),
        time: format!("{:02}00", hour),
    }
}

/// Hourly forecast slot, rounded to the nearest hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForecastSlot {
    hour: u32,
}

impl ForecastSlot {
    pub fn hour(&self) -> u32 {
        self.hour
    }
}

impl std::fmt::Display for ForecastSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}00", self.hour)
    }
}

/// Slot for `now`: the next hour from :30 on, otherwise the current hour.
pub fn current_forecast_slot(now: NaiveDateTime) -> ForecastSlot {
    let hour = if now.minute() >= 30 {
        (now.hour() + 1) % 24
    } else {
        now.hour()
    };
    ForecastSlot { hour }
}

/// True when there is no previous slot or it differs from the slot at `now`.
pub fn has_slot_changed(last: Option<ForecastSlot>, now: NaiveDateTime) -> bool {
    match last {
        Some(last) => last != current_forecast_slot(now),
        None => true,
    }
}

/// Next point at which [`current_forecast_slot`] changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBoundary {
    /// Wall time of the change
    pub at: NaiveDateTime,
    /// Slot that becomes current at `at`
    pub slot: ForecastSlot,
    pub until: std::time::Duration,
}

impl SlotBoundary {
    /// Boundary time as `HHmm`.
    pub fn valid_at(&self) -> String {
        self.at.format("%H%M").to_string()
    }

    /// In `(0, 3_600_000]`.
    pub fn millis_until(&self) -> u64 {
        self.until.as_millis() as u64
    }
}

/// Time until the next :30 mark, where the slot rolls over.
pub fn next_slot_boundary(now: NaiveDateTime) -> SlotBoundary {
    let minute = now.minute();
    let minutes_until = if minute >= 30 {
        60 - minute + 30
    } else {
        30 - minute
    };

    // nanosecond() exceeds 1e9 during a leap second
    let elapsed_ms = u64::from(now.second()) * 1000 + u64::from((now.nanosecond() / 1_000_000).min(999));
    let millis = u64::from(minutes_until) * 60_000 - elapsed_ms;

    let at = now + Duration::milliseconds(millis as i64);
    SlotBoundary {
        at,
        slot: current_forecast_slot(at),
        until: std::time::Duration::from_millis(millis),
    }
}
