//! Market Schedule Types
//!
//! Domain types for a single market's open/close schedule and the live
//! open/closed determination.
//!
//! # Anchoring
//!
//! The calendar provider reports open and close as `"HH:MM"` in the
//! exchange's local time. They are turned into absolute instants for the
//! *current* trading day: today's calendar date in the exchange timezone,
//! combined with the local time, resolved in that timezone. Schedules that
//! cross midnight are not handled.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

// =============================================================================
// Provider Record
// =============================================================================

/// One market as reported by the calendar provider.
///
/// # Wire Format (JSON)
/// ```json
/// {"market_type": "Equity", "region": "United States",
///  "primary_exchanges": "NASDAQ, NYSE, AMEX, BATS",
///  "local_open": "09:30", "local_close": "16:15",
///  "current_status": "open", "notes": ""}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Market type, e.g. "Equity".
    #[serde(default)]
    pub market_type: String,
    /// Region name used to select the target market.
    pub region: String,
    /// Comma-separated exchange list.
    #[serde(default)]
    pub primary_exchanges: String,
    /// Local open time, `"HH:MM"`.
    #[serde(default)]
    pub local_open: String,
    /// Local close time, `"HH:MM"`.
    #[serde(default)]
    pub local_close: String,
    /// Provider's own status string.
    #[serde(default)]
    pub current_status: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
}

// =============================================================================
// Session Time
// =============================================================================

/// Errors building a schedule from a provider record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// A local time was not `HH:MM`.
    #[error("invalid {field} time: {value:?}")]
    InvalidTime {
        /// Which field was bad (`local_open` / `local_close`).
        field: &'static str,
        /// The raw value.
        value: String,
    },

    /// The local time does not exist on that day in that timezone.
    #[error("{time} does not exist on {date} in {tz}")]
    NonexistentLocalTime {
        /// The local time.
        time: NaiveTime,
        /// The local date.
        date: NaiveDate,
        /// The timezone.
        tz: Tz,
    },
}

/// A wall-clock time of day in the exchange's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionTime(NaiveTime);

impl SessionTime {
    /// Create from hour and minute.
    #[must_use]
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// The underlying naive time.
    #[must_use]
    pub const fn time(&self) -> NaiveTime {
        self.0
    }

    /// Resolve this time on `date` in `tz` to an absolute instant.
    ///
    /// For an ambiguous local time (DST fall-back) the earlier instant is used.
    pub fn on_date(&self, date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>, ScheduleError> {
        tz.from_local_datetime(&date.and_time(self.0))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or(ScheduleError::NonexistentLocalTime {
                time: self.0,
                date,
                tz,
            })
    }
}

impl FromStr for SessionTime {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hours, minutes) = s.trim().split_once(':').ok_or(())?;
        if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
            return Err(());
        }
        let hour: u32 = hours.parse().map_err(|_| ())?;
        let minute: u32 = minutes.parse().map_err(|_| ())?;
        Self::from_hm(hour, minute).ok_or(())
    }
}

impl fmt::Display for SessionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// Today's calendar date in `tz` at instant `now`.
#[must_use]
pub fn exchange_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Anchor a raw `"HH:MM"` field to today's date in `tz`.
///
/// An empty value yields `Ok(None)`; anything else must parse.
fn anchor_field(
    field: &'static str,
    raw: &str,
    date: NaiveDate,
    tz: Tz,
) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let time: SessionTime = raw.parse().map_err(|()| ScheduleError::InvalidTime {
        field,
        value: raw.to_string(),
    })?;

    time.on_date(date, tz).map(Some)
}

// =============================================================================
// Market Status
// =============================================================================

/// Live open/closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketState {
    /// Inside the open window.
    Open,
    /// Outside the window, or the schedule is incomplete.
    Closed,
}

impl MarketState {
    /// State name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Cached schedule for the target market.
///
/// Built in one piece from a provider record; either the whole status is
/// replaced or none of it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketStatus {
    /// Market type, e.g. "Equity".
    pub market_type: String,
    /// Region name.
    pub region: String,
    /// Comma-separated exchange list.
    pub primary_exchanges: String,
    /// Open instant for the current trading day.
    #[serde(rename = "local_open", with = "chrono::serde::ts_seconds_option")]
    pub open_at: Option<DateTime<Utc>>,
    /// Close instant for the current trading day.
    #[serde(rename = "local_close", with = "chrono::serde::ts_seconds_option")]
    pub close_at: Option<DateTime<Utc>>,
    /// Open/closed as of the last evaluation.
    pub current_status: MarketState,
    /// Free-form notes.
    pub notes: String,
    /// When the schedule was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl MarketStatus {
    /// Build a status from a provider record, anchored to today in `tz`.
    ///
    /// # Errors
    ///
    /// Returns an error if either local time is present but malformed or
    /// does not exist on today's date.
    pub fn from_record(
        record: &MarketRecord,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        let date = exchange_date(now, tz);
        let open_at = anchor_field("local_open", &record.local_open, date, tz)?;
        let close_at = anchor_field("local_close", &record.local_close, date, tz)?;

        let mut status = Self {
            market_type: record.market_type.clone(),
            region: record.region.clone(),
            primary_exchanges: record.primary_exchanges.clone(),
            open_at,
            close_at,
            current_status: MarketState::Closed,
            notes: record.notes.clone(),
            fetched_at: now,
        };
        status.current_status = status.state_at(now);
        Ok(status)
    }

    /// Whether `now` falls inside `[open_at, close_at]`.
    ///
    /// Missing instants mean closed.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        match (self.open_at, self.close_at) {
            (Some(open), Some(close)) => open <= now && now <= close,
            _ => false,
        }
    }

    /// Open/closed state at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> MarketState {
        if self.is_open_at(now) {
            MarketState::Open
        } else {
            MarketState::Closed
        }
    }

    /// Copy of this status with `current_status` recomputed at `now`.
    #[must_use]
    pub fn evaluated_at(&self, now: DateTime<Utc>) -> Self {
        Self {
            current_status: self.state_at(now),
            ..self.clone()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
