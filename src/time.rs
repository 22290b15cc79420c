use crate::error::{ChartError, ChartResult};
use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_WINDOW_MS: i64 = 48 * 3600 * 1000;
const TABLE_DATE_FORMAT: &str = "%b %d, %I:%M %p";
const RANGE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Visible chart window in epoch milliseconds; `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRange {
    start: i64,
    end: i64,
}

impl AnalysisRange {
    pub fn new(start: i64, end: i64) -> ChartResult<Self> {
        if start >= end {
            return Err(ChartError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    /// Window used for anomaly fetches: the end never extends past `now_ms`.
    pub fn anomalies_range(&self, now_ms: i64) -> (i64, i64) {
        (self.start, self.end.min(now_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePreset {
    #[serde(rename = "48h")]
    Hours48,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1m")]
    Month1,
    #[serde(rename = "3m")]
    Month3,
    Custom,
}

impl RangePreset {
    pub const OPTIONS: [RangePreset; 4] = [
        RangePreset::Hours48,
        RangePreset::Week1,
        RangePreset::Month1,
        RangePreset::Month3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangePreset::Hours48 => "48h",
            RangePreset::Week1 => "1w",
            RangePreset::Month1 => "1m",
            RangePreset::Month3 => "3m",
            RangePreset::Custom => "custom",
        }
    }

    /// Day-aligned window ending at the start of tomorrow. `None` for custom.
    pub fn range(&self, now: DateTime<Utc>, tz: &Tz) -> Option<AnalysisRange> {
        let today = now.with_timezone(tz).date_naive();
        let start_date = match self {
            RangePreset::Hours48 => today.checked_sub_signed(Duration::days(2))?,
            RangePreset::Week1 => today.checked_sub_signed(Duration::weeks(1))?,
            RangePreset::Month1 => today.checked_sub_months(Months::new(1))?,
            RangePreset::Month3 => today.checked_sub_months(Months::new(3))?,
            RangePreset::Custom => return None,
        };
        let end_date = today.succ_opt()?;
        let start = start_of_day_ms(tz, start_date)?;
        let end = start_of_day_ms(tz, end_date)?;
        AnalysisRange::new(start, end).ok()
    }
}

impl FromStr for RangePreset {
    type Err = ChartError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "48h" => Ok(RangePreset::Hours48),
            "1w" => Ok(RangePreset::Week1),
            "1m" => Ok(RangePreset::Month1),
            "3m" => Ok(RangePreset::Month3),
            "custom" => Ok(RangePreset::Custom),
            other => Err(ChartError::validation(format!("unknown range preset {other}"))),
        }
    }
}

/// Initial window: start of day of `now - window_ms` through the start of
/// tomorrow, both in `tz`.
pub fn default_analysis_range(
    now: DateTime<Utc>,
    window_ms: i64,
    tz: &Tz,
) -> ChartResult<AnalysisRange> {
    let window_ms = if window_ms > 0 { window_ms } else { DEFAULT_WINDOW_MS };
    let window_start = Duration::try_milliseconds(window_ms)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            ChartError::validation(format!("analysis window of {window_ms}ms overflows the calendar"))
        })?;
    let start_date = window_start.with_timezone(tz).date_naive();
    let end_date = now
        .with_timezone(tz)
        .date_naive()
        .succ_opt()
        .ok_or_else(|| ChartError::validation("analysis range end overflows the calendar"))?;
    let start = start_of_day_ms(tz, start_date)
        .ok_or_else(|| ChartError::validation(format!("no local midnight on {start_date}")))?;
    let end = start_of_day_ms(tz, end_date)
        .ok_or_else(|| ChartError::validation(format!("no local midnight on {end_date}")))?;
    AnalysisRange::new(start, end)
}

pub fn default_duration(window_ms: i64) -> RangePreset {
    if window_ms <= 0 || window_ms == DEFAULT_WINDOW_MS {
        RangePreset::Hours48
    } else {
        RangePreset::Custom
    }
}

fn start_of_day_ms(tz: &Tz, date: NaiveDate) -> Option<i64> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    let local = tz.from_local_datetime(&midnight);
    // Zones that skip midnight resolve to the first valid instant after it.
    let resolved = local.earliest().or_else(|| {
        (1..=180).find_map(|minutes| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minutes)))
                .earliest()
        })
    })?;
    Some(resolved.timestamp_millis())
}

pub fn format_table_start(epoch_ms: i64, tz: &Tz) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(ts) => ts.with_timezone(tz).format(TABLE_DATE_FORMAT).to_string(),
        None => "--".to_string(),
    }
}

pub fn format_reported_range(start_ms: i64, end_ms: i64, tz: &Tz) -> String {
    let format = |epoch_ms: i64| match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(ts) => ts.with_timezone(tz).format(RANGE_DATE_FORMAT).to_string(),
        None => epoch_ms.to_string(),
    };
    format!("{} - {}", format(start_ms), format(end_ms))
}
