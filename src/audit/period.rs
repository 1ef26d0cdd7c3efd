//! Batch period labels
//!
//! | Label              | Span   |
//! |--------------------|--------|
//! | `2024-01-01`       | day    |
//! | `2024-01-01-13`    | hour   |
//! | `2024-01-01-13:00` | hour   |
//! | `2024-01-01T13`    | hour   |
//!
//! All periods are UTC and half-open: `[start, end)`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodSpan {
    Day,
    Hour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub span: PeriodSpan,
}

impl Period {
    pub fn end(&self) -> DateTime<Utc> {
        match self.span {
            PeriodSpan::Day => self.start + Duration::days(1),
            PeriodSpan::Hour => self.start + Duration::hours(1),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end()
    }

    /// Canonical label; every accepted spelling of an hour maps to `YYYY-MM-DD-HH`
    pub fn label(&self) -> String {
        match self.span {
            PeriodSpan::Day => self.start.format("%Y-%m-%d").to_string(),
            PeriodSpan::Hour => self.start.format("%Y-%m-%d-%H").to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Period {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim();
        let invalid = || {
            EngineError::validation(format!(
                "invalid period '{}': expected YYYY-MM-DD or YYYY-MM-DD-HH",
                label
            ))
        };

        if label.len() < 10 || !label.is_char_boundary(10) {
            return Err(invalid());
        }
        let (date, rest) = label.split_at(10);
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;

        if rest.is_empty() {
            let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
            return Ok(Period {
                start,
                span: PeriodSpan::Day,
            });
        }

        let hour_part = rest
            .strip_prefix('-')
            .or_else(|| rest.strip_prefix('T'))
            .ok_or_else(invalid)?;
        let hour_part = match hour_part.split_once(':') {
            Some((hour, "00")) => hour,
            Some(_) => return Err(invalid()),
            None => hour_part,
        };
        if hour_part.len() != 2 || !hour_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hour: u32 = hour_part.parse().map_err(|_| invalid())?;
        let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(invalid)?;

        Ok(Period {
            start: Utc.from_utc_datetime(&date.and_time(time)),
            span: PeriodSpan::Hour,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_period() {
        let period: Period = "2024-01-01".parse().unwrap();
        assert_eq!(period.span, PeriodSpan::Day);
        assert_eq!(period.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(period.end(), Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert!(!period.contains(period.end()));
        assert_eq!(period.label(), "2024-01-01");
    }

    #[test]
    fn test_hour_spellings_agree() {
        let a: Period = "2024-01-01-13".parse().unwrap();
        let b: Period = "2024-01-01-13:00".parse().unwrap();
        let c: Period = "2024-01-01T13".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.label(), "2024-01-01-13");
        assert_eq!(a.end() - a.start, Duration::hours(1));
    }

    #[test]
    fn test_rejects_malformed() {
        for label in [
            "",
            "2024-13-01",
            "2024-01-01-24",
            "2024-01-01-1",
            "2024-01-01-13:30",
            "yesterday",
            "2024-01-01 13",
            "2024-01-01-ab",
        ] {
            let err = label.parse::<Period>().unwrap_err();
            assert_eq!(err.kind(), "ValidationError", "{}", label);
        }
    }
}
