use crate::error::SyncError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::str::FromStr;

/// Days before the end date used when no start is given.
pub const DEFAULT_START_OFFSET_DAYS: i64 = -200;

/// A date expression that resolves to a calendar date against a base date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DateSpec {
    Absolute(NaiveDate),
    RelativeDays(i64),
    Duration(Duration),
    /// Seconds since the Unix epoch; resolves to the UTC calendar date.
    Timestamp(f64),
}

impl DateSpec {
    pub fn default_start() -> Self {
        DateSpec::RelativeDays(DEFAULT_START_OFFSET_DAYS)
    }

    pub fn default_end() -> Self {
        DateSpec::RelativeDays(0)
    }

    pub fn resolve(&self, base: NaiveDate) -> Result<NaiveDate, SyncError> {
        match *self {
            DateSpec::Absolute(date) => Ok(date),
            DateSpec::Duration(offset) => base.checked_add_signed(offset).ok_or_else(|| {
                SyncError::InvalidDateSpec(format!("{} + {} is out of range", base, offset))
            }),
            DateSpec::RelativeDays(days) => Duration::try_days(days)
                .and_then(|offset| base.checked_add_signed(offset))
                .ok_or_else(|| {
                    SyncError::InvalidDateSpec(format!("{} + {} days is out of range", base, days))
                }),
            DateSpec::Timestamp(seconds) => {
                if !seconds.is_finite() {
                    return Err(SyncError::InvalidDateSpec(format!(
                        "timestamp {} is not finite",
                        seconds
                    )));
                }
                DateTime::<Utc>::from_timestamp(seconds.floor() as i64, 0)
                    .map(|instant| instant.date_naive())
                    .ok_or_else(|| {
                        SyncError::InvalidDateSpec(format!("timestamp {} is out of range", seconds))
                    })
            }
        }
    }
}

/// Parses `YYYY-MM-DD`, a signed day offset such as `-3`, or `@<unix-seconds>`.
impl FromStr for DateSpec {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(seconds) = s.strip_prefix('@') {
            return seconds
                .parse::<f64>()
                .map(DateSpec::Timestamp)
                .map_err(|_| SyncError::InvalidDateSpec(s.to_string()));
        }
        if let Ok(days) = s.parse::<i64>() {
            return Ok(DateSpec::RelativeDays(days));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DateSpec::Absolute)
            .map_err(|_| SyncError::InvalidDateSpec(s.to_string()))
    }
}

/// Expands a start/end pair into an inclusive, ascending list of days.
///
/// `end` is resolved against `today`; `start` is resolved against the resolved
/// end, so a relative start counts back from the end. An inverted range is empty.
pub fn resolve_range(
    start: &DateSpec,
    end: &DateSpec,
    today: NaiveDate,
) -> Result<Vec<NaiveDate>, SyncError> {
    let end = end.resolve(today)?;
    let start = start.resolve(end)?;
    Ok(start.iter_days().take_while(|day| *day <= end).collect())
}

/// Today's date on the UTC calendar, which is how archive days are keyed.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_variants() {
        let base = ymd(2021, 8, 21);
        assert_eq!(DateSpec::Absolute(ymd(2020, 1, 1)).resolve(base).unwrap(), ymd(2020, 1, 1));
        assert_eq!(DateSpec::RelativeDays(-3).resolve(base).unwrap(), ymd(2021, 8, 18));
        assert_eq!(
            DateSpec::Duration(Duration::days(2)).resolve(base).unwrap(),
            ymd(2021, 8, 23)
        );
        // 2021-08-21T12:00:00Z
        assert_eq!(
            DateSpec::Timestamp(1_629_547_200.0).resolve(base).unwrap(),
            ymd(2021, 8, 21)
        );
    }

    #[test]
    fn test_resolve_rejects_nan_timestamp() {
        let err = DateSpec::Timestamp(f64::NAN).resolve(ymd(2021, 8, 21)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidDateSpec(_)));
    }

    #[test]
    fn test_resolve_out_of_range_offset() {
        let err = DateSpec::RelativeDays(i64::MAX).resolve(ymd(2021, 8, 21)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidDateSpec(_)));
    }

    #[test]
    fn test_parse() {
        assert_eq!("2021-08-21".parse::<DateSpec>().unwrap(), DateSpec::Absolute(ymd(2021, 8, 21)));
        assert_eq!("-3".parse::<DateSpec>().unwrap(), DateSpec::RelativeDays(-3));
        assert_eq!("+2".parse::<DateSpec>().unwrap(), DateSpec::RelativeDays(2));
        assert_eq!("@0".parse::<DateSpec>().unwrap(), DateSpec::Timestamp(0.0));
        assert!(matches!(
            "yesterday".parse::<DateSpec>(),
            Err(SyncError::InvalidDateSpec(_))
        ));
        assert!("2021-13-01".parse::<DateSpec>().is_err());
    }

    #[test]
    fn test_relative_start_is_offset_from_end() {
        let days = resolve_range(
            &DateSpec::RelativeDays(-3),
            &DateSpec::Absolute(ymd(2021, 8, 21)),
            ymd(2030, 1, 1),
        )
        .unwrap();
        assert_eq!(days.first(), Some(&ymd(2021, 8, 18)));
        assert_eq!(days.last(), Some(&ymd(2021, 8, 21)));
    }

    #[test]
    fn test_relative_end_is_offset_from_today() {
        let days = resolve_range(
            &DateSpec::RelativeDays(0),
            &DateSpec::RelativeDays(-1),
            ymd(2021, 8, 22),
        )
        .unwrap();
        assert_eq!(days, vec![ymd(2021, 8, 21)]);
    }

    #[test]
    fn test_range_length_and_order() {
        let end = ymd(2021, 3, 2);
        for offset in 0..40 {
            let days = resolve_range(
                &DateSpec::RelativeDays(-offset),
                &DateSpec::Absolute(end),
                end,
            )
            .unwrap();
            assert_eq!(days.len() as i64, offset + 1);
            assert!(days.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let days = resolve_range(
            &DateSpec::Absolute(ymd(2021, 8, 22)),
            &DateSpec::Absolute(ymd(2021, 8, 21)),
            ymd(2021, 8, 21),
        )
        .unwrap();
        assert!(days.is_empty());
    }

    #[test]
    fn test_default_range_spans_201_days() {
        let today = ymd(2021, 8, 21);
        let days = resolve_range(&DateSpec::default_start(), &DateSpec::default_end(), today).unwrap();
        assert_eq!(days.len(), 201);
        assert_eq!(days.last(), Some(&today));
    }
}
