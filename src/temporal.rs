//! Temporal intervals and formatting (spec §3, §4.9, §4.13/"Temporal
//! Formatter").

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A time interval `(start, end)` with `start <= end`. Either endpoint may
/// be `None` ("open").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeInterval {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl TimeInterval {
    /// Build a closed interval, swapping endpoints if they arrived reversed
    /// so the `start <= end` invariant always holds.
    pub fn closed(start: NaiveDate, end: NaiveDate) -> TimeInterval {
        if start <= end {
            TimeInterval {
                start: Some(start),
                end: Some(end),
            }
        } else {
            TimeInterval {
                start: Some(end),
                end: Some(start),
            }
        }
    }

    /// An interval with only a start date known.
    pub fn starting_at(start: NaiveDate) -> TimeInterval {
        TimeInterval {
            start: Some(start),
            end: None,
        }
    }

    /// An interval with only an end date known.
    pub fn ending_at(end: NaiveDate) -> TimeInterval {
        TimeInterval {
            start: None,
            end: Some(end),
        }
    }

    /// A fully-open interval (both endpoints unknown). Merging this with
    /// anything yields the other operand unchanged.
    pub fn open() -> TimeInterval {
        TimeInterval {
            start: None,
            end: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// `min(start)`/`max(end)` merge, treating `None` as the appropriate
    /// infinity (spec §8: "treating null as -infinity", symmetric for end).
    /// A merge of two fully-null inputs is null.
    pub fn merge(&self, other: &TimeInterval) -> TimeInterval {
        let start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };
        TimeInterval { start, end }
    }
}

/// How precisely to render dates in formatted output (spec §6.1
/// `temporal_precision`). Default is day precision (`%Y-%m-%d`), per spec
/// §3's stated invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemporalPrecision {
    Year,
    Month,
    Day,
}

impl Default for TemporalPrecision {
    fn default() -> Self {
        TemporalPrecision::Day
    }
}

impl TemporalPrecision {
    fn strftime_format(self) -> &'static str {
        match self {
            TemporalPrecision::Year => "%Y",
            TemporalPrecision::Month => "%Y-%m",
            TemporalPrecision::Day => "%Y-%m-%d",
        }
    }
}

/// Render a [`TimeInterval`] at the given precision. Open endpoints render
/// as `".."`, matching the open-interval convention used elsewhere in the
/// geospatial ecosystem (e.g. STAC's `null` temporal bounds).
pub fn format_interval(interval: &TimeInterval, precision: TemporalPrecision) -> String {
    let fmt = precision.strftime_format();
    let start = interval
        .start
        .map(|d| d.format(fmt).to_string())
        .unwrap_or_else(|| "..".to_owned());
    let end = interval
        .end
        .map(|d| d.format(fmt).to_string())
        .unwrap_or_else(|| "..".to_owned());
    format!("{}/{}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn merge_takes_min_start_max_end() {
        let a = TimeInterval::closed(date(2020, 1, 1), date(2020, 6, 1));
        let b = TimeInterval::closed(date(2019, 1, 1), date(2021, 1, 1));
        let merged = a.merge(&b);
        assert_eq!(merged.start, Some(date(2019, 1, 1)));
        assert_eq!(merged.end, Some(date(2021, 1, 1)));
    }

    #[test]
    fn merge_treats_null_as_open_on_each_side() {
        let a = TimeInterval::starting_at(date(2020, 1, 1));
        let b = TimeInterval::ending_at(date(2022, 1, 1));
        let merged = a.merge(&b);
        assert_eq!(merged.start, Some(date(2020, 1, 1)));
        assert_eq!(merged.end, Some(date(2022, 1, 1)));
    }

    #[test]
    fn merge_of_fully_null_inputs_is_null() {
        let merged = TimeInterval::open().merge(&TimeInterval::open());
        assert!(merged.is_open());
    }

    #[test]
    fn closed_swaps_reversed_endpoints() {
        let interval = TimeInterval::closed(date(2021, 1, 1), date(2020, 1, 1));
        assert_eq!(interval.start, Some(date(2020, 1, 1)));
        assert_eq!(interval.end, Some(date(2021, 1, 1)));
    }

    #[test]
    fn default_precision_is_day() {
        let interval = TimeInterval::closed(date(2020, 1, 2), date(2020, 1, 2));
        assert_eq!(
            format_interval(&interval, TemporalPrecision::Day),
            "2020-01-02/2020-01-02"
        );
    }

    #[test]
    fn open_endpoints_render_as_dotdot() {
        let interval = TimeInterval::starting_at(date(2010, 1, 1));
        assert_eq!(
            format_interval(&interval, TemporalPrecision::Year),
            "2010/.."
        );
    }
}
