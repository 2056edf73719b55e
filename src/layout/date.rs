//! Day/date label parsing for menu headers

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::{IngestError, Result};

const DAY_MONTH_FORMAT: &str = "'Day M/D' (e.g. 'Mon 5/26')";
const ISO_FORMAT: &str = "YYYY-MM-DD";

/// Years searched either side of today for a matching day name; the
/// calendar repeats within 28
const YEAR_SEARCH: i32 = 28;

/// A parsed "Mon 5/26" label. The day name is never checked against the
/// calendar; it only picks the year when none is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayMonthLabel {
    pub day_name: String,
    pub month: u32,
    pub day: u32,
}

pub fn parse_day_month(label: &str) -> Result<DayMonthLabel> {
    let invalid = || IngestError::DateFormatInvalid {
        value: label.to_string(),
        expected: DAY_MONTH_FORMAT,
    };

    let mut parts = label.split_whitespace();
    let day_name = parts.next().ok_or_else(invalid)?;
    let month_day = parts.next().ok_or_else(invalid)?;
    let (month, day) = month_day.split_once('/').ok_or_else(invalid)?;

    Ok(DayMonthLabel {
        day_name: day_name.to_string(),
        month: month.trim().parse().map_err(|_| invalid())?,
        day: day.trim().parse().map_err(|_| invalid())?,
    })
}

pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        IngestError::DateFormatInvalid {
            value: value.to_string(),
            expected: ISO_FORMAT,
        }
    })
}

/// Parse a week anchor cell. Accepts "Mon 5/26" or an ISO date, which is
/// what real date cells are rendered as. A "Mon 5/26" label goes in `year`
/// when given, otherwise in the year nearest `today` that fits it.
pub fn parse_anchor(
    label: &str,
    year: Option<i32>,
    today: NaiveDate,
) -> Result<(String, NaiveDate)> {
    if let Ok(date) = parse_iso_date(label) {
        return Ok((date.format("%a").to_string(), date));
    }
    let parsed = parse_day_month(label)?;
    let year = year.unwrap_or_else(|| infer_year(&parsed, today));
    let date = NaiveDate::from_ymd_opt(year, parsed.month, parsed.day).ok_or_else(|| {
        IngestError::DateFormatInvalid {
            value: label.to_string(),
            expected: DAY_MONTH_FORMAT,
        }
    })?;
    Ok((parsed.day_name, date))
}

/// Year for a label that carries none. With a known day name, the nearest
/// year to `today` in which M/D falls on that day; otherwise the year that
/// puts M/D closest to `today`.
pub fn infer_year(label: &DayMonthLabel, today: NaiveDate) -> i32 {
    let on = |year: i32| NaiveDate::from_ymd_opt(year, label.month, label.day);
    let base = today.year();

    if let Ok(weekday) = label.day_name.parse::<Weekday>() {
        let matched = (0..=YEAR_SEARCH)
            .flat_map(|offset| [base - offset, base + offset])
            .find(|&year| on(year).is_some_and(|date| date.weekday() == weekday));
        if let Some(year) = matched {
            return year;
        }
    }

    [base, base - 1, base + 1]
        .into_iter()
        .filter_map(|year| on(year).map(|date| (year, (date - today).num_days().abs())))
        .min_by_key(|&(_, distance)| distance)
        .map_or(base, |(year, _)| year)
}

/// Parse a day column header relative to the week anchor. A column whose
/// month is earlier than the anchor's belongs to the following year
/// (a week that starts in late December).
pub fn parse_column_header(label: &str, anchor: NaiveDate) -> Result<(String, NaiveDate)> {
    if let Ok(date) = parse_iso_date(label) {
        return Ok((date.format("%a").to_string(), date));
    }
    let parsed = parse_day_month(label)?;
    let year = if parsed.month < anchor.month() {
        anchor.year() + 1
    } else {
        anchor.year()
    };
    let date = NaiveDate::from_ymd_opt(year, parsed.month, parsed.day).ok_or_else(|| {
        IngestError::DateFormatInvalid {
            value: label.to_string(),
            expected: DAY_MONTH_FORMAT,
        }
    })?;
    Ok((parsed.day_name, date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        ymd(2026, 10, 16)
    }

    #[test]
    fn test_parse_anchor_day_month() {
        let (day, date) = parse_anchor("Mon 5/26", Some(2025), today()).unwrap();
        assert_eq!(day, "Mon");
        assert_eq!(date, ymd(2025, 5, 26));
    }

    #[test]
    fn test_day_name_not_validated() {
        // 2025-05-26 is a Monday; with an explicit year the label is
        // trusted for the date only
        let (day, date) = parse_anchor("Fri 5/26", Some(2025), today()).unwrap();
        assert_eq!(day, "Fri");
        assert_eq!(date, ymd(2025, 5, 26));
    }

    #[test]
    fn test_year_from_day_name() {
        // 2026-05-26 is a Tuesday, so a Monday 5/26 is last year's
        let (_, date) = parse_anchor("Mon 5/26", None, today()).unwrap();
        assert_eq!(date, ymd(2025, 5, 26));
        let (_, date) = parse_anchor("Tue 5/26", None, today()).unwrap();
        assert_eq!(date, ymd(2026, 5, 26));
        let (_, date) = parse_anchor("Wednesday 5/26", None, today()).unwrap();
        assert_eq!(date, ymd(2027, 5, 26));
        // leap day
        let (_, date) = parse_anchor("Thu 2/29", None, today()).unwrap();
        assert_eq!(date, ymd(2024, 2, 29));
    }

    #[test]
    fn test_year_without_day_name() {
        // closest to today: early January labels read in October are next year
        let (_, date) = parse_anchor("월 1/4", None, today()).unwrap();
        assert_eq!(date, ymd(2027, 1, 4));
        let (_, date) = parse_anchor("월 5/26", None, today()).unwrap();
        assert_eq!(date, ymd(2026, 5, 26));
    }

    #[test]
    fn test_parse_anchor_iso() {
        let (day, date) = parse_anchor("2025-06-30", Some(1999), today()).unwrap();
        assert_eq!(day, "Mon");
        assert_eq!(date, ymd(2025, 6, 30));
    }

    #[test]
    fn test_parse_anchor_invalid() {
        for label in ["Mon", "Mon 5-26", "Mon x/26", "Mon 13/01", "Mon 2/30", ""] {
            assert!(
                matches!(
                    parse_anchor(label, Some(2025), today()),
                    Err(IngestError::DateFormatInvalid { .. })
                ),
                "{:?} should be rejected",
                label
            );
        }
    }

    #[test]
    fn test_column_header_year_rollover() {
        let anchor = ymd(2025, 12, 29);
        let (_, date) = parse_column_header("Thu 1/1", anchor).unwrap();
        assert_eq!(date, ymd(2026, 1, 1));
        let (_, date) = parse_column_header("Wed 12/31", anchor).unwrap();
        assert_eq!(date, ymd(2025, 12, 31));
    }

    #[test]
    fn test_parse_iso_date_rejects_slashes() {
        assert!(parse_iso_date("2025/06/28").is_err());
    }
}
