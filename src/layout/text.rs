//! Plain-text weekly menu payloads
//!
//! ```text
//! 식당: RESTAURANT_1
//! 주 시작일: 2025-06-30
//!
//! 월요일 (2025-06-30)
//! 아침:
//! 밥: 쌀밥
//! 국: 된장국
//! 점심1:
//! 메인메뉴: 제육볶음
//! ```

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use super::date::parse_iso_date;
use super::{HeaderField, MenuSource, RestaurantKey};
use crate::error::{IngestError, Result};
use crate::grammar::Grammar;
use crate::model::{DateColumn, MealType, RestaurantVariant};

pub const DAY_LABELS: [&str; 7] = [
    "월요일", "화요일", "수요일", "목요일", "금요일", "토요일", "일요일",
];

const RESTAURANT_PREFIX: &str = "식당:";
const START_DATE_PREFIX: &str = "주 시작일:";

#[derive(Debug, Clone)]
pub struct TextDocument {
    /// Trimmed, non-empty lines
    lines: Vec<String>,
    /// Day label -> lines below its header, up to the next day header
    sections: HashMap<&'static str, Vec<String>>,
}

impl TextDocument {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        let mut sections: HashMap<&'static str, Vec<String>> = HashMap::new();
        let mut current: Option<&'static str> = None;

        for line in &lines {
            if let Some(day) = day_header(line) {
                // a repeated day header starts that day over
                sections.insert(day, Vec::new());
                current = Some(day);
                continue;
            }
            if let Some(day) = current {
                sections.entry(day).or_default().push(line.clone());
            }
        }

        Self { lines, sections }
    }

    /// Read a UTF-8 payload from disk
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| IngestError::SourceUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse(&text))
    }

    /// Read a UTF-8 payload from a stream such as stdin; `label` names it
    /// in errors
    pub fn from_reader(mut reader: impl Read, label: &str) -> Result<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| IngestError::SourceUnreadable {
                path: label.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::parse(&text))
    }

    pub fn read_header_field(&self, field: HeaderField) -> Result<String> {
        let prefix = match field {
            HeaderField::RestaurantName => RESTAURANT_PREFIX,
            HeaderField::WeekAnchor => START_DATE_PREFIX,
        };
        self.lines
            .iter()
            .find_map(|line| line.strip_prefix(prefix))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| IngestError::FieldMissing(prefix.trim_end_matches(':').to_string()))
    }

    pub fn restaurant_variant(&self) -> Result<RestaurantVariant> {
        self.read_header_field(HeaderField::RestaurantName)?.parse()
    }

    pub fn has_day(&self, day_label: &str) -> bool {
        self.sections.contains_key(day_label)
    }
}

/// Day header lines start with a weekday label and carry no `label:` pair
fn day_header(line: &str) -> Option<&'static str> {
    if line.contains(':') {
        return None;
    }
    DAY_LABELS.iter().copied().find(|day| line.starts_with(day))
}

fn meal_header(line: &str) -> Option<MealType> {
    MealType::ALL.into_iter().find(|meal| {
        line.strip_prefix(meal.text_label())
            .is_some_and(|rest| rest.starts_with(':'))
    })
}

impl MenuSource for TextDocument {
    fn grammar(&self) -> Grammar {
        Grammar::Labeled
    }

    fn restaurant_key(&self) -> Result<RestaurantKey> {
        self.restaurant_variant().map(RestaurantKey::Variant)
    }

    fn week_anchor_date(&self) -> Result<NaiveDate> {
        parse_iso_date(&self.read_header_field(HeaderField::WeekAnchor)?)
    }

    fn date_columns(&self, variant: RestaurantVariant, anchor: NaiveDate) -> Vec<DateColumn> {
        DAY_LABELS
            .iter()
            .take(variant.day_count())
            .enumerate()
            .map(|(offset, day)| DateColumn {
                date: anchor + Duration::days(offset as i64),
                day_label: day.to_string(),
                key: day.to_string(),
            })
            .collect()
    }

    fn slot_raw_text(&self, column: &DateColumn, meal: MealType) -> Option<Vec<String>> {
        let section = self.sections.get(column.key.as_str())?;

        let items = section
            .iter()
            .skip_while(|line| meal_header(line) != Some(meal))
            .skip(1)
            .take_while(|line| meal_header(line).is_none())
            .cloned()
            .collect();

        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: &str = "식당: RESTAURANT_1
주 시작일: 2025-06-30

월요일 (2025-06-30)
아침:
밥: 쌀밥
국: 된장국
반찬: 김치

점심1:
메인메뉴: 제육볶음

점심2:
밥: 쌀밥
메인메뉴: 돈까스

저녁:
국: 콩나물국

화요일
아침:
밥: 잡곡밥
";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_restaurant_header() {
        let doc = TextDocument::parse(WEEK);
        assert_eq!(
            doc.restaurant_key().unwrap(),
            RestaurantKey::Variant(RestaurantVariant::Weekdays)
        );
        let anchor = doc.week_anchor_date().unwrap();
        assert_eq!(anchor, ymd(2025, 6, 30));
        assert_eq!(doc.date_columns(RestaurantVariant::Weekdays, anchor).len(), 5);
    }

    #[test]
    fn test_restaurant_label_variants() {
        for (line, expected) in [
            ("식당: RESTAURANT_2", RestaurantVariant::FullWeek),
            ("식당: 식당 1", RestaurantVariant::Weekdays),
            ("식당: 식당 2", RestaurantVariant::FullWeek),
        ] {
            let doc = TextDocument::parse(line);
            assert_eq!(doc.restaurant_variant().unwrap(), expected, "{}", line);
        }
        assert!(matches!(
            TextDocument::parse("주 시작일: 2025-06-28").restaurant_variant(),
            Err(IngestError::FieldMissing(_))
        ));
    }

    #[test]
    fn test_start_date_errors() {
        let missing = TextDocument::parse("식당: RESTAURANT_1");
        assert!(matches!(
            missing.week_anchor_date(),
            Err(IngestError::FieldMissing(_))
        ));
        let malformed = TextDocument::parse("주 시작일: 2025/06/28");
        assert!(matches!(
            malformed.week_anchor_date(),
            Err(IngestError::DateFormatInvalid { .. })
        ));
    }

    #[test]
    fn test_full_week_dates() {
        let doc = TextDocument::parse(WEEK);
        let columns = doc.date_columns(RestaurantVariant::FullWeek, ymd(2025, 6, 30));
        assert_eq!(columns.len(), 7);
        assert_eq!(columns[6].day_label, "일요일");
        assert_eq!(columns[6].date, ymd(2025, 7, 6));
    }

    #[test]
    fn test_slot_sections() {
        let doc = TextDocument::parse(WEEK);
        let columns = doc.date_columns(RestaurantVariant::Weekdays, ymd(2025, 6, 30));
        let monday = &columns[0];

        assert_eq!(
            doc.slot_raw_text(monday, MealType::Breakfast).unwrap(),
            vec!["밥: 쌀밥", "국: 된장국", "반찬: 김치"]
        );
        assert_eq!(
            doc.slot_raw_text(monday, MealType::Lunch1).unwrap(),
            vec!["메인메뉴: 제육볶음"]
        );
        assert_eq!(
            doc.slot_raw_text(monday, MealType::Dinner).unwrap(),
            vec!["국: 콩나물국"]
        );

        let tuesday = &columns[1];
        assert_eq!(
            doc.slot_raw_text(tuesday, MealType::Breakfast).unwrap(),
            vec!["밥: 잡곡밥"]
        );
        assert!(doc.slot_raw_text(tuesday, MealType::Lunch2).unwrap().is_empty());

        // no section at all for Wednesday
        assert!(!doc.has_day("수요일"));
        assert!(doc.slot_raw_text(&columns[2], MealType::Breakfast).is_none());
    }

    #[test]
    fn test_stream_input() {
        let doc = TextDocument::from_reader(WEEK.as_bytes(), "-").unwrap();
        assert_eq!(
            doc.restaurant_key().unwrap(),
            RestaurantKey::Variant(RestaurantVariant::Weekdays)
        );

        let err = TextDocument::from_reader(&[0xff, 0xfe, 0x00][..], "-").unwrap_err();
        assert!(matches!(err, IngestError::SourceUnreadable { ref path, .. } if path == "-"));
        assert_eq!(err.code(), "SOURCE_UNREADABLE");
    }
}
