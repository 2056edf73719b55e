//! Domain types shared by the reader, normalizer, store and engine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IngestError;

/// The four fixed meal slots of a day, in serving order.
///
/// The derived ordering is the serving order and is relied upon by the read
/// query and by positional alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MealType {
    #[serde(rename = "Breakfast")]
    Breakfast,
    #[serde(rename = "Lunch_1")]
    Lunch1,
    #[serde(rename = "Lunch_2")]
    Lunch2,
    #[serde(rename = "Dinner")]
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch1,
        MealType::Lunch2,
        MealType::Dinner,
    ];

    /// Value stored in `meals.meal_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch1 => "Lunch_1",
            MealType::Lunch2 => "Lunch_2",
            MealType::Dinner => "Dinner",
        }
    }

    /// Section label used by the plain-text payload
    pub fn text_label(&self) -> &'static str {
        match self {
            MealType::Breakfast => "아침",
            MealType::Lunch1 => "점심1",
            MealType::Lunch2 => "점심2",
            MealType::Dinner => "저녁",
        }
    }

    /// 1-based serving order, used in SQL `ORDER BY`
    pub fn rank(&self) -> u8 {
        match self {
            MealType::Breakfast => 1,
            MealType::Lunch1 => 2,
            MealType::Lunch2 => 3,
            MealType::Dinner => 4,
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealType::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| IngestError::UnknownMealType(s.to_string()))
    }
}

/// Restaurant configuration deciding which days a week carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestaurantVariant {
    /// Monday to Friday
    #[serde(rename = "RESTAURANT_1")]
    Weekdays,
    /// Monday to Sunday
    #[serde(rename = "RESTAURANT_2")]
    FullWeek,
}

impl RestaurantVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestaurantVariant::Weekdays => "RESTAURANT_1",
            RestaurantVariant::FullWeek => "RESTAURANT_2",
        }
    }

    pub fn day_count(&self) -> usize {
        match self {
            RestaurantVariant::Weekdays => 5,
            RestaurantVariant::FullWeek => 7,
        }
    }

    /// Lenient parse for header lines: accepts the enum value as well as
    /// labels such as "식당 1" or "restaurant 2".
    pub fn parse_loose(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        if normalized == "RESTAURANT_1" {
            return Some(RestaurantVariant::Weekdays);
        }
        if normalized == "RESTAURANT_2" {
            return Some(RestaurantVariant::FullWeek);
        }
        if normalized.contains('1') {
            Some(RestaurantVariant::Weekdays)
        } else if normalized.contains('2') {
            Some(RestaurantVariant::FullWeek)
        } else {
            None
        }
    }
}

impl fmt::Display for RestaurantVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestaurantVariant {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RestaurantVariant::parse_loose(s).ok_or_else(|| IngestError::UnknownVariant(s.to_string()))
    }
}

/// Reference row; never created by an ingestion run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub name_en: Option<String>,
    pub variant: RestaurantVariant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Week {
    pub id: i64,
    pub start_date: NaiveDate,
    pub restaurant_id: i64,
}

/// One day of the week as laid out in the source
#[derive(Debug, Clone, PartialEq)]
pub struct DateColumn {
    pub date: NaiveDate,
    /// Label stored in `meals.day_of_week` ("Mon", "월요일", ...)
    pub day_label: String,
    /// Spreadsheet column letter, or the day section label for text input
    pub key: String,
}

/// A categorized item ready to be written for one meal
#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub category: String,
    pub name: String,
    pub name_en: Option<String>,
    pub price: f64,
}

impl MenuEntry {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            name_en: None,
            price: 0.0,
        }
    }
}

/// A menu item as stored, in alignment order
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMenuItem {
    pub id: i64,
    pub meal_id: i64,
    pub category: String,
    pub name: String,
    pub name_en: String,
    pub price: f64,
    pub position: i64,
}

/// Outcome of a resolve-or-create call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: i64,
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_order() {
        let mut shuffled = vec![
            MealType::Dinner,
            MealType::Breakfast,
            MealType::Lunch2,
            MealType::Lunch1,
        ];
        shuffled.sort();
        assert_eq!(shuffled, MealType::ALL.to_vec());
    }

    #[test]
    fn test_meal_type_parse() {
        assert_eq!("Lunch_2".parse::<MealType>().unwrap(), MealType::Lunch2);
        assert!(matches!(
            "Brunch".parse::<MealType>(),
            Err(IngestError::UnknownMealType(_))
        ));
    }

    #[test]
    fn test_variant_parse_loose() {
        assert_eq!(
            RestaurantVariant::parse_loose("RESTAURANT_1"),
            Some(RestaurantVariant::Weekdays)
        );
        assert_eq!(
            RestaurantVariant::parse_loose("식당 2"),
            Some(RestaurantVariant::FullWeek)
        );
        assert_eq!(RestaurantVariant::parse_loose("본관"), None);
        assert_eq!(RestaurantVariant::FullWeek.day_count(), 7);
    }
}
