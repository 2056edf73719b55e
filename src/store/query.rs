//! Read path: rebuild a restaurant's week as a nested tree

use chrono::{Duration, NaiveDate};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::{MenuStore, SqliteStore};
use crate::error::{IngestError, Result};
use crate::model::MealType;
use crate::summary::{RunSummary, Tally};

#[derive(Debug, Serialize)]
pub struct WeekMenu {
    pub restaurant: RestaurantInfo,
    pub week: WeekInfo,
    pub meals_by_day: Vec<DayMeals>,
    pub summary: RunSummary,
}

#[derive(Debug, Serialize)]
pub struct RestaurantInfo {
    pub id: i64,
    pub name: String,
    pub name_en: String,
}

#[derive(Debug, Serialize)]
pub struct WeekInfo {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct DayMeals {
    pub date: NaiveDate,
    pub day_of_week: String,
    pub meals: Vec<MealInfo>,
}

#[derive(Debug, Serialize)]
pub struct MealInfo {
    pub meal_id: i64,
    pub meal_type: MealType,
    pub menu_items: Vec<MenuItemInfo>,
}

#[derive(Debug, Serialize)]
pub struct MenuItemInfo {
    pub id: i64,
    pub category: String,
    pub name: String,
    pub name_en: String,
    pub price: f64,
}

/// `CASE meal_type WHEN 'Breakfast' THEN 1 ... END`
fn meal_rank_sql(column: &str) -> String {
    let arms: Vec<String> = MealType::ALL
        .iter()
        .map(|m| format!("WHEN '{}' THEN {}", m.as_str(), m.rank()))
        .collect();
    format!("CASE {} {} END", column, arms.join(" "))
}

struct MealRow {
    meal_id: i64,
    date: NaiveDate,
    day_of_week: String,
    meal_type: String,
    item: Option<MenuItemInfo>,
}

impl SqliteStore {
    /// Menu of the week containing `date` (latest week whose seven days
    /// cover it)
    pub fn week_menu(&self, restaurant_id: i64, date: NaiveDate) -> Result<WeekMenu> {
        let restaurant = self
            .find_restaurant_by_id(restaurant_id)?
            .ok_or_else(|| IngestError::RestaurantNotFound(restaurant_id.to_string()))?;

        let week: Option<(i64, NaiveDate)> = self
            .conn
            .query_row(
                "SELECT id, start_date FROM weeks
                 WHERE restaurant_id = ?1
                   AND start_date <= ?2
                   AND date(start_date, '+6 days') >= ?2
                 ORDER BY start_date DESC
                 LIMIT 1",
                params![restaurant_id, date],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (week_id, start_date) = week.ok_or(IngestError::WeekNotFound {
            restaurant_id,
            date,
        })?;

        let sql = format!(
            "SELECT m.id, m.date, m.day_of_week, m.meal_type,
                    mi.id, mi.category, mi.name, mi.name_en, mi.price
             FROM meals m
             LEFT JOIN menu_items mi ON mi.meal_id = m.id
             WHERE m.week_id = ?1
             ORDER BY m.date, {}, mi.position, mi.id",
            meal_rank_sql("m.meal_type")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([week_id], |row| {
                let item_id: Option<i64> = row.get(4)?;
                let item = match item_id {
                    Some(id) => Some(MenuItemInfo {
                        id,
                        category: row.get(5)?,
                        name: row.get(6)?,
                        name_en: row.get(7)?,
                        price: row.get(8)?,
                    }),
                    None => None,
                };
                Ok(MealRow {
                    meal_id: row.get(0)?,
                    date: row.get(1)?,
                    day_of_week: row.get(2)?,
                    meal_type: row.get(3)?,
                    item,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let (meals_by_day, summary) = build_days(rows)?;

        Ok(WeekMenu {
            restaurant: RestaurantInfo {
                id: restaurant.id,
                name: restaurant.name,
                name_en: restaurant.name_en.unwrap_or_default(),
            },
            week: WeekInfo {
                id: week_id,
                start_date,
                end_date: start_date + Duration::days(6),
            },
            meals_by_day,
            summary,
        })
    }
}

/// Fold ordered join rows into days and meals
fn build_days(rows: Vec<MealRow>) -> Result<(Vec<DayMeals>, RunSummary)> {
    let mut days: Vec<DayMeals> = Vec::new();
    let mut tally = Tally::default();

    for row in rows {
        if days.last().map(|d| d.date) != Some(row.date) {
            days.push(DayMeals {
                date: row.date,
                day_of_week: row.day_of_week.clone(),
                meals: Vec::new(),
            });
        }
        let Some(day) = days.last_mut() else {
            continue;
        };

        if day.meals.last().map(|m| m.meal_id) != Some(row.meal_id) {
            day.meals.push(MealInfo {
                meal_id: row.meal_id,
                meal_type: row.meal_type.parse()?,
                menu_items: Vec::new(),
            });
            tally.meal(row.date);
        }

        if let (Some(item), Some(meal)) = (row.item, day.meals.last_mut()) {
            meal.menu_items.push(item);
            tally.items(1);
        }
    }

    Ok((days, tally.finish()))
}
