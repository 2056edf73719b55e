use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, ToSql, Transaction};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::schema::{generate_create_table, generate_indexes, ALL_TABLES};
use super::MenuStore;
use crate::error::{IngestError, Result};
use crate::model::{
    MealType, MenuEntry, Resolved, Restaurant, RestaurantVariant, StoredMenuItem, Week,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const UPSERT_ITEM_SQL: &str = "
    INSERT INTO menu_items (meal_id, category, name, name_en, price, position)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT (meal_id, category, name) DO UPDATE SET
        name_en = CASE WHEN excluded.name_en <> '' THEN excluded.name_en ELSE menu_items.name_en END,
        price = excluded.price,
        position = excluded.position,
        updated_at = datetime('now')";

pub struct SqliteStore {
    pub(super) conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists.
    /// Existing data is kept: ingestion runs are incremental.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    pub fn create_tables(&self) -> Result<()> {
        for schema in ALL_TABLES {
            self.conn.execute(&generate_create_table(schema), [])?;
            for index_sql in generate_indexes(schema) {
                self.conn.execute(&index_sql, [])?;
            }
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Seed a reference restaurant. An existing name is left untouched.
    pub fn add_restaurant(
        &mut self,
        name: &str,
        name_en: Option<&str>,
        variant: RestaurantVariant,
    ) -> Result<Resolved> {
        let tx = self.conn.transaction()?;
        let inserted = tx
            .execute(
                "INSERT INTO restaurants (name, name_en, variant) VALUES (?1, ?2, ?3)
                 ON CONFLICT (name) DO NOTHING",
                params![name, name_en, variant.as_str()],
            )
            .map_err(|source| IngestError::InsertFailed {
                what: format!("restaurant '{}'", name),
                source,
            })?;
        let id: i64 = tx.query_row(
            "SELECT id FROM restaurants WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok(Resolved {
            id,
            created: inserted > 0,
        })
    }

    pub fn list_restaurants(&self) -> Result<Vec<Restaurant>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, name_en, variant FROM restaurants ORDER BY id")?;
        let rows = stmt
            .query_map([], restaurant_columns)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(into_restaurant).collect()
    }

    fn query_restaurant(&self, filter: &str, param: impl ToSql) -> Result<Option<Restaurant>> {
        let sql = format!(
            "SELECT id, name, name_en, variant FROM restaurants WHERE {} ORDER BY id LIMIT 1",
            filter
        );
        self.conn
            .query_row(&sql, [param], restaurant_columns)
            .optional()?
            .map(into_restaurant)
            .transpose()
    }

    fn query_week(&self, filter: &str, params: impl rusqlite::Params) -> Result<Option<Week>> {
        let sql = format!(
            "SELECT id, start_date, restaurant_id FROM weeks WHERE {}",
            filter
        );
        let week = self
            .conn
            .query_row(&sql, params, |row| {
                Ok(Week {
                    id: row.get(0)?,
                    start_date: row.get(1)?,
                    restaurant_id: row.get(2)?,
                })
            })
            .optional()?;
        Ok(week)
    }
}

type RestaurantColumns = (i64, String, Option<String>, String);

fn restaurant_columns(row: &rusqlite::Row) -> rusqlite::Result<RestaurantColumns> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_restaurant((id, name, name_en, variant): RestaurantColumns) -> Result<Restaurant> {
    Ok(Restaurant {
        id,
        name,
        name_en,
        variant: variant.parse()?,
    })
}

/// Insert-or-keep followed by a re-select inside one transaction. The unique
/// index decides which writer wins; the loser reads the winner's id. The
/// first `key_len` insert parameters are the natural key used by the select.
fn insert_or_select(
    tx: &Transaction,
    insert_sql: &str,
    select_sql: &str,
    params: &[&dyn ToSql],
    key_len: usize,
    what: impl Fn() -> String,
) -> Result<Resolved> {
    let inserted = tx
        .execute(insert_sql, params)
        .map_err(|source| IngestError::InsertFailed {
            what: what(),
            source,
        })?;
    let id: i64 = tx.query_row(select_sql, &params[..key_len], |row| row.get(0))?;
    Ok(Resolved {
        id,
        created: inserted > 0,
    })
}

impl MenuStore for SqliteStore {
    fn find_restaurant_by_name(&self, name: &str) -> Result<Option<Restaurant>> {
        self.query_restaurant("name = ?1 OR name_en = ?1", name.trim())
    }

    fn find_restaurant_by_variant(&self, variant: RestaurantVariant) -> Result<Option<Restaurant>> {
        self.query_restaurant("variant = ?1", variant.as_str())
    }

    fn find_restaurant_by_id(&self, id: i64) -> Result<Option<Restaurant>> {
        self.query_restaurant("id = ?1", id)
    }

    fn find_week(&self, restaurant_id: i64, start_date: NaiveDate) -> Result<Option<Week>> {
        self.query_week(
            "restaurant_id = ?1 AND start_date = ?2",
            params![restaurant_id, start_date],
        )
    }

    fn find_week_by_id(&self, week_id: i64) -> Result<Option<Week>> {
        self.query_week("id = ?1", [week_id])
    }

    fn resolve_or_create_week(&mut self, restaurant_id: i64, start_date: NaiveDate) -> Result<Resolved> {
        let tx = self.conn.transaction()?;
        let resolved = insert_or_select(
            &tx,
            "INSERT INTO weeks (restaurant_id, start_date) VALUES (?1, ?2)
             ON CONFLICT (restaurant_id, start_date) DO NOTHING",
            "SELECT id FROM weeks WHERE restaurant_id = ?1 AND start_date = ?2",
            params![restaurant_id, start_date],
            2,
            || format!("week {} for restaurant {}", start_date, restaurant_id),
        )?;
        tx.commit()?;

        debug!(week_id = resolved.id, created = resolved.created, "Resolved week {}", start_date);
        Ok(resolved)
    }

    fn find_meal(&self, week_id: i64, date: NaiveDate, meal_type: MealType) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM meals WHERE week_id = ?1 AND date = ?2 AND meal_type = ?3",
                params![week_id, date, meal_type.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn resolve_or_create_meal(
        &mut self,
        week_id: i64,
        date: NaiveDate,
        day_of_week: &str,
        meal_type: MealType,
    ) -> Result<Resolved> {
        let tx = self.conn.transaction()?;
        let resolved = insert_or_select(
            &tx,
            "INSERT INTO meals (week_id, date, meal_type, day_of_week) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (week_id, date, meal_type) DO NOTHING",
            "SELECT id FROM meals WHERE week_id = ?1 AND date = ?2 AND meal_type = ?3",
            params![week_id, date, meal_type.as_str(), day_of_week],
            3,
            || format!("{} meal on {} for week {}", meal_type, date, week_id),
        )?;
        tx.commit()?;
        Ok(resolved)
    }

    fn upsert_menu_items(&mut self, meal_id: i64, items: &[MenuEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(UPSERT_ITEM_SQL)?;
            // a repeated (category, name) is one row; it keeps the position
            // of its first occurrence so later items line up with the source
            let mut seen = HashSet::new();
            for (position, item) in items.iter().enumerate() {
                if !seen.insert((item.category.as_str(), item.name.as_str())) {
                    debug!(meal_id, name = %item.name, position, "Repeated item in slot");
                    continue;
                }
                written += stmt.execute(params![
                    meal_id,
                    item.category,
                    item.name,
                    item.name_en.as_deref().unwrap_or(""),
                    item.price,
                    position as i64,
                ])
                .map_err(|source| IngestError::InsertFailed {
                    what: format!("menu item '{}' ({}) for meal {}", item.name, item.category, meal_id),
                    source,
                })?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn fetch_menu_items_ordered(&self, meal_id: i64) -> Result<Vec<StoredMenuItem>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, meal_id, category, name, name_en, price, position
             FROM menu_items WHERE meal_id = ?1
             ORDER BY position, id",
        )?;
        let items = stmt
            .query_map([meal_id], |row| {
                Ok(StoredMenuItem {
                    id: row.get(0)?,
                    meal_id: row.get(1)?,
                    category: row.get(2)?,
                    name: row.get(3)?,
                    name_en: row.get(4)?,
                    price: row.get(5)?,
                    position: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn update_menu_item_translation(&mut self, item_id: i64, name_en: &str) -> Result<()> {
        let what = || format!("translation of menu item {}", item_id);
        let changed = self
            .conn
            .execute(
                "UPDATE menu_items SET name_en = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name_en, item_id],
            )
            .map_err(|source| IngestError::UpdateFailed {
                what: what(),
                source,
            })?;
        if changed == 0 {
            return Err(IngestError::UpdateFailed {
                what: what(),
                source: rusqlite::Error::QueryReturnedNoRows,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded() -> (SqliteStore, i64) {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let restaurant = store
            .add_restaurant("제1학생식당", Some("Student Cafeteria 1"), RestaurantVariant::Weekdays)
            .unwrap();
        (store, restaurant.id)
    }

    fn count(store: &SqliteStore, table: &str) -> i64 {
        store
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_restaurant_lookup() {
        let (mut store, id) = seeded();
        assert_eq!(store.find_restaurant_by_name("제1학생식당").unwrap().unwrap().id, id);
        assert_eq!(
            store.find_restaurant_by_name("Student Cafeteria 1").unwrap().unwrap().id,
            id
        );
        assert!(store.find_restaurant_by_name("없는식당").unwrap().is_none());
        assert!(store
            .find_restaurant_by_variant(RestaurantVariant::FullWeek)
            .unwrap()
            .is_none());

        let again = store
            .add_restaurant("제1학생식당", None, RestaurantVariant::FullWeek)
            .unwrap();
        assert_eq!(again, Resolved { id, created: false });
        assert_eq!(store.list_restaurants().unwrap().len(), 1);
    }

    #[test]
    fn test_week_and_meal_are_idempotent() {
        let (mut store, restaurant_id) = seeded();
        let monday = ymd(2025, 5, 26);

        let first = store.resolve_or_create_week(restaurant_id, monday).unwrap();
        let second = store.resolve_or_create_week(restaurant_id, monday).unwrap();
        assert!(first.created);
        assert_eq!(second, Resolved { id: first.id, created: false });
        assert_eq!(count(&store, "weeks"), 1);

        let meal = store
            .resolve_or_create_meal(first.id, monday, "Mon", MealType::Lunch2)
            .unwrap();
        let again = store
            .resolve_or_create_meal(first.id, monday, "Mon", MealType::Lunch2)
            .unwrap();
        assert!(meal.created && !again.created);
        assert_eq!(meal.id, again.id);
        assert_eq!(store.find_meal(first.id, monday, MealType::Lunch2).unwrap(), Some(meal.id));
        assert_eq!(store.find_meal(first.id, monday, MealType::Dinner).unwrap(), None);

        let week = store.find_week(restaurant_id, monday).unwrap().unwrap();
        assert_eq!(week.start_date, monday);
        assert_eq!(store.find_week_by_id(week.id).unwrap(), Some(week));
    }

    #[test]
    fn test_upsert_does_not_duplicate() {
        let (mut store, restaurant_id) = seeded();
        let day = ymd(2025, 5, 26);
        let week = store.resolve_or_create_week(restaurant_id, day).unwrap();
        let meal = store
            .resolve_or_create_meal(week.id, day, "Mon", MealType::Breakfast)
            .unwrap();

        let items = vec![MenuEntry::new("밥", "쌀밥"), MenuEntry::new("국", "된장국")];
        assert_eq!(store.upsert_menu_items(meal.id, &items).unwrap(), 2);
        assert_eq!(store.upsert_menu_items(meal.id, &items).unwrap(), 2);
        assert_eq!(count(&store, "menu_items"), 2);

        let stored = store.fetch_menu_items_ordered(meal.id).unwrap();
        let names: Vec<_> = stored.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["쌀밥", "된장국"]);
    }

    #[test]
    fn test_repeated_item_keeps_first_position() {
        let (mut store, restaurant_id) = seeded();
        let day = ymd(2025, 5, 26);
        let week = store.resolve_or_create_week(restaurant_id, day).unwrap();
        let meal = store
            .resolve_or_create_meal(week.id, day, "Mon", MealType::Breakfast)
            .unwrap();

        let items = vec![
            MenuEntry::new("밥", "쌀밥"),
            MenuEntry::new("반찬", "김치"),
            MenuEntry::new("국", "된장국"),
            MenuEntry::new("반찬", "김치"),
            MenuEntry::new("반찬", "멸치볶음"),
        ];
        assert_eq!(store.upsert_menu_items(meal.id, &items).unwrap(), 4);
        assert_eq!(count(&store, "menu_items"), 4);

        let positions: Vec<_> = store
            .fetch_menu_items_ordered(meal.id)
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.position))
            .collect();
        assert_eq!(
            positions,
            vec![
                ("쌀밥".to_string(), 0),
                ("김치".to_string(), 1),
                ("된장국".to_string(), 2),
                ("멸치볶음".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_native_reingest_keeps_translation() {
        let (mut store, restaurant_id) = seeded();
        let day = ymd(2025, 5, 26);
        let week = store.resolve_or_create_week(restaurant_id, day).unwrap();
        let meal = store
            .resolve_or_create_meal(week.id, day, "Mon", MealType::Dinner)
            .unwrap();

        let items = vec![MenuEntry::new("밥", "쌀밥")];
        store.upsert_menu_items(meal.id, &items).unwrap();
        let item = &store.fetch_menu_items_ordered(meal.id).unwrap()[0];
        store.update_menu_item_translation(item.id, "Steamed rice").unwrap();

        let priced = vec![MenuEntry {
            price: 3500.0,
            ..MenuEntry::new("밥", "쌀밥")
        }];
        store.upsert_menu_items(meal.id, &priced).unwrap();

        let item = &store.fetch_menu_items_ordered(meal.id).unwrap()[0];
        assert_eq!(item.name_en, "Steamed rice");
        assert_eq!(item.price, 3500.0);
    }

    #[test]
    fn test_update_missing_item_fails() {
        let (mut store, _) = seeded();
        let err = store.update_menu_item_translation(999, "ghost").unwrap_err();
        assert!(matches!(err, IngestError::UpdateFailed { .. }));
    }

    #[test]
    fn test_open_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .add_restaurant("제2학생식당", None, RestaurantVariant::FullWeek)
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_restaurants().unwrap().len(), 1);
    }
}
