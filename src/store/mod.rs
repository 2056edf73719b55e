pub mod query;
pub mod schema;
pub mod sqlite;

pub use query::*;
pub use schema::*;
pub use sqlite::*;

use chrono::NaiveDate;

use crate::error::Result;
use crate::model::{MealType, MenuEntry, Resolved, Restaurant, RestaurantVariant, StoredMenuItem, Week};

/// Storage operations the reconciliation engine relies on.
///
/// Natural keys are enforced by the store: (restaurant, start_date) for
/// weeks, (week, date, meal_type) for meals and (meal, category, name) for
/// menu items. The `resolve_or_create_*` calls must be atomic so that two
/// concurrent runs converge on one row.
pub trait MenuStore {
    fn find_restaurant_by_name(&self, name: &str) -> Result<Option<Restaurant>>;

    fn find_restaurant_by_variant(&self, variant: RestaurantVariant) -> Result<Option<Restaurant>>;

    fn find_restaurant_by_id(&self, id: i64) -> Result<Option<Restaurant>>;

    fn find_week(&self, restaurant_id: i64, start_date: NaiveDate) -> Result<Option<Week>>;

    fn find_week_by_id(&self, week_id: i64) -> Result<Option<Week>>;

    fn resolve_or_create_week(&mut self, restaurant_id: i64, start_date: NaiveDate) -> Result<Resolved>;

    fn find_meal(&self, week_id: i64, date: NaiveDate, meal_type: MealType) -> Result<Option<i64>>;

    fn resolve_or_create_meal(
        &mut self,
        week_id: i64,
        date: NaiveDate,
        day_of_week: &str,
        meal_type: MealType,
    ) -> Result<Resolved>;

    /// Write one meal's items in a single transaction. A collision on
    /// (meal, category, name) updates the existing row. Each item's position
    /// is its index in `items`; a repeat within `items` is written once.
    /// Returns rows written.
    fn upsert_menu_items(&mut self, meal_id: i64, items: &[MenuEntry]) -> Result<usize>;

    /// Items of a meal in the order they were first enumerated
    fn fetch_menu_items_ordered(&self, meal_id: i64) -> Result<Vec<StoredMenuItem>>;

    fn update_menu_item_translation(&mut self, item_id: i64, name_en: &str) -> Result<()>;
}
