//! Layout readers: pull raw labeled values out of a weekly menu source
//!
//! Two source shapes are supported:
//! - spreadsheet workbooks addressed by fixed cell coordinates
//! - plain-text payloads addressed by section labels
//!
//! Both hand the engine the same things through [`MenuSource`]: the restaurant
//! key, the week anchor date, the ordered day columns and each slot's raw
//! strings.

pub mod date;
pub mod sheet;
pub mod text;

pub use sheet::{CellRef, Grid, SheetDocument};
pub use text::{TextDocument, DAY_LABELS};

use chrono::NaiveDate;

use crate::error::Result;
use crate::grammar::Grammar;
use crate::model::{DateColumn, MealType, RestaurantVariant};

/// Fixed header values every source carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    RestaurantName,
    WeekAnchor,
}

/// How a source identifies its restaurant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestaurantKey {
    Name(String),
    Variant(RestaurantVariant),
}

pub trait MenuSource {
    /// Grammar of the strings returned by [`MenuSource::slot_raw_text`]
    fn grammar(&self) -> Grammar;

    fn restaurant_key(&self) -> Result<RestaurantKey>;

    fn week_anchor_date(&self) -> Result<NaiveDate>;

    /// Ordered day columns for the variant. Columns that are empty or
    /// unparseable are skipped, never reported as errors.
    fn date_columns(&self, variant: RestaurantVariant, anchor: NaiveDate) -> Vec<DateColumn>;

    /// Non-empty raw strings of one meal slot, in source order. `None` means
    /// the source has no data at all for the column's day.
    fn slot_raw_text(&self, column: &DateColumn, meal: MealType) -> Option<Vec<String>>;
}
