//! Reconciliation engine
//!
//! The native pass resolves the restaurant, resolves or creates the week,
//! then walks every day column and meal slot writing meals and their items.
//! The translation pass finds the same week and meals and patches English
//! names onto the stored items by position.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::grammar::{normalize, CategoryTemplates};
use crate::layout::{MenuSource, RestaurantKey};
use crate::model::{DateColumn, MealType, Restaurant, RestaurantVariant, Week};
use crate::store::MenuStore;
use crate::summary::{summarize, RunEvent, RunLog, Warning, WarningKind};
use crate::ui::{Phase, Ui};

/// Caller-facing result of a run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub restaurant_id: i64,
    pub restaurant_variant: RestaurantVariant,
    pub week_id: i64,
    pub week_start_date: NaiveDate,
    pub week_created: bool,
    pub total_days: usize,
    pub total_meals: usize,
    pub total_menu_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patched_items: Option<usize>,
    pub message: String,
    pub warnings: Vec<Warning>,
}

/// Which week a translation pass patches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekTarget {
    Id(i64),
    /// Restaurant and start date read from the source header
    FromSource,
}

/// Result of aligning translated names onto one meal's items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub patched: usize,
    pub existing: usize,
    /// Length of the native slot the items came from; larger than
    /// `existing` when the slot repeated an item
    pub span: usize,
    pub incoming: usize,
}

impl PatchOutcome {
    pub fn is_aligned(&self) -> bool {
        self.span == self.incoming
    }
}

pub struct Reconciler<'a, S: MenuStore, U: Ui> {
    store: &'a mut S,
    templates: &'a CategoryTemplates,
    ui: &'a mut U,
}

impl<'a, S: MenuStore, U: Ui> Reconciler<'a, S, U> {
    pub fn new(store: &'a mut S, templates: &'a CategoryTemplates, ui: &'a mut U) -> Self {
        Self {
            store,
            templates,
            ui,
        }
    }

    /// Lookup only; restaurants are reference data and never created here
    pub fn resolve_restaurant(&self, key: &RestaurantKey) -> Result<Restaurant> {
        let found = match key {
            RestaurantKey::Name(name) => self.store.find_restaurant_by_name(name)?,
            RestaurantKey::Variant(variant) => self.store.find_restaurant_by_variant(*variant)?,
        };
        found.ok_or_else(|| {
            IngestError::RestaurantNotFound(match key {
                RestaurantKey::Name(name) => name.clone(),
                RestaurantKey::Variant(variant) => variant.to_string(),
            })
        })
    }

    fn source_restaurant<M: MenuSource>(
        &self,
        source: &M,
        variant_override: Option<RestaurantVariant>,
    ) -> Result<Restaurant> {
        let key = match variant_override {
            Some(variant) => RestaurantKey::Variant(variant),
            None => source.restaurant_key()?,
        };
        self.resolve_restaurant(&key)
    }

    /// Open the run's source while the dashboard shows the reading phase
    pub fn read<M>(&mut self, open: impl FnOnce() -> Result<M>) -> Result<M> {
        self.ui.set_phase(Phase::Reading);
        open()
    }

    /// Native pass: write every meal of the source's week
    pub fn ingest<M: MenuSource>(
        &mut self,
        source: &M,
        variant_override: Option<RestaurantVariant>,
    ) -> Result<IngestReport> {
        self.ui.set_phase(Phase::Resolving);
        let restaurant = self.source_restaurant(source, variant_override)?;
        let anchor = source.week_anchor_date()?;
        let week = self.store.resolve_or_create_week(restaurant.id, anchor)?;

        info!(
            restaurant = %restaurant.name,
            week_id = week.id,
            created = week.created,
            "Week of {}",
            anchor
        );
        self.ui
            .set_info(format!("{} / week of {}", restaurant.name, anchor));

        let columns = source.date_columns(restaurant.variant, anchor);
        let mut log = RunLog::default();

        self.ui.set_phase(Phase::Reconciling);
        'days: for (idx, column) in columns.iter().enumerate() {
            self.ui
                .set_progress(idx as u64 + 1, columns.len() as u64, &column.day_label);

            for meal in MealType::ALL {
                let Some(raw) = source.slot_raw_text(column, meal) else {
                    self.day_missing(column, &mut log);
                    continue 'days;
                };
                let entries = normalize(source.grammar(), &raw, meal, self.templates);
                debug!(date = %column.date, %meal, items = entries.len(), "Slot normalized");

                let resolved = match self.store.resolve_or_create_meal(
                    week.id,
                    column.date,
                    &column.day_label,
                    meal,
                ) {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        self.skip_row(err, WarningKind::InsertFailed, column.date, meal, &mut log);
                        continue;
                    }
                };
                log.record(RunEvent::MealResolved {
                    meal_id: resolved.id,
                    date: column.date,
                    meal_type: meal,
                    created: resolved.created,
                });

                // an empty slot still gets its meal row
                if entries.is_empty() {
                    continue;
                }
                match self.store.upsert_menu_items(resolved.id, &entries) {
                    Ok(count) => log.record(RunEvent::ItemsWritten {
                        meal_id: resolved.id,
                        count,
                    }),
                    Err(err) => {
                        self.skip_row(err, WarningKind::InsertFailed, column.date, meal, &mut log)
                    }
                }
            }
        }

        let summary = summarize(&log);
        let message = format!(
            "Stored {} meals with {} menu items over {} days for the week of {}",
            summary.total_meals, summary.total_menu_items, summary.total_days, anchor
        );
        info!(meals_created = log.meals_created(), "{}", message);
        self.finish(&message);

        Ok(IngestReport {
            success: true,
            restaurant_id: restaurant.id,
            restaurant_variant: restaurant.variant,
            week_id: week.id,
            week_start_date: anchor,
            week_created: week.created,
            total_days: summary.total_days,
            total_meals: summary.total_meals,
            total_menu_items: summary.total_menu_items,
            patched_items: None,
            message,
            warnings: log.into_warnings(),
        })
    }

    /// Translation pass: patch English names onto an ingested week. Weeks
    /// and meals are looked up, never created.
    pub fn translate<M: MenuSource>(
        &mut self,
        source: &M,
        target: WeekTarget,
    ) -> Result<IngestReport> {
        self.ui.set_phase(Phase::Resolving);
        let (restaurant, week) = self.target_week(source, target)?;

        info!(restaurant = %restaurant.name, week_id = week.id, "Translating week of {}", week.start_date);
        self.ui
            .set_info(format!("{} / week of {} (English)", restaurant.name, week.start_date));

        let columns = source.date_columns(restaurant.variant, week.start_date);
        let mut log = RunLog::default();
        let mut patched_total = 0;

        self.ui.set_phase(Phase::Translating);
        'days: for (idx, column) in columns.iter().enumerate() {
            self.ui
                .set_progress(idx as u64 + 1, columns.len() as u64, &column.day_label);

            for meal in MealType::ALL {
                let Some(raw) = source.slot_raw_text(column, meal) else {
                    self.day_missing(column, &mut log);
                    continue 'days;
                };
                let names: Vec<String> = normalize(source.grammar(), &raw, meal, self.templates)
                    .into_iter()
                    .map(|entry| entry.name)
                    .collect();

                let found = match self.store.find_meal(week.id, column.date, meal) {
                    Ok(found) => found,
                    Err(err) => {
                        self.skip_row(err, WarningKind::UpdateFailed, column.date, meal, &mut log);
                        continue;
                    }
                };
                let Some(meal_id) = found else {
                    if !names.is_empty() {
                        let message = format!("No {} meal stored for {}", meal, column.date);
                        warn!("{}", message);
                        self.ui.warn(&message);
                        log.warn(
                            Warning::new(WarningKind::MealMissing, message)
                                .at(column.date, Some(meal)),
                        );
                    }
                    continue;
                };
                log.record(RunEvent::MealResolved {
                    meal_id,
                    date: column.date,
                    meal_type: meal,
                    created: false,
                });

                let outcome = match self.patch_translations(meal_id, &names, &mut log) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        self.skip_row(err, WarningKind::UpdateFailed, column.date, meal, &mut log);
                        continue;
                    }
                };
                patched_total += outcome.patched;
                log.record(RunEvent::ItemsPatched {
                    meal_id,
                    count: outcome.patched,
                });

                if !outcome.is_aligned() {
                    let message = format!(
                        "{} {}: {} native names, {} translated names",
                        column.date, meal, outcome.span, outcome.incoming
                    );
                    warn!("Alignment mismatch on {}", message);
                    self.ui.warn(&message);
                    log.warn(
                        Warning::new(WarningKind::AlignmentMismatch, message)
                            .at(column.date, Some(meal)),
                    );
                }
            }
        }

        let summary = summarize(&log);
        let message = format!(
            "Patched {} translations across {} meals for the week of {}",
            patched_total, summary.total_meals, week.start_date
        );
        info!("{}", message);
        self.finish(&message);

        Ok(IngestReport {
            success: true,
            restaurant_id: restaurant.id,
            restaurant_variant: restaurant.variant,
            week_id: week.id,
            week_start_date: week.start_date,
            week_created: false,
            total_days: summary.total_days,
            total_meals: summary.total_meals,
            total_menu_items: summary.total_menu_items,
            patched_items: Some(patched_total),
            message,
            warnings: log.into_warnings(),
        })
    }

    /// Write `names[p]` onto the stored item at slot position `p`. Items
    /// past the end of `names` and names with no item are left alone. A
    /// failed item update is recorded and skipped.
    pub fn patch_translations(
        &mut self,
        meal_id: i64,
        names: &[String],
        log: &mut RunLog,
    ) -> Result<PatchOutcome> {
        let items = self.store.fetch_menu_items_ordered(meal_id)?;
        let mut patched = 0;

        for item in &items {
            let slot = usize::try_from(item.position).ok();
            let Some(name) = slot.and_then(|p| names.get(p)) else {
                continue;
            };
            match self.store.update_menu_item_translation(item.id, name) {
                Ok(()) => patched += 1,
                Err(err) => {
                    warn!(item_id = item.id, "Skipping translation: {}", err);
                    self.ui.warn(err.to_string());
                    log.warn(Warning::from_error(&err, WarningKind::UpdateFailed));
                }
            }
        }

        let span = items
            .iter()
            .map(|item| usize::try_from(item.position).map_or(0, |p| p + 1))
            .max()
            .unwrap_or(0);

        Ok(PatchOutcome {
            patched,
            existing: items.len(),
            span,
            incoming: names.len(),
        })
    }

    fn target_week<M: MenuSource>(
        &self,
        source: &M,
        target: WeekTarget,
    ) -> Result<(Restaurant, Week)> {
        match target {
            WeekTarget::Id(week_id) => {
                let week = self
                    .store
                    .find_week_by_id(week_id)?
                    .ok_or(IngestError::UnknownWeek(week_id))?;
                let restaurant = self
                    .store
                    .find_restaurant_by_id(week.restaurant_id)?
                    .ok_or_else(|| IngestError::RestaurantNotFound(week.restaurant_id.to_string()))?;
                Ok((restaurant, week))
            }
            WeekTarget::FromSource => {
                let restaurant = self.resolve_restaurant(&source.restaurant_key()?)?;
                let anchor = source.week_anchor_date()?;
                let week = self.store.find_week(restaurant.id, anchor)?.ok_or(
                    IngestError::WeekNotFound {
                        restaurant_id: restaurant.id,
                        date: anchor,
                    },
                )?;
                Ok((restaurant, week))
            }
        }
    }

    fn day_missing(&mut self, column: &DateColumn, log: &mut RunLog) {
        let message = format!("No section for {} ({})", column.day_label, column.date);
        info!("{}, skipping", message);
        self.ui.log(&message);
        log.warn(Warning::new(WarningKind::DayMissing, message).at(column.date, None));
    }

    /// Record a failure inside one meal and move on to the next
    fn skip_row(
        &mut self,
        err: IngestError,
        fallback: WarningKind,
        date: NaiveDate,
        meal: MealType,
        log: &mut RunLog,
    ) {
        warn!(%date, %meal, "Skipping row: {}", err);
        self.ui.warn(format!("{} {}: {}", date, meal, err));
        log.warn(Warning::from_error(&err, fallback).at(date, Some(meal)));
    }

    fn finish(&mut self, message: &str) {
        self.ui.clear_progress();
        self.ui.log(message);
        self.ui.set_phase(Phase::Complete);
    }
}
