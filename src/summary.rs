//! Run bookkeeping and the counting shared with the read path

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::IngestError;
use crate::model::MealType;

/// Something that happened during a run and counts toward its totals
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    MealResolved {
        meal_id: i64,
        date: NaiveDate,
        meal_type: MealType,
        created: bool,
    },
    ItemsWritten {
        meal_id: i64,
        count: usize,
    },
    ItemsPatched {
        meal_id: i64,
        count: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    /// The source carries no section for a day of the week
    DayMissing,
    /// Translation targets a meal that was never ingested
    MealMissing,
    InsertFailed,
    UpdateFailed,
    /// Native and translated item lists differ in length
    AlignmentMismatch,
}

/// A non-fatal problem reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            date: None,
            meal_type: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, date: NaiveDate, meal_type: Option<MealType>) -> Self {
        self.date = Some(date);
        self.meal_type = meal_type;
        self
    }

    /// Warning for a store error raised inside one meal. Errors without a
    /// write of their own (a failed lookup, a lost transaction) take
    /// `fallback`.
    pub fn from_error(error: &IngestError, fallback: WarningKind) -> Self {
        let kind = match error {
            IngestError::InsertFailed { .. } => WarningKind::InsertFailed,
            IngestError::UpdateFailed { .. } => WarningKind::UpdateFailed,
            _ => fallback,
        };
        Self::new(kind, error.to_string())
    }
}

#[derive(Debug, Default)]
pub struct RunLog {
    events: Vec<RunEvent>,
    warnings: Vec<Warning>,
}

impl RunLog {
    pub fn record(&mut self, event: RunEvent) {
        self.events.push(event);
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub fn meals_created(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, RunEvent::MealResolved { created: true, .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_days: usize,
    pub total_meals: usize,
    pub total_menu_items: usize,
}

/// Counts days, meals and items as they are seen
#[derive(Debug, Default)]
pub struct Tally {
    dates: BTreeSet<NaiveDate>,
    meals: usize,
    items: usize,
}

impl Tally {
    pub fn meal(&mut self, date: NaiveDate) {
        self.dates.insert(date);
        self.meals += 1;
    }

    pub fn items(&mut self, count: usize) {
        self.items += count;
    }

    pub fn finish(self) -> RunSummary {
        RunSummary {
            total_days: self.dates.len(),
            total_meals: self.meals,
            total_menu_items: self.items,
        }
    }
}

/// Totals of a run: distinct dates with at least one meal, meals resolved
/// or created, and item rows written, updated or patched
pub fn summarize(log: &RunLog) -> RunSummary {
    let mut tally = Tally::default();
    for event in log.events() {
        match event {
            RunEvent::MealResolved { date, .. } => tally.meal(*date),
            RunEvent::ItemsWritten { count, .. } | RunEvent::ItemsPatched { count, .. } => {
                tally.items(*count)
            }
        }
    }
    tally.finish()
}
