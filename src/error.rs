//! Error taxonomy for ingestion runs
//!
//! Identity errors (source, header fields, restaurant, week) abort a run.
//! Once the week is resolved, any error raised while handling one meal is
//! caught by the engine and turned into a warning on the report.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Cannot read source {path}: {reason}")]
    SourceUnreadable { path: String, reason: String },

    #[error("Required field '{0}' is missing or empty")]
    FieldMissing(String),

    #[error("Invalid date '{value}', expected {expected}")]
    DateFormatInvalid {
        value: String,
        expected: &'static str,
    },

    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(String),

    #[error("No week for restaurant {restaurant_id} covering {date}")]
    WeekNotFound { restaurant_id: i64, date: NaiveDate },

    #[error("Week {0} does not exist")]
    UnknownWeek(i64),

    #[error("Unknown meal type: {0}")]
    UnknownMealType(String),

    #[error("Unknown restaurant variant: {0}")]
    UnknownVariant(String),

    #[error("Failed to insert {what}: {source}")]
    InsertFailed {
        what: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to update {what}: {source}")]
    UpdateFailed {
        what: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Stable machine-readable code used in failure reports
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::SourceUnreadable { .. } => "SOURCE_UNREADABLE",
            IngestError::FieldMissing(_) => "FIELD_MISSING",
            IngestError::DateFormatInvalid { .. } => "DATE_FORMAT_INVALID",
            IngestError::RestaurantNotFound(_) => "RESTAURANT_NOT_FOUND",
            IngestError::WeekNotFound { .. } | IngestError::UnknownWeek(_) => {
                "WEEK_DATA_NOT_FOUND"
            }
            IngestError::UnknownMealType(_) => "UNKNOWN_MEAL_TYPE",
            IngestError::UnknownVariant(_) => "UNKNOWN_RESTAURANT_VARIANT",
            IngestError::InsertFailed { .. } => "INSERT_FAILED",
            IngestError::UpdateFailed { .. } => "UPDATE_FAILED",
            IngestError::Storage(_) => "DB_ERROR",
            IngestError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Serializable failure payload for a run that aborted
#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl From<&IngestError> for FailureReport {
    fn from(error: &IngestError) -> Self {
        FailureReport {
            success: false,
            error: error.to_string(),
            code: error.code().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_report_carries_code() {
        let err = IngestError::RestaurantNotFound("제2학생식당".into());
        let report = FailureReport::from(&err);
        assert!(!report.success);
        assert_eq!(report.code, "RESTAURANT_NOT_FOUND");
        assert!(report.error.contains("제2학생식당"));
    }

    #[test]
    fn test_week_codes_shared() {
        let by_id = IngestError::UnknownWeek(7);
        let by_date = IngestError::WeekNotFound {
            restaurant_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 5, 26).unwrap(),
        };
        assert_eq!(by_id.code(), by_date.code());
    }
}
