use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::grammar::CategoryTemplates;
use crate::model::{MealType, RestaurantVariant};

const APP_NAME: &str = "menu-ingest";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_DB_FILE: &str = "menu.db";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub layout: LayoutConfig,
    pub templates: CategoryTemplates,
    pub restaurants: Vec<RestaurantSeed>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Fixed cell layout of the weekly menu workbook
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LayoutConfig {
    /// Sheet to read; the first non-empty sheet when unset
    pub sheet: Option<String>,
    pub restaurant_cell: String,
    pub anchor_cell: String,
    /// 1-based row holding the "Mon 5/26" day headers
    pub header_row: u32,
    pub weekday_columns: Vec<String>,
    pub weekend_columns: Vec<String>,
    /// Year applied to "M/D" headers. When unset, the nearest year whose
    /// calendar matches the header's day name is used.
    pub anchor_year: Option<i32>,
    pub slots: SlotRows,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let owned = |cols: &[&str]| cols.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            sheet: None,
            restaurant_cell: "D2".to_string(),
            anchor_cell: "D6".to_string(),
            header_row: 6,
            weekday_columns: owned(&["D", "E", "F", "G", "H"]),
            weekend_columns: owned(&["I", "J"]),
            anchor_year: None,
            slots: SlotRows::default(),
        }
    }
}

impl LayoutConfig {
    pub fn columns_for(&self, variant: RestaurantVariant) -> Vec<String> {
        let mut cols = self.weekday_columns.clone();
        if variant == RestaurantVariant::FullWeek {
            cols.extend(self.weekend_columns.iter().cloned());
        }
        cols
    }
}

/// Inclusive 1-based row window, written `[start, end]` in TOML
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "[u32; 2]")]
pub struct RowWindow {
    pub start: u32,
    pub end: u32,
}

impl From<[u32; 2]> for RowWindow {
    fn from([start, end]: [u32; 2]) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SlotRows {
    pub breakfast: RowWindow,
    pub lunch_1: RowWindow,
    pub lunch_2: RowWindow,
    pub dinner: RowWindow,
}

impl Default for SlotRows {
    fn default() -> Self {
        Self {
            breakfast: [7, 16].into(),
            lunch_1: [18, 18].into(),
            lunch_2: [21, 26].into(),
            dinner: [27, 32].into(),
        }
    }
}

impl SlotRows {
    pub fn window(&self, meal: MealType) -> RowWindow {
        match meal {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch1 => self.lunch_1,
            MealType::Lunch2 => self.lunch_2,
            MealType::Dinner => self.dinner,
        }
    }
}

/// Reference restaurant applied by `init`
#[derive(Debug, Deserialize, Clone)]
pub struct RestaurantSeed {
    pub name: String,
    pub name_en: Option<String>,
    pub variant: RestaurantVariant,
}

impl Config {
    /// Load from an explicit path, else the per-user config file if it
    /// exists, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {:?}", path))?;
                Self::from_toml(&content)
                    .with_context(|| format!("Failed to parse config file {:?}", path))?
            }
            None => Config::default(),
        };

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        config.templates.validate().map_err(|e| anyhow!(e))?;
        for meal in MealType::ALL {
            let window = config.layout.slots.window(meal);
            if window.start == 0 || window.start > window.end {
                return Err(anyhow!(
                    "Invalid row window [{}, {}] for {}",
                    window.start,
                    window.end,
                    meal
                ));
            }
        }
        Ok(config)
    }

    /// Database path: CLI flag, then config file, then the per-user data dir
    pub fn database_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_override {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        let dirs = project_dirs().context("Could not determine data directory")?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        Ok(data_dir.join(DEFAULT_DB_FILE))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.layout.restaurant_cell, "D2");
        assert_eq!(config.layout.slots.window(MealType::Lunch2), RowWindow { start: 21, end: 26 });
        assert_eq!(config.templates, CategoryTemplates::default());
        assert!(config.restaurants.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [database]
            path = "/tmp/menu.db"

            [layout]
            sheet = "12"
            anchor_year = 2025

            [layout.slots]
            dinner = [28, 33]

            [[restaurants]]
            name = "제1학생식당"
            name_en = "Student Cafeteria 1"
            variant = "RESTAURANT_1"
            "#,
        )
        .unwrap();

        assert_eq!(config.layout.sheet.as_deref(), Some("12"));
        assert_eq!(config.layout.anchor_year, Some(2025));
        assert_eq!(config.layout.slots.dinner, RowWindow { start: 28, end: 33 });
        assert_eq!(config.layout.slots.breakfast, RowWindow { start: 7, end: 16 });
        assert_eq!(config.restaurants[0].variant, RestaurantVariant::Weekdays);
        assert_eq!(
            config.database_path(None).unwrap(),
            PathBuf::from("/tmp/menu.db")
        );
    }

    #[test]
    fn test_columns_for_variant() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.columns_for(RestaurantVariant::Weekdays).len(), 5);
        assert_eq!(
            layout.columns_for(RestaurantVariant::FullWeek),
            vec!["D", "E", "F", "G", "H", "I", "J"]
        );
    }

    #[test]
    fn test_rejects_inverted_window() {
        let err = Config::from_toml("[layout.slots]\nbreakfast = [16, 7]\n").unwrap_err();
        assert!(err.to_string().contains("Breakfast"));
    }
}
