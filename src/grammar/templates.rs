//! Per-meal category templates
//!
//! Spreadsheet cells carry no category labels, so the category of an item is
//! decided by its position inside the meal's row window. The table lives here,
//! versioned, instead of being spread across the parser.

use serde::{Deserialize, Serialize};

use crate::model::MealType;

pub const CATCH_ALL_CATEGORY: &str = "기타";

const RICE: &str = "밥";
const SOUP: &str = "국";
const SIDE: &str = "반찬";
const MAIN: &str = "메인메뉴";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTemplates {
    /// Bumped whenever the cafeteria changes its sheet layout
    pub version: u32,
    pub catch_all: String,
    pub breakfast: Vec<String>,
    pub lunch_1: Vec<String>,
    pub lunch_2: Vec<String>,
    pub dinner: Vec<String>,
}

impl Default for CategoryTemplates {
    fn default() -> Self {
        let owned = |labels: &[&str]| labels.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            version: 1,
            catch_all: CATCH_ALL_CATEGORY.to_string(),
            breakfast: owned(&[RICE, SOUP, SIDE, MAIN, SIDE, SIDE, SIDE, SIDE, SIDE]),
            lunch_1: owned(&[MAIN]),
            lunch_2: owned(&[RICE, SOUP, MAIN, MAIN, SIDE, SIDE]),
            dinner: owned(&[RICE, SOUP, MAIN, MAIN, SIDE, SIDE]),
        }
    }
}

impl CategoryTemplates {
    pub fn categories(&self, meal: MealType) -> &[String] {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch1 => &self.lunch_1,
            MealType::Lunch2 => &self.lunch_2,
            MealType::Dinner => &self.dinner,
        }
    }

    /// Category for the item at `position`, falling back to the catch-all
    pub fn category_at(&self, meal: MealType, position: usize) -> &str {
        self.categories(meal)
            .get(position)
            .map(String::as_str)
            .unwrap_or(&self.catch_all)
    }

    /// Rejects blank labels; categories are free text but never empty
    pub fn validate(&self) -> Result<(), String> {
        if self.catch_all.trim().is_empty() {
            return Err("templates.catch_all must not be empty".to_string());
        }
        for meal in MealType::ALL {
            if let Some(pos) = self.categories(meal).iter().position(|c| c.trim().is_empty()) {
                return Err(format!(
                    "template v{} for {} has an empty category at position {}",
                    self.version, meal, pos
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_templates() {
        let t = CategoryTemplates::default();
        assert_eq!(t.categories(MealType::Breakfast).len(), 9);
        assert_eq!(t.categories(MealType::Lunch1), &["메인메뉴".to_string()]);
        assert_eq!(t.category_at(MealType::Dinner, 2), "메인메뉴");
        assert_eq!(t.category_at(MealType::Lunch1, 1), CATCH_ALL_CATEGORY);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_partial_override_from_toml() {
        let t: CategoryTemplates = toml::from_str(
            r#"
            version = 2
            lunch_1 = ["일품", "샐러드"]
            "#,
        )
        .unwrap();
        assert_eq!(t.version, 2);
        assert_eq!(t.category_at(MealType::Lunch1, 1), "샐러드");
        // untouched meals keep the built-in lists
        assert_eq!(t.category_at(MealType::Breakfast, 0), "밥");
    }

    #[test]
    fn test_validate_rejects_blank() {
        let t = CategoryTemplates {
            dinner: vec!["밥".into(), "  ".into()],
            ..Default::default()
        };
        let err = t.validate().unwrap_err();
        assert!(err.contains("Dinner"));
    }
}
