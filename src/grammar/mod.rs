//! Grammar normalizer: raw slot strings to `(category, name)` entries

pub mod templates;

pub use templates::*;

use crate::model::{MealType, MenuEntry};

/// How the raw strings of a source carry their categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// Bare item names; the category comes from the item's position
    Positional,
    /// `category: name` lines
    Labeled,
}

/// Normalize one meal slot's raw strings according to the source grammar
pub fn normalize(
    grammar: Grammar,
    raw: &[String],
    meal: MealType,
    templates: &CategoryTemplates,
) -> Vec<MenuEntry> {
    match grammar {
        Grammar::Positional => categorize(raw, meal, templates),
        Grammar::Labeled => parse_labeled(raw, &templates.catch_all),
    }
}

/// Assign categories by position. Never drops an item: the output has
/// exactly one entry per input string.
pub fn categorize(raw: &[String], meal: MealType, templates: &CategoryTemplates) -> Vec<MenuEntry> {
    raw.iter()
        .enumerate()
        .map(|(idx, name)| MenuEntry::new(templates.category_at(meal, idx), name.trim()))
        .collect()
}

/// Parse `label: value` lines. The line is split on its first colon; lines
/// without a colon or with an empty value are dropped. A blank label gets
/// the catch-all category.
pub fn parse_labeled(raw: &[String], catch_all: &str) -> Vec<MenuEntry> {
    raw.iter()
        .filter_map(|line| {
            let (label, value) = line.split_once(':')?;
            let name = value.trim();
            if name.is_empty() {
                return None;
            }
            let label = label.trim();
            let category = if label.is_empty() { catch_all } else { label };
            Some(MenuEntry::new(category, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pairs(entries: &[MenuEntry]) -> Vec<(&str, &str)> {
        entries
            .iter()
            .map(|e| (e.category.as_str(), e.name.as_str()))
            .collect()
    }

    #[test]
    fn test_breakfast_categories() {
        let raw = strings(&["쌀밥", "된장국", "김치", "계란후라이"]);
        let entries = categorize(&raw, MealType::Breakfast, &CategoryTemplates::default());
        assert_eq!(
            pairs(&entries),
            vec![
                ("밥", "쌀밥"),
                ("국", "된장국"),
                ("반찬", "김치"),
                ("메인메뉴", "계란후라이"),
            ]
        );
    }

    #[test]
    fn test_categorize_keeps_every_item() {
        let templates = CategoryTemplates::default();
        let raw: Vec<String> = (0..12).map(|i| format!("item{}", i)).collect();

        for meal in MealType::ALL {
            let template_len = templates.categories(meal).len();
            for n in 0..=raw.len() {
                let entries = categorize(&raw[..n], meal, &templates);
                assert_eq!(entries.len(), n, "{} with {} items", meal, n);
                for (i, entry) in entries.iter().enumerate() {
                    let is_catch_all = entry.category == templates.catch_all;
                    assert_eq!(is_catch_all, i >= template_len, "{} position {}", meal, i);
                }
            }
        }
    }

    #[test]
    fn test_parse_labeled() {
        let raw = strings(&[
            "밥: 쌀밥",
            "국 :  미역국 ",
            "그냥 텍스트",
            "반찬:",
            ": 깍두기",
            "음료: 식혜: 캔",
        ]);
        let entries = parse_labeled(&raw, CATCH_ALL_CATEGORY);
        assert_eq!(
            pairs(&entries),
            vec![
                ("밥", "쌀밥"),
                ("국", "미역국"),
                ("기타", "깍두기"),
                ("음료", "식혜: 캔"),
            ]
        );
    }

    #[test]
    fn test_normalize_dispatch() {
        let templates = CategoryTemplates::default();
        let raw = strings(&["메인메뉴: 제육볶음"]);
        let labeled = normalize(Grammar::Labeled, &raw, MealType::Lunch1, &templates);
        assert_eq!(pairs(&labeled), vec![("메인메뉴", "제육볶음")]);

        let positional = normalize(Grammar::Positional, &raw, MealType::Lunch1, &templates);
        assert_eq!(positional[0].name, "메인메뉴: 제육볶음");
    }
}
