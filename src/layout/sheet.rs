use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Duration, Local, NaiveDate};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::date::{parse_anchor, parse_column_header};
use super::{HeaderField, MenuSource, RestaurantKey};
use crate::config::LayoutConfig;
use crate::error::{IngestError, Result};
use crate::grammar::Grammar;
use crate::model::{DateColumn, MealType, RestaurantVariant};

/// Zero-based cell coordinate, written "D6" in A1 notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    /// Column letters plus a 1-based row number
    pub fn at(column: &str, row: u32) -> Option<Self> {
        if row == 0 {
            return None;
        }
        Some(Self {
            row: row - 1,
            col: column_index(column)?,
        })
    }
}

impl FromStr for CellRef {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("Invalid cell reference: {}", s))?;
        let (letters, digits) = s.split_at(split);
        let row: u32 = digits
            .parse()
            .map_err(|_| format!("Invalid cell reference: {}", s))?;
        CellRef::at(letters, row).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut letters = Vec::new();
        let mut n = self.col + 1;
        while n > 0 {
            let rem = (n - 1) % 26;
            letters.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        letters.reverse();
        write!(f, "{}{}", letters.into_iter().collect::<String>(), self.row + 1)
    }
}

/// "A" -> 0, "Z" -> 25, "AA" -> 26
fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        acc.checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
    })
    .map(|n| n - 1)
}

/// Sparse text view of one worksheet
#[derive(Debug, Clone, Default)]
pub struct Grid {
    cells: HashMap<CellRef, String>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a worksheet range, keyed by absolute sheet coordinates
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut grid = Grid::new();
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        for (row, col, data) in range.used_cells() {
            let at = CellRef {
                row: start_row + row as u32,
                col: start_col + col as u32,
            };
            grid.set(at, cell_text(data));
        }

        grid
    }

    pub fn set(&mut self, at: CellRef, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.cells.remove(&at);
        } else {
            self.cells.insert(at, value);
        }
    }

    /// Trimmed cell text; empty when the cell is absent
    pub fn cell(&self, at: CellRef) -> &str {
        self.cells.get(&at).map(|s| s.trim()).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Render a cell as text. Date cells become ISO dates so the header parser
/// handles them like typed labels.
fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| data.to_string()),
        Data::DateTimeIso(s) => s.chars().take(10).collect(),
        other => other.to_string(),
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    if !serial.is_finite() {
        return None;
    }
    epoch.checked_add_signed(Duration::try_days(serial.trunc() as i64)?)
}

/// A weekly menu workbook opened on a single sheet
pub struct SheetDocument {
    grid: Grid,
    sheet_name: String,
    layout: LayoutConfig,
}

impl SheetDocument {
    /// Open a workbook and select the configured sheet, or the first sheet
    /// holding any non-blank cell
    pub fn open(path: &Path, layout: &LayoutConfig) -> Result<Self> {
        let unreadable = |reason: String| IngestError::SourceUnreadable {
            path: path.display().to_string(),
            reason,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;

        let (sheet_name, grid) = match &layout.sheet {
            Some(name) => {
                let range = workbook
                    .worksheet_range(name)
                    .map_err(|e| unreadable(format!("sheet '{}': {}", name, e)))?;
                (name.clone(), Grid::from_range(&range))
            }
            None => {
                let mut found = None;
                for name in workbook.sheet_names() {
                    let Ok(range) = workbook.worksheet_range(&name) else {
                        continue;
                    };
                    let grid = Grid::from_range(&range);
                    if !grid.is_blank() {
                        found = Some((name, grid));
                        break;
                    }
                }
                found.ok_or_else(|| unreadable("no non-empty sheet found".to_string()))?
            }
        };

        debug!(sheet = %sheet_name, "Opened workbook {:?}", path);
        Ok(Self {
            grid,
            sheet_name,
            layout: layout.clone(),
        })
    }

    pub fn from_grid(grid: Grid, layout: &LayoutConfig) -> Self {
        Self {
            grid,
            sheet_name: String::from("<memory>"),
            layout: layout.clone(),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    fn header_cell(&self, field: HeaderField) -> Result<CellRef> {
        let address = match field {
            HeaderField::RestaurantName => &self.layout.restaurant_cell,
            HeaderField::WeekAnchor => &self.layout.anchor_cell,
        };
        address
            .parse()
            .map_err(|_| IngestError::FieldMissing(address.clone()))
    }

    pub fn read_header_field(&self, field: HeaderField) -> Result<String> {
        let at = self.header_cell(field)?;
        let value = self.grid.cell(at);
        if value.is_empty() {
            return Err(IngestError::FieldMissing(at.to_string()));
        }
        Ok(value.to_string())
    }
}

impl MenuSource for SheetDocument {
    fn grammar(&self) -> Grammar {
        Grammar::Positional
    }

    fn restaurant_key(&self) -> Result<RestaurantKey> {
        self.read_header_field(HeaderField::RestaurantName)
            .map(RestaurantKey::Name)
    }

    fn week_anchor_date(&self) -> Result<NaiveDate> {
        let label = self.read_header_field(HeaderField::WeekAnchor)?;
        let (_, date) = parse_anchor(&label, self.layout.anchor_year, Local::now().date_naive())?;
        Ok(date)
    }

    fn date_columns(&self, variant: RestaurantVariant, anchor: NaiveDate) -> Vec<DateColumn> {
        let mut columns = Vec::new();

        for letter in self.layout.columns_for(variant) {
            let Some(at) = CellRef::at(&letter, self.layout.header_row) else {
                continue;
            };
            let label = self.grid.cell(at);
            if label.is_empty() {
                continue;
            }
            match parse_column_header(label, anchor) {
                Ok((day_label, date)) => columns.push(DateColumn {
                    date,
                    day_label,
                    key: letter,
                }),
                Err(err) => debug!("Skipping column {}: {}", at, err),
            }
        }

        columns
    }

    fn slot_raw_text(&self, column: &DateColumn, meal: MealType) -> Option<Vec<String>> {
        let window = self.layout.slots.window(meal);
        let items = (window.start..=window.end)
            .filter_map(|row| CellRef::at(&column.key, row))
            .map(|at| self.grid.cell(at))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(addr: &str) -> CellRef {
        addr.parse().unwrap()
    }

    fn layout() -> LayoutConfig {
        LayoutConfig {
            anchor_year: Some(2025),
            ..Default::default()
        }
    }

    /// A week of headers in row 6 starting Monday 5/26
    fn week_grid(columns: &[&str]) -> Grid {
        let labels = ["Mon 5/26", "Tue 5/27", "Wed 5/28", "Thu 5/29", "Fri 5/30", "Sat 5/31", "Sun 6/1"];
        let mut grid = Grid::new();
        grid.set(cell("D2"), "제1학생식당");
        for (col, label) in columns.iter().zip(labels) {
            grid.set(CellRef::at(col, 6).unwrap(), label);
        }
        grid
    }

    #[test]
    fn test_cell_ref_roundtrip() {
        assert_eq!(cell("D6"), CellRef { row: 5, col: 3 });
        assert_eq!(cell("AA10"), CellRef { row: 9, col: 26 });
        assert_eq!(cell("AA10").to_string(), "AA10");
        assert!("6D".parse::<CellRef>().is_err());
        assert!("D0".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_cell_ref_too_wide() {
        assert_eq!(cell("MWLQKWU1").to_string(), "MWLQKWU1");
        assert!("MWLQKWV1".parse::<CellRef>().is_err());
        assert!("ABCDEFGHIJ1".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_header_fields() {
        let doc = SheetDocument::from_grid(week_grid(&["D"]), &layout());
        assert_eq!(
            doc.restaurant_key().unwrap(),
            RestaurantKey::Name("제1학생식당".into())
        );
        assert_eq!(
            doc.week_anchor_date().unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 26).unwrap()
        );
    }

    #[test]
    fn test_missing_header() {
        let doc = SheetDocument::from_grid(Grid::new(), &layout());
        match doc.read_header_field(HeaderField::RestaurantName) {
            Err(IngestError::FieldMissing(field)) => assert_eq!(field, "D2"),
            other => panic!("expected FieldMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_date_columns_by_variant() {
        let all = ["D", "E", "F", "G", "H", "I", "J"];
        let doc = SheetDocument::from_grid(week_grid(&all), &layout());
        let anchor = doc.week_anchor_date().unwrap();

        let weekdays = doc.date_columns(RestaurantVariant::Weekdays, anchor);
        assert_eq!(weekdays.len(), 5);
        assert_eq!(weekdays[4].key, "H");
        assert_eq!(weekdays[4].day_label, "Fri");

        let full = doc.date_columns(RestaurantVariant::FullWeek, anchor);
        assert_eq!(full.len(), 7);
        assert_eq!(full[6].date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn test_empty_columns_skipped() {
        let mut grid = week_grid(&["D", "E", "F"]);
        grid.set(cell("G6"), "holiday");
        let doc = SheetDocument::from_grid(grid, &layout());
        let anchor = doc.week_anchor_date().unwrap();
        let columns = doc.date_columns(RestaurantVariant::Weekdays, anchor);
        let keys: Vec<_> = columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["D", "E", "F"]);
    }

    #[test]
    fn test_slot_raw_text_skips_blank_cells() {
        let mut grid = week_grid(&["D"]);
        grid.set(cell("D7"), " 쌀밥 ");
        grid.set(cell("D9"), "된장국");
        grid.set(cell("D16"), "김치");
        grid.set(cell("D17"), "outside the window");
        grid.set(cell("D18"), "제육덮밥");
        let doc = SheetDocument::from_grid(grid, &layout());
        let column = &doc.date_columns(RestaurantVariant::Weekdays, doc.week_anchor_date().unwrap())[0];

        assert_eq!(
            doc.slot_raw_text(column, MealType::Breakfast).unwrap(),
            vec!["쌀밥", "된장국", "김치"]
        );
        assert_eq!(
            doc.slot_raw_text(column, MealType::Lunch1).unwrap(),
            vec!["제육덮밥"]
        );
        assert!(doc.slot_raw_text(column, MealType::Dinner).unwrap().is_empty());
    }

    #[test]
    fn test_excel_serial_date() {
        assert_eq!(
            excel_serial_to_date(45803.0),
            NaiveDate::from_ymd_opt(2025, 5, 26)
        );
        assert_eq!(excel_serial_to_date(1e18), None);
        assert_eq!(excel_serial_to_date(-1e18), None);
        assert_eq!(excel_serial_to_date(f64::NAN), None);
    }

    #[test]
    fn test_open_unreadable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a workbook").unwrap();
        let err = SheetDocument::open(file.path(), &layout()).err().unwrap();
        assert!(matches!(err, IngestError::SourceUnreadable { .. }));
    }
}
