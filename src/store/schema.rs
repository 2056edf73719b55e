//! Table definitions for the menu store and their DDL

/// Column data type
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    /// ISO-8601 calendar date stored as TEXT
    Date,
    /// `datetime('now')` stamped TEXT
    Timestamp,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
    pub default: Option<&'static str>,
}

impl Column {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
            default: None,
        }
    }

    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
            default: None,
        }
    }

    /// SQL default expression
    pub const fn default(self, expr: &'static str) -> Self {
        Self {
            default: Some(expr),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references_table: &'static str,
    pub references_column: &'static str,
}

impl ForeignKey {
    pub const fn new(column: &'static str, references_table: &'static str) -> Self {
        Self {
            column,
            references_table,
            references_column: "id",
        }
    }
}

/// Unique indexes double as the natural keys used by `ON CONFLICT`
#[derive(Debug, Clone)]
pub struct Index {
    pub columns: &'static [&'static str],
    pub unique: bool,
}

impl Index {
    pub const fn on(columns: &'static [&'static str]) -> Self {
        Self {
            columns,
            unique: false,
        }
    }

    pub const fn unique(columns: &'static [&'static str]) -> Self {
        Self {
            columns,
            unique: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub foreign_keys: &'static [ForeignKey],
    pub indexes: &'static [Index],
}

const NOW: &str = "(datetime('now'))";

pub static RESTAURANTS: TableSchema = TableSchema {
    name: "restaurants",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("name", ColumnType::Text),
        Column::new("name_en", ColumnType::Text),
        Column::required("variant", ColumnType::Text),
    ],
    foreign_keys: &[],
    indexes: &[Index::unique(&["name"])],
};

pub static WEEKS: TableSchema = TableSchema {
    name: "weeks",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("start_date", ColumnType::Date),
        Column::required("restaurant_id", ColumnType::Integer),
        Column::required("created_at", ColumnType::Timestamp).default(NOW),
        Column::required("updated_at", ColumnType::Timestamp).default(NOW),
    ],
    foreign_keys: &[ForeignKey::new("restaurant_id", "restaurants")],
    indexes: &[Index::unique(&["restaurant_id", "start_date"])],
};

pub static MEALS: TableSchema = TableSchema {
    name: "meals",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("week_id", ColumnType::Integer),
        Column::required("date", ColumnType::Date),
        Column::required("day_of_week", ColumnType::Text),
        Column::required("meal_type", ColumnType::Text),
        Column::required("created_at", ColumnType::Timestamp).default(NOW),
        Column::required("updated_at", ColumnType::Timestamp).default(NOW),
    ],
    foreign_keys: &[ForeignKey::new("week_id", "weeks")],
    indexes: &[Index::unique(&["week_id", "date", "meal_type"])],
};

pub static MENU_ITEMS: TableSchema = TableSchema {
    name: "menu_items",
    columns: &[
        Column::required("id", ColumnType::Integer),
        Column::required("meal_id", ColumnType::Integer),
        Column::required("category", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("name_en", ColumnType::Text).default("''"),
        Column::required("price", ColumnType::Real).default("0"),
        Column::required("position", ColumnType::Integer).default("0"),
        Column::required("created_at", ColumnType::Timestamp).default(NOW),
        Column::required("updated_at", ColumnType::Timestamp).default(NOW),
    ],
    foreign_keys: &[ForeignKey::new("meal_id", "meals")],
    indexes: &[
        Index::unique(&["meal_id", "category", "name"]),
        Index::on(&["meal_id", "position"]),
    ],
};

/// All tables, parents before children
pub static ALL_TABLES: &[&TableSchema] = &[&RESTAURANTS, &WEEKS, &MEALS, &MENU_ITEMS];

/// Generate CREATE TABLE SQL for a table schema
pub fn generate_create_table(schema: &TableSchema) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", schema.name);
    let mut columns = Vec::new();

    for col in schema.columns {
        let sql_type = match col.col_type {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text | ColumnType::Date | ColumnType::Timestamp => "TEXT",
        };

        let pk = if col.name == "id" {
            " PRIMARY KEY AUTOINCREMENT"
        } else {
            ""
        };
        let null_constraint = if !col.nullable && col.name != "id" {
            " NOT NULL"
        } else {
            ""
        };
        let default = col
            .default
            .map(|expr| format!(" DEFAULT {}", expr))
            .unwrap_or_default();

        columns.push(format!(
            "    {} {}{}{}{}",
            col.name, sql_type, pk, null_constraint, default
        ));
    }

    for fk in schema.foreign_keys {
        columns.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({})",
            fk.column, fk.references_table, fk.references_column
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate CREATE INDEX statements: declared indexes, then one per foreign
/// key column not already leading a declared index
pub fn generate_indexes(schema: &TableSchema) -> Vec<String> {
    let mut statements: Vec<String> = schema
        .indexes
        .iter()
        .map(|index| {
            let (kind, prefix) = if index.unique {
                ("UNIQUE INDEX", "uq")
            } else {
                ("INDEX", "idx")
            };
            format!(
                "CREATE {} IF NOT EXISTS {}_{}_{} ON {}({})",
                kind,
                prefix,
                schema.name,
                index.columns.join("_"),
                schema.name,
                index.columns.join(", ")
            )
        })
        .collect();

    for fk in schema.foreign_keys {
        let covered = schema
            .indexes
            .iter()
            .any(|index| index.columns.first() == Some(&fk.column));
        if !covered {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
                schema.name, fk.column, schema.name, fk.column
            ));
        }
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_create_table() {
        let sql = generate_create_table(&MENU_ITEMS);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS menu_items"));
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("name_en TEXT NOT NULL DEFAULT ''"));
        assert!(sql.contains("price REAL NOT NULL DEFAULT 0"));
        assert!(sql.contains("FOREIGN KEY (meal_id) REFERENCES meals(id)"));
    }

    #[test]
    fn test_generate_indexes() {
        let indexes = generate_indexes(&MEALS);
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].contains("UNIQUE INDEX IF NOT EXISTS uq_meals_week_id_date_meal_type"));

        let indexes = generate_indexes(&RESTAURANTS);
        assert!(indexes[0].contains("ON restaurants(name)"));
    }

    #[test]
    fn test_parents_before_children() {
        for (pos, table) in ALL_TABLES.iter().enumerate() {
            for fk in table.foreign_keys {
                let parent = ALL_TABLES
                    .iter()
                    .position(|t| t.name == fk.references_table)
                    .unwrap();
                assert!(parent < pos, "{} created before {}", table.name, fk.references_table);
            }
        }
    }
}
