use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::RestaurantVariant;

#[derive(Parser, Debug)]
#[command(name = "menu-ingest")]
#[command(version, about = "Load weekly cafeteria menus into SQLite")]
pub struct Cli {
    /// SQLite database path (overrides the config file)
    #[arg(long, global = true, env = "MENU_INGEST_DB")]
    pub db: Option<PathBuf>,

    /// Config file (default: per-user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show the terminal dashboard while running
    #[arg(long, global = true)]
    pub tui: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and seed restaurants from the config file
    Init,

    /// Manage reference restaurants
    #[command(subcommand)]
    Restaurant(RestaurantCommand),

    /// Ingest a native-language weekly menu
    #[command(subcommand)]
    Ingest(SourceCommand),

    /// Patch English names onto an ingested week
    #[command(subcommand)]
    Translate(TranslateCommand),

    /// Print the stored menu of the week containing a date
    Menu {
        #[arg(long)]
        restaurant_id: i64,

        /// Any date inside the week (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
}

#[derive(Subcommand, Debug)]
pub enum RestaurantCommand {
    /// Add a restaurant; an existing name is left unchanged
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        name_en: Option<String>,

        /// RESTAURANT_1 (Mon-Fri) or RESTAURANT_2 (Mon-Sun)
        #[arg(long)]
        variant: RestaurantVariant,
    },

    /// List known restaurants
    List,
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Spreadsheet workbook (.xlsx, .xls, .ods)
    Sheet {
        path: PathBuf,

        #[command(flatten)]
        options: SheetOptions,
    },

    /// Plain-text payload ("-" reads stdin)
    Text {
        path: PathBuf,

        /// Restaurant variant, overriding the "식당:" line
        #[arg(long)]
        restaurant: Option<RestaurantVariant>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TranslateCommand {
    /// English spreadsheet with the native layout
    Sheet {
        path: PathBuf,

        /// Week to patch; read from the sheet header when omitted
        #[arg(long)]
        week_id: Option<i64>,

        #[command(flatten)]
        options: SheetOptions,
    },

    /// English plain-text payload ("-" reads stdin)
    Text { path: PathBuf },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SheetOptions {
    /// Sheet name (default: first non-empty sheet)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Year for "Mon 5/26" style headers (default: config, then current year)
    #[arg(long)]
    pub year: Option<i32>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
