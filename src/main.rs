use anyhow::{Context, Result};
use menu_ingest::{
    cli::{Cli, Commands, RestaurantCommand, SheetOptions, SourceCommand, TranslateCommand},
    config::{Config, LayoutConfig},
    engine::{IngestReport, Reconciler, WeekTarget},
    error::{self, FailureReport, IngestError},
    layout::{SheetDocument, TextDocument},
    store::SqliteStore,
    ui::{SilentUi, Ui, UiApp},
};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// What a command prints on stdout, plus the closing line for the dashboard
struct Output {
    json: Value,
    summary: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.tui);

    let result = run(&cli);
    match &result {
        Ok(output) => println!("{}", serde_json::to_string_pretty(&output.json)?),
        Err(err) => {
            if let Some(ingest_err) = err.downcast_ref::<IngestError>() {
                let report = FailureReport::from(ingest_err);
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    result.map(|_| ())
}

fn init_tracing(tui: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("menu_ingest=info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    // the dashboard owns the terminal while it runs
    if tui {
        builder.with_writer(std::io::sink).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
}

fn run(cli: &Cli) -> Result<Output> {
    let config = Config::load(cli.config.as_deref())?;

    if !cli.tui {
        return dispatch(cli, &config, &mut SilentUi::new());
    }

    let mut ui = UiApp::new().context("Failed to start terminal UI")?;
    match dispatch(cli, &config, &mut ui) {
        Ok(output) => {
            ui.finish(&output.summary)?;
            Ok(output)
        }
        Err(err) => {
            ui.restore()?;
            Err(err)
        }
    }
}

fn dispatch<U: Ui>(cli: &Cli, config: &Config, ui: &mut U) -> Result<Output> {
    let start = Instant::now();
    let db_path = config.database_path(cli.db.as_deref())?;

    let mut store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    let output = match &cli.command {
        Commands::Init => {
            let mut seeded = Vec::new();
            for seed in &config.restaurants {
                let resolved =
                    store.add_restaurant(&seed.name, seed.name_en.as_deref(), seed.variant)?;
                ui.log(format!("{} ({})", seed.name, seed.variant));
                seeded.push(json!({
                    "id": resolved.id,
                    "name": seed.name,
                    "created": resolved.created,
                }));
            }
            Output {
                summary: format!("Database ready at {:?}", db_path),
                json: json!({ "database": db_path, "restaurants": seeded }),
            }
        }

        Commands::Restaurant(RestaurantCommand::Add {
            name,
            name_en,
            variant,
        }) => {
            let resolved = store.add_restaurant(name, name_en.as_deref(), *variant)?;
            Output {
                summary: format!("Restaurant {} has id {}", name, resolved.id),
                json: json!({ "id": resolved.id, "name": name, "created": resolved.created }),
            }
        }

        Commands::Restaurant(RestaurantCommand::List) => {
            let restaurants = store.list_restaurants()?;
            Output {
                summary: format!("{} restaurants", restaurants.len()),
                json: serde_json::to_value(&restaurants)?,
            }
        }

        Commands::Ingest(source) => {
            let mut reconciler = Reconciler::new(&mut store, &config.templates, ui);
            let report = match source {
                SourceCommand::Sheet { path, options } => {
                    let doc = reconciler.read(|| open_sheet(path, &config.layout, options))?;
                    reconciler.ingest(&doc, None)?
                }
                SourceCommand::Text { path, restaurant } => {
                    let doc = reconciler.read(|| read_text(path))?;
                    reconciler.ingest(&doc, *restaurant)?
                }
            };
            report_output(report)?
        }

        Commands::Translate(source) => {
            let mut reconciler = Reconciler::new(&mut store, &config.templates, ui);
            let report = match source {
                TranslateCommand::Sheet {
                    path,
                    week_id,
                    options,
                } => {
                    let doc = reconciler.read(|| open_sheet(path, &config.layout, options))?;
                    let target = week_id.map_or(WeekTarget::FromSource, WeekTarget::Id);
                    reconciler.translate(&doc, target)?
                }
                TranslateCommand::Text { path } => {
                    let doc = reconciler.read(|| read_text(path))?;
                    reconciler.translate(&doc, WeekTarget::FromSource)?
                }
            };
            report_output(report)?
        }

        Commands::Menu {
            restaurant_id,
            date,
        } => {
            let menu = store.week_menu(*restaurant_id, *date)?;
            Output {
                summary: format!(
                    "{} meals for the week of {}",
                    menu.summary.total_meals, menu.week.start_date
                ),
                json: serde_json::to_value(&menu)?,
            }
        }
    };

    info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(output)
}

fn report_output(report: IngestReport) -> Result<Output> {
    Ok(Output {
        summary: report.message.clone(),
        json: serde_json::to_value(&report)?,
    })
}

fn open_sheet(
    path: &Path,
    layout: &LayoutConfig,
    options: &SheetOptions,
) -> error::Result<SheetDocument> {
    let mut layout = layout.clone();
    if let Some(sheet) = &options.sheet {
        layout.sheet = Some(sheet.clone());
    }
    if let Some(year) = options.year {
        layout.anchor_year = Some(year);
    }
    SheetDocument::open(path, &layout)
}

fn read_text(path: &Path) -> error::Result<TextDocument> {
    if path.as_os_str() == "-" {
        TextDocument::from_reader(std::io::stdin().lock(), "-")
    } else {
        TextDocument::read(path)
    }
}
