pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod layout;
pub mod model;
pub mod store;
pub mod summary;
pub mod ui;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use engine::{IngestReport, Reconciler, WeekTarget};
pub use error::{FailureReport, IngestError};
pub use store::{MenuStore, SqliteStore};
pub use ui::{Phase, SilentUi, Ui, UiApp};
