//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `bujo_core` linkage and backend wiring from a terminal.
//! - Run the daily migration sweep and print a per-bucket summary.
//!
//! Usage: `bujo [config.json]` (defaults to `bujo.json` in the working dir).

use bujo_core::db::open_db;
use bujo_core::{
    display_label, BackendConfig, Bucket, ItemRepository, ItemStore, JournalConfig,
    LocalFileItemRepository, SqliteItemRepository, TodayView,
};
use log::error;
use std::error::Error;
use std::process::ExitCode;

const DEFAULT_CONFIG_PATH: &str = "bujo.json";

fn main() -> ExitCode {
    println!("bujo_core ping={}", bujo_core::ping());
    println!("bujo_core version={}", bujo_core::core_version());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = JournalConfig::load(&config_path)?;
    config.init_logging()?;
    println!(
        "backend={} path={}",
        config.backend.kind(),
        config.backend.path().display()
    );

    match &config.backend {
        BackendConfig::Sqlite { path } => {
            let conn = open_db(path)?;
            let repo = SqliteItemRepository::try_new(&conn)?;
            summarize(ItemStore::with_system_clock(repo)?, config.today_view)
        }
        BackendConfig::LocalFile { path } => {
            let repo = LocalFileItemRepository::new(path);
            summarize(ItemStore::with_system_clock(repo)?, config.today_view)
        }
    }
}

fn summarize<R: ItemRepository>(
    mut store: ItemStore<R>,
    today_view: TodayView,
) -> Result<(), Box<dyn Error>> {
    let migrated = store.migrate_old_items()?;
    println!("migrated={}", migrated.len());

    let today = store.today();
    for bucket in Bucket::ALL {
        let items = match bucket {
            Bucket::Today => store.today_items(today_view),
            other => store.get_items_by_category(other),
        };
        println!("[{bucket}] {}", items.len());
        for item in items {
            let mark = if item.completed { "x" } else { " " };
            println!(
                "  [{mark}] {:<5} {:<8} {}",
                item.kind.as_str(),
                display_label(item.date, today),
                item.content
            );
        }
    }
    Ok(())
}
