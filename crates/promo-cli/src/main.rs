//! 🚀 promo-cli — the front door, the bouncer, the maitre d' of promo.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆
//!
//! ```text
//! promo reload [--file promotions.csv]   rebuild the cache, print a report
//! promo get <ID>                         look one up, print it as JSON
//! promo watch                            reload on a timer until Ctrl-C
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use promo::{CancelToken, LoadReport, PromotionCache, SourceBackend, scheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🏷️ Rebuild a promotions cache from a CSV and look things up in it.
#[derive(Debug, Parser)]
#[command(name = "promo", version)]
struct Cli {
    /// TOML config file. `PROMO_*` env vars are read either way.
    #[arg(short, long, default_value = "promo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clear the store and load every promotion from the source.
    Reload {
        /// Read this file instead of the configured source.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print one promotion as JSON. Exits 1 when it isn't there.
    Get { id: String },
    /// Reload now, then every `runtime.reload_interval_secs`, until Ctrl-C.
    Watch,
}

/// 🚀 main() — where it all begins. The genesis. The big bang.
/// The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => {}
        // -- 🔍 not found. not an error, but not a zero either.
        Ok(false) => std::process::exit(1),
        Err(err) => {
            report_error(&err);
            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}

/// 🎯 Returns `Ok(false)` when the command ran fine but found nothing.
async fn run(cli: Cli) -> Result<bool> {
    // 🔒 Missing config file is fine, env vars may carry everything. We just don't pass it along.
    let config_file = existing_config_file(&cli.config)?;
    let app_config = promo::load_config(config_file).context(
        "💀 In promo-cli, we couldn't load the config. Take a look at the file and the PROMO_* \
         env vars, make sure you didn't forget something obvious",
    )?;
    let cache = PromotionCache::from_config(app_config)
        .await
        .context("💀 In promo-cli, we couldn't reach the store")?;

    match cli.command {
        Command::Reload { file } => {
            let source = match file {
                Some(path) => Some(SourceBackend::file(&path).await?),
                None => None,
            };
            let report = cache.reload_with(source, cancel_on_ctrl_c()).await?;
            println!("{}", render_report(&report));
            println!("✅ {}", report.message());
            Ok(true)
        }
        Command::Get { id } => match cache.get(&id).await? {
            Some(promotion) => {
                println!("{}", serde_json::to_string_pretty(&promotion)?);
                Ok(true)
            }
            None => {
                eprintln!("🔍 no promotion with id '{id}'");
                Ok(false)
            }
        },
        Command::Watch => {
            let every = cache.runtime().reload_interval();
            let cancel = cancel_on_ctrl_c();
            info!("👀 watching; Ctrl-C to stop");
            scheduler::spawn_periodic_reload(Arc::new(cache), every, cancel)?
                .await
                .context("💀 the reload loop panicked")?;
            Ok(true)
        }
    }
}

fn existing_config_file(path: &Path) -> Result<Option<&Path>> {
    let exists = path.try_exists().with_context(|| {
        format!(
            "💀 Couldn't check whether the config file exists. If it's a relative path, \
             try an absolute one. Was checking here: '{}'",
            path.display()
        )
    })?;
    Ok(exists.then_some(path))
}

/// 🛑 A token that flips when the user hits Ctrl-C.
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received, winding down");
            trigger.cancel();
        }
    });
    cancel
}

/// 🍽️ Two columns, one row per number anybody might ask about.
fn render_report(report: &LoadReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["reload", "#"]);

    let rows = [
        ("generation", report.generation.to_string()),
        ("strategy", report.strategy.to_string()),
        ("rows read", report.rows_read.to_string()),
        ("rows decoded", report.rows_decoded.to_string()),
        ("rows skipped", report.rows_skipped.to_string()),
        ("flush calls", report.flush_calls.to_string()),
        ("records flushed", report.records_flushed.to_string()),
        ("entries written", report.entries_written.to_string()),
        ("elapsed", format!("{:.2?}", report.elapsed)),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    for sample in &report.sample_errors {
        table.add_row(vec![Cell::new("skipped"), Cell::new(sample.to_string())]);
    }
    table
}

/// 🧅 Peel the onion of sadness, one layer at a time.
fn report_error(err: &anyhow::Error) {
    error!("💀 error: {err}");
    let mut the_vibes_are_giving_connection_issues = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {cause}");
        let cause_str = cause.to_string();
        if cause_str.contains("Connection refused")
            || cause_str.contains("connection refused")
            || cause_str.contains("Could not connect to Redis")
        {
            the_vibes_are_giving_connection_issues = true;
        }
    }

    if the_vibes_are_giving_connection_issues {
        error!(
            "🔧 hint: looks like Redis isn't reachable. Check `store_config.Redis.url`, \
             and if you're using Docker, `docker ps` to see whether it's actually up. \
             Even servers need a nudge sometimes. ☕"
        );
    }
}
