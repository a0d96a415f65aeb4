mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlshift_config::{AppConfig, ConfigLoader, LogConfig, MigrationsWatcher};
use sqlshift_db::{InterruptHandle, SqliteDatabase};
use sqlshift_migrate::{Ledger, Migrator, RunReport, scaffold};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "sqlshift", version, about = "Apply versioned SQL migrations with automatic rollback")]
struct Cli {
    /// Config file (TOML or YAML). Defaults to ./sqlshift.{toml,yml,yaml}.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, global = true, env = "SQLSHIFT_DATABASE")]
    database: Option<PathBuf>,

    /// Directory holding `<version>.<name>.<up|down>.sql` scripts.
    #[arg(long, global = true, env = "SQLSHIFT_MIGRATIONS_DIR")]
    migrations_dir: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Up,
    /// Show which migrations are applied and which are pending
    Status,
    /// Create an empty up/down script pair
    New {
        /// Migration name (letters, digits, '_' or '-')
        name: String,
    },
    /// Apply pending migrations now and again whenever scripts change
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(dir) = cli.migrations_dir {
        config.migrations_dir = dir;
    }
    if cli.log_json {
        config.log.json = true;
    }
    init_logging(&config.log)?;

    match cli.command {
        Command::Up => up(&config).await,
        Command::Status => status(&config),
        Command::New { name } => {
            let (up, down) = scaffold(&config.migrations_dir, &name)?;
            println!("Created {}", up.display());
            println!("Created {}", down.display());
            Ok(())
        }
        Command::Watch => watch(&config).await,
    }
}

fn init_logging(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .with_context(|| format!("invalid log level '{}'", log.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn migrator(config: &AppConfig) -> Result<Migrator> {
    let ledger = Ledger::new(config.ledger_table.clone())?;
    Ok(Migrator::new(&config.migrations_dir).with_ledger(ledger))
}

/// Cancel `cancel` and abort the running statement on Ctrl+C.
async fn cancel_on_ctrl_c(cancel: CancellationToken, interrupt: InterruptHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, stopping");
        cancel.cancel();
        interrupt.interrupt();
    }
}

/// Run the migrator on a blocking thread, handing the connection back.
async fn apply(
    migrator: Migrator,
    mut db: SqliteDatabase,
    cancel: CancellationToken,
) -> Result<(SqliteDatabase, sqlshift_common::Result<RunReport>)> {
    tokio::task::spawn_blocking(move || {
        let outcome = migrator.run(&cancel, &mut db);
        (db, outcome)
    })
    .await
    .context("migration task panicked")
}

async fn up(config: &AppConfig) -> Result<()> {
    let migrator = migrator(config)?;
    let db = SqliteDatabase::open(&config.database)?;

    let cancel = CancellationToken::new();
    let listener = tokio::spawn(cancel_on_ctrl_c(cancel.clone(), db.interrupt_handle()));

    let (_, outcome) = apply(migrator, db, cancel).await?;
    listener.abort();

    let report = outcome?;
    report::print_report(&report);
    Ok(())
}

fn status(config: &AppConfig) -> Result<()> {
    let migrator = migrator(config)?;
    let db = SqliteDatabase::open(&config.database)?;
    let statuses = migrator.status(&db)?;
    report::print_status(&statuses);
    Ok(())
}

async fn watch(config: &AppConfig) -> Result<()> {
    let migrator = migrator(config)?;
    let (_watcher, mut changes) = MigrationsWatcher::start(config.migrations_dir.clone())
        .with_context(|| format!("failed to watch {}", config.migrations_dir.display()))?;

    let mut db = SqliteDatabase::open(&config.database)?;
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone(), db.interrupt_handle()));

    loop {
        let (returned, outcome) = apply(migrator.clone(), db, cancel.clone()).await?;
        db = returned;
        match outcome {
            Ok(report) => report::print_report(&report),
            Err(sqlshift_common::Error::Cancelled) => break,
            // keep watching; the next edit may fix it
            Err(e) => error!("migration run failed: {e}"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("migrations changed, re-running");
            }
        }
    }

    info!("stopped watching");
    Ok(())
}
