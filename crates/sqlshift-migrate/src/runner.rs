//! Applies pending migrations and undoes a partially applied batch.
//!
//! A run scans and validates the migrations directory, bootstraps the
//! ledger, then applies every migration above the watermark in ascending
//! order, one serializable transaction each. If any of them fails, the
//! migrations committed earlier in the same run are reverted newest first.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sqlshift_common::{Error, Result};
use sqlshift_db::{Database, Executor, IsolationLevel, with_transaction};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ledger::Ledger;
use crate::migration::Migration;
use crate::scanner::{ScanOutcome, scan};
use crate::validator::validate;

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Watermark when the run started; `None` if the database was never
    /// consulted because the directory was empty.
    pub watermark_before: Option<u32>,
    pub watermark_after: Option<u32>,
    /// Versions applied by this run, in order.
    pub applied: Vec<u32>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Applied,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: u32,
    pub name: String,
    pub state: MigrationState,
}

/// Runs the migrations found in one directory against a database.
#[derive(Debug, Clone)]
pub struct Migrator {
    dir: PathBuf,
    ledger: Ledger,
}

impl Migrator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ledger: Ledger::default(),
        }
    }

    pub fn with_ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Scan and validate the directory. `None` when it has no entries.
    pub fn load(&self) -> Result<Option<Vec<Migration>>> {
        match scan(&self.dir)? {
            ScanOutcome::Empty => Ok(None),
            ScanOutcome::Found(pairs) => validate(pairs).map(Some),
        }
    }

    /// Bring `db` up to date.
    ///
    /// On failure the returned error is the one that stopped the batch. If
    /// undoing the batch also failed, both are returned in an
    /// `Error::Multiple`, and the database may be left part way through
    /// the run's migrations.
    pub fn run<D: Database>(&self, cancel: &CancellationToken, db: &mut D) -> Result<RunReport> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let Some(migrations) = self.load()? else {
            info!("no migrations found in {}", self.dir.display());
            return Ok(RunReport {
                elapsed: started.elapsed(),
                ..RunReport::default()
            });
        };

        self.ledger.ensure_schema(&*db)?;
        let watermark = self.ledger.watermark(&*db)?;
        let mut report = RunReport {
            watermark_before: Some(watermark),
            watermark_after: Some(watermark),
            ..RunReport::default()
        };

        if let Some(zero) = migrations.iter().find(|m| m.version == 0) {
            warn!(
                "migration 0 '{}' is never applied: version 0 means an empty ledger",
                zero.name
            );
        }

        let mut pending: Vec<Migration> = migrations
            .into_iter()
            .filter(|m| m.version > watermark)
            .collect();
        if pending.is_empty() {
            info!("database is up to date at version {watermark}");
            report.elapsed = started.elapsed();
            return Ok(report);
        }
        pending.sort_by_key(|m| m.version);
        info!(
            "{} pending migration(s) above version {watermark}",
            pending.len()
        );

        let mut applied: Vec<&Migration> = Vec::with_capacity(pending.len());
        let mut failure = None;
        for migration in &pending {
            if cancel.is_cancelled() {
                failure = Some(Error::Cancelled);
                break;
            }
            match self.apply(db, migration) {
                Ok(()) => {
                    info!("applied migration {} '{}'", migration.version, migration.name);
                    applied.push(migration);
                }
                Err(e) => {
                    error!("{e}");
                    failure = Some(e);
                    break;
                }
            }
        }

        let Some(trigger) = failure else {
            report.applied = applied.iter().map(|m| m.version).collect();
            report.watermark_after = applied.last().map(|m| m.version);
            report.elapsed = started.elapsed();
            info!(
                "applied {} migration(s) in {:?}, now at version {}",
                report.applied.len(),
                report.elapsed,
                report.watermark_after.unwrap_or(watermark)
            );
            return Ok(report);
        };

        if applied.is_empty() {
            return Err(trigger);
        }

        warn!(
            "reverting {} migration(s) applied during this run",
            applied.len()
        );
        match self.revert(db, &applied) {
            Ok(()) => {
                info!("schema restored to version {watermark}");
                Err(trigger)
            }
            Err(revert_err) => {
                error!("revert failed, database needs manual inspection: {revert_err}");
                Err(Error::join(trigger, revert_err))
            }
        }
    }

    /// Report every discovered migration as applied or pending without
    /// changing anything. A missing ledger means nothing is applied.
    pub fn status(&self, db: &dyn Executor) -> Result<Vec<MigrationStatus>> {
        let migrations = self.load()?.unwrap_or_default();
        let watermark = if self.ledger.exists(db)? {
            self.ledger.watermark(db)?
        } else {
            0
        };

        Ok(migrations
            .into_iter()
            .map(|m| MigrationStatus {
                state: if m.version > watermark {
                    MigrationState::Pending
                } else {
                    MigrationState::Applied
                },
                version: m.version,
                name: m.name,
            })
            .collect())
    }

    fn apply<D: Database>(&self, db: &mut D, migration: &Migration) -> Result<()> {
        debug!("applying migration {} '{}'", migration.version, migration.name);
        with_transaction(db, Some(IsolationLevel::Serializable), |tx| {
            tx.execute_script(&migration.up)?;
            self.ledger.record(tx, migration.version, &migration.name)
        })
        .map_err(|source| Error::Apply {
            version: migration.version,
            name: migration.name.clone(),
            source: Box::new(source),
        })
    }

    /// Undo `applied` newest first, stopping at the first failure.
    fn revert<D: Database>(&self, db: &mut D, applied: &[&Migration]) -> Result<()> {
        for migration in applied.iter().rev() {
            with_transaction(db, None, |tx| {
                tx.execute_script(&migration.down)?;
                self.ledger.remove(tx, migration.version)
            })
            .map_err(|source| Error::Revert {
                version: migration.version,
                name: migration.name.clone(),
                source: Box::new(source),
            })?;
            info!("reverted migration {} '{}'", migration.version, migration.name);
        }
        Ok(())
    }
}

/// Apply the migrations in `dir` to `db` using the default ledger table.
pub fn run<D: Database>(cancel: &CancellationToken, db: &mut D, dir: &Path) -> Result<RunReport> {
    Migrator::new(dir).run(cancel, db)
}
