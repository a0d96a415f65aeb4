//! The table recording which migration versions are applied.
//!
//! Columns: `id` (surrogate key), `name`, `version`. The highest recorded
//! version is the watermark; an empty ledger has watermark 0.

use sqlshift_common::{Error, Result};
use sqlshift_db::{Executor, Param};
use tracing::{debug, info};

pub const DEFAULT_LEDGER_TABLE: &str = "schema_migration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    table: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }
}

impl Ledger {
    /// Use `table` as the ledger. The name is spliced into SQL, so it must be
    /// a plain identifier.
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let mut chars = table.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::Config(format!(
                "ledger table name '{table}' is not a plain SQL identifier"
            )));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn exists(&self, exec: &dyn Executor) -> Result<bool> {
        exec.table_exists(&self.table)
            .map_err(context(format!("failed checking if '{}' table exists", self.table)))
    }

    /// Create the ledger table unless it is already there.
    pub fn ensure_schema(&self, exec: &dyn Executor) -> Result<()> {
        if self.exists(exec)? {
            debug!("ledger table '{}' already exists", self.table);
            return Ok(());
        }

        let stmt = format!(
            "CREATE TABLE {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                version INTEGER NOT NULL UNIQUE
            )",
            self.table
        );
        exec.execute_script(&stmt)
            .map_err(context(format!("failed creating '{}' table", self.table)))?;
        info!("created ledger table '{}'", self.table);
        Ok(())
    }

    /// Highest applied version, 0 when nothing has been applied.
    pub fn watermark(&self, exec: &dyn Executor) -> Result<u32> {
        let q = format!(
            "SELECT version FROM {} ORDER BY version DESC LIMIT 1",
            self.table
        );
        let version = exec
            .query_scalar_or(&q, &[], 0)
            .map_err(context("failed fetching last applied version".to_string()))?;
        u32::try_from(version).map_err(|_| {
            Error::Database(format!(
                "'{}' holds version {version}, outside the supported range",
                self.table
            ))
        })
    }

    /// Insert the entry for `version`. Pass the transaction that ran the
    /// version's up script.
    pub fn record(&self, tx: &dyn Executor, version: u32, name: &str) -> Result<()> {
        let stmt = format!("INSERT INTO {} (version, name) VALUES (?1, ?2)", self.table);
        tx.execute(&stmt, &[Param::Int(i64::from(version)), Param::Text(name)])
            .map_err(context(format!(
                "failed inserting migration '{name}' into '{}'",
                self.table
            )))?;
        Ok(())
    }

    /// Delete the entry for `version`. Pass the transaction that ran the
    /// version's down script.
    pub fn remove(&self, tx: &dyn Executor, version: u32) -> Result<()> {
        let stmt = format!("DELETE FROM {} WHERE version = ?1", self.table);
        let removed = tx
            .execute(&stmt, &[Param::Int(i64::from(version))])
            .map_err(context(format!(
                "failed deleting version {version} from '{}'",
                self.table
            )))?;
        if removed == 0 {
            return Err(Error::Database(format!(
                "no entry for version {version} in '{}'",
                self.table
            )));
        }
        Ok(())
    }
}

/// Prefix a database error with what the ledger was doing.
fn context(action: String) -> impl FnOnce(Error) -> Error {
    move |e| match e {
        Error::Database(msg) => Error::Database(format!("{action}: {msg}")),
        other => other,
    }
}
