use std::path::Path;

use rusqlite::types::ToSqlOutput;
use rusqlite::{Connection, OptionalExtension, ToSql, params_from_iter};
use sqlshift_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::executor::{Database, Executor, IsolationLevel, Param, Transaction};

pub use rusqlite::InterruptHandle;

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Param::Int(value) => value.to_sql(),
            Param::Text(value) => value.to_sql(),
        }
    }
}

impl Executor for Connection {
    fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<usize> {
        Connection::execute(self, sql, params_from_iter(params.iter()))
            .map_err(|e| Error::Database(format!("failed to execute statement: {e}")))
    }

    fn execute_script(&self, script: &str) -> Result<()> {
        self.execute_batch(script)
            .map_err(|e| Error::Database(format!("failed to execute script: {e}")))
    }

    fn query_scalar(&self, sql: &str, params: &[Param<'_>]) -> Result<Option<i64>> {
        self.query_row(sql, params_from_iter(params.iter()), |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()
        .map(Option::flatten)
        .map_err(|e| Error::Database(format!("failed to query scalar: {e}")))
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let count = self.query_scalar_or(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[Param::Text(name)],
            0,
        )?;
        Ok(count > 0)
    }
}

/// SQLite-backed [`Database`].
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        Self::configure(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;
        Ok(Self { conn })
    }

    /// Handle that aborts whatever statement is running on this connection.
    /// Safe to move to another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Executor for SqliteDatabase {
    fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<usize> {
        Executor::execute(&self.conn, sql, params)
    }

    fn execute_script(&self, script: &str) -> Result<()> {
        self.conn.execute_script(script)
    }

    fn query_scalar(&self, sql: &str, params: &[Param<'_>]) -> Result<Option<i64>> {
        self.conn.query_scalar(sql, params)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        Executor::table_exists(&self.conn, name)
    }
}

impl Database for SqliteDatabase {
    type Transaction<'a> = SqliteTransaction<'a>;

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<SqliteTransaction<'_>> {
        if !self.conn.is_autocommit() {
            return Err(Error::Database("a transaction is already active".into()));
        }

        // SQLite transactions are always serializable; the behavior only
        // decides when the write lock is taken.
        let behavior = match isolation {
            Some(IsolationLevel::Serializable | IsolationLevel::RepeatableRead) => "IMMEDIATE",
            _ => "DEFERRED",
        };
        self.conn
            .execute_batch(&format!("BEGIN {behavior}"))
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;
        debug!(
            "began {behavior} transaction (requested isolation: {})",
            isolation.as_ref().map_or("default", IsolationLevel::as_sql)
        );

        Ok(SqliteTransaction { conn: &self.conn })
    }
}

/// Open transaction on a [`SqliteDatabase`]. Rolls back on drop unless it
/// was committed or rolled back first.
pub struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl Executor for SqliteTransaction<'_> {
    fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<usize> {
        Executor::execute(self.conn, sql, params)
    }

    fn execute_script(&self, script: &str) -> Result<()> {
        self.conn.execute_script(script)
    }

    fn query_scalar(&self, sql: &str, params: &[Param<'_>]) -> Result<Option<i64>> {
        self.conn.query_scalar(sql, params)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        Executor::table_exists(self.conn, name)
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| Error::Database(format!("failed to commit transaction: {e}")))?;
        debug!("transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| Error::Database(format!("failed to rollback transaction: {e}")))?;
        debug!("transaction rolled back");
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            warn!("transaction dropped while still open, rolling back");
            if let Err(e) = self.rollback() {
                warn!("rollback on drop failed: {e}");
            }
        }
    }
}
