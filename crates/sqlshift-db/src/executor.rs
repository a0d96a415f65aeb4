//! Backend-neutral statement execution.
//!
//! The migration engine only ever needs to run raw scripts, run single
//! parameterised statements and read one integer back, so that is all the
//! [`Executor`] seam exposes.

use sqlshift_common::Result;

/// A bound statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    Int(i64),
    Text(&'a str),
}

/// Transaction isolation levels a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    /// Strongest guarantee; used for every forward migration.
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

pub trait Executor {
    /// Run one statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<usize>;

    /// Run a script that may hold several statements.
    fn execute_script(&self, script: &str) -> Result<()>;

    /// Read the first column of the first row, `None` when no row (or a
    /// NULL) comes back.
    fn query_scalar(&self, sql: &str, params: &[Param<'_>]) -> Result<Option<i64>>;

    fn query_scalar_or(&self, sql: &str, params: &[Param<'_>], default: i64) -> Result<i64> {
        Ok(self.query_scalar(sql, params)?.unwrap_or(default))
    }

    /// Look a table up in the backend's catalog by name.
    fn table_exists(&self, name: &str) -> Result<bool>;
}

/// An open transaction. Implementations must roll back on drop when neither
/// `commit` nor `rollback` succeeded.
pub trait Transaction: Executor {
    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Whether the transaction still needs to be finished.
    fn is_active(&self) -> bool;
}

pub trait Database: Executor {
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<Self::Transaction<'_>>;
}

#[cfg(test)]
mod tests {
    use super::IsolationLevel;

    #[test]
    fn isolation_level_sql() {
        assert_eq!(IsolationLevel::ReadUncommitted.as_sql(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.as_sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }
}
