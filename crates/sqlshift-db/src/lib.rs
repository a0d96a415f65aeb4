pub mod executor;
pub mod sqlite;
pub mod transaction;

pub use executor::{Database, Executor, IsolationLevel, Param, Transaction};
pub use sqlite::{InterruptHandle, SqliteDatabase, SqliteTransaction};
pub use transaction::{TransactionGuard, with_transaction};
