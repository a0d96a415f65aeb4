pub mod ledger;
pub mod migration;
pub mod runner;
pub mod scaffold;
pub mod scanner;
pub mod validator;

pub use ledger::{DEFAULT_LEDGER_TABLE, Ledger};
pub use migration::{Direction, Migration};
pub use runner::{MigrationState, MigrationStatus, Migrator, RunReport, run};
pub use scaffold::scaffold;
pub use scanner::{ScanOutcome, Script, ScriptPair, scan};
pub use validator::validate;
